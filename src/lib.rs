//! Endless Clear Detector
//!
//! Watches captured game footage and recognises clear events from pixel
//! statistics alone. Visual predicates (color histograms, reference image
//! differences, negation, debouncing) are gated by a small state machine so
//! that one ambiguous frame cannot fire an event or count a clear twice.
//!
//! This crate can be used as:
//! - A library driven one frame at a time through [`ClearWatcher::tick`]
//! - A background poller via [`ClearWatcher::spawn`] with any [`vision::CaptureSource`]
//!
//! # Example
//!
//! ```ignore
//! use endless_clear_detector::{WatcherConfig, vision::BitmapView};
//!
//! // `assets_dir` must hold a `clear_frame.png` screenshot of the course
//! // clear screen; see `config::CLEAR_FRAME_ASSET`.
//! let config = WatcherConfig::standard()?;
//! let mut watcher = config.build_watcher(&assets_dir)?;
//! let mut log = config.new_log();
//!
//! let view = BitmapView::from_base64(&screenshot_payload)?;
//! watcher.tick(&view, &mut log);
//! println!("{}", log.display_text());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod vision;

// Re-export commonly used types
pub use config::{CounterConfig, RuleConfig, WatcherConfig, CLEAR_FRAME_ASSET};
pub use crate::core::{
    ActionRule, ClearEvent, ClearLog, ClearSink, ClearState, ClearStateMachine, ClearWatcher,
    StepOutcome, TickOutcome, WatcherHandle,
};
pub use error::{ConfigError, Error, Result};
