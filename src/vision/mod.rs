//! Pixel-statistics detection
//!
//! This module provides frame wrappers and the visual predicates used to
//! recognise clear screens: histogram color matching, reference image
//! differencing, negation and debouncing.
//!
//! # Example
//!
//! ```ignore
//! use endless_clear_detector::vision::{BitmapView, ColorHistogramDetector, Detector};
//!
//! let mut course_clear: Detector = ColorHistogramDetector::rgb([254, 215, 0], 95.0).into();
//! let view = BitmapView::decode(&png_bytes)?;
//! if course_clear.evaluate(&view)? {
//!     println!("course cleared");
//! }
//! ```

pub mod bitmap;
pub mod capture;
pub mod config;
pub mod debounce;
pub mod detector;
pub mod histogram;

pub use bitmap::{BitmapView, ColorMode, ModeImage, Region};
pub use capture::{CaptureSource, FileCapture, FrameSequenceCapture};
pub use config::DetectorConfig;
pub use debounce::DebounceDetector;
pub use detector::{ColorHistogramDetector, Detector, ReferenceImageDetector};
pub use histogram::Histogram;
