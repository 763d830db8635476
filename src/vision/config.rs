//! Detector configuration
//!
//! Detectors are described as a small tree in TOML, e.g.
//!
//! ```toml
//! [rules.detector]
//! type = "stable"
//! inner = { type = "not", inner = { type = "reference", path = "clear_frame.png" } }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::bitmap::{ColorMode, Region};
use super::debounce::{DebounceDetector, DEFAULT_MIN_COUNT, DEFAULT_WINDOW};
use super::detector::{
    ColorHistogramDetector, Detector, ReferenceImageDetector, DEFAULT_REFERENCE_THRESHOLD,
};
use crate::{ConfigError, Result};

/// Configuration for one detector node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Histogram color match. A negative channel value ignores that channel.
    Color {
        color: Vec<i16>,
        threshold: f64,
        #[serde(default = "default_mode")]
        mode: String,
        #[serde(default)]
        region: Option<Region>,
    },
    /// Reference image comparison; relative paths resolve against the rule file
    Reference {
        path: PathBuf,
        #[serde(default = "default_reference_threshold")]
        threshold: f64,
    },
    Not {
        inner: Box<DetectorConfig>,
    },
    /// Debounced child
    Stable {
        inner: Box<DetectorConfig>,
        #[serde(default = "default_window_ms")]
        window_ms: u64,
        #[serde(default = "default_min_count")]
        min_count: usize,
    },
    Constant {
        value: bool,
    },
    Unimplemented {
        name: String,
    },
}

fn default_mode() -> String {
    "RGBA".to_string()
}

fn default_reference_threshold() -> f64 {
    DEFAULT_REFERENCE_THRESHOLD
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW.as_millis() as u64
}

fn default_min_count() -> usize {
    DEFAULT_MIN_COUNT
}

impl DetectorConfig {
    /// Build the detector, loading reference images relative to `base_path`
    pub fn build(&self, base_path: &Path) -> Result<Detector> {
        match self {
            DetectorConfig::Color {
                color,
                threshold,
                mode,
                region,
            } => {
                let target = color
                    .iter()
                    .map(|&value| channel_target(value))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let mode: ColorMode = mode.parse()?;
                let mut detector = ColorHistogramDetector::new(target, *threshold, mode)?;
                if let Some(region) = region {
                    detector = detector.with_region(*region);
                }
                Ok(detector.into())
            }
            DetectorConfig::Reference { path, threshold } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_path.join(path)
                };
                Ok(ReferenceImageDetector::load(&path)?
                    .with_threshold(*threshold)
                    .into())
            }
            DetectorConfig::Not { inner } => Ok(inner.build(base_path)?.negate()),
            DetectorConfig::Stable {
                inner,
                window_ms,
                min_count,
            } => Ok(DebounceDetector::with_window(
                inner.build(base_path)?,
                Duration::from_millis(*window_ms),
                *min_count,
            )
            .into()),
            DetectorConfig::Constant { value } => Ok(Detector::Constant(*value)),
            DetectorConfig::Unimplemented { name } => Ok(Detector::Unimplemented(name.clone())),
        }
    }
}

fn channel_target(value: i16) -> std::result::Result<Option<u8>, ConfigError> {
    match value {
        v if v < 0 => Ok(None),
        v => u8::try_from(v)
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("channel value {} is above 255", v))),
    }
}
