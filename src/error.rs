//! Error types for the clear detector

use thiserror::Error;

use crate::vision::Region;

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while converting frames, evaluating detectors or loading rules
#[derive(Debug, Error)]
pub enum Error {
    /// Requested color space has no converter
    #[error("Unsupported color mode: {0}")]
    UnsupportedMode(String),

    /// Crop box is empty or lies outside the image
    #[error("Invalid region {region:?} for {width}x{height} image")]
    InvalidRegion {
        region: Region,
        width: u32,
        height: u32,
    },

    /// A placeholder detector was evaluated
    #[error("Detector not implemented: {0}")]
    NotImplemented(String),

    /// A detector was configured or fed in a way that cannot produce a result
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Live frame and reference image differ in size
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A finite capture source has no frames left
    #[error("Capture source exhausted")]
    SourceExhausted,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Screenshot payload was not valid base64
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::UnsupportedMode("CMYK".to_string());
        assert_eq!(err.to_string(), "Unsupported color mode: CMYK");

        let err = Error::InvalidRegion {
            region: Region::new(0, 0, 20, 20),
            width: 10,
            height: 10,
        };
        assert!(err.to_string().contains("10x10"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::Invalid("unknown state 'done'".to_string()).into();
        assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
        assert_eq!(err.to_string(), "Invalid value: unknown state 'done'");
    }
}
