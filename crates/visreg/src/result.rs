//! Result and error types for visreg.

use thiserror::Error;

/// Result type for visreg operations
pub type VisregResult<T> = Result<T, VisregError>;

/// Errors that can occur while capturing, normalizing or comparing images
#[derive(Debug, Error)]
pub enum VisregError {
    /// No offset table covers the platform/version. Non-fatal: the resolver
    /// falls back to a zero-offset desktop profile.
    #[error("Unsupported device profile: {platform} {version}")]
    UnsupportedProfile {
        /// Platform name
        platform: String,
        /// OS version as reported
        version: String,
    },

    /// The capture primitive failed
    #[error("Capture failed: {message}")]
    CaptureFailure {
        /// Error message
        message: String,
    },

    /// An image buffer could not be decoded
    #[error("Failed to decode {what} image: {message}")]
    DecodeFailure {
        /// Which buffer failed (actual, baseline, capture)
        what: String,
        /// Error message
        message: String,
    },

    /// The isolated cluster worker crashed or went away without answering
    #[error("Diff cluster worker failed: {message}")]
    ClusterWorkerFailure {
        /// Error message
        message: String,
    },

    /// An artifact could not be written
    #[error("Failed to persist {artifact}: {message}")]
    PersistFailure {
        /// Artifact kind (baseline, actual, diff, report)
        artifact: String,
        /// Error message
        message: String,
    },

    /// No baseline exists and auto-save is disabled
    #[error("Baseline not found: {name}")]
    BaselineMissing {
        /// Baseline name
        name: String,
    },

    /// Image processing error (cropping, scaling, encoding)
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// Configuration could not be parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisregError {
    /// Create a capture failure
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailure {
            message: message.into(),
        }
    }

    /// Create a decode failure for the named buffer
    #[must_use]
    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a cluster worker failure
    #[must_use]
    pub fn cluster_worker(message: impl Into<String>) -> Self {
        Self::ClusterWorkerFailure {
            message: message.into(),
        }
    }

    /// Create a persist failure
    #[must_use]
    pub fn persist(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PersistFailure {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Create an image processing error
    #[must_use]
    pub fn image_processing(message: impl Into<String>) -> Self {
        Self::ImageProcessing {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error must abort the comparison in flight
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedProfile { .. } | Self::PersistFailure { .. }
        )
    }
}
