//! Error types for the processor module.

use thiserror::Error;

/// Errors raised by processor registration and lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("processor already registered: {0}")]
    DuplicateProcessor(String),

    #[error("unknown processor: {0}")]
    UnknownProcessor(String),
}

/// Domain errors raised by a processor's algorithm.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProcessorError {
    /// A face-dependent algorithm found no face in the input.
    #[error("No faces detected in image")]
    NoFaceDetected,

    /// A parameter is missing, malformed or out of range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The image cannot be processed (decoding, dimensions, encoding).
    #[error("Image error: {0}")]
    Image(String),

    /// The processor failed to load its resources.
    #[error("Failed to load processor: {0}")]
    Load(String),
}

impl ProcessorError {
    /// Creates a new invalid parameter error.
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new image error.
    pub fn image(reason: impl Into<String>) -> Self {
        Self::Image(reason.into())
    }
}

impl From<image::ImageError> for ProcessorError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e.to_string())
    }
}
