//! Image source/sink: resolving input references and persisting artifacts.

mod fs;

pub use fs::FsImageStore;

use image::DynamicImage;
use thiserror::Error;

/// Errors from reading or writing images.
#[derive(Debug, Error)]
pub enum ImageStoreError {
    /// The reference does not resolve to an existing file.
    #[error("Input image not found: {0}")]
    NotFound(String),

    /// The file exists but is not a decodable image.
    #[error("failed to decode image {reference}: {reason}")]
    Decode { reference: String, reason: String },

    /// The artifact could not be written.
    #[error("failed to write image {reference}: {reason}")]
    Write { reference: String, reason: String },

    /// A job id or suffix that cannot name a file inside the output directory.
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves input references to images and stores produced artifacts.
///
/// Calls block on I/O; the model manager invokes them from blocking tasks.
pub trait ImageStore: Send + Sync {
    /// Whether `input_ref` resolves to an existing image.
    fn exists(&self, input_ref: &str) -> bool;

    /// Decode the image behind `input_ref`.
    fn load(&self, input_ref: &str) -> Result<DynamicImage, ImageStoreError>;

    /// Persist an artifact for `job_id` and return its reference.
    fn save(
        &self,
        job_id: &str,
        suffix: &str,
        image: &DynamicImage,
    ) -> Result<String, ImageStoreError>;

    /// Delete an artifact previously returned by [`save`](Self::save).
    fn remove(&self, output_ref: &str) -> Result<(), ImageStoreError>;
}
