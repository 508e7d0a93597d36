//! Filesystem-backed image store.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use super::{ImageStore, ImageStoreError};

/// Reads inputs from the local filesystem and writes PNG artifacts into a
/// single output directory.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    input_dir: Option<PathBuf>,
    output_dir: PathBuf,
}

impl FsImageStore {
    /// Create a store, creating `output_dir` if needed.
    pub fn new(
        input_dir: Option<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ImageStoreError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            input_dir,
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Relative references resolve against `input_dir` when one is configured.
    pub fn resolve(&self, input_ref: &str) -> PathBuf {
        let path = Path::new(input_ref);
        match &self.input_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Artifact path for a job: `<output_dir>/<job_id>_<suffix>.png`.
    ///
    /// Both parts must stay a plain file name: no separators, no `..`.
    pub fn output_path(&self, job_id: &str, suffix: &str) -> Result<PathBuf, ImageStoreError> {
        for part in [job_id, suffix] {
            if part.is_empty() || part.contains(['/', '\\']) || part.contains("..") {
                return Err(ImageStoreError::InvalidName(part.to_string()));
            }
        }
        Ok(self.output_dir.join(format!("{}_{}.png", job_id, suffix)))
    }
}

impl ImageStore for FsImageStore {
    fn exists(&self, input_ref: &str) -> bool {
        self.resolve(input_ref).is_file()
    }

    fn load(&self, input_ref: &str) -> Result<DynamicImage, ImageStoreError> {
        let path = self.resolve(input_ref);
        if !path.is_file() {
            return Err(ImageStoreError::NotFound(input_ref.to_string()));
        }

        image::ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| ImageStoreError::Decode {
                reference: input_ref.to_string(),
                reason: e.to_string(),
            })
    }

    fn save(
        &self,
        job_id: &str,
        suffix: &str,
        image: &DynamicImage,
    ) -> Result<String, ImageStoreError> {
        let path = self.output_path(job_id, suffix)?;
        let reference = path.to_string_lossy().into_owned();

        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ImageStoreError::Write {
                reference: reference.clone(),
                reason: e.to_string(),
            })?;

        debug!(job_id = %job_id, output = %reference, "Saved artifact");
        Ok(reference)
    }

    fn remove(&self, output_ref: &str) -> Result<(), ImageStoreError> {
        let path = Path::new(output_ref);
        if path.parent() != Some(self.output_dir.as_path()) {
            return Err(ImageStoreError::InvalidName(output_ref.to_string()));
        }
        std::fs::remove_file(path)?;
        debug!(output = %output_ref, "Removed artifact");
        Ok(())
    }
}
