//! Trait definitions for the processor module.

use async_trait::async_trait;
use image::DynamicImage;

use super::error::ProcessorError;
use crate::job::{Parameters, TransformationType};

/// A named image algorithm implementing one transformation type.
///
/// `run` receives exclusive ownership of the decoded input and returns the
/// produced image; intermediate buffers are dropped when it returns.
#[async_trait]
pub trait Processor: Send + Sync {
    /// The transformation this processor implements.
    fn transformation_type(&self) -> TransformationType;

    /// Suffix appended to the job id when naming the produced artifact.
    fn output_suffix(&self) -> &'static str;

    /// Prepare any resources the algorithm needs. Called once at startup.
    async fn load(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Apply the algorithm. Blocking; callers run it off the async runtime.
    fn run(&self, image: DynamicImage, params: &Parameters)
        -> Result<DynamicImage, ProcessorError>;
}
