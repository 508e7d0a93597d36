//! Mock processor for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;

use crate::job::{Parameters, TransformationType};
use crate::processor::{Processor, ProcessorError};

/// Mock implementation of the Processor trait.
///
/// Provides controllable behavior for testing:
/// - Simulate slow processing (blocking sleep inside `run`)
/// - Simulate algorithm failures and panics
/// - Simulate load failures and panics
/// - Count invocations and the most runs seen executing at once
///
/// # Example
///
/// ```rust,ignore
/// use morphflux_core::testing::MockProcessor;
///
/// let processor = MockProcessor::new(TransformationType::StyleTransfer)
///     .with_delay(Duration::from_millis(200));
/// let calls = processor.calls();
///
/// registry.register("style_transfer", Arc::new(processor))?;
/// // ...
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug)]
pub struct MockProcessor {
    transformation_type: TransformationType,
    delay: Duration,
    run_error: Option<String>,
    run_panics: bool,
    load_error: Option<String>,
    load_panics: bool,
    calls: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Decrements the running count when a run ends, panics included.
struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockProcessor {
    /// Create a mock that returns its input unchanged.
    pub fn new(transformation_type: TransformationType) -> Self {
        Self {
            transformation_type,
            delay: Duration::ZERO,
            run_error: None,
            run_panics: false,
            load_error: None,
            load_panics: false,
            calls: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside every `run`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every `run` fail with an image error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.run_error = Some(message.into());
        self
    }

    /// Make every `run` panic.
    pub fn panicking(mut self) -> Self {
        self.run_panics = true;
        self
    }

    /// Make `load` fail with `message`.
    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Make `load` panic.
    pub fn panicking_load(mut self) -> Self {
        self.load_panics = true;
        self
    }

    /// Shared counter of `run` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared high-water mark of concurrent `run` calls.
    pub fn peak_concurrency(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }

    /// Registry key for this mock.
    pub fn transformation_type_name(&self) -> &'static str {
        self.transformation_type.as_str()
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn transformation_type(&self) -> TransformationType {
        self.transformation_type
    }

    fn output_suffix(&self) -> &'static str {
        "mock"
    }

    async fn load(&self) -> Result<(), ProcessorError> {
        if self.load_panics {
            panic!("mock load panic");
        }
        match &self.load_error {
            Some(message) => Err(ProcessorError::Load(message.clone())),
            None => Ok(()),
        }
    }

    fn run(&self, image: DynamicImage, _params: &Parameters) -> Result<DynamicImage, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let _running = Running(&self.running);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.run_panics {
            panic!("mock processor panic");
        }
        match &self.run_error {
            Some(message) => Err(ProcessorError::Image(message.clone())),
            None => Ok(image),
        }
    }
}
