//! Model manager: processor readiness and dispatch.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::config::ModelsConfig;
use super::types::{ModelError, ProcessorDescriptor, ProcessorStatus, RunContext};
use crate::job::{Parameters, TransformationType};
use crate::metrics;
use crate::processor::ProcessorRegistry;
use crate::storage::ImageStore;

/// Owns the processor registry and per-processor readiness.
///
/// Descriptors exist for every transformation type from construction on.
/// Registered processors start as `loading` and move to `ready` or `failed`
/// during [`initialize`](Self::initialize); the rest stay `unregistered`.
pub struct ModelManager {
    registry: ProcessorRegistry,
    image_store: Arc<dyn ImageStore>,
    descriptors: RwLock<HashMap<String, ProcessorDescriptor>>,
    device_hint: String,
    max_concurrent_loads: usize,
}

impl ModelManager {
    pub fn new(
        registry: ProcessorRegistry,
        image_store: Arc<dyn ImageStore>,
        config: &ModelsConfig,
    ) -> Self {
        let device_hint = config.resolved_device();

        let mut descriptors = HashMap::new();
        let mut names: Vec<String> = TransformationType::ALL
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        names.extend(registry.names());
        for name in names {
            let status = if registry.contains(&name) {
                ProcessorStatus::Loading
            } else {
                ProcessorStatus::Unregistered
            };
            descriptors.insert(
                name.clone(),
                ProcessorDescriptor {
                    name,
                    status,
                    device_hint: device_hint.clone(),
                    error: None,
                    loaded_at: None,
                },
            );
        }

        Self {
            registry,
            image_store,
            descriptors: RwLock::new(descriptors),
            device_hint,
            max_concurrent_loads: config.max_concurrent_loads.max(1),
        }
    }

    pub fn device_hint(&self) -> &str {
        &self.device_hint
    }

    /// Load every registered processor concurrently.
    ///
    /// Loads are independent: a failing or panicking load only marks its own
    /// descriptor `failed`. Never returns an error; query [`status`](Self::status).
    pub async fn initialize(&self) {
        let names = self.registry.names();
        info!(
            processors = names.len(),
            max_concurrent_loads = self.max_concurrent_loads,
            device = %self.device_hint,
            "Loading processors"
        );

        let semaphore = Semaphore::new(self.max_concurrent_loads);
        let semaphore = &semaphore;

        let loads = names.into_iter().map(|name| async move {
            let _permit = semaphore.acquire().await.ok();
            self.set_status(&name, ProcessorStatus::Loading, None);

            let outcome = match self.registry.lookup(&name) {
                Ok(processor) => match AssertUnwindSafe(processor.load()).catch_unwind().await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(format!("load panicked: {}", panic_message(payload))),
                },
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => {
                    debug!(processor = %name, "Processor ready");
                    metrics::PROCESSOR_LOADS
                        .with_label_values(&[name.as_str(), "ready"])
                        .inc();
                    self.set_status(&name, ProcessorStatus::Ready, None);
                }
                Err(e) => {
                    error!(processor = %name, error = %e, "Failed to load processor");
                    metrics::PROCESSOR_LOADS
                        .with_label_values(&[name.as_str(), "failed"])
                        .inc();
                    self.set_status(&name, ProcessorStatus::Failed, Some(e));
                }
            }
        });

        join_all(loads).await;

        let ready = self.ready_count();
        info!(ready, total = self.registry.len(), "Processor loading finished");
    }

    fn set_status(&self, name: &str, status: ProcessorStatus, error: Option<String>) {
        let ready = {
            let mut descriptors = self.descriptors.write().unwrap_or_else(|e| e.into_inner());
            if let Some(descriptor) = descriptors.get_mut(name) {
                descriptor.status = status;
                descriptor.error = error;
                descriptor.loaded_at = (status == ProcessorStatus::Ready).then(Utc::now);
            }
            descriptors
                .values()
                .filter(|d| d.status == ProcessorStatus::Ready)
                .count()
        };
        metrics::PROCESSORS_READY.set(ready as i64);
    }

    /// Snapshot of `{name: status}`.
    pub fn status(&self) -> BTreeMap<String, ProcessorStatus> {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, d)| (name.clone(), d.status))
            .collect()
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<ProcessorDescriptor> {
        let mut all: Vec<ProcessorDescriptor> = self
            .descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn descriptor(&self, name: &str) -> Option<ProcessorDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn ready_count(&self) -> usize {
        self.status()
            .values()
            .filter(|s| **s == ProcessorStatus::Ready)
            .count()
    }

    /// Run one job's input through the processor for `transformation_type`.
    ///
    /// Decoding, the algorithm and persisting the artifact run on the blocking
    /// pool. Returns the artifact reference.
    pub async fn dispatch(
        &self,
        job_id: &str,
        input_ref: &str,
        transformation_type: TransformationType,
        params: &Parameters,
    ) -> Result<String, ModelError> {
        self.dispatch_with(
            job_id,
            input_ref,
            transformation_type,
            params,
            RunContext::default(),
        )
        .await
    }

    /// [`dispatch`](Self::dispatch), with the blocking run owning `ctx`.
    ///
    /// The run keeps `ctx.permit` until it returns, even when the returned
    /// future is dropped. A run whose flag is cancelled leaves no artifact.
    pub async fn dispatch_with(
        &self,
        job_id: &str,
        input_ref: &str,
        transformation_type: TransformationType,
        params: &Parameters,
        ctx: RunContext,
    ) -> Result<String, ModelError> {
        let name = transformation_type.as_str();
        let status = self
            .descriptor(name)
            .map(|d| d.status)
            .unwrap_or(ProcessorStatus::Unregistered);

        if status != ProcessorStatus::Ready {
            warn!(job_id = %job_id, processor = %name, status = %status, "Dispatch to processor that is not ready");
            return Err(ModelError::ProcessorNotReady {
                name: name.to_string(),
                status,
            });
        }

        let processor = self
            .registry
            .lookup(name)
            .map_err(|_| ModelError::ProcessorNotReady {
                name: name.to_string(),
                status: ProcessorStatus::Unregistered,
            })?;

        debug!(job_id = %job_id, processor = %name, input = %input_ref, "Dispatching");

        let store = Arc::clone(&self.image_store);
        let job_id = job_id.to_string();
        let input_ref = input_ref.to_string();
        let params = params.clone();

        let handle = tokio::task::spawn_blocking(move || -> Result<String, ModelError> {
            let RunContext {
                cancel,
                permit: _permit,
            } = ctx;
            if cancel.is_cancelled() {
                return Err(ModelError::Abandoned);
            }
            let input = store
                .load(&input_ref)
                .map_err(|e| ModelError::ProcessingFailed(e.to_string()))?;
            let output = processor
                .run(input, &params)
                .map_err(|e| ModelError::ProcessingFailed(e.to_string()))?;

            if cancel.is_cancelled() {
                debug!(job_id = %job_id, "Run abandoned, artifact not written");
                return Err(ModelError::Abandoned);
            }
            let output_ref = store
                .save(&job_id, processor.output_suffix(), &output)
                .map_err(|e| ModelError::ProcessingFailed(e.to_string()))?;

            // Cancelled while saving.
            if cancel.is_cancelled() {
                if let Err(e) = store.remove(&output_ref) {
                    warn!(job_id = %job_id, output = %output_ref, error = %e, "Failed to remove abandoned artifact");
                }
                return Err(ModelError::Abandoned);
            }
            Ok(output_ref)
        });

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ModelError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(ModelError::Panicked(e.to_string())),
        }
    }
}

/// Best-effort text from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
