//! Transformation orchestrator implementation.
//!
//! Drives jobs through the status machine:
//! - Submission: validate, persist as `processing`, hand off to the pool
//! - Execution: bounded by a worker semaphore and a per-job timeout
//! - Shutdown: drain with a grace period, then fail what is left

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{Notify, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::job::{
    FailureKind, JobFilter, JobStatus, JobStore, JobStoreError, NewJob, StatusTransition,
    TransformationJob, TransformationType,
};
use crate::metrics;
use crate::models::{panic_message, CancelFlag, ModelManager, RunContext};
use crate::storage::ImageStore;

use super::config::OrchestratorConfig;
use super::types::{JobResult, OrchestratorError, OrchestratorStatus, SubmitRequest};

/// Longest caller-supplied transformation id.
const MAX_ID_LEN: usize = 128;

/// A job that is accepted and not yet terminal.
#[derive(Clone)]
struct Slot {
    /// Set once the task is spawned.
    abort: Option<AbortHandle>,
    cancel: CancelFlag,
}

type InFlight = Arc<Mutex<HashMap<String, Slot>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, Slot>> {
    in_flight.lock().unwrap_or_else(|e| e.into_inner())
}

/// Ids name artifacts on disk, so they are limited to `[A-Za-z0-9_-]{1,128}`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Releases a job's in-flight slot when its task ends, including on abort.
struct InFlightGuard {
    id: String,
    in_flight: InFlight,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let empty = {
            let mut jobs = lock(&self.in_flight);
            jobs.remove(&self.id);
            jobs.is_empty()
        };
        metrics::JOBS_IN_FLIGHT.dec();
        if empty {
            self.idle.notify_waiters();
        }
    }
}

/// Everything a spawned job task needs.
#[derive(Clone)]
struct Worker {
    store: Arc<dyn JobStore>,
    models: Arc<ModelManager>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
}

impl Worker {
    async fn execute(self, job: TransformationJob, cancel: CancelFlag) {
        let id = job.id.clone();
        let transformation_type = job.transformation_type;
        let started_at = job.started_at.unwrap_or(job.created_at);

        let body = AssertUnwindSafe(self.clone().dispatch(job, cancel)).catch_unwind();
        let transition = match body.await {
            Ok(transition) => transition,
            Err(payload) => {
                let message = panic_message(payload);
                error!(job_id = %id, error = %message, "Transformation task panicked");
                failed(
                    format!("Unexpected error: {}", message),
                    FailureKind::Unexpected,
                    started_at,
                )
            }
        };

        record(&*self.store, &id, transformation_type, started_at, transition);
    }

    async fn dispatch(self, job: TransformationJob, cancel: CancelFlag) -> StatusTransition {
        let started_at = job.started_at.unwrap_or(job.created_at);

        // Only fails if the semaphore is closed, which never happens.
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok();
        debug!(job_id = %job.id, "Worker acquired");

        // The permit moves into the blocking run and is released when the
        // processor returns, not when we stop waiting for it.
        let run = self.models.dispatch_with(
            &job.id,
            &job.input_ref,
            job.transformation_type,
            &job.parameters,
            RunContext::new(cancel.clone(), permit),
        );

        match tokio::time::timeout(self.job_timeout, run).await {
            Ok(Ok(output_ref)) => {
                let completed_at = completion_time(started_at);
                StatusTransition::Completed {
                    output_ref,
                    completed_at,
                    processing_time_ms: elapsed_ms(started_at, completed_at),
                }
            }
            Ok(Err(e)) => failed(e.to_string(), e.kind(), started_at),
            Err(_) => {
                cancel.cancel();
                failed(
                    format!(
                        "Processing timed out after {} seconds",
                        self.job_timeout.as_secs_f64()
                    ),
                    FailureKind::Timeout,
                    started_at,
                )
            }
        }
    }
}

fn completion_time(started_at: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(started_at)
}

fn elapsed_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> u64 {
    (completed_at - started_at).num_milliseconds().max(0) as u64
}

fn failed(error: String, kind: FailureKind, started_at: DateTime<Utc>) -> StatusTransition {
    let completed_at = completion_time(started_at);
    StatusTransition::Failed {
        error,
        kind,
        completed_at,
        processing_time_ms: Some(elapsed_ms(started_at, completed_at)),
    }
}

/// Persist a terminal transition, logging and counting the outcome.
fn record(
    store: &dyn JobStore,
    id: &str,
    transformation_type: TransformationType,
    started_at: DateTime<Utc>,
    transition: StatusTransition,
) {
    let outcome = match &transition {
        StatusTransition::Failed { kind, .. } => kind.as_str(),
        _ => "completed",
    };

    match store.update_status(id, transition) {
        Ok(job) => {
            let elapsed = job.processing_time_ms.unwrap_or(0);
            match job.status {
                JobStatus::Completed => info!(
                    job_id = %id,
                    transformation_type = %transformation_type,
                    processing_time_ms = elapsed,
                    "Transformation completed"
                ),
                _ => warn!(
                    job_id = %id,
                    transformation_type = %transformation_type,
                    processing_time_ms = elapsed,
                    failure_kind = outcome,
                    error = job.error_message.as_deref().unwrap_or_default(),
                    "Transformation failed"
                ),
            }
            metrics::JOBS_FINISHED
                .with_label_values(&[transformation_type.as_str(), outcome])
                .inc();
            let secs = job
                .completed_at
                .map(|done| (done - started_at).num_milliseconds().max(0) as f64 / 1000.0)
                .unwrap_or(0.0);
            metrics::PROCESSING_DURATION
                .with_label_values(&[transformation_type.as_str()])
                .observe(secs);
        }
        Err(JobStoreError::InvalidTransition { from, .. }) => {
            // Already failed by shutdown.
            debug!(job_id = %id, status = %from, "Job already terminal, outcome discarded");
        }
        Err(e) => {
            error!(job_id = %id, error = %e, "Failed to record job outcome");
        }
    }
}

/// Validates submissions, drives the job status machine, and schedules work
/// on a bounded worker pool.
pub struct TransformationOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn JobStore>,
    image_store: Arc<dyn ImageStore>,
    worker: Worker,
    in_flight: InFlight,
    accepting: AtomicBool,
    idle: Arc<Notify>,
}

impl TransformationOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JobStore>,
        models: Arc<ModelManager>,
        image_store: Arc<dyn ImageStore>,
    ) -> Self {
        let worker = Worker {
            store: Arc::clone(&store),
            models,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            job_timeout: config.job_timeout(),
        };

        Self {
            config,
            store,
            image_store,
            worker,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            accepting: AtomicBool::new(true),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn models(&self) -> &Arc<ModelManager> {
        &self.worker.models
    }

    /// Validate and accept a job, returning it in `processing` status.
    ///
    /// The job is persisted as `processing` before its task is spawned, and the
    /// call returns without waiting for the processor.
    pub async fn submit(
        &self,
        request: SubmitRequest,
    ) -> Result<TransformationJob, OrchestratorError> {
        if !self.is_accepting() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let transformation_type: TransformationType = request
            .transformation_type
            .parse()
            .map_err(|e: crate::job::UnknownTransformationType| {
                OrchestratorError::Validation(e.to_string())
            })?;

        if !self.image_store.exists(&request.input_ref) {
            return Err(OrchestratorError::Validation(format!(
                "Input image not found: {}",
                request.input_ref
            )));
        }

        let id = match request.id {
            Some(id) if !is_valid_id(&id) => {
                return Err(OrchestratorError::Validation(format!(
                    "Invalid transformation id: {:?} (expected 1-{} characters from [A-Za-z0-9_-])",
                    id, MAX_ID_LEN
                )));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        let cancel = CancelFlag::new();

        // Reserve the id. Checking `accepting` under the lock means shutdown
        // sees every reservation that succeeds.
        {
            let mut jobs = lock(&self.in_flight);
            if !self.is_accepting() {
                return Err(OrchestratorError::ShuttingDown);
            }
            if jobs.contains_key(&id) {
                return Err(OrchestratorError::Duplicate(id));
            }
            jobs.insert(
                id.clone(),
                Slot {
                    abort: None,
                    cancel: cancel.clone(),
                },
            );
        }
        metrics::JOBS_IN_FLIGHT.inc();

        let guard = InFlightGuard {
            id: id.clone(),
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };

        let job = match self.store.begin(NewJob {
            id: id.clone(),
            transformation_type,
            input_ref: request.input_ref,
            parameters: request.parameters,
        }) {
            Ok(job) => job,
            Err(JobStoreError::AlreadyExists(id)) => {
                drop(guard);
                return Err(OrchestratorError::Duplicate(id));
            }
            Err(e) => {
                drop(guard);
                return Err(e.into());
            }
        };

        metrics::JOBS_SUBMITTED
            .with_label_values(&[transformation_type.as_str()])
            .inc();
        info!(
            job_id = %id,
            transformation_type = %transformation_type,
            "Transformation accepted"
        );

        let worker = self.worker.clone();
        let task_job = job.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            worker.execute(task_job, cancel).await;
        });

        // The task may already have finished and released its slot.
        if let Some(slot) = lock(&self.in_flight).get_mut(&id) {
            slot.abort = Some(handle.abort_handle());
        }

        Ok(job)
    }

    /// Current persisted projection of a job.
    pub fn get_status(&self, id: &str) -> Result<TransformationJob, OrchestratorError> {
        self.store
            .get(id)?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    /// The artifact of a completed job, or a not-ready indicator.
    pub fn get_result(&self, id: &str) -> Result<JobResult, OrchestratorError> {
        let job = self.get_status(id)?;
        match (job.status, job.output_ref) {
            (JobStatus::Completed, Some(output_ref)) => Ok(JobResult::Ready {
                id: job.id,
                output_ref,
                started_at: job.started_at,
                completed_at: job.completed_at,
                processing_time_ms: job.processing_time_ms,
            }),
            (status, _) => Ok(JobResult::NotReady {
                id: job.id,
                status,
                error_message: job.error_message,
            }),
        }
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<TransformationJob>, OrchestratorError> {
        Ok(self.store.list(filter)?)
    }

    pub fn count(&self, filter: &JobFilter) -> Result<i64, OrchestratorError> {
        Ok(self.store.count(filter)?)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            accepting: self.is_accepting(),
            in_flight: self.in_flight_count(),
            max_concurrent_jobs: self.config.max_concurrent_jobs.max(1),
            available_workers: self.worker.permits.available_permits(),
        }
    }

    /// Fail every `pending`/`processing` record left behind by a previous process.
    ///
    /// Call once at startup, before accepting submissions.
    pub fn recover_interrupted(&self) -> Result<usize, OrchestratorError> {
        let mut recovered = 0;

        for status in [JobStatus::Pending, JobStatus::Processing] {
            let mut skipped = 0;
            loop {
                let filter = JobFilter::new()
                    .with_status(status)
                    .with_limit(100)
                    .with_offset(skipped);
                let batch = self.store.list(&filter)?;
                if batch.is_empty() {
                    break;
                }

                for job in batch {
                    if lock(&self.in_flight).contains_key(&job.id) {
                        skipped += 1;
                        continue;
                    }
                    let transition = StatusTransition::Failed {
                        error: "Interrupted by service restart".to_string(),
                        kind: FailureKind::Shutdown,
                        completed_at: Utc::now().max(job.started_at.unwrap_or(job.created_at)),
                        processing_time_ms: None,
                    };
                    match self.store.update_status(&job.id, transition) {
                        Ok(_) => {
                            info!(job_id = %job.id, previous = %status, "Recovered interrupted job");
                            recovered += 1;
                        }
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "Failed to recover interrupted job");
                            skipped += 1;
                        }
                    }
                }
            }
        }

        if recovered > 0 {
            info!(recovered, "Marked interrupted jobs as failed");
        }
        Ok(recovered)
    }

    /// Stop accepting work, wait up to `grace` for in-flight jobs, then abort
    /// the rest and mark them failed. Returns how many jobs were aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        {
            let _jobs = lock(&self.in_flight);
            self.accepting.store(false, Ordering::SeqCst);
        }
        info!(
            in_flight = self.in_flight_count(),
            grace_secs = grace.as_secs(),
            "Shutting down transformation orchestrator"
        );

        let deadline = Instant::now() + grace;
        loop {
            let notified = self.idle.notified();
            if self.in_flight_count() == 0 {
                info!("All transformations finished");
                return 0;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            // Bounded wait in case a notification lands between the check and here.
            let wait = (deadline - now).min(Duration::from_millis(100));
            let _ = tokio::time::timeout(wait, notified).await;
        }

        let remaining: Vec<(String, Slot)> = lock(&self.in_flight)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        for (id, slot) in &remaining {
            // A blocking run outlives the abort; the flag keeps it from saving.
            slot.cancel.cancel();
            if let Some(handle) = &slot.abort {
                handle.abort();
            }
            let job = match self.store.get(id) {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    error!(job_id = %id, error = %e, "Failed to load job during shutdown");
                    continue;
                }
            };
            let started_at = job.started_at.unwrap_or(job.created_at);
            let transition = failed(
                "Interrupted by service shutdown".to_string(),
                FailureKind::Shutdown,
                started_at,
            );
            record(
                &*self.store,
                id,
                job.transformation_type,
                started_at,
                transition,
            );
        }

        warn!(aborted = remaining.len(), "Aborted unfinished transformations");
        remaining.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SqliteJobStore;
    use crate::models::ModelsConfig;
    use crate::processor::ProcessorRegistry;
    use crate::storage::FsImageStore;
    use crate::testing::{fixtures, MockProcessor};

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<SqliteJobStore>,
        orchestrator: TransformationOrchestrator,
    }

    async fn fixture(processor: MockProcessor, config: OrchestratorConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_valid_png(&dir.path().join("valid.png"));

        let images: Arc<dyn ImageStore> = Arc::new(
            FsImageStore::new(Some(dir.path().to_path_buf()), dir.path().join("outputs")).unwrap(),
        );
        let mut registry = ProcessorRegistry::new();
        registry
            .register(processor.transformation_type_name(), Arc::new(processor))
            .unwrap();
        let models = Arc::new(ModelManager::new(
            registry,
            Arc::clone(&images),
            &ModelsConfig::default(),
        ));
        models.initialize().await;

        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let orchestrator = TransformationOrchestrator::new(
            config,
            store.clone() as Arc<dyn JobStore>,
            models,
            images,
        );

        Fixture {
            _dir: dir,
            store,
            orchestrator,
        }
    }

    async fn wait_terminal(orchestrator: &TransformationOrchestrator, id: &str) -> TransformationJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = orchestrator.get_status(id).unwrap();
            if job.is_terminal() {
                return job;
            }
            assert!(Instant::now() < deadline, "job {} never finished", id);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn request(id: &str) -> SubmitRequest {
        SubmitRequest::new("style_transfer", "valid.png").with_id(id)
    }

    #[tokio::test]
    async fn test_submit_returns_processing_then_completes() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer)
                .with_delay(Duration::from_millis(100)),
            OrchestratorConfig::default(),
        )
        .await;

        let job = f.orchestrator.submit(request("a")).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(
            f.orchestrator.get_status("a").unwrap().status,
            JobStatus::Processing
        );

        let done = wait_terminal(&f.orchestrator, "a").await;
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.output_ref.is_some());
        assert!(done.completed_at.unwrap() >= done.started_at.unwrap());
        assert_eq!(f.orchestrator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_generated_id_when_absent() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer),
            OrchestratorConfig::default(),
        )
        .await;

        let job = f
            .orchestrator
            .submit(SubmitRequest::new("style_transfer", "valid.png"))
            .await
            .unwrap();
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
    }

    #[tokio::test]
    async fn test_missing_input_is_validation_error() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer),
            OrchestratorConfig::default(),
        )
        .await;

        let err = f
            .orchestrator
            .submit(SubmitRequest::new("style_transfer", "missing.png").with_id("m"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Input image not found: missing.png");
        assert!(f.store.get("m").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_outside_allowed_charset_rejected() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer),
            OrchestratorConfig::default(),
        )
        .await;

        let too_long = "x".repeat(MAX_ID_LEN + 1);
        for id in ["  ", "", "../escaped", "a/b", "a\\b", "..", "id.png", too_long.as_str()] {
            let err = f.orchestrator.submit(request(id)).await.unwrap_err();
            assert!(matches!(err, OrchestratorError::Validation(_)), "{id:?}");
            assert!(f.store.get(id).unwrap().is_none());
        }
        assert_eq!(f.orchestrator.in_flight_count(), 0);
        assert!(!f._dir.path().join("escaped_mock.png").exists());

        let longest = "A-z_9".repeat(MAX_ID_LEN / 5) + "abc";
        assert_eq!(longest.len(), MAX_ID_LEN);
        f.orchestrator.submit(request(&longest)).await.unwrap();
        assert_eq!(
            wait_terminal(&f.orchestrator, &longest).await.status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_terminal_id_resubmission_is_duplicate() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer),
            OrchestratorConfig::default(),
        )
        .await;

        f.orchestrator.submit(request("a")).await.unwrap();
        wait_terminal(&f.orchestrator, "a").await;

        let err = f.orchestrator.submit(request("a")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Duplicate(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_timeout_fails_job_with_timeout_kind() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer)
                .with_delay(Duration::from_millis(1500)),
            OrchestratorConfig::default().with_job_timeout_secs(1),
        )
        .await;

        f.orchestrator.submit(request("slow")).await.unwrap();
        let job = wait_terminal(&f.orchestrator, "slow").await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Timeout));
        assert!(job.error_message.unwrap().contains("timed out"));
        assert!(job.output_ref.is_none());
    }

    #[tokio::test]
    async fn test_timed_out_run_keeps_its_worker_and_writes_nothing() {
        let processor = MockProcessor::new(TransformationType::StyleTransfer)
            .with_delay(Duration::from_millis(2500));
        let peak = processor.peak_concurrency();
        let f = fixture(
            processor,
            OrchestratorConfig::default()
                .with_max_concurrent_jobs(1)
                .with_job_timeout_secs(1),
        )
        .await;

        for id in ["a", "b", "c"] {
            f.orchestrator.submit(request(id)).await.unwrap();
        }

        let a = wait_terminal(&f.orchestrator, "a").await;
        assert_eq!(a.failure_kind, Some(FailureKind::Timeout));
        // `a` is still running on the blocking pool, so `b` must not start yet.
        assert_eq!(f.orchestrator.status().available_workers, 0);
        assert_eq!(
            f.orchestrator.get_status("b").unwrap().status,
            JobStatus::Processing
        );

        for id in ["b", "c"] {
            assert_eq!(
                wait_terminal(&f.orchestrator, id).await.failure_kind,
                Some(FailureKind::Timeout)
            );
        }

        // Let the last abandoned run return.
        let deadline = Instant::now() + Duration::from_secs(5);
        while f.orchestrator.status().available_workers == 0 {
            assert!(Instant::now() < deadline, "worker never released");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let outputs = f._dir.path().join("outputs");
        for id in ["a", "b", "c"] {
            assert!(!outputs.join(format!("{}_mock.png", id)).exists());
        }
    }

    #[tokio::test]
    async fn test_panicking_processor_fails_job() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer).panicking(),
            OrchestratorConfig::default(),
        )
        .await;

        f.orchestrator.submit(request("p")).await.unwrap();
        let job = wait_terminal(&f.orchestrator, "p").await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Unexpected));

        // The pool survives.
        f.orchestrator.submit(request("q")).await.unwrap();
        assert_eq!(
            wait_terminal(&f.orchestrator, "q").await.failure_kind,
            Some(FailureKind::Unexpected)
        );
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let processor = MockProcessor::new(TransformationType::StyleTransfer)
            .with_delay(Duration::from_millis(300));
        let f = fixture(
            processor,
            OrchestratorConfig::default().with_max_concurrent_jobs(1),
        )
        .await;

        f.orchestrator.submit(request("a")).await.unwrap();
        f.orchestrator.submit(request("b")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = f.orchestrator.status();
        assert_eq!(status.in_flight, 2);
        assert_eq!(status.available_workers, 0);

        wait_terminal(&f.orchestrator, "a").await;
        wait_terminal(&f.orchestrator, "b").await;
        assert_eq!(f.orchestrator.status().available_workers, 1);
    }

    #[tokio::test]
    async fn test_get_result_not_ready_then_ready() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer)
                .with_delay(Duration::from_millis(200)),
            OrchestratorConfig::default(),
        )
        .await;

        f.orchestrator.submit(request("r")).await.unwrap();
        assert!(matches!(
            f.orchestrator.get_result("r").unwrap(),
            JobResult::NotReady {
                status: JobStatus::Processing,
                ..
            }
        ));

        wait_terminal(&f.orchestrator, "r").await;
        assert!(matches!(
            f.orchestrator.get_result("r").unwrap(),
            JobResult::Ready { .. }
        ));

        assert!(matches!(
            f.orchestrator.get_result("nope"),
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_short_jobs() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer)
                .with_delay(Duration::from_millis(100)),
            OrchestratorConfig::default(),
        )
        .await;

        f.orchestrator.submit(request("a")).await.unwrap();
        let aborted = f.orchestrator.shutdown(Duration::from_secs(5)).await;

        assert_eq!(aborted, 0);
        assert_eq!(
            f.orchestrator.get_status("a").unwrap().status,
            JobStatus::Completed
        );
        assert!(matches!(
            f.orchestrator.submit(request("b")).await,
            Err(OrchestratorError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_fails_stragglers() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer)
                .with_delay(Duration::from_millis(1000)),
            OrchestratorConfig::default(),
        )
        .await;

        f.orchestrator.submit(request("slow")).await.unwrap();
        let aborted = f.orchestrator.shutdown(Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);

        let job = f.orchestrator.get_status("slow").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Shutdown));

        // The blocking run finishing later must not change the terminal record.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(
            f.orchestrator.get_status("slow").unwrap().status,
            JobStatus::Failed
        );
        assert!(!f._dir.path().join("outputs").join("slow_mock.png").exists());
    }

    #[tokio::test]
    async fn test_recover_interrupted() {
        let f = fixture(
            MockProcessor::new(TransformationType::StyleTransfer),
            OrchestratorConfig::default(),
        )
        .await;

        let leftover = |id: &str| NewJob {
            id: id.to_string(),
            transformation_type: TransformationType::StyleTransfer,
            input_ref: "valid.png".to_string(),
            parameters: Default::default(),
        };
        f.store.create(leftover("pending-1")).unwrap();
        f.store.begin(leftover("processing-1")).unwrap();

        let recovered = f.orchestrator.recover_interrupted().unwrap();
        assert_eq!(recovered, 2);

        for id in ["pending-1", "processing-1"] {
            let job = f.orchestrator.get_status(id).unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.failure_kind, Some(FailureKind::Shutdown));
        }
        assert_eq!(f.orchestrator.recover_interrupted().unwrap(), 0);
    }
}
