//! Job storage trait and types.

use std::fmt;

use super::{JobStatus, NewJob, StatusTransition, TransformationJob, TransformationType};

/// Error type for job store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStoreError {
    /// Job not found.
    NotFound(String),
    /// A job with this id already exists.
    AlreadyExists(String),
    /// The requested status change would move the job backwards or out of a terminal state.
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
    /// Database error.
    Database(String),
}

impl fmt::Display for JobStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStoreError::NotFound(id) => write!(f, "Transformation not found: {}", id),
            JobStoreError::AlreadyExists(id) => {
                write!(f, "Transformation already exists: {}", id)
            }
            JobStoreError::InvalidTransition { id, from, to } => write!(
                f,
                "Cannot move transformation {} from {} to {}",
                id, from, to
            ),
            JobStoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for JobStoreError {}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Filter by transformation type.
    pub transformation_type: Option<TransformationType>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            transformation_type: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, transformation_type: TransformationType) -> Self {
        self.transformation_type = Some(transformation_type);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for job storage backends.
///
/// Implementations enforce the forward-only status machine: `update_status`
/// rejects any transition that `JobStatus::can_transition_to` does not allow.
pub trait JobStore: Send + Sync {
    /// Insert a new job in `pending` status.
    fn create(&self, job: NewJob) -> Result<TransformationJob, JobStoreError>;

    /// Insert a new job and move it to `processing` atomically.
    ///
    /// No reader ever observes the intermediate `pending` row.
    fn begin(&self, job: NewJob) -> Result<TransformationJob, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, id: &str) -> Result<Option<TransformationJob>, JobStoreError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<TransformationJob>, JobStoreError>;

    /// Count jobs matching the filter (ignores limit/offset).
    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Apply a status transition.
    fn update_status(
        &self,
        id: &str,
        transition: StatusTransition,
    ) -> Result<TransformationJob, JobStoreError>;
}
