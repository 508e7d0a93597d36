//! Types for the transformation orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobStatus, JobStoreError, Parameters};

/// Errors returned synchronously by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request is malformed (unknown type, unresolvable input, bad id).
    #[error("{0}")]
    Validation(String),

    /// No job with this id.
    #[error("Transformation not found: {0}")]
    NotFound(String),

    /// A job with this id was already submitted.
    #[error("Transformation already submitted: {0}")]
    Duplicate(String),

    /// Shutdown has started; no new submissions.
    #[error("service is shutting down")]
    ShuttingDown,

    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

/// A request to run one transformation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Transformation type name, validated against the closed set.
    pub transformation_type: String,
    /// Reference to the source image.
    pub input_ref: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl SubmitRequest {
    pub fn new(transformation_type: impl Into<String>, input_ref: impl Into<String>) -> Self {
        Self {
            id: None,
            transformation_type: transformation_type.into(),
            input_ref: input_ref.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Outcome of a result query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobResult {
    /// The job completed; the artifact is available.
    Ready {
        id: String,
        output_ref: String,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        processing_time_ms: Option<u64>,
    },
    /// The job has not completed (still running, or failed).
    NotReady {
        id: String,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether new submissions are accepted.
    pub accepting: bool,
    /// Jobs submitted and not yet terminal.
    pub in_flight: usize,
    /// Worker pool size.
    pub max_concurrent_jobs: usize,
    /// Workers not currently running a job.
    pub available_workers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_deserialize_defaults() {
        let request: SubmitRequest = serde_json::from_str(
            r#"{"transformation_type": "style_transfer", "input_ref": "a.png"}"#,
        )
        .unwrap();
        assert!(request.id.is_none());
        assert!(request.parameters.is_empty());
    }

    #[test]
    fn test_job_result_serialization() {
        let result = JobResult::NotReady {
            id: "j1".to_string(),
            status: JobStatus::Processing,
            error_message: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], "not_ready");
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::Duplicate("j4".to_string());
        assert_eq!(err.to_string(), "Transformation already submitted: j4");

        let err = OrchestratorError::Validation("Invalid transformation type: x".to_string());
        assert_eq!(err.to_string(), "Invalid transformation type: x");
    }
}
