//! Transformation API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use morphflux_core::job::UnknownTransformationType;
use morphflux_core::{
    FailureKind, JobFilter, JobResult, JobStatus, JobStoreError, OrchestratorError, Parameters,
    SubmitRequest, TransformationJob, TransformationType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Maximum allowed limit for transformation queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for transformation queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a transformation
#[derive(Debug, Deserialize)]
pub struct ProcessBody {
    /// Caller-chosen id; generated when absent
    pub transformation_id: Option<String>,
    pub transformation_type: String,
    /// Reference to the source image
    #[serde(alias = "input_ref")]
    pub input_image_path: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub transformation_id: String,
    pub status: JobStatus,
}

/// Query parameters for listing transformations
#[derive(Debug, Deserialize)]
pub struct ListTransformationsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Filter by transformation type
    #[serde(rename = "type")]
    pub transformation_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Status projection of a transformation
#[derive(Debug, Serialize)]
pub struct TransformationResponse {
    pub transformation_id: String,
    pub status: JobStatus,
    #[serde(rename = "type")]
    pub transformation_type: TransformationType,
    pub input_ref: String,
    pub parameters: Parameters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
    pub output_ref: Option<String>,
    pub error_message: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl From<TransformationJob> for TransformationResponse {
    fn from(job: TransformationJob) -> Self {
        Self {
            transformation_id: job.id,
            status: job.status,
            transformation_type: job.transformation_type,
            input_ref: job.input_ref,
            parameters: job.parameters,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            processing_time_ms: job.processing_time_ms,
            output_ref: job.output_ref,
            error_message: job.error_message,
            failure_kind: job.failure_kind,
        }
    }
}

/// Response for listing transformations
#[derive(Debug, Serialize)]
pub struct ListTransformationsResponse {
    pub transformations: Vec<TransformationResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Result of a transformation, or why it is not available
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResultResponse {
    Ready {
        transformation_id: String,
        status: JobStatus,
        output_ref: String,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        processing_time_ms: Option<u64>,
    },
    NotReady {
        transformation_id: String,
        status: JobStatus,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

impl From<JobResult> for ResultResponse {
    fn from(result: JobResult) -> Self {
        match result {
            JobResult::Ready {
                id,
                output_ref,
                started_at,
                completed_at,
                processing_time_ms,
            } => ResultResponse::Ready {
                transformation_id: id,
                status: JobStatus::Completed,
                output_ref,
                started_at,
                completed_at,
                processing_time_ms,
            },
            JobResult::NotReady {
                id,
                status,
                error_message,
            } => ResultResponse::NotReady {
                transformation_id: id,
                status,
                message: "Transformation not completed yet".to_string(),
                error_message,
            },
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TransformationErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TransformationErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(TransformationErrorResponse {
            error: error.into(),
        }),
    )
}

fn status_for(error: &OrchestratorError) -> StatusCode {
    match error {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) | OrchestratorError::Store(JobStoreError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::Duplicate(_) => StatusCode::CONFLICT,
        OrchestratorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<OrchestratorError> for TransformationErrorResponse {
    fn from(error: OrchestratorError) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

fn orchestrator_error(error: OrchestratorError) -> ApiError {
    (status_for(&error), Json(error.into()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a transformation for asynchronous processing
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessBody>,
) -> Result<(StatusCode, Json<ProcessResponse>), ApiError> {
    let mut request = SubmitRequest::new(body.transformation_type, body.input_image_path)
        .with_parameters(body.parameters);
    if let Some(id) = body.transformation_id {
        request = request.with_id(id);
    }

    let job = state
        .orchestrator()
        .submit(request)
        .await
        .map_err(orchestrator_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            transformation_id: job.id,
            status: job.status,
        }),
    ))
}

/// Get the status projection of a transformation
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TransformationResponse>, ApiError> {
    state
        .orchestrator()
        .get_status(&id)
        .map(|job| Json(job.into()))
        .map_err(orchestrator_error)
}

/// Get the result of a transformation
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    state
        .orchestrator()
        .get_result(&id)
        .map(|result| Json(result.into()))
        .map_err(orchestrator_error)
}

/// List transformations with optional filters
pub async fn list_transformations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTransformationsParams>,
) -> Result<Json<ListTransformationsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        let status: JobStatus = status
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    if let Some(ref transformation_type) = params.transformation_type {
        let transformation_type: TransformationType = transformation_type
            .parse()
            .map_err(|e: UnknownTransformationType| {
                api_error(StatusCode::BAD_REQUEST, e.to_string())
            })?;
        filter = filter.with_type(transformation_type);
    }

    let orchestrator = state.orchestrator();
    let transformations = orchestrator.list(&filter).map_err(orchestrator_error)?;
    let total = orchestrator.count(&filter).map_err(orchestrator_error)?;

    Ok(Json(ListTransformationsResponse {
        transformations: transformations.into_iter().map(Into::into).collect(),
        total,
        limit,
        offset,
    }))
}
