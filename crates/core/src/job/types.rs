//! Core transformation job data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque processor parameters, interpreted only by the matching processor.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Returned when a string does not name a known transformation type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid transformation type: {0}")]
pub struct UnknownTransformationType(pub String);

/// The closed set of transformations the service accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    BackgroundRemoval,
    StyleTransfer,
    AgeProgression,
    FaceEnhancement,
    ObjectRemoval,
    BackgroundReplacement,
}

impl TransformationType {
    /// Every member of the enumeration, in registration order.
    pub const ALL: [TransformationType; 6] = [
        TransformationType::BackgroundRemoval,
        TransformationType::StyleTransfer,
        TransformationType::AgeProgression,
        TransformationType::FaceEnhancement,
        TransformationType::ObjectRemoval,
        TransformationType::BackgroundReplacement,
    ];

    /// Wire name of the type (also the processor registry key).
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationType::BackgroundRemoval => "background_removal",
            TransformationType::StyleTransfer => "style_transfer",
            TransformationType::AgeProgression => "age_progression",
            TransformationType::FaceEnhancement => "face_enhancement",
            TransformationType::ObjectRemoval => "object_removal",
            TransformationType::BackgroundReplacement => "background_replacement",
        }
    }

    /// Whether the transformation needs at least one detected face.
    pub fn requires_face(&self) -> bool {
        matches!(
            self,
            TransformationType::AgeProgression | TransformationType::FaceEnhancement
        )
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationType {
    type Err = UnknownTransformationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTransformationType(s.to_string()))
    }
}

/// Lifecycle status of a transformation job.
///
/// State machine flow:
/// ```text
/// Pending -> Processing -> Completed
///                      \-> Failed
/// ```
/// `Pending` may also move straight to `Failed` when a job is abandoned
/// before it started (restart recovery). Terminal states never change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true if a job in this status may move to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Returns the status as a string (for filtering and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Why a job ended up `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The target processor was not loaded (or failed to load).
    ProcessorNotReady,
    /// The algorithm rejected the input (no face, malformed image, ...).
    ProcessingFailed,
    /// The processor exceeded the per-job time budget.
    Timeout,
    /// The service stopped before the job could finish.
    Shutdown,
    /// Anything else, including panics inside the worker.
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProcessorNotReady => "processor_not_ready",
            FailureKind::ProcessingFailed => "processing_failed",
            FailureKind::Timeout => "timeout",
            FailureKind::Shutdown => "shutdown",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processor_not_ready" => Ok(FailureKind::ProcessorNotReady),
            "processing_failed" => Ok(FailureKind::ProcessingFailed),
            "timeout" => Ok(FailureKind::Timeout),
            "shutdown" => Ok(FailureKind::Shutdown),
            "unexpected" => Ok(FailureKind::Unexpected),
            other => Err(format!("unknown failure kind: {}", other)),
        }
    }
}

/// A transformation job as persisted by the job store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformationJob {
    /// Unique identifier, immutable once created.
    pub id: String,

    /// Which transformation to apply.
    pub transformation_type: TransformationType,

    /// Processor-specific parameters.
    pub parameters: Parameters,

    /// Reference to the source image.
    pub input_ref: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Produced artifact; present iff status is `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,

    /// Failure diagnostic; present iff status is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Failure classification; present iff status is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl TransformationJob {
    /// Build a fresh `pending` job from a creation request.
    pub fn from_new(job: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: job.id,
            transformation_type: job.transformation_type,
            parameters: job.parameters,
            input_ref: job.input_ref,
            status: JobStatus::Pending,
            output_ref: None,
            error_message: None,
            failure_kind: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition in memory. Callers check `can_transition_to` first.
    pub fn apply(&mut self, transition: StatusTransition, now: DateTime<Utc>) {
        self.status = transition.target_status();
        self.updated_at = now;
        match transition {
            StatusTransition::Processing { started_at } => {
                self.started_at = Some(started_at);
            }
            StatusTransition::Completed {
                output_ref,
                completed_at,
                processing_time_ms,
            } => {
                self.output_ref = Some(output_ref);
                self.completed_at = Some(completed_at);
                self.processing_time_ms = Some(processing_time_ms);
            }
            StatusTransition::Failed {
                error,
                kind,
                completed_at,
                processing_time_ms,
            } => {
                self.error_message = Some(error);
                self.failure_kind = Some(kind);
                self.completed_at = Some(completed_at);
                self.processing_time_ms = processing_time_ms;
            }
        }
    }
}

/// Request to create a job record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: String,
    pub transformation_type: TransformationType,
    pub input_ref: String,
    pub parameters: Parameters,
}

/// A status change together with the fields that change with it.
///
/// Each variant carries exactly the data its target status requires, so a
/// completed job always has an output and a failed job always has an error.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusTransition {
    Processing {
        started_at: DateTime<Utc>,
    },
    Completed {
        output_ref: String,
        completed_at: DateTime<Utc>,
        processing_time_ms: u64,
    },
    Failed {
        error: String,
        kind: FailureKind,
        completed_at: DateTime<Utc>,
        processing_time_ms: Option<u64>,
    },
}

impl StatusTransition {
    pub fn target_status(&self) -> JobStatus {
        match self {
            StatusTransition::Processing { .. } => JobStatus::Processing,
            StatusTransition::Completed { .. } => JobStatus::Completed,
            StatusTransition::Failed { .. } => JobStatus::Failed,
        }
    }
}
