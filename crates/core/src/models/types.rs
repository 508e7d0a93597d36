//! Processor readiness types.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;

use crate::job::FailureKind;

/// Readiness of a processor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
    /// No implementation is registered under this name.
    Unregistered,
    Loading,
    Ready,
    Failed,
}

impl ProcessorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorStatus::Unregistered => "unregistered",
            ProcessorStatus::Loading => "loading",
            ProcessorStatus::Ready => "ready",
            ProcessorStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness record for one transformation type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessorDescriptor {
    pub name: String,
    pub status: ProcessorStatus,
    pub device_hint: String,
    /// Load failure diagnostic, when status is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Errors returned by [`ModelManager::dispatch`](super::ModelManager::dispatch).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The target processor is not `ready`.
    #[error("Model {name} is not loaded (status: {status})")]
    ProcessorNotReady {
        name: String,
        status: ProcessorStatus,
    },

    /// The processor (or image I/O around it) failed; carries the underlying diagnostic.
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// The processor panicked.
    #[error("Unexpected error while processing: {0}")]
    Panicked(String),

    /// The caller gave up on the run before it finished; nothing was kept.
    #[error("Processing abandoned")]
    Abandoned,
}

impl ModelError {
    /// Classification persisted with the failed job.
    pub fn kind(&self) -> FailureKind {
        match self {
            ModelError::ProcessorNotReady { .. } => FailureKind::ProcessorNotReady,
            ModelError::ProcessingFailed(_) => FailureKind::ProcessingFailed,
            ModelError::Panicked(_) | ModelError::Abandoned => FailureKind::Unexpected,
        }
    }
}

/// Shared flag telling a blocking run that nobody is waiting for it anymore.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a dispatched run carries onto the blocking pool.
///
/// `permit` is released only when the run returns, so a caller that stops
/// waiting (timeout, abort) does not free its worker slot early.
#[derive(Debug, Default)]
pub struct RunContext {
    pub cancel: CancelFlag,
    pub permit: Option<OwnedSemaphorePermit>,
}

impl RunContext {
    pub fn new(cancel: CancelFlag, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self { cancel, permit }
    }
}
