//! Transformation orchestrator.
//!
//! The orchestrator owns the job status machine:
//! - **Submit**: validate, persist as `processing`, return immediately
//! - **Execute**: bounded worker pool, per-job timeout, failures recorded on the job
//! - **Shutdown**: drain in-flight jobs, fail whatever outlives the grace period

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::TransformationOrchestrator;
pub use types::{JobResult, OrchestratorError, OrchestratorStatus, SubmitRequest};
