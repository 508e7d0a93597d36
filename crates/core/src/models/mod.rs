//! Processor readiness tracking and dispatch.

mod config;
mod manager;
mod types;

pub use config::ModelsConfig;
pub use manager::ModelManager;
pub(crate) use manager::panic_message;
pub use types::{CancelFlag, ModelError, ProcessorDescriptor, ProcessorStatus, RunContext};
