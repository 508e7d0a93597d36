pub mod config;
pub mod job;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    LogFormat, LoggingConfig, SanitizedConfig, ServerConfig, StorageConfig,
};
pub use job::{
    FailureKind, JobFilter, JobStatus, JobStore, JobStoreError, Parameters, SqliteJobStore,
    TransformationJob, TransformationType,
};
pub use models::{
    CancelFlag, ModelError, ModelManager, ModelsConfig, ProcessorDescriptor, ProcessorStatus,
    RunContext,
};
pub use orchestrator::{
    JobResult, OrchestratorConfig, OrchestratorError, OrchestratorStatus, SubmitRequest,
    TransformationOrchestrator,
};
pub use processor::{Processor, ProcessorError, ProcessorRegistry, RegistryError};
pub use storage::{FsImageStore, ImageStore, ImageStoreError};
