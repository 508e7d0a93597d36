//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the transformation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// Worker pool size: jobs executing at the same time.
    /// Further jobs wait (already `processing`) until a worker frees up.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Time budget for one processor run, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// How long shutdown waits for in-flight jobs before failing them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_job_timeout() -> u64 {
    300 // 5 minutes
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl OrchestratorConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n;
        self
    }

    pub fn with_job_timeout_secs(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }
}
