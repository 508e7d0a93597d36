//! Model manager configuration.

use serde::{Deserialize, Serialize};

use crate::job::{TransformationType, UnknownTransformationType};

/// Configuration for processor loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    /// Execution target hint ("auto", "cpu", "cuda", ...).
    /// Informational only: processors always run on the CPU.
    #[serde(default = "default_device")]
    pub device: String,

    /// How many processors may load at the same time.
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,

    /// Transformation types that are not registered at startup.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_device() -> String {
    "auto".to_string()
}

fn default_max_concurrent_loads() -> usize {
    4
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            max_concurrent_loads: default_max_concurrent_loads(),
            disabled: Vec::new(),
        }
    }
}

impl ModelsConfig {
    /// The device hint reported on descriptors; "auto" resolves to "cpu".
    pub fn resolved_device(&self) -> String {
        match self.device.as_str() {
            "auto" | "" => "cpu".to_string(),
            other => other.to_string(),
        }
    }

    /// Parse `disabled` into transformation types.
    pub fn disabled_types(&self) -> Result<Vec<TransformationType>, UnknownTransformationType> {
        self.disabled.iter().map(|name| name.parse()).collect()
    }
}
