//! Name-keyed table of processors.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::RegistryError;
use super::traits::Processor;
use super::{
    AgeProgressionProcessor, BackgroundRemovalProcessor, BackgroundReplacementProcessor,
    FaceEnhancementProcessor, ObjectRemovalProcessor, StyleTransferProcessor,
};
use crate::job::TransformationType;

/// Maps transformation-type names to processor implementations.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in processor except those named in `disabled`.
    pub fn with_defaults(disabled: &[TransformationType]) -> Self {
        let builtins: Vec<Arc<dyn Processor>> = vec![
            Arc::new(BackgroundRemovalProcessor),
            Arc::new(StyleTransferProcessor),
            Arc::new(AgeProgressionProcessor::default()),
            Arc::new(FaceEnhancementProcessor::default()),
            Arc::new(ObjectRemovalProcessor),
            Arc::new(BackgroundReplacementProcessor),
        ];

        let mut registry = Self::new();
        for processor in builtins {
            let t = processor.transformation_type();
            if disabled.contains(&t) {
                continue;
            }
            // Built-in types are distinct, so this cannot collide.
            let _ = registry.register(t.as_str(), processor);
        }
        registry
    }

    /// Register a processor under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.processors.contains_key(&name) {
            return Err(RegistryError::DuplicateProcessor(name));
        }
        self.processors.insert(name, processor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Processor>, RegistryError> {
        self.processors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownProcessor(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}
