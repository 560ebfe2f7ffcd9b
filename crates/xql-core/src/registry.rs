//! Registry of entity models

use crate::error::{Error, Result};
use crate::schema::EntityModel;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Entity models by name, built once and shared read-only
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    /// Models by entity name
    models: HashMap<String, Arc<EntityModel>>,

    /// Entity name by class name
    classes: HashMap<String, String>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity model
    pub fn register(&mut self, model: EntityModel) -> Result<Arc<EntityModel>> {
        if self.models.contains_key(model.name()) {
            return Err(Error::DuplicateEntity(model.name().to_string()));
        }

        let model = Arc::new(model);
        self.classes
            .insert(model.class_name().to_string(), model.name().to_string());
        self.models
            .insert(model.name().to_string(), Arc::clone(&model));

        debug!(
            "Registered entity '{}' on table '{}'",
            model.name(),
            model.table_name()
        );
        Ok(model)
    }

    /// Builder: register a model
    pub fn with(mut self, model: EntityModel) -> Result<Self> {
        self.register(model)?;
        Ok(self)
    }

    /// Get a model by entity name
    pub fn get(&self, name: &str) -> Result<Arc<EntityModel>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Get a model by class name
    pub fn get_by_class(&self, class_name: &str) -> Result<Arc<EntityModel>> {
        let name = self
            .classes
            .get(class_name)
            .ok_or_else(|| Error::UnknownEntityClass(class_name.to_string()))?;
        self.get(name)
    }

    /// Check if an entity is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
