/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::types::data_types::ModelType;

use super::{raw_log::RawLogModel, Model};

/// The models known to a space, keyed by [`ModelType`].
///
/// A registry is passed explicitly to each space. Cloning it is cheap; clones share their models.
#[derive(Clone)]
pub struct ModelRegistry {
    models: HashMap<ModelType, Arc<dyn Model>>,
    fallback: Arc<dyn Model>,
}

impl ModelRegistry {
    pub fn new() -> ModelRegistry {
        ModelRegistry {
            models: HashMap::new(),
            fallback: Arc::new(RawLogModel),
        }
    }

    /// Register `model` under its own [`model_type`](Model::model_type).
    pub fn register(&mut self, model: impl Model) -> Result<(), RegistryError> {
        let model_type = model.model_type();
        if self.models.contains_key(&model_type) {
            return Err(RegistryError::DuplicateModel(model_type));
        }
        self.models.insert(model_type, Arc::new(model));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, model: impl Model) -> Result<ModelRegistry, RegistryError> {
        self.register(model)?;
        Ok(self)
    }

    pub fn get(&self, model_type: &ModelType) -> Option<&Arc<dyn Model>> {
        self.models.get(model_type)
    }

    pub fn is_registered(&self, model_type: &ModelType) -> bool {
        self.models.contains_key(model_type)
    }

    /// The model that folds items of `model_type`: the registered model, or the raw log model if none
    /// is registered.
    pub fn model_for(&self, model_type: &ModelType) -> &dyn Model {
        match self.models.get(model_type) {
            Some(model) => model.as_ref(),
            None => self.fallback.as_ref(),
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateModel(ModelType),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateModel(model_type) => {
                write!(f, "model {} is already registered", model_type)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
