/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{ModelState, ModelType};

use super::{Model, ModelError, MutationMeta};

/// Folds items whose model is not registered: the state is the list of the item's raw mutations, in
/// application order. This keeps such items live, and their history intact, until a replica that
/// understands the model reads them.
pub struct RawLogModel;

impl RawLogModel {
    pub const MODEL_TYPE: &'static str = "echo:raw-log";

    /// Read back the mutations recorded in `state`.
    pub fn mutations(state: &ModelState) -> Result<Vec<Vec<u8>>, ModelError> {
        if state.is_empty() {
            return Ok(Vec::new());
        }
        Vec::<Vec<u8>>::try_from_slice(state.bytes())
            .map_err(|err| ModelError::InvalidState(err.to_string()))
    }
}

impl Model for RawLogModel {
    fn model_type(&self) -> ModelType {
        ModelType::new(Self::MODEL_TYPE)
    }

    fn initial_state(&self) -> ModelState {
        ModelState::default()
    }

    fn fold(
        &self,
        state: &ModelState,
        _meta: &MutationMeta,
        mutation: &[u8],
    ) -> Result<ModelState, ModelError> {
        let mut mutations = Self::mutations(state)?;
        mutations.push(mutation.to_vec());
        mutations
            .try_to_vec()
            .map(ModelState::new)
            .map_err(|err| ModelError::InvalidState(err.to_string()))
    }
}
