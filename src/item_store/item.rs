/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{ItemId, ItemType, ModelState, ModelType};

/// A model instance in a space.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) item_type: ItemType,
    pub(crate) model_type: ModelType,
    pub(crate) parent_id: Option<ItemId>,
    pub(crate) model_state: ModelState,
}

impl Item {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    pub fn parent_id(&self) -> Option<&ItemId> {
        self.parent_id.as_ref()
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }
}
