/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::data_types::{ItemId, ItemType};

use super::item::Item;

/// A declarative item predicate.
///
/// An item matches if it satisfies every non-empty criterion, and it satisfies a criterion if it
/// matches any one of the criterion's values. The default filter matches every item.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ItemFilter {
    pub item_types: Vec<ItemType>,
    pub parent_ids: Vec<ItemId>,
    pub ids: Vec<ItemId>,
}

impl ItemFilter {
    pub fn new() -> ItemFilter {
        ItemFilter::default()
    }

    pub fn with_type(mut self, item_type: impl Into<ItemType>) -> Self {
        self.item_types.push(item_type.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<ItemId>) -> Self {
        self.parent_ids.push(parent_id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        (self.item_types.is_empty() || self.item_types.contains(&item.item_type))
            && (self.parent_ids.is_empty()
                || item
                    .parent_id
                    .as_ref()
                    .is_some_and(|parent_id| self.parent_ids.contains(parent_id)))
            && (self.ids.is_empty() || self.ids.contains(&item.id))
    }
}
