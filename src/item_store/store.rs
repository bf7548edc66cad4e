/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use crate::{
    model::{registry::ModelRegistry, ModelError, MutationMeta},
    types::data_types::{ItemId, ItemType, ModelType},
};

use super::{filter::ItemFilter, item::Item};

/// The items of a space, keyed by [`ItemId`].
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ItemStore {
    items: BTreeMap<ItemId, Item>,
}

impl ItemStore {
    pub fn new() -> ItemStore {
        ItemStore::default()
    }

    /// Build a store from previously captured items.
    ///
    /// # Errors
    ///
    /// [`ItemStoreError::AlreadyExists`] if two of `items` share an id.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<ItemStore, ItemStoreError> {
        let mut store = ItemStore::new();
        for item in items {
            if store.items.contains_key(&item.id) {
                return Err(ItemStoreError::AlreadyExists(item.id));
            }
            store.items.insert(item.id.clone(), item);
        }
        Ok(store)
    }

    pub fn get(&self, item_id: &ItemId) -> Result<&Item, ItemStoreError> {
        self.items
            .get(item_id)
            .ok_or_else(|| ItemStoreError::NotFound(item_id.clone()))
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.contains_key(item_id)
    }

    /// Capture the items that satisfy `predicate`, in ascending id order.
    pub fn query(&self, predicate: impl Fn(&Item) -> bool) -> ItemQuery {
        ItemQuery {
            items: self
                .items
                .values()
                .filter(|item| predicate(item))
                .cloned()
                .collect(),
        }
    }

    /// Capture the items that match `filter`.
    pub fn filter(&self, filter: &ItemFilter) -> ItemQuery {
        self.query(|item| filter.matches(item))
    }

    /// Create a new item whose state is its model's initial state, folded with `initial_mutation`
    /// if one is given.
    ///
    /// Nothing is changed if this returns an error.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_genesis(
        &mut self,
        registry: &ModelRegistry,
        item_id: ItemId,
        item_type: ItemType,
        model_type: ModelType,
        parent_id: Option<ItemId>,
        initial_mutation: Option<&[u8]>,
        meta: &MutationMeta,
    ) -> Result<&Item, ItemStoreError> {
        if self.items.contains_key(&item_id) {
            return Err(ItemStoreError::AlreadyExists(item_id));
        }
        if let Some(parent) = &parent_id {
            if !self.items.contains_key(parent) {
                return Err(ItemStoreError::ParentNotFound {
                    item_id,
                    parent_id: parent.clone(),
                });
            }
        }

        let model = registry.model_for(&model_type);
        let mut model_state = model.initial_state();
        if let Some(mutation) = initial_mutation {
            model_state = model
                .fold(&model_state, meta, mutation)
                .map_err(|error| ItemStoreError::Model {
                    item_id: item_id.clone(),
                    error,
                })?;
        }

        let item = Item {
            id: item_id.clone(),
            item_type,
            model_type,
            parent_id,
            model_state,
        };
        Ok(self.items.entry(item_id).or_insert(item))
    }

    /// Fold `mutation` into the state of the item `item_id` using the item's model.
    ///
    /// Nothing is changed if this returns an error.
    pub fn apply_mutation(
        &mut self,
        registry: &ModelRegistry,
        item_id: &ItemId,
        mutation: &[u8],
        meta: &MutationMeta,
    ) -> Result<&Item, ItemStoreError> {
        let item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| ItemStoreError::NotFound(item_id.clone()))?;
        let new_state = registry
            .model_for(&item.model_type)
            .fold(&item.model_state, meta, mutation)
            .map_err(|error| ItemStoreError::Model {
                item_id: item_id.clone(),
                error,
            })?;
        item.model_state = new_state;
        Ok(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over all items in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.values()
    }
}

/// The result of a [query](ItemStore::query): the matching items as they were when the query ran.
///
/// Later changes to the store are not reflected. A query can be iterated any number of times.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ItemQuery {
    items: Vec<Item>,
}

impl ItemQuery {
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

impl IntoIterator for ItemQuery {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ItemQuery {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStoreError {
    NotFound(ItemId),
    AlreadyExists(ItemId),
    ParentNotFound { item_id: ItemId, parent_id: ItemId },
    Model { item_id: ItemId, error: ModelError },
}

impl Display for ItemStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ItemStoreError::NotFound(item_id) => write!(f, "item {} not found", item_id),
            ItemStoreError::AlreadyExists(item_id) => write!(f, "item {} already exists", item_id),
            ItemStoreError::ParentNotFound { item_id, parent_id } => write!(
                f,
                "parent {} of item {} not found",
                parent_id, item_id
            ),
            ItemStoreError::Model { item_id, error } => {
                write!(f, "model of item {} rejected the mutation: {}", item_id, error)
            }
        }
    }
}

impl std::error::Error for ItemStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ItemStoreError::Model { error, .. } => Some(error),
            _ => None,
        }
    }
}
