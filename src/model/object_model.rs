/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A key-value model whose properties are [`Value`]s.
//!
//! Each property is a last-writer-wins register. A write replaces the register's value only if the
//! write's [`WriteStamp`] is not smaller than the stamp of the value it would replace, so that every
//! replica keeps the same value regardless of the order in which it applied concurrent writes.
//! Deleting a property writes a `Null` tombstone, which orders against later writes the same way.
//!
//! Items are read through an [`ObjectView`] and written with mutations built by an
//! [`ObjectMutationBuilder`].

use std::collections::BTreeMap;
use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{ModelState, ModelType},
    value::Value,
};

use super::{Model, ModelError, MutationMeta, WriteStamp};

pub struct ObjectModel;

impl ObjectModel {
    pub const MODEL_TYPE: &'static str = "echo:object";

    /// Get a read-only view of an object's properties.
    pub fn view(state: &ModelState) -> Result<ObjectView, ModelError> {
        Ok(ObjectView(ObjectState::decode(state)?))
    }
}

impl Model for ObjectModel {
    fn model_type(&self) -> ModelType {
        ModelType::new(Self::MODEL_TYPE)
    }

    fn initial_state(&self) -> ModelState {
        ModelState::default()
    }

    fn fold(
        &self,
        state: &ModelState,
        meta: &MutationMeta,
        mutation: &[u8],
    ) -> Result<ModelState, ModelError> {
        let mutations = ObjectMutationSet::try_from_slice(mutation)
            .map_err(|err| ModelError::MalformedMutation(err.to_string()))?;
        let mut object = ObjectState::decode(state)?;
        let stamp = meta.stamp();

        for ObjectMutation { key, value } in mutations.0 {
            let wins = match object.properties.get(&key) {
                Some(register) => stamp >= register.stamp,
                None => true,
            };
            if wins {
                object.properties.insert(
                    key,
                    Register {
                        value: value.normalized(),
                        stamp,
                    },
                );
            }
        }

        // Only a value from this mutation can fail to encode.
        object
            .try_to_vec()
            .map(ModelState::new)
            .map_err(|err| ModelError::MalformedMutation(err.to_string()))
    }
}

/// Set `key` to `value`. Setting `Value::Null` deletes the key.
#[derive(Clone, PartialEq, Debug, BorshSerialize, BorshDeserialize)]
pub struct ObjectMutation {
    pub key: String,
    pub value: Value,
}

/// The mutations carried by one block, applied in order.
#[derive(Clone, PartialEq, Debug, Default, BorshSerialize, BorshDeserialize)]
pub struct ObjectMutationSet(pub Vec<ObjectMutation>);

/// Builds the payload of an object mutation.
///
/// ```
/// use echo_rs::model::object_model::ObjectMutationBuilder;
///
/// let mutation = ObjectMutationBuilder::new()
///     .set("title", "Buy milk")
///     .set("done", false)
///     .delete("assignee")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct ObjectMutationBuilder(ObjectMutationSet);

impl ObjectMutationBuilder {
    pub fn new() -> ObjectMutationBuilder {
        ObjectMutationBuilder(ObjectMutationSet::default())
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0 .0.push(ObjectMutation {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(self, key: impl Into<String>) -> Self {
        self.set(key, Value::Null)
    }

    /// Encode the mutation. Fails only if a value cannot be encoded (e.g., a NaN float).
    pub fn build(self) -> io::Result<Vec<u8>> {
        self.0.try_to_vec()
    }
}

/// A read-only view over the current properties of an object.
#[derive(Clone, PartialEq, Debug)]
pub struct ObjectView(ObjectState);

impl ObjectView {
    /// The value of `key`, or `None` if it was never set or has been deleted.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .properties
            .get(key)
            .map(|register| &register.value)
            .filter(|value| !value.is_null())
    }

    /// The keys with a (non-deleted) value, in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0
            .properties
            .iter()
            .filter(|(_, register)| !register.value.is_null())
            .map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stamp of the write that produced the current value (or tombstone) of `key`.
    pub fn stamp(&self, key: &str) -> Option<WriteStamp> {
        self.0.properties.get(key).map(|register| register.stamp)
    }

    /// Collect the current properties into a [`Value::Object`].
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .properties
                .iter()
                .filter(|(_, register)| !register.value.is_null())
                .map(|(key, register)| (key.clone(), register.value.clone()))
                .collect(),
        )
    }
}

#[derive(Clone, PartialEq, Debug, Default, BorshSerialize, BorshDeserialize)]
struct ObjectState {
    properties: BTreeMap<String, Register>,
}

#[derive(Clone, PartialEq, Debug, BorshSerialize, BorshDeserialize)]
struct Register {
    value: Value,
    stamp: WriteStamp,
}

impl ObjectState {
    fn decode(state: &ModelState) -> Result<ObjectState, ModelError> {
        if state.is_empty() {
            return Ok(ObjectState::default());
        }
        ObjectState::try_from_slice(state.bytes())
            .map_err(|err| ModelError::InvalidState(err.to_string()))
    }
}
