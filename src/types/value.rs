/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Value`] sum type stored in the properties of [object model](crate::model::object_model)
//! items.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

/// A dynamically-typed property value.
///
/// `Null` is never stored: writing `Null` to a key removes the key, and `Null` entries nested inside
/// an [`Object`](Value::Object) are dropped when the value is [normalized](Value::normalized).
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Object(BTreeMap<String, Value>),
}

// Hand-written equivalents of the borsh derives (same wire format: u8 variant index followed by the
// variant's field). The derive cannot be used because `Value` is recursive and borsh 0.10's derive
// emits field-type bounds that overflow.
impl BorshSerialize for Value {
    fn serialize<W: borsh::maybestd::io::Write>(&self, writer: &mut W) -> borsh::maybestd::io::Result<()> {
        match self {
            Value::Null => BorshSerialize::serialize(&0u8, writer),
            Value::Bool(v) => {
                BorshSerialize::serialize(&1u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
            Value::Int(v) => {
                BorshSerialize::serialize(&2u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
            Value::Float(v) => {
                BorshSerialize::serialize(&3u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
            Value::String(v) => {
                BorshSerialize::serialize(&4u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
            Value::Bytes(v) => {
                BorshSerialize::serialize(&5u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
            Value::Object(v) => {
                BorshSerialize::serialize(&6u8, writer)?;
                BorshSerialize::serialize(v, writer)
            }
        }
    }
}

impl BorshDeserialize for Value {
    fn deserialize_reader<R: borsh::maybestd::io::Read>(reader: &mut R) -> borsh::maybestd::io::Result<Self> {
        let variant_idx: u8 = BorshDeserialize::deserialize_reader(reader)?;
        Ok(match variant_idx {
            0 => Value::Null,
            1 => Value::Bool(BorshDeserialize::deserialize_reader(reader)?),
            2 => Value::Int(BorshDeserialize::deserialize_reader(reader)?),
            3 => Value::Float(BorshDeserialize::deserialize_reader(reader)?),
            4 => Value::String(BorshDeserialize::deserialize_reader(reader)?),
            5 => Value::Bytes(BorshDeserialize::deserialize_reader(reader)?),
            6 => Value::Object(BorshDeserialize::deserialize_reader(reader)?),
            _ => {
                return Err(borsh::maybestd::io::Error::new(
                    borsh::maybestd::io::ErrorKind::InvalidInput,
                    format!("Unexpected variant index: {:?}", variant_idx),
                ))
            }
        })
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Return a copy of this value with every `Null` entry of every nested object removed.
    pub fn normalized(self) -> Value {
        match self {
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key, value.normalized()))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Value::Object(o)
    }
}
