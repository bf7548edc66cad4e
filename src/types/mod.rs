//! Types and traits that are used across multiple components of echo_rs.
//!
//! Types specific to a single component, e.g., [`crate::feed::FeedBlock`] or
//! [`crate::item_store::Item`], live in that component's module.

pub mod crypto_primitives;

pub mod data_types;

pub mod value;
