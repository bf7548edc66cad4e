/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The keyed collection of items that a space's mutations are replayed into.
//!
//! Each [`Item`] has a fixed identity (id, item type, model type, optional parent) set by its genesis,
//! and a model state that is the fold of the item's applied mutations. Items are never physically
//! deleted.

pub mod filter;
pub use filter::ItemFilter;

pub mod item;
pub use item::Item;

pub mod store;
pub use store::{ItemQuery, ItemStore, ItemStoreError};
