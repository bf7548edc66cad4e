/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A causally ordered replication engine that merges the append-only feeds of many peers into one
//! consistent item database.
//!
//! Each peer of a [space](space) writes [mutations](feed::MutationEnvelope) of the space's items to
//! its own [feed](feed). The [pipeline](pipeline) reads every feed in order and applies each mutation
//! only once everything its writer had seen has been applied, as recorded in the mutation's
//! [`Timeframe`](timeframe::Timeframe). The resulting [items](item_store) are periodically
//! [snapshotted](snapshot) so that replay can resume from the latest snapshot instead of from the
//! start of every feed.

pub(crate) mod event_bus;

pub mod events;

pub mod feed;

pub mod item_store;

pub mod logging;

pub mod model;

pub mod pipeline;

pub mod snapshot;

pub mod space;

pub mod timeframe;

pub mod types;
