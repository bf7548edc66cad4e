/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The mutation pipeline, which merges the feeds of a space into a single, causally ordered stream of
//! mutations and replays it into the space's [state](state::SpaceState).
//!
//! An open space runs one [reader](reader) thread per feed and a single [coordinator](coordinator)
//! thread. Readers forward their feed's blocks in sequence order; the coordinator decides, using the
//! [`MutationProcessor`](processor::MutationProcessor), when each block may be applied, and applies
//! it.

pub mod clock;

pub(crate) mod coordinator;

pub mod processor;

pub(crate) mod reader;

pub mod state;

pub mod watchers;
