/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::types::data_types::SpaceKey;

/// Stores the user-defined parameters required to open a space, that is:
/// 1. The [key](crate::types::data_types::SpaceKey) of the space. Snapshots are looked up by this key.
/// 2. The open timeout: how long [`Space::open`](super::Space::open) waits for the initial replay to
///    reach the end of every feed before returning with partial data.
/// 3. The poll interval: how often the space's threads check for shutdown while idle. Closing a space
///    takes at most about this long.
/// 4. The base and maximum delays between retries of failed feed reads.
/// 5. The stall timeout: how long blocks may stay buffered without the space making progress before a
///    [stall](crate::events::StallEvent) is reported. Opening a space stops waiting for the initial
///    replay once it stalls.
/// 6. The snapshot interval: if set, a snapshot is saved automatically after every this many consumed
///    blocks.
/// 7. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// echo_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder, Clone, Debug)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.space_key(...)`

    Optional:
    - `.open_timeout(...)` (default: 10 seconds)
    - `.poll_interval(...)` (default: 50 milliseconds)
    - `.read_retry_base_delay(...)` (default: 100 milliseconds)
    - `.read_retry_max_delay(...)` (default: 5 seconds)
    - `.stall_timeout(...)` (default: 1 second)
    - `.snapshot_interval(...)` (default: no automatic snapshots)
    - `.log_events(...)` (default: false)
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the key of the space. Required."))]
    pub space_key: SpaceKey,
    #[builder(
        default = Duration::from_secs(10),
        setter(doc = "Set the maximum time that opening the space waits for the initial replay. Optional.")
    )]
    pub open_timeout: Duration,
    #[builder(
        default = Duration::from_millis(50),
        setter(doc = "Set the interval at which idle threads check for shutdown. Optional.")
    )]
    pub poll_interval: Duration,
    #[builder(
        default = Duration::from_millis(100),
        setter(doc = "Set the delay before the first retry of a failed feed read. Optional.")
    )]
    pub read_retry_base_delay: Duration,
    #[builder(
        default = Duration::from_secs(5),
        setter(doc = "Set the maximum delay between retries of a failed feed read. Optional.")
    )]
    pub read_retry_max_delay: Duration,
    #[builder(
        default = Duration::from_secs(1),
        setter(doc = "Set how long blocks may stay buffered without progress before a stall is reported. Optional.")
    )]
    pub stall_timeout: Duration,
    #[builder(
        default,
        setter(strip_option, doc = "Save a snapshot automatically after every this many consumed blocks. Optional.")
    )]
    pub snapshot_interval: Option<u64>,
    #[builder(default = false, setter(doc = "Enable logging? Optional."))]
    pub log_events: bool,
}
