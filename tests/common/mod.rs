#![allow(dead_code)]

pub(crate) mod flaky_storage;

pub(crate) mod logging;

pub(crate) mod mem_blob_store;

pub(crate) mod peer;
