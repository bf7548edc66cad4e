use std::{io, sync::Once, thread};

use log::LevelFilter;

static LOGGER_INIT: Once = Once::new();

// Set up a logger that logs all log messages with level `level` and above.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{:?}][{}] {}",
                    thread::current().id(),
                    record.level(),
                    message
                ))
            })
            .level(level)
            .chain(io::stdout())
            .apply()
            .unwrap();
    })
}

/// Log a message from the test itself, optionally naming the peer it concerns.
pub(crate) fn log_with_context(peer: Option<&str>, message: &str) {
    match peer {
        Some(peer) => log::info!("[Test][{}] {}", peer, message),
        None => log::info!("[Test] {}", message),
    }
}
