#![deny(missing_docs)]
//! Shared logging utilities for the sync workspace.
//!
//! This crate provides the `sync_*` logging macros used across the codebase,
//! the per-thread connection epoch that tags every message logged while a
//! connection's events are being dispatched, and a minimal test initializer.

use std::cell::Cell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Epoch of the connection whose events are currently being dispatched.
    static CONNECTION_EPOCH: Cell<u64> = const { Cell::new(0) };
}

/// Sets the connection epoch for the current thread.
///
/// The channel client calls this before dispatching a batch of events and
/// resets it to 0 afterwards.
pub fn set_connection_epoch(epoch: u64) {
    CONNECTION_EPOCH.with(|v| v.set(epoch));
}

/// Retrieves the connection epoch for the current thread.
/// Returns 0 outside of dispatch.
pub fn connection_epoch() -> u64 {
    CONNECTION_EPOCH.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current connection epoch.
#[macro_export]
macro_rules! sync_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("[conn {}] {}", $crate::connection_epoch(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current connection epoch.
#[macro_export]
macro_rules! sync_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("[conn {}] {}", $crate::connection_epoch(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current connection epoch.
#[macro_export]
macro_rules! sync_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("[conn {}] {}", $crate::connection_epoch(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current connection epoch.
#[macro_export]
macro_rules! sync_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("[conn {}] {}", $crate::connection_epoch(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current connection epoch.
#[macro_export]
macro_rules! sync_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("[conn {}] {}", $crate::connection_epoch(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may have installed the logger already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_thread_local() {
        set_connection_epoch(7);
        assert_eq!(connection_epoch(), 7);
        let other = std::thread::spawn(connection_epoch).join().unwrap();
        assert_eq!(other, 0);
        set_connection_epoch(0);
    }
}
