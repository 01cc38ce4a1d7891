//! # Launchpad
//!
//! The async shell around `launchpad-core`: HTTP API, CLI, background
//! services and the geocoding proxy.
//!
//! Every authorization and workflow decision is delegated to the core; this
//! crate owns the clock, the network, the tasks and the configuration.

pub mod api;
pub mod autosave;
pub mod cli;
pub mod config;
pub mod endpoints;
pub mod geocoding;
pub mod monitor;

use launchpad_core::Timestamp;

/// The current wall-clock time as a core timestamp.
#[must_use]
pub fn now() -> Timestamp {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Timestamp::from_millis(millis)
}
