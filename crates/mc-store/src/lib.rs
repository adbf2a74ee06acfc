//! Durable state for mediacheck.
//!
//! The [`Store`] is an embedded `SQLite` database with three logical tables:
//!
//! | table         | key                  | value                      |
//! |---------------|----------------------|----------------------------|
//! | `fingerprints`| absolute path        | 16-byte [`ContentHash`]    |
//! | `bad_files`   | absolute path        | [`BadFileRecord`] JSON     |
//! | `run_stats`   | `current` / RFC 3339 | [`StatsSnapshot`] JSON     |
//!
//! State survives restarts: fingerprints are only useful across runs, and a
//! `current` stats record left with `running = true` is how an interrupted run
//! is detected on the next start.
//!
//! [`ContentHash`]: mc_core::ContentHash
//! [`BadFileRecord`]: mc_core::BadFileRecord
//! [`StatsSnapshot`]: mc_core::StatsSnapshot

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{HISTORY_LIMIT, HistoryEntry, Store};
