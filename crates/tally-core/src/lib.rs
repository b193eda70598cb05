//! tally-core library.
//!
//! Issue tracking storage for multi-tenant workspaces. Each team owns a
//! persistent counter; issues are keyed `{TEAM}-{number}` and every mutation
//! appends a typed change event in the same SQLite transaction.
//!
//! # Conventions
//!
//! - **Errors**: Domain operations return [`error::TallyError`]; plumbing
//!   (opening files, config) uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`,
//!   `trace!`) with structured fields.
//! - **Writes**: Every mutation runs inside [`db::write_tx`].

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod key;
pub mod model;
pub mod ops;
pub mod rekey;
pub mod sequence;

pub use error::{ErrorCode, TallyError};
pub use sequence::{SequenceAllocator, SequenceError};
