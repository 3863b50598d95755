//! popo-core library.
//!
//! A local-first, multi-profile process tracker. The whole state is one JSON
//! document ([`model::Document`]) that is loaded, migrated to the current
//! shape, edited through a [`tracker::Tracker`], and written back whole.
//!
//! # Conventions
//!
//! - **Errors**: [`error::PopoError`] for library operations; `anyhow::Result`
//!   at the config layer where context strings matter more than variants.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod backup;
pub mod config;
pub mod error;
pub mod ids;
pub mod images;
pub mod lock;
pub mod merge;
pub mod migrate;
pub mod model;
pub mod restore;
pub mod store;
pub mod tracker;

pub use error::{ErrorCode, PopoError, Result};
pub use model::{Document, EntityId, Process, Step, Theme, User};
pub use restore::{RestoreMode, RestoreScope};
pub use tracker::Tracker;
