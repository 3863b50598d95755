//! Persisted document schema: users, processes, steps, theme and the
//! current-user pointer.
//!
//! Scalars that a field-level merge must be able to tell apart from "not
//! provided" are `Option`s and are omitted from the JSON when `None`. Keys the
//! schema does not know are carried in each type's `extra` map.

mod document;
mod entity;
mod id;
pub(crate) mod tristate;
mod user;

pub use document::{Document, Theme};
pub use entity::{Process, Step, parse_timestamp};
pub use id::EntityId;
pub use user::User;

/// Id of the profile created on first run and by legacy migration.
pub const DEFAULT_USER_ID: &str = "user-1";
/// Name given to the first-run profile.
pub const DEFAULT_USER_NAME: &str = "Me";
/// Role given to every newly created profile.
pub const DEFAULT_ROLE: &str = "User";
