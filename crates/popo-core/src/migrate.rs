//! Document shape migration.
//!
//! Two shapes have been written to disk over the tracker's life:
//!
//! - **Legacy**: a single implicit profile,
//!   `{ profile: {name, role, avatar}, processes: [...], steps: [...], theme, currentUserId? }`.
//! - **Current**: `{ currentUserId, users: [...], theme }`.
//!
//! [`migrate`] upgrades anything it is given into the current shape and is
//! idempotent: its output is classified as current and passes through
//! untouched. [`migrate_backup`] is the stricter variant used for imports,
//! where an unrecognized file is an error rather than a fresh start.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{PopoError, Result};
use crate::model::{
    DEFAULT_ROLE, DEFAULT_USER_ID, DEFAULT_USER_NAME, Document, EntityId, Process, Step, Theme,
    User,
};

/// How a raw JSON value was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `profile` present and both `processes` and `steps` are arrays.
    Legacy,
    /// `users` is an array.
    Current,
    /// Null, or an object matching neither shape.
    Unrecognized,
}

/// Classify a raw document. Legacy wins over current when both match, since
/// the legacy check is what older builds relied on.
#[must_use]
pub fn classify(raw: &Value) -> Shape {
    let Some(obj) = raw.as_object() else {
        return Shape::Unrecognized;
    };

    let has_profile = obj.get("profile").is_some_and(is_truthy);
    let processes_array = obj.get("processes").is_some_and(Value::is_array);
    let steps_array = obj.get("steps").is_some_and(Value::is_array);

    if has_profile && processes_array && steps_array {
        Shape::Legacy
    } else if obj.get("users").is_some_and(Value::is_array) {
        Shape::Current
    } else {
        Shape::Unrecognized
    }
}

/// Single-profile document written by older builds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    #[serde(default)]
    profile: Value,
    #[serde(default)]
    processes: Vec<Process>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default)]
    theme: Option<Value>,
    #[serde(default)]
    current_user_id: Option<Value>,
}

/// Upgrade any raw value into a current-shape [`Document`].
///
/// - Legacy documents become one user (id from `currentUserId` or `user-1`).
/// - Current documents are decoded as they are.
/// - Null or unrecognized objects become the first-run document, keeping a
///   valid `theme` if one was present.
///
/// The current-user pointer is not validated here; see
/// [`Document::repair_current_user`].
///
/// # Errors
///
/// Returns [`PopoError::Format`] if the value is not an object (or null), or
/// if its entities cannot be decoded.
pub fn migrate(raw: &Value) -> Result<Document> {
    match classify(raw) {
        Shape::Legacy => migrate_legacy(raw),
        Shape::Current => decode_current(raw),
        Shape::Unrecognized => {
            if !(raw.is_null() || raw.is_object()) {
                return Err(PopoError::Format(format!(
                    "expected a JSON object, found {}",
                    json_kind(raw)
                )));
            }
            tracing::debug!("unrecognized document shape; starting fresh");
            let mut doc = Document::default();
            if let Some(theme) = raw.get("theme").and_then(theme_of) {
                doc.theme = Some(theme);
            }
            Ok(doc)
        }
    }
}

/// Migrate an imported backup.
///
/// Same as [`migrate`] for legacy and current shapes, but anything else is
/// rejected so a wrong file can never wipe the local document.
///
/// # Errors
///
/// [`PopoError::InvalidBackupFormat`] if the value is neither shape,
/// [`PopoError::Format`] if its entities cannot be decoded.
pub fn migrate_backup(raw: &Value) -> Result<Document> {
    match classify(raw) {
        Shape::Legacy => migrate_legacy(raw),
        Shape::Current => decode_current(raw),
        Shape::Unrecognized => Err(PopoError::InvalidBackupFormat),
    }
}

/// Parse stored bytes and migrate them (load path).
///
/// # Errors
///
/// [`PopoError::Format`] on invalid JSON or undecodable content.
pub fn parse_document(bytes: &[u8]) -> Result<Document> {
    let raw: Value = serde_json::from_slice(bytes)?;
    migrate(&raw)
}

/// Parse backup bytes and migrate them (import path).
///
/// # Errors
///
/// [`PopoError::Format`] on invalid JSON, [`PopoError::InvalidBackupFormat`]
/// when the parsed value has no usable `users` array.
pub fn parse_backup(bytes: &[u8]) -> Result<Document> {
    let raw: Value = serde_json::from_slice(bytes)?;
    migrate_backup(&raw)
}

fn decode_current(raw: &Value) -> Result<Document> {
    Document::deserialize(raw).map_err(|err| PopoError::Format(err.to_string()))
}

fn migrate_legacy(raw: &Value) -> Result<Document> {
    let legacy =
        LegacyDocument::deserialize(raw).map_err(|err| PopoError::Format(err.to_string()))?;

    let user_id = legacy
        .current_user_id
        .as_ref()
        .filter(|value| is_truthy(value))
        .map(|value| {
            EntityId::deserialize(value).map_err(|err| PopoError::Format(err.to_string()))
        })
        .transpose()?
        .unwrap_or_else(|| EntityId::from(DEFAULT_USER_ID));

    let user = User {
        id: user_id.clone(),
        name: Some(text_or(legacy.profile.get("name"), DEFAULT_USER_NAME)),
        role: Some(text_or(legacy.profile.get("role"), DEFAULT_ROLE)),
        avatar: Some(text_or(legacy.profile.get("avatar"), "")),
        processes: legacy.processes,
        steps: legacy.steps,
        extra: BTreeMap::new(),
    };

    tracing::debug!(
        user = %user.id,
        processes = user.processes.len(),
        steps = user.steps.len(),
        "migrated legacy single-profile document"
    );

    Ok(Document {
        current_user_id: Some(user_id),
        users: vec![user],
        theme: Some(legacy.theme.as_ref().and_then(theme_of).unwrap_or_default()),
        extra: BTreeMap::new(),
    })
}

/// Non-empty string content, or `fallback` for missing/empty/non-string values.
fn text_or(value: Option<&Value>, fallback: &str) -> String {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn theme_of(value: &Value) -> Option<Theme> {
    value.as_str().and_then(|raw| raw.parse().ok())
}

/// JSON truthiness as older builds evaluated it (`null`, `false`, `0`, `""` are falsy).
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
