use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::EntityId;

/// A named project/checklist container owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Process {
    #[must_use]
    pub fn new(id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: Some(title.into()),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

/// A task inside a process.
///
/// `process_id` is a foreign key into the owning user's processes. A step
/// whose process no longer exists is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Absent (`None`), explicitly unscheduled (`Some(None)`), or scheduled.
    #[allow(clippy::option_option)]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::tristate"
    )]
    pub scheduled_at: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Step {
    #[must_use]
    pub fn new(id: EntityId, process_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id,
            process_id: Some(process_id),
            title: Some(title.into()),
            done: Some(false),
            scheduled_at: Some(None),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }

    #[must_use]
    pub fn belongs_to(&self, process_id: &EntityId) -> bool {
        self.process_id.as_ref() == Some(process_id)
    }

    /// Raw scheduled timestamp; empty strings count as unscheduled.
    #[must_use]
    pub fn scheduled_at(&self) -> Option<&str> {
        self.scheduled_at
            .as_ref()
            .and_then(Option::as_deref)
            .filter(|raw| !raw.trim().is_empty())
    }

    /// Parsed scheduled timestamp, if the stored text is recognizable.
    #[must_use]
    pub fn scheduled_time(&self) -> Option<NaiveDateTime> {
        self.scheduled_at().and_then(parse_timestamp)
    }
}

/// Parse the timestamp shapes the tracker has written over time: RFC 3339,
/// `datetime-local` values with or without seconds, and bare dates.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
