use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a user, process or step.
///
/// Documents written by older builds used numeric ids in places, so an id is
/// either a JSON string or a JSON integer. Comparison is exact: the string
/// `"1"` and the number `1` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Text(String),
    Number(i64),
}

impl EntityId {
    /// Id of the user created on first run.
    #[must_use]
    pub fn default_user() -> Self {
        Self::Text(crate::model::DEFAULT_USER_ID.to_string())
    }

    /// True when the id renders to `raw`, letting command-line input address
    /// both string and numeric ids.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        match self {
            Self::Text(text) => text == raw,
            Self::Number(n) => raw.trim().parse::<i64>().is_ok_and(|parsed| parsed == *n),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_number_ids_round_trip_in_their_own_shape() {
        let text: EntityId = serde_json::from_str("\"p1\"").expect("string id");
        let number: EntityId = serde_json::from_str("7").expect("numeric id");
        assert_eq!(text, EntityId::from("p1"));
        assert_eq!(number, EntityId::from(7));
        assert_eq!(serde_json::to_string(&number).expect("serialize"), "7");
        assert_eq!(serde_json::to_string(&text).expect("serialize"), "\"p1\"");
    }

    #[test]
    fn string_one_and_number_one_are_distinct() {
        assert_ne!(EntityId::from("1"), EntityId::from(1));
    }

    #[test]
    fn matches_accepts_rendered_form() {
        assert!(EntityId::from(42).matches("42"));
        assert!(EntityId::from("user-1").matches("user-1"));
        assert!(!EntityId::from("user-1").matches("user"));
    }
}
