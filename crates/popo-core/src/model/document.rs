use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{EntityId, User};

/// Presentation theme stored with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    /// Follow the operating system; resolved by the presentation layer.
    System,
}

impl Theme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// The theme a dark-mode toggle switches to.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light | Self::System => Self::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme '{other}' (expected light, dark or system)")),
        }
    }
}

fn lenient_theme<'de, D>(deserializer: D) -> Result<Option<Theme>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let theme = raw.as_str().and_then(|text| text.parse().ok());
    if theme.is_none() {
        tracing::warn!(theme = %raw, "unknown theme; falling back to light");
    }
    Ok(theme)
}

/// The whole persisted state: every profile plus the active-profile pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<EntityId>,
    pub users: Vec<User>,
    /// An unrecognised stored value reads as unset.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_theme"
    )]
    pub theme: Option<Theme>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Document {
    /// The first-run document: a single "Me" profile and the light theme.
    fn default() -> Self {
        Self {
            current_user_id: Some(EntityId::default_user()),
            users: vec![User::new(EntityId::default_user(), super::DEFAULT_USER_NAME)],
            theme: Some(Theme::Light),
            extra: BTreeMap::new(),
        }
    }
}

impl Document {
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme.unwrap_or_default()
    }

    #[must_use]
    pub fn user(&self, id: &EntityId) -> Option<&User> {
        self.users.iter().find(|user| &user.id == id)
    }

    pub fn user_mut(&mut self, id: &EntityId) -> Option<&mut User> {
        self.users.iter_mut().find(|user| &user.id == id)
    }

    #[must_use]
    pub fn contains_user(&self, id: &EntityId) -> bool {
        self.user(id).is_some()
    }

    /// The active profile, if the pointer resolves.
    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.current_user_id.as_ref().and_then(|id| self.user(id))
    }

    pub fn current_user_mut(&mut self) -> Option<&mut User> {
        let id = self.current_user_id.clone()?;
        self.user_mut(&id)
    }

    /// True when `current_user_id` names a member of `users`.
    #[must_use]
    pub fn current_user_resolves(&self) -> bool {
        self.current_user().is_some()
    }

    /// Restore the document invariants: at least one user exists and the
    /// current-user pointer resolves (falling back to the first user).
    ///
    /// Returns `true` if anything was changed.
    pub fn repair_current_user(&mut self) -> bool {
        let mut changed = false;
        if self.users.is_empty() {
            tracing::warn!("document has no users; adding the default profile");
            self.users.push(User::new(
                EntityId::default_user(),
                super::DEFAULT_USER_NAME,
            ));
            changed = true;
        }
        if !self.current_user_resolves() {
            let first = self.users[0].id.clone();
            tracing::warn!(
                previous = ?self.current_user_id,
                repointed = %first,
                "current user does not resolve; using first profile"
            );
            self.current_user_id = Some(first);
            changed = true;
        }
        changed
    }

    /// Single-profile projection used for profile exports:
    /// `{currentUserId: user.id, users: [user], theme}`.
    #[must_use]
    pub fn profile_projection(&self, user: &User) -> Self {
        Self {
            current_user_id: Some(user.id.clone()),
            users: vec![user.clone()],
            theme: self.theme,
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_run_document_matches_expected_json() {
        let doc = Document::default();
        assert_eq!(
            serde_json::to_value(&doc).expect("serialize"),
            json!({
                "currentUserId": "user-1",
                "users": [{
                    "id": "user-1",
                    "name": "Me",
                    "role": "User",
                    "avatar": "",
                    "processes": [],
                    "steps": []
                }],
                "theme": "light"
            })
        );
    }

    #[test]
    fn repair_repoints_dangling_current_user() {
        let mut doc = Document::default();
        doc.users.push(User::new("u2".into(), "Bob"));
        doc.current_user_id = Some("ghost".into());

        assert!(doc.repair_current_user());
        assert_eq!(doc.current_user_id, Some(EntityId::default_user()));
        assert!(!doc.repair_current_user(), "second repair is a no-op");
    }

    #[test]
    fn repair_fills_empty_user_list() {
        let mut doc = Document {
            current_user_id: None,
            users: Vec::new(),
            theme: None,
            extra: BTreeMap::new(),
        };
        assert!(doc.repair_current_user());
        assert_eq!(doc.users.len(), 1);
        assert!(doc.current_user_resolves());
    }

    #[test]
    fn theme_parses_case_insensitively_and_toggles() {
        assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::System.toggled(), Theme::Dark);
    }

    #[test]
    fn unknown_stored_theme_reads_as_light() {
        for raw in [json!("sepia"), json!(""), json!(3), Value::Null] {
            let doc: Document =
                serde_json::from_value(json!({"users": [{"id": "a"}], "theme": raw}))
                    .expect("document");
            assert_eq!(doc.theme, None);
            assert_eq!(doc.theme(), Theme::Light);
        }
        let doc: Document =
            serde_json::from_value(json!({"users": [], "theme": "dark"})).expect("document");
        assert_eq!(doc.theme, Some(Theme::Dark));
    }

    #[test]
    fn profile_projection_contains_only_that_user() {
        let mut doc = Document::default();
        doc.users.push(User::new("u2".into(), "Bob"));
        doc.theme = Some(Theme::Dark);
        let projection = doc.profile_projection(&doc.users[1]);
        assert_eq!(projection.current_user_id, Some("u2".into()));
        assert_eq!(projection.users.len(), 1);
        assert_eq!(projection.theme, Some(Theme::Dark));
    }
}
