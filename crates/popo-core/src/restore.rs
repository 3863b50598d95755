//! Restore modes: merge or override, for the whole document or only the
//! current profile.
//!
//! The mode is a 2×2 choice made once per restore by the operator; it is
//! never inferred from the backup. All functions are pure and return the next
//! document, leaving persistence to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PopoError, Result};
use crate::merge::{
    MergeCounts, MergeReport, Merged, merge_documents, merge_user, resolve_current_user,
};
use crate::model::{Document, EntityId, User};

/// Whether incoming data is merged into or replaces local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    #[default]
    Merge,
    Override,
}

/// How much of the local document a restore may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreScope {
    /// Every profile plus document-level settings.
    #[default]
    All,
    /// Only the current profile's record.
    CurrentProfile,
}

impl RestoreMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestoreMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "override" => Ok(Self::Override),
            other => Err(format!("unknown restore mode '{other}' (expected merge or override)")),
        }
    }
}

impl RestoreScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::CurrentProfile => "current-profile",
        }
    }
}

impl fmt::Display for RestoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a restore: the next document, plus merge tallies in merge mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub document: Document,
    pub mode: RestoreMode,
    pub scope: RestoreScope,
    pub report: Option<MergeReport>,
}

/// Apply `incoming` to `base` according to `mode` and `scope`.
///
/// # Errors
///
/// - [`PopoError::EmptyBackup`] when a scoped restore finds no incoming user,
///   or a whole-document override would leave no users.
/// - [`PopoError::UserNotFound`] when a scoped restore runs against a base
///   whose current user does not resolve.
pub fn restore(
    base: Document,
    incoming: Document,
    mode: RestoreMode,
    scope: RestoreScope,
) -> Result<RestoreOutcome> {
    let (document, report) = match (mode, scope) {
        (RestoreMode::Merge, RestoreScope::All) => {
            let Merged { document, report } = merge_documents(base, incoming);
            (document, Some(report))
        }
        (RestoreMode::Merge, RestoreScope::CurrentProfile) => {
            let Merged { document, report } = merge_into_profile(base, incoming)?;
            (document, Some(report))
        }
        (RestoreMode::Override, RestoreScope::All) => (override_document(incoming)?, None),
        (RestoreMode::Override, RestoreScope::CurrentProfile) => {
            (override_profile(base, incoming)?, None)
        }
    };

    tracing::info!(
        mode = %mode,
        scope = %scope,
        users = document.users.len(),
        current = ?document.current_user_id,
        "restored backup"
    );

    Ok(RestoreOutcome {
        document,
        mode,
        scope,
        report,
    })
}

/// Merge one incoming profile into the base's current profile only.
///
/// The incoming profile is the one whose id matches the current user, or
/// else the backup's first profile. Its id is forced to the current user's
/// id; every other base profile is left untouched.
///
/// # Errors
///
/// See [`restore`].
pub fn merge_into_profile(base: Document, incoming: Document) -> Result<Merged> {
    let (mut document, current_id, mut chosen) = prepare_scoped(base, incoming)?;
    let Some(target) = document.user_mut(&current_id) else {
        return Err(PopoError::UserNotFound(current_id));
    };

    chosen.id = current_id;
    let (processes, steps) = merge_user(target, chosen);
    let report = MergeReport {
        users: MergeCounts {
            added: 0,
            updated: 1,
        },
        processes,
        steps,
    };

    Ok(Merged { document, report })
}

/// Replace the whole document with `incoming`, repointing the current user
/// to the first profile if it does not resolve.
///
/// # Errors
///
/// [`PopoError::EmptyBackup`] if `incoming` has no users.
pub fn override_document(mut incoming: Document) -> Result<Document> {
    if incoming.users.is_empty() {
        return Err(PopoError::EmptyBackup);
    }
    incoming.current_user_id =
        resolve_current_user(&incoming.users, incoming.current_user_id.as_ref(), None);
    Ok(incoming)
}

/// Replace only the current profile's record with the chosen incoming
/// profile, keeping the current user's id.
///
/// # Errors
///
/// See [`restore`].
pub fn override_profile(base: Document, incoming: Document) -> Result<Document> {
    let (mut document, current_id, mut chosen) = prepare_scoped(base, incoming)?;
    let Some(target) = document.user_mut(&current_id) else {
        return Err(PopoError::UserNotFound(current_id));
    };
    chosen.id = current_id;
    *target = chosen;
    Ok(document)
}

/// Resolve the base's current user id and pick the incoming profile for a
/// scoped restore.
fn prepare_scoped(base: Document, incoming: Document) -> Result<(Document, EntityId, User)> {
    let current_id = base
        .current_user()
        .map(|user| user.id.clone())
        .ok_or_else(|| {
            PopoError::UserNotFound(
                base.current_user_id
                    .clone()
                    .unwrap_or_else(|| EntityId::from("")),
            )
        })?;
    let chosen = pick_incoming_user(incoming, &current_id).ok_or(PopoError::EmptyBackup)?;
    Ok((base, current_id, chosen))
}

fn pick_incoming_user(incoming: Document, current_id: &EntityId) -> Option<User> {
    let mut users = incoming.users;
    let position = users
        .iter()
        .position(|user| &user.id == current_id)
        .unwrap_or(0);
    (position < users.len()).then(|| users.swap_remove(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).expect("document fixture")
    }

    fn base() -> Document {
        doc(json!({
            "currentUserId": "a",
            "users": [
                {"id": "a", "name": "Ann", "role": "Lead", "processes": [{"id": "p1", "title": "X"}], "steps": []},
                {"id": "b", "name": "Ben", "role": "User", "processes": [], "steps": []}
            ],
            "theme": "light"
        }))
    }

    #[test]
    fn scoped_merge_forces_current_id_and_keeps_others() {
        let incoming = doc(json!({
            "users": [{"id": "z", "name": "Zed", "processes": [{"id": "p2", "title": "Y"}]}]
        }));
        let before = base();
        let outcome = restore(before.clone(), incoming, RestoreMode::Merge, RestoreScope::CurrentProfile)
            .expect("restore");

        let merged = &outcome.document;
        assert_eq!(merged.users.len(), 2);
        assert_eq!(merged.users[0].id, EntityId::from("a"));
        assert_eq!(merged.users[0].name(), "Zed");
        assert_eq!(merged.users[0].role(), "Lead");
        assert_eq!(merged.users[0].processes.len(), 2);
        assert_eq!(merged.users[1], before.users[1]);
        assert_eq!(merged.theme, before.theme);
        assert!(!merged.users.iter().any(|u| u.id == EntityId::from("z")));
    }

    #[test]
    fn scoped_restore_prefers_matching_incoming_user() {
        let incoming = doc(json!({
            "users": [{"id": "b", "name": "Other"}, {"id": "a", "name": "Match"}]
        }));
        let outcome = restore(base(), incoming, RestoreMode::Merge, RestoreScope::CurrentProfile)
            .expect("restore");
        assert_eq!(outcome.document.users[0].name(), "Match");
        assert_eq!(outcome.document.users[1].name(), "Ben");
    }

    #[test]
    fn scoped_restore_with_empty_backup_fails() {
        let incoming = doc(json!({"users": []}));
        for mode in [RestoreMode::Merge, RestoreMode::Override] {
            let err = restore(base(), incoming.clone(), mode, RestoreScope::CurrentProfile)
                .expect_err("must fail");
            assert!(matches!(err, PopoError::EmptyBackup));
        }
    }

    #[test]
    fn scoped_override_replaces_record_exactly() {
        let incoming = doc(json!({"users": [{"id": "z", "name": "Zed", "steps": [{"id": "s"}]}]}));
        let outcome = restore(base(), incoming, RestoreMode::Override, RestoreScope::CurrentProfile)
            .expect("restore");
        let replaced = &outcome.document.users[0];
        assert_eq!(
            serde_json::to_value(replaced).expect("serialize"),
            json!({"id": "a", "name": "Zed", "processes": [], "steps": [{"id": "s"}]})
        );
        assert_eq!(outcome.report, None);
    }

    #[test]
    fn whole_override_replaces_users_and_repoints_current() {
        let incoming = doc(json!({"currentUserId": "ghost", "users": [{"id": "n", "name": "New"}]}));
        let outcome = restore(base(), incoming, RestoreMode::Override, RestoreScope::All)
            .expect("restore");
        assert_eq!(outcome.document.users.len(), 1);
        assert_eq!(outcome.document.current_user_id, Some("n".into()));
    }

    #[test]
    fn whole_override_with_no_users_is_rejected() {
        let err = restore(base(), doc(json!({"users": []})), RestoreMode::Override, RestoreScope::All)
            .expect_err("must fail");
        assert!(matches!(err, PopoError::EmptyBackup));
    }

    #[test]
    fn whole_merge_reports_counts() {
        let incoming = doc(json!({
            "currentUserId": "c",
            "users": [{"id": "a", "processes": [{"id": "p1", "title": "X2"}]}, {"id": "c", "name": "Cy"}]
        }));
        let outcome = restore(base(), incoming, RestoreMode::Merge, RestoreScope::All)
            .expect("restore");
        let report = outcome.report.expect("merge has a report");
        assert_eq!(report.users.added, 1);
        assert_eq!(report.users.updated, 1);
        assert_eq!(report.processes.updated, 1);
        assert_eq!(outcome.document.current_user_id, Some("c".into()));
    }

    #[test]
    fn null_lists_in_backup_merge_as_empty() {
        let incoming = crate::migrate::parse_backup(
            br#"{"users":[{"id":"a","name":"Ann 2","processes":null,"steps":null}]}"#,
        )
        .expect("parse");
        let before = base();
        let outcome = restore(before.clone(), incoming, RestoreMode::Merge, RestoreScope::All)
            .expect("restore");
        let ann = &outcome.document.users[0];
        assert_eq!(ann.name(), "Ann 2");
        assert_eq!(ann.processes, before.users[0].processes);
        assert!(ann.steps.is_empty());
    }

    #[test]
    fn restore_mode_parses() {
        assert_eq!("Override".parse::<RestoreMode>(), Ok(RestoreMode::Override));
        assert_eq!("merge".parse::<RestoreMode>(), Ok(RestoreMode::Merge));
        assert!("replace".parse::<RestoreMode>().is_err());
    }
}
