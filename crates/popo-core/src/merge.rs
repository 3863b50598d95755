//! Id-keyed, field-level merge of documents.
//!
//! # Merge Semantics
//!
//! Merging combines a **base** document (local state) with an **incoming**
//! document (an uploaded backup), profile by profile and entity by entity:
//!
//! - Users, processes and steps are matched by [`EntityId`]. Unseen ids are
//!   appended in incoming order after the base entries, which keep their
//!   original order.
//! - Matched entities are merged per field. A field the incoming entity does
//!   not carry never erases the base value; a field it does carry wins.
//! - A matched user's `processes` and `steps` are merged by id rather than
//!   replaced.
//! - The merged `currentUserId` always resolves (see [`resolve_current_user`]).
//!
//! Merging is a pure function of two snapshots. Nothing here touches storage.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::model::{Document, EntityId, Process, Step, User};

/// Entities addressable by a stable id.
pub trait Keyed {
    fn key(&self) -> &EntityId;
}

impl Keyed for Process {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

impl Keyed for Step {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

impl Keyed for User {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

/// Non-destructive field-level merge: `other` overrides only what it carries.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl Merge for Process {
    fn merge(&mut self, other: Self) {
        override_present(&mut self.title, other.title);
        merge_extra(&mut self.extra, other.extra);
    }
}

impl Merge for Step {
    fn merge(&mut self, other: Self) {
        override_present(&mut self.process_id, other.process_id);
        override_present(&mut self.title, other.title);
        override_present(&mut self.done, other.done);
        // `Some(None)` is an explicit unschedule and does override.
        override_present(&mut self.scheduled_at, other.scheduled_at);
        merge_extra(&mut self.extra, other.extra);
    }
}

impl Merge for User {
    fn merge(&mut self, other: Self) {
        merge_user(self, other);
    }
}

/// Added/updated tallies for one entity kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeCounts {
    /// Incoming entities whose id was new.
    pub added: usize,
    /// Incoming entities merged into an existing entity.
    pub updated: usize,
}

impl MergeCounts {
    fn absorb(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
    }
}

/// What a merge did, per entity kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub users: MergeCounts,
    pub processes: MergeCounts,
    pub steps: MergeCounts,
}

/// A merged document together with its [`MergeReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub document: Document,
    pub report: MergeReport,
}

/// Union two keyed lists by id.
///
/// The base keeps its order (a repeated base id collapses into its first
/// position, holding the last occurrence). Each incoming entity is merged into
/// its match, or appended when its id is unseen.
pub fn merge_by_id<T: Keyed + Merge>(base: Vec<T>, incoming: Vec<T>) -> (Vec<T>, MergeCounts) {
    let (mut merged, mut index) = index_by_id(base);
    let mut counts = MergeCounts::default();

    for entity in incoming {
        if let Some(&slot) = index.get(entity.key()) {
            merged[slot].merge(entity);
            counts.updated += 1;
        } else {
            index.insert(entity.key().clone(), merged.len());
            merged.push(entity);
            counts.added += 1;
        }
    }

    (merged, counts)
}

/// Merge two user lists. Matched users take incoming scalars where present
/// and have their processes and steps merged by id.
#[must_use]
pub fn merge_users(base: Vec<User>, incoming: Vec<User>) -> (Vec<User>, MergeReport) {
    let (mut merged, mut index) = index_by_id(base);
    let mut report = MergeReport::default();

    for user in incoming {
        if let Some(&slot) = index.get(&user.id) {
            let (processes, steps) = merge_user(&mut merged[slot], user);
            report.processes.absorb(processes);
            report.steps.absorb(steps);
            report.users.updated += 1;
        } else {
            index.insert(user.id.clone(), merged.len());
            report.processes.added += user.processes.len();
            report.steps.added += user.steps.len();
            merged.push(user);
            report.users.added += 1;
        }
    }

    (merged, report)
}

/// Merge a whole incoming document into `base`.
///
/// Users are merged with [`merge_users`]; `theme` and unknown top-level keys
/// take the incoming value when it is present; the current user is chosen by
/// [`resolve_current_user`].
#[must_use]
pub fn merge_documents(base: Document, incoming: Document) -> Merged {
    let Document {
        current_user_id: base_current,
        users: base_users,
        theme: base_theme,
        mut extra,
    } = base;
    let Document {
        current_user_id: incoming_current,
        users: incoming_users,
        theme: incoming_theme,
        extra: incoming_extra,
    } = incoming;

    let (users, report) = merge_users(base_users, incoming_users);
    merge_extra(&mut extra, incoming_extra);
    let current_user_id =
        resolve_current_user(&users, incoming_current.as_ref(), base_current.as_ref());

    tracing::debug!(
        users_added = report.users.added,
        users_updated = report.users.updated,
        processes_added = report.processes.added,
        steps_added = report.steps.added,
        "merged documents"
    );

    Merged {
        document: Document {
            current_user_id,
            users,
            theme: incoming_theme.or(base_theme),
            extra,
        },
        report,
    }
}

/// Pick the current user after a merge: the incoming pointer if it resolves,
/// else the base pointer if it still resolves, else the first user.
#[must_use]
pub fn resolve_current_user(
    users: &[User],
    incoming: Option<&EntityId>,
    base: Option<&EntityId>,
) -> Option<EntityId> {
    let resolves = |id: &&EntityId| users.iter().any(|user| &user.id == *id);
    incoming
        .filter(resolves)
        .or_else(|| base.filter(resolves))
        .cloned()
        .or_else(|| users.first().map(|user| user.id.clone()))
}

/// Field-level user merge, returning the process and step tallies.
pub(crate) fn merge_user(base: &mut User, other: User) -> (MergeCounts, MergeCounts) {
    let User {
        id: _,
        name,
        role,
        avatar,
        processes,
        steps,
        extra,
    } = other;

    override_present(&mut base.name, name);
    override_present(&mut base.role, role);
    override_present(&mut base.avatar, avatar);
    merge_extra(&mut base.extra, extra);

    let (merged_processes, process_counts) =
        merge_by_id(std::mem::take(&mut base.processes), processes);
    let (merged_steps, step_counts) = merge_by_id(std::mem::take(&mut base.steps), steps);
    base.processes = merged_processes;
    base.steps = merged_steps;

    (process_counts, step_counts)
}

fn index_by_id<T: Keyed>(entities: Vec<T>) -> (Vec<T>, HashMap<EntityId, usize>) {
    let mut ordered: Vec<T> = Vec::with_capacity(entities.len());
    let mut index: HashMap<EntityId, usize> = HashMap::with_capacity(entities.len());
    for entity in entities {
        if let Some(&slot) = index.get(entity.key()) {
            ordered[slot] = entity;
        } else {
            index.insert(entity.key().clone(), ordered.len());
            ordered.push(entity);
        }
    }
    (ordered, index)
}

fn override_present<T>(target: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *target = incoming;
    }
}

fn merge_extra(target: &mut BTreeMap<String, Value>, incoming: BTreeMap<String, Value>) {
    target.extend(incoming);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Theme;
    use serde_json::json;

    fn user(value: Value) -> User {
        serde_json::from_value(value).expect("user fixture")
    }

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).expect("document fixture")
    }

    #[test]
    fn omitted_scalar_does_not_erase_base_value() {
        let base = vec![user(json!({"id": 1, "name": "A", "role": "R"}))];
        let incoming = vec![user(json!({"id": 1, "name": "A2"}))];
        let (merged, report) = merge_users(base, incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name(), "A2");
        assert_eq!(merged[0].role(), "R");
        assert_eq!(report.users.updated, 1);
    }

    #[test]
    fn processes_union_by_id_without_duplicates() {
        let base = vec![user(json!({"id": "u", "processes": [{"id": "p1", "title": "X"}]}))];
        let incoming = vec![user(json!({"id": "u", "processes": [
            {"id": "p1", "title": "Y"},
            {"id": "p2", "title": "Z"}
        ]}))];
        let (merged, report) = merge_users(base, incoming);

        assert_eq!(
            serde_json::to_value(&merged[0].processes).expect("serialize"),
            json!([{"id": "p1", "title": "Y"}, {"id": "p2", "title": "Z"}])
        );
        assert_eq!(report.processes, MergeCounts { added: 1, updated: 1 });
    }

    #[test]
    fn step_fields_merge_individually() {
        let base: Vec<Step> = serde_json::from_value(json!([{
            "id": "s1", "processId": "p1", "title": "Old", "done": true, "scheduledAt": "2024-01-01T09:00"
        }]))
        .expect("steps");
        let incoming: Vec<Step> =
            serde_json::from_value(json!([{"id": "s1", "title": "New"}])).expect("steps");
        let (merged, _) = merge_by_id(base, incoming);

        assert_eq!(merged[0].title(), "New");
        assert!(merged[0].is_done());
        assert_eq!(merged[0].scheduled_at(), Some("2024-01-01T09:00"));
        assert_eq!(merged[0].process_id, Some("p1".into()));
    }

    #[test]
    fn explicit_null_schedule_clears_base() {
        let base: Vec<Step> =
            serde_json::from_value(json!([{"id": "s1", "scheduledAt": "2024-01-01T09:00"}]))
                .expect("steps");
        let incoming: Vec<Step> =
            serde_json::from_value(json!([{"id": "s1", "scheduledAt": null}])).expect("steps");
        let (merged, _) = merge_by_id(base, incoming);
        assert_eq!(merged[0].scheduled_at, Some(None));
    }

    #[test]
    fn new_users_append_after_existing_in_incoming_order() {
        let base = vec![user(json!({"id": "a"})), user(json!({"id": "b"}))];
        let incoming = vec![
            user(json!({"id": "d"})),
            user(json!({"id": "b", "name": "Bee"})),
            user(json!({"id": "c"})),
        ];
        let (merged, report) = merge_users(base, incoming);
        let ids: Vec<String> = merged.iter().map(|u| u.id.to_string()).collect();
        assert_eq!(ids, ["a", "b", "d", "c"]);
        assert_eq!(report.users, MergeCounts { added: 2, updated: 1 });
    }

    #[test]
    fn new_user_is_appended_verbatim() {
        let incoming_user = user(json!({
            "id": "n", "name": "New", "processes": [{"id": "p"}], "steps": [{"id": "s", "processId": "p"}]
        }));
        let (merged, report) = merge_users(Vec::new(), vec![incoming_user.clone()]);
        assert_eq!(merged, vec![incoming_user]);
        assert_eq!(report.processes.added, 1);
        assert_eq!(report.steps.added, 1);
    }

    #[test]
    fn missing_lists_on_either_side_are_tolerated() {
        let base = vec![user(json!({"id": "u"}))];
        let incoming = vec![user(json!({"id": "u", "steps": [{"id": "s"}]}))];
        let (merged, _) = merge_users(base, incoming);
        assert!(merged[0].processes.is_empty());
        assert_eq!(merged[0].steps.len(), 1);
    }

    #[test]
    fn duplicate_base_ids_collapse_into_first_position() {
        let base: Vec<Process> = serde_json::from_value(json!([
            {"id": "p1", "title": "first"},
            {"id": "p2", "title": "other"},
            {"id": "p1", "title": "second"}
        ]))
        .expect("processes");
        let (merged, _) = merge_by_id(base, Vec::new());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title(), "second");
    }

    #[test]
    fn current_user_prefers_incoming_then_base_then_first() {
        let users = vec![user(json!({"id": "a"})), user(json!({"id": "b"}))];
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        let ghost = EntityId::from("ghost");

        assert_eq!(resolve_current_user(&users, Some(&b), Some(&a)), Some(b.clone()));
        assert_eq!(resolve_current_user(&users, Some(&ghost), Some(&b)), Some(b));
        assert_eq!(resolve_current_user(&users, Some(&ghost), Some(&ghost)), Some(a.clone()));
        assert_eq!(resolve_current_user(&users, None, None), Some(a));
        assert_eq!(resolve_current_user(&[], None, None), None);
    }

    #[test]
    fn document_merge_takes_incoming_theme_only_when_set() {
        let base = doc(json!({"currentUserId": "a", "users": [{"id": "a"}], "theme": "dark"}));
        let without_theme = doc(json!({"users": [{"id": "b"}]}));
        let merged = merge_documents(base.clone(), without_theme).document;
        assert_eq!(merged.theme, Some(Theme::Dark));
        assert_eq!(merged.current_user_id, Some("a".into()));

        let with_theme = doc(json!({"currentUserId": "b", "users": [{"id": "b"}], "theme": "light"}));
        let merged = merge_documents(base, with_theme).document;
        assert_eq!(merged.theme, Some(Theme::Light));
        assert_eq!(merged.current_user_id, Some("b".into()));
    }

    #[test]
    fn unknown_document_keys_merge_per_key() {
        let base = doc(json!({"users": [{"id": "a"}], "keep": 1, "replace": "old"}));
        let incoming = doc(json!({"users": [], "replace": "new"}));
        let merged = merge_documents(base, incoming).document;
        assert_eq!(merged.extra.get("keep"), Some(&json!(1)));
        assert_eq!(merged.extra.get("replace"), Some(&json!("new")));
    }
}
