use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{EntityId, Process, Step};

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One profile inside the document. Owns its processes and steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Empty, or a reference into the image store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// `null` reads as an empty list.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub processes: Vec<Process>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub steps: Vec<Step>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    /// A fresh profile with role "User", no avatar and no data.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            role: Some(super::DEFAULT_ROLE.to_string()),
            avatar: Some(String::new()),
            processes: Vec::new(),
            steps: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or_default()
    }

    /// Avatar reference, `None` when unset or empty.
    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref().filter(|avatar| !avatar.is_empty())
    }

    /// First letter of the name, used where no avatar image exists.
    #[must_use]
    pub fn initial(&self) -> char {
        self.name().chars().next().unwrap_or('U')
    }

    #[must_use]
    pub fn process(&self, id: &EntityId) -> Option<&Process> {
        self.processes.iter().find(|process| &process.id == id)
    }

    #[must_use]
    pub fn step(&self, id: &EntityId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == id)
    }

    /// Steps of one process in stored order. Borrows only `self`.
    pub fn steps_of<'a>(
        &'a self,
        process_id: &EntityId,
    ) -> impl Iterator<Item = &'a Step> + use<'a> {
        let process_id = process_id.clone();
        self.steps.iter().filter(move |step| step.belongs_to(&process_id))
    }

    /// Steps whose process is missing from this user's processes.
    pub fn orphaned_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| {
            step.process_id
                .as_ref()
                .is_none_or(|process_id| self.process(process_id).is_none())
        })
    }

    /// Completion percentage of a process, rounded to the nearest integer.
    /// A process without steps is 0% complete.
    #[must_use]
    pub fn progress(&self, process_id: &EntityId) -> u8 {
        let (total, done) = self
            .steps_of(process_id)
            .fold((0_usize, 0_usize), |(total, done), step| {
                (total + 1, done + usize::from(step.is_done()))
            });
        if total == 0 {
            return 0;
        }
        // done <= total, so the quotient is within 0..=100.
        u8::try_from((done * 200 + total) / (total * 2)).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_with_steps(done_flags: &[bool]) -> User {
        let mut user = User::new("u1".into(), "Ada");
        user.processes.push(Process::new("p1".into(), "Launch"));
        for (i, done) in done_flags.iter().enumerate() {
            let mut step = Step::new(format!("s{i}").into(), "p1".into(), "step");
            step.done = Some(*done);
            user.steps.push(step);
        }
        user
    }

    #[test]
    fn new_user_matches_first_run_shape() {
        let user = User::new("user-1".into(), "Me");
        assert_eq!(
            serde_json::to_value(&user).expect("serialize"),
            json!({"id": "user-1", "name": "Me", "role": "User", "avatar": "", "processes": [], "steps": []})
        );
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let user: User = serde_json::from_value(json!({"id": "u1", "name": "A"})).expect("user");
        assert!(user.processes.is_empty());
        assert!(user.steps.is_empty());
        assert_eq!(user.role, None);
    }

    #[test]
    fn null_lists_read_as_empty() {
        let user: User = serde_json::from_value(
            json!({"id": "u1", "name": "A", "processes": null, "steps": null}),
        )
        .expect("user");
        assert!(user.processes.is_empty());
        assert!(user.steps.is_empty());
        assert_eq!(serde_json::to_value(&user).expect("serialize")["steps"], json!([]));
    }

    #[test]
    fn explicit_null_name_is_dropped_on_write() {
        let user: User =
            serde_json::from_value(json!({"id": "u1", "name": null})).expect("user");
        assert_eq!(user.name, None);
        assert_eq!(user.name(), "");
        let written = serde_json::to_value(&user).expect("serialize");
        assert!(written.get("name").is_none());
    }

    #[test]
    fn steps_of_outlives_the_lookup_key() {
        let user = user_with_steps(&[true, false]);
        let steps: Vec<&Step> = user.steps_of(&EntityId::from("p1")).collect();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn progress_rounds_like_the_dashboard() {
        assert_eq!(user_with_steps(&[]).progress(&"p1".into()), 0);
        assert_eq!(user_with_steps(&[true, false, false]).progress(&"p1".into()), 33);
        assert_eq!(user_with_steps(&[true, true, false]).progress(&"p1".into()), 67);
        assert_eq!(user_with_steps(&[true, false]).progress(&"p1".into()), 50);
        assert_eq!(user_with_steps(&[true]).progress(&"p1".into()), 100);
    }

    #[test]
    fn orphaned_steps_are_listed_not_removed() {
        let mut user = user_with_steps(&[false]);
        user.steps
            .push(Step::new("lost".into(), "gone".into(), "orphan"));
        let orphans: Vec<_> = user.orphaned_steps().map(|step| step.id.clone()).collect();
        assert_eq!(orphans, vec![EntityId::from("lost")]);
        assert_eq!(user.steps.len(), 2);
    }

    #[test]
    fn initial_falls_back_to_u() {
        let mut user = User::new("u1".into(), "");
        assert_eq!(user.initial(), 'U');
        user.name = Some("Zoe".into());
        assert_eq!(user.initial(), 'Z');
    }
}
