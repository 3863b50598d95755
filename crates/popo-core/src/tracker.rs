//! The tracker: an in-memory document plus the store it persists to.
//!
//! Every mutation builds the next document from a copy of the current one,
//! saves it, and only then swaps it in. A failed save leaves both the stored
//! and the in-memory document as they were.

use std::path::Path;

use crate::backup::{self, BackupFile};
use crate::error::{PopoError, Result};
use crate::ids::{IdGenerator, RandomIds};
use crate::images::{ImageBlob, ImageStore};
use crate::migrate::parse_backup;
use crate::model::{Document, EntityId, Process, Step, Theme, User};
use crate::restore::{RestoreMode, RestoreOutcome, RestoreScope, restore};
use crate::store::DocumentStore;

pub struct Tracker<S: DocumentStore> {
    store: S,
    document: Document,
    ids: Box<dyn IdGenerator>,
}

impl<S: DocumentStore> std::fmt::Debug for Tracker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore> Tracker<S> {
    /// Load the document from `store`, generating random ids for new entities.
    ///
    /// # Errors
    ///
    /// Propagates load failures from the store.
    pub fn open(store: S) -> Result<Self> {
        Self::open_with_ids(store, Box::new(RandomIds))
    }

    /// Like [`Tracker::open`] with a caller-supplied id generator.
    ///
    /// # Errors
    ///
    /// Propagates load failures from the store.
    pub fn open_with_ids(mut store: S, ids: Box<dyn IdGenerator>) -> Result<Self> {
        let document = store.load()?;
        Ok(Self {
            store,
            document,
            ids,
        })
    }

    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The active profile.
    ///
    /// # Errors
    ///
    /// [`PopoError::UserNotFound`] if the pointer does not resolve, which a
    /// loaded document never allows.
    pub fn current_user(&self) -> Result<&User> {
        self.document
            .current_user()
            .ok_or_else(|| self.dangling_current())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    /// Make `id` the active profile. Switching to the current profile is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`PopoError::UserNotFound`] for an unknown id.
    pub fn switch_profile(&mut self, id: &EntityId) -> Result<()> {
        if self.document.current_user_id.as_ref() == Some(id) {
            return Ok(());
        }
        if !self.document.contains_user(id) {
            return Err(PopoError::UserNotFound(id.clone()));
        }
        let mut next = self.document.clone();
        next.current_user_id = Some(id.clone());
        self.commit(next)
    }

    /// Append a profile without changing the active one. A blank name adds
    /// nothing and returns `None`.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn add_profile(&mut self, name: &str) -> Result<Option<EntityId>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let id = self.ids.next_id();
        let mut next = self.document.clone();
        next.users.push(User::new(id.clone(), name));
        self.commit(next)?;
        tracing::info!(user = %id, name, "added profile");
        Ok(Some(id))
    }

    /// Add one profile per comma- or newline-separated name. Blank entries
    /// are skipped; input with no names adds nothing.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn add_profiles_bulk(&mut self, input: &str) -> Result<Vec<EntityId>> {
        let names: Vec<&str> = input
            .split(['\n', ','])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut next = self.document.clone();
        let mut added = Vec::with_capacity(names.len());
        for name in names {
            let id = self.ids.next_id();
            next.users.push(User::new(id.clone(), name));
            added.push(id);
        }
        self.commit(next)?;
        tracing::info!(count = added.len(), "added profiles");
        Ok(added)
    }

    /// Rename any profile. A blank name is ignored.
    ///
    /// # Errors
    ///
    /// [`PopoError::UserNotFound`] for an unknown id.
    pub fn rename_profile(&mut self, id: &EntityId, name: &str) -> Result<()> {
        let mut next = self.document.clone();
        let user = next
            .user_mut(id)
            .ok_or_else(|| PopoError::UserNotFound(id.clone()))?;
        if name.trim().is_empty() {
            return Ok(());
        }
        user.name = Some(name.trim().to_string());
        self.commit(next)
    }

    /// Update the active profile's name and role.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn update_profile(&mut self, name: &str, role: &str) -> Result<()> {
        self.edit_current(|user| {
            user.name = Some(name.to_string());
            user.role = Some(role.to_string());
            Ok(())
        })
    }

    /// Remove a profile. Removing the active one makes the first remaining
    /// profile active.
    ///
    /// # Errors
    ///
    /// [`PopoError::LastUser`] when it is the only profile,
    /// [`PopoError::UserNotFound`] for an unknown id.
    pub fn delete_profile(&mut self, id: &EntityId) -> Result<()> {
        if !self.document.contains_user(id) {
            return Err(PopoError::UserNotFound(id.clone()));
        }
        if self.document.users.len() <= 1 {
            return Err(PopoError::LastUser);
        }

        let mut next = self.document.clone();
        next.users.retain(|user| &user.id != id);
        if next.current_user_id.as_ref() == Some(id) {
            next.current_user_id = next.users.first().map(|user| user.id.clone());
        }
        self.commit(next)?;
        tracing::info!(user = %id, "deleted profile");
        Ok(())
    }

    /// Upload an avatar and point the active profile at it. `None` (picker
    /// cancelled) changes nothing.
    ///
    /// # Errors
    ///
    /// Upload or save failures.
    pub fn set_avatar(
        &mut self,
        images: &impl ImageStore,
        source: Option<&Path>,
    ) -> Result<Option<String>> {
        let Some(reference) = images.upload(source)? else {
            return Ok(None);
        };
        let stored = reference.clone();
        self.edit_current(|user| {
            user.avatar = Some(stored);
            Ok(())
        })?;
        Ok(Some(reference))
    }

    /// The active profile's avatar image, if it has one and it still exists.
    #[must_use]
    pub fn avatar(&self, images: &impl ImageStore) -> Option<ImageBlob> {
        self.current_user()
            .ok()
            .and_then(User::avatar)
            .and_then(|reference| images.get(reference))
    }

    // -----------------------------------------------------------------------
    // Processes
    // -----------------------------------------------------------------------

    /// Add a process to the active profile. A blank title adds nothing.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn add_process(&mut self, title: &str) -> Result<Option<EntityId>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let id = self.ids.next_id();
        let process = Process::new(id.clone(), title);
        self.edit_current(|user| {
            user.processes.push(process);
            Ok(())
        })?;
        Ok(Some(id))
    }

    /// # Errors
    ///
    /// [`PopoError::ProcessNotFound`] for an unknown id.
    pub fn rename_process(&mut self, id: &EntityId, title: &str) -> Result<()> {
        self.edit_current(|user| {
            let process = user
                .processes
                .iter_mut()
                .find(|process| &process.id == id)
                .ok_or_else(|| PopoError::ProcessNotFound(id.clone()))?;
            process.title = Some(title.to_string());
            Ok(())
        })
    }

    /// Rounded completion percentage of a process.
    ///
    /// # Errors
    ///
    /// [`PopoError::ProcessNotFound`] for an unknown id.
    pub fn progress(&self, process_id: &EntityId) -> Result<u8> {
        let user = self.current_user()?;
        if user.process(process_id).is_none() {
            return Err(PopoError::ProcessNotFound(process_id.clone()));
        }
        Ok(user.progress(process_id))
    }

    /// Steps of one process in display order.
    ///
    /// # Errors
    ///
    /// [`PopoError::ProcessNotFound`] for an unknown id.
    pub fn process_steps(&self, process_id: &EntityId) -> Result<Vec<&Step>> {
        let user = self.current_user()?;
        if user.process(process_id).is_none() {
            return Err(PopoError::ProcessNotFound(process_id.clone()));
        }
        Ok(user.steps_of(process_id).collect())
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Append a step to a process. A blank title adds nothing.
    ///
    /// # Errors
    ///
    /// [`PopoError::ProcessNotFound`] for an unknown process.
    pub fn add_step(
        &mut self,
        process_id: &EntityId,
        title: &str,
        scheduled_at: Option<String>,
    ) -> Result<Option<EntityId>> {
        if self.current_user()?.process(process_id).is_none() {
            return Err(PopoError::ProcessNotFound(process_id.clone()));
        }
        if title.trim().is_empty() {
            return Ok(None);
        }

        let id = self.ids.next_id();
        let mut step = Step::new(id.clone(), process_id.clone(), title);
        step.scheduled_at = Some(scheduled_at.filter(|when| !when.trim().is_empty()));
        self.edit_current(|user| {
            user.steps.push(step);
            Ok(())
        })?;
        Ok(Some(id))
    }

    /// Flip a step's done flag, returning the new value.
    ///
    /// # Errors
    ///
    /// [`PopoError::StepNotFound`] for an unknown id.
    pub fn toggle_step(&mut self, id: &EntityId) -> Result<bool> {
        self.edit_step(id, |step| {
            let done = !step.is_done();
            step.done = Some(done);
            done
        })
    }

    /// # Errors
    ///
    /// [`PopoError::StepNotFound`] for an unknown id.
    pub fn mark_done(&mut self, id: &EntityId) -> Result<()> {
        self.edit_step(id, |step| step.done = Some(true))
    }

    /// # Errors
    ///
    /// [`PopoError::StepNotFound`] for an unknown id.
    pub fn remove_step(&mut self, id: &EntityId) -> Result<()> {
        self.edit_current(|user| {
            let before = user.steps.len();
            user.steps.retain(|step| &step.id != id);
            if user.steps.len() == before {
                return Err(PopoError::StepNotFound(id.clone()));
            }
            Ok(())
        })
    }

    /// Set or clear (`None` or blank) a step's scheduled time.
    ///
    /// # Errors
    ///
    /// [`PopoError::StepNotFound`] for an unknown id.
    pub fn schedule_step(&mut self, id: &EntityId, when: Option<String>) -> Result<()> {
        let when = when.filter(|raw| !raw.trim().is_empty());
        self.edit_step(id, |step| step.scheduled_at = Some(when))
    }

    /// Move the step at position `from` to position `to` among the steps of
    /// one process. Steps of other processes keep their slots.
    ///
    /// # Errors
    ///
    /// [`PopoError::ProcessNotFound`] for an unknown process,
    /// [`PopoError::StepPosition`] when either position is out of range.
    pub fn move_step(&mut self, process_id: &EntityId, from: usize, to: usize) -> Result<()> {
        let user = self.current_user()?;
        if user.process(process_id).is_none() {
            return Err(PopoError::ProcessNotFound(process_id.clone()));
        }
        let len = user.steps_of(process_id).count();
        for index in [from, to] {
            if index >= len {
                return Err(PopoError::StepPosition { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        self.edit_current(|user| {
            let slots: Vec<usize> = user
                .steps
                .iter()
                .enumerate()
                .filter(|(_, step)| step.belongs_to(process_id))
                .map(|(slot, _)| slot)
                .collect();
            let mut within: Vec<Step> = slots.iter().map(|&slot| user.steps[slot].clone()).collect();
            let moved = within.remove(from);
            within.insert(to, moved);
            for (slot, step) in slots.into_iter().zip(within) {
                user.steps[slot] = step;
            }
            Ok(())
        })
    }

    /// Unfinished scheduled steps of the active profile, earliest first.
    /// Unparseable times sort last, in stored order.
    ///
    /// # Errors
    ///
    /// Only if the active profile does not resolve.
    pub fn pending(&self) -> Result<Vec<&Step>> {
        let mut pending: Vec<&Step> = self
            .current_user()?
            .steps
            .iter()
            .filter(|step| !step.is_done() && step.scheduled_at().is_some())
            .collect();
        pending.sort_by_key(|step| {
            let time = step.scheduled_time();
            (time.is_none(), time)
        });
        Ok(pending)
    }

    // -----------------------------------------------------------------------
    // Theme
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Propagates save failures.
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        let mut next = self.document.clone();
        next.theme = Some(theme);
        self.commit(next)
    }

    /// Flip dark and light; any other theme becomes dark.
    ///
    /// # Errors
    ///
    /// Propagates save failures.
    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.document.theme().toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Only if encoding fails.
    pub fn export_all(&self) -> Result<BackupFile> {
        backup::export_all(&self.document)
    }

    /// # Errors
    ///
    /// Only if the active profile does not resolve or encoding fails.
    pub fn export_current_profile(&self) -> Result<BackupFile> {
        backup::export_profile(&self.document, self.current_user()?)
    }

    /// Restore a backup file's bytes with the operator's chosen mode and
    /// scope. Nothing changes unless the whole restore succeeds.
    ///
    /// # Errors
    ///
    /// Parse, migration, restore and save failures, see
    /// [`crate::restore::restore`].
    pub fn restore(
        &mut self,
        bytes: &[u8],
        mode: RestoreMode,
        scope: RestoreScope,
    ) -> Result<RestoreOutcome> {
        let incoming = parse_backup(bytes)?;
        let outcome = restore(self.document.clone(), incoming, mode, scope)?;
        self.commit(outcome.document.clone())?;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn commit(&mut self, next: Document) -> Result<()> {
        self.store.save(&next)?;
        self.document = next;
        Ok(())
    }

    fn edit_current<T>(&mut self, edit: impl FnOnce(&mut User) -> Result<T>) -> Result<T> {
        let mut next = self.document.clone();
        let Some(user) = next.current_user_mut() else {
            return Err(self.dangling_current());
        };
        let out = edit(user)?;
        self.commit(next)?;
        Ok(out)
    }

    fn edit_step<T>(&mut self, id: &EntityId, edit: impl FnOnce(&mut Step) -> T) -> Result<T> {
        self.edit_current(|user| {
            let step = user
                .steps
                .iter_mut()
                .find(|step| &step.id == id)
                .ok_or_else(|| PopoError::StepNotFound(id.clone()))?;
            Ok(edit(step))
        })
    }

    fn dangling_current(&self) -> PopoError {
        PopoError::UserNotFound(
            self.document
                .current_user_id
                .clone()
                .unwrap_or_else(|| EntityId::from("")),
        )
    }
}
