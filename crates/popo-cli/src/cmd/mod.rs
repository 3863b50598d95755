pub mod backup;
pub mod completions;
pub mod init;
pub mod pending;
pub mod process;
pub mod profile;
pub mod status;
pub mod step;
pub mod theme;

use popo_core::config::{EffectiveConfig, StorageBackend};
use popo_core::images::FsImageStore;
use popo_core::model::User;
use popo_core::store::ConfiguredStore;
use popo_core::{EntityId, PopoError, RestoreMode, Tracker};
use std::path::{Path, PathBuf};

use crate::output::{CliError, OutputMode, render_error};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputMode,
    data_dir: PathBuf,
    backend: StorageBackend,
    default_restore_mode: RestoreMode,
}

impl Context {
    pub fn new(config: &EffectiveConfig, output: OutputMode) -> Self {
        Self {
            output,
            data_dir: config.data_dir.clone(),
            backend: config.user.storage.backend,
            default_restore_mode: config.user.restore.default_mode,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub const fn backend(&self) -> StorageBackend {
        self.backend
    }

    pub const fn default_restore_mode(&self) -> RestoreMode {
        self.default_restore_mode
    }

    pub fn images(&self) -> FsImageStore {
        FsImageStore::new(&self.data_dir)
    }

    /// Load (and migrate, if needed) the stored document.
    pub fn open(&self) -> anyhow::Result<Tracker<ConfiguredStore>> {
        if self.backend == StorageBackend::Memory {
            tracing::debug!("memory backend: changes last for this invocation only");
        }
        let store = ConfiguredStore::open(self.backend, &self.data_dir);
        Tracker::open(store).map_err(|err| self.fail(err))
    }

    /// Render `err` for the operator and hand it back for `?`.
    pub fn fail(&self, err: PopoError) -> anyhow::Error {
        if let Err(render_err) = render_error(self.output, &CliError::from(&err)) {
            return render_err;
        }
        anyhow::Error::new(err)
    }
}

/// Resolve an id typed by the operator against known ids.
///
/// An exact match wins. Otherwise a unique prefix of a text id is accepted,
/// so long generated ids can be shortened.
pub fn resolve_id<'a>(known: impl IntoIterator<Item = &'a EntityId>, raw: &str) -> Option<EntityId> {
    let raw = raw.trim();
    let known: Vec<&EntityId> = known.into_iter().collect();
    if let Some(exact) = known.iter().find(|id| id.matches(raw)) {
        return Some((*exact).clone());
    }
    if raw.is_empty() {
        return None;
    }
    let mut prefixed = known
        .iter()
        .filter(|id| matches!(id, EntityId::Text(text) if text.starts_with(raw)));
    match (prefixed.next(), prefixed.next()) {
        (Some(only), None) => Some((*only).clone()),
        _ => None,
    }
}

pub fn resolve_user(ctx: &Context, users: &[User], raw: &str) -> anyhow::Result<EntityId> {
    resolve_id(users.iter().map(|user| &user.id), raw)
        .ok_or_else(|| ctx.fail(PopoError::UserNotFound(EntityId::from(raw))))
}

pub fn resolve_process(ctx: &Context, user: &User, raw: &str) -> anyhow::Result<EntityId> {
    resolve_id(user.processes.iter().map(|process| &process.id), raw)
        .ok_or_else(|| ctx.fail(PopoError::ProcessNotFound(EntityId::from(raw))))
}

pub fn resolve_step(ctx: &Context, user: &User, raw: &str) -> anyhow::Result<EntityId> {
    resolve_id(user.steps.iter().map(|step| &step.id), raw)
        .ok_or_else(|| ctx.fail(PopoError::StepNotFound(EntityId::from(raw))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<EntityId> {
        vec![
            EntityId::from("3f2a9c"),
            EntityId::from("3f77aa"),
            EntityId::from("b1"),
            EntityId::from(7),
        ]
    }

    #[test]
    fn exact_match_wins() {
        let ids = ids();
        assert_eq!(resolve_id(&ids, "b1"), Some(EntityId::from("b1")));
        assert_eq!(resolve_id(&ids, "7"), Some(EntityId::from(7)));
    }

    #[test]
    fn unique_prefix_resolves() {
        let ids = ids();
        assert_eq!(resolve_id(&ids, "3f2"), Some(EntityId::from("3f2a9c")));
    }

    #[test]
    fn ambiguous_or_unknown_prefix_does_not_resolve() {
        let ids = ids();
        assert_eq!(resolve_id(&ids, "3f"), None);
        assert_eq!(resolve_id(&ids, "zz"), None);
        assert_eq!(resolve_id(&ids, ""), None);
    }
}
