use anyhow::Result;
use clap::Args;
use popo_core::config::StorageBackend;
use popo_core::store::{ConfiguredStore, FileStore};
use serde::Serialize;
use std::io::Write;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Name for the first profile when the store is created.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct InitReport {
    created: bool,
    data_dir: String,
    db_path: Option<String>,
    current_user_id: String,
    current_user_name: String,
}

/// Execute `popo init`.
///
/// Loading the store creates (or migrates) `data/db.json`; this command only
/// makes that explicit and reports where the document lives. `--name` renames
/// the first profile of a freshly created store.
///
/// # Errors
///
/// Returns an error if the store cannot be loaded or written.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let created = ctx.backend() == StorageBackend::Memory
        || !FileStore::new(ctx.data_dir()).db_path().exists();
    let mut tracker = ctx.open()?;

    if created && let Some(name) = args.name.as_deref() {
        let id = tracker.current_user().map_err(|err| ctx.fail(err))?.id.clone();
        tracker
            .rename_profile(&id, name)
            .map_err(|err| ctx.fail(err))?;
    }

    let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
    let db_path = match tracker.store() {
        ConfiguredStore::File(store) => Some(store.db_path().display().to_string()),
        ConfiguredStore::Memory(_) => None,
    };
    let report = InitReport {
        created,
        data_dir: ctx.data_dir().display().to_string(),
        db_path,
        current_user_id: user.id.to_string(),
        current_user_name: user.name().to_string(),
    };

    render_mode(
        ctx.output,
        &report,
        |report, w| {
            writeln!(
                w,
                "{}\t{}\t{}",
                if report.created { "created" } else { "existing" },
                report.db_path.as_deref().unwrap_or("memory"),
                report.current_user_id
            )
        },
        |report, w| {
            pretty_section(
                w,
                if report.created {
                    "Initialized popo store"
                } else {
                    "popo store already initialized"
                },
            )?;
            pretty_kv(w, "Data dir", &report.data_dir)?;
            pretty_kv(w, "Document", report.db_path.as_deref().unwrap_or("(in memory)"))?;
            pretty_kv(
                w,
                "Profile",
                format!("{} ({})", report.current_user_name, report.current_user_id),
            )
        },
    )
}
