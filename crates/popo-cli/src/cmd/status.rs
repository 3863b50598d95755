//! `popo status`: orientation for the active profile.
//!
//! Shows who is active, the theme, every process with its progress, and how
//! many scheduled steps are still pending.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;

use super::Context;
use super::process::ProcessRow;
use crate::output::{Renderable, pretty_kv, pretty_rule, pretty_section, render_mode};

/// Arguments for `popo status`.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
struct StatusOutput {
    user_id: String,
    user_name: String,
    role: String,
    profiles: usize,
    theme: String,
    pending: usize,
    orphaned_steps: usize,
    processes: Vec<ProcessRow>,
}

/// Execute `popo status`.
///
/// # Errors
///
/// Returns an error if the store cannot be loaded or output fails.
pub fn run_status(_args: &StatusArgs, ctx: &Context) -> Result<()> {
    let tracker = ctx.open()?;
    let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
    let pending = tracker.pending().map_err(|err| ctx.fail(err))?.len();

    let status = StatusOutput {
        user_id: user.id.to_string(),
        user_name: user.name().to_string(),
        role: user.role().to_string(),
        profiles: tracker.document().users.len(),
        theme: tracker.document().theme().to_string(),
        pending,
        orphaned_steps: user.orphaned_steps().count(),
        processes: user
            .processes
            .iter()
            .map(|process| ProcessRow::of(user, process))
            .collect(),
    };

    render_mode(
        ctx.output,
        &status,
        |status, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                status.user_id, status.theme, status.processes.len(), status.pending
            )
        },
        |status, w| {
            pretty_section(w, &format!("{} ({})", status.user_name, status.role))?;
            pretty_kv(w, "Profile", &status.user_id)?;
            pretty_kv(w, "Profiles", status.profiles.to_string())?;
            pretty_kv(w, "Theme", &status.theme)?;
            pretty_kv(w, "Pending", status.pending.to_string())?;
            if status.orphaned_steps > 0 {
                pretty_kv(w, "Orphaned", format!("{} steps", status.orphaned_steps))?;
            }
            pretty_rule(w)?;
            if status.processes.is_empty() {
                return writeln!(w, "No processes yet.");
            }
            for row in &status.processes {
                row.render_human(w)?;
            }
            Ok(())
        },
    )
}
