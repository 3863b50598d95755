//! `popo backup`: export to and restore from JSON backup files.
//!
//! Restores are chosen explicitly: `--mode merge|override` times
//! `--scope all|current`. The mode defaults to `restore.default_mode` from
//! the config file (itself defaulting to merge); the scope defaults to all.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand, ValueEnum};
use popo_core::merge::MergeReport;
use popo_core::{RestoreMode, RestoreScope};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Context;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Write a backup of every profile, or only the active one.
    Export {
        /// Export only the active profile.
        #[arg(long)]
        profile: bool,
        /// Destination file (defaults to the suggested name in the current
        /// directory).
        #[arg(long, value_name = "PATH", conflicts_with = "stdout")]
        output: Option<PathBuf>,
        /// Print the backup to stdout instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },
    /// Restore a backup file (current or legacy shape).
    Restore {
        /// Backup file to read.
        file: PathBuf,
        /// Merge into local data, or replace it.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Touch every profile, or only the active one.
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Merge,
    Override,
}

impl From<ModeArg> for RestoreMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Merge => Self::Merge,
            ModeArg::Override => Self::Override,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    All,
    Current,
}

impl From<ScopeArg> for RestoreScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => Self::All,
            ScopeArg::Current => Self::CurrentProfile,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    file_name: String,
    path: String,
    bytes: usize,
    scope: RestoreScope,
}

#[derive(Debug, Serialize)]
struct RestoreOutput {
    mode: RestoreMode,
    scope: RestoreScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<MergeReport>,
    profiles: usize,
    current_user_id: String,
}

/// Execute `popo backup <subcommand>`.
///
/// # Errors
///
/// Returns an error for unreadable or invalid backups, store failures, or
/// output failures. A failed restore leaves the stored document unchanged.
pub fn run_backup(args: &BackupArgs, ctx: &Context) -> Result<()> {
    match &args.command {
        BackupCommand::Export {
            profile,
            output,
            stdout,
        } => run_export(ctx, *profile, output.as_deref(), *stdout),
        BackupCommand::Restore { file, mode, scope } => {
            let mode = mode.map_or(ctx.default_restore_mode(), RestoreMode::from);
            run_restore(ctx, file, mode, (*scope).into())
        }
    }
}

fn run_export(ctx: &Context, profile: bool, output: Option<&Path>, stdout: bool) -> Result<()> {
    let tracker = ctx.open()?;
    let (backup, scope) = if profile {
        (tracker.export_current_profile(), RestoreScope::CurrentProfile)
    } else {
        (tracker.export_all(), RestoreScope::All)
    };
    let backup = backup.map_err(|err| ctx.fail(err))?;

    if stdout {
        println!("{}", backup.content);
        return Ok(());
    }

    let path = output.map_or_else(|| PathBuf::from(&backup.file_name), Path::to_path_buf);
    fs::write(&path, &backup.content)
        .with_context(|| format!("Failed to write backup to {}", path.display()))?;
    tracing::info!(path = %path.display(), %scope, "exported backup");

    let report = ExportOutput {
        file_name: backup.file_name,
        path: path.display().to_string(),
        bytes: backup.content.len(),
        scope,
    };
    render_mode(
        ctx.output,
        &report,
        |report, w| writeln!(w, "{}", report.path),
        |report, w| writeln!(w, "✓ Wrote {} ({} bytes)", report.path, report.bytes),
    )
}

fn run_restore(ctx: &Context, file: &Path, mode: RestoreMode, scope: RestoreScope) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("Failed to read backup {}", file.display()))?;
    let mut tracker = ctx.open()?;
    let outcome = tracker
        .restore(&bytes, mode, scope)
        .map_err(|err| ctx.fail(err))?;

    let report = RestoreOutput {
        mode: outcome.mode,
        scope: outcome.scope,
        report: outcome.report,
        profiles: outcome.document.users.len(),
        current_user_id: outcome
            .document
            .current_user_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    };
    render_mode(
        ctx.output,
        &report,
        |report, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                report.mode, report.scope, report.profiles, report.current_user_id
            )
        },
        |report, w| {
            pretty_section(w, &format!("Restored backup ({} / {})", report.mode, report.scope))?;
            pretty_kv(w, "Profiles", report.profiles.to_string())?;
            pretty_kv(w, "Active", &report.current_user_id)?;
            if let Some(merge) = &report.report {
                for (label, counts) in [
                    ("Users", merge.users),
                    ("Processes", merge.processes),
                    ("Steps", merge.steps),
                ] {
                    pretty_kv(
                        w,
                        label,
                        format!("{} added, {} updated", counts.added, counts.updated),
                    )?;
                }
            }
            Ok(())
        },
    )
}
