//! `popo process`: processes of the active profile.

use anyhow::Result;
use clap::{Args, Subcommand};
use popo_core::PopoError;
use popo_core::model::{Process, Step, User};
use serde::Serialize;
use std::io::{self, Write};

use super::{Context, resolve_process};
use crate::output::{
    Renderable, pretty_kv, pretty_rule, pretty_section, render_list, render_mode, render_success,
};

#[derive(Args, Debug)]
pub struct ProcessArgs {
    #[command(subcommand)]
    pub command: ProcessCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProcessCommand {
    /// List processes with their progress.
    List,
    /// Add a process to the active profile.
    Add {
        /// Process title. A blank title adds nothing.
        title: String,
    },
    /// Rename a process.
    Rename {
        /// Process id (a unique prefix is enough).
        id: String,
        /// New title.
        title: String,
    },
    /// Show a process and its ordered steps.
    Show {
        /// Process id (a unique prefix is enough).
        id: String,
    },
}

/// One process with its completion summary.
#[derive(Debug, Serialize)]
pub struct ProcessRow {
    pub id: String,
    pub title: String,
    pub steps: usize,
    pub done: usize,
    pub progress: u8,
}

impl ProcessRow {
    pub fn of(user: &User, process: &Process) -> Self {
        let (steps, done) = user
            .steps_of(&process.id)
            .fold((0, 0), |(steps, done), step| (steps + 1, done + usize::from(step.is_done())));
        Self {
            id: process.id.to_string(),
            title: process.title().to_string(),
            steps,
            done,
            progress: user.progress(&process.id),
        }
    }
}

impl Renderable for ProcessRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:>3}%  {}  [{}]  {}/{} done",
            self.progress, self.title, self.id, self.done, self.steps
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id, self.progress, self.done, self.steps, self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "PROGRESS", "DONE", "STEPS", "TITLE"]
    }
}

/// One step as listed under its process. `position` counts from 1.
#[derive(Debug, Serialize)]
pub struct StepRow {
    pub position: usize,
    pub id: String,
    pub title: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
}

impl StepRow {
    pub fn of(position: usize, step: &Step) -> Self {
        Self {
            position,
            id: step.id.to_string(),
            title: step.title().to_string(),
            done: step.is_done(),
            scheduled_at: step.scheduled_at().map(str::to_string),
        }
    }
}

impl Renderable for StepRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let mark = if self.done { "x" } else { " " };
        write!(w, "{:>3}. [{mark}] {}  ({})", self.position, self.title, self.id)?;
        match &self.scheduled_at {
            Some(when) => writeln!(w, "  @ {when}"),
            None => writeln!(w),
        }
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.position,
            self.id,
            self.done,
            self.scheduled_at.as_deref().unwrap_or("-"),
            self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["POS", "ID", "DONE", "SCHEDULED", "TITLE"]
    }
}

#[derive(Debug, Serialize)]
struct ProcessDetail {
    #[serde(flatten)]
    process: ProcessRow,
    step_list: Vec<StepRow>,
}

/// Execute `popo process <subcommand>`.
///
/// # Errors
///
/// Returns an error for unknown ids, store failures, or output failures.
pub fn run_process(args: &ProcessArgs, ctx: &Context) -> Result<()> {
    let mut tracker = ctx.open()?;
    match &args.command {
        ProcessCommand::List => {
            let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
            let rows: Vec<ProcessRow> = user
                .processes
                .iter()
                .map(|process| ProcessRow::of(user, process))
                .collect();
            if rows.is_empty() && !ctx.output.is_json() {
                println!("No processes yet. Add one with `popo process add <title>`.");
                return Ok(());
            }
            render_list(&rows, ctx.output)?;
        }
        ProcessCommand::Add { title } => {
            match tracker.add_process(title).map_err(|err| ctx.fail(err))? {
                Some(id) => render_mode(
                    ctx.output,
                    &serde_json::json!({ "id": id, "title": title.trim() }),
                    |_, w| writeln!(w, "{id}"),
                    |_, w| writeln!(w, "✓ Added process '{}' ({id})", title.trim()),
                )?,
                None => render_success(ctx.output, "Blank title, nothing added")?,
            }
        }
        ProcessCommand::Rename { id, title } => {
            let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
            let id = resolve_process(ctx, user, id)?;
            tracker
                .rename_process(&id, title)
                .map_err(|err| ctx.fail(err))?;
            render_success(ctx.output, &format!("Renamed process {id}"))?;
        }
        ProcessCommand::Show { id } => {
            let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
            let id = resolve_process(ctx, user, id)?;
            let Some(process) = user.process(&id) else {
                return Err(ctx.fail(PopoError::ProcessNotFound(id)));
            };
            let detail = ProcessDetail {
                process: ProcessRow::of(user, process),
                step_list: tracker
                    .process_steps(&id)
                    .map_err(|err| ctx.fail(err))?
                    .into_iter()
                    .enumerate()
                    .map(|(index, step)| StepRow::of(index + 1, step))
                    .collect(),
            };
            render_mode(
                ctx.output,
                &detail,
                |detail, w| {
                    for row in &detail.step_list {
                        row.render_table(w)?;
                    }
                    Ok(())
                },
                |detail, w| {
                    pretty_section(w, &format!("{} [{}]", detail.process.title, detail.process.id))?;
                    pretty_kv(
                        w,
                        "Progress",
                        format!(
                            "{}% ({}/{} done)",
                            detail.process.progress, detail.process.done, detail.process.steps
                        ),
                    )?;
                    if detail.step_list.is_empty() {
                        return writeln!(w, "No steps yet.");
                    }
                    pretty_rule(w)?;
                    for row in &detail.step_list {
                        row.render_human(w)?;
                    }
                    Ok(())
                },
            )?;
        }
    }
    Ok(())
}
