//! `popo step`: steps inside the active profile's processes.

use anyhow::Result;
use clap::{Args, Subcommand};
use popo_core::model::parse_timestamp;
use std::io::Write;

use super::{Context, resolve_process, resolve_step};
use crate::output::{render_mode, render_success};

#[derive(Args, Debug)]
pub struct StepArgs {
    #[command(subcommand)]
    pub command: StepCommand,
}

#[derive(Subcommand, Debug)]
pub enum StepCommand {
    /// Append a step to a process.
    Add {
        /// Process id (a unique prefix is enough).
        process: String,
        /// Step title. A blank title adds nothing.
        title: String,
        /// When the step is due, e.g. 2026-03-01T09:30.
        #[arg(long)]
        at: Option<String>,
    },
    /// Flip a step between done and not done.
    Toggle {
        /// Step id (a unique prefix is enough).
        id: String,
    },
    /// Mark a step done.
    Done {
        /// Step id (a unique prefix is enough).
        id: String,
    },
    /// Delete a step.
    Remove {
        /// Step id (a unique prefix is enough).
        id: String,
    },
    /// Set a step's scheduled time, or clear it when WHEN is omitted.
    Schedule {
        /// Step id (a unique prefix is enough).
        id: String,
        /// Date/time such as 2026-03-01T09:30.
        when: Option<String>,
    },
    /// Reorder a step within its process.
    Move {
        /// Process id (a unique prefix is enough).
        process: String,
        /// Current position, counting from 1 as in `popo process show`.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        from: u32,
        /// Target position, counting from 1.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        to: u32,
    },
}

/// Warn (without failing) when a time will not sort as a date.
fn check_time(when: Option<&str>) {
    if let Some(raw) = when.filter(|raw| !raw.trim().is_empty())
        && parse_timestamp(raw).is_none()
    {
        tracing::warn!(when = raw, "unrecognized date/time; the step will sort last in pending");
    }
}

fn zero_based(position: u32) -> Result<usize> {
    Ok(usize::try_from(position)?.saturating_sub(1))
}

/// Execute `popo step <subcommand>`.
///
/// # Errors
///
/// Returns an error for unknown ids, positions out of range, store failures,
/// or output failures.
pub fn run_step(args: &StepArgs, ctx: &Context) -> Result<()> {
    let mut tracker = ctx.open()?;
    let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
    match &args.command {
        StepCommand::Add { process, title, at } => {
            let process = resolve_process(ctx, user, process)?;
            check_time(at.as_deref());
            match tracker
                .add_step(&process, title, at.clone())
                .map_err(|err| ctx.fail(err))?
            {
                Some(id) => render_mode(
                    ctx.output,
                    &serde_json::json!({ "id": id, "process_id": process, "title": title }),
                    |_, w| writeln!(w, "{id}"),
                    |_, w| writeln!(w, "✓ Added step '{title}' ({id})"),
                )?,
                None => render_success(ctx.output, "Blank title, nothing added")?,
            }
        }
        StepCommand::Toggle { id } => {
            let id = resolve_step(ctx, user, id)?;
            let done = tracker.toggle_step(&id).map_err(|err| ctx.fail(err))?;
            render_mode(
                ctx.output,
                &serde_json::json!({ "id": id, "done": done }),
                |_, w| writeln!(w, "{id}\t{done}"),
                |_, w| {
                    let state = if done { "done" } else { "not done" };
                    writeln!(w, "✓ Step {id} is now {state}")
                },
            )?;
        }
        StepCommand::Done { id } => {
            let id = resolve_step(ctx, user, id)?;
            tracker.mark_done(&id).map_err(|err| ctx.fail(err))?;
            render_success(ctx.output, &format!("Step {id} done"))?;
        }
        StepCommand::Remove { id } => {
            let id = resolve_step(ctx, user, id)?;
            tracker.remove_step(&id).map_err(|err| ctx.fail(err))?;
            render_success(ctx.output, &format!("Removed step {id}"))?;
        }
        StepCommand::Schedule { id, when } => {
            let id = resolve_step(ctx, user, id)?;
            check_time(when.as_deref());
            tracker
                .schedule_step(&id, when.clone())
                .map_err(|err| ctx.fail(err))?;
            let message = match when.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
                Some(when) => format!("Step {id} scheduled for {when}"),
                None => format!("Step {id} unscheduled"),
            };
            render_success(ctx.output, &message)?;
        }
        StepCommand::Move { process, from, to } => {
            let process = resolve_process(ctx, user, process)?;
            tracker
                .move_step(&process, zero_based(*from)?, zero_based(*to)?)
                .map_err(|err| ctx.fail(err))?;
            render_success(ctx.output, &format!("Moved step {from} to position {to}"))?;
        }
    }
    Ok(())
}
