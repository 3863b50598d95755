//! `popo pending`: unfinished scheduled steps, earliest first.

use anyhow::Result;
use clap::Args;
use popo_core::model::Step;
use serde::Serialize;
use std::io::{self, Write};

use super::Context;
use crate::output::{Renderable, render_list};

/// Arguments for `popo pending`.
#[derive(Args, Debug, Default)]
pub struct PendingArgs {}

#[derive(Debug, Serialize)]
struct PendingRow {
    id: String,
    title: String,
    scheduled_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_id: Option<String>,
    process: String,
}

impl PendingRow {
    fn of(step: &Step, process: &str) -> Self {
        Self {
            id: step.id.to_string(),
            title: step.title().to_string(),
            scheduled_at: step.scheduled_at().unwrap_or_default().to_string(),
            process_id: step.process_id.as_ref().map(ToString::to_string),
            process: process.to_string(),
        }
    }
}

impl Renderable for PendingRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:<20} {}  ({})  [{}]",
            self.scheduled_at, self.title, self.process, self.id
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            self.scheduled_at, self.id, self.process, self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["WHEN", "ID", "PROCESS", "TITLE"]
    }
}

/// Execute `popo pending`.
///
/// # Errors
///
/// Returns an error if the store cannot be loaded or output fails.
pub fn run_pending(_args: &PendingArgs, ctx: &Context) -> Result<()> {
    let tracker = ctx.open()?;
    let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
    let rows: Vec<PendingRow> = tracker
        .pending()
        .map_err(|err| ctx.fail(err))?
        .into_iter()
        .map(|step| {
            let process = step
                .process_id
                .as_ref()
                .and_then(|id| user.process(id))
                .map_or("(no process)", |process| process.title());
            PendingRow::of(step, process)
        })
        .collect();

    if rows.is_empty() && !ctx.output.is_json() {
        println!("Nothing pending.");
        return Ok(());
    }
    render_list(&rows, ctx.output)?;
    Ok(())
}
