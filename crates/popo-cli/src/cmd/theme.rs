use anyhow::Result;
use clap::{Args, Subcommand};
use popo_core::Theme;
use std::io::Write;

use super::Context;
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub command: Option<ThemeCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommand {
    /// Set the theme explicitly.
    Set {
        /// light, dark or system.
        theme: Theme,
    },
    /// Flip between dark and light.
    Toggle,
}

/// Execute `popo theme [set|toggle]`. Without a subcommand, prints the
/// stored theme.
///
/// # Errors
///
/// Returns an error if the store cannot be loaded or written.
pub fn run_theme(args: &ThemeArgs, ctx: &Context) -> Result<()> {
    let mut tracker = ctx.open()?;
    let theme = match &args.command {
        None => tracker.document().theme(),
        Some(ThemeCommand::Set { theme }) => {
            tracker.set_theme(*theme).map_err(|err| ctx.fail(err))?;
            *theme
        }
        Some(ThemeCommand::Toggle) => tracker.toggle_theme().map_err(|err| ctx.fail(err))?,
    };
    render_mode(
        ctx.output,
        &serde_json::json!({ "theme": theme }),
        |_, w| writeln!(w, "{theme}"),
        |_, w| writeln!(w, "Theme: {theme}"),
    )
}
