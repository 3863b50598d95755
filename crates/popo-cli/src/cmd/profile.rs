//! `popo profile`: list, create, edit and switch profiles.

use anyhow::Result;
use clap::{Args, Subcommand};
use popo_core::model::User;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use super::{Context, resolve_user};
use crate::output::{Renderable, render, render_list, render_mode, render_success};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List every profile, marking the active one.
    List,
    /// Add a profile. The active profile does not change.
    Add {
        /// Profile name. A blank name adds nothing.
        name: String,
    },
    /// Add several profiles from comma- or newline-separated names.
    AddMany {
        /// Names, e.g. "Ann, Bob" or one per line.
        names: String,
    },
    /// Rename any profile.
    Rename {
        /// Profile id (a unique prefix is enough).
        id: String,
        /// New name. A blank name changes nothing.
        name: String,
    },
    /// Delete a profile and everything it owns.
    Delete {
        /// Profile id (a unique prefix is enough).
        id: String,
    },
    /// Make another profile active.
    Switch {
        /// Profile id (a unique prefix is enough).
        id: String,
    },
    /// Edit the active profile's name and role.
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Set or show the active profile's avatar.
    Avatar {
        /// A .jpg, .jpeg or .png image to upload.
        path: Option<PathBuf>,
        /// Print the stored avatar as a data URL.
        #[arg(long)]
        data_url: bool,
    },
}

/// One profile as listed by `popo profile list`.
#[derive(Debug, Serialize)]
pub struct ProfileRow {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub initial: char,
    pub role: String,
    pub current: bool,
    pub processes: usize,
    pub steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileRow {
    fn of(user: &User, current: bool) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name().to_string(),
            initial: user.initial(),
            role: user.role().to_string(),
            current,
            processes: user.processes.len(),
            steps: user.steps.len(),
            avatar: user.avatar().map(str::to_string),
        }
    }
}

impl Renderable for ProfileRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let marker = if self.current { "*" } else { " " };
        writeln!(
            w,
            "{marker} ({}) {}  [{}]  {}  {} processes, {} steps",
            self.initial, self.name, self.id, self.role, self.processes, self.steps
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.id,
            if self.current { "*" } else { "" },
            self.processes,
            self.role,
            self.name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "CURRENT", "PROCESSES", "ROLE", "NAME"]
    }
}

#[derive(Debug, Serialize)]
struct AvatarOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_url: Option<String>,
}

/// Execute `popo profile <subcommand>`.
///
/// # Errors
///
/// Returns an error for unknown ids, deleting the last profile, unsupported
/// images, store failures, or output failures.
pub fn run_profile(args: &ProfileArgs, ctx: &Context) -> Result<()> {
    let mut tracker = ctx.open()?;
    match &args.command {
        ProfileCommand::List => {
            let doc = tracker.document();
            let rows: Vec<ProfileRow> = doc
                .users
                .iter()
                .map(|user| ProfileRow::of(user, doc.current_user_id.as_ref() == Some(&user.id)))
                .collect();
            render_list(&rows, ctx.output)?;
        }
        ProfileCommand::Add { name } => match tracker.add_profile(name).map_err(|err| ctx.fail(err))? {
            Some(id) => render_mode(
                ctx.output,
                &serde_json::json!({ "id": id, "name": name.trim() }),
                |_, w| writeln!(w, "{id}"),
                |_, w| writeln!(w, "✓ Added profile '{}' ({id})", name.trim()),
            )?,
            None => render_success(ctx.output, "Blank name, nothing added")?,
        },
        ProfileCommand::AddMany { names } => {
            let ids = tracker
                .add_profiles_bulk(names)
                .map_err(|err| ctx.fail(err))?;
            render(ctx.output, &ids, |ids, w| {
                if ids.is_empty() {
                    return writeln!(w, "No names given, nothing added");
                }
                for id in ids {
                    writeln!(w, "{id}")?;
                }
                Ok(())
            })?;
        }
        ProfileCommand::Rename { id, name } => {
            let id = resolve_user(ctx, &tracker.document().users, id)?;
            tracker
                .rename_profile(&id, name)
                .map_err(|err| ctx.fail(err))?;
            render_success(ctx.output, &format!("Renamed profile {id}"))?;
        }
        ProfileCommand::Delete { id } => {
            let id = resolve_user(ctx, &tracker.document().users, id)?;
            tracker.delete_profile(&id).map_err(|err| ctx.fail(err))?;
            let current = tracker.current_user().map_err(|err| ctx.fail(err))?;
            render_success(
                ctx.output,
                &format!("Deleted profile {id}; active profile is {}", current.id),
            )?;
        }
        ProfileCommand::Switch { id } => {
            let id = resolve_user(ctx, &tracker.document().users, id)?;
            tracker.switch_profile(&id).map_err(|err| ctx.fail(err))?;
            let name = tracker
                .current_user()
                .map_err(|err| ctx.fail(err))?
                .name()
                .to_string();
            render_success(ctx.output, &format!("Switched to {name} ({id})"))?;
        }
        ProfileCommand::Edit { name, role } => {
            let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
            let name = name.clone().unwrap_or_else(|| user.name().to_string());
            let role = role.clone().unwrap_or_else(|| user.role().to_string());
            tracker
                .update_profile(&name, &role)
                .map_err(|err| ctx.fail(err))?;
            let user = tracker.current_user().map_err(|err| ctx.fail(err))?;
            let row = ProfileRow::of(user, true);
            render(ctx.output, &row, |row, w| row.render_human(w))?;
        }
        ProfileCommand::Avatar { path, data_url } => {
            let images = ctx.images();
            tracker
                .set_avatar(&images, path.as_deref())
                .map_err(|err| ctx.fail(err))?;
            let avatar = tracker
                .current_user()
                .map_err(|err| ctx.fail(err))?
                .avatar()
                .map(str::to_string);
            let out = AvatarOutput {
                data_url: data_url
                    .then(|| tracker.avatar(&images).map(|blob| blob.data_url()))
                    .flatten(),
                avatar,
            };
            render(ctx.output, &out, |out, w| {
                if let Some(url) = &out.data_url {
                    return writeln!(w, "{url}");
                }
                match &out.avatar {
                    Some(avatar) => writeln!(w, "{avatar}"),
                    None => writeln!(w, "No avatar set"),
                }
            })?;
        }
    }
    Ok(())
}
