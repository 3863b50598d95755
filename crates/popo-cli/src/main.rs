#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use popo_core::PopoError;
use popo_core::config::resolve_config;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "popo: local-first process and checklist tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides --json, FORMAT and the config file).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Directory holding `data/db.json` and `images/`.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create or open the local store",
        long_about = "Create the local store on first run (or migrate an older one) and report where it lives.",
        after_help = "EXAMPLES:\n    # Create the store with a named first profile\n    popo init --name Dana\n\n    # Use a specific data directory\n    popo --data-dir ./popo-data init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the active profile at a glance",
        long_about = "Show the active profile, theme, process progress and the number of pending steps.",
        after_help = "EXAMPLES:\n    # Orientation\n    popo status\n\n    # Emit machine-readable output\n    popo status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Profiles",
        about = "Manage profiles",
        long_about = "List, add, rename, delete, switch and edit profiles, and set the active profile's avatar.",
        after_help = "EXAMPLES:\n    # Add two profiles at once\n    popo profile add-many \"Ann, Bob\"\n\n    # Switch by id prefix\n    popo profile switch 3f2\n\n    # Set an avatar\n    popo profile avatar ./me.png"
    )]
    Profile(cmd::profile::ProfileArgs),

    #[command(
        next_help_heading = "Processes",
        about = "Manage processes",
        long_about = "List, add, rename and inspect the active profile's processes.",
        after_help = "EXAMPLES:\n    # Add a process\n    popo process add \"Onboarding\"\n\n    # Show its steps in order\n    popo process show 3f2"
    )]
    Process(cmd::process::ProcessArgs),

    #[command(
        next_help_heading = "Processes",
        about = "Manage steps",
        long_about = "Add, toggle, complete, remove, schedule and reorder steps.",
        after_help = "EXAMPLES:\n    # Add a scheduled step\n    popo step add 3f2 \"Sign contract\" --at 2026-03-01T09:30\n\n    # Move the third step to the top\n    popo step move 3f2 3 1"
    )]
    Step(cmd::step::StepArgs),

    #[command(
        next_help_heading = "Read",
        about = "List unfinished scheduled steps",
        long_about = "List the active profile's unfinished scheduled steps, earliest first.",
        after_help = "EXAMPLES:\n    # What is due\n    popo pending\n\n    # Emit machine-readable output\n    popo pending --json"
    )]
    Pending(cmd::pending::PendingArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Show or change the theme",
        long_about = "Show the stored theme, set it to light, dark or system, or toggle dark mode.",
        after_help = "EXAMPLES:\n    # Toggle dark mode\n    popo theme toggle\n\n    # Follow the OS\n    popo theme set system"
    )]
    Theme(cmd::theme::ThemeArgs),

    #[command(
        next_help_heading = "Backups",
        about = "Export or restore backups",
        long_about = "Export every profile or the active one, or restore a backup by merging or overriding, for all profiles or only the active one.",
        after_help = "EXAMPLES:\n    # Full backup to popo2-backup.json\n    popo backup export\n\n    # Merge a backup into the active profile only\n    popo backup restore ./profile-Dana.json --mode merge --scope current\n\n    # Replace everything\n    popo backup restore ./popo2-backup.json --mode override"
    )]
    Backup(cmd::backup::BackupArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    popo completions bash > ~/.local/share/bash-completion/completions/popo"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("POPO_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "popo=debug,info"
        } else {
            "popo=info,warn"
        })
    });

    let format = env::var("POPO_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let config = match resolve_config(cli.data_dir.as_deref(), cli.json) {
        Ok(config) => config,
        Err(err) => {
            if let Some(popo) = err.downcast_ref::<PopoError>() {
                let mode = cli.format.unwrap_or(if cli.json {
                    OutputMode::Json
                } else {
                    OutputMode::Text
                });
                render_error(mode, &CliError::from(popo))?;
            }
            return Err(err);
        }
    };
    let output = resolve_output_mode(cli.format, &config.resolved_output);
    let ctx = cmd::Context::new(&config, output);

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::Status(args) => cmd::status::run_status(args, &ctx),
        Commands::Profile(args) => cmd::profile::run_profile(args, &ctx),
        Commands::Process(args) => cmd::process::run_process(args, &ctx),
        Commands::Step(args) => cmd::step::run_step(args, &ctx),
        Commands::Pending(args) => cmd::pending::run_pending(args, &ctx),
        Commands::Theme(args) => cmd::theme::run_theme(args, &ctx),
        Commands::Backup(args) => cmd::backup::run_backup(args, &ctx),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmd::backup::{BackupCommand, ScopeArg};
    use cmd::step::StepCommand;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["popo", "status", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_parses_value_enum() {
        let cli = Cli::parse_from(["popo", "--format", "text", "pending"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert_eq!(resolve_output_mode(cli.format, "json"), OutputMode::Text);
    }

    #[test]
    fn data_dir_flag_is_global() {
        let cli = Cli::parse_from(["popo", "profile", "list", "--data-dir", "/tmp/popo"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/popo")));
    }

    #[test]
    fn restore_scope_defaults_to_all_and_mode_to_config() {
        let cli = Cli::parse_from(["popo", "backup", "restore", "b.json"]);
        let Commands::Backup(args) = cli.command else {
            panic!("expected backup command");
        };
        assert!(matches!(
            args.command,
            BackupCommand::Restore {
                mode: None,
                scope: ScopeArg::All,
                ..
            }
        ));
    }

    #[test]
    fn restore_accepts_current_scope() {
        let cli = Cli::parse_from([
            "popo", "backup", "restore", "b.json", "--mode", "override", "--scope", "current",
        ]);
        let Commands::Backup(args) = cli.command else {
            panic!("expected backup command");
        };
        assert!(matches!(
            args.command,
            BackupCommand::Restore {
                scope: ScopeArg::Current,
                ..
            }
        ));
    }

    #[test]
    fn step_move_rejects_position_zero() {
        assert!(Cli::try_parse_from(["popo", "step", "move", "p", "0", "1"]).is_err());
        let cli = Cli::parse_from(["popo", "step", "move", "p", "2", "1"]);
        let Commands::Step(args) = cli.command else {
            panic!("expected step command");
        };
        assert!(matches!(args.command, StepCommand::Move { from: 2, to: 1, .. }));
    }

    #[test]
    fn theme_set_parses_theme() {
        let cli = Cli::parse_from(["popo", "theme", "set", "system"]);
        let Commands::Theme(args) = cli.command else {
            panic!("expected theme command");
        };
        assert!(matches!(
            args.command,
            Some(cmd::theme::ThemeCommand::Set {
                theme: popo_core::Theme::System
            })
        ));
        assert!(Cli::try_parse_from(["popo", "theme", "set", "sepia"]).is_err());
    }
}
