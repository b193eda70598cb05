#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tally_core::{ErrorCode, config};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tally: multi-tenant issue tracker with per-team issue keys",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override actor identity (skips env/config resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Workspace slug (overrides TALLY_WORKSPACE and the project default).
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tally project",
        long_about = "Create .tally/ with the default config and an empty database.",
        after_help = "EXAMPLES:\n    tly init\n\n    tly init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Setup", about = "Manage workspaces")]
    Workspace {
        #[command(subcommand)]
        command: cmd::workspace::WorkspaceCommand,
    },

    #[command(next_help_heading = "Setup", about = "Manage teams")]
    Team {
        #[command(subcommand)]
        command: cmd::team::TeamCommand,
    },

    #[command(next_help_heading = "Issues", about = "Create and edit issues")]
    Issue {
        #[command(subcommand)]
        command: cmd::issue::IssueCommand,
    },

    #[command(next_help_heading = "Issues", about = "Manage workspace labels")]
    Label {
        #[command(subcommand)]
        command: cmd::label::LabelCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally_core=debug,tly=debug,info"
        } else {
            "warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

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

fn run(
    cli: Cli,
    project_root: PathBuf,
    output: OutputMode,
    config: config::EffectiveConfig,
) -> anyhow::Result<()> {
    let mut ctx = cmd::Context {
        project_root,
        output,
        config,
        actor_flag: cli.actor,
        workspace_flag: cli.workspace,
    };

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, output, &ctx.project_root),
        Commands::Workspace { command } => cmd::workspace::run(&command, &mut ctx),
        Commands::Team { command } => cmd::team::run(&command, &ctx),
        Commands::Issue { command } => cmd::issue::run(command, &ctx),
        Commands::Label { command } => cmd::label::run(&command, &ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot read current directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (output, result) = match config::resolve_config(&project_root, cli.json) {
        Ok(effective) => {
            let output = OutputMode::from_resolved(&effective.resolved_output);
            (output, run(cli, project_root, output, effective))
        }
        Err(err) => {
            let output = if cli.json { OutputMode::Json } else { OutputMode::Text };
            let err = CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}"));
            (output, Err(err.into()))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %err, "command failed");
            let cli_error = CliError::from_anyhow(&err);
            if render_error(output, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
