//! `tly workspace`: create and list workspaces.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::io::Write as _;
use tally_core::config::save_project_config;
use tally_core::model::{Team, Workspace};
use tally_core::ops;

use super::Context;
use crate::output::{micros_to_local, pretty_kv, pretty_section, render, render_mode};

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    #[command(
        about = "Create a workspace",
        long_about = "Create a workspace and its first team. The team key is up to three \
                      letters/digits of the display name, starting at its first letter \
                      (TEAM if it has none).",
        after_help = "EXAMPLES:\n    # Creates workspace `acme` with team ACM\n    \
                      tly workspace create acme --name \"Acme Corp\""
    )]
    Create {
        /// Lowercase slug, e.g. `acme`.
        slug: String,

        /// Display name; also names the default team.
        #[arg(long)]
        name: String,
    },

    #[command(about = "List workspaces")]
    List,
}

#[derive(Debug, Serialize)]
struct CreatedWorkspace {
    workspace: Workspace,
    default_team: Team,
    /// True when this workspace became the project default.
    selected: bool,
}

pub fn run(command: &WorkspaceCommand, ctx: &mut Context) -> Result<()> {
    match command {
        WorkspaceCommand::Create { slug, name } => run_create(slug, name, ctx),
        WorkspaceCommand::List => run_list(ctx),
    }
}

fn run_create(slug: &str, name: &str, ctx: &mut Context) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let (workspace, default_team) = ops::create_workspace(&mut conn, slug, name)?;

    let selected = ctx.config.project.workspace.default.is_none();
    if selected {
        ctx.config.project.workspace.default = Some(workspace.slug.clone());
        save_project_config(&ctx.project_root, &ctx.config.project)?;
    }

    let created = CreatedWorkspace {
        workspace,
        default_team,
        selected,
    };
    render(ctx.output, &created, |c, w| {
        writeln!(
            w,
            "✓ Created workspace {} with team {} ({})",
            c.workspace.slug, c.default_team.key, c.default_team.name
        )?;
        if c.selected {
            writeln!(w, "  Set as the default workspace in .tally/config.toml")?;
        }
        Ok(())
    })
}

fn run_list(ctx: &Context) -> Result<()> {
    let conn = ctx.open_db()?;
    let workspaces = ops::list_workspaces(&conn)?;
    let default = ctx.config.project.workspace.default.as_deref();

    render_mode(
        ctx.output,
        &workspaces,
        |list, w| {
            for ws in list {
                writeln!(w, "{}\t{}", ws.slug, ws.display_name)?;
            }
            Ok(())
        },
        |list, w| {
            pretty_section(w, &format!("Workspaces ({})", list.len()))?;
            for ws in list {
                let marker = if Some(ws.slug.as_str()) == default { " (default)" } else { "" };
                pretty_kv(w, &ws.slug, format!("{}{marker}", ws.display_name))?;
                pretty_kv(w, "  created", micros_to_local(ws.created_at_us))?;
            }
            Ok(())
        },
    )
}
