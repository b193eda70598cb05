//! `tly team`: create, list, rename and re-key teams.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::io::Write as _;
use tally_core::model::Team;
use tally_core::ops;
use tally_core::rekey::RekeyStats;

use super::{Context, team_key};
use crate::output::{pretty_kv, pretty_section, render, render_mode};

#[derive(Subcommand, Debug)]
pub enum TeamCommand {
    #[command(
        about = "Create a team",
        after_help = "EXAMPLES:\n    tly team create ENG --name Engineering"
    )]
    Create {
        /// Team key: letters and digits, starting with a letter.
        key: String,

        /// Display name.
        #[arg(long)]
        name: String,
    },

    #[command(about = "List teams in the workspace")]
    List,

    #[command(about = "Change a team's display name")]
    Rename {
        key: String,
        name: String,
    },

    #[command(
        about = "Change a team's key",
        long_about = "Change a team's key and rewrite every issue key of the team. \
                      Issue numbers and the team's counter are unchanged.",
        after_help = "EXAMPLES:\n    # ENG-7 becomes ENGR-7; the next issue is ENGR-8\n    \
                      tly team rekey ENG ENGR"
    )]
    Rekey {
        old: String,
        new: String,
    },
}

#[derive(Debug, Serialize)]
struct RekeyReport {
    team: Team,
    from: String,
    #[serde(flatten)]
    stats: RekeyStats,
}

pub fn run(command: &TeamCommand, ctx: &Context) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let workspace = ctx.workspace(&conn)?;

    match command {
        TeamCommand::Create { key, name } => {
            let team = ops::create_team(&mut conn, &workspace, &team_key(key)?, name)?;
            render(ctx.output, &team, |t, w| {
                writeln!(w, "✓ Created team {} ({}) in {}", t.key, t.name, workspace.slug)
            })
        }
        TeamCommand::List => {
            let teams = ops::list_teams(&conn, &workspace)?;
            render_mode(
                ctx.output,
                &teams,
                |list, w| {
                    for team in list {
                        writeln!(w, "{}\t{}", team.key, team.name)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("Teams in {} ({})", workspace.slug, list.len()))?;
                    for team in list {
                        pretty_kv(w, team.key.as_str(), &team.name)?;
                    }
                    Ok(())
                },
            )
        }
        TeamCommand::Rename { key, name } => {
            let team = ops::rename_team(&mut conn, &workspace, &team_key(key)?, name)?;
            render(ctx.output, &team, |t, w| {
                writeln!(w, "✓ Renamed team {} to {}", t.key, t.name)
            })
        }
        TeamCommand::Rekey { old, new } => {
            let old = team_key(old)?;
            let (team, stats) = ops::change_team_key(&mut conn, &workspace, &old, &team_key(new)?)?;
            let report = RekeyReport {
                team,
                from: old.to_string(),
                stats,
            };
            render(ctx.output, &report, |r, w| {
                writeln!(
                    w,
                    "✓ Team {} is now {} ({} issue keys rewritten)",
                    r.from, r.team.key, r.stats.rewritten
                )?;
                if r.stats.skipped > 0 {
                    writeln!(w, "  {} malformed keys left unchanged", r.stats.skipped)?;
                }
                Ok(())
            })
        }
    }
}
