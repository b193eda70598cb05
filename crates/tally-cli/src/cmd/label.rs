//! `tly label`: workspace labels. Attaching them is `tly issue label`.

use anyhow::Result;
use clap::Subcommand;
use std::io::Write as _;
use tally_core::ops;

use super::Context;
use crate::output::{pretty_kv, pretty_section, render, render_mode};

#[derive(Subcommand, Debug)]
pub enum LabelCommand {
    #[command(
        about = "Create a label",
        after_help = "EXAMPLES:\n    tly label create bug"
    )]
    Create {
        /// Label name, unique in the workspace ignoring case.
        name: String,
    },

    #[command(about = "List labels in the workspace")]
    List,
}

pub fn run(command: &LabelCommand, ctx: &Context) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let workspace = ctx.workspace(&conn)?;

    match command {
        LabelCommand::Create { name } => {
            let label = ops::create_label(&mut conn, &workspace, name)?;
            render(ctx.output, &label, |l, w| {
                writeln!(w, "✓ Created label {} ({})", l.name, l.color_key)
            })
        }
        LabelCommand::List => {
            let labels = ops::list_labels(&conn, &workspace)?;
            render_mode(
                ctx.output,
                &labels,
                |list, w| {
                    for label in list {
                        writeln!(w, "{}\t{}", label.name, label.color_key)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("Labels in {} ({})", workspace.slug, list.len()))?;
                    for label in list {
                        pretty_kv(w, &label.name, &label.color_key)?;
                    }
                    Ok(())
                },
            )
        }
    }
}
