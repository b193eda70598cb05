//! `tly issue`: create, inspect and edit issues, their labels and comments.

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;
use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};
use tally_core::event::{ChangeEvent, IssueChange};
use tally_core::model::{Comment, Issue, Label, NewIssue, Priority, Status};
use tally_core::ops;

use super::{Context, team_key};
use crate::output::{
    OutputMode, micros_to_local, pretty_kv, pretty_rule, pretty_section, render, render_mode,
};

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
    #[command(
        about = "Create an issue",
        after_help = "EXAMPLES:\n    \
                      tly issue create --team ENG --summary \"Login times out\"\n\n    \
                      tly issue create --team ENG --summary \"Crash on save\" \
                      --priority urgent --json"
    )]
    Create {
        /// Team key the issue belongs to.
        #[arg(long)]
        team: String,

        #[arg(short, long)]
        summary: String,

        #[arg(short, long)]
        description: Option<String>,

        /// backlog, to_do, in_progress or done. Defaults to the project config.
        #[arg(long)]
        status: Option<String>,

        /// none, low, medium, high or urgent. Defaults to the project config.
        #[arg(short, long)]
        priority: Option<String>,
    },

    #[command(
        about = "Bulk-create issues from a file",
        long_about = "Create one issue per non-empty line of FILE (`-` reads stdin). Lines \
                      starting with `#` are ignored. All issues get consecutive numbers and \
                      are created in one transaction.",
        after_help = "EXAMPLES:\n    tly issue import --team ENG backlog.txt"
    )]
    Import {
        #[arg(long)]
        team: String,

        file: PathBuf,
    },

    #[command(about = "Show one issue")]
    Show { key: String },

    #[command(about = "List a team's issues")]
    List {
        #[arg(long)]
        team: String,
    },

    #[command(about = "Show an issue's change history")]
    Log { key: String },

    #[command(about = "Move an issue to another status")]
    Status { key: String, status: String },

    #[command(about = "Set an issue's priority")]
    Priority { key: String, priority: String },

    #[command(about = "Assign an issue, or clear the assignee with --clear")]
    Assign {
        key: String,

        #[arg(required_unless_present = "clear")]
        assignee: Option<String>,

        #[arg(long, conflicts_with = "assignee")]
        clear: bool,
    },

    #[command(about = "Replace an issue's summary")]
    Summary { key: String, summary: String },

    #[command(about = "Set an issue's description, or clear it with --clear")]
    Describe {
        key: String,

        #[arg(required_unless_present = "clear")]
        description: Option<String>,

        #[arg(long, conflicts_with = "description")]
        clear: bool,
    },

    #[command(about = "Delete an issue (its number is not reused)")]
    Delete { key: String },

    #[command(
        about = "Attach a workspace label to an issue",
        after_help = "EXAMPLES:\n    tly label create bug\n    tly issue label ENG-1 bug"
    )]
    Label { key: String, label: String },

    #[command(about = "Detach a label from an issue")]
    Unlabel { key: String, label: String },

    #[command(about = "List an issue's labels")]
    Labels { key: String },

    #[command(
        about = "Comment on an issue",
        after_help = "EXAMPLES:\n    tly issue comment ENG-1 \"Reproduced on 0.4.1\""
    )]
    Comment { key: String, body: String },

    #[command(about = "List an issue's comments")]
    Comments { key: String },

    #[command(about = "Delete a comment from an issue")]
    Uncomment { key: String, comment_id: String },
}

/// Result of a field update in JSON output.
#[derive(Debug, Serialize)]
struct UpdateReport {
    issue: Issue,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<ChangeEvent>,
}

/// Result of attaching, detaching or deleting in JSON output.
#[derive(Debug, Serialize)]
struct ChangeReport<'a, T: Serialize> {
    key: &'a str,
    #[serde(flatten)]
    item: T,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<ChangeEvent>,
}

#[derive(Debug, Serialize)]
struct LabelItem {
    label: Label,
}

#[derive(Debug, Serialize)]
struct CommentItem {
    comment: Comment,
}

pub fn run(command: IssueCommand, ctx: &Context) -> Result<()> {
    let mut conn = ctx.open_db()?;
    let workspace = ctx.workspace(&conn)?;

    match command {
        IssueCommand::Create {
            team,
            summary,
            description,
            status,
            priority,
        } => {
            let defaults = &ctx.config.project.issues;
            let new = NewIssue {
                summary,
                description,
                status: status.map_or(Ok(defaults.default_status), |s| s.parse::<Status>())?,
                priority: priority
                    .map_or(Ok(defaults.default_priority), |p| p.parse::<Priority>())?,
            };
            let actor = ctx.actor()?;
            let issue = ops::create_issue(&mut conn, &workspace, &team_key(&team)?, &actor, new)?;
            render(ctx.output, &issue, |i, w| {
                writeln!(w, "✓ Created {}: {}", i.key, i.summary)
            })
        }
        IssueCommand::Import { team, file } => {
            let new = read_import(&file, ctx)?;
            let actor = ctx.actor()?;
            let issues = ops::create_issues(&mut conn, &workspace, &team_key(&team)?, &actor, new)?;
            render(ctx.output, &issues, |list, w| {
                match (list.first(), list.last()) {
                    (Some(first), Some(last)) => writeln!(
                        w,
                        "✓ Imported {} issues ({} .. {})",
                        list.len(),
                        first.key,
                        last.key
                    ),
                    _ => writeln!(w, "Nothing to import"),
                }
            })
        }
        IssueCommand::Show { key } => {
            let issue = ops::get_issue(&conn, &workspace, &key)?;
            render_mode(ctx.output, &issue, write_issue_row, write_issue_detail)
        }
        IssueCommand::List { team } => {
            let issues = ops::list_issues(&conn, &workspace, &team_key(&team)?)?;
            render_mode(
                ctx.output,
                &issues,
                |list, w| {
                    for issue in list {
                        write_issue_row(issue, w)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("{team} issues ({})", list.len()))?;
                    for issue in list {
                        writeln!(
                            w,
                            "{:<10} {:<12} {:<8} {}",
                            issue.key,
                            issue.status.as_str(),
                            issue.priority.as_str(),
                            issue.summary
                        )?;
                    }
                    Ok(())
                },
            )
        }
        IssueCommand::Log { key } => {
            let events = ops::issue_history(&conn, &workspace, &key)?;
            render(ctx.output, &events, |list, w| {
                for event in list {
                    writeln!(
                        w,
                        "{}  {:<10} {}",
                        micros_to_local(event.created_at_us),
                        event.actor,
                        describe_event(event)
                    )?;
                }
                Ok(())
            })
        }
        IssueCommand::Status { key, status } => {
            let status: Status = status.parse()?;
            let actor = ctx.actor()?;
            let result = ops::change_status(&mut conn, &workspace, &key, &actor, status)?;
            render_update(ctx.output, result)
        }
        IssueCommand::Priority { key, priority } => {
            let priority: Priority = priority.parse()?;
            let actor = ctx.actor()?;
            let result = ops::change_priority(&mut conn, &workspace, &key, &actor, priority)?;
            render_update(ctx.output, result)
        }
        IssueCommand::Assign { key, assignee, clear } => {
            let assignee = if clear { None } else { assignee };
            let actor = ctx.actor()?;
            let result = ops::assign(&mut conn, &workspace, &key, &actor, assignee)?;
            render_update(ctx.output, result)
        }
        IssueCommand::Summary { key, summary } => {
            let actor = ctx.actor()?;
            let result = ops::update_summary(&mut conn, &workspace, &key, &actor, &summary)?;
            render_update(ctx.output, result)
        }
        IssueCommand::Describe {
            key,
            description,
            clear,
        } => {
            let description = if clear { None } else { description };
            let actor = ctx.actor()?;
            let result = ops::update_description(&mut conn, &workspace, &key, &actor, description)?;
            render_update(ctx.output, result)
        }
        IssueCommand::Delete { key } => {
            let issue = ops::delete_issue(&mut conn, &workspace, &key)?;
            render(ctx.output, &issue, |i, w| writeln!(w, "✓ Deleted {}", i.key))
        }
        IssueCommand::Label { key, label } => {
            let actor = ctx.actor()?;
            let (label, event) = ops::add_label(&mut conn, &workspace, &key, &actor, &label)?;
            render_change(ctx.output, &key, LabelItem { label }, event, |item| {
                format!("{key} already has label {}", item.label.name)
            })
        }
        IssueCommand::Unlabel { key, label } => {
            let actor = ctx.actor()?;
            let (label, event) = ops::remove_label(&mut conn, &workspace, &key, &actor, &label)?;
            render_change(ctx.output, &key, LabelItem { label }, event, |item| {
                format!("{key} does not have label {}", item.label.name)
            })
        }
        IssueCommand::Labels { key } => {
            let labels = ops::issue_labels(&conn, &workspace, &key)?;
            render(ctx.output, &labels, |list, w| {
                for label in list {
                    writeln!(w, "{}\t{}", label.name, label.color_key)?;
                }
                Ok(())
            })
        }
        IssueCommand::Comment { key, body } => {
            let actor = ctx.actor()?;
            let (comment, event) = ops::add_comment(&mut conn, &workspace, &key, &actor, &body)?;
            render_change(ctx.output, &key, CommentItem { comment }, event, |item| {
                format!("{key} unchanged ({})", item.comment.id)
            })
        }
        IssueCommand::Comments { key } => {
            let comments = ops::list_comments(&conn, &workspace, &key)?;
            render_mode(
                ctx.output,
                &comments,
                |list, w| {
                    for comment in list {
                        writeln!(w, "{}\t{}\t{}", comment.id, comment.author, comment.body)?;
                    }
                    Ok(())
                },
                |list, w| {
                    pretty_section(w, &format!("Comments on {key} ({})", list.len()))?;
                    for comment in list {
                        writeln!(
                            w,
                            "{}  {:<10} {}",
                            micros_to_local(comment.created_at_us),
                            comment.author,
                            comment.id
                        )?;
                        writeln!(w, "  {}", comment.body)?;
                    }
                    Ok(())
                },
            )
        }
        IssueCommand::Uncomment { key, comment_id } => {
            let actor = ctx.actor()?;
            let (comment, event) =
                ops::delete_comment(&mut conn, &workspace, &key, &actor, &comment_id)?;
            render_change(ctx.output, &key, CommentItem { comment }, event, |item| {
                format!("Comment {} was already deleted", item.comment.id)
            })
        }
    }
}

fn read_import(file: &Path, ctx: &Context) -> Result<Vec<NewIssue>> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let defaults = &ctx.config.project.issues;
    Ok(parse_import(&content)
        .map(|summary| NewIssue {
            summary: summary.to_string(),
            description: None,
            status: defaults.default_status,
            priority: defaults.default_priority,
        })
        .collect())
}

/// Non-empty, non-comment lines, trimmed.
fn parse_import(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn render_update(output: OutputMode, (issue, event): (Issue, Option<ChangeEvent>)) -> Result<()> {
    let report = UpdateReport {
        changed: event.is_some(),
        issue,
        event,
    };
    render(output, &report, |r, w| match &r.event {
        Some(event) => writeln!(w, "✓ {}: {}", r.issue.key, describe_event(event)),
        None => writeln!(w, "{} unchanged", r.issue.key),
    })
}

fn render_change<T: Serialize>(
    output: OutputMode,
    key: &str,
    item: T,
    event: Option<ChangeEvent>,
    unchanged: impl FnOnce(&T) -> String,
) -> Result<()> {
    let report = ChangeReport {
        key,
        item,
        changed: event.is_some(),
        event,
    };
    render(output, &report, |r, w| match &r.event {
        Some(event) => writeln!(w, "✓ {}: {}", r.key, describe_event(event)),
        None => writeln!(w, "{}", unchanged(&r.item)),
    })
}

fn write_issue_row(issue: &Issue, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        issue.key,
        issue.status,
        issue.priority,
        issue.assignee.as_deref().unwrap_or("-"),
        issue.summary
    )
}

fn write_issue_detail(issue: &Issue, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("{}  {}", issue.key, issue.summary))?;
    pretty_kv(w, "Status", issue.status.as_str())?;
    pretty_kv(w, "Priority", issue.priority.as_str())?;
    pretty_kv(w, "Assignee", issue.assignee.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Created by", &issue.created_by)?;
    pretty_kv(w, "Created", micros_to_local(issue.created_at_us))?;
    pretty_kv(w, "Updated", micros_to_local(issue.updated_at_us))?;
    if let Some(description) = &issue.description {
        pretty_rule(w)?;
        writeln!(w, "{description}")?;
    }
    Ok(())
}

fn describe_event(event: &ChangeEvent) -> String {
    fn or_none(value: Option<&str>) -> &str {
        value.unwrap_or("(none)")
    }

    match &event.change {
        None => event.kind.to_string(),
        Some(IssueChange::Status { from, to }) => format!("status {from} -> {to}"),
        Some(IssueChange::Priority { from, to }) => format!("priority {from} -> {to}"),
        Some(IssueChange::Assignee { from, to }) => format!(
            "assignee {} -> {}",
            or_none(from.as_deref()),
            or_none(to.as_deref())
        ),
        Some(IssueChange::Summary { to, .. }) => format!("summary -> {to}"),
        Some(IssueChange::Description { to, .. }) => {
            if to.is_some() {
                "description updated".to_string()
            } else {
                "description cleared".to_string()
            }
        }
        Some(IssueChange::CommentAdded { comment_id }) => format!("comment {comment_id} added"),
        Some(IssueChange::CommentDeleted { comment_id }) => {
            format!("comment {comment_id} deleted")
        }
        Some(IssueChange::LabelAdded { name, .. }) => format!("label +{name}"),
        Some(IssueChange::LabelRemoved { name, .. }) => format!("label -{name}"),
    }
}
