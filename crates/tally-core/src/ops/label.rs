use rusqlite::{Connection, OptionalExtension, params};

use super::{LABEL_COLUMNS, issue::get_issue, label_from_row, now_us};
use crate::db;
use crate::error::{TallyError, is_unique_violation};
use crate::event::{
    ChangeEvent, EventContext, IssueChange, build_updated_event, store::append_event,
};
use crate::model::label::{MAX_LABELS_PER_ISSUE, color_for_name};
use crate::model::{Issue, Label, LabelId, Workspace};

/// Create a workspace label. Its color is derived from the name.
///
/// # Errors
///
/// Returns [`TallyError::EmptyText`] for a blank name,
/// [`TallyError::DuplicateLabel`] if the workspace already has a label of
/// that name (ignoring case), or a database error.
pub fn create_label(
    conn: &mut Connection,
    workspace: &Workspace,
    name: &str,
) -> Result<Label, TallyError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TallyError::EmptyText("label name"));
    }

    let label = Label {
        id: LabelId::generate(),
        workspace_id: workspace.id.clone(),
        name: name.to_string(),
        color_key: color_for_name(name).to_string(),
        created_at_us: now_us(),
    };

    let tx = db::write_tx(conn)?;
    let inserted = tx.execute(
        "INSERT INTO labels (label_id, workspace_id, name, color_key, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            label.id.as_str(),
            label.workspace_id.as_str(),
            label.name,
            label.color_key,
            label.created_at_us,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(TallyError::DuplicateLabel {
                workspace: workspace.slug.clone(),
                name: label.name,
            });
        }
        Err(err) => return Err(err.into()),
    }
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        label = %label.name,
        label_id = %label.id,
        "created label"
    );
    Ok(label)
}

/// Look up a label by name, ignoring case.
///
/// # Errors
///
/// Returns [`TallyError::LabelNotFound`] or a database error.
pub fn get_label(
    conn: &Connection,
    workspace: &Workspace,
    name: &str,
) -> Result<Label, TallyError> {
    let name = name.trim();
    let sql = format!(
        "SELECT {LABEL_COLUMNS} FROM labels
         WHERE workspace_id = ?1 AND name = ?2 COLLATE NOCASE"
    );
    conn.query_row(&sql, params![workspace.id.as_str(), name], label_from_row)
        .optional()?
        .ok_or_else(|| TallyError::LabelNotFound {
            workspace: workspace.slug.clone(),
            name: name.to_string(),
        })
}

/// All labels of a workspace, by name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub fn list_labels(conn: &Connection, workspace: &Workspace) -> Result<Vec<Label>, TallyError> {
    let sql = format!(
        "SELECT {LABEL_COLUMNS} FROM labels
         WHERE workspace_id = ?1
         ORDER BY name COLLATE NOCASE"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![workspace.id.as_str()], label_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Labels attached to a live issue, by name.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] or a database error.
pub fn issue_labels(
    conn: &Connection,
    workspace: &Workspace,
    key: &str,
) -> Result<Vec<Label>, TallyError> {
    let issue = get_issue(conn, workspace, key)?;
    labels_of(conn, &issue)
}

fn labels_of(conn: &Connection, issue: &Issue) -> Result<Vec<Label>, TallyError> {
    let sql = format!(
        "SELECT {LABEL_COLUMNS} FROM labels
         WHERE label_id IN (SELECT label_id FROM issue_labels WHERE issue_id = ?1)
         ORDER BY name COLLATE NOCASE"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![issue.id.as_str()], label_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn label_event(issue: &Issue, actor: &str, at_us: i64, change: IssueChange) -> Option<ChangeEvent> {
    build_updated_event(
        &EventContext {
            issue_id: &issue.id,
            workspace_id: &issue.workspace_id,
            actor,
            at_us,
        },
        change,
    )
}

/// Attach a label to an issue and record `label_added`. Attaching a label
/// the issue already has writes nothing and returns `None` for the event.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] and [`get_label`],
/// [`TallyError::TooManyLabels`] once the issue carries
/// [`MAX_LABELS_PER_ISSUE`] labels, or a database error.
pub fn add_label(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    name: &str,
) -> Result<(Label, Option<ChangeEvent>), TallyError> {
    let tx = db::write_tx(conn)?;
    let issue = get_issue(&tx, workspace, key)?;
    let label = get_label(&tx, workspace, name)?;

    let attached: Vec<Label> = labels_of(&tx, &issue)?;
    if attached.iter().any(|l| l.id == label.id) {
        tracing::debug!(key = %issue.key, label = %label.name, "label already attached");
        return Ok((label, None));
    }
    if attached.len() >= MAX_LABELS_PER_ISSUE {
        return Err(TallyError::TooManyLabels {
            key: issue.key,
            max: MAX_LABELS_PER_ISSUE,
        });
    }

    let at_us = now_us();
    tx.execute(
        "INSERT INTO issue_labels (issue_id, label_id, created_at_us) VALUES (?1, ?2, ?3)",
        params![issue.id.as_str(), label.id.as_str(), at_us],
    )?;
    let change = IssueChange::LabelAdded {
        label_id: label.id.clone(),
        name: label.name.clone(),
    };
    let event = label_event(&issue, actor, at_us, change);
    if let Some(event) = &event {
        append_event(&tx, event)?;
    }
    tx.commit()?;

    tracing::info!(key = %issue.key, label = %label.name, actor, "attached label");
    Ok((label, event))
}

/// Detach a label from an issue and record `label_removed`. Detaching a
/// label the issue does not have writes nothing and returns `None`.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] and [`get_label`], or a
/// database error.
pub fn remove_label(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    name: &str,
) -> Result<(Label, Option<ChangeEvent>), TallyError> {
    let tx = db::write_tx(conn)?;
    let issue = get_issue(&tx, workspace, key)?;
    let label = get_label(&tx, workspace, name)?;

    let removed = tx.execute(
        "DELETE FROM issue_labels WHERE issue_id = ?1 AND label_id = ?2",
        params![issue.id.as_str(), label.id.as_str()],
    )?;
    if removed == 0 {
        tracing::debug!(key = %issue.key, label = %label.name, "label not attached");
        return Ok((label, None));
    }

    let change = IssueChange::LabelRemoved {
        label_id: label.id.clone(),
        name: label.name.clone(),
    };
    let event = label_event(&issue, actor, now_us(), change);
    if let Some(event) = &event {
        append_event(&tx, event)?;
    }
    tx.commit()?;

    tracing::info!(key = %issue.key, label = %label.name, actor, "detached label");
    Ok((label, event))
}
