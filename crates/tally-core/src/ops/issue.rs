use rusqlite::{Connection, OptionalExtension, params};

use super::{ISSUE_COLUMNS, issue_from_row, now_us, stored_number, team::get_team};
use crate::db;
use crate::error::TallyError;
use crate::event::{
    ChangeEvent, EventContext, IssueUpdate, build_created_event, build_updated_event,
    store::{append_event, append_events, issue_events},
};
use crate::key::{IssueKey, TeamKey};
use crate::model::{Issue, IssueId, NewIssue, Priority, Status, Team, Workspace};
use crate::sequence::SequenceAllocator;

fn build_issue(team: &Team, number: u64, actor: &str, new: NewIssue, at_us: i64) -> Issue {
    Issue {
        id: IssueId::generate(),
        workspace_id: team.workspace_id.clone(),
        team_id: team.id.clone(),
        key: team.key.issue_key(number),
        key_number: number,
        summary: new.summary.trim().to_string(),
        description: new.description,
        status: new.status,
        priority: new.priority,
        assignee: None,
        created_by: actor.to_string(),
        created_at_us: at_us,
        updated_at_us: at_us,
        deleted_at_us: None,
    }
}

fn insert_issue(conn: &Connection, issue: &Issue) -> Result<(), TallyError> {
    conn.execute(
        "INSERT INTO issues (issue_id, workspace_id, team_id, key, key_number, summary,
                             description, status, priority, assignee, created_by,
                             created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            issue.id.as_str(),
            issue.workspace_id.as_str(),
            issue.team_id.as_str(),
            issue.key,
            stored_number(issue.key_number)?,
            issue.summary,
            issue.description,
            issue.status.as_str(),
            issue.priority.as_str(),
            issue.assignee,
            issue.created_by,
            issue.created_at_us,
            issue.updated_at_us,
        ],
    )?;
    Ok(())
}

fn created_event(issue: &Issue) -> ChangeEvent {
    build_created_event(&EventContext {
        issue_id: &issue.id,
        workspace_id: &issue.workspace_id,
        actor: &issue.created_by,
        at_us: issue.created_at_us,
    })
}

/// Create one issue: allocate the team's next number, insert the issue and
/// record its `issue_created` event in one transaction.
///
/// # Errors
///
/// Returns [`TallyError::TeamNotFound`], a sequence error, or a database
/// error. On error nothing is written and the number is not consumed.
pub fn create_issue(
    conn: &mut Connection,
    workspace: &Workspace,
    team_key: &TeamKey,
    actor: &str,
    new: NewIssue,
) -> Result<Issue, TallyError> {
    let tx = db::write_tx(conn)?;
    let team = get_team(&tx, workspace, team_key)?;

    let number = SequenceAllocator::new(&tx).next(&team.workspace_id, &team.id)?;
    let issue = build_issue(&team, number, actor, new, now_us());
    insert_issue(&tx, &issue)?;
    append_event(&tx, &created_event(&issue))?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        key = %issue.key,
        issue_id = %issue.id,
        actor,
        "created issue"
    );
    Ok(issue)
}

/// Create several issues under one block of consecutive numbers. Issues are
/// numbered in input order. Empty input allocates nothing.
///
/// # Errors
///
/// Returns [`TallyError::BatchTooLarge`] if the input does not fit one
/// allocation, otherwise the same errors as [`create_issue`].
pub fn create_issues(
    conn: &mut Connection,
    workspace: &Workspace,
    team_key: &TeamKey,
    actor: &str,
    new: Vec<NewIssue>,
) -> Result<Vec<Issue>, TallyError> {
    let count = u32::try_from(new.len()).map_err(|_| TallyError::BatchTooLarge(new.len()))?;

    let tx = db::write_tx(conn)?;
    let team = get_team(&tx, workspace, team_key)?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let numbers = SequenceAllocator::new(&tx).next_batch(&team.workspace_id, &team.id, count)?;
    let at_us = now_us();
    let issues: Vec<Issue> = numbers
        .into_iter()
        .zip(new)
        .map(|(number, input)| build_issue(&team, number, actor, input, at_us))
        .collect();

    for issue in &issues {
        insert_issue(&tx, issue)?;
    }
    let events: Vec<ChangeEvent> = issues.iter().map(created_event).collect();
    append_events(&tx, &events)?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        team = %team.key,
        count,
        first = issues.first().map(|i| i.key.as_str()),
        last = issues.last().map(|i| i.key.as_str()),
        actor,
        "created issues"
    );
    Ok(issues)
}

/// Look up a live issue by key. Input is normalised, so `eng-7` finds
/// `ENG-7`.
///
/// # Errors
///
/// Returns [`TallyError::Key`] for malformed input,
/// [`TallyError::IssueNotFound`] if no live issue has the key, or a
/// database error.
pub fn get_issue(conn: &Connection, workspace: &Workspace, key: &str) -> Result<Issue, TallyError> {
    let key = IssueKey::parse(key)?.to_string();
    let sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE workspace_id = ?1 AND key = ?2 AND deleted_at_us IS NULL"
    );

    conn.query_row(&sql, params![workspace.id.as_str(), key], issue_from_row)
        .optional()?
        .ok_or_else(|| TallyError::IssueNotFound {
            workspace: workspace.slug.clone(),
            key,
        })
}

/// Live issues of a team, by number.
///
/// # Errors
///
/// Returns [`TallyError::TeamNotFound`] or a database error.
pub fn list_issues(
    conn: &Connection,
    workspace: &Workspace,
    team_key: &TeamKey,
) -> Result<Vec<Issue>, TallyError> {
    let team = get_team(conn, workspace, team_key)?;
    let sql = format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE team_id = ?1 AND deleted_at_us IS NULL
         ORDER BY key_number"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![team.id.as_str()], issue_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Apply one field update. An update that changes nothing writes nothing
/// and returns `None` for the event.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] or a database error.
pub fn update_issue(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    update: IssueUpdate,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    let tx = db::write_tx(conn)?;
    let mut issue = get_issue(&tx, workspace, key)?;

    let Some(change) = update.diff(&issue) else {
        tracing::debug!(key = %issue.key, "update is a no-op");
        return Ok((issue, None));
    };

    let at_us = now_us();
    let event = build_updated_event(
        &EventContext {
            issue_id: &issue.id,
            workspace_id: &issue.workspace_id,
            actor,
            at_us,
        },
        change.clone(),
    );
    change.apply(&mut issue);
    issue.updated_at_us = at_us;

    tx.execute(
        "UPDATE issues
         SET summary = ?2, description = ?3, status = ?4, priority = ?5, assignee = ?6,
             updated_at_us = ?7
         WHERE issue_id = ?1",
        params![
            issue.id.as_str(),
            issue.summary,
            issue.description,
            issue.status.as_str(),
            issue.priority.as_str(),
            issue.assignee,
            issue.updated_at_us,
        ],
    )?;
    if let Some(event) = &event {
        append_event(&tx, event)?;
    }
    tx.commit()?;

    tracing::info!(key = %issue.key, kind = %change.kind(), actor, "updated issue");
    Ok((issue, event))
}

/// Move an issue to `status`.
///
/// # Errors
///
/// See [`update_issue`].
pub fn change_status(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    status: Status,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    update_issue(conn, workspace, key, actor, IssueUpdate::Status(status))
}

/// Set an issue's priority.
///
/// # Errors
///
/// See [`update_issue`].
pub fn change_priority(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    priority: Priority,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    update_issue(conn, workspace, key, actor, IssueUpdate::Priority(priority))
}

/// Set or clear (`None`) an issue's assignee.
///
/// # Errors
///
/// See [`update_issue`].
pub fn assign(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    assignee: Option<String>,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    update_issue(conn, workspace, key, actor, IssueUpdate::Assignee(assignee))
}

/// Replace an issue's summary.
///
/// # Errors
///
/// See [`update_issue`].
pub fn update_summary(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    summary: &str,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    let summary = IssueUpdate::Summary(summary.trim().to_string());
    update_issue(conn, workspace, key, actor, summary)
}

/// Set or clear (`None`) an issue's description.
///
/// # Errors
///
/// See [`update_issue`].
pub fn update_description(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    description: Option<String>,
) -> Result<(Issue, Option<ChangeEvent>), TallyError> {
    update_issue(conn, workspace, key, actor, IssueUpdate::Description(description))
}

/// Soft-delete an issue. Its number stays used and no event is recorded.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] or a database error.
pub fn delete_issue(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
) -> Result<Issue, TallyError> {
    let tx = db::write_tx(conn)?;
    let mut issue = get_issue(&tx, workspace, key)?;

    let at_us = now_us();
    tx.execute(
        "UPDATE issues SET deleted_at_us = ?2, updated_at_us = ?2 WHERE issue_id = ?1",
        params![issue.id.as_str(), at_us],
    )?;
    tx.commit()?;

    issue.deleted_at_us = Some(at_us);
    issue.updated_at_us = at_us;
    tracing::info!(key = %issue.key, issue_id = %issue.id, "deleted issue");
    Ok(issue)
}

/// Change events of a live issue, oldest first.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] or a database error.
pub fn issue_history(
    conn: &Connection,
    workspace: &Workspace,
    key: &str,
) -> Result<Vec<ChangeEvent>, TallyError> {
    let issue = get_issue(conn, workspace, key)?;
    issue_events(conn, &issue.id)
}
