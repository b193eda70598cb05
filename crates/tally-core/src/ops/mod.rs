//! Workspace, team, issue, comment and label operations.
//!
//! Reads take a shared `&Connection`. Every mutation takes `&mut Connection`
//! and runs inside one [`db::write_tx`](crate::db::write_tx): counter
//! increments, row writes and change events commit or roll back together.

pub mod comment;
pub mod issue;
pub mod label;
pub mod team;
pub mod workspace;

use rusqlite::{Row, types::Type};

use crate::key::TeamKey;
use crate::model::{
    Comment, CommentId, Issue, IssueId, Label, LabelId, Team, TeamId, Workspace, WorkspaceId,
};

pub use comment::{add_comment, delete_comment, list_comments};
pub use issue::{
    assign, change_priority, change_status, create_issue, create_issues, delete_issue, get_issue,
    issue_history, list_issues, update_description, update_issue, update_summary,
};
pub use label::{add_label, create_label, get_label, issue_labels, list_labels, remove_label};
pub use team::{change_team_key, create_team, get_team, list_teams, rename_team};
pub use workspace::{create_workspace, get_workspace, list_workspaces};

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

pub(crate) const WORKSPACE_COLUMNS: &str = "workspace_id, slug, display_name, created_at_us";

pub(crate) const TEAM_COLUMNS: &str =
    "team_id, workspace_id, key, name, created_at_us, updated_at_us";

pub(crate) const ISSUE_COLUMNS: &str = "issue_id, workspace_id, team_id, key, key_number, summary, \
     description, status, priority, assignee, created_by, created_at_us, updated_at_us, \
     deleted_at_us";

pub(crate) const LABEL_COLUMNS: &str = "label_id, workspace_id, name, color_key, created_at_us";

pub(crate) const COMMENT_COLUMNS: &str =
    "comment_id, issue_id, workspace_id, author, body, created_at_us, deleted_at_us";

pub(crate) fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: WorkspaceId::from_stored(row.get::<_, String>(0)?),
        slug: row.get(1)?,
        display_name: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}

pub(crate) fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    let raw_key: String = row.get(2)?;
    let key = TeamKey::parse(&raw_key)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Team {
        id: TeamId::from_stored(row.get::<_, String>(0)?),
        workspace_id: WorkspaceId::from_stored(row.get::<_, String>(1)?),
        key,
        name: row.get(3)?,
        created_at_us: row.get(4)?,
        updated_at_us: row.get(5)?,
    })
}

pub(crate) fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let key_number: i64 = row.get(4)?;
    let key_number = u64::try_from(key_number)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e)))?;

    let status: String = row.get(7)?;
    let status = status
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    let priority: String = row.get(8)?;
    let priority = priority
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(Issue {
        id: IssueId::from_stored(row.get::<_, String>(0)?),
        workspace_id: WorkspaceId::from_stored(row.get::<_, String>(1)?),
        team_id: TeamId::from_stored(row.get::<_, String>(2)?),
        key: row.get(3)?,
        key_number,
        summary: row.get(5)?,
        description: row.get(6)?,
        status,
        priority,
        assignee: row.get(9)?,
        created_by: row.get(10)?,
        created_at_us: row.get(11)?,
        updated_at_us: row.get(12)?,
        deleted_at_us: row.get(13)?,
    })
}

pub(crate) fn label_from_row(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: LabelId::from_stored(row.get::<_, String>(0)?),
        workspace_id: WorkspaceId::from_stored(row.get::<_, String>(1)?),
        name: row.get(2)?,
        color_key: row.get(3)?,
        created_at_us: row.get(4)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId::from_stored(row.get::<_, String>(0)?),
        issue_id: IssueId::from_stored(row.get::<_, String>(1)?),
        workspace_id: WorkspaceId::from_stored(row.get::<_, String>(2)?),
        author: row.get(3)?,
        body: row.get(4)?,
        created_at_us: row.get(5)?,
        deleted_at_us: row.get(6)?,
    })
}

/// `u64` issue numbers are stored as SQLite `INTEGER`.
pub(crate) fn stored_number(number: u64) -> rusqlite::Result<i64> {
    i64::try_from(number).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
