use rusqlite::{Connection, OptionalExtension, params};

use super::{COMMENT_COLUMNS, comment_from_row, issue::get_issue, now_us};
use crate::db;
use crate::error::TallyError;
use crate::event::{
    ChangeEvent, EventContext, IssueChange, build_updated_event, store::append_event,
};
use crate::model::{Comment, CommentId, Issue, Workspace};

fn record(
    conn: &Connection,
    issue: &Issue,
    actor: &str,
    at_us: i64,
    change: IssueChange,
) -> Result<Option<ChangeEvent>, TallyError> {
    let event = build_updated_event(
        &EventContext {
            issue_id: &issue.id,
            workspace_id: &issue.workspace_id,
            actor,
            at_us,
        },
        change,
    );
    if let Some(event) = &event {
        append_event(conn, event)?;
    }
    Ok(event)
}

/// Add a comment to a live issue and record `comment_added`.
///
/// # Errors
///
/// Returns [`TallyError::EmptyText`] for a blank body, the lookup errors of
/// [`get_issue`], or a database error.
pub fn add_comment(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    body: &str,
) -> Result<(Comment, Option<ChangeEvent>), TallyError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TallyError::EmptyText("comment"));
    }

    let tx = db::write_tx(conn)?;
    let issue = get_issue(&tx, workspace, key)?;

    let comment = Comment {
        id: CommentId::generate(),
        issue_id: issue.id.clone(),
        workspace_id: issue.workspace_id.clone(),
        author: actor.to_string(),
        body: body.to_string(),
        created_at_us: now_us(),
        deleted_at_us: None,
    };
    tx.execute(
        "INSERT INTO issue_comments (comment_id, issue_id, workspace_id, author, body,
                                     created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            comment.id.as_str(),
            comment.issue_id.as_str(),
            comment.workspace_id.as_str(),
            comment.author,
            comment.body,
            comment.created_at_us,
        ],
    )?;
    let change = IssueChange::CommentAdded {
        comment_id: comment.id.clone(),
    };
    let event = record(&tx, &issue, actor, comment.created_at_us, change)?;
    tx.commit()?;

    tracing::info!(key = %issue.key, comment_id = %comment.id, actor, "added comment");
    Ok((comment, event))
}

/// Soft-delete a comment and record `comment_deleted`. Deleting a comment
/// that is already deleted writes nothing and returns `None` for the event.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`],
/// [`TallyError::CommentNotFound`] if the issue has no such comment, or a
/// database error.
pub fn delete_comment(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &str,
    actor: &str,
    comment_id: &str,
) -> Result<(Comment, Option<ChangeEvent>), TallyError> {
    let tx = db::write_tx(conn)?;
    let issue = get_issue(&tx, workspace, key)?;

    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM issue_comments WHERE comment_id = ?1 AND issue_id = ?2"
    );
    let mut comment = tx
        .query_row(&sql, params![comment_id.trim(), issue.id.as_str()], comment_from_row)
        .optional()?
        .ok_or_else(|| TallyError::CommentNotFound {
            key: issue.key.clone(),
            comment_id: comment_id.trim().to_string(),
        })?;

    if comment.deleted_at_us.is_some() {
        tracing::debug!(key = %issue.key, comment_id = %comment.id, "comment already deleted");
        return Ok((comment, None));
    }

    let at_us = now_us();
    tx.execute(
        "UPDATE issue_comments SET deleted_at_us = ?2 WHERE comment_id = ?1",
        params![comment.id.as_str(), at_us],
    )?;
    comment.deleted_at_us = Some(at_us);
    let change = IssueChange::CommentDeleted {
        comment_id: comment.id.clone(),
    };
    let event = record(&tx, &issue, actor, at_us, change)?;
    tx.commit()?;

    tracing::info!(key = %issue.key, comment_id = %comment.id, actor, "deleted comment");
    Ok((comment, event))
}

/// Live comments of a live issue, oldest first.
///
/// # Errors
///
/// Returns the lookup errors of [`get_issue`] or a database error.
pub fn list_comments(
    conn: &Connection,
    workspace: &Workspace,
    key: &str,
) -> Result<Vec<Comment>, TallyError> {
    let issue = get_issue(conn, workspace, key)?;
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM issue_comments
         WHERE issue_id = ?1 AND deleted_at_us IS NULL
         ORDER BY created_at_us, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![issue.id.as_str()], comment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::model::NewIssue;
    use crate::ops::{create_issue, create_workspace, issue_history};

    fn setup() -> (Connection, Workspace) {
        let mut conn = db::open_in_memory().expect("db");
        let (ws, team) = create_workspace(&mut conn, "acme", "Engineering").expect("workspace");
        create_issue(&mut conn, &ws, &team.key, "alice", NewIssue::summary("a")).expect("ENG-1");
        create_issue(&mut conn, &ws, &team.key, "alice", NewIssue::summary("b")).expect("ENG-2");
        (conn, ws)
    }

    #[test]
    fn comment_is_listed_and_logged() {
        let (mut conn, ws) = setup();
        let (comment, event) =
            add_comment(&mut conn, &ws, "eng-1", "bob", "  Repro attached\n").expect("comment");
        assert_eq!(comment.body, "Repro attached");
        assert_eq!(comment.author, "bob");

        let event = event.expect("comment_added recorded");
        assert_eq!(event.kind, EventKind::CommentAdded);
        assert_eq!(
            event.change,
            Some(IssueChange::CommentAdded {
                comment_id: comment.id.clone()
            })
        );

        assert_eq!(list_comments(&conn, &ws, "ENG-1").expect("list"), vec![comment]);
        assert!(list_comments(&conn, &ws, "ENG-2").expect("list").is_empty());
    }

    #[test]
    fn blank_comment_is_rejected_without_event() {
        let (mut conn, ws) = setup();
        assert!(matches!(
            add_comment(&mut conn, &ws, "ENG-1", "bob", " \n "),
            Err(TallyError::EmptyText(_))
        ));
        assert_eq!(issue_history(&conn, &ws, "ENG-1").expect("history").len(), 1);
    }

    #[test]
    fn delete_hides_comment_and_is_logged_once() {
        let (mut conn, ws) = setup();
        let (first, _) = add_comment(&mut conn, &ws, "ENG-1", "bob", "first").expect("first");
        add_comment(&mut conn, &ws, "ENG-1", "bob", "second").expect("second");

        let (deleted, event) =
            delete_comment(&mut conn, &ws, "ENG-1", "carol", first.id.as_str()).expect("delete");
        assert!(deleted.deleted_at_us.is_some());
        let event = event.expect("comment_deleted recorded");
        assert_eq!(event.actor, "carol");
        assert_eq!(event.kind, EventKind::CommentDeleted);

        let (_, again) =
            delete_comment(&mut conn, &ws, "ENG-1", "carol", first.id.as_str()).expect("again");
        assert!(again.is_none());

        let bodies: Vec<String> = list_comments(&conn, &ws, "ENG-1")
            .expect("list")
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(bodies, vec!["second"]);

        let kinds: Vec<EventKind> = issue_history(&conn, &ws, "ENG-1")
            .expect("history")
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::IssueCreated,
                EventKind::CommentAdded,
                EventKind::CommentAdded,
                EventKind::CommentDeleted,
            ]
        );
    }

    #[test]
    fn comment_of_another_issue_is_not_found() {
        let (mut conn, ws) = setup();
        let (comment, _) = add_comment(&mut conn, &ws, "ENG-1", "bob", "note").expect("comment");

        let err = delete_comment(&mut conn, &ws, "ENG-2", "bob", comment.id.as_str())
            .expect_err("wrong issue");
        assert!(matches!(err, TallyError::CommentNotFound { ref key, .. } if key == "ENG-2"));
        assert_eq!(list_comments(&conn, &ws, "ENG-1").expect("list").len(), 1);
    }
}
