//! Persistence for change events.

use rusqlite::{Connection, params, types::Type};

use super::{ChangeEvent, EventKind, IssueChange};
use crate::error::TallyError;
use crate::model::{IssueId, WorkspaceId};

/// Append one event. Call inside the transaction that performs the mutation.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized or the insert fails.
pub fn append_event(conn: &Connection, event: &ChangeEvent) -> Result<(), TallyError> {
    let payload = event
        .change
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO issue_events (issue_id, workspace_id, actor, kind, payload_json, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.issue_id.as_str(),
            event.workspace_id.as_str(),
            event.actor,
            event.kind.as_str(),
            payload,
            event.created_at_us,
        ],
    )?;
    Ok(())
}

/// Append several events with one prepared statement.
///
/// # Errors
///
/// Returns an error if any payload cannot be serialized or any insert fails.
pub fn append_events(conn: &Connection, events: &[ChangeEvent]) -> Result<(), TallyError> {
    let mut stmt = conn.prepare(
        "INSERT INTO issue_events (issue_id, workspace_id, actor, kind, payload_json, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for event in events {
        let payload = event
            .change
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        stmt.execute(params![
            event.issue_id.as_str(),
            event.workspace_id.as_str(),
            event.actor,
            event.kind.as_str(),
            payload,
            event.created_at_us,
        ])?;
    }
    Ok(())
}

/// Timeline of one issue, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a stored row cannot be decoded.
pub fn issue_events(conn: &Connection, issue_id: &IssueId) -> Result<Vec<ChangeEvent>, TallyError> {
    let mut stmt = conn.prepare(
        "SELECT issue_id, workspace_id, actor, kind, payload_json, created_at_us
         FROM issue_events
         WHERE issue_id = ?1
         ORDER BY event_id",
    )?;

    let rows = stmt.query_map(params![issue_id.as_str()], |row| {
        let kind_raw: String = row.get(3)?;
        let kind: EventKind = kind_raw
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        let payload: Option<String> = row.get(4)?;
        let change = payload
            .map(|json| serde_json::from_str::<IssueChange>(&json))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(ChangeEvent {
            issue_id: IssueId::from_stored(row.get::<_, String>(0)?),
            workspace_id: WorkspaceId::from_stored(row.get::<_, String>(1)?),
            actor: row.get(2)?,
            kind,
            change,
            created_at_us: row.get(5)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
