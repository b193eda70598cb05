//! Issue key rewrite after a team key change.
//!
//! Issue numbers never change; only the prefix before the first separator is
//! replaced with the team's current key. The sequence counter is not touched,
//! so the next issue continues from where the old key left off.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::TallyError;
use crate::key::rewrite_prefix;
use crate::model::Team;

/// Outcome of one cascade run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RekeyStats {
    /// Issues of the team looked at, deleted ones included.
    pub scanned: usize,
    /// Issues whose key was rewritten.
    pub rewritten: usize,
    /// Issues with no separator in their key, left as they were.
    pub skipped: usize,
}

/// Rewrite every issue key of `team` to use `team.key` as prefix.
///
/// Run inside the transaction that changed the team key. Running it again
/// with the same key rewrites nothing.
///
/// # Errors
///
/// Returns a database error if reading or updating issues fails, including
/// a unique violation if a rewritten key is already used in the workspace.
pub fn rekey_team_issues(conn: &Connection, team: &Team) -> Result<RekeyStats, TallyError> {
    let mut select = conn.prepare(
        "SELECT issue_id, key FROM issues
         WHERE workspace_id = ?1 AND team_id = ?2
         ORDER BY key_number",
    )?;
    let rows = select
        .query_map(params![team.workspace_id.as_str(), team.id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut update = conn.prepare("UPDATE issues SET key = ?2 WHERE issue_id = ?1")?;
    let mut stats = RekeyStats {
        scanned: rows.len(),
        ..RekeyStats::default()
    };

    for (issue_id, old_key) in rows {
        let Some(new_key) = rewrite_prefix(&old_key, &team.key) else {
            tracing::warn!(
                issue_id = %issue_id,
                key = %old_key,
                team = %team.key,
                "issue key has no separator; leaving it unchanged"
            );
            stats.skipped += 1;
            continue;
        };

        if new_key != old_key {
            update.execute(params![issue_id, new_key])?;
            stats.rewritten += 1;
        }
    }

    tracing::info!(
        team = %team.key,
        team_id = %team.id,
        scanned = stats.scanned,
        rewritten = stats.rewritten,
        skipped = stats.skipped,
        "rewrote issue keys"
    );
    Ok(stats)
}
