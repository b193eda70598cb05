use rusqlite::{Connection, OptionalExtension, params};

use super::{TEAM_COLUMNS, now_us, team_from_row};
use crate::db;
use crate::error::{TallyError, is_unique_violation};
use crate::key::TeamKey;
use crate::model::{Team, TeamId, Workspace};
use crate::rekey::{RekeyStats, rekey_team_issues};
use crate::sequence::SequenceAllocator;

/// Insert a team row and create its counter at 0. Caller owns the
/// transaction.
pub(crate) fn insert_team(
    conn: &Connection,
    workspace: &Workspace,
    key: TeamKey,
    name: &str,
    at_us: i64,
) -> Result<Team, TallyError> {
    let team = Team {
        id: TeamId::generate(),
        workspace_id: workspace.id.clone(),
        key,
        name: name.to_string(),
        created_at_us: at_us,
        updated_at_us: at_us,
    };

    let inserted = conn.execute(
        "INSERT INTO teams (team_id, workspace_id, key, name, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            team.id.as_str(),
            team.workspace_id.as_str(),
            team.key.as_str(),
            team.name,
            team.created_at_us,
            team.updated_at_us,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(TallyError::DuplicateTeamKey {
                workspace: workspace.slug.clone(),
                key: team.key.to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    }

    SequenceAllocator::new(conn).initialize(&team.workspace_id, &team.id)?;
    Ok(team)
}

/// Create a team and its issue counter.
///
/// # Errors
///
/// Returns [`TallyError::DuplicateTeamKey`] if the workspace already has a
/// team with this key, or a database error.
pub fn create_team(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &TeamKey,
    name: &str,
) -> Result<Team, TallyError> {
    let tx = db::write_tx(conn)?;
    let team = insert_team(&tx, workspace, key.clone(), name.trim(), now_us())?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        team = %team.key,
        team_id = %team.id,
        "created team"
    );
    Ok(team)
}

/// Look up a team by key within a workspace.
///
/// # Errors
///
/// Returns [`TallyError::TeamNotFound`] if there is no such team.
pub fn get_team(
    conn: &Connection,
    workspace: &Workspace,
    key: &TeamKey,
) -> Result<Team, TallyError> {
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE workspace_id = ?1 AND key = ?2");
    conn.query_row(
        &sql,
        params![workspace.id.as_str(), key.as_str()],
        team_from_row,
    )
    .optional()?
    .ok_or_else(|| TallyError::TeamNotFound {
        workspace: workspace.slug.clone(),
        key: key.to_string(),
    })
}

/// Teams of a workspace, by key.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub fn list_teams(conn: &Connection, workspace: &Workspace) -> Result<Vec<Team>, TallyError> {
    let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE workspace_id = ?1 ORDER BY key");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![workspace.id.as_str()], team_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Change a team's display name. Keys and issues are unaffected.
///
/// # Errors
///
/// Returns [`TallyError::TeamNotFound`] or a database error.
pub fn rename_team(
    conn: &mut Connection,
    workspace: &Workspace,
    key: &TeamKey,
    new_name: &str,
) -> Result<Team, TallyError> {
    let tx = db::write_tx(conn)?;
    let mut team = get_team(&tx, workspace, key)?;
    team.name = new_name.trim().to_string();
    team.updated_at_us = now_us();

    tx.execute(
        "UPDATE teams SET name = ?2, updated_at_us = ?3 WHERE team_id = ?1",
        params![team.id.as_str(), team.name, team.updated_at_us],
    )?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        team = %team.key,
        name = %team.name,
        "renamed team"
    );
    Ok(team)
}

/// Change a team's key and rewrite the keys of all its issues.
///
/// The team update and the issue rewrite commit together. The counter is
/// left alone, so numbering continues. Changing to the current key is a
/// no-op.
///
/// # Errors
///
/// Returns [`TallyError::TeamNotFound`], [`TallyError::DuplicateTeamKey`] if
/// another team already uses `new_key`, or a database error.
pub fn change_team_key(
    conn: &mut Connection,
    workspace: &Workspace,
    old_key: &TeamKey,
    new_key: &TeamKey,
) -> Result<(Team, RekeyStats), TallyError> {
    let tx = db::write_tx(conn)?;
    let mut team = get_team(&tx, workspace, old_key)?;
    if old_key == new_key {
        return Ok((team, RekeyStats::default()));
    }

    team.key = new_key.clone();
    team.updated_at_us = now_us();
    let updated = tx.execute(
        "UPDATE teams SET key = ?2, updated_at_us = ?3 WHERE team_id = ?1",
        params![team.id.as_str(), team.key.as_str(), team.updated_at_us],
    );
    match updated {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(TallyError::DuplicateTeamKey {
                workspace: workspace.slug.clone(),
                key: new_key.to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    }

    let stats = rekey_team_issues(&tx, &team)?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        from = %old_key,
        to = %new_key,
        rewritten = stats.rewritten,
        "changed team key"
    );
    Ok((team, stats))
}

#[cfg(test)]
mod tests {
    use super::{change_team_key, create_team, get_team, list_teams, rename_team};
    use crate::db;
    use crate::error::TallyError;
    use crate::key::TeamKey;
    use crate::model::Workspace;
    use crate::ops::create_workspace;
    use crate::sequence::{SequenceAllocator, SequenceError};
    use rusqlite::Connection;

    fn key(raw: &str) -> TeamKey {
        TeamKey::parse(raw).expect("valid key")
    }

    fn workspace(conn: &mut Connection) -> Workspace {
        create_workspace(conn, "acme", "Acme").expect("workspace").0
    }

    #[test]
    fn create_initializes_counter() {
        let mut conn = db::open_in_memory().expect("db");
        let ws = workspace(&mut conn);
        let team = create_team(&mut conn, &ws, &key("eng"), "Engineering").expect("team");

        assert_eq!(team.key.as_str(), "ENG");
        let alloc = SequenceAllocator::new(&conn);
        assert_eq!(alloc.peek(&ws.id, &team.id).expect("peek"), Some(0));
        assert!(matches!(
            alloc.initialize(&ws.id, &team.id),
            Err(SequenceError::Conflict { .. })
        ));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut conn = db::open_in_memory().expect("db");
        let ws = workspace(&mut conn);
        create_team(&mut conn, &ws, &key("ENG"), "Engineering").expect("first");

        let err = create_team(&mut conn, &ws, &key("ENG"), "Other").expect_err("duplicate");
        assert!(matches!(err, TallyError::DuplicateTeamKey { .. }));
    }

    #[test]
    fn same_key_in_other_workspace_is_fine() {
        let mut conn = db::open_in_memory().expect("db");
        let acme = workspace(&mut conn);
        let (globex, _) = create_workspace(&mut conn, "globex", "Globex").expect("globex");

        create_team(&mut conn, &acme, &key("ENG"), "Eng").expect("acme eng");
        create_team(&mut conn, &globex, &key("ENG"), "Eng").expect("globex eng");
    }

    #[test]
    fn list_get_and_rename() {
        let mut conn = db::open_in_memory().expect("db");
        let ws = workspace(&mut conn);
        create_team(&mut conn, &ws, &key("OPS"), "Operations").expect("ops");

        let keys: Vec<String> = list_teams(&conn, &ws)
            .expect("list")
            .into_iter()
            .map(|t| t.key.to_string())
            .collect();
        assert_eq!(keys, vec!["ACM", "OPS"]);

        let renamed = rename_team(&mut conn, &ws, &key("OPS"), "Platform").expect("rename");
        assert_eq!(renamed.name, "Platform");
        assert_eq!(get_team(&conn, &ws, &key("OPS")).expect("get").name, "Platform");
        assert!(matches!(
            get_team(&conn, &ws, &key("NOPE")),
            Err(TallyError::TeamNotFound { .. })
        ));
    }

    #[test]
    fn rekey_to_taken_key_fails_and_keeps_old_key() {
        let mut conn = db::open_in_memory().expect("db");
        let ws = workspace(&mut conn);
        create_team(&mut conn, &ws, &key("ENG"), "Eng").expect("eng");
        create_team(&mut conn, &ws, &key("OPS"), "Ops").expect("ops");

        let err = change_team_key(&mut conn, &ws, &key("ENG"), &key("OPS")).expect_err("taken");
        assert!(matches!(err, TallyError::DuplicateTeamKey { .. }));
        assert!(get_team(&conn, &ws, &key("ENG")).is_ok());
    }

    #[test]
    fn rekey_to_same_key_is_a_noop() {
        let mut conn = db::open_in_memory().expect("db");
        let ws = workspace(&mut conn);
        let team = create_team(&mut conn, &ws, &key("ENG"), "Eng").expect("eng");

        let (after, stats) =
            change_team_key(&mut conn, &ws, &key("ENG"), &key("ENG")).expect("noop");
        assert_eq!(after, team);
        assert_eq!(stats.rewritten, 0);
    }
}
