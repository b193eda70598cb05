use rusqlite::{Connection, OptionalExtension, params};

use super::{WORKSPACE_COLUMNS, now_us, team::insert_team, workspace_from_row};
use crate::db;
use crate::error::{TallyError, is_unique_violation};
use crate::key::{TeamKey, validate_slug};
use crate::model::{Team, Workspace, WorkspaceId};

/// Create a workspace together with its default team.
///
/// The default team's key is derived from `display_name` (see
/// [`TeamKey::derive_from_name`]) and its counter starts at 0.
///
/// # Errors
///
/// Returns [`TallyError::Key`] for an invalid slug,
/// [`TallyError::DuplicateWorkspace`] if the slug is taken, or a database
/// error.
pub fn create_workspace(
    conn: &mut Connection,
    slug: &str,
    display_name: &str,
) -> Result<(Workspace, Team), TallyError> {
    let slug = validate_slug(slug.trim())?;
    let display_name = display_name.trim();
    let team_key = TeamKey::derive_from_name(display_name);

    let workspace = Workspace {
        id: WorkspaceId::generate(),
        slug: slug.to_string(),
        display_name: display_name.to_string(),
        created_at_us: now_us(),
    };

    let tx = db::write_tx(conn)?;
    let inserted = tx.execute(
        "INSERT INTO workspaces (workspace_id, slug, display_name, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            workspace.id.as_str(),
            workspace.slug,
            workspace.display_name,
            workspace.created_at_us,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(TallyError::DuplicateWorkspace(workspace.slug));
        }
        Err(err) => return Err(err.into()),
    }

    let team = insert_team(&tx, &workspace, team_key, display_name, workspace.created_at_us)?;
    tx.commit()?;

    tracing::info!(
        workspace = %workspace.slug,
        workspace_id = %workspace.id,
        default_team = %team.key,
        "created workspace"
    );
    Ok((workspace, team))
}

/// Look up a workspace by slug.
///
/// # Errors
///
/// Returns [`TallyError::WorkspaceNotFound`] if no workspace has that slug.
pub fn get_workspace(conn: &Connection, slug: &str) -> Result<Workspace, TallyError> {
    let sql = format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE slug = ?1");
    conn.query_row(&sql, params![slug.trim()], workspace_from_row)
        .optional()?
        .ok_or_else(|| TallyError::WorkspaceNotFound(slug.trim().to_string()))
}

/// All workspaces, by slug.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub fn list_workspaces(conn: &Connection) -> Result<Vec<Workspace>, TallyError> {
    let sql = format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces ORDER BY slug");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], workspace_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[cfg(test)]
mod tests {
    use super::{create_workspace, get_workspace, list_workspaces};
    use crate::db;
    use crate::error::{ErrorCode, TallyError};
    use crate::key::FALLBACK_TEAM_KEY;
    use crate::sequence::SequenceAllocator;

    #[test]
    fn create_makes_default_team_with_counter() {
        let mut conn = db::open_in_memory().expect("db");
        let (ws, team) = create_workspace(&mut conn, "acme", "Acme Corp").expect("create");

        assert_eq!(team.key.as_str(), "ACM");
        assert_eq!(team.name, "Acme Corp");
        assert_eq!(team.workspace_id, ws.id);

        let counter = SequenceAllocator::new(&conn)
            .peek(&ws.id, &team.id)
            .expect("peek");
        assert_eq!(counter, Some(0));
    }

    #[test]
    fn duplicate_slug_is_rejected_and_rolled_back() {
        let mut conn = db::open_in_memory().expect("db");
        create_workspace(&mut conn, "acme", "Acme").expect("first");

        let err = create_workspace(&mut conn, "acme", "Other").expect_err("duplicate");
        assert!(matches!(err, TallyError::DuplicateWorkspace(ref slug) if slug == "acme"));
        assert_eq!(err.code(), ErrorCode::DuplicateWorkspace);

        let teams: i64 = conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .expect("count");
        assert_eq!(teams, 1);
    }

    #[test]
    fn invalid_slug_is_rejected() {
        let mut conn = db::open_in_memory().expect("db");
        assert!(matches!(
            create_workspace(&mut conn, "Acme Co", "Acme"),
            Err(TallyError::Key(_))
        ));
        assert!(list_workspaces(&conn).expect("list").is_empty());
    }

    #[test]
    fn name_starting_with_digit_still_gets_a_team() {
        let mut conn = db::open_in_memory().expect("db");
        let (ws, team) = create_workspace(&mut conn, "three-m", "3M Company").expect("create");
        assert_eq!(team.key.as_str(), "MCO");
        assert_eq!(team.name, "3M Company");
        assert_eq!(ws.display_name, "3M Company");

        let (_, numeric) = create_workspace(&mut conn, "numbers", "123").expect("create");
        assert_eq!(numeric.key.as_str(), FALLBACK_TEAM_KEY);
    }

    #[test]
    fn get_and_list() {
        let mut conn = db::open_in_memory().expect("db");
        create_workspace(&mut conn, "zeta", "Zeta").expect("zeta");
        create_workspace(&mut conn, "acme", "Acme").expect("acme");

        assert_eq!(get_workspace(&conn, "acme").expect("get").display_name, "Acme");
        assert!(matches!(
            get_workspace(&conn, "nope"),
            Err(TallyError::WorkspaceNotFound(_))
        ));

        let slugs: Vec<String> = list_workspaces(&conn)
            .expect("list")
            .into_iter()
            .map(|ws| ws.slug)
            .collect();
        assert_eq!(slugs, vec!["acme", "zeta"]);
    }
}
