pub mod init;
pub mod issue;
pub mod label;
pub mod team;
pub mod workspace;

use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};
use tally_core::config::{EffectiveConfig, TALLY_DIR};
use tally_core::db::{self, DB_FILE_NAME};
use tally_core::key::TeamKey;
use tally_core::model::Workspace;
use tally_core::ops;
use tally_core::{ErrorCode, TallyError};

use crate::actor;
use crate::output::{CliError, OutputMode};

/// Everything a command handler needs besides its own arguments.
pub struct Context {
    pub project_root: PathBuf,
    pub output: OutputMode,
    pub config: EffectiveConfig,
    pub actor_flag: Option<String>,
    pub workspace_flag: Option<String>,
}

impl Context {
    pub fn db_path(&self) -> PathBuf {
        db_path(&self.project_root)
    }

    /// Open the project database. Fails if `tly init` has not been run.
    pub fn open_db(&self) -> Result<Connection> {
        let path = self.db_path();
        if !path.exists() {
            return Err(CliError::from_code(
                ErrorCode::NotInitialized,
                format!("no tally database at {}", path.display()),
            )
            .into());
        }
        db::open_db(&path, self.config.project.database.busy_timeout())
    }

    /// Resolve the workspace: `--workspace` > `TALLY_WORKSPACE` > project
    /// config default.
    pub fn workspace(&self, conn: &Connection) -> Result<Workspace> {
        let env_slug = env::var("TALLY_WORKSPACE").ok().filter(|s| !s.is_empty());
        let slug = self
            .workspace_flag
            .clone()
            .or(env_slug)
            .or_else(|| self.config.project.workspace.default.clone())
            .ok_or_else(|| {
                CliError::from_code(ErrorCode::WorkspaceNotFound, "no workspace selected")
            })?;

        tracing::debug!(workspace = %slug, "resolved workspace");
        Ok(ops::get_workspace(conn, &slug)?)
    }

    /// Resolve the actor for a mutating command.
    pub fn actor(&self) -> Result<String> {
        let actor = actor::require_actor(
            self.actor_flag.as_deref(),
            self.config.user.actor.as_deref(),
        )?;
        Ok(actor)
    }
}

pub fn db_path(project_root: &Path) -> PathBuf {
    project_root.join(TALLY_DIR).join(DB_FILE_NAME)
}

/// Parse a team key argument, keeping the domain error code.
pub fn team_key(raw: &str) -> Result<TeamKey, TallyError> {
    Ok(TeamKey::parse(raw)?)
}
