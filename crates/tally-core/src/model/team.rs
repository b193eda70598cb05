use serde::Serialize;

use super::ids::{TeamId, WorkspaceId};
use crate::key::TeamKey;

/// A tenant. Owns teams and, through them, issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub slug: String,
    pub display_name: String,
    pub created_at_us: i64,
}

/// A team: a short-keyed subdivision of a workspace with its own issue
/// numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub workspace_id: WorkspaceId,
    pub key: TeamKey,
    pub name: String,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}
