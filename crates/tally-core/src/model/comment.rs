use serde::Serialize;

use super::ids::{CommentId, IssueId, WorkspaceId};

/// A note left on an issue. Deleting a comment only sets `deleted_at_us`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub workspace_id: WorkspaceId,
    pub author: String,
    pub body: String,
    pub created_at_us: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at_us: Option<i64>,
}
