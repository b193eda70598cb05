//! Issue change events.
//!
//! Every issue mutation appends exactly one [`ChangeEvent`] in the same
//! transaction as the mutation itself, except no-ops, which append nothing.
//! Events are never updated or deleted.

pub mod change;
pub mod store;
pub mod types;

use serde::Serialize;

use crate::model::{IssueId, WorkspaceId};
pub use change::{IssueChange, IssueUpdate};
pub use types::EventKind;

/// Who did what to which issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext<'a> {
    pub issue_id: &'a IssueId,
    pub workspace_id: &'a WorkspaceId,
    pub actor: &'a str,
    pub at_us: i64,
}

/// One entry on an issue's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub issue_id: IssueId,
    pub workspace_id: WorkspaceId,
    pub actor: String,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<IssueChange>,
    pub created_at_us: i64,
}

/// Event recorded when an issue is created.
#[must_use]
pub fn build_created_event(ctx: &EventContext<'_>) -> ChangeEvent {
    ChangeEvent {
        issue_id: ctx.issue_id.clone(),
        workspace_id: ctx.workspace_id.clone(),
        actor: ctx.actor.to_string(),
        kind: EventKind::IssueCreated,
        change: None,
        created_at_us: ctx.at_us,
    }
}

/// Event recorded for a field, comment or label change, or `None` when
/// `change` is a no-op.
#[must_use]
pub fn build_updated_event(ctx: &EventContext<'_>, change: IssueChange) -> Option<ChangeEvent> {
    if change.is_noop() {
        return None;
    }

    Some(ChangeEvent {
        issue_id: ctx.issue_id.clone(),
        workspace_id: ctx.workspace_id.clone(),
        actor: ctx.actor.to_string(),
        kind: change.kind(),
        change: Some(change),
        created_at_us: ctx.at_us,
    })
}

#[cfg(test)]
mod tests {
    use super::{EventContext, EventKind, IssueChange, build_created_event, build_updated_event};
    use crate::model::{IssueId, Status, WorkspaceId};

    #[test]
    fn created_event_has_no_payload() {
        let issue_id = IssueId::from_stored("is-1");
        let workspace_id = WorkspaceId::from_stored("ws-1");
        let ctx = EventContext {
            issue_id: &issue_id,
            workspace_id: &workspace_id,
            actor: "alice",
            at_us: 42,
        };

        let event = build_created_event(&ctx);
        assert_eq!(event.kind, EventKind::IssueCreated);
        assert!(event.change.is_none());
        assert_eq!(event.created_at_us, 42);
    }

    #[test]
    fn noop_change_builds_no_event() {
        let issue_id = IssueId::from_stored("is-1");
        let workspace_id = WorkspaceId::from_stored("ws-1");
        let ctx = EventContext {
            issue_id: &issue_id,
            workspace_id: &workspace_id,
            actor: "alice",
            at_us: 42,
        };

        let noop = IssueChange::Status {
            from: Status::Done,
            to: Status::Done,
        };
        assert!(build_updated_event(&ctx, noop).is_none());

        let real = IssueChange::Status {
            from: Status::ToDo,
            to: Status::Done,
        };
        let event = build_updated_event(&ctx, real).expect("event");
        assert_eq!(event.kind, EventKind::StatusChanged);
        assert_eq!(event.actor, "alice");
    }
}
