//! Typed issue mutations and the diffs they produce.
//!
//! An [`IssueUpdate`] is what a caller asks for; diffing it against the
//! current issue yields an [`IssueChange`] (the from/to payload of the
//! change event), or `None` when the update would not change anything.
//! Comment and label changes have no diff; their ops decide what is a no-op.

use serde::{Deserialize, Serialize};

use super::types::EventKind;
use crate::model::{CommentId, Issue, LabelId, Priority, Status};

/// A requested single-field mutation of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueUpdate {
    Status(Status),
    Priority(Priority),
    /// `None` clears the assignee.
    Assignee(Option<String>),
    Summary(String),
    /// `None` clears the description.
    Description(Option<String>),
}

impl IssueUpdate {
    /// Compare against `current`; `None` means the update is a no-op.
    #[must_use]
    pub fn diff(self, current: &Issue) -> Option<IssueChange> {
        let change = match self {
            Self::Status(to) => IssueChange::Status {
                from: current.status,
                to,
            },
            Self::Priority(to) => IssueChange::Priority {
                from: current.priority,
                to,
            },
            Self::Assignee(to) => IssueChange::Assignee {
                from: current.assignee.clone(),
                to,
            },
            Self::Summary(to) => IssueChange::Summary {
                from: current.summary.clone(),
                to,
            },
            Self::Description(to) => IssueChange::Description {
                from: current.description.clone(),
                to,
            },
        };

        (!change.is_noop()).then_some(change)
    }
}

/// Payload of one change event: the from/to values of a field, or the
/// comment or label that was touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum IssueChange {
    Status { from: Status, to: Status },
    Priority { from: Priority, to: Priority },
    Assignee {
        from: Option<String>,
        to: Option<String>,
    },
    Summary { from: String, to: String },
    Description {
        from: Option<String>,
        to: Option<String>,
    },
    CommentAdded { comment_id: CommentId },
    CommentDeleted { comment_id: CommentId },
    LabelAdded { label_id: LabelId, name: String },
    LabelRemoved { label_id: LabelId, name: String },
}

impl IssueChange {
    /// Event kind recorded for this change.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Status { .. } => EventKind::StatusChanged,
            Self::Priority { .. } => EventKind::PriorityChanged,
            Self::Assignee { .. } => EventKind::AssigneeChanged,
            Self::Summary { .. } => EventKind::SummaryChanged,
            Self::Description { .. } => EventKind::DescriptionChanged,
            Self::CommentAdded { .. } => EventKind::CommentAdded,
            Self::CommentDeleted { .. } => EventKind::CommentDeleted,
            Self::LabelAdded { .. } => EventKind::LabelAdded,
            Self::LabelRemoved { .. } => EventKind::LabelRemoved,
        }
    }

    /// True when a field change has `from == to`. Comment and label changes
    /// are never no-ops.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Status { from, to } => from == to,
            Self::Priority { from, to } => from == to,
            Self::Assignee { from, to } | Self::Description { from, to } => from == to,
            Self::Summary { from, to } => from == to,
            Self::CommentAdded { .. }
            | Self::CommentDeleted { .. }
            | Self::LabelAdded { .. }
            | Self::LabelRemoved { .. } => false,
        }
    }

    /// Write the `to` side of a field change onto `issue`. Comment and label
    /// changes live in their own tables and leave `issue` as is.
    pub fn apply(&self, issue: &mut Issue) {
        match self {
            Self::Status { to, .. } => issue.status = *to,
            Self::Priority { to, .. } => issue.priority = *to,
            Self::Assignee { to, .. } => issue.assignee.clone_from(to),
            Self::Summary { to, .. } => issue.summary.clone_from(to),
            Self::Description { to, .. } => issue.description.clone_from(to),
            Self::CommentAdded { .. }
            | Self::CommentDeleted { .. }
            | Self::LabelAdded { .. }
            | Self::LabelRemoved { .. } => {}
        }
    }
}
