//! Change event kinds.
//!
//! The stored representation is a snake_case string in
//! `issue_events.kind`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every kind of change event written to an issue timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The issue was created (single or bulk).
    IssueCreated,
    StatusChanged,
    PriorityChanged,
    AssigneeChanged,
    SummaryChanged,
    DescriptionChanged,
    CommentAdded,
    CommentDeleted,
    LabelAdded,
    LabelRemoved,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of issue_created, status_changed, \
             priority_changed, assignee_changed, summary_changed, description_changed, \
             comment_added, comment_deleted, label_added, label_removed",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    /// All known kinds in catalog order.
    pub const ALL: [Self; 10] = [
        Self::IssueCreated,
        Self::StatusChanged,
        Self::PriorityChanged,
        Self::AssigneeChanged,
        Self::SummaryChanged,
        Self::DescriptionChanged,
        Self::CommentAdded,
        Self::CommentDeleted,
        Self::LabelAdded,
        Self::LabelRemoved,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IssueCreated => "issue_created",
            Self::StatusChanged => "status_changed",
            Self::PriorityChanged => "priority_changed",
            Self::AssigneeChanged => "assignee_changed",
            Self::SummaryChanged => "summary_changed",
            Self::DescriptionChanged => "description_changed",
            Self::CommentAdded => "comment_added",
            Self::CommentDeleted => "comment_deleted",
            Self::LabelAdded => "label_added",
            Self::LabelRemoved => "label_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind { raw: s.to_string() })
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
