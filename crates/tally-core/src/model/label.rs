use serde::Serialize;

use super::ids::{LabelId, WorkspaceId};

/// Most labels one issue can carry.
pub const MAX_LABELS_PER_ISSUE: usize = 100;

/// Palette label colors are picked from.
pub const LABEL_COLORS: [&str; 10] = [
    "gray", "red", "orange", "amber", "green", "teal", "blue", "indigo", "purple", "pink",
];

/// A workspace-wide tag that can be attached to any of its issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: LabelId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub color_key: String,
    pub created_at_us: i64,
}

/// Stable color for a label name. Case-insensitive, so `Bug` and `bug`
/// share a color.
#[must_use]
pub fn color_for_name(name: &str) -> &'static str {
    let index = name
        .trim()
        .bytes()
        .map(|b| usize::from(b.to_ascii_lowercase()))
        .fold(0, |acc, b| (acc * 31 + b) % LABEL_COLORS.len());
    LABEL_COLORS[index]
}
