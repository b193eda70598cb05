use std::fmt;

use crate::key::KeyError;
use crate::sequence::SequenceError;

/// Machine-readable error codes for scripts and agents driving `tly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    WorkspaceNotFound,
    TeamNotFound,
    IssueNotFound,
    DuplicateWorkspace,
    DuplicateTeamKey,
    InvalidKey,
    InvalidEnumValue,
    BatchTooLarge,
    LabelNotFound,
    CommentNotFound,
    DuplicateLabel,
    TooManyLabels,
    EmptyText,
    SequenceConflict,
    SequenceIntegrity,
    StoreBusy,
    StoreFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::WorkspaceNotFound => "E2001",
            Self::TeamNotFound => "E2002",
            Self::IssueNotFound => "E2003",
            Self::DuplicateWorkspace => "E2004",
            Self::DuplicateTeamKey => "E2005",
            Self::InvalidKey => "E2006",
            Self::InvalidEnumValue => "E2007",
            Self::BatchTooLarge => "E2008",
            Self::LabelNotFound => "E2009",
            Self::CommentNotFound => "E2010",
            Self::DuplicateLabel => "E2011",
            Self::TooManyLabels => "E2012",
            Self::EmptyText => "E2013",
            Self::SequenceConflict => "E3001",
            Self::SequenceIntegrity => "E3002",
            Self::StoreBusy => "E5001",
            Self::StoreFailure => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::WorkspaceNotFound => "Workspace not found",
            Self::TeamNotFound => "Team not found",
            Self::IssueNotFound => "Issue not found",
            Self::DuplicateWorkspace => "Workspace slug already taken",
            Self::DuplicateTeamKey => "Team key already taken",
            Self::InvalidKey => "Invalid team or issue key",
            Self::InvalidEnumValue => "Invalid status/priority value",
            Self::BatchTooLarge => "Too many issues in one batch",
            Self::LabelNotFound => "Label not found",
            Self::CommentNotFound => "Comment not found",
            Self::DuplicateLabel => "Label name already taken",
            Self::TooManyLabels => "Issue has too many labels",
            Self::EmptyText => "Text must not be empty",
            Self::SequenceConflict => "Issue sequence already initialized",
            Self::SequenceIntegrity => "Issue sequence row vanished",
            Self::StoreBusy => "Database busy",
            Self::StoreFailure => "Database error",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tly init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::WorkspaceNotFound => {
                Some("Create it with `tly workspace create` or pass --workspace.")
            }
            Self::TeamNotFound => Some("List teams with `tly team list`."),
            Self::IssueNotFound => None,
            Self::DuplicateWorkspace => Some("Pick a different workspace slug."),
            Self::DuplicateTeamKey => Some("Pick a key no other team in the workspace uses."),
            Self::InvalidKey => {
                Some("Team keys are 1-10 letters/digits starting with a letter, e.g. ENG.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented status/priority values."),
            Self::BatchTooLarge => Some("Split the import into smaller files."),
            Self::LabelNotFound => Some("List labels with `tly label list`."),
            Self::CommentNotFound => Some("List comments with `tly issue comments <KEY>`."),
            Self::DuplicateLabel => Some("Reuse the existing label or pick another name."),
            Self::TooManyLabels => Some("Remove a label with `tly issue unlabel` first."),
            Self::EmptyText => None,
            Self::SequenceConflict => Some("The team already has a counter; report a bug."),
            Self::SequenceIntegrity => Some("Check the database for manual edits; report a bug."),
            Self::StoreBusy => Some("Retry after the other `tly` process finishes."),
            Self::StoreFailure => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors returned by tally operations.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("workspace '{0}' not found")]
    WorkspaceNotFound(String),

    #[error("team '{key}' not found in workspace '{workspace}'")]
    TeamNotFound { workspace: String, key: String },

    #[error("issue '{key}' not found in workspace '{workspace}'")]
    IssueNotFound { workspace: String, key: String },

    #[error("workspace slug '{0}' is already taken")]
    DuplicateWorkspace(String),

    #[error("team key '{key}' is already used in workspace '{workspace}'")]
    DuplicateTeamKey { workspace: String, key: String },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("invalid {field} value '{raw}'")]
    InvalidEnumValue { field: &'static str, raw: String },

    #[error("cannot create {0} issues in one batch")]
    BatchTooLarge(usize),

    #[error("label '{name}' not found in workspace '{workspace}'")]
    LabelNotFound { workspace: String, name: String },

    #[error("comment '{comment_id}' not found on issue '{key}'")]
    CommentNotFound { key: String, comment_id: String },

    #[error("label '{name}' already exists in workspace '{workspace}'")]
    DuplicateLabel { workspace: String, name: String },

    #[error("issue '{key}' already has the maximum of {max} labels")]
    TooManyLabels { key: String, max: usize },

    #[error("{0} must not be empty")]
    EmptyText(&'static str),

    #[error("event payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl TallyError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::WorkspaceNotFound(_) => ErrorCode::WorkspaceNotFound,
            Self::TeamNotFound { .. } => ErrorCode::TeamNotFound,
            Self::IssueNotFound { .. } => ErrorCode::IssueNotFound,
            Self::DuplicateWorkspace(_) => ErrorCode::DuplicateWorkspace,
            Self::DuplicateTeamKey { .. } => ErrorCode::DuplicateTeamKey,
            Self::Key(_) => ErrorCode::InvalidKey,
            Self::Sequence(err) => err.code(),
            Self::InvalidEnumValue { .. } => ErrorCode::InvalidEnumValue,
            Self::BatchTooLarge(_) => ErrorCode::BatchTooLarge,
            Self::LabelNotFound { .. } => ErrorCode::LabelNotFound,
            Self::CommentNotFound { .. } => ErrorCode::CommentNotFound,
            Self::DuplicateLabel { .. } => ErrorCode::DuplicateLabel,
            Self::TooManyLabels { .. } => ErrorCode::TooManyLabels,
            Self::EmptyText(_) => ErrorCode::EmptyText,
            Self::Serialization(_) => ErrorCode::InternalUnexpected,
            Self::Sqlite(err) => {
                if is_busy(err) {
                    ErrorCode::StoreBusy
                } else {
                    ErrorCode::StoreFailure
                }
            }
        }
    }

    /// `E####` code string.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.code().code()
    }

    /// Remediation hint, falling back to the generic code message.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.code();
        code.hint().unwrap_or(code.message()).to_string()
    }
}

/// True when `err` is SQLite reporting lock contention.
#[must_use]
pub const fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked,
                ..
            },
            _
        )
    )
}

/// True when `err` is a primary key or unique constraint violation.
#[must_use]
pub const fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => {
            inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}
