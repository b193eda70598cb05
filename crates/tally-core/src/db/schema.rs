//! Canonical SQLite schema for tally.
//!
//! - `workspaces` / `teams` are the tenant hierarchy; team keys are unique
//!   per workspace
//! - `sequence_counters` holds exactly one monotonic counter per team
//! - `issues` carry the derived `key` string plus the allocated `key_number`
//! - `issue_events` is the append-only change log for issues
//! - `tally_meta` mirrors the applied schema version
//! - `labels` / `issue_labels` (v2): workspace labels and their attachments
//! - `issue_comments` (v2): soft-deletable comments on issues

/// Migration v1: tenant tables, sequences, issues, events, metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS workspaces (
    workspace_id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE CHECK (length(trim(slug)) > 0),
    display_name TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    team_id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    key TEXT NOT NULL CHECK (length(key) > 0 AND instr(key, '-') = 0),
    name TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sequence_counters (
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    team_id TEXT NOT NULL REFERENCES teams(team_id),
    current_value INTEGER NOT NULL DEFAULT 0 CHECK (current_value >= 0),
    PRIMARY KEY (workspace_id, team_id)
);

CREATE TABLE IF NOT EXISTS issues (
    issue_id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    team_id TEXT NOT NULL REFERENCES teams(team_id),
    key TEXT NOT NULL,
    key_number INTEGER NOT NULL CHECK (key_number > 0),
    summary TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'backlog'
        CHECK (status IN ('backlog', 'to_do', 'in_progress', 'done')),
    priority TEXT NOT NULL DEFAULT 'none'
        CHECK (priority IN ('none', 'low', 'medium', 'high', 'urgent')),
    assignee TEXT,
    created_by TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    deleted_at_us INTEGER
);

CREATE TABLE IF NOT EXISTS issue_events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id),
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    actor TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload_json TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tally_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO tally_meta (id, schema_version) VALUES (1, 0);

CREATE UNIQUE INDEX IF NOT EXISTS idx_teams_workspace_key
    ON teams(workspace_id, key);

CREATE UNIQUE INDEX IF NOT EXISTS idx_issues_team_number
    ON issues(team_id, key_number);

CREATE UNIQUE INDEX IF NOT EXISTS idx_issues_workspace_key
    ON issues(workspace_id, key);

CREATE INDEX IF NOT EXISTS idx_issue_events_issue
    ON issue_events(issue_id, event_id);
";

/// Migration v2: labels, label attachments and comments.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS labels (
    label_id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    color_key TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issue_labels (
    issue_id TEXT NOT NULL REFERENCES issues(issue_id),
    label_id TEXT NOT NULL REFERENCES labels(label_id),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (issue_id, label_id)
);

CREATE TABLE IF NOT EXISTS issue_comments (
    comment_id TEXT PRIMARY KEY,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id),
    workspace_id TEXT NOT NULL REFERENCES workspaces(workspace_id),
    author TEXT NOT NULL,
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    created_at_us INTEGER NOT NULL,
    deleted_at_us INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_labels_workspace_name
    ON labels(workspace_id, name COLLATE NOCASE);

CREATE INDEX IF NOT EXISTS idx_issue_labels_label
    ON issue_labels(label_id);

CREATE INDEX IF NOT EXISTS idx_issue_comments_issue
    ON issue_comments(issue_id, created_at_us);
";

/// Indexes the latest schema must contain.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_teams_workspace_key",
    "idx_issues_team_number",
    "idx_issues_workspace_key",
    "idx_issue_events_issue",
    "idx_labels_workspace_name",
    "idx_issue_labels_label",
    "idx_issue_comments_issue",
];
