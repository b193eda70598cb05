//! E2E CLI tests covering:
//! - project setup (`tly init`, `tly workspace create`, `tly team create`)
//! - issue key allocation, bulk import and team re-keying
//! - change history and no-op updates
//! - labels and comments, including their history events
//! - structured JSON errors
//!
//! Each test runs `tly` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Build a Command targeting the `tly` binary, rooted in `dir`.
fn tly(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tly"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir.join(".user-config"));
    cmd.env("TALLY_ACTOR", "test-actor");
    cmd.env("TALLY_LOG", "error");
    cmd.env_remove("TALLY_WORKSPACE");
    cmd.env_remove("FORMAT");
    cmd
}

/// Run with `--json`, assert success, and parse stdout.
fn tly_json(dir: &Path, args: &[&str]) -> Value {
    let output = tly(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("tly should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// `tly init` plus workspace `acme` (default team ACM) plus team ENG.
fn setup() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    tly(dir.path()).arg("init").assert().success();
    tly_json(dir.path(), &["workspace", "create", "acme", "--name", "Acme Corp"]);
    tly_json(dir.path(), &["team", "create", "ENG", "--name", "Engineering"]);
    dir
}

fn create_issue(dir: &Path, team: &str, summary: &str) -> String {
    let json = tly_json(dir, &["issue", "create", "--team", team, "--summary", summary]);
    json["key"].as_str().expect("key field").to_string()
}

#[test]
fn init_creates_tally_directory() {
    let dir = TempDir::new().expect("temp dir");
    let json = tly_json(dir.path(), &["init"]);
    assert_eq!(json["schema_version"], 2);
    assert!(dir.path().join(".tally/config.toml").is_file());
    assert!(dir.path().join(".tally/tally.db").is_file());
}

#[test]
fn first_workspace_becomes_default_and_gets_a_team() {
    let dir = TempDir::new().expect("temp dir");
    tly(dir.path()).arg("init").assert().success();

    let json = tly_json(dir.path(), &["workspace", "create", "acme", "--name", "Acme Corp"]);
    assert_eq!(json["default_team"]["key"], "ACM");
    assert_eq!(json["selected"], true);

    let config = std::fs::read_to_string(dir.path().join(".tally/config.toml")).expect("config");
    assert!(config.contains("default = \"acme\""));

    let teams = tly_json(dir.path(), &["team", "list"]);
    assert_eq!(teams[0]["key"], "ACM");
}

#[test]
fn issue_keys_count_up_per_team() {
    let dir = setup();
    assert_eq!(create_issue(dir.path(), "ENG", "one"), "ENG-1");
    assert_eq!(create_issue(dir.path(), "eng", "two"), "ENG-2");
    assert_eq!(create_issue(dir.path(), "ACM", "other team"), "ACM-1");

    let list = tly_json(dir.path(), &["issue", "list", "--team", "ENG"]);
    let keys: Vec<&str> = list
        .as_array()
        .expect("array")
        .iter()
        .map(|issue| issue["key"].as_str().expect("key"))
        .collect();
    assert_eq!(keys, vec!["ENG-1", "ENG-2"]);
}

#[test]
fn import_allocates_a_contiguous_block() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "first");

    let file = dir.path().join("backlog.txt");
    std::fs::write(&file, "# imported\nLogin times out\n\nCrash on save\nSlow search\n")
        .expect("write import file");

    let json = tly_json(
        dir.path(),
        &["issue", "import", "--team", "ENG", file.to_str().expect("utf8 path")],
    );
    let keys: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .map(|issue| issue["key"].as_str().expect("key"))
        .collect();
    assert_eq!(keys, vec!["ENG-2", "ENG-3", "ENG-4"]);
    assert_eq!(json[0]["created_by"], "test-actor");
}

#[test]
fn rekey_rewrites_keys_and_keeps_numbering() {
    let dir = setup();
    for n in 1..=7 {
        create_issue(dir.path(), "ENG", &format!("issue {n}"));
    }

    let report = tly_json(dir.path(), &["team", "rekey", "ENG", "ENGR"]);
    assert_eq!(report["team"]["key"], "ENGR");
    assert_eq!(report["rewritten"], 7);

    let issue = tly_json(dir.path(), &["issue", "show", "ENGR-7"]);
    assert_eq!(issue["key_number"], 7);
    assert_eq!(create_issue(dir.path(), "ENGR", "after rekey"), "ENGR-8");

    tly(dir.path())
        .args(["issue", "show", "ENG-7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn history_skips_noop_updates() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");

    let first = tly_json(dir.path(), &["issue", "status", "ENG-1", "in_progress"]);
    assert_eq!(first["changed"], true);
    assert_eq!(first["event"]["change"]["from"], "backlog");
    assert_eq!(first["event"]["change"]["to"], "in_progress");

    let again = tly_json(dir.path(), &["issue", "status", "ENG-1", "in-progress"]);
    assert_eq!(again["changed"], false);

    tly_json(
        dir.path(),
        &["issue", "assign", "ENG-1", "bob", "--actor", "carol"],
    );

    let log = tly_json(dir.path(), &["issue", "log", "ENG-1"]);
    let kinds: Vec<&str> = log
        .as_array()
        .expect("array")
        .iter()
        .map(|event| event["kind"].as_str().expect("kind"))
        .collect();
    assert_eq!(kinds, vec!["issue_created", "status_changed", "assignee_changed"]);
    assert_eq!(log[2]["actor"], "carol");
}

#[test]
fn deleted_numbers_are_not_reused() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");
    create_issue(dir.path(), "ENG", "b");
    tly_json(dir.path(), &["issue", "delete", "ENG-2"]);

    assert_eq!(create_issue(dir.path(), "ENG", "c"), "ENG-3");
}

#[test]
fn errors_are_structured_in_json_mode() {
    let dir = setup();
    let output = tly(dir.path())
        .args(["issue", "status", "ENG-99", "done", "--json"])
        .output()
        .expect("tly should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("stderr is JSON");
    assert_eq!(json["error"]["error_code"], "E2003");
}

#[test]
fn duplicate_team_key_is_rejected() {
    let dir = setup();
    tly(dir.path())
        .args(["team", "create", "eng", "--name", "Again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already used"));
}

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().expect("temp dir");
    tly(dir.path())
        .args(["team", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tly init"));
}

#[test]
fn unknown_status_is_rejected() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");
    tly(dir.path())
        .args(["issue", "status", "ENG-1", "blocked"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid status"));
}

#[test]
fn labels_attach_once_and_show_in_history() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");

    let label = tly_json(dir.path(), &["label", "create", "bug"]);
    assert_eq!(label["name"], "bug");

    let added = tly_json(dir.path(), &["issue", "label", "ENG-1", "BUG"]);
    assert_eq!(added["changed"], true);
    assert_eq!(added["event"]["change"]["field"], "label_added");
    assert_eq!(added["label"]["name"], "bug");

    let again = tly_json(dir.path(), &["issue", "label", "ENG-1", "bug"]);
    assert_eq!(again["changed"], false);

    let labels = tly_json(dir.path(), &["issue", "labels", "ENG-1"]);
    assert_eq!(labels.as_array().map(Vec::len), Some(1));

    tly_json(dir.path(), &["issue", "unlabel", "ENG-1", "bug"]);
    let log = tly_json(dir.path(), &["issue", "log", "ENG-1"]);
    let kinds: Vec<&str> = log
        .as_array()
        .expect("array")
        .iter()
        .map(|event| event["kind"].as_str().expect("kind"))
        .collect();
    assert_eq!(kinds, vec!["issue_created", "label_added", "label_removed"]);
}

#[test]
fn unknown_label_is_a_structured_error() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");
    let output = tly(dir.path())
        .args(["issue", "label", "ENG-1", "nope", "--json"])
        .output()
        .expect("tly should not crash");
    assert!(!output.status.success());

    let json: Value = serde_json::from_slice(&output.stderr).expect("stderr is JSON");
    assert_eq!(json["error"]["error_code"], "E2009");
}

#[test]
fn comments_can_be_added_listed_and_deleted() {
    let dir = setup();
    create_issue(dir.path(), "ENG", "a");

    let added = tly_json(dir.path(), &["issue", "comment", "ENG-1", "Reproduced on 0.4.1"]);
    assert_eq!(added["comment"]["author"], "test-actor");
    let id = added["comment"]["id"].as_str().expect("comment id").to_string();
    tly_json(dir.path(), &["issue", "comment", "ENG-1", "Fixed by #12"]);

    let deleted = tly_json(dir.path(), &["issue", "uncomment", "ENG-1", id.as_str()]);
    assert_eq!(deleted["event"]["kind"], "comment_deleted");

    let comments = tly_json(dir.path(), &["issue", "comments", "ENG-1"]);
    assert_eq!(comments.as_array().map(Vec::len), Some(1));
    assert_eq!(comments[0]["body"], "Fixed by #12");

    tly(dir.path())
        .args(["issue", "uncomment", "ENG-1", "cm-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn workspace_name_starting_with_digit_gets_a_team() {
    let dir = TempDir::new().expect("temp dir");
    tly(dir.path()).arg("init").assert().success();

    let json = tly_json(dir.path(), &["workspace", "create", "three-m", "--name", "3M Company"]);
    assert_eq!(json["default_team"]["key"], "MCO");
    assert_eq!(create_issue(dir.path(), "MCO", "first"), "MCO-1");
}
