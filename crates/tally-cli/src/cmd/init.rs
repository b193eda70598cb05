use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;
use tally_core::config::{ProjectConfig, TALLY_DIR, save_project_config};
use tally_core::db::{self, migrations};

use super::db_path;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the default config even if `.tally/` already exists. The
    /// database is kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "tally.db\ntally.db-wal\ntally.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    directory: String,
    database: String,
    schema_version: u32,
}

/// Execute `tly init`. Creates:
///
/// ```text
/// .tally/
///   config.toml   (default project config)
///   tally.db      (schema migrated to the latest version)
///   .gitignore    (database files)
/// ```
///
/// # Errors
///
/// Returns an error if `.tally/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let tally_dir = project_root.join(TALLY_DIR);
    if tally_dir.exists() && !args.force {
        anyhow::bail!(".tally/ already exists. Use `tly init --force` to reinitialize.");
    }

    save_project_config(project_root, &ProjectConfig::default())?;

    let gitignore_path = tally_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    let path = db_path(project_root);
    let conn = db::open_db(&path, db::DEFAULT_BUSY_TIMEOUT)?;
    let schema_version = migrations::current_schema_version(&conn)?;

    tracing::info!(path = %path.display(), schema_version, "initialized project");

    let report = InitReport {
        directory: tally_dir.display().to_string(),
        database: path.display().to_string(),
        schema_version,
    };
    render(output, &report, |r, w| {
        writeln!(w, "✓ Initialized {}", r.directory)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  Create a workspace (its first team is derived from the name):")?;
        writeln!(w, "    tly workspace create acme --name \"Acme Engineering\"")?;
        writeln!(w)?;
        writeln!(w, "  Set your identity for change history:")?;
        writeln!(w, "    export TALLY_ACTOR=your-name")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_init_creates_structure() {
        let root = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).expect("init");

        let dir = root.path().join(TALLY_DIR);
        assert!(dir.join("config.toml").is_file());
        assert!(dir.join("tally.db").is_file());
        assert!(dir.join(".gitignore").is_file());
    }

    #[test]
    fn reinit_requires_force() {
        let root = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).expect("first");
        assert!(run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).is_err());
        run_init(&InitArgs { force: true }, OutputMode::Json, root.path()).expect("forced");
    }
}
