//! Allocation from many connections at once. Each thread opens its own
//! connection to the same file, as separate `tly` processes would.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rusqlite::params;
use tally_core::db;
use tally_core::model::{Team, Workspace};
use tally_core::ops::create_workspace;
use tally_core::sequence::SequenceAllocator;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

fn setup(dir: &Path) -> (PathBuf, Workspace, Team) {
    let path = dir.join(".tally").join("tally.db");
    let mut conn = db::open_db(&path, BUSY_TIMEOUT).expect("open db");
    let (workspace, team) = create_workspace(&mut conn, "acme", "Engineering").expect("workspace");
    (path, workspace, team)
}

#[test]
fn fifty_threads_get_fifty_distinct_numbers() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (path, workspace, team) = setup(dir.path());
    let threads = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let path = path.clone();
            let workspace_id = workspace.id.clone();
            let team_id = team.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = db::open_db(&path, BUSY_TIMEOUT).expect("open db");
                barrier.wait();
                let tx = db::write_tx(&mut conn).expect("begin");
                let number = SequenceAllocator::new(&tx)
                    .next(&workspace_id, &team_id)
                    .expect("next");
                tx.commit().expect("commit");
                number
            })
        })
        .collect();

    let numbers: BTreeSet<u64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked"))
        .collect();

    assert_eq!(numbers, (1..=50).collect::<BTreeSet<u64>>());

    let conn = db::open_db(&path, BUSY_TIMEOUT).expect("reopen");
    let counter = SequenceAllocator::new(&conn)
        .peek(&workspace.id, &team.id)
        .expect("peek");
    assert_eq!(counter, Some(50));
}

#[test]
fn concurrent_batches_do_not_overlap() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (path, workspace, team) = setup(dir.path());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            let workspace_id = workspace.id.clone();
            let team_id = team.id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = db::open_db(&path, BUSY_TIMEOUT).expect("open db");
                barrier.wait();
                let tx = db::write_tx(&mut conn).expect("begin");
                let block = SequenceAllocator::new(&tx)
                    .next_batch(&workspace_id, &team_id, 5)
                    .expect("batch");
                tx.commit().expect("commit");
                block
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let block = handle.join().expect("thread panicked");
        assert_eq!(block.len(), 5);
        assert!(block.windows(2).all(|pair| pair[1] == pair[0] + 1));
        all.extend(block);
    }
    all.sort_unstable();
    assert_eq!(all, (1..=40).collect::<Vec<u64>>());
}

#[test]
fn concurrent_ensure_exists_creates_one_row() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(".tally").join("tally.db");
    {
        let conn = db::open_db(&path, BUSY_TIMEOUT).expect("open db");
        conn.execute(
            "INSERT INTO workspaces VALUES ('ws-1', 'acme', 'Acme', 1)",
            [],
        )
        .expect("workspace");
        conn.execute(
            "INSERT INTO teams VALUES ('tm-1', 'ws-1', 'ENG', 'Engineering', 1, 1)",
            [],
        )
        .expect("team without counter");
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = db::open_db(&path, BUSY_TIMEOUT).expect("open db");
                let workspace_id = tally_core::model::WorkspaceId::from_stored("ws-1");
                let team_id = tally_core::model::TeamId::from_stored("tm-1");
                barrier.wait();
                let tx = db::write_tx(&mut conn).expect("begin");
                SequenceAllocator::new(&tx)
                    .ensure_exists(&workspace_id, &team_id)
                    .expect("ensure");
                tx.commit().expect("commit");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    let conn = db::open_db(&path, BUSY_TIMEOUT).expect("reopen");
    let (rows, value): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(current_value) FROM sequence_counters WHERE team_id = ?1",
            params!["tm-1"],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query");
    assert_eq!((rows, value), (1, 0));
}
