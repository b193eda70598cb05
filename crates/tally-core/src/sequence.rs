//! Per-team issue number sequences.
//!
//! Each `(workspace, team)` pair owns one row in `sequence_counters`. Numbers
//! are handed out by a single `UPDATE … SET current_value = current_value + n
//! … RETURNING current_value` statement, so concurrent allocators for the same
//! team are serialised by SQLite's write lock and always receive disjoint
//! numbers. There is no in-process locking and no retry here: busy or I/O
//! errors propagate to the caller's transaction.
//!
//! The allocator borrows a [`Connection`], so it runs inside whatever
//! transaction the caller has open (a [`rusqlite::Transaction`] derefs to a
//! connection). If that transaction rolls back, the increment rolls back
//! with it and the numbers are issued again later.

use rusqlite::{Connection, OptionalExtension, params, types::Type};

use crate::error::{ErrorCode, is_busy, is_unique_violation};
use crate::model::{TeamId, WorkspaceId};

/// Allocation failures.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// `initialize` found an existing counter for the pair.
    #[error("sequence for team {team_id} in workspace {workspace_id} already exists")]
    Conflict {
        workspace_id: String,
        team_id: String,
    },

    /// The increment matched no row right after `ensure_exists`.
    #[error("sequence row for team {team_id} in {workspace_id} vanished during increment")]
    CounterVanished {
        workspace_id: String,
        team_id: String,
    },

    #[error("sequence store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl SequenceError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Conflict { .. } => ErrorCode::SequenceConflict,
            Self::CounterVanished { .. } => ErrorCode::SequenceIntegrity,
            Self::Store(err) => {
                if is_busy(err) {
                    ErrorCode::StoreBusy
                } else {
                    ErrorCode::StoreFailure
                }
            }
        }
    }
}

/// Hands out issue numbers for teams.
///
/// ```ignore
/// let tx = db::write_tx(&mut conn)?;
/// let number = SequenceAllocator::new(&tx).next(&workspace_id, &team_id)?;
/// // insert the issue using `number` ...
/// tx.commit()?;
/// ```
pub struct SequenceAllocator<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SequenceAllocator<'conn> {
    /// Create an allocator backed by the given connection or transaction.
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Create the counter at 0 if it does not exist yet. A concurrent insert
    /// of the same row is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Store`] on database failure.
    pub fn ensure_exists(
        &self,
        workspace_id: &WorkspaceId,
        team_id: &TeamId,
    ) -> Result<(), SequenceError> {
        let inserted = self.conn.execute(
            "INSERT INTO sequence_counters (workspace_id, team_id, current_value)
             VALUES (?1, ?2, 0)
             ON CONFLICT (workspace_id, team_id) DO NOTHING",
            params![workspace_id.as_str(), team_id.as_str()],
        )?;

        if inserted > 0 {
            tracing::debug!(
                workspace_id = %workspace_id,
                team_id = %team_id,
                "created sequence counter lazily"
            );
        }
        Ok(())
    }

    /// Create the counter at 0 for a team that was just created.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Conflict`] if the counter already exists, or
    /// [`SequenceError::Store`] on database failure.
    pub fn initialize(
        &self,
        workspace_id: &WorkspaceId,
        team_id: &TeamId,
    ) -> Result<(), SequenceError> {
        let result = self.conn.execute(
            "INSERT INTO sequence_counters (workspace_id, team_id, current_value)
             VALUES (?1, ?2, 0)",
            params![workspace_id.as_str(), team_id.as_str()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(SequenceError::Conflict {
                workspace_id: workspace_id.to_string(),
                team_id: team_id.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Allocate the next number for the team. Returns the post-increment
    /// value, so the first call on a fresh counter returns 1.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::CounterVanished`] if the counter row is missing
    /// after creation, or [`SequenceError::Store`] on database failure.
    pub fn next(&self, workspace_id: &WorkspaceId, team_id: &TeamId) -> Result<u64, SequenceError> {
        self.ensure_exists(workspace_id, team_id)?;
        let value = self.increment(workspace_id, team_id, 1)?;

        tracing::debug!(
            workspace_id = %workspace_id,
            team_id = %team_id,
            value,
            "allocated issue number"
        );
        Ok(value)
    }

    /// Allocate `count` consecutive numbers in one statement, returned in
    /// ascending order and ending at the new counter value. `count == 0`
    /// returns an empty list and leaves the counter untouched.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceAllocator::next`].
    pub fn next_batch(
        &self,
        workspace_id: &WorkspaceId,
        team_id: &TeamId,
        count: u32,
    ) -> Result<Vec<u64>, SequenceError> {
        self.ensure_exists(workspace_id, team_id)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let end = self.increment(workspace_id, team_id, count)?;
        let start = end + 1 - u64::from(count);

        tracing::debug!(
            workspace_id = %workspace_id,
            team_id = %team_id,
            count,
            start,
            end,
            "allocated issue number block"
        );
        Ok((start..=end).collect())
    }

    /// Read the counter without allocating. Diagnostic only: the value can
    /// be stale by the time it is returned and must not be used to predict
    /// the next number.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Store`] on database failure.
    pub fn peek(
        &self,
        workspace_id: &WorkspaceId,
        team_id: &TeamId,
    ) -> Result<Option<u64>, SequenceError> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT current_value FROM sequence_counters
                 WHERE workspace_id = ?1 AND team_id = ?2",
                params![workspace_id.as_str(), team_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        value.map(stored_value).transpose()
    }

    fn increment(
        &self,
        workspace_id: &WorkspaceId,
        team_id: &TeamId,
        delta: u32,
    ) -> Result<u64, SequenceError> {
        let updated: Option<i64> = self
            .conn
            .query_row(
                "UPDATE sequence_counters
                 SET current_value = current_value + ?3
                 WHERE workspace_id = ?1 AND team_id = ?2
                 RETURNING current_value",
                params![workspace_id.as_str(), team_id.as_str(), i64::from(delta)],
                |row| row.get(0),
            )
            .optional()?;

        let Some(value) = updated else {
            tracing::error!(
                workspace_id = %workspace_id,
                team_id = %team_id,
                delta,
                "sequence counter missing after ensure_exists"
            );
            return Err(SequenceError::CounterVanished {
                workspace_id: workspace_id.to_string(),
                team_id: team_id.to_string(),
            });
        };

        stored_value(value)
    }
}

fn stored_value(value: i64) -> Result<u64, SequenceError> {
    u64::try_from(value).map_err(|error| {
        SequenceError::Store(rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            Box::new(error),
        ))
    })
}
