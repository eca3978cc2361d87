//! Canvas persistence: cells, score buckets, cooldowns and capture stats.
//!
//! # Responsibility
//! - Apply one placement's writes as a single SQLite transaction.
//! - Serve region, leaderboard and stat reads.
//! - Export and restore whole-canvas snapshots.
//!
//! # Invariants
//! - Placements are write-through: `apply_commit` runs inside the caller's
//!   transaction and nothing is visible until that transaction commits.
//! - Commit order is total; each committed placement takes the next
//!   `commit_seq` and cell rows carry the seq of their last write.
//! - Read paths reject invalid persisted values instead of masking them.

mod canvas_repo;
pub mod snapshot;

use crate::aggregation::{self, CounterDelta};
use crate::cooldown::ActorUpdate;
use crate::db::DbError;
use crate::model::cell::CellState;
use crate::model::input::GroupId;
use rusqlite::{params, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use canvas_repo::{CanvasRepository, CaptureCount, SqliteCanvasRepository};
pub use snapshot::{
    read_snapshot_file, restore_snapshot, take_snapshot, write_snapshot_file, ActorCooldown,
    CanvasSnapshot, CaptureRecord, ScoreBucket, SNAPSHOT_FORMAT_VERSION,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    InvalidData(String),
    SnapshotIo(std::io::Error),
    SnapshotFormat(serde_json::Error),
    UnsupportedSnapshotVersion { found: u32, supported: u32 },
    /// A thread panicked while holding a connection.
    ConnectionPoisoned,
}

impl StoreError {
    /// Whether the storage can no longer accept writes.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Db(err) => err.is_fatal(),
            Self::ConnectionPoisoned => true,
            Self::InvalidData(_)
            | Self::SnapshotIo(_)
            | Self::SnapshotFormat(_)
            | Self::UnsupportedSnapshotVersion { .. } => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted canvas data: {message}"),
            Self::SnapshotIo(err) => write!(f, "snapshot i/o failed: {err}"),
            Self::SnapshotFormat(err) => write!(f, "snapshot encoding failed: {err}"),
            Self::UnsupportedSnapshotVersion { found, supported } => write!(
                f,
                "snapshot format version {found} is not supported (expected {supported})"
            ),
            Self::ConnectionPoisoned => write!(f, "storage connection poisoned by a panic"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::SnapshotIo(err) => Some(err),
            Self::SnapshotFormat(err) => Some(err),
            Self::InvalidData(_)
            | Self::UnsupportedSnapshotVersion { .. }
            | Self::ConnectionPoisoned => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::SnapshotIo(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::SnapshotFormat(value)
    }
}

/// One takeover of a cell owned by another group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDelta {
    pub attacker: GroupId,
    pub victim: GroupId,
    pub cells: u32,
}

/// Everything one accepted placement writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    pub seq: u64,
    pub cell_writes: Vec<CellState>,
    pub counter_deltas: Vec<CounterDelta>,
    pub capture_deltas: Vec<CaptureDelta>,
    pub actor_update: ActorUpdate,
}

/// Reserves the next commit sequence number inside `tx`.
pub fn next_commit_seq(tx: &Transaction<'_>) -> StoreResult<u64> {
    tx.execute(
        "UPDATE canvas_meta SET value = value + 1 WHERE key = 'commit_seq';",
        [],
    )?;
    let value: i64 = tx.query_row(
        "SELECT value FROM canvas_meta WHERE key = 'commit_seq';",
        [],
        |row| row.get(0),
    )?;
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative commit_seq `{value}`")))
}

/// Writes cells, counters, captures and the actor cooldown inside `tx`.
///
/// Cells are overwritten unconditionally: the transaction that commits last
/// owns the cell.
pub fn apply_commit(tx: &Transaction<'_>, batch: &CommitBatch) -> StoreResult<()> {
    {
        let mut upsert_cell = tx.prepare_cached(
            "INSERT INTO cells (cell_x, cell_y, group_id, color, updated_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (cell_x, cell_y) DO UPDATE SET
                group_id = excluded.group_id,
                color = excluded.color,
                updated_at = excluded.updated_at,
                seq = excluded.seq;",
        )?;
        for cell in &batch.cell_writes {
            upsert_cell.execute(params![
                cell.key.x,
                cell.key.y,
                cell.group_id.as_str(),
                cell.color.as_str(),
                cell.updated_at,
                seq_to_db(cell.seq)?,
            ])?;
        }
    }

    for delta in &batch.counter_deltas {
        aggregation::increment(
            tx,
            delta.kind,
            &delta.period_id,
            &delta.group_id,
            delta.delta,
        )?;
    }

    for capture in &batch.capture_deltas {
        tx.execute(
            "INSERT INTO capture_stats (attacker_group, victim_group, count)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (attacker_group, victim_group)
             DO UPDATE SET count = count + excluded.count;",
            params![
                capture.attacker.as_str(),
                capture.victim.as_str(),
                capture.cells
            ],
        )?;
    }

    tx.execute(
        "INSERT INTO actors (actor_id, next_allowed_at)
         VALUES (?1, ?2)
         ON CONFLICT (actor_id) DO UPDATE SET next_allowed_at = excluded.next_allowed_at;",
        params![
            batch.actor_update.actor_id.as_str(),
            batch.actor_update.next_allowed_at
        ],
    )?;

    Ok(())
}

pub(crate) fn seq_to_db(seq: u64) -> StoreResult<i64> {
    i64::try_from(seq).map_err(|_| StoreError::InvalidData(format!("seq `{seq}` overflows")))
}
