//! Whole-canvas snapshots for backup and restart recovery.
//!
//! # Responsibility
//! - Capture cells, score buckets, actor cooldowns and capture stats from
//!   one consistent read.
//! - Replace the whole canvas from a snapshot in one transaction.
//! - Move snapshots to and from JSON files without ever leaving a torn file.
//!
//! # Invariants
//! - `restore(take())` reproduces identical cell, bucket and actor maps.
//! - Snapshot files are written to a sibling temp file, synced, then
//!   atomically renamed over the target.
//! - Collections are sorted so equal canvases yield equal snapshots.

use super::canvas_repo::{parse_cell_row, parse_count, parse_group};
use super::{seq_to_db, StoreError, StoreResult};
use crate::aggregation::{PeriodId, PeriodKind};
use crate::model::cell::CellState;
use crate::model::input::{ActorId, GroupId};
use log::info;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub period_kind: PeriodKind,
    pub period_id: PeriodId,
    pub group_id: GroupId,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCooldown {
    pub actor_id: ActorId,
    pub next_allowed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub attacker_group: GroupId,
    pub victim_group: GroupId,
    pub count: u64,
}

/// Serializable image of the whole canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub format_version: u32,
    /// Correlates log lines about one export/restore.
    pub snapshot_id: Uuid,
    /// Epoch milliseconds when the snapshot was taken.
    pub taken_at: i64,
    pub commit_seq: u64,
    pub cells: Vec<CellState>,
    pub buckets: Vec<ScoreBucket>,
    pub actors: Vec<ActorCooldown>,
    #[serde(default)]
    pub captures: Vec<CaptureRecord>,
}

/// Reads the full canvas inside one read transaction.
pub fn take_snapshot(conn: &Connection, taken_at: i64) -> StoreResult<CanvasSnapshot> {
    let tx = conn.unchecked_transaction()?;

    let commit_seq: i64 = tx.query_row(
        "SELECT value FROM canvas_meta WHERE key = 'commit_seq';",
        [],
        |row| row.get(0),
    )?;

    let mut cells = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT cell_x, cell_y, group_id, color, updated_at, seq
             FROM cells
             ORDER BY cell_x ASC, cell_y ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            cells.push(parse_cell_row(row)?);
        }
    }

    let mut buckets = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT period_kind, period_id, group_id, count
             FROM score_buckets
             ORDER BY period_kind ASC, period_id ASC, group_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kind_text: String = row.get("period_kind")?;
            let period_kind = PeriodKind::parse(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid period kind `{kind_text}` in score_buckets.period_kind"
                ))
            })?;
            buckets.push(ScoreBucket {
                period_kind,
                period_id: PeriodId::new(row.get::<_, String>("period_id")?),
                group_id: parse_group(row.get("group_id")?)?,
                count: parse_count(row.get("count")?, "score_buckets.count")?,
            });
        }
    }

    let mut actors = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT actor_id, next_allowed_at FROM actors ORDER BY actor_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let actor_text: String = row.get("actor_id")?;
            let actor_id = ActorId::parse(&actor_text).map_err(|_| {
                StoreError::InvalidData(format!("invalid actor id `{actor_text}` in actors"))
            })?;
            actors.push(ActorCooldown {
                actor_id,
                next_allowed_at: row.get("next_allowed_at")?,
            });
        }
    }

    let mut captures = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT attacker_group, victim_group, count
             FROM capture_stats
             ORDER BY attacker_group ASC, victim_group ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            captures.push(CaptureRecord {
                attacker_group: parse_group(row.get("attacker_group")?)?,
                victim_group: parse_group(row.get("victim_group")?)?,
                count: parse_count(row.get("count")?, "capture_stats.count")?,
            });
        }
    }

    tx.finish()?;

    Ok(CanvasSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        snapshot_id: Uuid::new_v4(),
        taken_at,
        commit_seq: parse_count(commit_seq, "canvas_meta.commit_seq")?,
        cells,
        buckets,
        actors,
        captures,
    })
}

/// Replaces the entire canvas with `snapshot`. All or nothing.
pub fn restore_snapshot(conn: &mut Connection, snapshot: &CanvasSnapshot) -> StoreResult<()> {
    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StoreError::UnsupportedSnapshotVersion {
            found: snapshot.format_version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(
        "DELETE FROM cells;
         DELETE FROM score_buckets;
         DELETE FROM actors;
         DELETE FROM capture_stats;",
    )?;

    let mut max_seq = snapshot.commit_seq;
    {
        let mut insert_cell = tx.prepare(
            "INSERT INTO cells (cell_x, cell_y, group_id, color, updated_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        )?;
        for cell in &snapshot.cells {
            insert_cell.execute(params![
                cell.key.x,
                cell.key.y,
                cell.group_id.as_str(),
                cell.color.as_str(),
                cell.updated_at,
                seq_to_db(cell.seq)?,
            ])?;
            max_seq = max_seq.max(cell.seq);
        }

        let mut insert_bucket = tx.prepare(
            "INSERT INTO score_buckets (period_kind, period_id, group_id, count)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for bucket in &snapshot.buckets {
            insert_bucket.execute(params![
                bucket.period_kind.as_str(),
                bucket.period_id.as_str(),
                bucket.group_id.as_str(),
                count_to_db(bucket.count)?,
            ])?;
        }

        let mut insert_actor = tx.prepare(
            "INSERT INTO actors (actor_id, next_allowed_at) VALUES (?1, ?2);",
        )?;
        for actor in &snapshot.actors {
            insert_actor.execute(params![actor.actor_id.as_str(), actor.next_allowed_at])?;
        }

        let mut insert_capture = tx.prepare(
            "INSERT INTO capture_stats (attacker_group, victim_group, count)
             VALUES (?1, ?2, ?3);",
        )?;
        for capture in &snapshot.captures {
            insert_capture.execute(params![
                capture.attacker_group.as_str(),
                capture.victim_group.as_str(),
                count_to_db(capture.count)?,
            ])?;
        }
    }

    tx.execute(
        "UPDATE canvas_meta SET value = ?1 WHERE key = 'commit_seq';",
        [seq_to_db(max_seq)?],
    )?;
    tx.commit()?;

    info!(
        "event=snapshot_restore module=store status=ok snapshot_id={} cells={} buckets={} actors={}",
        snapshot.snapshot_id,
        snapshot.cells.len(),
        snapshot.buckets.len(),
        snapshot.actors.len()
    );
    Ok(())
}

/// Writes `snapshot` as JSON to `path`, replacing any previous file
/// atomically.
pub fn write_snapshot_file(path: impl AsRef<Path>, snapshot: &CanvasSnapshot) -> StoreResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| StoreError::SnapshotIo(err.error))?;

    info!(
        "event=snapshot_write module=store status=ok snapshot_id={} cells={} path={}",
        snapshot.snapshot_id,
        snapshot.cells.len(),
        path.display()
    );
    Ok(())
}

/// Reads a snapshot previously written by [`write_snapshot_file`].
pub fn read_snapshot_file(path: impl AsRef<Path>) -> StoreResult<CanvasSnapshot> {
    let file = File::open(path.as_ref())?;
    let snapshot: CanvasSnapshot = serde_json::from_reader(BufReader::new(file))?;
    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StoreError::UnsupportedSnapshotVersion {
            found: snapshot.format_version,
            supported: SNAPSHOT_FORMAT_VERSION,
        });
    }
    Ok(snapshot)
}

fn count_to_db(count: u64) -> StoreResult<i64> {
    i64::try_from(count).map_err(|_| StoreError::InvalidData(format!("count `{count}` overflows")))
}
