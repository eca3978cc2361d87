//! Read-side canvas repository over SQLite.
//!
//! # Invariants
//! - Region results are ordered by `(x, y)` and never exceed the caller's
//!   limit.
//! - Leaderboard rows are ordered by count descending, then group id.

use super::{StoreError, StoreResult};
use crate::aggregation::{rank_entries, LeaderboardEntry, PeriodId, PeriodKind};
use crate::grid::{BoundingBox, CellKey};
use crate::model::cell::CellState;
use crate::model::color::Color;
use crate::model::input::{ActorId, GroupId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const CELL_SELECT_SQL: &str = "SELECT
    cell_x,
    cell_y,
    group_id,
    color,
    updated_at,
    seq
FROM cells";

/// Cells one group has taken from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureCount {
    pub victim_group: GroupId,
    pub count: u64,
}

/// Query contract for committed canvas state.
pub trait CanvasRepository {
    fn get_cell(&self, key: CellKey) -> StoreResult<Option<CellState>>;
    fn get_cells(&self, keys: &[CellKey]) -> StoreResult<Vec<CellState>>;
    fn cells_in_box(&self, bbox: &BoundingBox, limit: u32) -> StoreResult<Vec<CellState>>;
    fn recent_cells(&self, limit: u32) -> StoreResult<Vec<CellState>>;
    fn bucket_count(&self, kind: PeriodKind, period_id: &PeriodId, group: &GroupId)
        -> StoreResult<u64>;
    fn leaderboard(
        &self,
        kind: PeriodKind,
        period_id: &PeriodId,
        limit: u32,
    ) -> StoreResult<Vec<LeaderboardEntry>>;
    fn group_cell_count(&self, group: &GroupId) -> StoreResult<u64>;
    fn total_cells(&self) -> StoreResult<u64>;
    fn capture_counts(&self, attacker: &GroupId) -> StoreResult<Vec<CaptureCount>>;
    fn next_allowed_at(&self, actor: &ActorId) -> StoreResult<Option<i64>>;
    fn commit_seq(&self) -> StoreResult<u64>;
}

/// SQLite-backed canvas repository. Works on plain connections and on
/// transactions alike.
pub struct SqliteCanvasRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCanvasRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CanvasRepository for SqliteCanvasRepository<'_> {
    fn get_cell(&self, key: CellKey) -> StoreResult<Option<CellState>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CELL_SELECT_SQL} WHERE cell_x = ?1 AND cell_y = ?2;"
        ))?;
        let mut rows = stmt.query(params![key.x, key.y])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cell_row(row)?));
        }
        Ok(None)
    }

    fn get_cells(&self, keys: &[CellKey]) -> StoreResult<Vec<CellState>> {
        let mut cells = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(cell) = self.get_cell(*key)? {
                cells.push(cell);
            }
        }
        Ok(cells)
    }

    fn cells_in_box(&self, bbox: &BoundingBox, limit: u32) -> StoreResult<Vec<CellState>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CELL_SELECT_SQL}
             WHERE cell_x BETWEEN ?1 AND ?2
               AND cell_y BETWEEN ?3 AND ?4
             ORDER BY cell_x ASC, cell_y ASC
             LIMIT ?5;"
        ))?;
        let mut rows = stmt.query(params![
            bbox.min.x,
            bbox.max.x,
            bbox.min.y,
            bbox.max.y,
            i64::from(limit)
        ])?;
        let mut cells = Vec::new();
        while let Some(row) = rows.next()? {
            cells.push(parse_cell_row(row)?);
        }
        Ok(cells)
    }

    fn recent_cells(&self, limit: u32) -> StoreResult<Vec<CellState>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CELL_SELECT_SQL}
             ORDER BY seq DESC, cell_x ASC, cell_y ASC
             LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut cells = Vec::new();
        while let Some(row) = rows.next()? {
            cells.push(parse_cell_row(row)?);
        }
        Ok(cells)
    }

    fn bucket_count(
        &self,
        kind: PeriodKind,
        period_id: &PeriodId,
        group: &GroupId,
    ) -> StoreResult<u64> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT count FROM score_buckets
                 WHERE period_kind = ?1 AND period_id = ?2 AND group_id = ?3;",
                params![kind.as_str(), period_id.as_str(), group.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        count.map_or(Ok(0), |value| parse_count(value, "score_buckets.count"))
    }

    fn leaderboard(
        &self,
        kind: PeriodKind,
        period_id: &PeriodId,
        limit: u32,
    ) -> StoreResult<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT group_id, count
             FROM score_buckets
             WHERE period_kind = ?1 AND period_id = ?2
             ORDER BY count DESC, group_id ASC
             LIMIT ?3;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), period_id.as_str(), i64::from(limit)])?;
        let mut ranked = Vec::new();
        while let Some(row) = rows.next()? {
            let group = parse_group(row.get("group_id")?)?;
            let count = parse_count(row.get("count")?, "score_buckets.count")?;
            ranked.push((group, count));
        }
        Ok(rank_entries(ranked))
    }

    fn group_cell_count(&self, group: &GroupId) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cells WHERE group_id = ?1;",
            [group.as_str()],
            |row| row.get(0),
        )?;
        parse_count(count, "cells")
    }

    fn total_cells(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cells;", [], |row| row.get(0))?;
        parse_count(count, "cells")
    }

    fn capture_counts(&self, attacker: &GroupId) -> StoreResult<Vec<CaptureCount>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT victim_group, count
             FROM capture_stats
             WHERE attacker_group = ?1
             ORDER BY count DESC, victim_group ASC;",
        )?;
        let mut rows = stmt.query([attacker.as_str()])?;
        let mut captures = Vec::new();
        while let Some(row) = rows.next()? {
            captures.push(CaptureCount {
                victim_group: parse_group(row.get("victim_group")?)?,
                count: parse_count(row.get("count")?, "capture_stats.count")?,
            });
        }
        Ok(captures)
    }

    fn next_allowed_at(&self, actor: &ActorId) -> StoreResult<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT next_allowed_at FROM actors WHERE actor_id = ?1;",
                [actor.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn commit_seq(&self) -> StoreResult<u64> {
        let value: i64 = self.conn.query_row(
            "SELECT value FROM canvas_meta WHERE key = 'commit_seq';",
            [],
            |row| row.get(0),
        )?;
        parse_count(value, "canvas_meta.commit_seq")
    }
}

pub(super) fn parse_cell_row(row: &Row<'_>) -> StoreResult<CellState> {
    let color_text: String = row.get("color")?;
    let color = Color::parse(&color_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid color `{color_text}` in cells.color"))
    })?;
    let seq: i64 = row.get("seq")?;

    Ok(CellState {
        key: CellKey::new(row.get("cell_x")?, row.get("cell_y")?),
        group_id: parse_group(row.get("group_id")?)?,
        color,
        updated_at: row.get("updated_at")?,
        seq: parse_count(seq, "cells.seq")?,
    })
}

pub(super) fn parse_group(value: String) -> StoreResult<GroupId> {
    GroupId::parse(&value)
        .map_err(|_| StoreError::InvalidData(format!("invalid group id `{value}`")))
}

pub(super) fn parse_count(value: i64, column: &str) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative value `{value}` in {column}")))
}
