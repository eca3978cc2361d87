//! Time-windowed score aggregation per group.
//!
//! # Responsibility
//! - Map a timestamp to the UTC calendar period it belongs to.
//! - Produce the counter deltas one placement contributes.
//! - Rank groups within a period.
//!
//! # Invariants
//! - Buckets are only incremented inside a placement transaction, so a
//!   bucket count equals the cells attributed to the group in that period.
//! - Rollover is implicit: a new period id starts with no row, read as zero.
//! - Rankings order by count descending, then group id ascending.

use crate::model::input::{GroupId, InvalidInput};
use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const ALL_TIME_PERIOD_ID: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Day,
    Week,
    Month,
    AllTime,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 4] = [Self::Day, Self::Week, Self::Month, Self::AllTime];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::AllTime => "all_time",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Some(Self::Day),
            "week" | "weekly" => Some(Self::Week),
            "month" | "monthly" => Some(Self::Month),
            "all_time" | "all" | "alltime" => Some(Self::AllTime),
            _ => None,
        }
    }
}

impl Display for PeriodKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar period identifier, e.g. `2026-10-16`, `2026-W42`, `2026-10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(String);

impl PeriodId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeriodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejects timestamps chrono cannot place on the calendar.
pub fn validate_timestamp(timestamp_ms: i64) -> Result<(), InvalidInput> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|_| ())
        .ok_or(InvalidInput::Timestamp(timestamp_ms))
}

/// Returns the UTC period containing `timestamp_ms`.
///
/// Timestamps outside chrono's range collapse onto the epoch; callers
/// validate with [`validate_timestamp`] first.
pub fn bucket_key(kind: PeriodKind, timestamp_ms: i64) -> PeriodId {
    let at = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default();
    match kind {
        PeriodKind::Day => PeriodId(at.format("%Y-%m-%d").to_string()),
        PeriodKind::Week => {
            let week = at.iso_week();
            PeriodId(format!("{}-W{:02}", week.year(), week.week()))
        }
        PeriodKind::Month => PeriodId(at.format("%Y-%m").to_string()),
        PeriodKind::AllTime => PeriodId(ALL_TIME_PERIOD_ID.to_string()),
    }
}

/// One pending bucket increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub kind: PeriodKind,
    pub period_id: PeriodId,
    pub group_id: GroupId,
    pub delta: u32,
}

/// Deltas for `cells` claimed by `group` at `timestamp_ms`, one per period
/// kind.
pub fn counter_deltas(group: &GroupId, cells: u32, timestamp_ms: i64) -> Vec<CounterDelta> {
    if cells == 0 {
        return Vec::new();
    }
    PeriodKind::ALL
        .iter()
        .map(|&kind| CounterDelta {
            kind,
            period_id: bucket_key(kind, timestamp_ms),
            group_id: group.clone(),
            delta: cells,
        })
        .collect()
}

/// Adds `delta` to one bucket, creating it at zero first if needed.
///
/// Only called from the placement commit path with a live transaction.
pub(crate) fn increment(
    conn: &Connection,
    kind: PeriodKind,
    period_id: &PeriodId,
    group: &GroupId,
    delta: u32,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO score_buckets (period_kind, period_id, group_id, count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (period_kind, period_id, group_id)
         DO UPDATE SET count = count + excluded.count;",
        params![kind.as_str(), period_id.as_str(), group.as_str(), delta],
    )?;
    Ok(())
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub group_id: GroupId,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub period_kind: PeriodKind,
    pub period_id: PeriodId,
    pub entries: Vec<LeaderboardEntry>,
}

/// Assigns ranks to rows already sorted by count desc, group asc.
pub(crate) fn rank_entries(rows: Vec<(GroupId, u64)>) -> Vec<LeaderboardEntry> {
    rows.into_iter()
        .zip(1u32..)
        .map(|((group_id, count), rank)| LeaderboardEntry {
            rank,
            group_id,
            count,
        })
        .collect()
}
