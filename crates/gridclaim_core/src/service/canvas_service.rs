//! Placement arbiter and canvas query facade.
//!
//! # Responsibility
//! - Validate placement requests before any state is touched.
//! - Run cooldown check, cell writes, counter updates and the actor
//!   cooldown advance as one SQLite transaction.
//! - Publish committed changes to the broadcast hub after commit.
//! - Serve region, leaderboard, stat, catch-up and snapshot reads.
//!
//! # Invariants
//! - A rejected or failed placement leaves cells, counters and cooldowns
//!   unchanged.
//! - Writers are serialized by the writer connection; commit order is the
//!   last-writer-wins order for every cell, and a cell's `updated_at`
//!   never decreases, so the visible write is also the newest one.
//! - After a fatal storage error no placement is accepted until
//!   `resume_writes`, while reads keep being served.

use crate::aggregation::{self, bucket_key, Leaderboard, PeriodId, PeriodKind};
use crate::broadcast::{BroadcastHub, Subscription};
use crate::config::{CanvasConfig, ConfigError, ReclaimPolicy};
use crate::cooldown::{CooldownGate, GateDecision};
use crate::db::{open_db, open_db_in_memory, open_db_reader, DbError};
use crate::grid::{footprint_of, BoundingBox, CellKey, Coordinate, FootprintSize};
use crate::model::cell::{CellChanged, CellState};
use crate::model::color::{Color, ColorStrategy};
use crate::model::input::{ActorId, GroupId, InvalidInput};
use crate::store::{
    self, apply_commit, next_commit_seq, CanvasRepository, CanvasSnapshot, CaptureCount,
    CaptureDelta, CommitBatch, SqliteCanvasRepository, StoreError, StoreResult,
};
use log::{debug, error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Raw placement input as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub actor_id: String,
    pub group_id: String,
    pub anchor: Coordinate,
    pub footprint_size: u8,
    pub color: ColorStrategy,
}

/// Why a well-formed placement was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The actor is still cooling down.
    CooldownActive,
    /// Every footprint cell already shows this group and color, and the
    /// reclaim policy skips such cells.
    NothingToClaim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementReceipt {
    pub seq: u64,
    pub color: Color,
    pub affected_cells: Vec<CellKey>,
    pub next_allowed_at: i64,
}

impl PlacementReceipt {
    pub fn affected_cell_count(&self) -> usize {
        self.affected_cells.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlacementOutcome {
    Committed(PlacementReceipt),
    Rejected {
        reason: RejectReason,
        retry_after_ms: i64,
        next_allowed_at: Option<i64>,
    },
}

impl PlacementOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Placement failures. Cooldown is not one of them: see
/// [`PlacementOutcome::Rejected`].
#[derive(Debug)]
pub enum PlaceError {
    InvalidInput(InvalidInput),
    /// The transaction did not commit; nothing was applied. Retryable.
    PersistenceFailure(StoreError),
    /// Storage failed fatally earlier; writes are refused until resumed.
    StorageHalted,
}

impl Display for PlaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::PersistenceFailure(err) => write!(f, "placement not persisted: {err}"),
            Self::StorageHalted => write!(f, "storage halted; placements are not accepted"),
        }
    }
}

impl Error for PlaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::PersistenceFailure(err) => Some(err),
            Self::StorageHalted => None,
        }
    }
}

impl From<InvalidInput> for PlaceError {
    fn from(value: InvalidInput) -> Self {
        Self::InvalidInput(value)
    }
}

/// Read-path failures.
#[derive(Debug)]
pub enum QueryError {
    InvalidInput(InvalidInput),
    Store(StoreError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<InvalidInput> for QueryError {
    fn from(value: InvalidInput) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Service construction failures.
#[derive(Debug)]
pub enum OpenError {
    Config(ConfigError),
    Db(DbError),
    Store(StoreError),
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid canvas config: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for OpenError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for OpenError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for OpenError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Region query result. `truncated` means more cells matched than the cap
/// allows and the caller should narrow the box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionResult {
    pub cells: Vec<CellState>,
    pub truncated: bool,
}

/// Current ownership for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    pub group_id: GroupId,
    pub owned_cells: u64,
    pub total_cells: u64,
}

/// Canvas service owning storage, cooldown gate and broadcast hub.
///
/// Shared by reference (`Arc<CanvasService>`) between request handlers.
pub struct CanvasService {
    config: CanvasConfig,
    gate: CooldownGate,
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    hub: BroadcastHub,
    halted: AtomicBool,
}

struct ValidatedPlacement {
    actor_id: ActorId,
    group_id: GroupId,
    size: FootprintSize,
    color: Color,
    footprint: Vec<CellKey>,
}

impl CanvasService {
    /// Opens a file-backed canvas with a WAL reader for queries.
    pub fn open(path: impl AsRef<Path>, config: CanvasConfig) -> Result<Self, OpenError> {
        config.validate()?;
        let path = path.as_ref();
        let writer = open_db(path)?;
        let reader = open_db_reader(path)?;
        Self::from_connections(writer, Some(reader), config)
    }

    /// Opens an in-memory canvas. Reads share the writer connection.
    pub fn open_in_memory(config: CanvasConfig) -> Result<Self, OpenError> {
        config.validate()?;
        let writer = open_db_in_memory()?;
        Self::from_connections(writer, None, config)
    }

    fn from_connections(
        writer: Connection,
        reader: Option<Connection>,
        config: CanvasConfig,
    ) -> Result<Self, OpenError> {
        let service = Self {
            gate: CooldownGate::new(config.base_cooldown_ms),
            hub: BroadcastHub::new(config.broadcast_buffer, config.recent_capacity),
            writer: Mutex::new(writer),
            reader: reader.map(Mutex::new),
            halted: AtomicBool::new(false),
            config,
        };
        service.reseed_recent()?;
        info!(
            "event=canvas_open module=service status=ok cell_size={} base_cooldown_ms={} reclaim_policy={:?}",
            service.config.cell_size, service.config.base_cooldown_ms, service.config.reclaim_policy
        );
        Ok(service)
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Validates and arbitrates one placement at `now_ms`.
    ///
    /// # Errors
    /// - `InvalidInput` before any state is touched.
    /// - `PersistenceFailure` when the transaction did not commit.
    /// - `StorageHalted` after an earlier fatal storage error.
    pub fn place(
        &self,
        request: &PlacementRequest,
        now_ms: i64,
    ) -> Result<PlacementOutcome, PlaceError> {
        self.place_at(request, Some(now_ms))
    }

    /// [`place`](Self::place) at the wall-clock time read once the writer
    /// lock is held, so timestamps never run against commit order.
    pub fn place_now(&self, request: &PlacementRequest) -> Result<PlacementOutcome, PlaceError> {
        self.place_at(request, None)
    }

    fn place_at(
        &self,
        request: &PlacementRequest,
        fixed_now: Option<i64>,
    ) -> Result<PlacementOutcome, PlaceError> {
        let started_at = Instant::now();
        let placement = self.validate(request)?;
        if let Some(now_ms) = fixed_now {
            aggregation::validate_timestamp(now_ms)?;
        }

        if self.is_halted() {
            warn!(
                "event=place module=service status=rejected reason=storage_halted actor={}",
                placement.actor_id
            );
            return Err(PlaceError::StorageHalted);
        }

        let mut conn = match self.lock_writer() {
            Ok(conn) => conn,
            Err(err) => return Err(self.persistence_failure(err, &placement, started_at)),
        };
        let now_ms = fixed_now.unwrap_or_else(crate::now_ms);
        let outcome = match self.arbitrate(&mut conn, &placement, now_ms) {
            Ok(outcome) => outcome,
            Err(err) => {
                drop(conn);
                return Err(self.persistence_failure(err, &placement, started_at));
            }
        };

        match outcome {
            Arbitration::Committed { events, receipt } => {
                // Published under the writer lock so the hub sees commit order.
                for event in events {
                    self.hub.publish(event);
                }
                drop(conn);
                info!(
                    "event=place module=service status=ok actor={} group={} cells={} seq={} duration_ms={}",
                    placement.actor_id,
                    placement.group_id,
                    receipt.affected_cells.len(),
                    receipt.seq,
                    started_at.elapsed().as_millis()
                );
                Ok(PlacementOutcome::Committed(receipt))
            }
            Arbitration::Rejected {
                reason,
                retry_after_ms,
                next_allowed_at,
            } => {
                drop(conn);
                debug!(
                    "event=place module=service status=rejected actor={} reason={:?} retry_after_ms={}",
                    placement.actor_id, reason, retry_after_ms
                );
                Ok(PlacementOutcome::Rejected {
                    reason,
                    retry_after_ms,
                    next_allowed_at,
                })
            }
        }
    }

    fn validate(&self, request: &PlacementRequest) -> Result<ValidatedPlacement, InvalidInput> {
        let actor_id = ActorId::parse(&request.actor_id)?;
        let group_id = GroupId::parse(&request.group_id)?;
        let size = FootprintSize::new(request.footprint_size, self.config.max_footprint)?;
        request.anchor.validate(self.config.cell_size)?;
        let color = request.color.resolve(request.anchor, &group_id)?;
        let footprint = footprint_of(request.anchor, self.config.cell_size, size);
        Ok(ValidatedPlacement {
            actor_id,
            group_id,
            size,
            color,
            footprint,
        })
    }

    fn arbitrate(
        &self,
        conn: &mut Connection,
        placement: &ValidatedPlacement,
        now_ms: i64,
    ) -> StoreResult<Arbitration> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (decision, actor_update) =
            self.gate
                .try_acquire(&tx, &placement.actor_id, placement.size, now_ms)?;
        let actor_update = match (decision, actor_update) {
            (GateDecision::Allowed { .. }, Some(update)) => update,
            (
                GateDecision::Denied {
                    retry_after_ms,
                    next_allowed_at,
                },
                _,
            ) => {
                return Ok(Arbitration::Rejected {
                    reason: RejectReason::CooldownActive,
                    retry_after_ms,
                    next_allowed_at: Some(next_allowed_at),
                });
            }
            (GateDecision::Allowed { .. }, None) => {
                return Err(StoreError::InvalidData(
                    "cooldown gate allowed without an actor update".to_string(),
                ));
            }
        };

        let previous: BTreeMap<CellKey, CellState> = SqliteCanvasRepository::new(&tx)
            .get_cells(&placement.footprint)?
            .into_iter()
            .map(|cell| (cell.key, cell))
            .collect();

        let targets: Vec<CellKey> = placement
            .footprint
            .iter()
            .copied()
            .filter(|key| match self.config.reclaim_policy {
                ReclaimPolicy::AlwaysCommit => true,
                ReclaimPolicy::SkipOwnedCells => previous.get(key).map_or(true, |cell| {
                    cell.group_id != placement.group_id || cell.color != placement.color
                }),
            })
            .collect();

        if targets.is_empty() {
            return Ok(Arbitration::Rejected {
                reason: RejectReason::NothingToClaim,
                retry_after_ms: 0,
                next_allowed_at: None,
            });
        }

        let seq = next_commit_seq(&tx)?;
        let cell_writes: Vec<CellState> = targets
            .iter()
            .map(|&key| CellState {
                key,
                group_id: placement.group_id.clone(),
                color: placement.color.clone(),
                // A cell's timestamp never moves backwards; the later commit
                // carries the newest time.
                updated_at: previous
                    .get(&key)
                    .map_or(now_ms, |cell| cell.updated_at.max(now_ms)),
                seq,
            })
            .collect();

        let mut captured: BTreeMap<GroupId, u32> = BTreeMap::new();
        for key in &targets {
            if let Some(cell) = previous.get(key) {
                if cell.group_id != placement.group_id {
                    *captured.entry(cell.group_id.clone()).or_default() += 1;
                }
            }
        }
        let capture_deltas = captured
            .into_iter()
            .map(|(victim, cells)| CaptureDelta {
                attacker: placement.group_id.clone(),
                victim,
                cells,
            })
            .collect();

        let written = u32::try_from(cell_writes.len()).unwrap_or(u32::MAX);
        let batch = CommitBatch {
            seq,
            counter_deltas: aggregation::counter_deltas(&placement.group_id, written, now_ms),
            capture_deltas,
            actor_update,
            cell_writes,
        };

        apply_commit(&tx, &batch)?;
        tx.commit()?;

        let events = batch
            .cell_writes
            .iter()
            .map(|cell| CellChanged {
                previous_group: previous.get(&cell.key).map(|prev| prev.group_id.clone()),
                ..CellChanged::from_state(cell)
            })
            .collect();

        Ok(Arbitration::Committed {
            events,
            receipt: PlacementReceipt {
                seq,
                color: placement.color.clone(),
                affected_cells: targets,
                next_allowed_at: batch.actor_update.next_allowed_at(),
            },
        })
    }

    fn persistence_failure(
        &self,
        err: StoreError,
        placement: &ValidatedPlacement,
        started_at: Instant,
    ) -> PlaceError {
        if err.is_fatal() {
            self.halted.store(true, Ordering::SeqCst);
            error!(
                "event=place module=service status=error error_code=storage_fatal actor={} duration_ms={} error={}",
                placement.actor_id,
                started_at.elapsed().as_millis(),
                err
            );
        } else {
            warn!(
                "event=place module=service status=error error_code=commit_failed actor={} duration_ms={} error={}",
                placement.actor_id,
                started_at.elapsed().as_millis(),
                err
            );
        }
        PlaceError::PersistenceFailure(err)
    }

    /// Whether writes are refused after a fatal storage error.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Accepts placements again after an operator fixed the storage.
    pub fn resume_writes(&self) {
        if self.halted.swap(false, Ordering::SeqCst) {
            info!("event=resume_writes module=service status=ok");
        }
    }

    /// Committed cells inside `bbox`, capped at the configured maximum.
    pub fn region(&self, bbox: &BoundingBox) -> Result<RegionResult, QueryError> {
        let cap = self.config.region_cap;
        let mut cells = self.with_reader(|conn| {
            SqliteCanvasRepository::new(conn).cells_in_box(bbox, cap.saturating_add(1))
        })?;
        let truncated = cells.len() > cap as usize;
        cells.truncate(cap as usize);
        Ok(RegionResult { cells, truncated })
    }

    /// Region query over the rectangle spanned by two coordinates.
    pub fn region_between(&self, a: Coordinate, b: Coordinate) -> Result<RegionResult, QueryError> {
        let bbox = BoundingBox::from_coordinates(a, b, self.config.cell_size)?;
        self.region(&bbox)
    }

    pub fn cell(&self, key: CellKey) -> Result<Option<CellState>, QueryError> {
        Ok(self.with_reader(|conn| SqliteCanvasRepository::new(conn).get_cell(key))?)
    }

    /// Ranking for the period of `kind` that contains `now_ms`.
    pub fn leaderboard(
        &self,
        kind: PeriodKind,
        now_ms: i64,
        limit: Option<u32>,
    ) -> Result<Leaderboard, QueryError> {
        aggregation::validate_timestamp(now_ms)?;
        self.leaderboard_for_period(kind, bucket_key(kind, now_ms), limit)
    }

    /// Ranking for an explicit, possibly historical, period.
    pub fn leaderboard_for_period(
        &self,
        kind: PeriodKind,
        period_id: PeriodId,
        limit: Option<u32>,
    ) -> Result<Leaderboard, QueryError> {
        let limit = self.config.normalize_leaderboard_limit(limit);
        let entries = self.with_reader(|conn| {
            SqliteCanvasRepository::new(conn).leaderboard(kind, &period_id, limit)
        })?;
        Ok(Leaderboard {
            period_kind: kind,
            period_id,
            entries,
        })
    }

    /// Count in one bucket; zero when the bucket was never started.
    pub fn bucket_count(
        &self,
        kind: PeriodKind,
        period_id: &PeriodId,
        group: &GroupId,
    ) -> Result<u64, QueryError> {
        Ok(self.with_reader(|conn| {
            SqliteCanvasRepository::new(conn).bucket_count(kind, period_id, group)
        })?)
    }

    pub fn group_stats(&self, group: &GroupId) -> Result<GroupStats, QueryError> {
        let (owned_cells, total_cells) = self.with_reader(|conn| {
            let repo = SqliteCanvasRepository::new(conn);
            Ok((repo.group_cell_count(group)?, repo.total_cells()?))
        })?;
        Ok(GroupStats {
            group_id: group.clone(),
            owned_cells,
            total_cells,
        })
    }

    /// Cells `attacker` has taken from each other group.
    pub fn capture_stats(&self, attacker: &GroupId) -> Result<Vec<CaptureCount>, QueryError> {
        Ok(self.with_reader(|conn| SqliteCanvasRepository::new(conn).capture_counts(attacker))?)
    }

    /// Epoch milliseconds after which `actor` may place, if it ever placed.
    pub fn next_allowed_at(&self, actor: &ActorId) -> Result<Option<i64>, QueryError> {
        Ok(self.with_reader(|conn| SqliteCanvasRepository::new(conn).next_allowed_at(actor))?)
    }

    /// Sequence number of the last committed placement; zero for a new canvas.
    pub fn commit_seq(&self) -> Result<u64, QueryError> {
        Ok(self.with_reader(|conn| SqliteCanvasRepository::new(conn).commit_seq())?)
    }

    /// Opens a live subscription carrying the catch-up burst.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Up to `limit` most recent committed changes, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CellChanged> {
        self.hub.recent(limit)
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Consistent image of the whole canvas.
    pub fn snapshot(&self, now_ms: i64) -> Result<CanvasSnapshot, QueryError> {
        Ok(self.with_reader(|conn| store::take_snapshot(conn, now_ms))?)
    }

    /// Replaces the whole canvas and resets the catch-up window.
    pub fn restore(&self, snapshot: &CanvasSnapshot) -> StoreResult<()> {
        {
            let mut conn = self.lock_writer()?;
            store::restore_snapshot(&mut conn, snapshot)?;
        }
        self.reseed_recent()
    }

    /// Writes a snapshot file atomically and returns what was written.
    pub fn export_snapshot(
        &self,
        path: impl AsRef<Path>,
        now_ms: i64,
    ) -> Result<CanvasSnapshot, QueryError> {
        let snapshot = self.snapshot(now_ms)?;
        store::write_snapshot_file(path, &snapshot)?;
        Ok(snapshot)
    }

    /// Restores from a snapshot file.
    pub fn import_snapshot(&self, path: impl AsRef<Path>) -> StoreResult<CanvasSnapshot> {
        let snapshot = store::read_snapshot_file(path)?;
        self.restore(&snapshot)?;
        Ok(snapshot)
    }

    fn reseed_recent(&self) -> StoreResult<()> {
        let capacity = u32::try_from(self.config.recent_capacity).unwrap_or(u32::MAX);
        let mut cells =
            self.with_reader(|conn| SqliteCanvasRepository::new(conn).recent_cells(capacity))?;
        cells.reverse();
        self.hub
            .seed(cells.iter().map(CellChanged::from_state).collect());
        Ok(())
    }

    fn lock_writer(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::ConnectionPoisoned)
    }

    fn with_reader<T>(&self, read: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let lock = self.reader.as_ref().unwrap_or(&self.writer);
        let conn = lock.lock().map_err(|_| StoreError::ConnectionPoisoned)?;
        read(&conn)
    }
}

enum Arbitration {
    Committed {
        events: Vec<CellChanged>,
        receipt: PlacementReceipt,
    },
    Rejected {
        reason: RejectReason,
        retry_after_ms: i64,
        next_allowed_at: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::{CanvasService, PlaceError, PlacementRequest};
    use crate::aggregation::PeriodKind;
    use crate::config::CanvasConfig;
    use crate::grid::{BoundingBox, CellKey, Coordinate};
    use crate::model::color::ColorStrategy;

    const T0: i64 = 1_792_000_000_000;

    fn request(actor: &str, x: f64) -> PlacementRequest {
        PlacementRequest {
            actor_id: actor.to_string(),
            group_id: "JP".to_string(),
            anchor: Coordinate::new(x, 0.0),
            footprint_size: 1,
            color: ColorStrategy::solid("#123456"),
        }
    }

    fn set_writer_query_only(service: &CanvasService, on: bool) {
        service
            .lock_writer()
            .unwrap()
            .pragma_update(None, "query_only", on)
            .unwrap();
    }

    #[test]
    fn fatal_storage_error_halts_writes_but_keeps_reads() {
        let dir = tempfile::tempdir().unwrap();
        let service = CanvasService::open(
            dir.path().join("canvas.db"),
            CanvasConfig {
                cell_size: 1.0,
                ..CanvasConfig::default()
            },
        )
        .unwrap();
        assert!(service.place(&request("alice", 0.0), T0).unwrap().is_committed());

        // Writes on the writer connection now fail with SQLITE_READONLY.
        set_writer_query_only(&service, true);

        let err = service.place(&request("bob", 1.0), T0).unwrap_err();
        assert!(matches!(err, PlaceError::PersistenceFailure(ref e) if e.is_fatal()), "{err}");
        assert!(service.is_halted());

        let err = service.place(&request("carol", 2.0), T0).unwrap_err();
        assert!(matches!(err, PlaceError::StorageHalted), "{err}");

        let region = service
            .region(&BoundingBox::from_corners(CellKey::new(0, 0), CellKey::new(5, 0)))
            .unwrap();
        assert_eq!(region.cells.len(), 1);
        let board = service.leaderboard(PeriodKind::AllTime, T0, None).unwrap();
        assert_eq!(board.entries[0].count, 1);

        set_writer_query_only(&service, false);
        service.resume_writes();
        assert!(!service.is_halted());
        assert!(service.place(&request("bob", 1.0), T0).unwrap().is_committed());
        assert_eq!(service.commit_seq().unwrap(), 2);
    }
}
