//! Per-actor cooldown gate.
//!
//! # Responsibility
//! - Decide whether an actor may place now.
//! - Compute the next-allowed instant from the footprint claimed.
//!
//! # Invariants
//! - `cooldown(s) = base * s * s`: a 2x2 claim costs 4x, a 3x3 claim 9x.
//! - An actor is allowed exactly when `now >= next_allowed_at`.
//! - The gate is the only producer of `ActorUpdate`, and it is evaluated
//!   inside the placement transaction so two requests from one actor cannot
//!   both observe "allowed".

use crate::grid::FootprintSize;
use crate::model::input::ActorId;
use crate::store::{CanvasRepository, SqliteCanvasRepository, StoreResult};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};

/// Outcome of a cooldown check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Placement may proceed; the actor cools down until `next_allowed_at`.
    Allowed { next_allowed_at: i64 },
    /// Placement must be rejected for `retry_after_ms`.
    Denied {
        retry_after_ms: i64,
        next_allowed_at: i64,
    },
}

/// Pending cooldown write for one actor, committed with the placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorUpdate {
    pub(crate) actor_id: ActorId,
    pub(crate) next_allowed_at: i64,
}

impl ActorUpdate {
    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn next_allowed_at(&self) -> i64 {
        self.next_allowed_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownGate {
    base_cooldown_ms: i64,
}

impl CooldownGate {
    pub fn new(base_cooldown_ms: u64) -> Self {
        Self {
            base_cooldown_ms: i64::try_from(base_cooldown_ms).unwrap_or(i64::MAX),
        }
    }

    /// Cooldown incurred by one accepted placement of `size`.
    pub fn cooldown_ms(&self, size: FootprintSize) -> i64 {
        self.base_cooldown_ms
            .saturating_mul(i64::from(size.area()))
    }

    /// Pure state transition: Idle when `now >= next_allowed_at`, else
    /// Cooling.
    pub fn evaluate(
        &self,
        current_next_allowed: Option<i64>,
        size: FootprintSize,
        now_ms: i64,
    ) -> GateDecision {
        match current_next_allowed {
            Some(next_allowed_at) if now_ms < next_allowed_at => GateDecision::Denied {
                retry_after_ms: next_allowed_at - now_ms,
                next_allowed_at,
            },
            _ => GateDecision::Allowed {
                next_allowed_at: now_ms.saturating_add(self.cooldown_ms(size)),
            },
        }
    }

    /// Reads the actor's cooldown inside `tx` and decides.
    ///
    /// Returns the decision plus, when allowed, the update that must be
    /// committed in the same transaction.
    pub fn try_acquire(
        &self,
        tx: &Transaction<'_>,
        actor_id: &ActorId,
        size: FootprintSize,
        now_ms: i64,
    ) -> StoreResult<(GateDecision, Option<ActorUpdate>)> {
        let current = SqliteCanvasRepository::new(tx).next_allowed_at(actor_id)?;
        let decision = self.evaluate(current, size, now_ms);
        let update = match decision {
            GateDecision::Allowed { next_allowed_at } => Some(ActorUpdate {
                actor_id: actor_id.clone(),
                next_allowed_at,
            }),
            GateDecision::Denied { .. } => None,
        };
        Ok((decision, update))
    }
}
