//! Core domain logic for the gridclaim canvas.
//! This crate is the single source of truth for placement invariants.

pub mod aggregation;
pub mod broadcast;
pub mod config;
pub mod cooldown;
pub mod db;
pub mod grid;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use aggregation::{bucket_key, Leaderboard, LeaderboardEntry, PeriodId, PeriodKind};
pub use broadcast::{BroadcastHub, Subscription, SubscriptionEvent};
pub use config::{CanvasConfig, ConfigError, ReclaimPolicy};
pub use cooldown::{CooldownGate, GateDecision};
pub use grid::{BoundingBox, CellKey, Coordinate, FootprintSize};
pub use logging::{default_log_level, init_logging};
pub use model::cell::{CellChanged, CellState};
pub use model::color::{Color, ColorStrategy};
pub use model::input::{ActorId, GroupId, InvalidInput};
pub use service::canvas_service::{
    CanvasService, GroupStats, OpenError, PlaceError, PlacementOutcome, PlacementReceipt,
    PlacementRequest, QueryError, RegionResult, RejectReason,
};
pub use store::{CanvasSnapshot, CaptureCount, StoreError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::{core_version, now_ms, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
