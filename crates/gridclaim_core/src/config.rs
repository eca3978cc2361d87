//! Canvas service configuration.
//!
//! # Invariants
//! - `CanvasConfig::validate()` passes before a service is constructed.
//! - Defaults reproduce the production canvas: ~11 m cells, 10 s base
//!   cooldown, brushes up to 3x3.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_CELL_SIZE: f64 = 0.0001;
pub const DEFAULT_BASE_COOLDOWN_MS: u64 = 10_000;
pub const DEFAULT_MAX_FOOTPRINT: u8 = 3;
pub const DEFAULT_REGION_CAP: u32 = 800;
pub const DEFAULT_RECENT_CAPACITY: usize = 256;
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 5;
pub const LEADERBOARD_LIMIT_MAX: u32 = 50;
pub const DEFAULT_BROADCAST_BUFFER: usize = 1024;

/// What happens to footprint cells the requesting group already shows in
/// the requested color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimPolicy {
    /// Rewrite and count every footprint cell unconditionally.
    #[default]
    AlwaysCommit,
    /// Leave identical cells untouched and uncounted. A placement that would
    /// change nothing is rejected without consuming cooldown.
    SkipOwnedCells,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Cell edge length in coordinate units.
    pub cell_size: f64,
    /// Cooldown after a single-cell placement. Scales with footprint area.
    pub base_cooldown_ms: u64,
    /// Largest accepted footprint side.
    pub max_footprint: u8,
    /// Maximum cells returned by one region query.
    pub region_cap: u32,
    /// Committed changes retained for subscriber catch-up.
    pub recent_capacity: usize,
    /// Leaderboard length used when the caller does not ask for one.
    pub leaderboard_limit: u32,
    /// Per-subscriber backlog before a slow observer starts missing events.
    pub broadcast_buffer: usize,
    pub reclaim_policy: ReclaimPolicy,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            base_cooldown_ms: DEFAULT_BASE_COOLDOWN_MS,
            max_footprint: DEFAULT_MAX_FOOTPRINT,
            region_cap: DEFAULT_REGION_CAP,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            broadcast_buffer: DEFAULT_BROADCAST_BUFFER,
            reclaim_policy: ReclaimPolicy::AlwaysCommit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidCellSize(f64),
    ZeroField(&'static str),
    LeaderboardLimitTooLarge(u32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCellSize(value) => {
                write!(f, "cell_size must be finite and positive, got {value}")
            }
            Self::ZeroField(field) => write!(f, "{field} must be greater than zero"),
            Self::LeaderboardLimitTooLarge(value) => write!(
                f,
                "leaderboard_limit {value} exceeds maximum {LEADERBOARD_LIMIT_MAX}"
            ),
        }
    }
}

impl Error for ConfigError {}

impl CanvasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ConfigError::InvalidCellSize(self.cell_size));
        }
        if self.max_footprint == 0 {
            return Err(ConfigError::ZeroField("max_footprint"));
        }
        if self.region_cap == 0 {
            return Err(ConfigError::ZeroField("region_cap"));
        }
        if self.recent_capacity == 0 {
            return Err(ConfigError::ZeroField("recent_capacity"));
        }
        if self.broadcast_buffer == 0 {
            return Err(ConfigError::ZeroField("broadcast_buffer"));
        }
        if self.leaderboard_limit == 0 {
            return Err(ConfigError::ZeroField("leaderboard_limit"));
        }
        if self.leaderboard_limit > LEADERBOARD_LIMIT_MAX {
            return Err(ConfigError::LeaderboardLimitTooLarge(self.leaderboard_limit));
        }
        Ok(())
    }

    /// Clamps a caller-supplied leaderboard length.
    pub fn normalize_leaderboard_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.leaderboard_limit,
            Some(value) if value > LEADERBOARD_LIMIT_MAX => LEADERBOARD_LIMIT_MAX,
            Some(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CanvasConfig, ConfigError, ReclaimPolicy, LEADERBOARD_LIMIT_MAX};

    #[test]
    fn default_config_is_valid() {
        let config = CanvasConfig::default();
        config.validate().unwrap();
        assert_eq!(config.reclaim_policy, ReclaimPolicy::AlwaysCommit);
    }

    #[test]
    fn validate_rejects_bad_cell_size_and_zero_caps() {
        let config = CanvasConfig {
            cell_size: 0.0,
            ..CanvasConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidCellSize(0.0)));

        let config = CanvasConfig {
            region_cap: 0,
            ..CanvasConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroField("region_cap")));
    }

    #[test]
    fn leaderboard_limit_defaults_and_clamps() {
        let config = CanvasConfig::default();
        assert_eq!(config.normalize_leaderboard_limit(None), 5);
        assert_eq!(config.normalize_leaderboard_limit(Some(0)), 5);
        assert_eq!(config.normalize_leaderboard_limit(Some(12)), 12);
        assert_eq!(
            config.normalize_leaderboard_limit(Some(500)),
            LEADERBOARD_LIMIT_MAX
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: CanvasConfig =
            serde_json::from_str(r#"{"base_cooldown_ms":3000,"reclaim_policy":"skip_owned_cells"}"#)
                .unwrap();
        assert_eq!(config.base_cooldown_ms, 3000);
        assert_eq!(config.reclaim_policy, ReclaimPolicy::SkipOwnedCells);
        assert_eq!(config.region_cap, 800);
    }
}
