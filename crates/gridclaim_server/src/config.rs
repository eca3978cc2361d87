//! Server configuration from `GRIDCLAIM_*` environment variables.
//!
//! # Invariants
//! - Every variable is optional; unset variables take the canvas defaults.
//! - A set but unparsable variable is an error, never silently ignored.

use gridclaim_core::config::ConfigError;
use gridclaim_core::{default_log_level, CanvasConfig};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_PATH: &str = "gridclaim.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    /// Periodic JSON export target; exports are disabled when unset.
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    pub canvas: CanvasConfig,
}

#[derive(Debug)]
pub enum ServerConfigError {
    InvalidVar { name: &'static str, value: String },
    Canvas(ConfigError),
}

impl Display for ServerConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVar { name, value } => write!(f, "invalid value `{value}` for {name}"),
            Self::Canvas(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServerConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidVar { .. } => None,
            Self::Canvas(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ServerConfigError {
    fn from(value: ConfigError) -> Self {
        Self::Canvas(value)
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ServerConfigError> {
        let defaults = CanvasConfig::default();
        let canvas = CanvasConfig {
            cell_size: parse_var(&lookup, "GRIDCLAIM_CELL_SIZE", defaults.cell_size)?,
            base_cooldown_ms: parse_var(
                &lookup,
                "GRIDCLAIM_BASE_COOLDOWN_MS",
                defaults.base_cooldown_ms,
            )?,
            region_cap: parse_var(&lookup, "GRIDCLAIM_REGION_CAP", defaults.region_cap)?,
            ..defaults
        };
        canvas.validate()?;

        let snapshot_interval_secs = parse_var(
            &lookup,
            "GRIDCLAIM_SNAPSHOT_INTERVAL_SECS",
            DEFAULT_SNAPSHOT_INTERVAL_SECS,
        )?;
        if snapshot_interval_secs == 0 {
            return Err(ServerConfigError::InvalidVar {
                name: "GRIDCLAIM_SNAPSHOT_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind: parse_var(
                &lookup,
                "GRIDCLAIM_BIND",
                SocketAddr::from(([127, 0, 0, 1], 3000)),
            )?,
            db_path: non_empty(&lookup, "GRIDCLAIM_DB_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            log_dir: non_empty(&lookup, "GRIDCLAIM_LOG_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_LOG_DIR), PathBuf::from),
            log_level: non_empty(&lookup, "GRIDCLAIM_LOG_LEVEL")
                .unwrap_or_else(|| default_log_level().to_string()),
            snapshot_path: non_empty(&lookup, "GRIDCLAIM_SNAPSHOT_PATH").map(PathBuf::from),
            snapshot_interval: Duration::from_secs(snapshot_interval_secs),
            canvas,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ServerConfigError> {
    match non_empty(lookup, name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ServerConfigError::InvalidVar { name, value }),
    }
}
