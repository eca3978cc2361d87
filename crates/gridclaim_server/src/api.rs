//! HTTP surface: place, region, leaderboard, stats and recent activity.
//!
//! # Invariants
//! - Every SQLite-touching call runs on the blocking pool.
//! - Cooldown rejections answer `429` with `retry_after_ms`; they are not
//!   logged as errors.

use crate::actor::derive_actor_id;
use crate::ws;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gridclaim_core::{
    core_version, CanvasService, CaptureCount, ColorStrategy, Coordinate, GroupId, GroupStats,
    InvalidInput, PeriodId, PeriodKind, PlaceError, PlacementOutcome, PlacementReceipt,
    PlacementRequest, QueryError, RejectReason,
};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CanvasService>,
}

impl AppState {
    pub fn new(service: Arc<CanvasService>) -> Self {
        Self { service }
    }

    /// Runs a storage call on the blocking pool.
    async fn blocking<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CanvasService) -> T + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || call(&service))
            .await
            .map_err(|err| {
                error!("event=blocking_call module=api status=error error={err}");
                ApiError::internal("request worker failed")
            })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/place", post(place))
        .route("/api/region", get(region))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/recent", get(recent))
        .route("/api/stats/:group", get(group_stats))
        .route("/ws", get(ws::live))
        .with_state(state)
}

/// Error body: `{ "ok": false, "reason": ..., "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    reason: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "ok": false,
                "reason": self.reason,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<InvalidInput> for ApiError {
    fn from(value: InvalidInput) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", value.to_string())
    }
}

impl From<PlaceError> for ApiError {
    fn from(value: PlaceError) -> Self {
        match value {
            PlaceError::InvalidInput(err) => err.into(),
            PlaceError::PersistenceFailure(err) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "persistence_failure",
                err.to_string(),
            ),
            PlaceError::StorageHalted => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_halted",
                "placements are paused",
            ),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::InvalidInput(err) => err.into(),
            QueryError::Store(err) => {
                error!("event=query module=api status=error error={err}");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "storage_error", err.to_string())
            }
        }
    }
}

/// `color` accepts a bare `#rrggbb` string or a full strategy object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColorField {
    Hex(String),
    Strategy(ColorStrategy),
}

impl From<ColorField> for ColorStrategy {
    fn from(value: ColorField) -> Self {
        match value {
            ColorField::Hex(color) => ColorStrategy::solid(color),
            ColorField::Strategy(strategy) => strategy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBody {
    pub group_id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_size")]
    pub size: u8,
    #[serde(default)]
    pub color: Option<ColorField>,
}

fn default_size() -> u8 {
    1
}

#[derive(Debug, Serialize)]
struct PlacedResponse {
    ok: bool,
    affected_cell_count: usize,
    #[serde(flatten)]
    receipt: PlacementReceipt,
}

async fn place(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<PlaceBody>,
) -> Result<Response, ApiError> {
    let request = PlacementRequest {
        actor_id: derive_actor_id(&headers, peer),
        group_id: body.group_id,
        anchor: Coordinate::new(body.x, body.y),
        footprint_size: body.size,
        color: body
            .color
            .map_or(ColorStrategy::GroupDefault, ColorStrategy::from),
    };

    let outcome = state
        .blocking(move |service| service.place_now(&request))
        .await?
        .map_err(|err| {
            if matches!(err, PlaceError::InvalidInput(_)) {
                warn!("event=place module=api status=rejected error={err}");
            }
            ApiError::from(err)
        })?;

    Ok(match outcome {
        PlacementOutcome::Committed(receipt) => {
            Json(PlacedResponse {
                ok: true,
                affected_cell_count: receipt.affected_cell_count(),
                receipt,
            })
            .into_response()
        }
        PlacementOutcome::Rejected {
            reason,
            retry_after_ms,
            next_allowed_at,
        } => {
            let status = match reason {
                RejectReason::CooldownActive => StatusCode::TOO_MANY_REQUESTS,
                RejectReason::NothingToClaim => StatusCode::CONFLICT,
            };
            (
                status,
                Json(json!({
                    "ok": false,
                    "reason": reason,
                    "retry_after_ms": retry_after_ms,
                    "next_allowed_at": next_allowed_at,
                })),
            )
                .into_response()
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct RegionParams {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

async fn region(
    State(state): State<AppState>,
    Query(params): Query<RegionParams>,
) -> Result<Response, ApiError> {
    let result = state
        .blocking(move |service| {
            service.region_between(
                Coordinate::new(params.x1, params.y1),
                Coordinate::new(params.x2, params.y2),
            )
        })
        .await??;
    let cell_size = state.service.config().cell_size;
    Ok(Json(json!({
        "cell_size": cell_size,
        "cells": result.cells,
        "truncated": result.truncated,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    pub period: Option<String>,
    /// Explicit historical period, e.g. `2026-10-15`.
    #[serde(default)]
    pub period_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Response, ApiError> {
    let kind = match params.period.as_deref() {
        None => PeriodKind::Day,
        Some(value) => PeriodKind::parse(value).ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_input",
                format!("unknown period `{value}`"),
            )
        })?,
    };
    let board = state
        .blocking(move |service| match params.period_id {
            Some(period_id) => {
                service.leaderboard_for_period(kind, PeriodId::new(period_id), params.limit)
            }
            None => service.leaderboard(kind, gridclaim_core::now_ms(), params.limit),
        })
        .await??;
    Ok(Json(board).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Json(state.service.recent(limit)).into_response()
}

#[derive(Debug, Serialize)]
struct GroupStatsResponse {
    #[serde(flatten)]
    stats: GroupStats,
    captures: Vec<CaptureCount>,
}

async fn group_stats(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Response, ApiError> {
    let group = GroupId::parse(&group)?;
    let response = state
        .blocking(move |service| -> Result<GroupStatsResponse, QueryError> {
            Ok(GroupStatsResponse {
                stats: service.group_stats(&group)?,
                captures: service.capture_stats(&group)?,
            })
        })
        .await??;
    Ok(Json(response).into_response())
}

async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": if state.service.is_halted() { "halted" } else { "ok" },
        "version": core_version(),
        "subscribers": state.service.hub().subscriber_count(),
    }))
    .into_response()
}
