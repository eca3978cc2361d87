//! Actor identity for placement requests.
//!
//! The core treats actor ids as opaque; this module decides which request
//! metadata the server folds into one. Request bodies never choose it.

use axum::http::HeaderMap;
use std::net::SocketAddr;

const USER_AGENT_MAX_CHARS: usize = 160;

/// `client-address|user-agent`, where the address is the first
/// `x-forwarded-for` hop when a proxy supplied one, else the peer address.
pub fn derive_actor_id(headers: &HeaderMap, peer: SocketAddr) -> String {
    let address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| peer.ip().to_string(), str::to_string);

    let user_agent: String = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .chars()
        .take(USER_AGENT_MAX_CHARS)
        .collect();

    format!("{address}|{user_agent}")
}
