//! Live subscription over WebSocket.
//!
//! A session sends `hello`, then one `catch_up` burst, then a `cell` message
//! per committed change. A subscriber that falls behind gets `lagged` and
//! should reload the region it shows.

use crate::api::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use gridclaim_core::{CellChanged, Subscription, SubscriptionEvent};
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    Hello {
        cooldown_ms: u64,
        cell_size: f64,
        max_footprint: u8,
    },
    CatchUp {
        changes: Vec<CellChanged>,
    },
    Cell(CellChanged),
    Lagged {
        missed: u64,
    },
}

pub async fn live(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(mut socket: WebSocket, state: AppState) {
    let mut subscription = state.service.subscribe();
    let config = state.service.config();
    info!(
        "event=live_session module=ws status=start subscribers={}",
        state.service.hub().subscriber_count()
    );

    let hello = LiveMessage::Hello {
        cooldown_ms: config.base_cooldown_ms,
        cell_size: config.cell_size,
        max_footprint: config.max_footprint,
    };
    let catch_up = LiveMessage::CatchUp {
        changes: subscription.take_catch_up(),
    };
    if send(&mut socket, &hello).await && send(&mut socket, &catch_up).await {
        forward(&mut socket, &mut subscription).await;
    }

    info!("event=live_session module=ws status=ok phase=closed");
}

async fn forward(socket: &mut WebSocket, subscription: &mut Subscription) {
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let message = match event {
                    Some(SubscriptionEvent::Changed(change)) => LiveMessage::Cell(change),
                    Some(SubscriptionEvent::Lagged { missed }) => {
                        warn!("event=live_session module=ws status=lagged missed={missed}");
                        LiveMessage::Lagged { missed }
                    }
                    None => return,
                };
                if !send(socket, &message).await {
                    return;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                // Clients have nothing to say on this channel.
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Returns false once the client is gone. Delivery failures stay local to
/// this session.
async fn send(socket: &mut WebSocket, message: &LiveMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            warn!("event=live_send module=ws status=error error={err}");
            return true;
        }
    };
    match socket.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(err) => {
            debug!("event=live_send module=ws status=error error_code=broadcast_failure error={err}");
            false
        }
    }
}
