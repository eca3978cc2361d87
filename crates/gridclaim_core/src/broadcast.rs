//! Live fan-out of committed cell changes.
//!
//! # Responsibility
//! - Publish every committed `CellChanged` to live subscribers.
//! - Keep a bounded window of recent changes for catch-up.
//!
//! # Invariants
//! - Publishing never blocks and never fails a placement.
//! - Delivery is at-most-once per subscriber; a subscriber that falls more
//!   than the channel capacity behind is told how many events it missed.
//! - Events are published in commit order, so one subscriber sees the
//!   writes to any one cell in the order they were committed.
//! - A new subscription's catch-up burst and its live stream neither overlap
//!   nor leave a gap.

use crate::model::cell::CellChanged;
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// What a subscriber receives next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Changed(CellChanged),
    /// The subscriber fell behind and `missed` events were dropped for it.
    /// It should resynchronize with `recent` or a region query.
    Lagged { missed: u64 },
}

/// A live subscription plus the catch-up burst taken when it was opened.
pub struct Subscription {
    catch_up: Vec<CellChanged>,
    receiver: broadcast::Receiver<CellChanged>,
}

impl Subscription {
    /// Recent changes committed before the subscription opened, oldest
    /// first. Returns them once; later calls return an empty list.
    pub fn take_catch_up(&mut self) -> Vec<CellChanged> {
        std::mem::take(&mut self.catch_up)
    }

    /// Waits for the next live event. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        match self.receiver.recv().await {
            Ok(change) => Some(SubscriptionEvent::Changed(change)),
            Err(RecvError::Lagged(missed)) => Some(SubscriptionEvent::Lagged { missed }),
            Err(RecvError::Closed) => None,
        }
    }

    /// Returns the next live event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SubscriptionEvent> {
        match self.receiver.try_recv() {
            Ok(change) => Some(SubscriptionEvent::Changed(change)),
            Err(TryRecvError::Lagged(missed)) => Some(SubscriptionEvent::Lagged { missed }),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }
}

pub struct BroadcastHub {
    sender: broadcast::Sender<CellChanged>,
    recent: Mutex<VecDeque<CellChanged>>,
    recent_capacity: usize,
}

impl BroadcastHub {
    /// `buffer` bounds each subscriber's backlog, `recent_capacity` the
    /// catch-up window. Both must be non-zero.
    pub fn new(buffer: usize, recent_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity: recent_capacity.max(1),
        }
    }

    /// Publishes one committed change.
    pub fn publish(&self, change: CellChanged) {
        let mut recent = self.lock_recent();
        if recent.len() == self.recent_capacity {
            recent.pop_front();
        }
        recent.push_back(change.clone());

        // Sent while the ring is locked so `subscribe` sees each event in
        // exactly one of catch-up or live.
        match self.sender.send(change) {
            Ok(receivers) => trace!("event=broadcast_publish module=broadcast status=ok receivers={receivers}"),
            Err(_) => trace!("event=broadcast_publish module=broadcast status=ok receivers=0"),
        }
    }

    /// Opens a subscription with the current catch-up window attached.
    pub fn subscribe(&self) -> Subscription {
        let recent = self.lock_recent();
        let receiver = self.sender.subscribe();
        let catch_up = recent.iter().cloned().collect();
        debug!(
            "event=broadcast_subscribe module=broadcast status=ok catch_up={} subscribers={}",
            recent.len(),
            self.sender.receiver_count()
        );
        Subscription { catch_up, receiver }
    }

    /// Up to `limit` most recent changes, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CellChanged> {
        let recent = self.lock_recent();
        let skip = recent.len().saturating_sub(limit);
        recent.iter().skip(skip).cloned().collect()
    }

    /// Replaces the catch-up window, e.g. after restart or restore.
    /// `changes` must be oldest first.
    pub fn seed(&self, changes: Vec<CellChanged>) {
        let mut recent = self.lock_recent();
        recent.clear();
        let skip = changes.len().saturating_sub(self.recent_capacity);
        recent.extend(changes.into_iter().skip(skip));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn lock_recent(&self) -> MutexGuard<'_, VecDeque<CellChanged>> {
        // The ring holds plain data; a panic elsewhere cannot leave it torn.
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
