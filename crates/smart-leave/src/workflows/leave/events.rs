//! Change notifications for the workflow tables.
//!
//! Writers publish a [`ChangeEvent`] after each committed change. Readers
//! either subscribe directly or run [`spawn_reconciler`], which also fires on
//! a fixed interval so a missed event is picked up on the next tick.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const EVENT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Users,
    Leaves,
    Notifications,
    Session,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn now(kind: ChangeKind) -> Self {
        Self {
            kind,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    /// Publishes to current subscribers; dropped silently when there are none.
    pub fn publish(&self, kind: ChangeKind) {
        let event = ChangeEvent::now(kind);
        match self.tx.send(event) {
            Ok(receivers) => debug!(?kind, receivers, "change published"),
            Err(_) => debug!(?kind, "no subscribers for change"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `handler` for every published change (`Some`) and on every interval
/// tick (`None`). Stops once every publisher is dropped or the task is
/// aborted.
pub fn spawn_reconciler<F>(bus: &ChangeBus, interval: Duration, mut handler: F) -> JoinHandle<()>
where
    F: FnMut(Option<&ChangeEvent>) + Send + 'static,
{
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => handler(Some(&event)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reconciler lagged behind change bus");
                        handler(None);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => handler(None),
            }
        }
        debug!("reconciler stopped");
    })
}
