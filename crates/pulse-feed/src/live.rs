//! Live resource.
//!
//! Binds one connection to one projector. A projection task consumes the
//! connection's events in arrival order, folds messages into the
//! projector, tracks the connected indicator and bumps a revision counter
//! that readers can watch. Dropping the resource tears its connection down.

use crate::projector::Projector;
use parking_lot::RwLock;
use pulse_ws::{ConnectionConfig, ConnectionEvent, ConnectionManager, FeedHandle, WsResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Capacity of the connection -> projection channel.
const EVENT_BUFFER: usize = 256;

/// A projector kept in sync with one feed.
pub struct LiveResource<P: Projector> {
    name: String,
    projector: Arc<RwLock<P>>,
    connected: Arc<AtomicBool>,
    revision_tx: Arc<watch::Sender<u64>>,
    revision_rx: watch::Receiver<u64>,
    feed: FeedHandle,
    task: JoinHandle<()>,
}

impl<P: Projector> LiveResource<P> {
    /// Open the connection and start projecting into `projector`.
    pub fn spawn(name: impl Into<String>, config: ConnectionConfig, projector: P) -> Self {
        let name = name.into();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let projector = Arc::new(RwLock::new(projector));
        let connected = Arc::new(AtomicBool::new(false));
        let (revision_tx, revision_rx) = watch::channel(0u64);
        let revision_tx = Arc::new(revision_tx);

        info!(feed = %name, url = %config.url, "Starting live resource");

        let task = tokio::spawn(run_projection(
            name.clone(),
            event_rx,
            projector.clone(),
            connected.clone(),
            revision_tx.clone(),
        ));
        let feed = FeedHandle::spawn(config, event_tx);

        Self {
            name,
            projector,
            connected,
            revision_tx,
            revision_rx,
            feed,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the projected state.
    pub fn read<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.projector.read())
    }

    /// Mutate the projected state from outside the feed (e.g. switching the
    /// active symbol). Always bumps the revision.
    pub fn modify<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let result = f(&mut self.projector.write());
        self.revision_tx.send_modify(|rev| *rev += 1);
        result
    }

    /// Connected/disconnected indicator.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Current revision. Increments whenever visible state changes.
    pub fn revision(&self) -> u64 {
        *self.revision_rx.borrow()
    }

    /// Receiver notified on every revision change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_rx.clone()
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        self.feed.manager()
    }

    /// Tear down the connection and wait for both tasks to finish.
    pub async fn shutdown(self) -> WsResult<()> {
        let Self {
            name, feed, task, ..
        } = self;
        let result = feed.shutdown().await;
        if let Err(e) = task.await {
            debug!(feed = %name, ?e, "Projection task ended abnormally");
        }
        info!(feed = %name, "Live resource stopped");
        result
    }
}

async fn run_projection<P: Projector>(
    name: String,
    mut events: mpsc::Receiver<ConnectionEvent>,
    projector: Arc<RwLock<P>>,
    connected: Arc<AtomicBool>,
    revision_tx: Arc<watch::Sender<u64>>,
) {
    while let Some(event) = events.recv().await {
        if apply_event(&name, event, &projector, &connected) {
            revision_tx.send_modify(|rev| *rev += 1);
        }
    }
    connected.store(false, Ordering::SeqCst);
    debug!(feed = %name, "Projection task finished");
}

/// Apply one connection event. Returns `true` when readers should re-render.
fn apply_event<P: Projector>(
    name: &str,
    event: ConnectionEvent,
    projector: &RwLock<P>,
    connected: &AtomicBool,
) -> bool {
    match event {
        ConnectionEvent::Opened => {
            info!(feed = %name, "Feed connected");
            !connected.swap(true, Ordering::SeqCst)
        }
        ConnectionEvent::Closed { code, reason } => {
            info!(feed = %name, code, %reason, "Feed disconnected");
            connected.swap(false, Ordering::SeqCst)
        }
        ConnectionEvent::Message(update) => projector.write().apply(&update),
    }
}
