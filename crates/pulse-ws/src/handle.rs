//! Owning handle for a running connection.
//!
//! A handle is the exclusive owner of one socket. Dropping it is the
//! "unmount": the socket is closed and any pending reconnect is cancelled.
//! Two handles for the same feed are two independent connections.

use crate::connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats,
};
use crate::error::{WsError, WsResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Handle to a connection task.
pub struct FeedHandle {
    manager: Arc<ConnectionManager>,
    task: Option<JoinHandle<WsResult<()>>>,
}

impl FeedHandle {
    /// Spawn the connection task on the current runtime.
    pub fn spawn(config: ConnectionConfig, event_tx: mpsc::Sender<ConnectionEvent>) -> Self {
        let manager = Arc::new(ConnectionManager::new(config, event_tx));
        let task_manager = manager.clone();
        let task = tokio::spawn(async move {
            let result = task_manager.run().await;
            if let Err(e) = &result {
                error!(url = %task_manager.url(), ?e, "Connection task stopped");
            }
            result
        });

        Self {
            manager,
            task: Some(task),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.manager.stats()
    }

    /// Whether the connection task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Tear down and wait for the connection task to exit.
    pub async fn shutdown(mut self) -> WsResult<()> {
        self.manager.shutdown();
        match self.task.take() {
            Some(task) => task.await.map_err(|e| WsError::TaskJoin(e.to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.manager.shutdown();
    }
}
