// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kegcore_backend::Backend;
use kegcore_bus::EventHub;
use kegcore_events::{Event, SyncEvent};
use tracing::warn;

use crate::worker::Worker;

const ACTIVE_SESSION_INTERVAL_SECS: u64 = 10;
const IDLE_SESSION_INTERVAL_SECS: u64 = 60;

/// Polls the backend's status endpoint and republishes it as a
/// [`SyncEvent`] for `TapManager` (and anything else interested) to
/// reconcile against. Polls more often while a session is active.
pub struct SyncWorker {
    backend: Arc<dyn Backend>,
    hub: Arc<EventHub>,
    current_session: bool,
}

impl SyncWorker {
    pub fn new(backend: Arc<dyn Backend>, hub: Arc<EventHub>) -> Self {
        Self {
            backend,
            hub,
            current_session: false,
        }
    }
}

#[async_trait]
impl Worker for SyncWorker {
    async fn run(&mut self) {
        match self.backend.get_status().await {
            Ok(status) => {
                self.current_session = status.current_session;
                match serde_json::to_value(&status) {
                    Ok(data) => self.hub.publish(Event::SyncEvent(SyncEvent { data })),
                    Err(e) => warn!(error = %e, "failed to serialize backend status"),
                }
            }
            Err(e) => warn!(error = %e, "sync poll failed"),
        }
    }

    async fn trigger(&mut self) {
        let secs = if self.current_session {
            ACTIVE_SESSION_INTERVAL_SECS
        } else {
            IDLE_SESSION_INTERVAL_SECS
        };
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegcore_backend::mock::MockBackend;

    #[tokio::test]
    async fn successful_poll_publishes_sync_event() {
        let backend = Arc::new(MockBackend::new());
        let hub = Arc::new(EventHub::new());
        let mut worker = SyncWorker::new(backend, hub.clone());
        worker.run().await;
        assert_eq!(hub.flush().await, 1);
    }

    #[tokio::test]
    async fn active_session_shortens_the_interval() {
        let backend = Arc::new(MockBackend::new());
        backend.set_current_session(true);
        let hub = Arc::new(EventHub::new());
        let mut worker = SyncWorker::new(backend, hub);
        worker.run().await;
        assert!(worker.current_session);
    }
}
