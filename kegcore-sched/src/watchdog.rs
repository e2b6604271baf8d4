// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kegcore_bus::EventHub;
use kegcore_events::{Empty, Event};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use crate::worker::Worker;

/// One task this watchdog supervises.
pub struct SupervisedWorker {
    pub name: &'static str,
    pub handle: JoinHandle<()>,
}

/// Polls every supervised task; if one has finished while shutdown was not
/// requested, that is an unexpected death. This core does not tolerate a
/// bounded number of restarts — one unexpected death publishes `QuitEvent`
/// and ends the process, on the view that a silently degraded worker set
/// is worse than a clean restart by the surrounding supervisor (systemd,
/// a container orchestrator, etc).
pub struct WatchdogWorker {
    hub: Arc<EventHub>,
    workers: Vec<SupervisedWorker>,
    shutdown: watch::Receiver<bool>,
}

impl WatchdogWorker {
    pub fn new(
        hub: Arc<EventHub>,
        workers: Vec<SupervisedWorker>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            hub,
            workers,
            shutdown,
        }
    }
}

#[async_trait]
impl Worker for WatchdogWorker {
    async fn run(&mut self) {
        if *self.shutdown.borrow() {
            return;
        }
        for worker in &self.workers {
            if worker.handle.is_finished() {
                error!(worker = worker.name, "worker died unexpectedly, shutting down");
                self.hub.publish(Event::QuitEvent(Empty {}));
                std::process::exit(1);
            }
        }
    }

    async fn trigger(&mut self) {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
