// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kegcore_bus::EventHub;
use kegcore_events::{Empty, Event};

use crate::worker::Worker;

/// Publishes `HeartbeatSecondEvent` every second and `HeartbeatMinuteEvent`
/// every 60th tick, giving every manager a steady pulse to sweep idle
/// flows, stale sensors, and pending drinks on.
pub struct HeartbeatWorker {
    hub: Arc<EventHub>,
    ticks: u64,
}

impl HeartbeatWorker {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self { hub, ticks: 0 }
    }
}

#[async_trait]
impl Worker for HeartbeatWorker {
    async fn run(&mut self) {
        self.ticks += 1;
        self.hub.publish(Event::HeartbeatSecondEvent(Empty {}));
        if self.ticks % 60 == 0 {
            self.hub.publish(Event::HeartbeatMinuteEvent(Empty {}));
        }
    }

    async fn trigger(&mut self) {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sixtieth_tick_also_publishes_minute_event() {
        let hub = Arc::new(EventHub::new());
        let mut worker = HeartbeatWorker::new(hub.clone());
        for _ in 0..59 {
            worker.run().await;
        }
        assert_eq!(hub.flush().await, 59);

        worker.run().await;
        assert_eq!(hub.flush().await, 2);
    }
}
