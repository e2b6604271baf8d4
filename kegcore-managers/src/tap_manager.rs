// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kegcore_backend::Backend;
use kegcore_bus::Subscriber;
use kegcore_events::Event;
use kegcore_model::Tap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Registry of configured taps, reconciled from periodic backend syncs.
///
/// Sync is additive: a tap absent from a given sync payload is retained,
/// never removed. Tap removal is not modeled by this core.
pub struct TapManager {
    backend: Arc<dyn Backend>,
    taps: RwLock<HashMap<String, Tap>>,
}

impl TapManager {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            taps: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_tap(&self, name: &str) -> Option<Tap> {
        self.taps.read().await.get(name).cloned()
    }

    pub async fn get_all_taps(&self) -> Vec<Tap> {
        self.taps.read().await.values().cloned().collect()
    }

    /// A snapshot of the whole registry, handed to `FlowManager` so it can
    /// resolve tap lookups without holding an async lock across its own
    /// synchronous state transitions.
    pub async fn snapshot(&self) -> HashMap<String, Tap> {
        self.taps.read().await.clone()
    }

    /// Registers a tap, or replaces it if the new descriptor differs
    /// structurally from what's on file. Returns true if anything changed.
    pub async fn register_or_replace(&self, tap: Tap) -> bool {
        let mut taps = self.taps.write().await;
        let changed = taps.get(&tap.name) != Some(&tap);
        if changed {
            debug!(meter_name = %tap.name, "registering tap");
            taps.insert(tap.name.clone(), tap);
        }
        changed
    }

    async fn handle_sync(&self, data: &serde_json::Value) {
        let Some(taps) = data.get("taps").and_then(|v| v.as_array()) else {
            return;
        };
        for descriptor in taps {
            let Some(meter_name) = descriptor.get("meter_name").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(ml_per_tick) = descriptor.get("ml_per_tick").and_then(|v| v.as_f64()) else {
                continue;
            };
            let relay_name = descriptor
                .get("relay_name")
                .and_then(|v| v.as_str())
                .map(str::to_owned);
            self.register_or_replace(Tap::new(meter_name, ml_per_tick, relay_name))
                .await;
        }
    }

    async fn handle_controller_connected(&self, controller_name: &str) {
        match self.backend.create_controller(controller_name).await {
            Ok(_) => debug!(controller_name, "controller registered with backend"),
            Err(e) if e.is_not_found() => {
                // Historical quirk of the upstream API: a controller that
                // already exists surfaces the same way a missing resource
                // would on other endpoints. Either way, nothing to do.
                debug!(controller_name, "controller already known to backend");
            }
            Err(e) => warn!(controller_name, error = %e, "failed to register controller"),
        }
    }
}

#[async_trait]
impl Subscriber for TapManager {
    async fn handle(&self, event: &Event) {
        match event {
            Event::SyncEvent(sync) => self.handle_sync(&sync.data).await,
            Event::ControllerConnectedEvent(c) => {
                self.handle_controller_connected(&c.controller_name).await
            }
            _ => {}
        }
    }
}
