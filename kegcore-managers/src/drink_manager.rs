// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kegcore_backend::{Backend, DrinkRequest};
use kegcore_bus::{EventHub, Subscriber};
use kegcore_events::{DrinkCreatedEvent, Event, FlowUpdate, TokenEventStatus};
use kegcore_model::{defaults, FlowState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Clone)]
struct PendingDrink {
    flow_id: u64,
    meter_name: String,
    username: Option<String>,
    start_time: u64,
    end_time: u64,
    ticks: u64,
    volume_ml: Option<f64>,
    auth_token: Option<String>,
}

/// Posts completed flows to the backend as drinks, at least once.
///
/// Completed flows accumulate in an ordered pending queue. A flush drains a
/// snapshot of that queue; entries that fail transiently are re-appended in
/// their original order so the next flush retries them before anything
/// newer.
pub struct DrinkManager {
    backend: Arc<dyn Backend>,
    hub: Arc<EventHub>,
    pending: Mutex<Vec<PendingDrink>>,
    last_token: Mutex<HashMap<String, String>>,
}

impl DrinkManager {
    pub fn new(backend: Arc<dyn Backend>, hub: Arc<EventHub>) -> Self {
        Self {
            backend,
            hub,
            pending: Mutex::new(Vec::new()),
            last_token: Mutex::new(HashMap::new()),
        }
    }

    async fn note_token(&self, meter_name: &str, token_value: &str) {
        self.last_token
            .lock()
            .await
            .insert(meter_name.to_owned(), token_value.to_owned());
    }

    async fn handle_flow_update(&self, update: &FlowUpdate) {
        if update.state != FlowState::Completed {
            return;
        }
        let auth_token = self.last_token.lock().await.get(&update.meter_name).cloned();
        let pending = PendingDrink {
            flow_id: update.flow_id,
            meter_name: update.meter_name.clone(),
            username: (!update.username.is_empty()).then(|| update.username.clone()),
            start_time: update.start_time,
            end_time: update.last_activity_time,
            ticks: update.ticks,
            volume_ml: update.volume_ml,
            auth_token,
        };
        self.pending.lock().await.push(pending);
        self.flush().await;
    }

    /// Drains the pending queue and attempts to post each entry. Entries
    /// dropped as noise or as unknown upstream do not return; transient
    /// failures go back on the queue, in order, for the next flush to try
    /// again. Returns the number successfully posted.
    pub async fn flush(&self) -> usize {
        let drained: Vec<PendingDrink> = std::mem::take(&mut *self.pending.lock().await);
        let mut posted = 0;
        let mut retry = Vec::new();

        for drink in drained {
            if drink.volume_ml.is_none_or(|v| v < defaults::MIN_VOLUME_TO_RECORD_ML) {
                debug!(meter_name = %drink.meter_name, "dropping drink below minimum volume");
                continue;
            }
            if drink.ticks == 0 {
                debug!(meter_name = %drink.meter_name, "dropping drink with zero ticks");
                continue;
            }

            let request = DrinkRequest {
                meter_name: drink.meter_name.clone(),
                ticks: drink.ticks,
                volume_ml: drink.volume_ml,
                username: drink.username.clone(),
                pour_time: drink.end_time,
                duration_secs: drink.end_time.saturating_sub(drink.start_time),
                auth_token: drink.auth_token.clone(),
                spilled: false,
            };

            match self.backend.record_drink(request).await {
                Ok(record) => {
                    posted += 1;
                    self.hub.publish(Event::DrinkCreatedEvent(DrinkCreatedEvent {
                        flow_id: drink.flow_id,
                        drink_id: record.drink_id,
                        meter_name: drink.meter_name,
                        start_time: drink.start_time,
                        end_time: drink.end_time,
                        username: drink.username.unwrap_or_default(),
                    }));
                }
                Err(e) if e.is_not_found() => {
                    warn!(meter_name = %drink.meter_name, "backend does not know this meter, dropping drink");
                }
                Err(e) if e.is_transient() => {
                    debug!(meter_name = %drink.meter_name, error = %e, "transient failure posting drink, will retry");
                    retry.push(drink);
                }
                Err(e) => {
                    warn!(meter_name = %drink.meter_name, error = %e, "failed to post drink");
                }
            }
        }

        if !retry.is_empty() {
            let mut pending = self.pending.lock().await;
            retry.append(&mut *pending);
            *pending = retry;
        }
        posted
    }
}

#[async_trait]
impl Subscriber for DrinkManager {
    async fn handle(&self, event: &Event) {
        match event {
            Event::FlowUpdate(update) => self.handle_flow_update(update).await,
            Event::HeartbeatMinuteEvent(_) => {
                self.flush().await;
            }
            Event::TokenAuthEvent(t) if t.status == TokenEventStatus::Added => {
                self.note_token(&t.meter_name, &t.token_value).await;
            }
            _ => {}
        }
    }
}
