// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kegcore_backend::Backend;
use kegcore_bus::Subscriber;
use kegcore_events::{Event, TokenAuthEvent, TokenEventStatus};
use kegcore_model::{defaults, TokenRecord, TokenStatus};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::flow_manager::FlowManager;
use crate::tap_manager::TapManager;

struct DevicePolicy {
    captive: bool,
    max_idle_secs: u64,
}

fn policy_for(auth_device: &str) -> DevicePolicy {
    match auth_device {
        defaults::AUTH_DEVICE_ONEWIRE => DevicePolicy {
            captive: true,
            max_idle_secs: 120,
        },
        defaults::AUTH_DEVICE_RFID => DevicePolicy {
            captive: false,
            max_idle_secs: 20,
        },
        _ => DevicePolicy {
            captive: true,
            max_idle_secs: defaults::DEFAULT_MAX_IDLE_SECS,
        },
    }
}

/// Tracks which token is currently presented at each meter and starts or
/// stops flows in response, per a captive/contactless device policy.
///
/// At most one `Active` [`TokenRecord`] exists per meter; this is enforced
/// here, not on `TokenRecord` itself, by always running the REMOVED path on
/// whatever record currently occupies a meter before installing a new one.
pub struct AuthenticationManager {
    backend: Arc<dyn Backend>,
    flows: Arc<FlowManager>,
    taps: Arc<TapManager>,
    active: Mutex<HashMap<String, TokenRecord>>,
}

impl AuthenticationManager {
    pub fn new(backend: Arc<dyn Backend>, flows: Arc<FlowManager>, taps: Arc<TapManager>) -> Self {
        Self {
            backend,
            flows,
            taps,
            active: Mutex::new(HashMap::new()),
        }
    }

    async fn target_meters(&self, meter_name: &str) -> Vec<String> {
        if meter_name == defaults::ALIAS_ALL_TAPS {
            self.taps
                .get_all_taps()
                .await
                .into_iter()
                .map(|t| t.name)
                .collect()
        } else {
            vec![meter_name.to_owned()]
        }
    }

    async fn handle_added(&self, meter_name: &str, auth_device: &str, token_value: &str) {
        let policy = policy_for(auth_device);
        let record = TokenRecord::new(auth_device, token_value, meter_name);

        {
            let mut active = self.active.lock().await;
            match active.get(meter_name) {
                Some(existing) if existing.same_presentation(&record) => {
                    // Same token re-presented: nothing to install.
                    return;
                }
                Some(_) => {
                    drop(active);
                    self.remove_locked(meter_name).await;
                    active = self.active.lock().await;
                }
                None => {}
            }
            active.insert(meter_name.to_owned(), record);
        }

        match self.backend.get_auth_token(auth_device, token_value).await {
            Ok(info) if info.enabled => match info.username {
                Some(username) if !username.is_empty() => {
                    self.flows
                        .start_flow(meter_name, &username, policy.max_idle_secs)
                        .await;
                }
                _ => debug!(meter_name, auth_device, "token has no bound user, ignoring"),
            },
            Ok(_) => debug!(meter_name, auth_device, "token is disabled, ignoring"),
            Err(e) => {
                // A lookup failure is indistinguishable, from this manager's
                // perspective, from a token that simply doesn't exist.
                debug!(meter_name, auth_device, error = %e, "token lookup failed, treating as unknown");
            }
        }
    }

    async fn handle_removed(&self, meter_name: &str, auth_device: &str, token_value: &str) {
        let record = TokenRecord::new(auth_device, token_value, meter_name);
        let matched = {
            let active = self.active.lock().await;
            active
                .get(meter_name)
                .is_some_and(|existing| existing.same_presentation(&record))
        };
        if !matched {
            warn!(meter_name, auth_device, "token removal does not match active record, ignoring");
            return;
        }
        self.remove_locked(meter_name).await;
        if policy_for(auth_device).captive {
            self.flows.stop_flow(meter_name).await;
        }
    }

    async fn remove_locked(&self, meter_name: &str) {
        let mut active = self.active.lock().await;
        if let Some(mut record) = active.remove(meter_name) {
            record.status = TokenStatus::Removed;
        }
    }

    async fn handle_token_auth(&self, event: &TokenAuthEvent) {
        for meter_name in self.target_meters(&event.meter_name).await {
            match event.status {
                TokenEventStatus::Added => {
                    self.handle_added(&meter_name, &event.auth_device_name, &event.token_value)
                        .await
                }
                TokenEventStatus::Removed => {
                    self.handle_removed(&meter_name, &event.auth_device_name, &event.token_value)
                        .await
                }
            }
        }
    }
}

#[async_trait]
impl Subscriber for AuthenticationManager {
    async fn handle(&self, event: &Event) {
        if let Event::TokenAuthEvent(token_event) = event {
            self.handle_token_auth(token_event).await;
        }
    }
}
