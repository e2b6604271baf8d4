// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures_util::StreamExt;
use kegcore_backend::RetryConfig;
use kegcore_bus::EventHub;
use kegcore_events::{decode, Event, EventCodecError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::hooks::BridgeHooks;

async fn connect_and_listen(
    url: &str,
    channel: &str,
    hub: &EventHub,
    hooks: &dyn BridgeHooks,
    shutdown: &mut watch::Receiver<bool>,
) -> redis::RedisResult<()> {
    let client = redis::Client::open(url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    debug!(channel, "subscribed to broker channel");

    let mut stream = pubsub.on_message();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return Ok(()),
            msg = stream.next() => {
                let Some(msg) = msg else {
                    return Err((redis::ErrorKind::IoError, "broker stream closed").into());
                };
                let payload: String = msg.get_payload()?;
                dispatch_payload(&payload, hub, hooks);
            }
        }
    }
}

fn dispatch_payload(payload: &str, hub: &EventHub, hooks: &dyn BridgeHooks) {
    match decode(payload) {
        Ok(event) => {
            run_hooks(&event, hooks);
            hub.publish(event);
        }
        Err(EventCodecError::UnknownEvent(name)) => {
            debug!(event = %name, "ignoring event unknown to this build");
        }
        Err(EventCodecError::Malformed(e)) => {
            warn!(error = %e, "dropping malformed broker message");
        }
    }
}

fn run_hooks(event: &Event, hooks: &dyn BridgeHooks) {
    match event {
        Event::FlowUpdate(f) => hooks.on_flow_update(f),
        Event::DrinkCreatedEvent(d) => hooks.on_drink_created(d),
        Event::SetRelayOutputEvent(r) => hooks.on_relay_output(r),
        _ => {}
    }
}

/// Runs the inbound bridge until `shutdown` is signaled, reconnecting with
/// backoff on connection loss. A dropped connection is not fatal to the
/// process; only `shutdown` ends this loop.
pub async fn run_inbound(
    url: String,
    channel: String,
    hub: Arc<EventHub>,
    hooks: Arc<dyn BridgeHooks>,
    retry: RetryConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    loop {
        if *shutdown.borrow() {
            return;
        }
        match connect_and_listen(&url, &channel, &hub, hooks.as_ref(), &mut shutdown).await {
            Ok(()) => return,
            Err(e) => {
                attempt += 1;
                let delay = retry.delay_for_attempt(attempt.min(retry.max_retries_count()));
                warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "broker connection lost, reconnecting");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegcore_events::MeterUpdate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHooks {
        flow_updates: AtomicUsize,
    }

    impl BridgeHooks for CountingHooks {
        fn on_flow_update(&self, _event: &kegcore_events::FlowUpdate) {
            self.flow_updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn known_event_is_published() {
        let hub = EventHub::new();
        let hooks = CountingHooks {
            flow_updates: AtomicUsize::new(0),
        };
        let raw = kegcore_events::encode(&Event::MeterUpdate(MeterUpdate {
            meter_name: "m1".into(),
            reading: 5,
        }))
        .unwrap();
        dispatch_payload(&raw, &hub, &hooks);
        assert_eq!(hub.flush().await, 1);
    }

    #[tokio::test]
    async fn flow_update_runs_the_hook() {
        let hub = EventHub::new();
        let hooks = CountingHooks {
            flow_updates: AtomicUsize::new(0),
        };
        let raw = kegcore_events::encode(&Event::FlowUpdate(kegcore_events::FlowUpdate {
            flow_id: 1,
            meter_name: "m1".into(),
            state: kegcore_model::FlowState::Active,
            username: String::new(),
            start_time: 0,
            last_activity_time: 0,
            ticks: 0,
            volume_ml: None,
        }))
        .unwrap();
        dispatch_payload(&raw, &hub, &hooks);
        assert_eq!(hooks.flow_updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_event_name_is_dropped_silently() {
        let hub = EventHub::new();
        let hooks = CountingHooks {
            flow_updates: AtomicUsize::new(0),
        };
        dispatch_payload(r#"{"event": "FutureEvent", "data": {}}"#, &hub, &hooks);
        assert_eq!(hub.flush().await, 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_silently() {
        let hub = EventHub::new();
        let hooks = CountingHooks {
            flow_updates: AtomicUsize::new(0),
        };
        dispatch_payload("not json", &hub, &hooks);
        assert_eq!(hub.flush().await, 0);
    }
}
