// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios wiring the real managers to a shared event bus,
//! mirroring how `main` assembles them but with a mock backend and a mock
//! clock standing in for the network and real time.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kegcore_backend::mock::MockBackend;
use kegcore_backend::{AuthTokenInfo, BackendError};
use kegcore_bus::{EventHub, Subscriber};
use kegcore_events::{Event, RelayMode, TokenAuthEvent, TokenEventStatus};
use kegcore_managers::{AuthenticationManager, DrinkManager, FlowManager, TapManager, ThermoManager};
use kegcore_model::{defaults, FlowState, MockClock, Tap};

/// Records every event of a kind it's registered for, for assertions.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn taken(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl Subscriber for Recorder {
    async fn handle(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    hub: Arc<EventHub>,
    clock: Arc<MockClock>,
    taps: Arc<TapManager>,
    flows: Arc<FlowManager>,
    backend: Arc<MockBackend>,
    recorder: Arc<Recorder>,
}

async fn build(start_secs: u64) -> Harness {
    let hub = Arc::new(EventHub::new());
    let clock = Arc::new(MockClock::new(start_secs));
    let backend = Arc::new(MockBackend::new());

    let taps = Arc::new(TapManager::new(backend.clone()));
    let flows = Arc::new(FlowManager::new(
        hub.clone(),
        taps.clone(),
        clock.clone() as Arc<dyn kegcore_model::Clock>,
    ));
    let auth = Arc::new(AuthenticationManager::new(backend.clone(), flows.clone(), taps.clone()));
    let drinks = Arc::new(DrinkManager::new(backend.clone(), hub.clone()));
    let thermo = Arc::new(ThermoManager::new(
        backend.clone(),
        clock.clone() as Arc<dyn kegcore_model::Clock>,
    ));

    hub.subscribe("MeterUpdate", flows.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatSecondEvent", flows.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("FlowRequest", flows.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("TokenAuthEvent", auth.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("FlowUpdate", drinks.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatMinuteEvent", drinks.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("TokenAuthEvent", drinks.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("ThermoEvent", thermo.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatMinuteEvent", thermo.clone() as Arc<dyn Subscriber>).await;

    let recorder = Arc::new(Recorder::default());
    hub.subscribe("FlowUpdate", recorder.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("SetRelayOutputEvent", recorder.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("DrinkCreatedEvent", recorder.clone() as Arc<dyn Subscriber>).await;

    Harness {
        hub,
        clock,
        taps,
        flows,
        backend,
        recorder,
    }
}

fn relay_events(events: &[Event]) -> Vec<RelayMode> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::SetRelayOutputEvent(r) => Some(r.output_mode),
            _ => None,
        })
        .collect()
}

fn flow_states(events: &[Event]) -> Vec<FlowState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::FlowUpdate(f) => Some(f.state),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn anonymous_takeover_keeps_flow_id_and_emits_one_update() {
    let h = build(1000).await;

    let (first, is_new) = h.flows.start_flow("m1", "", 10).await;
    assert!(is_new);
    h.hub.flush().await;
    h.recorder.taken();

    let (second, is_new) = h.flows.start_flow("m1", "alice", 10).await;
    assert!(!is_new);
    assert_eq!(second.flow_id, first.flow_id);

    h.hub.flush().await;
    let updates = h.recorder.taken();
    let flow_updates: Vec<_> = updates
        .iter()
        .filter(|e| matches!(e, Event::FlowUpdate(_)))
        .collect();
    assert_eq!(flow_updates.len(), 1);
    match flow_updates[0] {
        Event::FlowUpdate(f) => {
            assert_eq!(f.username, "alice");
            assert_eq!(f.flow_id, first.flow_id);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn captive_device_added_then_removed_toggles_relay_and_completes_flow() {
    let h = build(0).await;
    h.taps
        .register_or_replace(Tap::new("m", 1.0, Some("relay".to_owned())))
        .await;
    h.backend.add_token(
        defaults::AUTH_DEVICE_ONEWIRE,
        "tok",
        AuthTokenInfo {
            enabled: true,
            username: Some("bob".to_owned()),
        },
    );

    h.hub.publish(Event::TokenAuthEvent(TokenAuthEvent {
        meter_name: "m".to_owned(),
        auth_device_name: defaults::AUTH_DEVICE_ONEWIRE.to_owned(),
        token_value: "tok".to_owned(),
        status: TokenEventStatus::Added,
    }));
    h.hub.flush().await;

    let added = h.recorder.taken();
    assert_eq!(relay_events(&added), vec![RelayMode::Enabled]);
    assert_eq!(flow_states(&added), vec![FlowState::Active]);

    h.hub.publish(Event::TokenAuthEvent(TokenAuthEvent {
        meter_name: "m".to_owned(),
        auth_device_name: defaults::AUTH_DEVICE_ONEWIRE.to_owned(),
        token_value: "tok".to_owned(),
        status: TokenEventStatus::Removed,
    }));
    h.hub.flush().await;

    let removed = h.recorder.taken();
    assert_eq!(relay_events(&removed), vec![RelayMode::Disabled]);
    assert_eq!(flow_states(&removed), vec![FlowState::Completed]);
    assert!(h.flows.get_flow("m").await.is_none());
}

#[tokio::test]
async fn noncaptive_idle_timeout_sweeps_through_to_completion() {
    let h = build(0).await;
    h.taps
        .register_or_replace(Tap::new("m", 1.0, Some("relay".to_owned())))
        .await;
    h.backend.add_token(
        defaults::AUTH_DEVICE_RFID,
        "tok",
        AuthTokenInfo {
            enabled: true,
            username: Some("bob".to_owned()),
        },
    );

    h.hub.publish(Event::TokenAuthEvent(TokenAuthEvent {
        meter_name: "m".to_owned(),
        auth_device_name: defaults::AUTH_DEVICE_RFID.to_owned(),
        token_value: "tok".to_owned(),
        status: TokenEventStatus::Added,
    }));
    h.hub.flush().await;
    h.recorder.taken();

    h.flows.update_flow("m", 100, 0).await;
    h.hub.flush().await;
    h.recorder.taken();

    h.clock.set(21);
    h.flows.sweep_idle().await;
    h.hub.flush().await;

    let swept = h.recorder.taken();
    assert_eq!(flow_states(&swept), vec![FlowState::Idle, FlowState::Completed]);
    assert_eq!(relay_events(&swept), vec![RelayMode::Disabled]);
}

#[tokio::test]
async fn drink_retry_posts_exactly_once_after_a_transient_failure() {
    let h = build(0).await;
    h.backend.fail_next_record_drink(BackendError::Transient("connection reset".to_owned()));

    h.hub.publish(Event::FlowUpdate(kegcore_events::FlowUpdate {
        flow_id: 1,
        meter_name: "m".to_owned(),
        state: FlowState::Completed,
        username: "bob".to_owned(),
        start_time: 0,
        last_activity_time: 10,
        ticks: 500,
        volume_ml: Some(50.0),
    }));
    h.hub.flush().await;
    assert!(h.backend.recorded_drinks().is_empty());
    h.recorder.taken();

    h.hub.publish(Event::HeartbeatMinuteEvent(kegcore_events::Empty {}));
    h.hub.flush().await;

    assert_eq!(h.backend.recorded_drinks().len(), 1);
    let created = h.recorder.taken();
    let drink_events: Vec<_> = created
        .iter()
        .filter(|e| matches!(e, Event::DrinkCreatedEvent(_)))
        .collect();
    assert_eq!(drink_events.len(), 1);
}
