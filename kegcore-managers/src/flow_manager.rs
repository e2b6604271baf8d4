// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kegcore_bus::{EventHub, Subscriber};
use kegcore_events::{Event, FlowRequestAction, FlowUpdate, RelayMode, SetRelayOutputEvent};
use kegcore_model::{defaults, Clock, Flow, FlowMeter, FlowState, Tap};
use tracing::debug;

use crate::tap_manager::TapManager;

struct Inner {
    meters: HashMap<String, FlowMeter>,
    flows: HashMap<String, Flow>,
    next_flow_id: u64,
}

/// Owns the flow state machine: starting, updating, and stopping flows,
/// and sweeping idle ones to completion on each heartbeat.
///
/// `flows` holds at most one entry per meter, and only while that flow is
/// `Active` or `Idle`; a flow is removed from the map in the same step
/// that transitions it to `Completed`.
pub struct FlowManager {
    hub: Arc<EventHub>,
    taps: Arc<TapManager>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl FlowManager {
    pub fn new(hub: Arc<EventHub>, taps: Arc<TapManager>, clock: Arc<dyn Clock>) -> Self {
        let seed = clock.now_epoch_secs();
        Self {
            hub,
            taps,
            clock,
            inner: Mutex::new(Inner {
                meters: HashMap::new(),
                flows: HashMap::new(),
                next_flow_id: seed,
            }),
        }
    }

    pub async fn get_flow(&self, meter_name: &str) -> Option<Flow> {
        self.inner.lock().unwrap().flows.get(meter_name).cloned()
    }

    pub async fn get_active_flows(&self) -> Vec<Flow> {
        self.inner.lock().unwrap().flows.values().cloned().collect()
    }

    pub async fn start_flow(
        &self,
        meter_name: &str,
        username: &str,
        max_idle_secs: u64,
    ) -> (Flow, bool) {
        let taps = self.taps.snapshot().await;
        let when = self.clock.now_epoch_secs();
        let (flow, is_new, events) = {
            let mut inner = self.inner.lock().unwrap();
            start_flow_locked(&mut inner, &taps, meter_name, username, max_idle_secs, when)
        };
        for event in events {
            self.hub.publish(event);
        }
        (flow, is_new)
    }

    pub async fn stop_flow(&self, meter_name: &str) -> Option<Flow> {
        let taps = self.taps.snapshot().await;
        let (flow, events) = {
            let mut inner = self.inner.lock().unwrap();
            stop_flow_locked(&mut inner, &taps, meter_name)
        };
        for event in events {
            self.hub.publish(event);
        }
        flow
    }

    pub async fn update_flow(&self, meter_name: &str, reading: u64, when: u64) -> (Flow, bool) {
        let taps = self.taps.snapshot().await;
        let (flow, is_new, events) = {
            let mut inner = self.inner.lock().unwrap();
            update_flow_locked(&mut inner, &taps, meter_name, reading, when)
        };
        for event in events {
            self.hub.publish(event);
        }
        (flow, is_new)
    }

    /// Runs the idle sweep: any active flow idle past its `max_idle_secs`
    /// transitions ACTIVE -> IDLE -> COMPLETED within this one call; every
    /// other flow with a bound user gets its relay output re-asserted.
    pub async fn sweep_idle(&self) {
        let now = self.clock.now_epoch_secs();
        let meter_names: Vec<String> = {
            let inner = self.inner.lock().unwrap();
            inner.flows.keys().cloned().collect()
        };
        for meter_name in meter_names {
            let flow = {
                let inner = self.inner.lock().unwrap();
                inner.flows.get(&meter_name).cloned()
            };
            let Some(flow) = flow else { continue };
            if flow.is_idle(now) {
                let mut idle_flow = flow.clone();
                idle_flow.state = FlowState::Idle;
                self.hub.publish(flow_update_event(&idle_flow));
                self.stop_flow(&meter_name).await;
            } else if flow.has_username() {
                if let Some(Some(relay)) =
                    self.taps.get_tap(&meter_name).await.map(|t| t.relay_name)
                {
                    self.hub
                        .publish(Event::SetRelayOutputEvent(SetRelayOutputEvent {
                            output_name: relay,
                            output_mode: RelayMode::Enabled,
                        }));
                }
            }
        }
    }
}

fn flow_update_event(flow: &Flow) -> Event {
    Event::FlowUpdate(FlowUpdate {
        flow_id: flow.flow_id,
        meter_name: flow.meter_name.clone(),
        state: flow.state,
        username: flow.bound_username.clone().unwrap_or_default(),
        start_time: flow.start_time,
        last_activity_time: flow.last_activity_time,
        ticks: flow.total_ticks,
        volume_ml: flow.volume_ml,
    })
}

fn relay_event(taps: &HashMap<String, Tap>, meter_name: &str, mode: RelayMode) -> Option<Event> {
    let relay = taps.get(meter_name)?.relay_name.clone()?;
    Some(Event::SetRelayOutputEvent(SetRelayOutputEvent {
        output_name: relay,
        output_mode: mode,
    }))
}

fn start_flow_locked(
    inner: &mut Inner,
    taps: &HashMap<String, Tap>,
    meter_name: &str,
    username: &str,
    max_idle_secs: u64,
    when: u64,
) -> (Flow, bool, Vec<Event>) {
    let mut events = Vec::new();
    if let Some(existing) = inner.flows.get(meter_name).cloned() {
        let existing_user = existing.bound_username.clone().unwrap_or_default();
        if existing_user == username {
            return (existing, false, events);
        }
        if existing_user.is_empty() && !username.is_empty() {
            let mut updated = existing;
            updated.bound_username = Some(username.to_owned());
            inner.flows.insert(meter_name.to_owned(), updated.clone());
            events.push(flow_update_event(&updated));
            return (updated, false, events);
        }
        // Different, non-empty username: end the old flow before starting
        // the new one.
        let (_, mut stop_events) = stop_flow_locked(inner, taps, meter_name);
        events.append(&mut stop_events);
    }

    inner.next_flow_id += 1;
    let flow_id = inner.next_flow_id;
    let bound_username = if username.is_empty() {
        None
    } else {
        Some(username.to_owned())
    };
    let flow = Flow::new(flow_id, meter_name, bound_username, max_idle_secs, when);
    inner.flows.insert(meter_name.to_owned(), flow.clone());
    events.push(flow_update_event(&flow));
    if flow.has_username() {
        if let Some(event) = relay_event(taps, meter_name, RelayMode::Enabled) {
            events.push(event);
        }
    }
    (flow, true, events)
}

fn stop_flow_locked(
    inner: &mut Inner,
    taps: &HashMap<String, Tap>,
    meter_name: &str,
) -> (Option<Flow>, Vec<Event>) {
    let mut events = Vec::new();
    let Some(mut flow) = inner.flows.remove(meter_name) else {
        return (None, events);
    };
    if let Some(event) = relay_event(taps, meter_name, RelayMode::Disabled) {
        events.push(event);
    }
    flow.state = FlowState::Completed;
    events.push(flow_update_event(&flow));
    (Some(flow), events)
}

fn update_flow_locked(
    inner: &mut Inner,
    taps: &HashMap<String, Tap>,
    meter_name: &str,
    reading: u64,
    when: u64,
) -> (Flow, bool, Vec<Event>) {
    let delta = inner
        .meters
        .entry(meter_name.to_owned())
        .or_insert_with(|| {
            debug!(meter_name, "registering flow meter");
            FlowMeter::new(meter_name, defaults::DEFAULT_MAX_METER_DELTA)
        })
        .set_ticks(reading);

    let (mut flow, is_new, mut events) = if inner.flows.contains_key(meter_name) {
        (
            inner.flows.get(meter_name).cloned().expect("just checked"),
            false,
            Vec::new(),
        )
    } else {
        start_flow_locked(
            inner,
            taps,
            meter_name,
            "",
            defaults::DEFAULT_MAX_IDLE_SECS,
            when,
        )
    };

    flow.add_ticks(delta, when, taps.get(meter_name));
    inner.flows.insert(meter_name.to_owned(), flow.clone());
    events.push(flow_update_event(&flow));
    (flow, is_new, events)
}

#[async_trait]
impl Subscriber for FlowManager {
    async fn handle(&self, event: &Event) {
        match event {
            Event::MeterUpdate(m) => {
                let when = self.clock.now_epoch_secs();
                self.update_flow(&m.meter_name, m.reading, when).await;
            }
            Event::HeartbeatSecondEvent(_) => self.sweep_idle().await,
            Event::FlowRequest(r) => match r.request {
                FlowRequestAction::StartFlow => {
                    self.start_flow(&r.meter_name, "", defaults::DEFAULT_MAX_IDLE_SECS)
                        .await;
                }
                FlowRequestAction::StopFlow => {
                    self.stop_flow(&r.meter_name).await;
                }
                FlowRequestAction::ReportStatus => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegcore_backend::mock::MockBackend;
    use kegcore_model::MockClock;

    fn make_manager(clock: Arc<MockClock>) -> (Arc<FlowManager>, Arc<EventHub>, Arc<TapManager>) {
        let hub = Arc::new(EventHub::new());
        let taps = Arc::new(TapManager::new(Arc::new(MockBackend::new())));
        let mgr = Arc::new(FlowManager::new(hub.clone(), taps.clone(), clock));
        (mgr, hub, taps)
    }

    #[tokio::test]
    async fn anonymous_takeover_keeps_flow_id_and_adopts_username() {
        let clock = Arc::new(MockClock::new(1000));
        let (mgr, _hub, _taps) = make_manager(clock);

        let (first, is_new) = mgr.start_flow("m1", "", 10).await;
        assert!(is_new);

        let (second, is_new) = mgr.start_flow("m1", "alice", 10).await;
        assert!(!is_new);
        assert_eq!(second.flow_id, first.flow_id);
        assert_eq!(second.bound_username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn different_user_replaces_existing_flow() {
        let clock = Arc::new(MockClock::new(1000));
        let (mgr, _hub, _taps) = make_manager(clock);

        let (first, _) = mgr.start_flow("m1", "alice", 10).await;
        let (second, is_new) = mgr.start_flow("m1", "bob", 10).await;
        assert!(is_new);
        assert_ne!(second.flow_id, first.flow_id);
        assert_eq!(second.bound_username.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn update_flow_implicitly_starts_anonymous_flow() {
        let clock = Arc::new(MockClock::new(1000));
        let (mgr, _hub, taps) = make_manager(clock);
        taps.register_or_replace(kegcore_model::Tap::new("m1", 2.0, None))
            .await;

        let (flow, is_new) = mgr.update_flow("m1", 100, 1000).await;
        assert!(is_new);
        assert_eq!(flow.total_ticks, 0); // first reading establishes baseline

        let (flow, is_new) = mgr.update_flow("m1", 150, 1001).await;
        assert!(!is_new);
        assert_eq!(flow.total_ticks, 50);
        assert_eq!(flow.volume_ml, Some(100.0));
    }

    #[tokio::test]
    async fn idle_sweep_transitions_active_to_completed() {
        let clock = Arc::new(MockClock::new(0));
        let (mgr, _hub, _taps) = make_manager(clock.clone());

        mgr.start_flow("m1", "alice", 20).await;
        mgr.update_flow("m1", 100, 0).await;
        clock.set(21);

        mgr.sweep_idle().await;
        assert!(mgr.get_flow("m1").await.is_none());
    }

    #[tokio::test]
    async fn at_most_one_active_flow_per_meter() {
        let clock = Arc::new(MockClock::new(0));
        let (mgr, _hub, _taps) = make_manager(clock);
        mgr.start_flow("m1", "alice", 10).await;
        mgr.start_flow("m1", "alice", 10).await;
        assert_eq!(mgr.get_active_flows().await.len(), 1);
    }
}
