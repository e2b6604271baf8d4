// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kegcore_backend::Backend;
use kegcore_bus::Subscriber;
use kegcore_events::{Event, ThermoEvent};
use kegcore_model::{defaults, Clock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct SensorState {
    /// The calendar-minute boundary (epoch seconds, truncated to a
    /// multiple of [`defaults::THERMO_RECORD_INTERVAL_SECS`]) the last
    /// accepted reading for this sensor fell in.
    last_recorded: u64,
}

/// Rate-limits thermometer readings before they reach the backend: at most
/// one recorded reading per sensor per calendar minute (readings are
/// compared by truncating to a [`defaults::THERMO_RECORD_INTERVAL_SECS`]
/// boundary, not by elapsed time since the last one), and readings outside
/// [`defaults::THERMO_SENSOR_RANGE`] are rejected outright rather than ever
/// posted.
pub struct ThermoManager {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    sensors: Mutex<HashMap<String, SensorState>>,
}

impl ThermoManager {
    pub fn new(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            sensors: Mutex::new(HashMap::new()),
        }
    }

    async fn handle_thermo_event(&self, event: &ThermoEvent) {
        let (min, max) = defaults::THERMO_SENSOR_RANGE;
        if event.sensor_value < min || event.sensor_value > max {
            warn!(sensor_name = %event.sensor_name, value = event.sensor_value, "reading out of range, rejecting");
            return;
        }

        let now = self.clock.now_epoch_secs();
        let now = now - now % defaults::THERMO_RECORD_INTERVAL_SECS;
        {
            let mut sensors = self.sensors.lock().await;
            if let Some(state) = sensors.get(&event.sensor_name) {
                if state.last_recorded == now {
                    return;
                }
            }
            sensors.insert(event.sensor_name.clone(), SensorState { last_recorded: now });
        }

        match self
            .backend
            .log_sensor_reading(&event.sensor_name, event.sensor_value, now)
            .await
        {
            Ok(()) => debug!(sensor_name = %event.sensor_name, "recorded sensor reading"),
            Err(e) => warn!(sensor_name = %event.sensor_name, error = %e, "failed to record sensor reading"),
        }
    }

    /// Forgets sensors not seen recently, so a reconnected sensor is not
    /// throttled by a stale last-recorded timestamp.
    pub async fn sweep_stale(&self) {
        let now = self.clock.now_epoch_secs();
        self.sensors.lock().await.retain(|sensor_name, state| {
            let fresh = now.saturating_sub(state.last_recorded) <= defaults::THERMO_MAX_AGE_SECS;
            if !fresh {
                warn!(sensor_name, "sensor went stale, forgetting");
            }
            fresh
        });
    }
}

#[async_trait]
impl Subscriber for ThermoManager {
    async fn handle(&self, event: &Event) {
        match event {
            Event::ThermoEvent(t) => self.handle_thermo_event(t).await,
            Event::HeartbeatMinuteEvent(_) => self.sweep_stale().await,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kegcore_backend::mock::MockBackend;
    use kegcore_model::MockClock;

    fn reading(sensor_name: &str, value: f64) -> ThermoEvent {
        ThermoEvent {
            sensor_name: sensor_name.to_owned(),
            sensor_value: value,
        }
    }

    #[tokio::test]
    async fn in_range_reading_is_recorded() {
        let backend = Arc::new(MockBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let mgr = ThermoManager::new(backend, clock);
        mgr.handle_thermo_event(&reading("fridge", 3.5)).await;
        assert_eq!(mgr.sensors.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_reading_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let mgr = ThermoManager::new(backend, clock);
        mgr.handle_thermo_event(&reading("fridge", 200.0)).await;
        assert!(mgr.sensors.lock().await.is_empty());
    }

    #[tokio::test]
    async fn second_reading_within_interval_is_rate_limited() {
        let backend = Arc::new(MockBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let mgr = ThermoManager::new(backend, clock.clone());

        mgr.handle_thermo_event(&reading("fridge", 3.0)).await;
        let recorded_at = mgr.sensors.lock().await.get("fridge").unwrap().last_recorded;

        clock.set(10);
        mgr.handle_thermo_event(&reading("fridge", 4.0)).await;
        assert_eq!(
            mgr.sensors.lock().await.get("fridge").unwrap().last_recorded,
            recorded_at
        );
    }

    #[tokio::test]
    async fn cross_minute_boundary_reading_is_allowed() {
        let backend = Arc::new(MockBackend::new());
        let clock = Arc::new(MockClock::new(58));
        let mgr = ThermoManager::new(backend, clock.clone());

        mgr.handle_thermo_event(&reading("fridge", 3.0)).await;
        let first_minute = mgr.sensors.lock().await.get("fridge").unwrap().last_recorded;

        // Only 3 seconds later, but across a calendar-minute boundary, so
        // this reading is not rate-limited.
        clock.set(61);
        mgr.handle_thermo_event(&reading("fridge", 4.0)).await;
        let second_minute = mgr.sensors.lock().await.get("fridge").unwrap().last_recorded;
        assert_ne!(second_minute, first_minute);
    }

    #[tokio::test]
    async fn stale_sensor_is_forgotten_on_sweep() {
        let backend = Arc::new(MockBackend::new());
        let clock = Arc::new(MockClock::new(0));
        let mgr = ThermoManager::new(backend, clock.clone());

        mgr.handle_thermo_event(&reading("fridge", 3.0)).await;
        clock.set(200);
        mgr.sweep_stale().await;
        assert!(mgr.sensors.lock().await.is_empty());
    }
}
