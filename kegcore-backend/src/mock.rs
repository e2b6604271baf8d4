// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! An in-memory fake [`Backend`](crate::Backend), for driving manager tests
//! without a live HTTP server.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{AuthTokenInfo, ControllerInfo, DrinkRecord, DrinkRequest, Status, TapDescriptor};
use crate::Backend;

#[derive(Default)]
struct State {
    status: Status,
    tokens: std::collections::HashMap<(String, String), AuthTokenInfo>,
    recorded_drinks: Vec<DrinkRequest>,
    next_drink_id: u64,
    fail_record_drink: Option<BackendError>,
    not_found_meters: std::collections::HashSet<String>,
}

/// A fake backend whose behavior is entirely controlled by the test that
/// constructs it: canned token lookups, an optional injected failure for
/// the next `record_drink` call, and a record of every drink actually
/// posted.
pub struct MockBackend {
    state: Mutex<State>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn set_taps(&self, taps: Vec<TapDescriptor>) {
        self.state.lock().unwrap().status.taps = taps;
    }

    pub fn set_current_session(&self, active: bool) {
        self.state.lock().unwrap().status.current_session = active;
    }

    pub fn add_token(&self, auth_device: &str, token_value: &str, info: AuthTokenInfo) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert((auth_device.to_owned(), token_value.to_owned()), info);
    }

    pub fn mark_meter_not_found(&self, meter_name: &str) {
        self.state
            .lock()
            .unwrap()
            .not_found_meters
            .insert(meter_name.to_owned());
    }

    /// The next call to `record_drink` fails with `err` instead of
    /// succeeding; the call after that succeeds normally.
    pub fn fail_next_record_drink(&self, err: BackendError) {
        self.state.lock().unwrap().fail_record_drink = Some(err);
    }

    pub fn recorded_drinks(&self) -> Vec<DrinkRequest> {
        self.state.lock().unwrap().recorded_drinks.clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_status(&self) -> Result<Status, BackendError> {
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn get_all_taps(&self) -> Result<Vec<TapDescriptor>, BackendError> {
        Ok(self.state.lock().unwrap().status.taps.clone())
    }

    async fn record_drink(&self, request: DrinkRequest) -> Result<DrinkRecord, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.not_found_meters.contains(&request.meter_name) {
            return Err(BackendError::NotFound {
                what: format!("meter {}", request.meter_name),
            });
        }
        if let Some(err) = state.fail_record_drink.take() {
            return Err(err);
        }
        state.next_drink_id += 1;
        let drink_id = state.next_drink_id;
        state.recorded_drinks.push(request);
        Ok(DrinkRecord { drink_id })
    }

    async fn cancel_drink(&self, _drink_id: u64, _spilled: bool) -> Result<(), BackendError> {
        Ok(())
    }

    async fn log_sensor_reading(
        &self,
        _sensor_name: &str,
        _temperature_c: f64,
        _when: u64,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
    ) -> Result<AuthTokenInfo, BackendError> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&(auth_device.to_owned(), token_value.to_owned()))
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                what: format!("token {token_value} on {auth_device}"),
            })
    }

    async fn create_controller(&self, controller_name: &str) -> Result<ControllerInfo, BackendError> {
        Ok(ControllerInfo {
            id: controller_name.to_owned(),
            name: controller_name.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_drink_respects_injected_failure_once() {
        let backend = MockBackend::new();
        backend.fail_next_record_drink(BackendError::Transient("boom".into()));
        let req = DrinkRequest {
            meter_name: "m1".into(),
            ticks: 100,
            volume_ml: Some(50.0),
            username: None,
            pour_time: 0,
            duration_secs: 0,
            auth_token: None,
            spilled: false,
        };
        assert!(backend.record_drink(req.clone()).await.is_err());
        assert!(backend.record_drink(req).await.is_ok());
        assert_eq!(backend.recorded_drinks().len(), 1);
    }
}
