// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! A typed client for the remote backend API: status sync, tap listing,
//! drink recording, sensor logging, auth token lookup, and controller
//! provisioning.
//!
//! The `Backend` trait is the seam every manager that needs the network
//! goes through; nothing above this crate touches `reqwest` directly. Tests
//! exercise managers against [`mock::MockBackend`], an in-memory fake,
//! rather than a live HTTP server.

mod error;
mod http;
pub mod mock;
mod retry;
mod types;

pub use error::BackendError;
pub use retry::RetryConfig;
pub use types::{AuthTokenInfo, ControllerInfo, DrinkRecord, DrinkRequest, Status, TapDescriptor};

use async_trait::async_trait;

pub use http::{HttpBackend, HttpBackendConfig};

/// The backend operations this core consumes. `WebBackend` in the source
/// system wrapped a bespoke API client; here the same seam is a trait so
/// tests can substitute [`mock::MockBackend`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_status(&self) -> Result<Status, BackendError>;

    async fn get_all_taps(&self) -> Result<Vec<TapDescriptor>, BackendError>;

    async fn record_drink(&self, request: DrinkRequest) -> Result<DrinkRecord, BackendError>;

    async fn cancel_drink(&self, drink_id: u64, spilled: bool) -> Result<(), BackendError>;

    /// Range-checking happens before this is ever called; implementations
    /// may still encounter a not-found sensor (no such meter on the
    /// backend) or a transient network error, both of which are swallowed
    /// by `ThermoManager`.
    async fn log_sensor_reading(
        &self,
        sensor_name: &str,
        temperature_c: f64,
        when: u64,
    ) -> Result<(), BackendError>;

    /// A network failure here is treated by the caller identically to an
    /// unassigned token: both fall through to "ignore, do not start a
    /// flow." This method still returns `BackendError::Transient` on
    /// network failure rather than silently translating it to not-found,
    /// so tests and logs can tell the two apart; the translation happens
    /// at the call site in `AuthenticationManager`.
    async fn get_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
    ) -> Result<AuthTokenInfo, BackendError>;

    /// On success, the backend also provisions two default flow meters
    /// for the controller (conventionally named `flow0` and `flow1`); a
    /// later status sync reports them like any other tap.
    async fn create_controller(&self, controller_name: &str) -> Result<ControllerInfo, BackendError>;
}
