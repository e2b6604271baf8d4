// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! The event vocabulary exchanged on the in-process bus and, encoded as a
//! JSON envelope, on the external broker channel.
//!
//! Every event the core can publish or receive is a variant of [`Event`].
//! This replaces the source system's dynamic attribute injection on event
//! objects with a fixed, serde-driven schema: each variant carries exactly
//! the fields listed for it, validated at decode time rather than
//! discovered at runtime.

mod envelope;

pub use envelope::{decode, encode, EventCodecError};

use kegcore_model::FlowState;
use serde::{Deserialize, Serialize};

/// An empty event payload, used for events that carry no fields. Encodes
/// as `{}` rather than `null` so the envelope's `data` field is always a
/// JSON object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEventStatus {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRequestAction {
    StartFlow,
    StopFlow,
    ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterUpdate {
    pub meter_name: String,
    pub reading: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoEvent {
    pub sensor_name: String,
    pub sensor_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAuthEvent {
    pub meter_name: String,
    pub auth_device_name: String,
    pub token_value: String,
    pub status: TokenEventStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    pub meter_name: String,
    pub request: FlowRequestAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConnectedEvent {
    pub controller_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowUpdate {
    pub flow_id: u64,
    pub meter_name: String,
    pub state: FlowState,
    /// Empty string for an anonymous flow, never absent.
    pub username: String,
    pub start_time: u64,
    pub last_activity_time: u64,
    pub ticks: u64,
    pub volume_ml: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrinkCreatedEvent {
    pub flow_id: u64,
    pub drink_id: u64,
    pub meter_name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRelayOutputEvent {
    pub output_name: String,
    pub output_mode: RelayMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Opaque backend status payload; known to carry a `taps` array that
    /// `TapManager` consumes, but otherwise treated as unstructured.
    pub data: serde_json::Value,
}

/// The full event vocabulary. Each variant name is exactly the `event`
/// field of the wire envelope; each variant's payload is exactly the
/// `data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    Ping(Empty),
    StartedEvent(Empty),
    QuitEvent(Empty),
    MeterUpdate(MeterUpdate),
    FlowUpdate(FlowUpdate),
    DrinkCreatedEvent(DrinkCreatedEvent),
    TokenAuthEvent(TokenAuthEvent),
    ThermoEvent(ThermoEvent),
    FlowRequest(FlowRequest),
    ControllerConnectedEvent(ControllerConnectedEvent),
    HeartbeatSecondEvent(Empty),
    HeartbeatMinuteEvent(Empty),
    SetRelayOutputEvent(SetRelayOutputEvent),
    SyncEvent(SyncEvent),
}

impl Event {
    /// The variant name as it appears in the `event` field of the wire
    /// envelope, and the key the bus indexes subscriptions by.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ping(_) => "Ping",
            Event::StartedEvent(_) => "StartedEvent",
            Event::QuitEvent(_) => "QuitEvent",
            Event::MeterUpdate(_) => "MeterUpdate",
            Event::FlowUpdate(_) => "FlowUpdate",
            Event::DrinkCreatedEvent(_) => "DrinkCreatedEvent",
            Event::TokenAuthEvent(_) => "TokenAuthEvent",
            Event::ThermoEvent(_) => "ThermoEvent",
            Event::FlowRequest(_) => "FlowRequest",
            Event::ControllerConnectedEvent(_) => "ControllerConnectedEvent",
            Event::HeartbeatSecondEvent(_) => "HeartbeatSecondEvent",
            Event::HeartbeatMinuteEvent(_) => "HeartbeatMinuteEvent",
            Event::SetRelayOutputEvent(_) => "SetRelayOutputEvent",
            Event::SyncEvent(_) => "SyncEvent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_envelope_tag() {
        let e = Event::MeterUpdate(MeterUpdate {
            meter_name: "m1".to_owned(),
            reading: 42,
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "MeterUpdate");
        assert_eq!(e.kind(), "MeterUpdate");
    }

    #[test]
    fn empty_payload_events_encode_as_empty_object() {
        let e = Event::HeartbeatSecondEvent(Empty {});
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["data"], serde_json::json!({}));
    }
}
