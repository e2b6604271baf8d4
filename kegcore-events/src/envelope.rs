// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::Event;

const KNOWN_EVENT_NAMES: &[&str] = &[
    "Ping",
    "StartedEvent",
    "QuitEvent",
    "MeterUpdate",
    "FlowUpdate",
    "DrinkCreatedEvent",
    "TokenAuthEvent",
    "ThermoEvent",
    "FlowRequest",
    "ControllerConnectedEvent",
    "HeartbeatSecondEvent",
    "HeartbeatMinuteEvent",
    "SetRelayOutputEvent",
    "SyncEvent",
];

/// Failure modes decoding a wire envelope into an [`Event`].
///
/// Both variants are forward-compatibility situations from the broker
/// bridge's point of view: an unknown event name means a newer producer is
/// emitting something this process predates, and malformed JSON means a
/// peer sent garbage. Neither should ever propagate past the bridge; they
/// exist as distinct variants so callers can log them at the right level
/// and tests can assert on which one fired.
#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("unknown event type {0:?}")]
    UnknownEvent(String),
    #[error("malformed event envelope: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Encodes an event as the `{"event": ..., "data": ...}` wire envelope.
pub fn encode(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Decodes a wire envelope, distinguishing an unrecognized event name
/// (forward compatibility — ignore and move on) from a structurally
/// invalid envelope (also ignored, but worth a different log line).
pub fn decode(raw: &str) -> Result<Event, EventCodecError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(EventCodecError::Malformed)?;

    if let Some(tag) = value.get("event").and_then(serde_json::Value::as_str) {
        if !KNOWN_EVENT_NAMES.contains(&tag) {
            return Err(EventCodecError::UnknownEvent(tag.to_owned()));
        }
    }

    serde_json::from_value(value).map_err(EventCodecError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Empty, MeterUpdate};

    #[test]
    fn round_trips_a_populated_event() {
        let e = Event::MeterUpdate(MeterUpdate {
            meter_name: "m1".to_owned(),
            reading: 7,
        });
        let raw = encode(&e).unwrap();
        assert_eq!(decode(&raw).unwrap(), e);
    }

    #[test]
    fn round_trips_an_empty_payload_event() {
        let e = Event::HeartbeatMinuteEvent(Empty {});
        let raw = encode(&e).unwrap();
        assert_eq!(decode(&raw).unwrap(), e);
    }

    #[test]
    fn unknown_event_name_is_reported_distinctly() {
        let raw = r#"{"event": "SomeFutureEvent", "data": {"foo": 1}}"#;
        match decode(raw) {
            Err(EventCodecError::UnknownEvent(name)) => assert_eq!(name, "SomeFutureEvent"),
            other => panic!("expected UnknownEvent, got {other:?}"),
        }
    }

    #[test]
    fn garbage_json_is_malformed_not_unknown() {
        let raw = "not json at all";
        assert!(matches!(decode(raw), Err(EventCodecError::Malformed(_))));
    }

    #[test]
    fn missing_event_field_is_malformed() {
        let raw = r#"{"data": {}}"#;
        assert!(matches!(decode(raw), Err(EventCodecError::Malformed(_))));
    }
}
