// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bidirectional bridge between the in-process [`EventHub`] and an external
//! pub/sub channel (by default, a Redis channel named "kegnet").
//!
//! Inbound: subscribes to the channel, decodes each message as an event
//! envelope, and publishes successfully decoded events into the hub.
//! Unknown event names and malformed payloads are dropped and logged, never
//! treated as a fatal error — the upstream is expected to be
//! at-least-once and is allowed to be ahead of this build's event
//! vocabulary.
//!
//! Outbound: subscribes in the hub to the event kinds that must reach
//! external consumers and republishes them, encoded the same way, to the
//! channel.

mod hooks;
mod inbound;
mod outbound;

pub use hooks::{BridgeHooks, NoopHooks};
pub use inbound::run_inbound;
pub use outbound::OutboundBridge;

/// Event kinds the outbound side forwards to the external channel.
pub const OUTBOUND_KINDS: &[&str] = &[
    "MeterUpdate",
    "ThermoEvent",
    "TokenAuthEvent",
    "FlowUpdate",
    "DrinkCreatedEvent",
    "SetRelayOutputEvent",
    "ControllerConnectedEvent",
];
