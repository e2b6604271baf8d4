// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use kegcore_events::{DrinkCreatedEvent, FlowUpdate, SetRelayOutputEvent};

/// Override point for the three event categories that historically carried
/// bespoke side effects when received off the external channel (e.g. a UI
/// push). The default bridge wires up [`NoopHooks`], which does nothing
/// beyond what the generic decode-then-publish path already does; a
/// deployment that needs side-channel behavior implements this trait
/// instead.
pub trait BridgeHooks: Send + Sync {
    fn on_flow_update(&self, _event: &FlowUpdate) {}
    fn on_drink_created(&self, _event: &DrinkCreatedEvent) {}
    fn on_relay_output(&self, _event: &SetRelayOutputEvent) {}
}

/// The hook set every event is still published into the hub with even when
/// not overridden; exists purely to give this trait a default.
pub struct NoopHooks;

impl BridgeHooks for NoopHooks {}
