// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! The five coordination managers that turn raw device events into flows,
//! drinks, and backend state: tap registry, flow state machine,
//! authentication, drink posting, and thermometer rate limiting.
//!
//! Each manager implements [`kegcore_bus::Subscriber`] and is registered
//! against the event kinds it cares about by the process that wires the
//! core together; managers never subscribe themselves.

mod authentication_manager;
mod drink_manager;
mod flow_manager;
mod tap_manager;
mod thermo_manager;

pub use authentication_manager::AuthenticationManager;
pub use drink_manager::DrinkManager;
pub use flow_manager::FlowManager;
pub use tap_manager::TapManager;
pub use thermo_manager::ThermoManager;
