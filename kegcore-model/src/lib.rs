// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core value types shared by every manager in the coordination core: taps,
//! flow meters, flows, and authentication token records.
//!
//! Nothing in this crate talks to the event bus, the backend, or the broker;
//! it only models the shapes those layers operate on. Timestamps throughout
//! are epoch seconds (`u64`), matching the wire encoding used by the broker
//! bridge, so the managers that own these types can be driven by an
//! injectable clock in tests instead of real time.

pub mod clock;
pub mod defaults;
pub mod flow;
pub mod flow_meter;
pub mod tap;
pub mod token;

pub use clock::{Clock, MockClock, SystemClock};
pub use flow::{Flow, FlowState};
pub use flow_meter::FlowMeter;
pub use tap::Tap;
pub use token::{TokenRecord, TokenStatus};
