// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Background workers that pace the core: a heartbeat, a backend status
//! poller, and a watchdog that ends the process if a supervised worker
//! dies unexpectedly.

mod heartbeat;
mod sync;
mod watchdog;
mod worker;

pub use heartbeat::HeartbeatWorker;
pub use sync::SyncWorker;
pub use watchdog::{SupervisedWorker, WatchdogWorker};
pub use worker::{drive, Worker};
