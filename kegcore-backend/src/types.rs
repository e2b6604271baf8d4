// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A tap descriptor as reported by the backend's periodic status sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapDescriptor {
    pub meter_name: String,
    pub ml_per_tick: f64,
    pub relay_name: Option<String>,
}

/// The opaque status payload, narrowed to the one field the core actually
/// reads: the tap list. Everything else in the backend's status response
/// passes through as `SyncEvent`'s opaque `data` field unexamined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub taps: Vec<TapDescriptor>,
    #[serde(default)]
    pub current_session: bool,
}

/// Request to record a completed flow as a drink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinkRequest {
    pub meter_name: String,
    pub ticks: u64,
    pub volume_ml: Option<f64>,
    pub username: Option<String>,
    pub pour_time: u64,
    pub duration_secs: u64,
    pub auth_token: Option<String>,
    pub spilled: bool,
}

/// The backend's response to a successful drink post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrinkRecord {
    pub drink_id: u64,
}

/// The result of an auth token lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenInfo {
    pub enabled: bool,
    pub username: Option<String>,
}

/// The backend's response to controller creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub id: String,
    pub name: String,
}
