// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Status of a [`TokenRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Removed,
}

/// An authentication token currently (or formerly) presented at a meter.
///
/// At most one `Active` record exists per meter at a time; `Authentication
/// Manager` enforces that by replacing or removing the existing record
/// before installing a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub auth_device: String,
    pub token_value: String,
    pub meter_name: String,
    pub status: TokenStatus,
}

impl TokenRecord {
    pub fn new(
        auth_device: impl Into<String>,
        token_value: impl Into<String>,
        meter_name: impl Into<String>,
    ) -> Self {
        Self {
            auth_device: auth_device.into(),
            token_value: token_value.into(),
            meter_name: meter_name.into(),
            status: TokenStatus::Active,
        }
    }

    /// Two records identify the same physical token presentation if device,
    /// token value, and meter all match, regardless of status.
    pub fn same_presentation(&self, other: &TokenRecord) -> bool {
        self.auth_device == other.auth_device
            && self.token_value == other.token_value
            && self.meter_name == other.meter_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_presentation_ignores_status() {
        let mut a = TokenRecord::new("core.rfid", "tok1", "m1");
        let b = a.clone();
        a.status = TokenStatus::Removed;
        assert!(a.same_presentation(&b));
    }

    #[test]
    fn different_token_value_is_not_same_presentation() {
        let a = TokenRecord::new("core.rfid", "tok1", "m1");
        let b = TokenRecord::new("core.rfid", "tok2", "m1");
        assert!(!a.same_presentation(&b));
    }
}
