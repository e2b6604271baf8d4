// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven process configuration, mirroring the
//! env-var-plus-builder pattern this codebase uses for its own sidecar
//! config, adapted to this system's own variable prefix.

use std::time::Duration;

use thiserror::Error;

const ENV_BROKER_URL: &str = "KEGCORE_BROKER_URL";
const ENV_BROKER_CHANNEL: &str = "KEGCORE_BROKER_CHANNEL";
const ENV_API_URL: &str = "KEGCORE_API_URL";
const ENV_API_KEY: &str = "KEGCORE_API_KEY";
const ENV_LOG_LEVEL: &str = "KEGCORE_LOG_LEVEL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "KEGCORE_REQUEST_TIMEOUT_SECS";

const DEFAULT_BROKER_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_BROKER_CHANNEL: &str = "kegnet";
const DEFAULT_API_URL: &str = "http://localhost:9805";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("environment variable {field} has an invalid value: {value}")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker_url: String,
    pub broker_channel: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub log_level: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads every variable from the process environment, falling back to
    /// documented defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigBuilder::new().load_env()?.build()
    }
}

/// Builds a [`Config`] without touching the process environment, for tests
/// and for callers that want to override individual fields.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    broker_url: String,
    broker_channel: String,
    api_url: String,
    api_key: Option<String>,
    log_level: String,
    request_timeout: Duration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_owned(),
            broker_channel: DEFAULT_BROKER_CHANNEL.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            api_key: None,
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn broker_url(mut self, value: impl Into<String>) -> Self {
        self.broker_url = value.into();
        self
    }

    pub fn broker_channel(mut self, value: impl Into<String>) -> Self {
        self.broker_channel = value.into();
        self
    }

    pub fn api_url(mut self, value: impl Into<String>) -> Self {
        self.api_url = value.into();
        self
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn log_level(mut self, value: impl Into<String>) -> Self {
        self.log_level = value.into();
        self
    }

    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    /// Overlays whatever is set in the process environment on top of the
    /// current values. Only `KEGCORE_REQUEST_TIMEOUT_SECS` can fail to
    /// parse; every other variable is a plain string.
    pub fn load_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var(ENV_BROKER_URL) {
            self.broker_url = value;
        }
        if let Ok(value) = std::env::var(ENV_BROKER_CHANNEL) {
            self.broker_channel = value;
        }
        if let Ok(value) = std::env::var(ENV_API_URL) {
            self.api_url = value;
        }
        if let Ok(value) = std::env::var(ENV_API_KEY) {
            self.api_key = Some(value);
        }
        if let Ok(value) = std::env::var(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Ok(value) = std::env::var(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_REQUEST_TIMEOUT_SECS,
                value: value.clone(),
            })?;
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if self.broker_url.is_empty() {
            return Err(ConfigError::MissingEnv(ENV_BROKER_URL));
        }
        if self.api_url.is_empty() {
            return Err(ConfigError::MissingEnv(ENV_API_URL));
        }
        Ok(Config {
            broker_url: self.broker_url,
            broker_channel: self.broker_channel,
            api_url: self.api_url,
            api_key: self.api_key,
            log_level: self.log_level,
            request_timeout: self.request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_successfully() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.broker_url, DEFAULT_BROKER_URL);
        assert_eq!(config.broker_channel, DEFAULT_BROKER_CHANNEL);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_overrides_take_effect() {
        let config = ConfigBuilder::new()
            .broker_url("redis://example:6379")
            .api_key("secret")
            .build()
            .unwrap();
        assert_eq!(config.broker_url, "redis://example:6379");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn empty_broker_url_is_rejected() {
        let err = ConfigBuilder::new().broker_url("").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(_)));
    }
}
