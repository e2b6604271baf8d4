// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::BackendError;
use crate::types::{AuthTokenInfo, ControllerInfo, DrinkRecord, DrinkRequest, Status, TapDescriptor};
use crate::Backend;

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An HTTP-backed [`Backend`] client.
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(BackendError::NotFound {
                what: what.to_owned(),
            });
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

fn classify_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::TimedOut
    } else {
        BackendError::Transient(err.to_string())
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn get_status(&self) -> Result<Status, BackendError> {
        debug!(url = %self.url("status"), "fetching backend status");
        self.send_json(self.request(reqwest::Method::GET, "status"), "status")
            .await
    }

    async fn get_all_taps(&self) -> Result<Vec<TapDescriptor>, BackendError> {
        self.send_json(self.request(reqwest::Method::GET, "taps"), "taps")
            .await
    }

    async fn record_drink(&self, request: DrinkRequest) -> Result<DrinkRecord, BackendError> {
        let builder = self
            .request(reqwest::Method::POST, "drinks")
            .json(&request);
        self.send_json(builder, &format!("meter {}", request.meter_name))
            .await
    }

    async fn cancel_drink(&self, drink_id: u64, spilled: bool) -> Result<(), BackendError> {
        let builder = self
            .request(reqwest::Method::POST, &format!("drinks/{drink_id}/cancel"))
            .json(&serde_json::json!({ "spilled": spilled }));
        builder
            .send()
            .await
            .map_err(classify_transport_error)?
            .error_for_status()
            .map_err(|e| BackendError::RequestFailed {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                body: e.to_string(),
            })?;
        Ok(())
    }

    async fn log_sensor_reading(
        &self,
        sensor_name: &str,
        temperature_c: f64,
        when: u64,
    ) -> Result<(), BackendError> {
        let builder = self
            .request(reqwest::Method::POST, &format!("thermo/{sensor_name}"))
            .json(&serde_json::json!({ "temperature_c": temperature_c, "when": when }));
        match builder.send().await {
            Ok(resp) if resp.status().as_u16() == 404 => {
                warn!(sensor_name, "no sensor on backend, dropping reading");
                Ok(())
            }
            Ok(resp) if resp.status().is_server_error() => {
                warn!(sensor_name, status = %resp.status(), "server error recording temperature, dropping");
                Ok(())
            }
            Ok(resp) if !resp.status().is_success() => Err(BackendError::RequestFailed {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(sensor_name, error = %e, "transport error recording temperature, dropping");
                Ok(())
            }
        }
    }

    async fn get_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
    ) -> Result<AuthTokenInfo, BackendError> {
        let path = format!("auth-tokens/{auth_device}/{token_value}");
        self.send_json(self.request(reqwest::Method::GET, &path), "auth token")
            .await
    }

    async fn create_controller(&self, controller_name: &str) -> Result<ControllerInfo, BackendError> {
        let builder = self
            .request(reqwest::Method::POST, "controllers")
            .json(&serde_json::json!({ "name": controller_name }));
        let info: ControllerInfo = self.send_json(builder, controller_name).await?;
        for meter in ["flow0", "flow1"] {
            let builder = self
                .request(
                    reqwest::Method::POST,
                    &format!("controllers/{}/flow-meters", info.id),
                )
                .json(&serde_json::json!({ "name": meter }));
            if let Err(e) = builder.send().await {
                warn!(controller = controller_name, meter, error = %e, "failed to provision default flow meter");
            }
        }
        Ok(info)
    }
}
