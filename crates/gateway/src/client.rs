//! HTTP client for the check-in server REST API.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use async_trait::async_trait;

use vigil_core::liveness::{AlarmAcknowledger, Identity, Role, StatusSnapshot, StatusSource};

use crate::error::{GatewayError, Result};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Connection parameters, passed explicitly at construction. There is no
/// process-wide credential holder; rotating the key means building a new
/// client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Client for the check-in server API.
///
/// Every request carries the `x-api-key` header. All mutations are
/// idempotent server-side, so callers may retry freely on transport
/// failures.
#[derive(Debug, Clone)]
pub struct CheckinClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CheckinClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - Base URL (e.g., "https://api.atempora.de") and API key
    pub fn new(config: ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| GatewayError::auth("Invalid API key format"))?;
        headers.insert("x-api-key", key_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                let message = if error.message.is_empty() {
                    error.error
                } else {
                    error.message
                };
                if !message.is_empty() {
                    return Err(GatewayError::api(status.as_u16(), message));
                }
            }
            return Err(GatewayError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            GatewayError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Register the local user as a checker.
    ///
    /// POST /register_checker
    pub async fn register_checker(
        &self,
        checker_id: &str,
        device_token: &str,
    ) -> Result<ApiAck> {
        let url = format!("{}/register_checker", self.base_url);
        let request = RegisterCheckerRequest {
            checker_id: checker_id.to_string(),
            checker_token: device_token.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Register the local user as a watcher of `checker_id`.
    ///
    /// POST /register_watcher
    pub async fn register_watcher(
        &self,
        checker_id: &str,
        watcher_id: &str,
        device_token: &str,
    ) -> Result<ApiAck> {
        let url = format!("{}/register_watcher", self.base_url);
        let request = RegisterWatcherRequest {
            checker_id: checker_id.to_string(),
            watcher_id: watcher_id.to_string(),
            watcher_token: device_token.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Re-register the device push token for whichever role the identity
    /// holds. Used when the push service rotates the token.
    pub async fn register_for_role(
        &self,
        identity: &Identity,
        device_token: &str,
    ) -> Result<ApiAck> {
        match identity.role {
            Role::Checker => self.register_checker(&identity.user_id, device_token).await,
            Role::Watcher => {
                let checker_id = identity.watched_checker_id.as_deref().ok_or_else(|| {
                    GatewayError::invalid_request("Watcher identity has no watched checker")
                })?;
                self.register_watcher(checker_id, &identity.user_id, device_token)
                    .await
            }
        }
    }

    /// Submit a check-in. The returned ack carries the server's accepted
    /// timestamp.
    ///
    /// POST /checkin
    pub async fn checkin(&self, request: CheckinRequest) -> Result<ApiAck> {
        let url = format!("{}/checkin", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Toggle sleep mode for a checker.
    ///
    /// POST /sleep
    pub async fn sleep(&self, checker_id: &str) -> Result<ApiAck> {
        let url = format!("{}/sleep", self.base_url);
        let request = SleepRequest {
            checker_id: checker_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Trigger an emergency for a checker.
    ///
    /// POST /emergency
    pub async fn emergency(&self, checker_id: &str) -> Result<ApiAck> {
        let url = format!("{}/emergency", self.base_url);
        let request = EmergencyRequest {
            checker_id: checker_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Acknowledge an active alarm (and any active emergency) for a checker.
    /// Safe to repeat; acknowledging an already-clear alarm is a no-op
    /// server-side.
    ///
    /// POST /acknowledge_alarm
    pub async fn acknowledge(&self, checker_id: &str) -> Result<ApiAck> {
        let url = format!("{}/acknowledge_alarm", self.base_url);
        let request = AcknowledgeAlarmRequest {
            checker_id: checker_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the authoritative status for a checker.
    ///
    /// GET /status/{checker_id}
    pub async fn get_status(&self, checker_id: &str) -> Result<StatusSnapshot> {
        let url = format!("{}/status/{}", self.base_url, checker_id);

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Remove a checker registration.
    ///
    /// DELETE /unregister_checker/{checker_id}
    pub async fn unregister_checker(&self, checker_id: &str) -> Result<ApiAck> {
        let url = format!("{}/unregister_checker/{}", self.base_url, checker_id);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Remove a watcher registration.
    ///
    /// DELETE /unregister_watcher/{checker_id}/{watcher_id}
    pub async fn unregister_watcher(
        &self,
        checker_id: &str,
        watcher_id: &str,
    ) -> Result<ApiAck> {
        let url = format!(
            "{}/unregister_watcher/{}/{}",
            self.base_url, checker_id, watcher_id
        );

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[async_trait]
impl StatusSource for CheckinClient {
    async fn fetch_status(&self, checker_id: &str) -> vigil_core::errors::Result<StatusSnapshot> {
        self.get_status(checker_id).await.map_err(Into::into)
    }
}

#[async_trait]
impl AlarmAcknowledger for CheckinClient {
    async fn acknowledge_alarm(&self, checker_id: &str) -> vigil_core::errors::Result<()> {
        let ack = self.acknowledge(checker_id).await?;
        if ack.ok {
            Ok(())
        } else {
            Err(vigil_core::errors::Error::api(
                200,
                "acknowledgment rejected by server",
            ))
        }
    }
}
