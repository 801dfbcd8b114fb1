//! Reqwest-based backend API client
//!
//! All backend responses share a `{ success, data, message }` envelope; on
//! failure the envelope (or body) message becomes the user-facing error text.

use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::allowlist::AllowlistEntry;
use crate::config::BackendConfig;
use crate::errors::EngineError;
use crate::types::MarketplaceOrder;

use super::{BackendApi, HyperboardPayload, Revalidator, UserSettings};

/// JSON envelope shared by all backend endpoints
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CidResponse {
    cid: String,
}

#[derive(Debug, Serialize)]
struct AllowlistUpload<'a> {
    entries: &'a [AllowlistEntry],
    total_units: U256,
}

/// HTTP client for the marketplace backend
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::External(e.into()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, EngineError> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::rpc(format!("backend unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::rpc(format!("backend response unreadable: {e}")))?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|_| EngineError::Http {
            status: status.as_u16(),
            message: truncate(&body, 200),
        })?;

        if !status.is_success() || !envelope.success {
            return Err(EngineError::Http {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("backend request failed with status {status}")),
            });
        }

        envelope.data.ok_or_else(|| EngineError::Http {
            status: status.as_u16(),
            message: "backend response missing data".to_string(),
        })
    }

    /// Like `send` but for endpoints whose success payload is irrelevant.
    async fn send_unit(&self, request: reqwest::RequestBuilder) -> Result<(), EngineError> {
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to a char boundary; slicing mid-codepoint panics.
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}..", &s[..cut])
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn upload_allowlist(
        &self,
        entries: &[AllowlistEntry],
        total_units: U256,
    ) -> Result<String, EngineError> {
        debug!(entries = entries.len(), "uploading allowlist");
        let payload = AllowlistUpload { entries, total_units };
        let response: CidResponse = self
            .send(self.client.post(self.url("allowlists")).json(&payload))
            .await?;
        Ok(response.cid)
    }

    async fn register_order(&self, order: &MarketplaceOrder) -> Result<String, EngineError> {
        let response: IdResponse = self
            .send(self.client.post(self.url("marketplace/orders")).json(order))
            .await?;
        Ok(response.id)
    }

    async fn delete_order(&self, order_id: &str, signature: &Bytes) -> Result<(), EngineError> {
        self.send_unit(
            self.client
                .delete(self.url(&format!("marketplace/orders/{order_id}")))
                .json(&json!({ "signature": signature })),
        )
        .await
    }

    async fn create_hyperboard(&self, payload: &HyperboardPayload) -> Result<String, EngineError> {
        let response: IdResponse = self
            .send(self.client.post(self.url("hyperboards")).json(payload))
            .await?;
        Ok(response.id)
    }

    async fn update_hyperboard(
        &self,
        board_id: &str,
        payload: &HyperboardPayload,
    ) -> Result<(), EngineError> {
        self.send_unit(
            self.client
                .patch(self.url(&format!("hyperboards/{board_id}")))
                .json(payload),
        )
        .await
    }

    async fn delete_hyperboard(&self, board_id: &str, admin: Address) -> Result<(), EngineError> {
        self.send_unit(
            self.client
                .delete(self.url(&format!("hyperboards/{board_id}")))
                .json(&json!({ "admin_address": admin })),
        )
        .await
    }

    async fn update_user_settings(
        &self,
        address: Address,
        settings: &UserSettings,
    ) -> Result<(), EngineError> {
        self.send_unit(
            self.client
                .patch(self.url(&format!("users/{address}")))
                .json(settings),
        )
        .await
    }
}

#[async_trait]
impl Revalidator for HttpBackend {
    async fn revalidate(&self, paths: &[String]) -> Result<(), EngineError> {
        self.send_unit(
            self.client
                .post(self.url("revalidate"))
                .json(&json!({ "paths": paths })),
        )
        .await
    }
}
