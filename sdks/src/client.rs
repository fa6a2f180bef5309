// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use aegis_bridge_core::infrastructure::auth::AuthGuard;

/// Client for calling the AEGIS inter-instance bridge.
///
/// Every call is wrapped in a signed envelope: the client computes the
/// HMAC-SHA256 over the same canonical message the bridge verifies, using
/// the shared secret both sides were provisioned with.
pub struct BridgeClient {
    base_url: String,
    client: Client,
    instance_id: String,
    auth: AuthGuard,
}

impl BridgeClient {
    /// Create a new bridge client for one instance identity.
    pub fn new(
        base_url: impl Into<String>,
        instance_id: impl Into<String>,
        shared_secret: &str,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            instance_id: instance_id.into(),
            auth: AuthGuard::new(shared_secret),
        }
    }

    /// Delegate a task to another instance.
    ///
    /// `delegation_chain` is the path the task has already traveled; pass an
    /// empty slice when originating work. The bridge appends this instance
    /// before persisting.
    pub async fn delegate(
        &self,
        to_instance: &str,
        task: Value,
        delegation_chain: &[String],
    ) -> Result<DelegationResponse> {
        let payload = json!({
            "fromInstance": self.instance_id,
            "toInstance": to_instance,
            "task": task,
            "delegationChain": delegation_chain,
        });
        let body = self.post("/delegate", payload).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Publish a shared-context value under `key` (last-write-wins).
    ///
    /// `value_signature` is stored by the bridge verbatim as provenance
    /// metadata for the value itself.
    pub async fn update_context(
        &self,
        key: &str,
        value: Value,
        value_signature: Option<String>,
    ) -> Result<ContextResponse> {
        let payload = json!({
            "instanceId": self.instance_id,
            "contextKey": key,
            "value": value,
            "signature": value_signature,
        });
        let body = self.post("/context/update", payload).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Check that the bridge is up and accepting authenticated traffic.
    pub async fn health(&self) -> Result<HealthResponse> {
        let body = self.post("/health", json!({})).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Wrap a payload in a freshly signed envelope.
    fn envelope(&self, payload: Value) -> Value {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = self.auth.sign(&self.instance_id, timestamp, &payload);
        json!({
            "instanceId": self.instance_id,
            "timestamp": timestamp,
            "signature": signature,
            "payload": payload,
        })
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&self.envelope(payload))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("unknown bridge error");
            anyhow::bail!("bridge request failed ({status}): {message}");
        }
        Ok(body)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationResponse {
    pub delegation_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextResponse {
    pub status: String,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
