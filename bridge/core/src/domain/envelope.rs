// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Envelope
//!
//! The outer authenticated wrapper around every bridge request. The envelope
//! carries the caller's claimed identity, a millisecond timestamp, and an
//! HMAC signature over the canonical message; the payload itself is opaque to
//! the envelope layer and is interpreted only after routing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::BridgeError;

/// Outer wrapper for one authenticated request.
///
/// Created per-request by the transport, consumed by the auth guard, then
/// discarded; only the payload travels further down the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Opaque identifier of the calling instance. Asserted, not looked up.
    pub instance_id: String,
    /// Caller clock at signing time, epoch milliseconds.
    pub timestamp: i64,
    /// Hex-encoded HMAC-SHA256 over [`canonical_message`].
    pub signature: String,
    /// Route-specific request body, uninterpreted at this layer.
    pub payload: Value,
}

impl Envelope {
    /// Extract an envelope from a parsed JSON body.
    ///
    /// Distinguishes a structurally broken body from valid JSON that lacks
    /// one of the four required fields, so the transport can report
    /// "Invalid JSON" and "Missing required fields" separately.
    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        let Value::Object(mut fields) = value else {
            return Err(BridgeError::MissingEnvelopeFields);
        };

        let instance_id = match fields.get("instanceId").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(BridgeError::MissingEnvelopeFields),
        };
        let timestamp = fields
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or(BridgeError::MissingEnvelopeFields)?;
        let signature = match fields.get("signature").and_then(Value::as_str) {
            Some(sig) if !sig.is_empty() => sig.to_string(),
            _ => return Err(BridgeError::MissingEnvelopeFields),
        };
        let payload = match fields.remove("payload") {
            Some(payload) if !payload.is_null() => payload,
            _ => return Err(BridgeError::MissingEnvelopeFields),
        };

        Ok(Self {
            instance_id,
            timestamp,
            signature,
            payload,
        })
    }

    /// The canonical message this envelope's signature must cover.
    pub fn canonical_message(&self) -> String {
        canonical_message(&self.instance_id, self.timestamp, &self.payload)
    }
}

/// Canonical signing input: `instanceId + ":" + timestamp + ":" + payload`
/// with the payload in compact JSON encoding.
///
/// Both the bridge and the SDK encode the payload through `serde_json`, so
/// the byte sequence under the MAC is deterministic on both ends of the
/// protocol.
pub fn canonical_message(instance_id: &str, timestamp_ms: i64, payload: &Value) -> String {
    let payload_json =
        serde_json::to_string(payload).expect("serializing serde_json::Value cannot fail");
    format!("{instance_id}:{timestamp_ms}:{payload_json}")
}
