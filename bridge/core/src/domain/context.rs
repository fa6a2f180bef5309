// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shared Context Domain Types
//!
//! A context record is one key in the shared key/value store instances use to
//! publish state to each other. Updates are last-write-wins per key; the
//! bridge keeps no history.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::BridgeError;

/// Keys are path-safe by construction: 1–255 chars of `[A-Za-z0-9_-]`.
static CONTEXT_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,255}$").expect("context key pattern is valid"));

/// Reject keys that would be unsafe or unaddressable as filenames.
pub fn validate_context_key(key: &str) -> Result<(), BridgeError> {
    if CONTEXT_KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(BridgeError::InvalidContextKey)
    }
}

/// Payload of a `/context/update` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUpdate {
    /// Instance submitting the update.
    pub instance_id: String,
    pub context_key: String,
    /// Opaque structured value; the bridge never interprets it.
    pub value: Value,
    /// Caller-supplied per-value signature, stored verbatim as provenance
    /// metadata. The bridge does NOT re-verify it against `value`; the
    /// envelope-level auth guard is the authentication boundary. Whether
    /// this field was ever meant to carry a second authentication layer is
    /// an open protocol question — do not start verifying it here without a
    /// protocol decision.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Durable record for one context key, overwritten on every accepted update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub key: String,
    pub value: Value,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    pub signature: Option<String>,
}

impl ContextRecord {
    /// Build the record persisted for an accepted update.
    pub fn from_update(update: ContextUpdate, now: DateTime<Utc>) -> Self {
        Self {
            key: update.context_key,
            value: update.value,
            updated_by: update.instance_id,
            updated_at: now,
            signature: update.signature,
        }
    }
}

/// Acceptance response for a context update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReceipt {
    /// Always `"updated"`.
    pub status: String,
    pub key: String,
}

impl ContextReceipt {
    pub fn updated(key: String) -> Self {
        Self {
            status: "updated".to_string(),
            key,
        }
    }
}
