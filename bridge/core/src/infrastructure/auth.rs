// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Envelope Authentication
//!
//! Verifies the origin and freshness of inbound envelopes with an
//! HMAC-SHA256 keyed by the shared secret. Two properties matter here:
//!
//! - Signature comparison is constant-time with respect to content. Length
//!   is checked first, before any byte comparison, because constant-time
//!   primitives require equal-length inputs.
//! - Freshness is checked before the signature: a captured request stops
//!   replaying once its timestamp leaves the ±30 s window, regardless of how
//!   valid the signature still is.
//!
//! Both failure kinds surface to callers as 401; the audit trail tells them
//! apart.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::envelope::canonical_message;
use crate::domain::error::BridgeError;

type HmacSha256 = Hmac<Sha256>;

/// Tolerance around server time within which a signed timestamp is accepted,
/// in milliseconds. Exactly this much skew is still accepted.
pub const REPLAY_WINDOW_MS: i64 = 30_000;

/// Holds the shared secret and performs envelope signing/verification.
///
/// Constructed once at startup; the process refuses to start without the
/// secret, so a guard always has one.
#[derive(Clone)]
pub struct AuthGuard {
    secret: String,
}

impl AuthGuard {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex-encoded HMAC-SHA256 over the canonical message for these fields.
    pub fn sign(&self, instance_id: &str, timestamp_ms: i64, payload: &serde_json::Value) -> String {
        hex::encode(self.mac_bytes(instance_id, timestamp_ms, payload))
    }

    /// Verify signature and freshness against the current server clock.
    pub fn verify(
        &self,
        instance_id: &str,
        timestamp_ms: i64,
        payload: &serde_json::Value,
        signature_hex: &str,
    ) -> Result<(), BridgeError> {
        self.verify_at(
            instance_id,
            timestamp_ms,
            payload,
            signature_hex,
            chrono::Utc::now().timestamp_millis(),
        )
    }

    fn verify_at(
        &self,
        instance_id: &str,
        timestamp_ms: i64,
        payload: &serde_json::Value,
        signature_hex: &str,
        now_ms: i64,
    ) -> Result<(), BridgeError> {
        let drift_ms = now_ms - timestamp_ms;
        if drift_ms.abs() > REPLAY_WINDOW_MS {
            return Err(BridgeError::TimestampOutOfRange { drift_ms });
        }

        let expected = self.mac_bytes(instance_id, timestamp_ms, payload);
        let provided = hex::decode(signature_hex).map_err(|_| BridgeError::InvalidSignature)?;

        // Length gate before the constant-time comparison; ct_eq requires
        // equal-length slices.
        if provided.len() != expected.len() {
            return Err(BridgeError::InvalidSignature);
        }
        if bool::from(expected.as_slice().ct_eq(&provided)) {
            Ok(())
        } else {
            Err(BridgeError::InvalidSignature)
        }
    }

    fn mac_bytes(
        &self,
        instance_id: &str,
        timestamp_ms: i64,
        payload: &serde_json::Value,
    ) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical_message(instance_id, timestamp_ms, payload).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGuard").finish_non_exhaustive()
    }
}
