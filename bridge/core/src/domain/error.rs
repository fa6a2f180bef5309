// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bridge Error Taxonomy
//!
//! Every terminal outcome of a bridge request maps to exactly one variant.
//! The `Display` impl is the caller-visible message: validation rejections
//! carry a short human-readable reason, while persistence failures display a
//! generic message and keep the real cause for the audit trail only.

use thiserror::Error;

/// Rejections and failures produced by the bridge pipeline.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Request used a method other than POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Body exceeded the transport cap before it was fully read.
    #[error("Request body too large")]
    BodyTooLarge,

    /// Body was not parseable as JSON.
    #[error("Invalid JSON")]
    InvalidJson,

    /// Envelope was missing one of instanceId, timestamp, signature, payload.
    #[error("Missing required fields")]
    MissingEnvelopeFields,

    /// Envelope timestamp fell outside the replay window.
    ///
    /// Surfaced to the caller identically to [`BridgeError::InvalidSignature`]
    /// (both are 401); the drift is recorded in the audit trail.
    #[error("Request timestamp out of range")]
    TimestampOutOfRange { drift_ms: i64 },

    /// Envelope signature did not verify against the shared secret.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Instance exhausted its sliding-window request budget.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Delegation chain already at the configured depth bound.
    #[error("Maximum delegation depth exceeded")]
    DelegationDepthExceeded,

    /// Target instance already appears in the delegation chain.
    #[error("Delegation loop detected")]
    DelegationLoop,

    /// Context key absent, too long, or outside `[A-Za-z0-9_-]`.
    #[error("Invalid context key format")]
    InvalidContextKey,

    /// Routed payload did not deserialize into the handler's request shape.
    #[error("{0}")]
    InvalidPayload(&'static str),

    /// Record could not be persisted. The caller sees only the public
    /// message; `cause` goes to the audit log.
    #[error("{public}")]
    Persistence { public: &'static str, cause: String },

    /// Unknown route.
    #[error("Not found")]
    NotFound,
}

impl BridgeError {
    /// HTTP status code this outcome maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::MethodNotAllowed => 405,
            BridgeError::BodyTooLarge => 413,
            BridgeError::InvalidJson | BridgeError::MissingEnvelopeFields => 400,
            BridgeError::TimestampOutOfRange { .. } | BridgeError::InvalidSignature => 401,
            BridgeError::RateLimited => 429,
            BridgeError::DelegationDepthExceeded
            | BridgeError::DelegationLoop
            | BridgeError::InvalidContextKey
            | BridgeError::InvalidPayload(_) => 400,
            BridgeError::Persistence { .. } => 500,
            BridgeError::NotFound => 404,
        }
    }

    /// Whether the caller can correct this failure by changing the request.
    pub fn is_caller_correctable(&self) -> bool {
        !matches!(self, BridgeError::Persistence { .. })
    }
}
