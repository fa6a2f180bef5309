// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Delegation Domain Types
//!
//! Defines the types for inter-instance task delegation:
//!
//! - [`DelegationRequest`] — the routed payload of a `/delegate` call.
//! - [`DelegationRecord`] — the durably persisted, never-mutated record.
//! - [`DelegationReceipt`] — the acceptance response returned to the caller.
//!
//! # Invariants
//!
//! - `chain.len() < max_delegation_depth` at acceptance time.
//! - The target instance must not already appear in the chain.
//! - A persisted record's chain is the request chain with the delegating
//!   instance appended; records are never mutated or deleted by the bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Payload of a `/delegate` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    /// Instance asking for the work to be done elsewhere.
    pub from_instance: String,
    /// Instance the task is being handed to.
    pub to_instance: String,
    /// Opaque task description; the bridge never interprets it.
    pub task: Value,
    /// Instances the task has already traveled through, oldest first.
    #[serde(default)]
    pub delegation_chain: Vec<String>,
}

/// Durable record of an accepted delegation.
///
/// Written once under `delegations/<id>.json`; consumption by the target
/// instance is a downstream concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRecord {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub task: Value,
    /// Request chain with `from` appended.
    pub chain: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DelegationRecord {
    /// Build the record persisted for an accepted request.
    pub fn accepted(request: DelegationRequest, now: DateTime<Utc>) -> Self {
        let DelegationRequest {
            from_instance,
            to_instance,
            task,
            mut delegation_chain,
        } = request;
        delegation_chain.push(from_instance.clone());
        Self {
            id: Uuid::new_v4(),
            from: from_instance,
            to: to_instance,
            task,
            chain: delegation_chain,
            created_at: now,
        }
    }
}

/// Acceptance response for a queued delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationReceipt {
    pub delegation_id: Uuid,
    /// Always `"queued"`: durably recorded for a downstream consumer.
    pub status: String,
}

impl DelegationReceipt {
    pub fn queued(delegation_id: Uuid) -> Self {
        Self {
            delegation_id,
            status: "queued".to_string(),
        }
    }
}
