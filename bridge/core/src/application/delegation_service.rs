// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Delegation Service
//!
//! Validates and persists task delegations. Two gates protect the instance
//! group from runaway fan-out before anything is written:
//!
//! - **Depth**: a chain already at the configured bound may not grow.
//! - **Loop**: a task may not be handed to an instance it has already
//!   traveled through.
//!
//! The service never delivers the task; "queued" means durably recorded for
//! a downstream consumer to pick up.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::domain::delegation::{DelegationReceipt, DelegationRecord, DelegationRequest};
use crate::domain::error::BridgeError;
use crate::infrastructure::audit::{AuditLevel, AuditLog};
use crate::infrastructure::store::FileStore;

pub struct DelegationService {
    store: Arc<FileStore>,
    audit: Arc<AuditLog>,
    max_depth: usize,
}

impl DelegationService {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>, max_depth: usize) -> Self {
        Self {
            store,
            audit,
            max_depth,
        }
    }

    /// Validate the request, persist the record, and return the receipt.
    ///
    /// Exactly one audit record is produced per call, on whichever branch
    /// terminates it.
    pub async fn delegate(
        &self,
        request: DelegationRequest,
    ) -> Result<DelegationReceipt, BridgeError> {
        if request.delegation_chain.len() >= self.max_depth {
            self.audit.record(
                AuditLevel::Warn,
                "Delegation depth exceeded",
                json!({
                    "fromInstance": request.from_instance,
                    "chain": request.delegation_chain,
                }),
            );
            return Err(BridgeError::DelegationDepthExceeded);
        }

        if request.delegation_chain.contains(&request.to_instance) {
            self.audit.record(
                AuditLevel::Warn,
                "Delegation loop detected",
                json!({
                    "fromInstance": request.from_instance,
                    "toInstance": request.to_instance,
                    "chain": request.delegation_chain,
                }),
            );
            return Err(BridgeError::DelegationLoop);
        }

        let task_type = request.task.get("type").cloned();
        let record = DelegationRecord::accepted(request, Utc::now());

        if let Err(err) = self.store.write_delegation(&record).await {
            error!(%err, delegation_id = %record.id, "failed to persist delegation");
            self.audit.record(
                AuditLevel::Error,
                "Failed to write delegation",
                json!({
                    "fromInstance": record.from,
                    "toInstance": record.to,
                    "error": err.to_string(),
                }),
            );
            return Err(BridgeError::Persistence {
                public: "Failed to queue delegation",
                cause: err.to_string(),
            });
        }

        self.audit.record(
            AuditLevel::Info,
            "Task delegation",
            json!({
                "fromInstance": record.from,
                "toInstance": record.to,
                "delegationId": record.id,
                "taskType": task_type,
            }),
        );
        Ok(DelegationReceipt::queued(record.id))
    }
}
