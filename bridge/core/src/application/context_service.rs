// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Context Service
//!
//! Validates and persists shared-context updates. The key gate runs before
//! anything touches the filesystem; accepted updates overwrite the record
//! for their key (last-write-wins, no history).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::domain::context::{ContextReceipt, ContextRecord, ContextUpdate};
use crate::domain::context::validate_context_key;
use crate::domain::error::BridgeError;
use crate::infrastructure::audit::{AuditLevel, AuditLog};
use crate::infrastructure::store::FileStore;

pub struct ContextService {
    store: Arc<FileStore>,
    audit: Arc<AuditLog>,
}

impl ContextService {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>) -> Self {
        Self { store, audit }
    }

    /// Validate the key, overwrite the record, and return the receipt.
    pub async fn update(&self, update: ContextUpdate) -> Result<ContextReceipt, BridgeError> {
        if let Err(err) = validate_context_key(&update.context_key) {
            self.audit.record(
                AuditLevel::Warn,
                "Invalid context key",
                json!({
                    "instanceId": update.instance_id,
                    "contextKey": update.context_key,
                }),
            );
            return Err(err);
        }

        let record = ContextRecord::from_update(update, Utc::now());

        if let Err(err) = self.store.write_context(&record).await {
            error!(%err, key = %record.key, "failed to persist context update");
            self.audit.record(
                AuditLevel::Error,
                "Failed to write context update",
                json!({
                    "instanceId": record.updated_by,
                    "contextKey": record.key,
                    "error": err.to_string(),
                }),
            );
            return Err(BridgeError::Persistence {
                public: "Failed to update context",
                cause: err.to_string(),
            });
        }

        self.audit.record(
            AuditLevel::Info,
            "Context update",
            json!({
                "instanceId": record.updated_by,
                "contextKey": record.key,
            }),
        );
        Ok(ContextReceipt::updated(record.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    async fn service_in(dir: &tempfile::TempDir) -> ContextService {
        let store = Arc::new(FileStore::new(dir.path().join("shared")).await.unwrap());
        let audit = Arc::new(AuditLog::open(dir.path().join("audit.log")).await.unwrap());
        ContextService::new(store, audit)
    }

    fn update(key: &str, value: Value) -> ContextUpdate {
        ContextUpdate {
            instance_id: "claw-a".to_string(),
            context_key: key.to_string(),
            value,
            signature: Some("caller-sig".to_string()),
        }
    }

    #[tokio::test]
    async fn test_valid_key_accepted_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir).await;

        let receipt = service
            .update(update("valid-key_1", json!({"phase": "green"})))
            .await
            .unwrap();
        assert_eq!(receipt.status, "updated");
        assert_eq!(receipt.key, "valid-key_1");

        let record: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("shared/context/valid-key_1.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(record["value"]["phase"], "green");
        assert_eq!(record["signature"], "caller-sig");
    }

    #[tokio::test]
    async fn test_malformed_keys_rejected_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir).await;

        let too_long = "k".repeat(300);
        for key in ["bad key!", too_long.as_str(), "", "../escape"] {
            let result = service.update(update(key, json!(1))).await;
            assert!(matches!(result, Err(BridgeError::InvalidContextKey)));
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("shared/context"))
            .unwrap()
            .collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_updates_overwrite_and_advance_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir).await;
        let path = dir.path().join("shared/context/status.json");

        service.update(update("status", json!("first"))).await.unwrap();
        let first: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        service.update(update("status", json!("second"))).await.unwrap();
        let second: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(second["value"], "second");
        let first_at = first["updatedAt"].as_str().unwrap();
        let second_at = second["updatedAt"].as_str().unwrap();
        assert!(second_at >= first_at, "updatedAt must not move backwards");
    }

    #[tokio::test]
    async fn test_persistence_failure_reports_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir).await;

        std::fs::remove_dir(dir.path().join("shared/context")).unwrap();
        std::fs::write(dir.path().join("shared/context"), b"file").unwrap();

        let err = service
            .update(update("status", json!(1)))
            .await
            .expect_err("write must fail");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Failed to update context");
    }
}
