// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shared-Context File Store
//!
//! Filesystem persistence for delegation and context records: one file per
//! delegation under `delegations/` named by the generated id, one file per
//! context key under `context/` named by the key. Each record write is a
//! single atomic-enough file write; there is no transaction across records
//! (at-most-once durability, accepted failure mode on crash between
//! validation and write).
//!
//! Context keys are validated against `[A-Za-z0-9_-]{1,255}` before they
//! reach this layer, so a key can never traverse outside the base tree.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::context::ContextRecord;
use crate::domain::delegation::DelegationRecord;

const DELEGATIONS_DIR: &str = "delegations";
const CONTEXT_DIR: &str = "context";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record persistence rooted at the shared-context directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create the provider, ensuring both subtrees exist up front so later
    /// writes fail only for genuine storage trouble.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        for dir in [DELEGATIONS_DIR, CONTEXT_DIR] {
            let path = base_path.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|source| StoreError::Io { path, source })?;
        }
        Ok(Self { base_path })
    }

    pub fn delegation_path(&self, record: &DelegationRecord) -> PathBuf {
        self.base_path
            .join(DELEGATIONS_DIR)
            .join(format!("{}.json", record.id))
    }

    pub fn context_path(&self, key: &str) -> PathBuf {
        self.base_path.join(CONTEXT_DIR).join(format!("{key}.json"))
    }

    /// Persist one accepted delegation. Never overwrites: ids are fresh UUIDs.
    pub async fn write_delegation(&self, record: &DelegationRecord) -> Result<(), StoreError> {
        self.write_json(&self.delegation_path(record), record).await
    }

    /// Persist one accepted context update, replacing any previous record
    /// for the same key (last-write-wins).
    pub async fn write_context(&self, record: &ContextRecord) -> Result<(), StoreError> {
        self.write_json(&self.context_path(&record.key), record).await
    }

    async fn write_json<T: serde::Serialize>(
        &self,
        path: &Path,
        record: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}
