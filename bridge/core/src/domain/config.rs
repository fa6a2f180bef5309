// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bridge runtime configuration.
//!
//! Assembled by the binary from flags and environment variables; the secret
//! itself is never part of this struct and travels separately.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 18800;
pub const DEFAULT_RATE_LIMIT: u32 = 60;
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 5;

/// Settings for one bridge process.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bind address; the bridge serves co-located instances, so loopback.
    pub host: String,
    pub port: u16,
    /// Root of the shared-context tree (`delegations/`, `context/`).
    pub shared_context_path: PathBuf,
    /// Append-only JSON-lines audit trail.
    pub audit_log_path: PathBuf,
    /// Requests per instance per minute.
    pub rate_limit: u32,
    /// Longest delegation chain still allowed to grow.
    pub max_delegation_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            shared_context_path: PathBuf::from("/var/lib/aegis/bridge/shared-context"),
            audit_log_path: PathBuf::from("/var/log/aegis/bridge-audit.log"),
            rate_limit: DEFAULT_RATE_LIMIT,
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
        }
    }
}
