// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Inter-Instance Bridge
//!
//! The `aegis-bridge` binary runs the communication bridge between
//! co-located Agent Host instances:
//!
//! - Authenticated RPC for task delegation
//! - Signed message verification with replay-window enforcement
//! - Per-instance rate limiting
//! - Shared context store gatekeeping
//! - Audit logging for every inter-instance decision
//!
//! The shared secret is read once at startup from a protected file; a
//! missing or empty secret is fatal, the process exits non-zero before
//! binding the listener.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use aegis_bridge_core::domain::config::{
    BridgeConfig, DEFAULT_MAX_DELEGATION_DEPTH, DEFAULT_PORT, DEFAULT_RATE_LIMIT,
};

mod daemon;

/// AEGIS inter-instance bridge daemon
#[derive(Parser)]
#[command(name = "aegis-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Bind address (the bridge serves co-located instances)
    #[arg(long, env = "BRIDGE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// HTTP port
    #[arg(long, env = "BRIDGE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Root directory for delegation and context records
    #[arg(
        long,
        env = "SHARED_CONTEXT_PATH",
        default_value = "/var/lib/aegis/bridge/shared-context",
        value_name = "DIR"
    )]
    shared_context_path: PathBuf,

    /// Append-only audit log file
    #[arg(
        long,
        env = "AUDIT_LOG_PATH",
        default_value = "/var/log/aegis/bridge-audit.log",
        value_name = "FILE"
    )]
    audit_log_path: PathBuf,

    /// Requests per instance per minute
    #[arg(long, env = "RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT)]
    rate_limit: u32,

    /// Maximum delegation chain depth
    #[arg(long, env = "MAX_DELEGATION_DEPTH", default_value_t = DEFAULT_MAX_DELEGATION_DEPTH)]
    max_delegation_depth: usize,

    /// Protected file holding the shared HMAC secret
    #[arg(
        long,
        env = "BRIDGE_SECRET_FILE",
        default_value = "/run/secrets/aegis-bridge-secret",
        value_name = "FILE"
    )]
    secret_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BRIDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let secret = load_shared_secret(&cli.secret_file)?;

    let config = BridgeConfig {
        host: cli.host,
        port: cli.port,
        shared_context_path: cli.shared_context_path,
        audit_log_path: cli.audit_log_path,
        rate_limit: cli.rate_limit,
        max_delegation_depth: cli.max_delegation_depth,
    };

    info!(
        port = config.port,
        rate_limit = config.rate_limit,
        max_delegation_depth = config.max_delegation_depth,
        "Starting AEGIS bridge"
    );

    daemon::serve(config, secret).await
}

/// Read the shared secret once at startup. Absence is fatal: the bridge
/// cannot authenticate anything without it.
fn load_shared_secret(path: &std::path::Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to load bridge shared secret from {}", path.display()))?;
    let secret = raw.trim().to_string();
    if secret.is_empty() {
        bail!("Bridge shared secret at {} is empty", path.display());
    }
    Ok(secret)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
