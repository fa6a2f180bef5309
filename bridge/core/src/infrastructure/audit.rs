// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Audit Log
//!
//! Append-only JSON-lines record of every significant bridge decision.
//! Records flow through a bounded queue drained by a dedicated writer task,
//! so request latency is decoupled from log I/O. Recording is fire-and-forget:
//! a full queue or a failed write drops the record with a local diagnostic
//! and never raises back to the request pipeline.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl AuditLevel {
    fn as_str(self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Warn => "warn",
            AuditLevel::Error => "error",
        }
    }
}

enum AuditMessage {
    Record(Value),
    Flush(oneshot::Sender<()>),
}

/// Handle to the audit writer task.
pub struct AuditLog {
    tx: mpsc::Sender<AuditMessage>,
}

impl AuditLog {
    /// Open (creating parents as needed) the audit file for appending and
    /// spawn the writer task.
    pub async fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(writer_loop(file, rx));
        Ok(Self { tx })
    }

    /// Queue one record. Metadata fields are merged into the top level of
    /// the JSON line alongside `timestamp`, `level`, and `message`.
    pub fn record(&self, level: AuditLevel, message: &str, metadata: Value) {
        let mut entry = serde_json::Map::new();
        entry.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        entry.insert(
            "level".to_string(),
            Value::String(level.as_str().to_string()),
        );
        entry.insert("message".to_string(), Value::String(message.to_string()));
        if let Value::Object(fields) = metadata {
            entry.extend(fields);
        }

        debug!(?level, message, "audit");
        if self.tx.try_send(AuditMessage::Record(Value::Object(entry))).is_err() {
            warn!(message, "audit queue full or closed; record dropped");
        }
    }

    /// Wait until everything queued so far has reached the file. Used on
    /// shutdown and by tests; requests never call this.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(AuditMessage::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn writer_loop(mut file: File, mut rx: mpsc::Receiver<AuditMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            AuditMessage::Record(entry) => {
                let mut line = entry.to_string();
                line.push('\n');
                if let Err(err) = file.write_all(line.as_bytes()).await {
                    warn!(%err, "audit write failed; record dropped");
                }
            }
            AuditMessage::Flush(ack) => {
                let _ = file.flush().await;
                let _ = ack.send(());
            }
        }
    }
    let _ = file.flush().await;
}
