// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod config;
pub mod context;
pub mod delegation;
pub mod envelope;
pub mod error;

pub use config::BridgeConfig;
pub use context::{ContextReceipt, ContextRecord, ContextUpdate};
pub use delegation::{DelegationReceipt, DelegationRecord, DelegationRequest};
pub use envelope::Envelope;
pub use error::BridgeError;
