// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `aegis-bridge-core` — Inter-Instance Bridge Pipeline
//!
//! Core primitives for the bridge that lets co-located Agent Host instances
//! delegate tasks to one another and publish shared context without trusting
//! each other's identity claims or overwhelming one another.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Envelope, delegation and context records, error taxonomy, configuration |
//! | [`application`] | Application | `DelegationService`, `ContextService` use cases |
//! | [`infrastructure`] | Infrastructure | HMAC auth guard, sliding-window rate limiter, audit log, file store |
//!
//! ## Request Pipeline
//!
//! Every inbound request travels the same gate sequence before it is routed:
//! size cap → JSON parse → envelope authentication (HMAC-SHA256 + replay
//! window) → per-instance rate admission → dispatch to delegation or context
//! handling. Each terminal outcome, success or rejection, produces exactly one
//! audit record.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
