// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context_service;
pub mod delegation_service;

pub use context_service::ContextService;
pub use delegation_service::DelegationService;
