// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bridge daemon: HTTP transport and request pipeline.

mod server;

pub use server::{build_router, build_state, serve, BridgeState};
