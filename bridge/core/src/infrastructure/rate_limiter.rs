// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sliding-Window Rate Limiter
//!
//! Bounds each instance to a request budget over the trailing 60 s. This is a
//! request-count sliding window, not a token bucket: rejected attempts are
//! never recorded, so a stream of rejections does not extend the blocked
//! period past the natural expiry of previously admitted requests.
//!
//! Expired timestamps are evicted lazily on the next check for that instance.
//! Instances that go silent entirely are reclaimed by [`RateLimiter::evict_idle`],
//! which the daemon runs on a background interval.

use std::collections::VecDeque;

use dashmap::DashMap;

/// Trailing window length in milliseconds.
pub const WINDOW_MS: i64 = 60_000;

/// Per-instance sliding-window admission.
///
/// The window map is keyed by instance id; `DashMap` gives mutual exclusion
/// per key, so concurrent requests from the same instance cannot corrupt its
/// window while requests from different instances proceed in parallel.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<i64>>,
    budget: usize,
}

impl RateLimiter {
    /// `budget` admitted requests per instance per [`WINDOW_MS`].
    pub fn new(budget: usize) -> Self {
        Self {
            windows: DashMap::new(),
            budget,
        }
    }

    /// Admit or reject one request from `instance_id` at the current clock.
    pub fn admit(&self, instance_id: &str) -> bool {
        self.admit_at(instance_id, chrono::Utc::now().timestamp_millis())
    }

    fn admit_at(&self, instance_id: &str, now_ms: i64) -> bool {
        let mut window = self.windows.entry(instance_id.to_string()).or_default();
        let cutoff = now_ms - WINDOW_MS;
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }
        if window.len() >= self.budget {
            return false;
        }
        window.push_back(now_ms);
        true
    }

    /// Drop windows whose newest admission has aged out entirely, so the map
    /// stays bounded by the set of recently active instances. Returns how
    /// many instances were reclaimed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(chrono::Utc::now().timestamp_millis())
    }

    fn evict_idle_at(&self, now_ms: i64) -> usize {
        let cutoff = now_ms - WINDOW_MS;
        let before = self.windows.len();
        self.windows
            .retain(|_, window| window.back().is_some_and(|t| *t > cutoff));
        before - self.windows.len()
    }

    /// Number of instances currently holding a window entry.
    pub fn tracked_instances(&self) -> usize {
        self.windows.len()
    }
}
