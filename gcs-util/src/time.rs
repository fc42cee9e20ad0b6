// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Wall-clock helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

static LAST_TIMESTAMP_MS: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch, clamped so that successive calls in
/// this process never go backward.
///
/// Node death times must come out non-decreasing (the dead-node eviction
/// order depends on it), and NTP is allowed to step the system clock back
/// under us. The clamp trades a little accuracy after a step for a sorted
/// timeline.
pub fn monotonic_time_ms() -> u64 {
    let now = current_time_ms();
    let high_water = LAST_TIMESTAMP_MS.fetch_max(now, Ordering::AcqRel);
    now.max(high_water)
}
