// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Monotonic counters keyed by an arbitrary hashable type.
//!
//! Backs the per-method request counters reported by DebugString. Counts
//! only go up; there is no decrement because nothing here is ever
//! un-requested.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct CounterMap<K: Eq + Hash> {
    counts: HashMap<K, u64>,
}

impl<K: Eq + Hash> CounterMap<K> {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    /// Bump a counter, creating it at 1 on first use. Returns the new value.
    pub fn increment(&mut self, key: K) -> u64 {
        let count = self.counts.entry(key).or_default();
        *count += 1;
        *count
    }

    /// Current value of a counter; 0 if it was never incremented.
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// All (key, count) pairs, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<K: Eq + Hash> Default for CounterMap<K> {
    fn default() -> Self {
        Self::new()
    }
}
