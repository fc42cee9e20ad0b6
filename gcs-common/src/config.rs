// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! GCS configuration.
//!
//! Defaults are production values; the launcher can override any field by
//! passing a base64-encoded JSON object on the command line.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

/// GCS configuration parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    // ─── Node Manager ─────────────────────────────────────────
    /// Upper bound on the number of dead nodes kept in the in-memory
    /// cache (and mirrored in durable storage).
    pub maximum_gcs_dead_node_cached_count: usize,

    // ─── Health Checks ────────────────────────────────────────
    /// Initial delay before the first health check of a node (ms).
    pub health_check_initial_delay_ms: u64,
    /// Timeout for each health check RPC (ms).
    pub health_check_timeout_ms: u64,
    /// Period between health checks (ms).
    pub health_check_period_ms: u64,
    /// Number of consecutive failures before declaring a node dead.
    pub health_check_failure_threshold: u32,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            maximum_gcs_dead_node_cached_count: 1000,
            health_check_initial_delay_ms: 5000,
            health_check_timeout_ms: 10000,
            health_check_period_ms: 5000,
            health_check_failure_threshold: 5,
        }
    }
}

impl GcsConfig {
    /// Parse a config from a base64-encoded JSON object.
    ///
    /// Unknown fields are ignored; missing fields take defaults.
    pub fn from_base64_json(encoded: &str) -> Result<Self, String> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| format!("invalid base64 config: {e}"))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON config: {e}"))
    }
}
