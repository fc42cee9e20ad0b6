// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Logging setup using the `tracing` ecosystem.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber for a GCS process.
///
/// The level comes from `GCS_LOG_LEVEL`, falling back to `RUST_LOG`, then
/// to `info`. With a `log_dir`, output is appended to
/// `<log_dir>/<component>.log` without ANSI colors; otherwise it goes to
/// stderr.
pub fn init_gcs_logging(component: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_env("GCS_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match log_dir {
        Some(dir) => {
            let path = dir.join(format!("{component}.log"));
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .expect("Failed to open log file");
            builder.with_ansi(false).with_writer(file).init();
        }
        None => builder.init(),
    }

    tracing::info!(component, "GCS logging initialized");
}
