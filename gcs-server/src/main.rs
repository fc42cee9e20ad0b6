// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! GCS server binary entry point.

use clap::Parser;
use gcs_common::config::GcsConfig;
use gcs_server::server::{GcsServer, GcsServerConfig};

#[derive(Parser, Debug)]
#[command(name = "gcs_server", about = "Global Control Service node registry")]
struct Args {
    /// GCS server port
    #[arg(long, default_value_t = gcs_common::constants::GCS_SERVER_PORT)]
    gcs_server_port: u16,

    /// Redis address (e.g., redis://host:port); in-memory storage if unset
    #[arg(long)]
    redis_address: Option<String>,

    /// Log directory
    #[arg(long)]
    log_dir: Option<String>,

    /// Base64-encoded JSON config overrides
    #[arg(long)]
    config_list: Option<String>,

    /// Session name, used to namespace durable storage
    #[arg(long)]
    session_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    gcs_util::logging::init_gcs_logging("gcs_server", args.log_dir.as_ref().map(std::path::Path::new));

    let gcs_config = match &args.config_list {
        Some(encoded) => GcsConfig::from_base64_json(encoded)
            .map_err(|e| anyhow::anyhow!("bad --config-list: {e}"))?,
        None => GcsConfig::default(),
    };

    let config = GcsServerConfig {
        port: args.gcs_server_port,
        redis_address: args.redis_address,
        log_dir: args.log_dir,
        session_name: args.session_name,
        gcs_config,
    };

    let server = GcsServer::new(config)?;
    server.run().await
}
