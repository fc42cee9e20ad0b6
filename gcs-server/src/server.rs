// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! GCS server startup and lifecycle.
//!
//! Assembles the storage, publisher, raylet client pool, node manager and
//! health checker, recovers state from durable storage, and parks until
//! shutdown. RPC transport plumbing is provided by the embedding process.

use std::sync::Arc;

use gcs_common::config::GcsConfig;
use gcs_common::id::{ClusterID, NodeID};
use gcs_raylet_client::RayletClientPool;

use crate::health_check_manager::{GcsHealthCheckManager, HealthCheckConfig};
use crate::node_manager::GcsNodeManager;
use crate::pubsub_handler::GcsPublisher;
use crate::store_client::{InMemoryStoreClient, RedisStoreClient, StoreClient};
use crate::table_storage::GcsTableStorage;

/// Configuration for starting the GCS server.
#[derive(Debug, Clone)]
pub struct GcsServerConfig {
    pub port: u16,
    pub redis_address: Option<String>,
    pub log_dir: Option<String>,
    pub session_name: Option<String>,
    pub gcs_config: GcsConfig,
}

/// The main GCS server struct.
pub struct GcsServer {
    config: GcsServerConfig,
    node_manager: Arc<GcsNodeManager>,
    health_check_manager: Arc<GcsHealthCheckManager>,
    publisher: Arc<GcsPublisher>,
    table_storage: Arc<GcsTableStorage>,
}

impl GcsServer {
    pub fn new(config: GcsServerConfig) -> anyhow::Result<Self> {
        let store_client: Arc<dyn StoreClient> = match &config.redis_address {
            Some(address) => Arc::new(
                RedisStoreClient::new(address, config.session_name.clone().unwrap_or_default())
                    .map_err(|e| anyhow::anyhow!("failed to open redis store: {e}"))?,
            ),
            None => Arc::new(InMemoryStoreClient::new()),
        };
        let table_storage = Arc::new(GcsTableStorage::new(store_client));
        let publisher = Arc::new(GcsPublisher::new());
        let raylet_client_pool = Arc::new(RayletClientPool::with_rpc_clients());

        let node_manager = Arc::new(GcsNodeManager::new(
            table_storage.clone(),
            publisher.clone(),
            raylet_client_pool,
            ClusterID::from_random(),
            config.gcs_config.maximum_gcs_dead_node_cached_count,
        ));

        // Health checks feed the failure path; membership changes keep the
        // monitored set in sync. Listeners are wired before initialize so
        // recovered nodes are monitored too.
        let node_manager_for_death = node_manager.clone();
        let health_check_manager = GcsHealthCheckManager::new(
            HealthCheckConfig::from_gcs_config(&config.gcs_config),
            Arc::new(move |node_id| {
                let node_manager = node_manager_for_death.clone();
                tokio::spawn(async move {
                    if let Err(status) = node_manager.on_node_failure(&node_id).await {
                        tracing::error!(%node_id, %status, "failed to process node failure");
                    }
                });
            }),
        );

        let health_for_added = health_check_manager.clone();
        node_manager.add_node_added_listener(Box::new(move |node| {
            let node_id = NodeID::from_binary(&node.node_id);
            let address = format!("{}:{}", node.node_manager_address, node.node_manager_port);
            health_for_added.add_node(node_id, address);
        }));
        let health_for_removed = health_check_manager.clone();
        node_manager.add_node_removed_listener(Box::new(move |node| {
            let node_id = NodeID::from_binary(&node.node_id);
            health_for_removed.remove_node(&node_id);
        }));

        Ok(Self {
            config,
            node_manager,
            health_check_manager,
            publisher,
            table_storage,
        })
    }

    pub fn config(&self) -> &GcsServerConfig {
        &self.config
    }

    pub fn node_manager(&self) -> &Arc<GcsNodeManager> {
        &self.node_manager
    }

    pub fn health_check_manager(&self) -> &Arc<GcsHealthCheckManager> {
        &self.health_check_manager
    }

    pub fn publisher(&self) -> &Arc<GcsPublisher> {
        &self.publisher
    }

    pub fn table_storage(&self) -> &Arc<GcsTableStorage> {
        &self.table_storage
    }

    /// Recover state and run until interrupted.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(port = self.config.port, "Starting GCS server");
        self.node_manager.initialize().await?;
        tracing::info!(
            alive_nodes = self.node_manager.num_alive_nodes(),
            dead_nodes = self.node_manager.num_dead_nodes(),
            "GCS server recovered node state"
        );

        tokio::signal::ctrl_c().await?;
        tracing::info!("GCS server shutting down");
        tracing::info!("{}", self.node_manager.debug_string());
        Ok(())
    }
}
