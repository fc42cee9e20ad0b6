// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! GCS Health Check Manager — the liveness detector.
//!
//! Each monitored raylet gets a probe task that calls the standard gRPC
//! health service on a fixed period over one reused channel. Consecutive
//! misses accumulate; at the threshold the node is reported dead and the
//! node manager takes the failure path.
//!
//! Probe tasks carry the epoch assigned when their node was added. A task
//! exits as soon as the table no longer holds its (node, epoch) pair, so
//! removing a node — or re-adding it, which assigns a fresh epoch — retires
//! the old task without any cancellation channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gcs_common::config::GcsConfig;
use gcs_common::id::NodeID;
use parking_lot::Mutex;

type HealthClient = tonic_health::pb::health_client::HealthClient<tonic::transport::Channel>;

/// Fired once per node declared dead.
pub type NodeDeathCallback = Arc<dyn Fn(NodeID) + Send + Sync>;

/// Probe timing knobs.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Grace period before a freshly added node is probed at all (ms).
    pub initial_delay_ms: u64,
    /// Per-probe RPC deadline (ms); an overrun counts as a miss.
    pub timeout_ms: u64,
    /// Gap between probes of one node (ms).
    pub period_ms: u64,
    /// Consecutive misses that declare the node dead.
    pub failure_threshold: u32,
}

impl HealthCheckConfig {
    pub fn from_gcs_config(config: &GcsConfig) -> Self {
        Self {
            initial_delay_ms: config.health_check_initial_delay_ms,
            timeout_ms: config.health_check_timeout_ms,
            period_ms: config.health_check_period_ms,
            failure_threshold: config.health_check_failure_threshold,
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self::from_gcs_config(&GcsConfig::default())
    }
}

/// Probe bookkeeping for one monitored node. The address lives in the
/// probe task itself.
struct Probe {
    /// Consecutive misses so far. Reset to 0 by any successful check.
    misses: u32,
    /// Ties the table entry to the task probing it.
    epoch: u64,
}

/// Periodically checks the liveness of every monitored node.
pub struct GcsHealthCheckManager {
    config: HealthCheckConfig,
    probes: Mutex<HashMap<NodeID, Probe>>,
    epoch_counter: AtomicU64,
    on_node_death: NodeDeathCallback,
}

impl GcsHealthCheckManager {
    pub fn new(config: HealthCheckConfig, on_node_death: NodeDeathCallback) -> Arc<Self> {
        Arc::new(Self {
            config,
            probes: Mutex::new(HashMap::new()),
            epoch_counter: AtomicU64::new(0),
            on_node_death,
        })
    }

    /// Start monitoring a node at `address` ("ip:port"). Re-adding a node
    /// supersedes its previous probe task.
    pub fn add_node(self: &Arc<Self>, node_id: NodeID, address: String) {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.probes.lock().insert(node_id, Probe { misses: 0, epoch });
        let this = Arc::clone(self);
        tokio::spawn(this.probe_loop(node_id, epoch, address));
    }

    /// Stop monitoring a node. Its probe task notices and exits on its
    /// next tick.
    pub fn remove_node(&self, node_id: &NodeID) {
        self.probes.lock().remove(node_id);
    }

    /// Get all monitored nodes.
    pub fn get_all_nodes(&self) -> Vec<NodeID> {
        self.probes.lock().keys().copied().collect()
    }

    /// Forget accumulated misses, e.g. after out-of-band proof of life.
    pub fn mark_node_healthy(&self, node_id: &NodeID) {
        if let Some(probe) = self.probes.lock().get_mut(node_id) {
            probe.misses = 0;
        }
    }

    pub fn num_monitored_nodes(&self) -> usize {
        self.probes.lock().len()
    }

    fn owns_probe(&self, node_id: &NodeID, epoch: u64) -> bool {
        self.probes
            .lock()
            .get(node_id)
            .is_some_and(|probe| probe.epoch == epoch)
    }

    async fn probe_loop(self: Arc<Self>, node_id: NodeID, epoch: u64, address: String) {
        // One lazily-connected channel for the node's whole lifetime. An
        // unparsable address never connects and counts as missing.
        let mut client =
            tonic::transport::Endpoint::from_shared(format!("http://{address}"))
                .ok()
                .map(|endpoint| HealthClient::new(endpoint.connect_lazy()));

        tokio::time::sleep(Duration::from_millis(self.config.initial_delay_ms)).await;
        loop {
            tokio::time::sleep(Duration::from_millis(self.config.period_ms)).await;
            if !self.owns_probe(&node_id, epoch) {
                return;
            }

            let healthy = self.check_once(client.as_mut()).await;

            let exhausted = {
                let mut probes = self.probes.lock();
                let Some(probe) = probes.get_mut(&node_id) else {
                    return;
                };
                if probe.epoch != epoch {
                    return;
                }
                if healthy {
                    probe.misses = 0;
                    false
                } else {
                    probe.misses += 1;
                    probe.misses >= self.config.failure_threshold
                }
            };

            if exhausted {
                self.probes.lock().remove(&node_id);
                tracing::warn!(%node_id, %address, "node missed too many health checks; reporting failure");
                (self.on_node_death)(node_id);
                return;
            }
        }
    }

    async fn check_once(&self, client: Option<&mut HealthClient>) -> bool {
        let Some(client) = client else {
            return false;
        };
        let request = tonic_health::pb::HealthCheckRequest {
            service: String::new(),
        };
        let reply = tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            client.check(request),
        )
        .await;
        matches!(reply, Ok(Ok(_)))
    }
}
