// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! GCS Node Manager — the authoritative registry of cluster nodes.
//!
//! Applies node lifecycle transitions (register, drain, failure) by
//! sequencing in-memory index updates, durable table writes, outbound
//! raylet RPCs and publishes. In-memory insertion never precedes the
//! durable-write completion, so a restart recovers a superset of what
//! clients observed.

use std::collections::HashMap;
use std::sync::Arc;

use gcs_common::id::{ClusterID, NodeID};
use gcs_proto::rpc;
use gcs_proto::rpc::autoscaler::DrainNodeReason;
use gcs_proto::rpc::gcs_node_info::GcsNodeState;
use gcs_proto::rpc::node_death_info::Reason;
use gcs_raylet_client::RayletClientPool;
use gcs_util::counter_map::CounterMap;
use gcs_util::time::{current_time_ms, monotonic_time_ms};
use parking_lot::{Mutex, RwLock};
use tonic::Status;

use crate::node_index::{node_address, InsertAliveResult, NodeIndex};
use crate::pubsub_handler::{create_error_table_data, GcsPublisher};
use crate::table_storage::GcsTableStorage;

/// Callback invoked when a node is added to the cluster.
pub type NodeAddedCallback = Box<dyn Fn(&rpc::GcsNodeInfo) + Send + Sync>;
/// Callback invoked when a node is removed from the cluster.
pub type NodeRemovedCallback = Box<dyn Fn(&rpc::GcsNodeInfo) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CountType {
    RegisterNodeRequest,
    DrainNodeRequest,
    GetAllNodeInfoRequest,
    GetInternalConfigRequest,
}

/// The GCS node manager tracks all nodes in the cluster.
pub struct GcsNodeManager {
    /// Live set, dead cache and address indexes, mutated together.
    index: RwLock<NodeIndex>,
    /// Listeners, fired synchronously in registration order.
    node_added_listeners: RwLock<Vec<NodeAddedCallback>>,
    node_removed_listeners: RwLock<Vec<NodeRemovedCallback>>,
    /// Request counters for DebugString.
    counts: Mutex<CounterMap<CountType>>,
    /// Persistence.
    table_storage: Arc<GcsTableStorage>,
    /// Publisher for node-info and error channels.
    publisher: Arc<GcsPublisher>,
    /// Shared clients for reaching raylets.
    raylet_client_pool: Arc<RayletClientPool>,
    /// Immutable cluster identifier.
    cluster_id: ClusterID,
}

fn node_info_delta(node: &rpc::GcsNodeInfo) -> rpc::GcsNodeInfo {
    rpc::GcsNodeInfo {
        node_id: node.node_id.clone(),
        state: node.state,
        end_time_ms: node.end_time_ms,
        death_info: node.death_info.clone(),
        ..Default::default()
    }
}

fn raylet_address(node: &rpc::GcsNodeInfo) -> rpc::Address {
    rpc::Address {
        raylet_id: node.node_id.clone(),
        ip_address: node.node_manager_address.clone(),
        port: node.node_manager_port,
    }
}

impl GcsNodeManager {
    pub fn new(
        table_storage: Arc<GcsTableStorage>,
        publisher: Arc<GcsPublisher>,
        raylet_client_pool: Arc<RayletClientPool>,
        cluster_id: ClusterID,
        max_dead_cached: usize,
    ) -> Self {
        Self {
            index: RwLock::new(NodeIndex::new(max_dead_cached)),
            node_added_listeners: RwLock::new(Vec::new()),
            node_removed_listeners: RwLock::new(Vec::new()),
            counts: Mutex::new(CounterMap::new()),
            table_storage,
            publisher,
            raylet_client_pool,
            cluster_id,
        }
    }

    /// Rebuild in-memory state from the durable node table and prompt live
    /// raylets to resubscribe. Listeners must be registered before this
    /// runs; synthesized insertions fire them like any other.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        let all_nodes = self
            .table_storage
            .node_table()
            .get_all()
            .await
            .map_err(|e| anyhow::anyhow!("failed to load node table: {e}"))?;

        let mut alive_records = Vec::new();
        {
            let mut index = self.index.write();
            for node in all_nodes {
                if node.state == GcsNodeState::Dead as i32 {
                    index.restore_dead(Arc::new(node));
                } else {
                    alive_records.push(node);
                }
            }
            index.rebuild_order_list();
        }

        for node in alive_records {
            let address = raylet_address(&node);
            self.add_node(Arc::new(node));

            // A registered raylet has an active subscription to restore;
            // one that never finished registering will fail client-side.
            let raylet_client = self.raylet_client_pool.get_or_connect_by_address(&address);
            tokio::spawn(async move {
                if let Err(status) = raylet_client
                    .notify_gcs_restart(rpc::NotifyGcsRestartRequest::default())
                    .await
                {
                    tracing::warn!(%status, "failed to notify raylet of GCS restart");
                }
            });
        }
        Ok(())
    }

    // ─── Mutating operations ───────────────────────────────────────────

    /// Handle RegisterNode: persist the record, publish it, then insert it
    /// into the live set. Registering an already-live node is idempotent.
    pub async fn handle_register_node(
        &self,
        node_info: rpc::GcsNodeInfo,
    ) -> Result<(), Status> {
        self.counts.lock().increment(CountType::RegisterNodeRequest);
        if node_info.node_id.len() != NodeID::SIZE {
            return Err(Status::invalid_argument(format!(
                "node_id must be {} bytes, got {}",
                NodeID::SIZE,
                node_info.node_id.len()
            )));
        }
        let node_id = NodeID::from_binary(&node_info.node_id);
        tracing::info!(
            %node_id,
            address = %node_info.node_manager_address,
            node_name = %node_info.node_name,
            "Registering node"
        );

        // Refuse to bind an address that belongs to a different live node;
        // the bimap stays a bijection.
        let address = node_address(&node_info);
        if let Some(holder) = self.index.read().id_by_live_address(&address) {
            if holder != node_id {
                tracing::warn!(%node_id, %holder, %address, "address already bound to a live node");
                return Err(Status::already_exists(format!(
                    "address {address} is already bound to live node {holder}"
                )));
            }
        }

        if node_info.is_head_node {
            // Mark any old head node as dead first. Happens when a new head
            // is started against surviving durable state.
            let head_nodes: Vec<NodeID> = {
                let index = self.index.read();
                index
                    .alive_nodes()
                    .iter()
                    .filter(|(_, node)| node.is_head_node)
                    .map(|(id, _)| *id)
                    .collect()
            };
            assert!(
                head_nodes.len() <= 1,
                "found {} live head nodes",
                head_nodes.len()
            );
            if let Some(old_head) = head_nodes.first() {
                if *old_head != node_id {
                    self.on_node_failure(old_head).await?;
                }
            }
        }

        if let Err(e) = self
            .table_storage
            .node_table()
            .put(&node_id, &node_info)
            .await
        {
            // Losing this write would desynchronize restart recovery.
            panic!("failed to persist node {node_id}: {e}");
        }

        tracing::info!(
            %node_id,
            address = %node_info.node_manager_address,
            node_name = %node_info.node_name,
            "Finished registering node"
        );
        self.publisher
            .publish_node_info(&node_id, node_info.clone());
        self.add_node(Arc::new(node_info));
        Ok(())
    }

    /// Handle DrainNode: drain every requested node, echoing each id back.
    pub async fn handle_drain_node(
        &self,
        request: rpc::DrainNodeRequest,
    ) -> Result<rpc::DrainNodeReply, Status> {
        self.counts.lock().increment(CountType::DrainNodeRequest);
        let mut reply = rpc::DrainNodeReply::default();
        for drain_data in request.drain_node_data {
            if drain_data.node_id.len() != NodeID::SIZE {
                return Err(Status::invalid_argument(format!(
                    "node_id must be {} bytes, got {}",
                    NodeID::SIZE,
                    drain_data.node_id.len()
                )));
            }
            let node_id = NodeID::from_binary(&drain_data.node_id);
            self.drain_node(&node_id).await;
            reply.drain_node_status.push(rpc::DrainNodeStatus {
                node_id: drain_data.node_id,
            });
        }
        Ok(reply)
    }

    /// Stamp drain intent on a live node. The autoscaler path calls this
    /// before `drain_node` runs; `drain_node` asserts it happened.
    pub fn set_drain_info(
        &self,
        node_id: &NodeID,
        reason: Reason,
        drain_reason: DrainNodeReason,
    ) -> bool {
        let mut index = self.index.write();
        let Some(node) = index.get_alive(node_id) else {
            return false;
        };
        let mut updated = (**node).clone();
        updated.death_info = Some(rpc::NodeDeathInfo {
            reason: reason as i32,
            reason_message: String::new(),
            drain_reason: drain_reason as i32,
        });
        index.replace_alive(*node_id, Arc::new(updated));
        true
    }

    /// Autoscaler-initiated graceful shutdown. Returns false if the node
    /// was not live (idempotent no-op).
    pub async fn drain_node(&self, node_id: &NodeID) -> bool {
        tracing::info!(%node_id, "Draining node");
        let Some(node) = self.remove_node(node_id, /*is_intended=*/ true) else {
            tracing::info!(%node_id, "Node is already removed");
            return false;
        };

        let mut node = (*node).clone();
        node.state = GcsNodeState::Dead as i32;
        node.end_time_ms = monotonic_time_ms();

        // Drain intent must have been stamped upstream.
        let reason = node
            .death_info
            .as_ref()
            .map(|death_info| death_info.reason)
            .unwrap_or(Reason::Unspecified as i32);
        assert_eq!(
            reason,
            Reason::AutoscalerDrain as i32,
            "node {node_id} drained without drain intent"
        );

        let node = Arc::new(node);
        let delta = node_info_delta(&node);
        self.add_dead_node_to_cache(node.clone()).await;

        if let Err(e) = self.table_storage.node_table().put(node_id, &node).await {
            panic!("failed to persist drained node {node_id}: {e}");
        }

        // The raylet usually initiated this about itself and is already
        // going down; any reply status means the node stays DEAD.
        let raylet_client = self
            .raylet_client_pool
            .get_or_connect_by_address(&raylet_address(&node));
        match raylet_client
            .shutdown_raylet(rpc::ShutdownRayletRequest { graceful: true })
            .await
        {
            Ok(_) => tracing::info!(%node_id, "Raylet is drained; publishing to the cluster"),
            Err(status) => {
                tracing::warn!(%node_id, %status, "ShutdownRaylet failed; node is dead regardless")
            }
        }
        self.publisher.publish_node_info(node_id, delta);
        true
    }

    /// Detector-initiated failure path. A node that is not live resolves
    /// immediately (a drain may have won the race).
    pub async fn on_node_failure(&self, node_id: &NodeID) -> Result<(), Status> {
        let Some(node) = self.remove_node(node_id, /*is_intended=*/ false) else {
            return Ok(());
        };

        let mut node = (*node).clone();
        node.state = GcsNodeState::Dead as i32;
        node.end_time_ms = monotonic_time_ms();
        let death_info = node.death_info.get_or_insert_with(Default::default);
        if death_info.reason == Reason::Unspecified as i32 {
            // There was no drain in progress.
            death_info.reason = Reason::UnexpectedTermination as i32;
        }

        let node = Arc::new(node);
        let delta = node_info_delta(&node);
        self.add_dead_node_to_cache(node.clone()).await;

        if let Err(e) = self.table_storage.node_table().put(node_id, &node).await {
            panic!("failed to persist failed node {node_id}: {e}");
        }
        self.publisher.publish_node_info(node_id, delta);
        Ok(())
    }

    /// Insert into the live set and fire added-listeners. No-op when the
    /// node is already live.
    fn add_node(&self, node: Arc<rpc::GcsNodeInfo>) {
        let node_id = NodeID::from_binary(&node.node_id);
        let inserted = { self.index.write().insert_alive(node.clone()) };
        match inserted {
            InsertAliveResult::Inserted => {
                for listener in self.node_added_listeners.read().iter() {
                    listener(&node);
                }
            }
            InsertAliveResult::AlreadyPresent => {}
            InsertAliveResult::AddressConflict(holder) => {
                // A racing registration won the address while our durable
                // write was in flight.
                tracing::error!(%node_id, %holder, "address taken during registration; node not added");
            }
        }
    }

    /// Remove from the live set. An unintended removal publishes a
    /// node-removed error to drivers; both paths fire removed-listeners.
    fn remove_node(
        &self,
        node_id: &NodeID,
        is_intended: bool,
    ) -> Option<Arc<rpc::GcsNodeInfo>> {
        let node = { self.index.write().remove_alive(node_id) }?;
        tracing::info!(%node_id, node_name = %node.node_name, "Removing node");

        if !is_intended {
            let error_message = format!(
                "The node with node id: {node_id} and address: {} and node name: {} has been \
                 marked dead because the detector has missed too many heartbeats from it. This \
                 can happen when a (1) raylet crashes unexpectedly (OOM, preempted node, etc.) \
                 or (2) raylet has lagging heartbeats due to slow network or busy workload.",
                node.node_manager_address, node.node_name
            );
            tracing::warn!("{error_message}");
            let error_data =
                create_error_table_data("node_removed", error_message, current_time_ms());
            self.publisher
                .publish_error(node_id.hex().into_bytes(), error_data);
        }

        for listener in self.node_removed_listeners.read().iter() {
            listener(&node);
        }
        Some(node)
    }

    /// Insert into the dead cache; when full the chronologically-oldest
    /// entry is dropped and its durable row deleted best-effort.
    async fn add_dead_node_to_cache(&self, node: Arc<rpc::GcsNodeInfo>) {
        let victim = { self.index.write().insert_dead(node) };
        if let Some(victim) = victim {
            if let Err(e) = self.table_storage.node_table().delete(&victim).await {
                // The cache is a best-effort recent history; a stale row is
                // tolerable.
                tracing::warn!(node_id = %victim, "failed to delete evicted dead node: {e}");
            }
        }
    }

    // ─── Read-only queries ─────────────────────────────────────────────

    fn is_preempted_locked(index: &NodeIndex, raylet_address: &str) -> bool {
        let Some(node_id) = index.dead_id_by_address(raylet_address) else {
            return false;
        };
        let Some(node) = index.get_dead(&node_id) else {
            return false;
        };
        match &node.death_info {
            Some(death_info) => {
                death_info.reason == Reason::AutoscalerDrain as i32
                    && death_info.drain_reason
                        == DrainNodeReason::DrainNodeReasonPreemption as i32
            }
            None => false,
        }
    }

    /// True iff the address belongs to a cached dead node that was drained
    /// because the infrastructure preempted it.
    pub fn is_node_preempted(&self, raylet_address: &str) -> bool {
        Self::is_preempted_locked(&self.index.read(), raylet_address)
    }

    /// Positional liveness/preemption answers for a batch of addresses.
    pub fn check_alive(&self, raylet_addresses: &[String]) -> (Vec<bool>, Vec<bool>) {
        let index = self.index.read();
        let mut alive = Vec::with_capacity(raylet_addresses.len());
        let mut preempted = Vec::with_capacity(raylet_addresses.len());
        for address in raylet_addresses {
            let is_alive = index.is_address_live(address);
            alive.push(is_alive);
            preempted.push(!is_alive && Self::is_preempted_locked(&index, address));
        }
        (alive, preempted)
    }

    /// Snapshot of all live then dead node records.
    pub fn handle_get_all_node_info(&self) -> Vec<rpc::GcsNodeInfo> {
        self.counts
            .lock()
            .increment(CountType::GetAllNodeInfoRequest);
        let index = self.index.read();
        index
            .alive_nodes()
            .values()
            .chain(index.dead_nodes().values())
            .map(|node| (**node).clone())
            .collect()
    }

    /// Read the internal config blob. Missing entry yields an empty string.
    pub async fn handle_get_internal_config(&self) -> Result<String, Status> {
        self.counts
            .lock()
            .increment(CountType::GetInternalConfigRequest);
        let stored = self
            .table_storage
            .internal_config_table()
            .get()
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(stored.map(|c| c.config).unwrap_or_default())
    }

    /// The raw cluster identifier.
    pub fn handle_get_cluster_id(&self) -> Vec<u8> {
        self.cluster_id.binary()
    }

    pub fn is_node_alive(&self, node_id: &NodeID) -> bool {
        self.index.read().contains_alive(node_id)
    }

    pub fn is_node_dead(&self, node_id: &NodeID) -> bool {
        self.index.read().contains_dead(node_id)
    }

    pub fn get_alive_node(&self, node_id: &NodeID) -> Option<Arc<rpc::GcsNodeInfo>> {
        self.index.read().get_alive(node_id).cloned()
    }

    /// Cached dead-node record; nodes that aged out of the cache are gone.
    pub fn get_dead_node(&self, node_id: &NodeID) -> Option<Arc<rpc::GcsNodeInfo>> {
        self.index.read().get_dead(node_id).cloned()
    }

    pub fn get_all_alive_nodes(&self) -> HashMap<NodeID, Arc<rpc::GcsNodeInfo>> {
        self.index.read().alive_nodes().clone()
    }

    pub fn get_all_dead_nodes(&self) -> HashMap<NodeID, Arc<rpc::GcsNodeInfo>> {
        self.index.read().dead_nodes().clone()
    }

    pub fn num_alive_nodes(&self) -> usize {
        self.index.read().alive_nodes().len()
    }

    pub fn num_dead_nodes(&self) -> usize {
        self.index.read().dead_nodes().len()
    }

    /// Dead cache entries in eviction order (oldest end time first).
    pub fn sorted_dead_nodes(&self) -> Vec<(NodeID, u64)> {
        self.index
            .read()
            .sorted_dead_node_list()
            .iter()
            .copied()
            .collect()
    }

    // ─── Listeners ─────────────────────────────────────────────────────

    /// Register a node-added listener. Register before `initialize`.
    pub fn add_node_added_listener(&self, callback: NodeAddedCallback) {
        self.node_added_listeners.write().push(callback);
    }

    /// Register a node-removed listener. Register before `initialize`.
    pub fn add_node_removed_listener(&self, callback: NodeRemovedCallback) {
        self.node_removed_listeners.write().push(callback);
    }

    // ─── Debug ─────────────────────────────────────────────────────────

    pub fn debug_string(&self) -> String {
        let counts = self.counts.lock();
        format!(
            "GcsNodeManager: \
             \n- RegisterNode request count: {}\
             \n- DrainNode request count: {}\
             \n- GetAllNodeInfo request count: {}\
             \n- GetInternalConfig request count: {}",
            counts.get(&CountType::RegisterNodeRequest),
            counts.get(&CountType::DrainNodeRequest),
            counts.get(&CountType::GetAllNodeInfoRequest),
            counts.get(&CountType::GetInternalConfigRequest),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::pubsub_handler::ChannelType;
    use crate::store_client::InMemoryStoreClient;
    use gcs_test_utils::{node_id_with_prefix, node_info, wait_for_condition, FakeRayletClient};

    struct TestFixture {
        mgr: Arc<GcsNodeManager>,
        storage: Arc<GcsTableStorage>,
        publisher: Arc<GcsPublisher>,
        raylet: FakeRayletClient,
    }

    fn setup(max_dead_cached: usize) -> TestFixture {
        let store = Arc::new(InMemoryStoreClient::new());
        let storage = Arc::new(GcsTableStorage::new(store));
        let publisher = Arc::new(GcsPublisher::new());
        let raylet = FakeRayletClient::new();
        let raylet_for_factory = raylet.clone();
        let pool = Arc::new(RayletClientPool::new(Box::new(
            move |_: &rpc::Address| -> Arc<dyn gcs_raylet_client::RayletClient> {
                Arc::new(raylet_for_factory.clone())
            },
        )));
        let mgr = Arc::new(GcsNodeManager::new(
            storage.clone(),
            publisher.clone(),
            pool,
            ClusterID::from_random(),
            max_dead_cached,
        ));
        TestFixture {
            mgr,
            storage,
            publisher,
            raylet,
        }
    }

    fn subscribe_node_info(publisher: &GcsPublisher) {
        publisher.handle_subscribe_command(
            b"sub".to_vec(),
            ChannelType::GcsNodeInfoChannel as i32,
            vec![],
        );
    }

    async fn polled_node_infos(publisher: &GcsPublisher) -> Vec<rpc::GcsNodeInfo> {
        publisher
            .handle_subscriber_poll(b"sub", 0)
            .await
            .into_iter()
            .filter_map(|m| match m.inner_message {
                Some(rpc::pub_message::InnerMessage::NodeInfoMessage(info)) => Some(info),
                _ => None,
            })
            .collect()
    }

    /// Structural invariants that must hold after every operation.
    fn check_invariants(mgr: &GcsNodeManager, max_dead_cached: usize) {
        let index = mgr.index.read();
        for (node_id, node) in index.alive_nodes() {
            assert_eq!(node.state, GcsNodeState::Alive as i32);
            assert_eq!(index.id_by_live_address(&node_address(node)), Some(*node_id));
            assert!(!index.contains_dead(node_id));
        }
        let head_count = index
            .alive_nodes()
            .values()
            .filter(|n| n.is_head_node)
            .count();
        assert!(head_count <= 1);
        assert!(index.dead_nodes().len() <= max_dead_cached);
        let order = index.sorted_dead_node_list();
        assert!(order.iter().zip(order.iter().skip(1)).all(|(a, b)| a.1 <= b.1));
        assert_eq!(order.len(), index.dead_nodes().len());
        for (node_id, _) in order {
            assert!(index.contains_dead(node_id));
        }
    }

    #[tokio::test]
    async fn test_register_and_failure() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        assert_eq!(f.mgr.num_alive_nodes(), 1);
        assert!(f.mgr.is_node_alive(&node_id_with_prefix(1)));
        check_invariants(&f.mgr, 10);

        f.mgr.on_node_failure(&node_id_with_prefix(1)).await.unwrap();
        assert_eq!(f.mgr.num_alive_nodes(), 0);
        assert!(f.mgr.is_node_dead(&node_id_with_prefix(1)));
        let dead = f.mgr.get_dead_node(&node_id_with_prefix(1)).unwrap();
        assert_eq!(dead.state, GcsNodeState::Dead as i32);
        assert!(dead.end_time_ms > 0);
        assert_eq!(
            dead.death_info.as_ref().unwrap().reason,
            Reason::UnexpectedTermination as i32
        );
        check_invariants(&f.mgr, 10);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let f = setup(10);
        let added = Arc::new(AtomicUsize::new(0));
        let added_in_listener = added.clone();
        f.mgr
            .add_node_added_listener(Box::new(move |_| {
                added_in_listener.fetch_add(1, Ordering::SeqCst);
            }));

        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        assert_eq!(f.mgr.num_alive_nodes(), 1);
        assert_eq!(added.load(Ordering::SeqCst), 1);
        check_invariants(&f.mgr, 10);
    }

    #[tokio::test]
    async fn test_register_rejects_bound_address() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let err = f
            .mgr
            .handle_register_node(node_info(2, "10.0.0.1", 9000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::AlreadyExists);
        assert_eq!(f.mgr.num_alive_nodes(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_node_id() {
        let f = setup(10);
        let mut info = node_info(1, "10.0.0.1", 9000);
        info.node_id = vec![1, 2, 3];
        let err = f.mgr.handle_register_node(info).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_head_node_replacement() {
        let f = setup(10);
        subscribe_node_info(&f.publisher);

        let mut head1 = node_info(1, "10.0.0.1", 9000);
        head1.is_head_node = true;
        let mut head2 = node_info(2, "10.0.0.2", 9000);
        head2.is_head_node = true;

        f.mgr.handle_register_node(head1).await.unwrap();
        f.mgr.handle_register_node(head2).await.unwrap();

        assert_eq!(f.mgr.num_alive_nodes(), 1);
        assert!(f.mgr.is_node_alive(&node_id_with_prefix(2)));
        let dead_head = f.mgr.get_dead_node(&node_id_with_prefix(1)).unwrap();
        assert_eq!(
            dead_head.death_info.as_ref().unwrap().reason,
            Reason::UnexpectedTermination as i32
        );

        // Publish order: N1 ALIVE, then N1 DEAD before N2 ALIVE.
        let published = polled_node_infos(&f.publisher).await;
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].node_id[0], 1);
        assert_eq!(published[0].state, GcsNodeState::Alive as i32);
        assert_eq!(published[1].node_id[0], 1);
        assert_eq!(published[1].state, GcsNodeState::Dead as i32);
        assert_eq!(published[2].node_id[0], 2);
        assert_eq!(published[2].state, GcsNodeState::Alive as i32);
        check_invariants(&f.mgr, 10);
    }

    #[tokio::test]
    async fn test_reregistering_same_head_keeps_it() {
        let f = setup(10);
        let mut head = node_info(1, "10.0.0.1", 9000);
        head.is_head_node = true;
        f.mgr.handle_register_node(head.clone()).await.unwrap();
        f.mgr.handle_register_node(head).await.unwrap();
        assert!(f.mgr.is_node_alive(&node_id_with_prefix(1)));
        assert_eq!(f.mgr.num_dead_nodes(), 0);
    }

    #[tokio::test]
    async fn test_drain_node() {
        let f = setup(10);
        subscribe_node_info(&f.publisher);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();

        let node_id = node_id_with_prefix(1);
        assert!(f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonIdleTermination,
        ));
        assert!(f.mgr.drain_node(&node_id).await);

        assert!(!f.mgr.is_node_alive(&node_id));
        assert!(f.mgr.is_node_dead(&node_id));
        assert_eq!(f.raylet.num_shutdown_requests(), 1);

        // The DEAD record is durable.
        let stored = f.storage.node_table().get(&node_id).await.unwrap().unwrap();
        assert_eq!(stored.state, GcsNodeState::Dead as i32);

        // The published delta carries the drain reason.
        let published = polled_node_infos(&f.publisher).await;
        let delta = published.last().unwrap();
        assert_eq!(delta.state, GcsNodeState::Dead as i32);
        assert!(delta.end_time_ms > 0);
        assert_eq!(
            delta.death_info.as_ref().unwrap().reason,
            Reason::AutoscalerDrain as i32
        );
        check_invariants(&f.mgr, 10);
    }

    #[tokio::test]
    async fn test_drain_is_idempotent() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let node_id = node_id_with_prefix(1);
        f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonIdleTermination,
        );
        assert!(f.mgr.drain_node(&node_id).await);

        subscribe_node_info(&f.publisher);
        assert!(!f.mgr.drain_node(&node_id).await);
        // No second shutdown, no second publish.
        assert_eq!(f.raylet.num_shutdown_requests(), 1);
        let mut rx = f
            .publisher
            .subscribe(ChannelType::GcsNodeInfoChannel as i32)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_after_drain_is_noop() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let node_id = node_id_with_prefix(1);
        f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonIdleTermination,
        );
        f.mgr.drain_node(&node_id).await;

        f.mgr.on_node_failure(&node_id).await.unwrap();
        let dead = f.mgr.get_dead_node(&node_id).unwrap();
        assert_eq!(
            dead.death_info.as_ref().unwrap().reason,
            Reason::AutoscalerDrain as i32
        );
        assert_eq!(f.mgr.num_dead_nodes(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "without drain intent")]
    async fn test_drain_without_intent_panics() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr.drain_node(&node_id_with_prefix(1)).await;
    }

    #[tokio::test]
    async fn test_handle_drain_node_unknown_node() {
        let f = setup(10);
        subscribe_node_info(&f.publisher);
        let unknown = node_id_with_prefix(9);
        let request = rpc::DrainNodeRequest {
            drain_node_data: vec![rpc::DrainNodeData {
                node_id: unknown.binary(),
            }],
        };
        let reply = f.mgr.handle_drain_node(request).await.unwrap();
        assert_eq!(reply.drain_node_status.len(), 1);
        assert_eq!(reply.drain_node_status[0].node_id, unknown.binary());

        assert_eq!(f.mgr.num_alive_nodes(), 0);
        assert_eq!(f.mgr.num_dead_nodes(), 0);
        assert_eq!(f.raylet.num_shutdown_requests(), 0);
        let mut rx = f
            .publisher
            .subscribe(ChannelType::GcsNodeInfoChannel as i32)
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drain_publishes_even_when_raylet_unreachable() {
        let f = setup(10);
        subscribe_node_info(&f.publisher);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.raylet.set_fail_requests(true);

        let node_id = node_id_with_prefix(1);
        f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonIdleTermination,
        );
        assert!(f.mgr.drain_node(&node_id).await);

        let published = polled_node_infos(&f.publisher).await;
        assert_eq!(
            published.last().unwrap().state,
            GcsNodeState::Dead as i32
        );
    }

    #[tokio::test]
    async fn test_node_failure_publishes_error_to_drivers() {
        let f = setup(10);
        let mut error_rx = f
            .publisher
            .subscribe(ChannelType::RayErrorInfoChannel as i32)
            .unwrap();
        let removed = Arc::new(AtomicUsize::new(0));
        let removed_in_listener = removed.clone();
        f.mgr
            .add_node_removed_listener(Box::new(move |_| {
                removed_in_listener.fetch_add(1, Ordering::SeqCst);
            }));

        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr.on_node_failure(&node_id_with_prefix(1)).await.unwrap();

        assert_eq!(removed.load(Ordering::SeqCst), 1);
        let msg = error_rx.try_recv().unwrap();
        assert_eq!(msg.channel_type, ChannelType::RayErrorInfoChannel as i32);
    }

    #[tokio::test]
    async fn test_drain_does_not_publish_error() {
        let f = setup(10);
        let mut error_rx = f
            .publisher
            .subscribe(ChannelType::RayErrorInfoChannel as i32)
            .unwrap();
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let node_id = node_id_with_prefix(1);
        f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonIdleTermination,
        );
        f.mgr.drain_node(&node_id).await;
        assert!(error_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_preempted_node_query() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let node_id = node_id_with_prefix(1);
        f.mgr.set_drain_info(
            &node_id,
            Reason::AutoscalerDrain,
            DrainNodeReason::DrainNodeReasonPreemption,
        );
        f.mgr.on_node_failure(&node_id).await.unwrap();

        assert!(f.mgr.is_node_preempted("10.0.0.1:9000"));
        let (alive, preempted) =
            f.mgr.check_alive(&["10.0.0.1:9000".to_string()]);
        assert_eq!(alive, vec![false]);
        assert_eq!(preempted, vec![true]);
    }

    #[tokio::test]
    async fn test_check_alive_edge_cases() {
        let f = setup(10);
        let (alive, preempted) = f.mgr.check_alive(&[]);
        assert!(alive.is_empty());
        assert!(preempted.is_empty());

        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        let addresses = vec![
            "10.0.0.1:9000".to_string(),
            "10.9.9.9:1234".to_string(),
        ];
        let (alive, preempted) = f.mgr.check_alive(&addresses);
        assert_eq!(alive, vec![true, false]);
        assert_eq!(preempted, vec![false, false]);
    }

    #[tokio::test]
    async fn test_unexpected_death_is_not_preemption() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr.on_node_failure(&node_id_with_prefix(1)).await.unwrap();
        assert!(!f.mgr.is_node_preempted("10.0.0.1:9000"));
    }

    #[tokio::test]
    async fn test_dead_node_cache_eviction_deletes_durable_row() {
        let f = setup(2);
        for i in 1..=3u8 {
            f.mgr
                .handle_register_node(node_info(i, "10.0.0.1", 9000 + i as i32))
                .await
                .unwrap();
        }
        for i in 1..=3u8 {
            let node_id = node_id_with_prefix(i);
            f.mgr.set_drain_info(
                &node_id,
                Reason::AutoscalerDrain,
                DrainNodeReason::DrainNodeReasonIdleTermination,
            );
            f.mgr.drain_node(&node_id).await;
            check_invariants(&f.mgr, 2);
        }

        assert!(!f.mgr.is_node_dead(&node_id_with_prefix(1)));
        assert!(f.mgr.is_node_dead(&node_id_with_prefix(2)));
        assert!(f.mgr.is_node_dead(&node_id_with_prefix(3)));
        // The evicted node's durable row is gone; the survivors remain.
        assert!(f
            .storage
            .node_table()
            .get(&node_id_with_prefix(1))
            .await
            .unwrap()
            .is_none());
        assert!(f
            .storage
            .node_table()
            .get(&node_id_with_prefix(2))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_initialize_recovers_from_durable_state() {
        let f = setup(10);
        let table = f.storage.node_table();

        let alive = node_info(1, "10.0.0.1", 9000);
        let mut dead2 = node_info(2, "10.0.0.2", 9000);
        dead2.state = GcsNodeState::Dead as i32;
        dead2.end_time_ms = 50;
        let mut dead3 = node_info(3, "10.0.0.3", 9000);
        dead3.state = GcsNodeState::Dead as i32;
        dead3.end_time_ms = 10;

        for node in [&alive, &dead2, &dead3] {
            table
                .put(&NodeID::from_binary(&node.node_id), node)
                .await
                .unwrap();
        }

        let added = Arc::new(AtomicUsize::new(0));
        let added_in_listener = added.clone();
        f.mgr
            .add_node_added_listener(Box::new(move |_| {
                added_in_listener.fetch_add(1, Ordering::SeqCst);
            }));

        f.mgr.initialize().await.unwrap();

        assert_eq!(f.mgr.num_alive_nodes(), 1);
        assert!(f.mgr.is_node_alive(&node_id_with_prefix(1)));
        assert_eq!(f.mgr.num_dead_nodes(), 2);
        assert_eq!(
            f.mgr.sorted_dead_nodes(),
            vec![(node_id_with_prefix(3), 10), (node_id_with_prefix(2), 50)]
        );
        assert_eq!(added.load(Ordering::SeqCst), 1);
        check_invariants(&f.mgr, 10);

        // Each recovered live raylet gets a restart notification.
        let raylet = f.raylet.clone();
        assert!(
            wait_for_condition(move || raylet.num_restart_notifications() == 1, 1000).await
        );

        // Recovery round-trip: the snapshot equals the durable input.
        let mut recovered: Vec<Vec<u8>> = f
            .mgr
            .handle_get_all_node_info()
            .into_iter()
            .map(|n| n.node_id)
            .collect();
        recovered.sort();
        let mut expected: Vec<Vec<u8>> =
            [&alive, &dead2, &dead3].iter().map(|n| n.node_id.clone()).collect();
        expected.sort();
        assert_eq!(recovered, expected);
    }

    #[tokio::test]
    async fn test_get_all_node_info_includes_dead() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr
            .handle_register_node(node_info(2, "10.0.0.2", 9000))
            .await
            .unwrap();
        f.mgr.on_node_failure(&node_id_with_prefix(2)).await.unwrap();

        let all = f.mgr.handle_get_all_node_info();
        assert_eq!(all.len(), 2);
        let dead_count = all
            .iter()
            .filter(|n| n.state == GcsNodeState::Dead as i32)
            .count();
        assert_eq!(dead_count, 1);
    }

    #[tokio::test]
    async fn test_get_internal_config() {
        let f = setup(10);
        // Missing entry yields empty config with OK status.
        assert_eq!(f.mgr.handle_get_internal_config().await.unwrap(), "");

        f.storage
            .internal_config_table()
            .put(&rpc::StoredConfig {
                config: "a=1;b=2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(f.mgr.handle_get_internal_config().await.unwrap(), "a=1;b=2");
    }

    #[tokio::test]
    async fn test_cluster_id_is_stable() {
        let f = setup(10);
        let id = f.mgr.handle_get_cluster_id();
        assert_eq!(id.len(), ClusterID::SIZE);
        assert_eq!(f.mgr.handle_get_cluster_id(), id);
    }

    #[tokio::test]
    async fn test_listeners_fire_in_registration_order() {
        let f = setup(10);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            f.mgr.add_node_added_listener(Box::new(move |_| {
                order.lock().push(tag);
            }));
        }
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_debug_string_counts_requests() {
        let f = setup(10);
        f.mgr
            .handle_register_node(node_info(1, "10.0.0.1", 9000))
            .await
            .unwrap();
        f.mgr.handle_get_all_node_info();
        f.mgr.handle_get_all_node_info();

        let debug = f.mgr.debug_string();
        assert!(debug.contains("RegisterNode request count: 1"));
        assert!(debug.contains("GetAllNodeInfo request count: 2"));
        assert!(debug.contains("DrainNode request count: 0"));
    }
}
