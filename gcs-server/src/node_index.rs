// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! In-memory node index: the live set, the bounded dead-node cache, and the
//! address indexes used for liveness and preemption queries.
//!
//! All mutation happens under the node manager's lock; this module only
//! keeps the maps mutually consistent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use gcs_common::id::NodeID;
use gcs_proto::rpc;

/// Bijection between live node ids and their "ip:port" strings.
///
/// Inserts that would bind either side twice are refused, keeping the map a
/// true bijection.
#[derive(Default)]
pub struct NodeAddrBimap {
    by_id: HashMap<NodeID, String>,
    by_addr: HashMap<String, NodeID>,
}

impl NodeAddrBimap {
    /// Insert a pair. Returns false if either the id or the address is
    /// already bound.
    pub fn insert(&mut self, node_id: NodeID, address: String) -> bool {
        if self.by_id.contains_key(&node_id) || self.by_addr.contains_key(&address) {
            return false;
        }
        self.by_id.insert(node_id, address.clone());
        self.by_addr.insert(address, node_id);
        true
    }

    /// Remove by id, returning the address it was bound to.
    pub fn remove_by_id(&mut self, node_id: &NodeID) -> Option<String> {
        let address = self.by_id.remove(node_id)?;
        self.by_addr.remove(&address);
        Some(address)
    }

    pub fn address_of(&self, node_id: &NodeID) -> Option<&str> {
        self.by_id.get(node_id).map(|s| s.as_str())
    }

    pub fn id_of(&self, address: &str) -> Option<NodeID> {
        self.by_addr.get(address).copied()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.by_addr.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Result of inserting a node into the live set.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertAliveResult {
    Inserted,
    /// The id is already live; the existing record was retained.
    AlreadyPresent,
    /// The address is bound to a different live node.
    AddressConflict(NodeID),
}

/// The node manager's in-memory state.
pub struct NodeIndex {
    alive_nodes: HashMap<NodeID, Arc<rpc::GcsNodeInfo>>,
    dead_nodes: HashMap<NodeID, Arc<rpc::GcsNodeInfo>>,
    /// Live node id ↔ "ip:port".
    node_addrs: NodeAddrBimap,
    /// Address of each cached dead node; most recent death wins when an
    /// address is reused.
    dead_node_addrs: HashMap<String, NodeID>,
    /// (node id, end_time_ms), non-decreasing in end time. Front is the
    /// eviction victim.
    sorted_dead_node_list: VecDeque<(NodeID, u64)>,
    max_dead_cached: usize,
}

pub fn node_address(node: &rpc::GcsNodeInfo) -> String {
    format!("{}:{}", node.node_manager_address, node.node_manager_port)
}

impl NodeIndex {
    pub fn new(max_dead_cached: usize) -> Self {
        assert!(max_dead_cached > 0, "dead node cache must hold at least one entry");
        Self {
            alive_nodes: HashMap::new(),
            dead_nodes: HashMap::new(),
            node_addrs: NodeAddrBimap::default(),
            dead_node_addrs: HashMap::new(),
            sorted_dead_node_list: VecDeque::new(),
            max_dead_cached,
        }
    }

    // ─── Live set ──────────────────────────────────────────────────────

    pub fn insert_alive(&mut self, node: Arc<rpc::GcsNodeInfo>) -> InsertAliveResult {
        let node_id = NodeID::from_binary(&node.node_id);
        if self.alive_nodes.contains_key(&node_id) {
            return InsertAliveResult::AlreadyPresent;
        }
        let address = node_address(&node);
        if let Some(holder) = self.node_addrs.id_of(&address) {
            return InsertAliveResult::AddressConflict(holder);
        }
        self.node_addrs.insert(node_id, address);
        self.alive_nodes.insert(node_id, node);
        InsertAliveResult::Inserted
    }

    pub fn remove_alive(&mut self, node_id: &NodeID) -> Option<Arc<rpc::GcsNodeInfo>> {
        let node = self.alive_nodes.remove(node_id)?;
        self.node_addrs.remove_by_id(node_id);
        Some(node)
    }

    pub fn get_alive(&self, node_id: &NodeID) -> Option<&Arc<rpc::GcsNodeInfo>> {
        self.alive_nodes.get(node_id)
    }

    /// Swap the record of an already-live node (address must be unchanged).
    pub fn replace_alive(&mut self, node_id: NodeID, node: Arc<rpc::GcsNodeInfo>) {
        debug_assert_eq!(
            self.node_addrs.address_of(&node_id),
            Some(node_address(&node).as_str())
        );
        self.alive_nodes.insert(node_id, node);
    }

    pub fn contains_alive(&self, node_id: &NodeID) -> bool {
        self.alive_nodes.contains_key(node_id)
    }

    pub fn alive_nodes(&self) -> &HashMap<NodeID, Arc<rpc::GcsNodeInfo>> {
        &self.alive_nodes
    }

    pub fn id_by_live_address(&self, address: &str) -> Option<NodeID> {
        self.node_addrs.id_of(address)
    }

    pub fn is_address_live(&self, address: &str) -> bool {
        self.node_addrs.contains_address(address)
    }

    // ─── Dead set / cache ──────────────────────────────────────────────

    /// Insert a dead node, evicting the chronologically-oldest entry when
    /// the cache is full. Returns the evicted node id, whose durable row
    /// the caller deletes.
    pub fn insert_dead(&mut self, node: Arc<rpc::GcsNodeInfo>) -> Option<NodeID> {
        let mut victim = None;
        if self.dead_nodes.len() >= self.max_dead_cached {
            if let Some((oldest, _)) = self.sorted_dead_node_list.pop_front() {
                self.evict_dead(&oldest);
                victim = Some(oldest);
            }
        }
        let node_id = NodeID::from_binary(&node.node_id);
        self.sorted_dead_node_list
            .push_back((node_id, node.end_time_ms));
        self.dead_node_addrs.insert(node_address(&node), node_id);
        self.dead_nodes.insert(node_id, node);
        victim
    }

    /// Insert a dead node loaded from durable storage without eviction;
    /// call `rebuild_order_list` after the last restore.
    pub fn restore_dead(&mut self, node: Arc<rpc::GcsNodeInfo>) {
        let node_id = NodeID::from_binary(&node.node_id);
        self.sorted_dead_node_list
            .push_back((node_id, node.end_time_ms));
        self.dead_node_addrs.insert(node_address(&node), node_id);
        self.dead_nodes.insert(node_id, node);
    }

    /// Re-sort the order list ascending by end time (restore order from
    /// storage is arbitrary).
    pub fn rebuild_order_list(&mut self) {
        let mut entries: Vec<(NodeID, u64)> = self.sorted_dead_node_list.drain(..).collect();
        entries.sort_by_key(|(_, end_time_ms)| *end_time_ms);
        self.sorted_dead_node_list = entries.into();
    }

    fn evict_dead(&mut self, node_id: &NodeID) {
        if let Some(node) = self.dead_nodes.remove(node_id) {
            let address = node_address(&node);
            if self.dead_node_addrs.get(&address) == Some(node_id) {
                self.dead_node_addrs.remove(&address);
            }
        }
    }

    pub fn get_dead(&self, node_id: &NodeID) -> Option<&Arc<rpc::GcsNodeInfo>> {
        self.dead_nodes.get(node_id)
    }

    pub fn contains_dead(&self, node_id: &NodeID) -> bool {
        self.dead_nodes.contains_key(node_id)
    }

    pub fn dead_nodes(&self) -> &HashMap<NodeID, Arc<rpc::GcsNodeInfo>> {
        &self.dead_nodes
    }

    pub fn dead_id_by_address(&self, address: &str) -> Option<NodeID> {
        self.dead_node_addrs.get(address).copied()
    }

    pub fn sorted_dead_node_list(&self) -> &VecDeque<(NodeID, u64)> {
        &self.sorted_dead_node_list
    }
}
