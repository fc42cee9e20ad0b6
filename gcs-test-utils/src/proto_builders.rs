// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Builders for node records used across tests.

use gcs_common::id::NodeID;
use gcs_proto::rpc;

/// Deterministic NodeID whose first byte is `prefix`.
pub fn node_id_with_prefix(prefix: u8) -> NodeID {
    let mut data = [0u8; NodeID::SIZE];
    data[0] = prefix;
    NodeID::from_binary(&data)
}

/// An ALIVE node record with a deterministic id and address.
pub fn node_info(prefix: u8, address: &str, port: i32) -> rpc::GcsNodeInfo {
    rpc::GcsNodeInfo {
        node_id: node_id_with_prefix(prefix).binary(),
        node_manager_address: address.to_string(),
        node_manager_port: port,
        node_name: format!("node-{prefix}"),
        state: rpc::gcs_node_info::GcsNodeState::Alive as i32,
        start_time_ms: 1,
        ..Default::default()
    }
}
