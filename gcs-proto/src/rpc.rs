// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Messages of package `gcs.rpc`.

/// Autoscaler types (package `gcs.rpc.autoscaler`).
pub mod autoscaler {
    /// Why the autoscaler decided to drain a node.
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum DrainNodeReason {
        DrainNodeReasonUnspecified = 0,
        /// The node is idle and the autoscaler is scaling down.
        DrainNodeReasonIdleTermination = 1,
        /// The infrastructure reclaimed the node.
        DrainNodeReasonPreemption = 2,
    }
}

// ─── Node records ──────────────────────────────────────────────────────────

/// How and why a node died. Populated before or during the transition
/// out of ALIVE.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeDeathInfo {
    #[prost(enumeration = "node_death_info::Reason", tag = "1")]
    pub reason: i32,
    /// Human-readable detail accompanying the reason.
    #[prost(string, tag = "2")]
    pub reason_message: ::prost::alloc::string::String,
    /// Only meaningful when `reason` is AUTOSCALER_DRAIN.
    #[prost(enumeration = "autoscaler::DrainNodeReason", tag = "3")]
    pub drain_reason: i32,
}

pub mod node_death_info {
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum Reason {
        Unspecified = 0,
        ExpectedTermination = 1,
        UnexpectedTermination = 2,
        AutoscalerDrain = 3,
    }
}

/// The durable node record. Created at registration, mutated only by the
/// node manager, spilled to the node table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GcsNodeInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub node_id: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub node_manager_address: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub node_manager_port: i32,
    #[prost(string, tag = "4")]
    pub node_name: ::prost::alloc::string::String,
    /// At most one live node may carry this flag.
    #[prost(bool, tag = "5")]
    pub is_head_node: bool,
    #[prost(enumeration = "gcs_node_info::GcsNodeState", tag = "6")]
    pub state: i32,
    #[prost(uint64, tag = "7")]
    pub start_time_ms: u64,
    /// Set when the node transitions to DEAD; 0 while alive.
    #[prost(uint64, tag = "8")]
    pub end_time_ms: u64,
    #[prost(message, optional, tag = "9")]
    pub death_info: ::core::option::Option<NodeDeathInfo>,
}

pub mod gcs_node_info {
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum GcsNodeState {
        Alive = 0,
        Dead = 1,
    }
}

/// gRPC address of a raylet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Address {
    #[prost(bytes = "vec", tag = "1")]
    pub raylet_id: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub ip_address: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub port: i32,
}

/// Out-of-band error event published to driver subscribers.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorTableData {
    #[prost(string, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
}

/// Opaque key=value text blob stored in the internal config table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StoredConfig {
    #[prost(string, tag = "1")]
    pub config: ::prost::alloc::string::String,
}

// ─── NodeInfoGcsService ────────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetClusterIdRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetClusterIdReply {
    #[prost(bytes = "vec", tag = "1")]
    pub cluster_id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeRequest {
    #[prost(message, optional, tag = "1")]
    pub node_info: ::core::option::Option<GcsNodeInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeReply {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DrainNodeData {
    #[prost(bytes = "vec", tag = "1")]
    pub node_id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DrainNodeRequest {
    #[prost(message, repeated, tag = "1")]
    pub drain_node_data: ::prost::alloc::vec::Vec<DrainNodeData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DrainNodeStatus {
    #[prost(bytes = "vec", tag = "1")]
    pub node_id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DrainNodeReply {
    #[prost(message, repeated, tag = "1")]
    pub drain_node_status: ::prost::alloc::vec::Vec<DrainNodeStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckAliveRequest {
    /// "ip:port" strings, one per raylet to probe.
    #[prost(string, repeated, tag = "1")]
    pub raylet_address: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckAliveReply {
    #[prost(string, tag = "1")]
    pub ray_version: ::prost::alloc::string::String,
    /// Positional, same length as the request addresses.
    #[prost(bool, repeated, tag = "2")]
    pub raylet_alive: ::prost::alloc::vec::Vec<bool>,
    #[prost(bool, repeated, tag = "3")]
    pub raylet_preempted: ::prost::alloc::vec::Vec<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAllNodeInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAllNodeInfoReply {
    #[prost(message, repeated, tag = "1")]
    pub node_info_list: ::prost::alloc::vec::Vec<GcsNodeInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetInternalConfigRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetInternalConfigReply {
    #[prost(string, tag = "1")]
    pub config: ::prost::alloc::string::String,
}

// ─── RayletService (outbound) ──────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShutdownRayletRequest {
    #[prost(bool, tag = "1")]
    pub graceful: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShutdownRayletReply {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyGcsRestartRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyGcsRestartReply {}

// ─── Pub/Sub ───────────────────────────────────────────────────────────────

/// A single published message on a pub/sub channel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubMessage {
    #[prost(int32, tag = "1")]
    pub channel_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub key_id: ::prost::alloc::vec::Vec<u8>,
    /// Per-subscriber delivery sequence, assigned at buffering time.
    #[prost(int64, tag = "3")]
    pub sequence_id: i64,
    #[prost(oneof = "pub_message::InnerMessage", tags = "4, 5")]
    pub inner_message: ::core::option::Option<pub_message::InnerMessage>,
}

pub mod pub_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum InnerMessage {
        #[prost(message, tag = "4")]
        NodeInfoMessage(super::GcsNodeInfo),
        #[prost(message, tag = "5")]
        ErrorInfoMessage(super::ErrorTableData),
    }
}
