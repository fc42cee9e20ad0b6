// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Global Control Service (GCS) node registry.
//!
//! The node manager is the authoritative record of cluster membership: it
//! accepts raylet registrations, tracks liveness, coordinates
//! autoscaler-driven draining, answers preemption queries, persists node
//! records, and publishes membership changes to cluster subscribers.

pub mod grpc_services;
pub mod health_check_manager;
pub mod node_index;
pub mod node_manager;
pub mod pubsub_handler;
pub mod server;
pub mod store_client;
pub mod table_storage;
