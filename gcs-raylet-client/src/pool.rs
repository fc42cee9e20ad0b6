// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Pool of raylet clients keyed by address.

use std::sync::Arc;

use dashmap::DashMap;
use gcs_proto::rpc;

use crate::client::RayletRpcClient;
use crate::traits::RayletClient;

/// Builds a client for an address. Injectable so tests can substitute fakes.
pub type RayletClientFactory = Box<dyn Fn(&rpc::Address) -> Arc<dyn RayletClient> + Send + Sync>;

/// Shared cache of raylet clients, one per `ip:port`.
///
/// The pool itself is thread-safe; the clients it hands out are shared and
/// must be internally thread-safe too.
pub struct RayletClientPool {
    clients: DashMap<String, Arc<dyn RayletClient>>,
    factory: RayletClientFactory,
}

impl RayletClientPool {
    pub fn new(factory: RayletClientFactory) -> Self {
        Self {
            clients: DashMap::new(),
            factory,
        }
    }

    /// Pool backed by real gRPC clients.
    pub fn with_rpc_clients() -> Self {
        Self::new(Box::new(|address: &rpc::Address| -> Arc<dyn RayletClient> {
            Arc::new(RayletRpcClient::connect_lazy(&format!(
                "{}:{}",
                address.ip_address, address.port
            )))
        }))
    }

    /// Get the cached client for an address, connecting if absent.
    pub fn get_or_connect_by_address(&self, address: &rpc::Address) -> Arc<dyn RayletClient> {
        let key = format!("{}:{}", address.ip_address, address.port);
        self.clients
            .entry(key)
            .or_insert_with(|| (self.factory)(address))
            .value()
            .clone()
    }

    /// Number of distinct raylet connections held.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
