// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Typed tables over the raw row store.
//!
//! Each table owns its key discipline: node rows are keyed by the hex form
//! of the node id, and the internal config lives in a single sentinel row.
//! Callers hand over ids and records; raw keys and protobuf bytes never
//! leave this module.

use std::marker::PhantomData;
use std::sync::Arc;

use gcs_common::id::{NodeID, UniqueID};
use gcs_proto::rpc;
use prost::Message;

use crate::store_client::{StoreClient, StoreError, StoreResult};

mod table_names {
    pub const NODE: &str = "Node";
    pub const INTERNAL_CONFIG: &str = "InternalConfig";
}

/// Prost encode/decode core shared by the typed tables.
struct TypedTable<V> {
    name: &'static str,
    store: Arc<dyn StoreClient>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Message + Default> TypedTable<V> {
    fn new(name: &'static str, store: Arc<dyn StoreClient>) -> Self {
        Self {
            name,
            store,
            _marker: PhantomData,
        }
    }

    async fn write(&self, key: &str, value: &V) -> StoreResult<()> {
        self.store.put(self.name, key, value.encode_to_vec()).await
    }

    async fn read(&self, key: &str) -> StoreResult<Option<V>> {
        match self.store.get(self.name, key).await? {
            Some(bytes) => Self::decode_row(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn read_all(&self) -> StoreResult<Vec<V>> {
        self.store
            .get_all(self.name)
            .await?
            .into_iter()
            .map(|(key, bytes)| Self::decode_row(&key, &bytes))
            .collect()
    }

    fn decode_row(key: &str, bytes: &[u8]) -> StoreResult<V> {
        V::decode(bytes).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            detail: e.to_string(),
        })
    }
}

/// Durable node records, keyed by node id.
pub struct NodeTable {
    inner: TypedTable<rpc::GcsNodeInfo>,
}

impl NodeTable {
    pub async fn put(&self, node_id: &NodeID, record: &rpc::GcsNodeInfo) -> StoreResult<()> {
        self.inner.write(&node_id.hex(), record).await
    }

    pub async fn get(&self, node_id: &NodeID) -> StoreResult<Option<rpc::GcsNodeInfo>> {
        self.inner.read(&node_id.hex()).await
    }

    /// Every stored record, live and dead, in unspecified order.
    pub async fn get_all(&self) -> StoreResult<Vec<rpc::GcsNodeInfo>> {
        self.inner.read_all().await
    }

    pub async fn delete(&self, node_id: &NodeID) -> StoreResult<bool> {
        self.inner.store.delete(self.inner.name, &node_id.hex()).await
    }

    pub async fn batch_delete(&self, node_ids: &[NodeID]) -> StoreResult<u64> {
        let keys: Vec<String> = node_ids.iter().map(|id| id.hex()).collect();
        self.inner.store.batch_delete(self.inner.name, &keys).await
    }
}

/// The system config blob. One row, keyed by the nil sentinel id.
pub struct InternalConfigTable {
    inner: TypedTable<rpc::StoredConfig>,
}

impl InternalConfigTable {
    fn sentinel_key() -> String {
        UniqueID::nil().hex()
    }

    pub async fn put(&self, config: &rpc::StoredConfig) -> StoreResult<()> {
        self.inner.write(&Self::sentinel_key(), config).await
    }

    pub async fn get(&self) -> StoreResult<Option<rpc::StoredConfig>> {
        self.inner.read(&Self::sentinel_key()).await
    }
}

/// All GCS tables, created during server initialization.
pub struct GcsTableStorage {
    store_client: Arc<dyn StoreClient>,
}

impl GcsTableStorage {
    pub fn new(store_client: Arc<dyn StoreClient>) -> Self {
        Self { store_client }
    }

    pub fn node_table(&self) -> NodeTable {
        NodeTable {
            inner: TypedTable::new(table_names::NODE, self.store_client.clone()),
        }
    }

    pub fn internal_config_table(&self) -> InternalConfigTable {
        InternalConfigTable {
            inner: TypedTable::new(table_names::INTERNAL_CONFIG, self.store_client.clone()),
        }
    }
}
