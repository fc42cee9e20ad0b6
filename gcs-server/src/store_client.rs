// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Durable row storage behind the GCS tables.
//!
//! Every membership transition is persisted before it becomes visible in
//! memory, so this layer sits on the critical path of RegisterNode and the
//! death transitions, and eviction of the dead-node cache deletes rows
//! through it. Two backends: a process-local map for single-node
//! deployments, and Redis for clusters whose state must survive a GCS
//! restart.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored row exists but does not decode.
    #[error("corrupt row {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async row storage, namespaced by table.
///
/// Rows are opaque bytes; the typed table layer owns encoding. A put
/// always overwrites: the registry's durable rows are whole-record
/// snapshots, never partial updates, so there is no compare-and-set and
/// no "create only" mode.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Every row of a table, in unspecified order. Used once per process
    /// lifetime, by recovery.
    async fn get_all(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Returns true when the row existed.
    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// Returns how many of the named rows existed.
    async fn batch_delete(&self, table: &str, keys: &[String]) -> StoreResult<u64>;
}

// ─── In-memory backend ─────────────────────────────────────────────────────

/// Process-local store for non-HA deployments.
///
/// All rows live in one ordered map keyed by (table, row key), which makes
/// a table scan a contiguous range rather than a nested-map walk.
pub struct InMemoryStoreClient {
    rows: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryStoreClient {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    fn row_key(table: &str, key: &str) -> (String, String) {
        (table.to_string(), key.to_string())
    }
}

impl Default for InMemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StoreClient for InMemoryStoreClient {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.rows.write().insert(Self::row_key(table, key), value);
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.rows.read().get(&Self::row_key(table, key)).cloned())
    }

    async fn get_all(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let rows = self.rows.read();
        Ok(rows
            .range(Self::row_key(table, "")..)
            .take_while(|(row, _)| row.0 == table)
            .map(|(row, value)| (row.1.clone(), value.clone()))
            .collect())
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        Ok(self.rows.write().remove(&Self::row_key(table, key)).is_some())
    }

    async fn batch_delete(&self, table: &str, keys: &[String]) -> StoreResult<u64> {
        let mut rows = self.rows.write();
        let mut removed = 0;
        for key in keys {
            if rows.remove(&Self::row_key(table, key)).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ─── Redis backend ─────────────────────────────────────────────────────────

/// Redis-backed store. Each table maps to one hash, so a table scan is a
/// single HGETALL and row operations are field operations on that hash.
pub struct RedisStoreClient {
    client: redis::Client,
    namespace: String,
}

impl RedisStoreClient {
    pub fn new(redis_url: &str, namespace: String) -> StoreResult<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { client, namespace })
    }

    fn hash_key(&self, table: &str) -> String {
        format!("GCS{}@{}", self.namespace, table)
    }

    /// Run one command on a fresh multiplexed connection, mapping every
    /// transport or protocol failure to `StoreError::Backend`.
    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> StoreResult<T> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait::async_trait]
impl StoreClient for RedisStoreClient {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(self.hash_key(table)).arg(key).arg(value);
        self.run::<i64>(cmd).await?;
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(self.hash_key(table)).arg(key);
        self.run(cmd).await
    }

    async fn get_all(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(self.hash_key(table));
        let rows: std::collections::HashMap<String, Vec<u8>> = self.run(cmd).await?;
        Ok(rows.into_iter().collect())
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<bool> {
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(self.hash_key(table)).arg(key);
        Ok(self.run::<i64>(cmd).await? > 0)
    }

    async fn batch_delete(&self, table: &str, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(self.hash_key(table));
        for key in keys {
            cmd.arg(key.as_str());
        }
        Ok(self.run::<i64>(cmd).await? as u64)
    }
}
