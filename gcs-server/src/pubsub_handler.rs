// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Pub/sub publisher for GCS state changes.
//!
//! The GCS publishes on exactly two channels: node records (and death
//! deltas) for cluster members, and error events for drivers. External
//! subscribers long-poll with an ack watermark; a message stays queued
//! and is redelivered until the subscriber acknowledges its sequence id,
//! so a dropped poll response loses nothing. In-process consumers attach
//! to a tokio broadcast channel instead.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use gcs_common::id::NodeID;
use gcs_proto::rpc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

/// Channel types for pub/sub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ChannelType {
    /// Full node records and death deltas.
    GcsNodeInfoChannel = 5,
    /// Out-of-band error events for drivers.
    RayErrorInfoChannel = 7,
}

/// Message published on a channel, as seen by broadcast subscribers.
#[derive(Debug, Clone)]
pub struct PubSubMessage {
    pub channel_type: i32,
    pub key_id: Vec<u8>,
    pub value: Vec<u8>,
}

/// Build an error event for the error channel.
pub fn create_error_table_data(
    error_type: &str,
    error_message: String,
    timestamp: u64,
) -> rpc::ErrorTableData {
    rpc::ErrorTableData {
        r#type: error_type.to_string(),
        error_message,
        timestamp,
    }
}

/// Undelivered messages and filters for one long-poll subscriber.
struct SubscriberQueue {
    /// Messages not yet acknowledged, oldest first.
    queue: VecDeque<rpc::PubMessage>,
    /// Sequence id stamped on the next queued message.
    next_sequence_id: i64,
    /// Wakes this subscriber's parked poll, and only this subscriber's.
    wakeup: Arc<Notify>,
    /// channel_type → key filter. An empty key set means every key.
    filters: HashMap<i32, HashSet<Vec<u8>>>,
}

impl SubscriberQueue {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            next_sequence_id: 1,
            wakeup: Arc::new(Notify::new()),
            filters: HashMap::new(),
        }
    }

    fn wants(&self, channel_type: i32, key_id: &[u8]) -> bool {
        match self.filters.get(&channel_type) {
            Some(keys) => keys.is_empty() || keys.contains(key_id),
            None => false,
        }
    }
}

/// The GCS publisher.
pub struct GcsPublisher {
    node_info_tx: broadcast::Sender<PubSubMessage>,
    error_tx: broadcast::Sender<PubSubMessage>,
    subscribers: Mutex<HashMap<Vec<u8>, SubscriberQueue>>,
}

impl GcsPublisher {
    pub fn new() -> Self {
        let (node_info_tx, _) = broadcast::channel(1024);
        let (error_tx, _) = broadcast::channel(1024);
        Self {
            node_info_tx,
            error_tx,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn broadcast_channel(&self, channel_type: i32) -> Option<&broadcast::Sender<PubSubMessage>> {
        if channel_type == ChannelType::GcsNodeInfoChannel as i32 {
            Some(&self.node_info_tx)
        } else if channel_type == ChannelType::RayErrorInfoChannel as i32 {
            Some(&self.error_tx)
        } else {
            None
        }
    }

    /// Publish a node record (full record or death delta) on the node-info
    /// channel.
    pub fn publish_node_info(&self, node_id: &NodeID, node_info: rpc::GcsNodeInfo) {
        self.publish_pubmessage(rpc::PubMessage {
            channel_type: ChannelType::GcsNodeInfoChannel as i32,
            key_id: node_id.binary(),
            sequence_id: 0,
            inner_message: Some(rpc::pub_message::InnerMessage::NodeInfoMessage(node_info)),
        });
    }

    /// Publish an error event to driver subscribers.
    pub fn publish_error(&self, key_id: Vec<u8>, error_data: rpc::ErrorTableData) {
        self.publish_pubmessage(rpc::PubMessage {
            channel_type: ChannelType::RayErrorInfoChannel as i32,
            key_id,
            sequence_id: 0,
            inner_message: Some(rpc::pub_message::InnerMessage::ErrorInfoMessage(error_data)),
        });
    }

    /// Fan a message out: once to the broadcast channel, and once into the
    /// queue of every long-poll subscriber whose filter matches. Each copy
    /// gets that subscriber's next sequence id.
    pub fn publish_pubmessage(&self, message: rpc::PubMessage) {
        let Some(tx) = self.broadcast_channel(message.channel_type) else {
            tracing::warn!(
                channel_type = message.channel_type,
                "dropping publish on unknown channel"
            );
            return;
        };
        let _ = tx.send(PubSubMessage {
            channel_type: message.channel_type,
            key_id: message.key_id.clone(),
            value: prost::Message::encode_to_vec(&message),
        });

        let mut subscribers = self.subscribers.lock();
        for subscriber in subscribers.values_mut() {
            if !subscriber.wants(message.channel_type, &message.key_id) {
                continue;
            }
            let mut queued = message.clone();
            queued.sequence_id = subscriber.next_sequence_id;
            subscriber.next_sequence_id += 1;
            subscriber.queue.push_back(queued);
            subscriber.wakeup.notify_one();
        }
    }

    /// Attach an in-process broadcast receiver to a channel.
    pub fn subscribe(&self, channel_type: i32) -> Option<broadcast::Receiver<PubSubMessage>> {
        self.broadcast_channel(channel_type).map(|tx| tx.subscribe())
    }

    /// Register a subscriber for a channel. A non-empty `key_id` narrows
    /// the subscription to that key; an empty one covers every key.
    pub fn handle_subscribe_command(
        &self,
        subscriber_id: Vec<u8>,
        channel_type: i32,
        key_id: Vec<u8>,
    ) {
        let mut subscribers = self.subscribers.lock();
        let subscriber = subscribers
            .entry(subscriber_id)
            .or_insert_with(SubscriberQueue::new);
        let keys = subscriber.filters.entry(channel_type).or_default();
        if !key_id.is_empty() {
            keys.insert(key_id);
        }
    }

    /// Long poll: drop everything at or below `ack_sequence_id`, then
    /// return the remaining queue, parking until a publish arrives if it
    /// is empty. Returned messages are redelivered on the next poll unless
    /// acknowledged — an unknown subscriber gets an empty reply instead of
    /// a parked one.
    pub async fn handle_subscriber_poll(
        &self,
        subscriber_id: &[u8],
        ack_sequence_id: i64,
    ) -> Vec<rpc::PubMessage> {
        loop {
            let wakeup = {
                let mut subscribers = self.subscribers.lock();
                let Some(subscriber) = subscribers.get_mut(subscriber_id) else {
                    return Vec::new();
                };
                subscriber
                    .queue
                    .retain(|message| message.sequence_id > ack_sequence_id);
                if !subscriber.queue.is_empty() {
                    return subscriber.queue.iter().cloned().collect();
                }
                subscriber.wakeup.clone()
            };
            wakeup.notified().await;
        }
    }

    /// Drop a subscriber, its filters and its queued messages. A parked
    /// poll for it wakes up and returns empty.
    pub fn handle_unsubscribe_command(&self, subscriber_id: &[u8]) {
        let removed = self.subscribers.lock().remove(subscriber_id);
        if let Some(subscriber) = removed {
            subscriber.wakeup.notify_one();
        }
    }
}

impl Default for GcsPublisher {
    fn default() -> Self {
        Self::new()
    }
}
