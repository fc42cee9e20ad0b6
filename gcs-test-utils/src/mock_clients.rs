// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Fake raylet client for unit testing — records requests for inspection
//! and optionally fails every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use gcs_proto::rpc;
use gcs_raylet_client::RayletClient;
use tonic::Status;

/// Captured request variants from a fake raylet client.
#[derive(Debug, Clone)]
pub enum FakeRayletRequest {
    ShutdownRaylet(rpc::ShutdownRayletRequest),
    NotifyGcsRestart(rpc::NotifyGcsRestartRequest),
}

/// A fake raylet client that records requests for test inspection.
///
/// Clones share the recorded queue, so a clone handed to a client pool
/// factory stays inspectable from the test body.
#[derive(Clone)]
pub struct FakeRayletClient {
    requests: Arc<Mutex<VecDeque<FakeRayletRequest>>>,
    fail_requests: Arc<AtomicBool>,
}

impl FakeRayletClient {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(VecDeque::new())),
            fail_requests: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call reply with `unavailable`.
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Pop the oldest recorded request.
    pub fn pop_request(&self) -> Option<FakeRayletRequest> {
        self.requests.lock().unwrap().pop_front()
    }

    /// Number of recorded requests.
    pub fn num_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of recorded ShutdownRaylet requests.
    pub fn num_shutdown_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, FakeRayletRequest::ShutdownRaylet(_)))
            .count()
    }

    /// Number of recorded NotifyGcsRestart requests.
    pub fn num_restart_notifications(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, FakeRayletRequest::NotifyGcsRestart(_)))
            .count()
    }

    fn push_request(&self, request: FakeRayletRequest) {
        self.requests.lock().unwrap().push_back(request);
    }

    fn maybe_fail(&self) -> Result<(), Status> {
        if self.fail_requests.load(Ordering::SeqCst) {
            Err(Status::unavailable("fake raylet is down"))
        } else {
            Ok(())
        }
    }
}

impl Default for FakeRayletClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RayletClient for FakeRayletClient {
    async fn shutdown_raylet(
        &self,
        req: rpc::ShutdownRayletRequest,
    ) -> Result<rpc::ShutdownRayletReply, Status> {
        self.push_request(FakeRayletRequest::ShutdownRaylet(req));
        self.maybe_fail()?;
        Ok(rpc::ShutdownRayletReply::default())
    }

    async fn notify_gcs_restart(
        &self,
        req: rpc::NotifyGcsRestartRequest,
    ) -> Result<rpc::NotifyGcsRestartReply, Status> {
        self.push_request(FakeRayletRequest::NotifyGcsRestart(req));
        self.maybe_fail()?;
        Ok(rpc::NotifyGcsRestartReply::default())
    }
}
