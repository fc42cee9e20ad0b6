// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Raylet RPC client backed by a lazily-connected tonic channel.

use gcs_proto::rpc;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::Status;

use crate::traits::RayletClient;

const SHUTDOWN_RAYLET_PATH: &str = "/gcs.rpc.RayletService/ShutdownRaylet";
const NOTIFY_GCS_RESTART_PATH: &str = "/gcs.rpc.RayletService/NotifyGcsRestart";

/// Raylet RPC client speaking the `gcs.rpc.RayletService` methods.
///
/// The channel connects lazily on first use; a raylet that never comes up
/// surfaces as a per-call `unavailable` status rather than a construction
/// failure.
pub struct RayletRpcClient {
    address: String,
    inner: Option<Grpc<Channel>>,
}

impl RayletRpcClient {
    /// Create a client for `ip:port` without connecting yet.
    pub fn connect_lazy(address: &str) -> Self {
        let inner = tonic::transport::Endpoint::from_shared(format!("http://{address}"))
            .map(|endpoint| Grpc::new(endpoint.connect_lazy()))
            .ok();
        if inner.is_none() {
            tracing::error!(address, "invalid raylet address");
        }
        Self {
            address: address.to_string(),
            inner,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn grpc(&self) -> Result<Grpc<Channel>, Status> {
        self.inner
            .clone()
            .ok_or_else(|| Status::invalid_argument(format!("bad raylet address {}", self.address)))
    }

    async fn unary<Req, Resp>(&self, req: Req, path: &'static str) -> Result<Resp, Status>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let mut grpc = self.grpc()?;
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("raylet channel not ready: {e}")))?;
        let codec: tonic::codec::ProstCodec<Req, Resp> = tonic::codec::ProstCodec::default();
        grpc.unary(
            tonic::Request::new(req),
            PathAndQuery::from_static(path),
            codec,
        )
        .await
        .map(|resp| resp.into_inner())
    }
}

#[async_trait::async_trait]
impl RayletClient for RayletRpcClient {
    async fn shutdown_raylet(
        &self,
        req: rpc::ShutdownRayletRequest,
    ) -> Result<rpc::ShutdownRayletReply, Status> {
        self.unary(req, SHUTDOWN_RAYLET_PATH).await
    }

    async fn notify_gcs_restart(
        &self,
        req: rpc::NotifyGcsRestartRequest,
    ) -> Result<rpc::NotifyGcsRestartReply, Status> {
        self.unary(req, NOTIFY_GCS_RESTART_PATH).await
    }
}
