// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Async trait for the raylet-facing client.

use gcs_proto::rpc;
use tonic::Status;

/// Async trait for raylet RPC operations initiated by the GCS.
#[async_trait::async_trait]
pub trait RayletClient: Send + Sync {
    /// Ask the raylet to shut down, gracefully or not.
    async fn shutdown_raylet(
        &self,
        req: rpc::ShutdownRayletRequest,
    ) -> Result<rpc::ShutdownRayletReply, Status>;

    /// Tell the raylet the GCS restarted so it re-subscribes.
    async fn notify_gcs_restart(
        &self,
        req: rpc::NotifyGcsRestartRequest,
    ) -> Result<rpc::NotifyGcsRestartReply, Status>;
}
