// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! gRPC service handlers for the node registry.
//!
//! Each handler decodes its request, dispatches to the node manager, and
//! shapes the reply. Business rules live in the manager.

use std::sync::Arc;

use gcs_common::constants::RAY_VERSION;
use tonic::Status;

use crate::node_manager::GcsNodeManager;

// ─── NodeInfoGcsService ────────────────────────────────────────────────────

pub struct NodeInfoGcsServiceImpl {
    pub node_manager: Arc<GcsNodeManager>,
}

impl NodeInfoGcsServiceImpl {
    pub fn get_cluster_id(
        &self,
        _request: gcs_proto::rpc::GetClusterIdRequest,
    ) -> Result<gcs_proto::rpc::GetClusterIdReply, Status> {
        tracing::debug!("Registering GCS client");
        Ok(gcs_proto::rpc::GetClusterIdReply {
            cluster_id: self.node_manager.handle_get_cluster_id(),
        })
    }

    pub async fn register_node(
        &self,
        request: gcs_proto::rpc::RegisterNodeRequest,
    ) -> Result<gcs_proto::rpc::RegisterNodeReply, Status> {
        let Some(node_info) = request.node_info else {
            return Err(Status::invalid_argument("node_info is required"));
        };
        self.node_manager.handle_register_node(node_info).await?;
        Ok(gcs_proto::rpc::RegisterNodeReply::default())
    }

    pub async fn drain_node(
        &self,
        request: gcs_proto::rpc::DrainNodeRequest,
    ) -> Result<gcs_proto::rpc::DrainNodeReply, Status> {
        self.node_manager.handle_drain_node(request).await
    }

    pub fn check_alive(
        &self,
        request: gcs_proto::rpc::CheckAliveRequest,
    ) -> Result<gcs_proto::rpc::CheckAliveReply, Status> {
        let (raylet_alive, raylet_preempted) =
            self.node_manager.check_alive(&request.raylet_address);
        Ok(gcs_proto::rpc::CheckAliveReply {
            ray_version: RAY_VERSION.to_string(),
            raylet_alive,
            raylet_preempted,
        })
    }

    pub fn get_all_node_info(
        &self,
        _request: gcs_proto::rpc::GetAllNodeInfoRequest,
    ) -> Result<gcs_proto::rpc::GetAllNodeInfoReply, Status> {
        Ok(gcs_proto::rpc::GetAllNodeInfoReply {
            node_info_list: self.node_manager.handle_get_all_node_info(),
        })
    }

    pub async fn get_internal_config(
        &self,
        _request: gcs_proto::rpc::GetInternalConfigRequest,
    ) -> Result<gcs_proto::rpc::GetInternalConfigReply, Status> {
        Ok(gcs_proto::rpc::GetInternalConfigReply {
            config: self.node_manager.handle_get_internal_config().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub_handler::GcsPublisher;
    use crate::store_client::InMemoryStoreClient;
    use crate::table_storage::GcsTableStorage;
    use gcs_common::id::ClusterID;
    use gcs_raylet_client::RayletClientPool;
    use gcs_test_utils::{node_id_with_prefix, node_info, FakeRayletClient};

    fn make_service() -> NodeInfoGcsServiceImpl {
        let store = Arc::new(InMemoryStoreClient::new());
        let storage = Arc::new(GcsTableStorage::new(store));
        let publisher = Arc::new(GcsPublisher::new());
        let raylet = FakeRayletClient::new();
        let pool = Arc::new(RayletClientPool::new(Box::new(
            move |_: &gcs_proto::rpc::Address| -> Arc<dyn gcs_raylet_client::RayletClient> {
                Arc::new(raylet.clone())
            },
        )));
        let node_manager = Arc::new(GcsNodeManager::new(
            storage,
            publisher,
            pool,
            ClusterID::from_random(),
            10,
        ));
        NodeInfoGcsServiceImpl { node_manager }
    }

    #[tokio::test]
    async fn test_register_and_get_all() {
        let svc = make_service();

        svc.register_node(gcs_proto::rpc::RegisterNodeRequest {
            node_info: Some(node_info(1, "10.0.0.1", 9000)),
        })
        .await
        .unwrap();

        let reply = svc
            .get_all_node_info(gcs_proto::rpc::GetAllNodeInfoRequest::default())
            .unwrap();
        assert_eq!(reply.node_info_list.len(), 1);
        assert_eq!(reply.node_info_list[0].node_id[0], 1);
    }

    #[tokio::test]
    async fn test_register_requires_node_info() {
        let svc = make_service();
        let err = svc
            .register_node(gcs_proto::rpc::RegisterNodeRequest { node_info: None })
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_check_alive_reports_version() {
        let svc = make_service();
        svc.register_node(gcs_proto::rpc::RegisterNodeRequest {
            node_info: Some(node_info(1, "10.0.0.1", 9000)),
        })
        .await
        .unwrap();

        let reply = svc
            .check_alive(gcs_proto::rpc::CheckAliveRequest {
                raylet_address: vec!["10.0.0.1:9000".into(), "10.0.0.2:9000".into()],
            })
            .unwrap();
        assert_eq!(reply.ray_version, RAY_VERSION);
        assert_eq!(reply.raylet_alive, vec![true, false]);
        assert_eq!(reply.raylet_preempted, vec![false, false]);
    }

    #[tokio::test]
    async fn test_drain_node_echoes_ids() {
        let svc = make_service();
        let unknown = node_id_with_prefix(5);
        let reply = svc
            .drain_node(gcs_proto::rpc::DrainNodeRequest {
                drain_node_data: vec![gcs_proto::rpc::DrainNodeData {
                    node_id: unknown.binary(),
                }],
            })
            .await
            .unwrap();
        assert_eq!(reply.drain_node_status.len(), 1);
        assert_eq!(reply.drain_node_status[0].node_id, unknown.binary());
    }

    #[tokio::test]
    async fn test_get_cluster_id_and_internal_config() {
        let svc = make_service();
        let reply = svc
            .get_cluster_id(gcs_proto::rpc::GetClusterIdRequest::default())
            .unwrap();
        assert!(!reply.cluster_id.is_empty());

        let reply = svc
            .get_internal_config(gcs_proto::rpc::GetInternalConfigRequest::default())
            .await
            .unwrap();
        assert_eq!(reply.config, "");
    }
}
