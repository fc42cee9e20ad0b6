// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! RPC client for reaching raylets from the GCS.
//!
//! The GCS initiates two calls against raylets: a graceful shutdown when a
//! node is drained, and a restart notification prompting resubscription
//! after GCS recovery.

pub mod client;
pub mod pool;
pub mod traits;

pub use client::RayletRpcClient;
pub use pool::{RayletClientFactory, RayletClientPool};
pub use traits::RayletClient;
