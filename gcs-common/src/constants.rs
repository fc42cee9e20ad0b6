// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Cluster-wide constants.

/// Length of full-length unique IDs in bytes.
pub const UNIQUE_ID_SIZE: usize = 28;

/// Version string reported to raylets in CheckAlive replies.
pub const RAY_VERSION: &str = "3.0.0.dev0";

/// Default GCS server port.
pub const GCS_SERVER_PORT: u16 = 6379;
