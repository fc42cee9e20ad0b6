// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Protobuf wire types for the GCS.
//!
//! These message definitions are maintained by hand as prost structs (the
//! `.proto` schema sources are not vendored into this tree). Field numbers
//! are part of the wire contract; do not renumber.

pub mod rpc;
