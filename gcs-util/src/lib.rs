// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Utility library for the GCS: logging setup, wall-clock helpers,
//! counters, and random bytes.

pub mod counter_map;
pub mod logging;
pub mod random;
pub mod time;
