// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Lumen Core
//!
//! Backend-agnostic half of the lumen GPU driver layer: typed handles, resource
//! descriptors, the handle table, pipeline/sampler state caches, the deferred
//! destruction queue, the `Backend` contract every native API implements, and the
//! `Dispatcher` that turns handle-based commands into backend calls.

#![warn(missing_docs)]

pub mod driver;

pub use driver::{
    Backend, CommandQueue, CommandStream, Dispatcher, Driver, DriverConfig, HandleTable,
};
