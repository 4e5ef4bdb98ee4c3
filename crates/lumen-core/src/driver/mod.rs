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

//! The driver layer: everything between engine-level rendering code and a native
//! graphics API.

pub mod api;
pub mod command;
pub mod config;
pub mod destruction;
pub mod dispatcher;
pub mod error;
pub mod format_selection;
pub mod handle_table;
pub mod objects;
pub mod state_cache;
pub mod traits;

pub use self::api::*;
pub use self::command::{CommandQueue, CommandStream};
pub use self::config::DriverConfig;
pub use self::destruction::{DestructionQueue, SubmissionIndex};
pub use self::dispatcher::Dispatcher;
pub use self::error::{contract_violation, BackendError, ContractError};
pub use self::handle_table::HandleTable;
pub use self::state_cache::StateCache;
pub use self::traits::*;

/// Number of uniform-buffer binding slots a program can use.
pub const UNIFORM_BINDING_COUNT: usize = 8;

/// Number of sampler-group binding slots a program can use.
pub const SAMPLER_BINDING_COUNT: usize = 6;

/// Maximum number of vertex attributes a vertex buffer can describe.
pub const MAX_VERTEX_ATTRIBUTE_COUNT: usize = 16;

/// Maximum number of native buffers a vertex buffer can be made of.
pub const MAX_VERTEX_BUFFER_COUNT: usize = 8;
