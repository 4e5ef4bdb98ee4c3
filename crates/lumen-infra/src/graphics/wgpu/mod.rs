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

//! Hardware backend over wgpu.
//!
//! Bind group conventions shared with shaders:
//! * group 0: uniform slot `n` at binding `n`;
//! * group 1: for entry `e` of sampler group `g`, the texture at binding
//!   `(g * 16 + e) * 2` and its sampler at the next binding.
//!
//! Vertex attribute `n` is fed at `@location(n)`.

mod backend;
mod context;
mod conversions;
mod pipelines;
mod resources;

pub use self::backend::WgpuBackend;
pub use self::context::{AdapterPreference, PresentPreference, WgpuConfig, WgpuContext};
pub use self::resources::{
    WgpuIndexBuffer, WgpuPrimitive, WgpuProgram, WgpuRasterState, WgpuRenderTarget, WgpuSampler,
    WgpuSwapChain, WgpuTexture, WgpuUniformBuffer, WgpuVertexBuffer,
};
