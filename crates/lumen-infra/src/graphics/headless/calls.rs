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

//! The native command log of the headless backend.

use super::ledger::NativeId;
use lumen_core::driver::{IndexType, PrimitiveType, SamplerMagFilter, SubmissionIndex};

/// One call the headless backend made into its emulated native API.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    /// A buffer write. `discard` marks the map-discard path of dynamic buffers.
    UpdateBuffer {
        buffer: NativeId,
        offset: usize,
        len: usize,
        discard: bool,
    },
    UpdateTexture {
        texture: NativeId,
        level: u8,
        layer: u32,
        width: u32,
        height: u32,
    },
    CopyTexture {
        dst: NativeId,
        src: NativeId,
        filter: SamplerMagFilter,
    },
    ReadTexture {
        texture: NativeId,
        level: u8,
    },
    GenerateMips {
        texture: NativeId,
    },
    SetRenderTargets {
        color: Option<NativeId>,
        depth: Option<NativeId>,
    },
    /// Viewport in the native top-left origin.
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    SetScissor {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    ClearColor {
        view: NativeId,
        color: [f32; 4],
    },
    ClearDepthStencil {
        view: NativeId,
        depth: Option<f64>,
        stencil: Option<u32>,
    },
    SetShaders {
        vertex: NativeId,
        fragment: NativeId,
    },
    SetRasterState {
        rasterizer: NativeId,
        blend: NativeId,
        depth_stencil: NativeId,
    },
    /// Emitted for every uniform slot at every draw; `None` unbinds the slot.
    SetConstantBuffer {
        slot: usize,
        buffer: Option<NativeId>,
        offset: usize,
        size: usize,
    },
    SetShaderResource {
        group: usize,
        binding: u8,
        view: NativeId,
    },
    SetSampler {
        group: usize,
        binding: u8,
        sampler: NativeId,
    },
    SetInputLayout(NativeId),
    SetVertexBuffers(Vec<NativeId>),
    SetIndexBuffer {
        buffer: NativeId,
        index_type: IndexType,
    },
    DrawIndexed {
        primitive_type: PrimitiveType,
        index_count: u32,
        first_index: u32,
        min_index: u32,
        max_index: u32,
    },
    UnbindShaderResources,
    Present {
        swap_chain: NativeId,
    },
    Submit(SubmissionIndex),
}

impl NativeCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, NativeCall::DrawIndexed { .. })
    }
}
