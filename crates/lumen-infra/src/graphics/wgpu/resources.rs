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

use lumen_core::driver::{BufferUsage, IndexType, RasterState, SamplerParams, TextureDescriptor};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Native storage released once the submissions reading it have retired.
#[derive(Debug)]
pub enum WgpuGarbage {
    Buffer(wgpu::Buffer),
    Texture(wgpu::Texture),
}

impl WgpuGarbage {
    pub(crate) fn destroy(self) {
        match self {
            WgpuGarbage::Buffer(buffer) => buffer.destroy(),
            WgpuGarbage::Texture(texture) => texture.destroy(),
        }
    }
}

/// A wgpu buffer that static updates may replace with a larger one.
#[derive(Debug)]
pub struct WgpuBuffer {
    pub(crate) buffer: Mutex<wgpu::Buffer>,
    pub(crate) usage: BufferUsage,
    pub(crate) wgpu_usage: wgpu::BufferUsages,
    pub(crate) label: &'static str,
}

impl WgpuBuffer {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &'static str,
        size: usize,
        usage: BufferUsage,
        wgpu_usage: wgpu::BufferUsages,
    ) -> Self {
        let wgpu_usage = wgpu_usage | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        Self {
            buffer: Mutex::new(allocate_buffer(device, label, size, wgpu_usage)),
            usage,
            wgpu_usage,
            label,
        }
    }

    /// The current native buffer.
    pub fn current(&self) -> wgpu::Buffer {
        lock(&self.buffer).clone()
    }

    pub fn capacity(&self) -> u64 {
        lock(&self.buffer).size()
    }
}

/// Buffer sizes are rounded up to the copy alignment.
pub(crate) fn allocate_buffer(
    device: &wgpu::Device,
    label: &str,
    size: usize,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: align_to(size.max(1) as u64, wgpu::COPY_BUFFER_ALIGNMENT),
        usage,
        mapped_at_creation: false,
    })
}

pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[derive(Debug)]
pub struct WgpuVertexBuffer {
    pub buffers: Vec<WgpuBuffer>,
}

#[derive(Debug)]
pub struct WgpuIndexBuffer {
    pub buffer: WgpuBuffer,
    pub index_type: IndexType,
}

#[derive(Debug)]
pub struct WgpuUniformBuffer {
    pub buffer: WgpuBuffer,
}

/// A texture with a view covering every level and layer.
#[derive(Debug)]
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub descriptor: TextureDescriptor,
}

impl WgpuTexture {
    /// A view of a single level and layer, as render passes and blits need.
    pub(crate) fn single_view(&self, level: u8, layer: u32) -> wgpu::TextureView {
        let is_3d = self.texture.dimension() == wgpu::TextureDimension::D3;
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("lumen single-level view"),
            dimension: Some(if is_3d {
                wgpu::TextureViewDimension::D3
            } else {
                wgpu::TextureViewDimension::D2
            }),
            base_mip_level: level as u32,
            mip_level_count: Some(1),
            base_array_layer: if is_3d { 0 } else { layer },
            array_layer_count: Some(1),
            ..Default::default()
        })
    }
}

/// Bind group slots a program declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SamplerEntry {
    pub(crate) group: usize,
    pub(crate) binding: u8,
}

impl SamplerEntry {
    pub(crate) fn texture_binding(&self) -> u32 {
        (self.group as u32 * 16 + self.binding as u32) * 2
    }
}

#[derive(Debug)]
pub struct WgpuProgram {
    pub(crate) uid: u64,
    pub name: String,
    pub(crate) vertex: wgpu::ShaderModule,
    pub(crate) vertex_entry: String,
    pub(crate) fragment: wgpu::ShaderModule,
    pub(crate) fragment_entry: String,
    pub(crate) uniform_slots: Vec<usize>,
    pub(crate) sampler_entries: Vec<SamplerEntry>,
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pub(crate) sampler_layout: Option<wgpu::BindGroupLayout>,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
}

/// One enabled attribute, fed from its own vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VertexSlot {
    pub(crate) location: u32,
    pub(crate) buffer: u8,
    pub(crate) offset: u64,
    pub(crate) stride: u64,
    pub(crate) format: wgpu::VertexFormat,
}

/// The vertex fetch layout of a primitive, rebuilt whenever its buffers are rebound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VertexLayout {
    pub(crate) slots: Vec<VertexSlot>,
}

#[derive(Debug, Default)]
pub struct WgpuPrimitive {
    pub(crate) layout: Mutex<Option<Arc<VertexLayout>>>,
}

/// A render target attachment view with the format the pipeline must match.
#[derive(Debug, Clone)]
pub struct AttachmentTarget {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub(crate) depth_slice: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct DefaultDepth {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: wgpu::TextureFormat,
}

#[derive(Debug)]
pub enum WgpuRenderTarget {
    /// Renders into the current swap chain; owns a lazily created depth buffer.
    Default {
        depth: Mutex<Option<DefaultDepth>>,
    },
    Offscreen {
        width: u32,
        height: u32,
        samples: u32,
        color: Option<AttachmentTarget>,
        depth_stencil: Option<AttachmentTarget>,
    },
}

#[derive(Debug)]
pub(crate) enum SwapChainTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: Mutex<wgpu::SurfaceConfiguration>,
    },
    /// A window-less back buffer.
    Offscreen {
        texture: Mutex<wgpu::Texture>,
    },
}

#[derive(Debug)]
pub struct WgpuSwapChain {
    pub(crate) target: SwapChainTarget,
    pub(crate) extent: Mutex<(u32, u32)>,
    pub(crate) format: wgpu::TextureFormat,
    pub(crate) frame: Mutex<Option<wgpu::SurfaceTexture>>,
}

/// Raster states are folded into pipelines at draw time.
#[derive(Debug)]
pub struct WgpuRasterState {
    pub state: RasterState,
}

#[derive(Debug)]
pub struct WgpuSampler {
    pub sampler: wgpu::Sampler,
    pub params: SamplerParams,
}

/// Creates an offscreen back buffer.
pub(crate) fn offscreen_back_buffer(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen offscreen back buffer"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_entry_bindings_interleave() {
        let first = SamplerEntry { group: 0, binding: 0 };
        let second = SamplerEntry { group: 0, binding: 1 };
        let other_group = SamplerEntry { group: 2, binding: 3 };
        assert_eq!(first.texture_binding(), 0);
        assert_eq!(second.texture_binding(), 2);
        assert_eq!(other_group.texture_binding(), 70);
    }

    #[test]
    fn test_align_to_copy_alignment() {
        assert_eq!(align_to(1, wgpu::COPY_BUFFER_ALIGNMENT), 4);
        assert_eq!(align_to(12, wgpu::COPY_BUFFER_ALIGNMENT), 12);
        assert_eq!(align_to(13, 256), 256);
    }
}
