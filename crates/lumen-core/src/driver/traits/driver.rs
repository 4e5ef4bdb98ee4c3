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

use crate::driver::api::*;
use crate::driver::handle_table::HandleTable;
use std::sync::Arc;
use std::time::Duration;

/// Called with the filled pixel buffer once a readback completes.
pub type ReadbackCallback = Box<dyn FnOnce(PixelBufferDescriptor) + Send>;

/// Capability queries. They never fail; callers fall back on `false`.
pub trait Capabilities {
    /// Returns `true` if textures of `format` can be created and sampled.
    fn is_texture_format_supported(&self, format: TextureFormat) -> bool;

    /// Returns `true` if `format` can be used as a render target attachment.
    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool;

    /// Returns `true` if `generate_mipmaps` is available.
    fn can_generate_mipmaps(&self) -> bool;
}

/// The uniform, handle-based driver API.
///
/// This is the only dynamically dispatched layer: engine code holds a
/// `dyn Driver` (or a `CommandQueue` feeding one) and never sees the backend.
///
/// Creation is two-phase. `create_*_s` reserves a handle and may be called from
/// any thread; `create_*_r` realizes the resource on the render thread. The
/// `create_*` convenience methods do both. Passing a handle that was never
/// created, or was destroyed, to any method is a contract violation. So is
/// calling a pass-scoped method (`bind_*`, `draw`, `set_viewport_scissor`,
/// `end_render_pass`) outside `begin_render_pass`/`end_render_pass`.
pub trait Driver: Capabilities + Send {
    /// Name of the compiled-in backend.
    fn backend_name(&self) -> &'static str;

    /// The handle table shared with command queues.
    fn handle_table(&self) -> &Arc<HandleTable>;

    // --- Frame control ---

    /// Marks the start of frame `frame_id` and retires completed work.
    fn begin_frame(&mut self, frame_id: u32);

    /// Marks the end of frame `frame_id`: submits recorded work and retires
    /// completed work.
    fn end_frame(&mut self, frame_id: u32);

    /// Submits recorded work without waiting.
    fn flush(&mut self);

    /// Submits recorded work and waits for the GPU to become idle.
    fn finish(&mut self);

    /// Selects the swap chains subsequent default-target passes use.
    fn make_current(&mut self, draw: SwapChainHandle, read: SwapChainHandle);

    /// Presents the current back buffer of `swap_chain`.
    fn commit(&mut self, swap_chain: SwapChainHandle);

    /// Notifies the driver that the surface behind `swap_chain` changed size.
    fn resize_swap_chain(&mut self, swap_chain: SwapChainHandle, width: u32, height: u32);

    // --- Creation, synchronous half ---

    /// Reserves a vertex buffer handle.
    fn create_vertex_buffer_s(&self) -> VertexBufferHandle {
        self.handle_table().reserve()
    }
    /// Reserves an index buffer handle.
    fn create_index_buffer_s(&self) -> IndexBufferHandle {
        self.handle_table().reserve()
    }
    /// Reserves a texture handle.
    fn create_texture_s(&self) -> TextureHandle {
        self.handle_table().reserve()
    }
    /// Reserves a sampler group handle.
    fn create_sampler_group_s(&self) -> SamplerGroupHandle {
        self.handle_table().reserve()
    }
    /// Reserves a uniform buffer handle.
    fn create_uniform_buffer_s(&self) -> UniformBufferHandle {
        self.handle_table().reserve()
    }
    /// Reserves a render primitive handle.
    fn create_render_primitive_s(&self) -> RenderPrimitiveHandle {
        self.handle_table().reserve()
    }
    /// Reserves a program handle.
    fn create_program_s(&self) -> ProgramHandle {
        self.handle_table().reserve()
    }
    /// Reserves a render target handle.
    fn create_render_target_s(&self) -> RenderTargetHandle {
        self.handle_table().reserve()
    }
    /// Reserves a fence handle.
    fn create_fence_s(&self) -> FenceHandle {
        self.handle_table().reserve()
    }
    /// Reserves a swap chain handle.
    fn create_swap_chain_s(&self) -> SwapChainHandle {
        self.handle_table().reserve()
    }

    // --- Creation, realizing half ---

    /// Realizes a vertex buffer.
    fn create_vertex_buffer_r(&mut self, handle: VertexBufferHandle, descriptor: VertexBufferDescriptor);
    /// Realizes an index buffer.
    fn create_index_buffer_r(&mut self, handle: IndexBufferHandle, descriptor: IndexBufferDescriptor);
    /// Realizes a texture.
    fn create_texture_r(&mut self, handle: TextureHandle, descriptor: TextureDescriptor);
    /// Realizes a sampler group of `size` empty entries.
    fn create_sampler_group_r(&mut self, handle: SamplerGroupHandle, size: usize);
    /// Realizes a uniform buffer.
    fn create_uniform_buffer_r(&mut self, handle: UniformBufferHandle, size: usize, usage: BufferUsage);
    /// Realizes an unbound render primitive.
    fn create_render_primitive_r(&mut self, handle: RenderPrimitiveHandle);
    /// Compiles and realizes a program.
    fn create_program_r(&mut self, handle: ProgramHandle, descriptor: ProgramDescriptor);
    /// Realizes the default (swap-chain) render target.
    fn create_default_render_target_r(&mut self, handle: RenderTargetHandle);
    /// Realizes an offscreen render target.
    fn create_render_target_r(&mut self, handle: RenderTargetHandle, descriptor: RenderTargetDescriptor);
    /// Realizes a fence on the submission currently recording.
    fn create_fence_r(&mut self, handle: FenceHandle);
    /// Realizes a swap chain.
    fn create_swap_chain_r(&mut self, handle: SwapChainHandle, window: NativeWindow);

    // --- Creation, both halves ---

    /// Creates a vertex buffer.
    fn create_vertex_buffer(&mut self, descriptor: VertexBufferDescriptor) -> VertexBufferHandle {
        let handle = self.create_vertex_buffer_s();
        self.create_vertex_buffer_r(handle, descriptor);
        handle
    }
    /// Creates an index buffer.
    fn create_index_buffer(&mut self, descriptor: IndexBufferDescriptor) -> IndexBufferHandle {
        let handle = self.create_index_buffer_s();
        self.create_index_buffer_r(handle, descriptor);
        handle
    }
    /// Creates a texture.
    fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        let handle = self.create_texture_s();
        self.create_texture_r(handle, descriptor);
        handle
    }
    /// Creates a sampler group.
    fn create_sampler_group(&mut self, size: usize) -> SamplerGroupHandle {
        let handle = self.create_sampler_group_s();
        self.create_sampler_group_r(handle, size);
        handle
    }
    /// Creates a uniform buffer.
    fn create_uniform_buffer(&mut self, size: usize, usage: BufferUsage) -> UniformBufferHandle {
        let handle = self.create_uniform_buffer_s();
        self.create_uniform_buffer_r(handle, size, usage);
        handle
    }
    /// Creates a render primitive.
    fn create_render_primitive(&mut self) -> RenderPrimitiveHandle {
        let handle = self.create_render_primitive_s();
        self.create_render_primitive_r(handle);
        handle
    }
    /// Creates a program.
    fn create_program(&mut self, descriptor: ProgramDescriptor) -> ProgramHandle {
        let handle = self.create_program_s();
        self.create_program_r(handle, descriptor);
        handle
    }
    /// Creates the default render target.
    fn create_default_render_target(&mut self) -> RenderTargetHandle {
        let handle = self.create_render_target_s();
        self.create_default_render_target_r(handle);
        handle
    }
    /// Creates an offscreen render target.
    fn create_render_target(&mut self, descriptor: RenderTargetDescriptor) -> RenderTargetHandle {
        let handle = self.create_render_target_s();
        self.create_render_target_r(handle, descriptor);
        handle
    }
    /// Creates a fence.
    fn create_fence(&mut self) -> FenceHandle {
        let handle = self.create_fence_s();
        self.create_fence_r(handle);
        handle
    }
    /// Creates a swap chain.
    fn create_swap_chain(&mut self, window: NativeWindow) -> SwapChainHandle {
        let handle = self.create_swap_chain_s();
        self.create_swap_chain_r(handle, window);
        handle
    }

    // --- Destruction ---

    /// Destroys a vertex buffer once the GPU is done with it.
    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle);
    /// Destroys an index buffer once the GPU is done with it.
    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle);
    /// Destroys a texture once the GPU is done with it.
    fn destroy_texture(&mut self, handle: TextureHandle);
    /// Destroys a sampler group.
    fn destroy_sampler_group(&mut self, handle: SamplerGroupHandle);
    /// Destroys a uniform buffer once the GPU is done with it.
    fn destroy_uniform_buffer(&mut self, handle: UniformBufferHandle);
    /// Destroys a render primitive once the GPU is done with it.
    fn destroy_render_primitive(&mut self, handle: RenderPrimitiveHandle);
    /// Destroys a program once the GPU is done with it.
    fn destroy_program(&mut self, handle: ProgramHandle);
    /// Destroys a render target once the GPU is done with it.
    fn destroy_render_target(&mut self, handle: RenderTargetHandle);
    /// Destroys a fence.
    fn destroy_fence(&mut self, handle: FenceHandle);
    /// Destroys a swap chain once the GPU is done with it.
    fn destroy_swap_chain(&mut self, handle: SwapChainHandle);

    /// Waits for the GPU, releases every pending and cached object, and shuts the
    /// backend down. No other call may follow.
    fn terminate(&mut self);

    // --- Synchronization ---

    /// Waits at most `timeout` for the work preceding `fence` to complete.
    fn wait(&mut self, fence: FenceHandle, timeout: Duration) -> FenceStatus;

    // --- Updates ---

    /// Writes into native buffer `index` of a vertex buffer.
    fn update_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        index: u8,
        data: BufferDescriptor,
        offset: usize,
    );
    /// Writes into an index buffer.
    fn update_index_buffer(&mut self, handle: IndexBufferHandle, data: BufferDescriptor, offset: usize);
    /// Replaces the leading bytes of a uniform buffer.
    fn load_uniform_buffer(&mut self, handle: UniformBufferHandle, data: BufferDescriptor);
    /// Uploads pixels into a region of a texture.
    fn update_texture(&mut self, handle: TextureHandle, region: TextureRegion, data: PixelBufferDescriptor);
    /// Uploads a 2D region of layer 0.
    #[allow(clippy::too_many_arguments)]
    fn update_2d_image(
        &mut self,
        handle: TextureHandle,
        level: u8,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: PixelBufferDescriptor,
    ) {
        self.update_texture(handle, TextureRegion::new_2d(level, x, y, width, height), data);
    }
    /// Uploads all six faces of a cubemap level.
    fn update_cube_image(
        &mut self,
        handle: TextureHandle,
        level: u8,
        data: PixelBufferDescriptor,
        faces: FaceOffsets,
    );
    /// Regenerates levels `1..levels` from level 0.
    fn generate_mipmaps(&mut self, handle: TextureHandle);
    /// Copies a region between textures.
    fn copy_texture(
        &mut self,
        dst: TextureHandle,
        dst_region: TextureRegion,
        src: TextureHandle,
        src_region: TextureRegion,
        filter: SamplerMagFilter,
    );
    /// Reads a region of a texture back into `data`, then calls `on_complete`.
    fn copy_texture_to_memory(
        &mut self,
        handle: TextureHandle,
        region: TextureRegion,
        data: PixelBufferDescriptor,
        on_complete: ReadbackCallback,
    );
    /// Replaces the leading entries of a sampler group.
    fn update_sampler_group(&mut self, handle: SamplerGroupHandle, entries: Vec<SamplerGroupEntry>);
    /// Points a render primitive at a vertex and an index buffer.
    fn set_render_primitive_buffer(
        &mut self,
        primitive: RenderPrimitiveHandle,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        enabled_attributes: u32,
    );
    /// Sets the range a render primitive draws.
    fn set_render_primitive_range(
        &mut self,
        primitive: RenderPrimitiveHandle,
        primitive_type: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    );

    // --- Passes ---

    /// Starts a render pass into `target`.
    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams);
    /// Ends the current pass and unbinds every uniform buffer and sampler group.
    fn end_render_pass(&mut self);
    /// Changes viewport and scissor inside the current pass.
    fn set_viewport_scissor(&mut self, left: i32, bottom: i32, width: u32, height: u32);
    /// Binds a whole uniform buffer to `slot`. The null handle unbinds.
    fn bind_uniform_buffer(&mut self, slot: usize, handle: UniformBufferHandle);
    /// Binds `size` bytes at `offset` of a uniform buffer to `slot`.
    fn bind_uniform_buffer_range(
        &mut self,
        slot: usize,
        handle: UniformBufferHandle,
        offset: usize,
        size: usize,
    );
    /// Binds a sampler group to `slot`. The null handle unbinds.
    fn bind_samplers(&mut self, slot: usize, handle: SamplerGroupHandle);
    /// Draws `primitive` with `state`.
    fn draw(&mut self, state: &PipelineState, primitive: RenderPrimitiveHandle);
}
