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
use crate::driver::destruction::SubmissionIndex;
use crate::driver::error::BackendError;
use crate::driver::objects::PrimitiveRange;
use std::time::Duration;

/// Outcome of a buffer update.
#[derive(Debug)]
pub enum BufferUpdate<G> {
    /// The data was written into the existing native storage.
    InPlace,
    /// The native storage was replaced. The previous storage must outlive every
    /// submission that may still read it, and render primitives bound to the
    /// buffer must be rebound.
    Reallocated(G),
}

/// A uniform buffer range bound to a slot for one draw.
pub struct UniformBinding<'a, B: Backend> {
    /// The buffer.
    pub buffer: &'a B::UniformBuffer,
    /// Byte offset of the range.
    pub offset: usize,
    /// Byte size of the range.
    pub size: usize,
}

/// A texture and its sampler for one draw.
pub struct SamplerBinding<'a, B: Backend> {
    /// Sampler-group binding slot.
    pub group: usize,
    /// Entry index inside the group.
    pub binding: u8,
    /// The texture.
    pub texture: &'a B::Texture,
    /// Descriptor of the texture.
    pub texture_descriptor: &'a TextureDescriptor,
    /// The cached sampler object.
    pub sampler: &'a B::Sampler,
    /// Parameters the sampler was created from.
    pub params: SamplerParams,
}

/// Everything a backend needs to issue one draw, fully resolved.
pub struct DrawCall<'a, B: Backend> {
    /// The program.
    pub program: &'a B::Program,
    /// Descriptor of the program.
    pub program_descriptor: &'a ProgramDescriptor,
    /// Logical raster state.
    pub raster: &'a RasterState,
    /// Cached native raster state.
    pub raster_state: &'a B::RasterState,
    /// Depth bias.
    pub polygon_offset: PolygonOffset,
    /// The primitive's layout object.
    pub primitive: &'a B::PrimitiveLayout,
    /// Vertex buffer.
    pub vertex_buffer: &'a B::VertexBuffer,
    /// Attribute layout of the vertex buffer.
    pub vertex_layout: &'a VertexBufferDescriptor,
    /// Index buffer.
    pub index_buffer: &'a B::IndexBuffer,
    /// Index width.
    pub index_type: IndexType,
    /// Range to draw.
    pub range: PrimitiveRange,
    /// Bitmask of enabled attribute slots.
    pub enabled_attributes: u32,
    /// One entry per uniform slot; `None` means the slot is unbound.
    pub uniforms: &'a [Option<UniformBinding<'a, B>>],
    /// Every sampler the program reads, with its texture.
    pub samplers: &'a [SamplerBinding<'a, B>],
}

/// One attachment handed to `create_render_target`.
pub struct Attachment<'a, B: Backend> {
    /// The texture.
    pub texture: &'a B::Texture,
    /// Descriptor of the texture.
    pub descriptor: &'a TextureDescriptor,
    /// Mip level.
    pub level: u8,
    /// Layer or cubemap face.
    pub layer: u16,
}

/// The attachments of an offscreen render target.
pub struct RenderTargetAttachments<'a, B: Backend> {
    /// Color attachment.
    pub color: Option<Attachment<'a, B>>,
    /// Depth attachment.
    pub depth: Option<Attachment<'a, B>>,
    /// Stencil attachment.
    pub stencil: Option<Attachment<'a, B>>,
}

/// A native graphics API, as seen by the dispatcher.
///
/// Backends are selected at compile time: the dispatcher is generic over
/// `Backend`, so every call below is statically dispatched. Native objects are
/// created here, stored by the dispatcher in the handle table, and handed back by
/// reference. Each `destroy_*` method is called exactly once per object, after the
/// last submission that could reference it has retired.
///
/// Methods returning a [`BackendError`] report native failures; the dispatcher
/// treats all of them as fatal.
pub trait Backend: Send + Sized + 'static {
    /// Native vertex buffer.
    type VertexBuffer: Send + Sync + 'static;
    /// Native index buffer.
    type IndexBuffer: Send + Sync + 'static;
    /// Native uniform buffer.
    type UniformBuffer: Send + Sync + 'static;
    /// Native texture with its views.
    type Texture: Send + Sync + 'static;
    /// Native program.
    type Program: Send + Sync + 'static;
    /// Native per-primitive layout object.
    type PrimitiveLayout: Send + Sync + 'static;
    /// Native render target.
    type RenderTarget: Send + Sync + 'static;
    /// Native swap chain.
    type SwapChain: Send + Sync + 'static;
    /// Native raster/blend/depth-stencil state.
    type RasterState: Send + Sync + 'static;
    /// Native sampler.
    type Sampler: Send + Sync + 'static;
    /// Native storage orphaned by a reallocation, released once it has retired.
    type Garbage: Send + 'static;

    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    // --- Capabilities ---

    /// Returns `true` if textures of `format` can be created and sampled.
    fn is_texture_format_supported(&self, format: TextureFormat) -> bool;

    /// Returns `true` if `format` can be rendered to.
    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool;

    /// Returns `true` if the backend can generate mip chains.
    fn can_generate_mipmaps(&self) -> bool;

    // --- Buffers ---

    /// Creates a vertex buffer sized from the descriptor.
    /// ## Errors
    /// * `BackendError::OutOfMemory` - If a native allocation fails.
    fn create_vertex_buffer(
        &mut self,
        descriptor: &VertexBufferDescriptor,
    ) -> Result<Self::VertexBuffer, BackendError>;

    /// Writes `data` at `offset` into native buffer `index`.
    /// ## Returns
    /// `BufferUpdate::Reallocated` when a static buffer had to grow.
    fn update_vertex_buffer(
        &mut self,
        buffer: &Self::VertexBuffer,
        index: u8,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError>;

    /// Releases a vertex buffer.
    fn destroy_vertex_buffer(&mut self, buffer: &Self::VertexBuffer);

    /// Creates an index buffer.
    fn create_index_buffer(
        &mut self,
        descriptor: &IndexBufferDescriptor,
    ) -> Result<Self::IndexBuffer, BackendError>;

    /// Writes `data` at `offset` into an index buffer.
    fn update_index_buffer(
        &mut self,
        buffer: &Self::IndexBuffer,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError>;

    /// Releases an index buffer.
    fn destroy_index_buffer(&mut self, buffer: &Self::IndexBuffer);

    /// Creates a uniform buffer.
    fn create_uniform_buffer(
        &mut self,
        descriptor: &UniformBufferDescriptor,
    ) -> Result<Self::UniformBuffer, BackendError>;

    /// Replaces the leading bytes of a uniform buffer with `data`.
    fn load_uniform_buffer(
        &mut self,
        buffer: &Self::UniformBuffer,
        data: &[u8],
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError>;

    /// Releases a uniform buffer.
    fn destroy_uniform_buffer(&mut self, buffer: &Self::UniformBuffer);

    // --- Textures ---

    /// Creates a texture, substituting an equivalent native format if needed.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<Self::Texture, BackendError>;

    /// Uploads tightly packed pixels into `region`.
    fn update_texture(
        &mut self,
        texture: &Self::Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Copies `src_region` of `src` into `dst_region` of `dst`, scaling with
    /// `filter` when the extents differ.
    fn copy_texture(
        &mut self,
        dst: &Self::Texture,
        dst_region: &TextureRegion,
        src: &Self::Texture,
        src_region: &TextureRegion,
        filter: SamplerMagFilter,
    ) -> Result<(), BackendError>;

    /// Reads `region` back into `out`, tightly packed.
    fn read_texture(
        &mut self,
        texture: &Self::Texture,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> Result<(), BackendError>;

    /// Regenerates levels `1..levels` from level 0.
    fn generate_mipmaps(&mut self, texture: &Self::Texture) -> Result<(), BackendError>;

    /// Releases a texture and its views.
    fn destroy_texture(&mut self, texture: &Self::Texture);

    // --- Programs ---

    /// Compiles and links a program.
    /// ## Errors
    /// * `BackendError::ShaderCompilation` - If a stage fails to compile.
    fn create_program(
        &mut self,
        descriptor: &ProgramDescriptor,
    ) -> Result<Self::Program, BackendError>;

    /// Releases a program.
    fn destroy_program(&mut self, program: &Self::Program);

    // --- Render primitives ---

    /// Creates the per-primitive layout object.
    fn create_primitive_layout(&mut self) -> Result<Self::PrimitiveLayout, BackendError>;

    /// Points a primitive layout at a vertex and an index buffer.
    fn bind_primitive_buffers(
        &mut self,
        primitive: &Self::PrimitiveLayout,
        vertex_buffer: &Self::VertexBuffer,
        vertex_layout: &VertexBufferDescriptor,
        index_buffer: &Self::IndexBuffer,
        enabled_attributes: u32,
    ) -> Result<(), BackendError>;

    /// Releases a primitive layout object.
    fn destroy_primitive_layout(&mut self, primitive: &Self::PrimitiveLayout);

    // --- Render targets and swap chains ---

    /// Creates the implicit target that renders into the current swap chain.
    fn create_default_render_target(&mut self) -> Result<Self::RenderTarget, BackendError>;

    /// Creates an offscreen render target over existing textures.
    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
        attachments: RenderTargetAttachments<'_, Self>,
    ) -> Result<Self::RenderTarget, BackendError>;

    /// Makes sure the default target has a `width x height` depth buffer of
    /// `depth_format`, creating it on first use.
    /// ## Returns
    /// The previous depth buffer when it had to be recreated for a new extent.
    fn prepare_default_target(
        &mut self,
        target: &Self::RenderTarget,
        width: u32,
        height: u32,
        depth_format: TextureFormat,
    ) -> Result<Option<Self::Garbage>, BackendError>;

    /// Releases a render target. Attachment textures are not owned by it.
    fn destroy_render_target(&mut self, target: &Self::RenderTarget);

    /// Creates a swap chain presenting to `window`.
    fn create_swap_chain(&mut self, window: &NativeWindow) -> Result<Self::SwapChain, BackendError>;

    /// Current back buffer extent.
    fn swap_chain_extent(&self, swap_chain: &Self::SwapChain) -> (u32, u32);

    /// Resizes the back buffers.
    fn resize_swap_chain(
        &mut self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Selects the swap chains drawn into and read from.
    fn make_current(
        &mut self,
        draw: &Self::SwapChain,
        read: &Self::SwapChain,
    ) -> Result<(), BackendError>;

    /// Presents the current back buffer. May block until the presentation engine
    /// accepts the frame.
    fn present(&mut self, swap_chain: &Self::SwapChain) -> Result<(), BackendError>;

    /// Releases a swap chain.
    fn destroy_swap_chain(&mut self, swap_chain: &Self::SwapChain);

    // --- Pipeline state ---

    /// Materializes a raster state.
    fn create_raster_state(&mut self, state: &RasterState) -> Result<Self::RasterState, BackendError>;

    /// Releases a raster state. Only called at teardown.
    fn destroy_raster_state(&mut self, state: &Self::RasterState);

    /// Materializes a sampler.
    fn create_sampler(&mut self, params: &SamplerParams) -> Result<Self::Sampler, BackendError>;

    /// Releases a sampler. Only called at teardown.
    fn destroy_sampler(&mut self, sampler: &Self::Sampler);

    // --- Passes ---

    /// Starts a render pass. `swap_chain` is set for the default target.
    fn begin_render_pass(
        &mut self,
        target: &Self::RenderTarget,
        swap_chain: Option<&Self::SwapChain>,
        params: &RenderPassParams,
    ) -> Result<(), BackendError>;

    /// Changes viewport and scissor inside the current pass.
    fn set_viewport_scissor(&mut self, viewport: &Viewport);

    /// Issues one indexed draw.
    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), BackendError>;

    /// Ends the current render pass.
    fn end_render_pass(&mut self) -> Result<(), BackendError>;

    // --- Timeline ---

    /// Index of the submission currently being recorded.
    fn recording_submission(&self) -> SubmissionIndex;

    /// Submits the recorded work and returns its index.
    fn submit(&mut self) -> Result<SubmissionIndex, BackendError>;

    /// Highest submission known to have completed on the GPU.
    fn completed_submission(&mut self) -> SubmissionIndex;

    /// Waits at most `timeout` for submission `index` to complete.
    fn wait_submission(&mut self, index: SubmissionIndex, timeout: Duration) -> FenceStatus;

    /// Blocks until every submitted command has completed.
    fn finish(&mut self) -> Result<(), BackendError>;

    /// Releases storage orphaned by a reallocation.
    fn release_garbage(&mut self, garbage: Self::Garbage);

    /// Releases the device. No other call follows.
    fn terminate(&mut self);
}
