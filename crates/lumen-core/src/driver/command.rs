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

//! Cross-thread command recording.
//!
//! A [`CommandQueue`] can be cloned into any thread. It reserves handles
//! synchronously from the shared [`HandleTable`] and records the realizing half
//! of each call; the render thread replays the recorded calls in order through
//! [`CommandStream::execute_pending`].

use crate::driver::api::*;
use crate::driver::handle_table::HandleTable;
use crate::driver::traits::{Driver, ReadbackCallback};
use std::fmt;
use std::sync::Arc;

/// One recorded driver call.
pub enum Command {
    /// `create_vertex_buffer_r`.
    CreateVertexBuffer(VertexBufferHandle, VertexBufferDescriptor),
    /// `create_index_buffer_r`.
    CreateIndexBuffer(IndexBufferHandle, IndexBufferDescriptor),
    /// `create_texture_r`.
    CreateTexture(TextureHandle, TextureDescriptor),
    /// `create_sampler_group_r`.
    CreateSamplerGroup(SamplerGroupHandle, usize),
    /// `create_uniform_buffer_r`.
    CreateUniformBuffer(UniformBufferHandle, usize, BufferUsage),
    /// `create_render_primitive_r`.
    CreateRenderPrimitive(RenderPrimitiveHandle),
    /// `create_program_r`.
    CreateProgram(ProgramHandle, ProgramDescriptor),
    /// `create_render_target_r`.
    CreateRenderTarget(RenderTargetHandle, RenderTargetDescriptor),
    /// `create_fence_r`.
    CreateFence(FenceHandle),
    /// `update_vertex_buffer`.
    UpdateVertexBuffer(VertexBufferHandle, u8, BufferDescriptor, usize),
    /// `update_index_buffer`.
    UpdateIndexBuffer(IndexBufferHandle, BufferDescriptor, usize),
    /// `load_uniform_buffer`.
    LoadUniformBuffer(UniformBufferHandle, BufferDescriptor),
    /// `update_texture`.
    UpdateTexture(TextureHandle, TextureRegion, PixelBufferDescriptor),
    /// `update_cube_image`.
    UpdateCubeImage(TextureHandle, u8, PixelBufferDescriptor, FaceOffsets),
    /// `generate_mipmaps`.
    GenerateMipmaps(TextureHandle),
    /// `copy_texture_to_memory`.
    CopyTextureToMemory(TextureHandle, TextureRegion, PixelBufferDescriptor, ReadbackCallback),
    /// `update_sampler_group`.
    UpdateSamplerGroup(SamplerGroupHandle, Vec<SamplerGroupEntry>),
    /// `set_render_primitive_buffer`.
    SetRenderPrimitiveBuffer(RenderPrimitiveHandle, VertexBufferHandle, IndexBufferHandle, u32),
    /// `set_render_primitive_range`.
    SetRenderPrimitiveRange {
        /// The primitive.
        primitive: RenderPrimitiveHandle,
        /// Range to draw.
        range: crate::driver::objects::PrimitiveRange,
    },
    /// `destroy_vertex_buffer`.
    DestroyVertexBuffer(VertexBufferHandle),
    /// `destroy_index_buffer`.
    DestroyIndexBuffer(IndexBufferHandle),
    /// `destroy_texture`.
    DestroyTexture(TextureHandle),
    /// `destroy_sampler_group`.
    DestroySamplerGroup(SamplerGroupHandle),
    /// `destroy_uniform_buffer`.
    DestroyUniformBuffer(UniformBufferHandle),
    /// `destroy_render_primitive`.
    DestroyRenderPrimitive(RenderPrimitiveHandle),
    /// `destroy_program`.
    DestroyProgram(ProgramHandle),
    /// `destroy_render_target`.
    DestroyRenderTarget(RenderTargetHandle),
    /// `destroy_fence`.
    DestroyFence(FenceHandle),
    /// `flush`.
    Flush,
}

impl Command {
    /// Replays the call on `driver`.
    pub fn apply(self, driver: &mut dyn Driver) {
        match self {
            Command::CreateVertexBuffer(handle, descriptor) => {
                driver.create_vertex_buffer_r(handle, descriptor)
            }
            Command::CreateIndexBuffer(handle, descriptor) => {
                driver.create_index_buffer_r(handle, descriptor)
            }
            Command::CreateTexture(handle, descriptor) => driver.create_texture_r(handle, descriptor),
            Command::CreateSamplerGroup(handle, size) => driver.create_sampler_group_r(handle, size),
            Command::CreateUniformBuffer(handle, size, usage) => {
                driver.create_uniform_buffer_r(handle, size, usage)
            }
            Command::CreateRenderPrimitive(handle) => driver.create_render_primitive_r(handle),
            Command::CreateProgram(handle, descriptor) => driver.create_program_r(handle, descriptor),
            Command::CreateRenderTarget(handle, descriptor) => {
                driver.create_render_target_r(handle, descriptor)
            }
            Command::CreateFence(handle) => driver.create_fence_r(handle),
            Command::UpdateVertexBuffer(handle, index, data, offset) => {
                driver.update_vertex_buffer(handle, index, data, offset)
            }
            Command::UpdateIndexBuffer(handle, data, offset) => {
                driver.update_index_buffer(handle, data, offset)
            }
            Command::LoadUniformBuffer(handle, data) => driver.load_uniform_buffer(handle, data),
            Command::UpdateTexture(handle, region, data) => driver.update_texture(handle, region, data),
            Command::UpdateCubeImage(handle, level, data, faces) => {
                driver.update_cube_image(handle, level, data, faces)
            }
            Command::GenerateMipmaps(handle) => driver.generate_mipmaps(handle),
            Command::CopyTextureToMemory(handle, region, data, on_complete) => {
                driver.copy_texture_to_memory(handle, region, data, on_complete)
            }
            Command::UpdateSamplerGroup(handle, entries) => driver.update_sampler_group(handle, entries),
            Command::SetRenderPrimitiveBuffer(primitive, vertices, indices, enabled) => {
                driver.set_render_primitive_buffer(primitive, vertices, indices, enabled)
            }
            Command::SetRenderPrimitiveRange { primitive, range } => driver.set_render_primitive_range(
                primitive,
                range.primitive_type,
                range.offset,
                range.min_index,
                range.max_index,
                range.count,
            ),
            Command::DestroyVertexBuffer(handle) => driver.destroy_vertex_buffer(handle),
            Command::DestroyIndexBuffer(handle) => driver.destroy_index_buffer(handle),
            Command::DestroyTexture(handle) => driver.destroy_texture(handle),
            Command::DestroySamplerGroup(handle) => driver.destroy_sampler_group(handle),
            Command::DestroyUniformBuffer(handle) => driver.destroy_uniform_buffer(handle),
            Command::DestroyRenderPrimitive(handle) => driver.destroy_render_primitive(handle),
            Command::DestroyProgram(handle) => driver.destroy_program(handle),
            Command::DestroyRenderTarget(handle) => driver.destroy_render_target(handle),
            Command::DestroyFence(handle) => driver.destroy_fence(handle),
            Command::Flush => driver.flush(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::CreateVertexBuffer(..) => "CreateVertexBuffer",
            Command::CreateIndexBuffer(..) => "CreateIndexBuffer",
            Command::CreateTexture(..) => "CreateTexture",
            Command::CreateSamplerGroup(..) => "CreateSamplerGroup",
            Command::CreateUniformBuffer(..) => "CreateUniformBuffer",
            Command::CreateRenderPrimitive(..) => "CreateRenderPrimitive",
            Command::CreateProgram(..) => "CreateProgram",
            Command::CreateRenderTarget(..) => "CreateRenderTarget",
            Command::CreateFence(..) => "CreateFence",
            Command::UpdateVertexBuffer(..) => "UpdateVertexBuffer",
            Command::UpdateIndexBuffer(..) => "UpdateIndexBuffer",
            Command::LoadUniformBuffer(..) => "LoadUniformBuffer",
            Command::UpdateTexture(..) => "UpdateTexture",
            Command::UpdateCubeImage(..) => "UpdateCubeImage",
            Command::GenerateMipmaps(..) => "GenerateMipmaps",
            Command::CopyTextureToMemory(..) => "CopyTextureToMemory",
            Command::UpdateSamplerGroup(..) => "UpdateSamplerGroup",
            Command::SetRenderPrimitiveBuffer(..) => "SetRenderPrimitiveBuffer",
            Command::SetRenderPrimitiveRange { .. } => "SetRenderPrimitiveRange",
            Command::DestroyVertexBuffer(..) => "DestroyVertexBuffer",
            Command::DestroyIndexBuffer(..) => "DestroyIndexBuffer",
            Command::DestroyTexture(..) => "DestroyTexture",
            Command::DestroySamplerGroup(..) => "DestroySamplerGroup",
            Command::DestroyUniformBuffer(..) => "DestroyUniformBuffer",
            Command::DestroyRenderPrimitive(..) => "DestroyRenderPrimitive",
            Command::DestroyProgram(..) => "DestroyProgram",
            Command::DestroyRenderTarget(..) => "DestroyRenderTarget",
            Command::DestroyFence(..) => "DestroyFence",
            Command::Flush => "Flush",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The producer side: records driver calls from any thread.
#[derive(Clone)]
pub struct CommandQueue {
    table: Arc<HandleTable>,
    sender: flume::Sender<Command>,
}

/// The consumer side, owned by the render thread.
pub struct CommandStream {
    receiver: flume::Receiver<Command>,
}

impl CommandQueue {
    /// Creates a connected queue/stream pair allocating handles from `table`.
    ///
    /// With a `capacity`, recording blocks while that many commands are pending.
    pub fn channel(table: Arc<HandleTable>, capacity: Option<usize>) -> (CommandQueue, CommandStream) {
        let (sender, receiver) = match capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        (CommandQueue { table, sender }, CommandStream { receiver })
    }

    /// Creates a pair sharing `driver`'s handle table.
    pub fn for_driver(driver: &dyn Driver, capacity: Option<usize>) -> (CommandQueue, CommandStream) {
        Self::channel(driver.handle_table().clone(), capacity)
    }

    /// The handle table handles are reserved from.
    pub fn handle_table(&self) -> &Arc<HandleTable> {
        &self.table
    }

    fn record(&self, command: Command) {
        log::trace!("CommandQueue: recording {command:?}");
        if let Err(flume::SendError(command)) = self.sender.send(command) {
            log::warn!("CommandQueue: {command:?} dropped, the command stream is gone");
        }
    }

    /// Records a vertex buffer creation.
    pub fn create_vertex_buffer(&self, descriptor: VertexBufferDescriptor) -> VertexBufferHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateVertexBuffer(handle, descriptor));
        handle
    }

    /// Records an index buffer creation.
    pub fn create_index_buffer(&self, descriptor: IndexBufferDescriptor) -> IndexBufferHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateIndexBuffer(handle, descriptor));
        handle
    }

    /// Records a texture creation.
    pub fn create_texture(&self, descriptor: TextureDescriptor) -> TextureHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateTexture(handle, descriptor));
        handle
    }

    /// Records a sampler group creation.
    pub fn create_sampler_group(&self, size: usize) -> SamplerGroupHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateSamplerGroup(handle, size));
        handle
    }

    /// Records a uniform buffer creation.
    pub fn create_uniform_buffer(&self, size: usize, usage: BufferUsage) -> UniformBufferHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateUniformBuffer(handle, size, usage));
        handle
    }

    /// Records a render primitive creation.
    pub fn create_render_primitive(&self) -> RenderPrimitiveHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateRenderPrimitive(handle));
        handle
    }

    /// Records a program creation.
    pub fn create_program(&self, descriptor: ProgramDescriptor) -> ProgramHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateProgram(handle, descriptor));
        handle
    }

    /// Records an offscreen render target creation.
    pub fn create_render_target(&self, descriptor: RenderTargetDescriptor) -> RenderTargetHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateRenderTarget(handle, descriptor));
        handle
    }

    /// Records a fence, placed after every call recorded before it.
    pub fn create_fence(&self) -> FenceHandle {
        let handle = self.table.reserve();
        self.record(Command::CreateFence(handle));
        handle
    }

    /// Records a vertex buffer update.
    pub fn update_vertex_buffer(&self, handle: VertexBufferHandle, index: u8, data: BufferDescriptor, offset: usize) {
        self.record(Command::UpdateVertexBuffer(handle, index, data, offset));
    }

    /// Records an index buffer update.
    pub fn update_index_buffer(&self, handle: IndexBufferHandle, data: BufferDescriptor, offset: usize) {
        self.record(Command::UpdateIndexBuffer(handle, data, offset));
    }

    /// Records a uniform buffer load.
    pub fn load_uniform_buffer(&self, handle: UniformBufferHandle, data: BufferDescriptor) {
        self.record(Command::LoadUniformBuffer(handle, data));
    }

    /// Records a texture upload.
    pub fn update_texture(&self, handle: TextureHandle, region: TextureRegion, data: PixelBufferDescriptor) {
        self.record(Command::UpdateTexture(handle, region, data));
    }

    /// Records a 2D upload into layer 0.
    #[allow(clippy::too_many_arguments)]
    pub fn update_2d_image(
        &self,
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

    /// Records a cubemap upload.
    pub fn update_cube_image(&self, handle: TextureHandle, level: u8, data: PixelBufferDescriptor, faces: FaceOffsets) {
        self.record(Command::UpdateCubeImage(handle, level, data, faces));
    }

    /// Records a mip chain generation.
    pub fn generate_mipmaps(&self, handle: TextureHandle) {
        self.record(Command::GenerateMipmaps(handle));
    }

    /// Records a texture readback. `on_complete` runs on the render thread.
    pub fn copy_texture_to_memory(
        &self,
        handle: TextureHandle,
        region: TextureRegion,
        data: PixelBufferDescriptor,
        on_complete: ReadbackCallback,
    ) {
        self.record(Command::CopyTextureToMemory(handle, region, data, on_complete));
    }

    /// Records a sampler group update.
    pub fn update_sampler_group(&self, handle: SamplerGroupHandle, entries: Vec<SamplerGroupEntry>) {
        self.record(Command::UpdateSamplerGroup(handle, entries));
    }

    /// Records a render primitive buffer binding.
    pub fn set_render_primitive_buffer(
        &self,
        primitive: RenderPrimitiveHandle,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        enabled_attributes: u32,
    ) {
        self.record(Command::SetRenderPrimitiveBuffer(
            primitive,
            vertex_buffer,
            index_buffer,
            enabled_attributes,
        ));
    }

    /// Records a render primitive range change.
    pub fn set_render_primitive_range(
        &self,
        primitive: RenderPrimitiveHandle,
        primitive_type: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    ) {
        let range = crate::driver::objects::PrimitiveRange {
            primitive_type,
            offset,
            min_index,
            max_index,
            count,
        };
        self.record(Command::SetRenderPrimitiveRange { primitive, range });
    }

    /// Records a vertex buffer destruction.
    pub fn destroy_vertex_buffer(&self, handle: VertexBufferHandle) {
        self.record(Command::DestroyVertexBuffer(handle));
    }

    /// Records an index buffer destruction.
    pub fn destroy_index_buffer(&self, handle: IndexBufferHandle) {
        self.record(Command::DestroyIndexBuffer(handle));
    }

    /// Records a texture destruction.
    pub fn destroy_texture(&self, handle: TextureHandle) {
        self.record(Command::DestroyTexture(handle));
    }

    /// Records a sampler group destruction.
    pub fn destroy_sampler_group(&self, handle: SamplerGroupHandle) {
        self.record(Command::DestroySamplerGroup(handle));
    }

    /// Records a uniform buffer destruction.
    pub fn destroy_uniform_buffer(&self, handle: UniformBufferHandle) {
        self.record(Command::DestroyUniformBuffer(handle));
    }

    /// Records a render primitive destruction.
    pub fn destroy_render_primitive(&self, handle: RenderPrimitiveHandle) {
        self.record(Command::DestroyRenderPrimitive(handle));
    }

    /// Records a program destruction.
    pub fn destroy_program(&self, handle: ProgramHandle) {
        self.record(Command::DestroyProgram(handle));
    }

    /// Records a render target destruction.
    pub fn destroy_render_target(&self, handle: RenderTargetHandle) {
        self.record(Command::DestroyRenderTarget(handle));
    }

    /// Records a fence destruction.
    pub fn destroy_fence(&self, handle: FenceHandle) {
        self.record(Command::DestroyFence(handle));
    }

    /// Records a flush.
    pub fn flush(&self) {
        self.record(Command::Flush);
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.sender.len())
            .finish()
    }
}

impl CommandStream {
    /// Number of recorded commands not yet executed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Executes every command recorded so far, in recording order.
    /// ## Returns
    /// The number of commands executed.
    pub fn execute_pending(&self, driver: &mut dyn Driver) -> usize {
        let mut executed = 0;
        for command in self.receiver.try_iter() {
            command.apply(driver);
            executed += 1;
        }
        if executed > 0 {
            log::trace!("CommandStream: executed {executed} commands");
        }
        executed
    }

    /// Pops one command without executing it.
    pub fn try_next(&self) -> Option<Command> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for CommandStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandStream")
            .field("pending", &self.receiver.len())
            .finish()
    }
}
