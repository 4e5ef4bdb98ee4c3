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

//! The dispatcher: the one implementation of [`Driver`], generic over the backend.
//!
//! It owns the backend, the state caches, the deferred destruction queue and the
//! binding state of the current render pass. Every entry point validates its
//! arguments, resolves handles through the [`HandleTable`], and forwards resolved
//! native objects to the backend.

use crate::driver::api::*;
use crate::driver::config::DriverConfig;
use crate::driver::destruction::{DestructionQueue, SubmissionIndex};
use crate::driver::error::{contract_violation, ContractError, OrFatal};
use crate::driver::handle_table::HandleTable;
use crate::driver::objects::*;
use crate::driver::state_cache::{CacheStats, StateCache};
use crate::driver::traits::*;
use crate::driver::{SAMPLER_BINDING_COUNT, UNIFORM_BINDING_COUNT};
use crate::ensure_contract;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Realized vertex buffer of backend `B`.
pub type VertexBufferObject<B> = Realized<VertexBufferDescriptor, <B as Backend>::VertexBuffer>;
/// Realized index buffer of backend `B`.
pub type IndexBufferObject<B> = Realized<IndexBufferDescriptor, <B as Backend>::IndexBuffer>;
/// Realized uniform buffer of backend `B`.
pub type UniformBufferObject<B> = Realized<UniformBufferDescriptor, <B as Backend>::UniformBuffer>;
/// Realized texture of backend `B`.
pub type TextureObject<B> = Realized<TextureDescriptor, <B as Backend>::Texture>;
/// Realized program of backend `B`.
pub type ProgramObject<B> = Realized<ProgramDescriptor, <B as Backend>::Program>;
/// Realized render target of backend `B`.
pub type RenderTargetObject<B> = Realized<RenderTargetKind, <B as Backend>::RenderTarget>;
/// Realized swap chain of backend `B`.
pub type SwapChainObject<B> = Realized<(), <B as Backend>::SwapChain>;
/// Realized render primitive of backend `B`.
pub type PrimitiveObject<B> = RenderPrimitive<<B as Backend>::PrimitiveLayout>;

#[derive(Debug, Clone, Copy)]
struct UniformSlot {
    buffer: UniformBufferHandle,
    offset: usize,
    /// `None` binds the whole buffer.
    size: Option<usize>,
}

/// A static buffer that outgrew its creation descriptor.
#[derive(Debug, Clone, Default)]
struct GrownBuffer {
    /// Bumped every time the native storage is reallocated.
    epoch: u64,
    /// Bytes written so far, by native buffer index, once past the created size.
    sizes: HashMap<u8, usize>,
}

#[derive(Debug, Clone, Copy)]
struct ActivePass {
    target: RenderTargetHandle,
    width: u32,
    height: u32,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatcherStats {
    /// Raster state cache counters.
    pub raster_states: CacheStats,
    /// Distinct raster states created.
    pub raster_state_count: usize,
    /// Sampler cache counters.
    pub samplers: CacheStats,
    /// Distinct samplers created.
    pub sampler_count: usize,
    /// Teardowns waiting for their submission to retire.
    pub pending_destructions: usize,
    /// Teardowns run so far.
    pub retired_destructions: u64,
    /// Draws issued.
    pub draws: u64,
}

/// Statically dispatched [`Driver`] implementation over backend `B`.
pub struct Dispatcher<B: Backend> {
    backend: B,
    table: Arc<HandleTable>,
    config: DriverConfig,
    raster_states: StateCache<RasterStateKey, B::RasterState>,
    samplers: StateCache<SamplerKey, B::Sampler>,
    destruction: DestructionQueue<B>,
    pass: Option<ActivePass>,
    draw_swap_chain: SwapChainHandle,
    read_swap_chain: SwapChainHandle,
    uniform_bindings: [Option<UniformSlot>; UNIFORM_BINDING_COUNT],
    sampler_bindings: [SamplerGroupHandle; SAMPLER_BINDING_COUNT],
    grown_buffers: HashMap<HandleId, GrownBuffer>,
    frame: Option<u32>,
    draws: u64,
    terminated: bool,
}

impl<B: Backend> Dispatcher<B> {
    /// Wraps `backend` with a fresh handle table.
    pub fn new(backend: B, config: DriverConfig) -> Self {
        Self::with_handle_table(backend, config, Arc::new(HandleTable::new()))
    }

    /// Wraps `backend`, allocating handles from an existing table.
    pub fn with_handle_table(backend: B, config: DriverConfig, table: Arc<HandleTable>) -> Self {
        log::info!(
            "Dispatcher '{}' initialized over the {} backend.",
            config.label,
            backend.name()
        );
        Self {
            backend,
            table,
            config,
            raster_states: StateCache::new(),
            samplers: StateCache::new(),
            destruction: DestructionQueue::new(),
            pass: None,
            draw_swap_chain: SwapChainHandle::NULL,
            read_swap_chain: SwapChainHandle::NULL,
            uniform_bindings: [None; UNIFORM_BINDING_COUNT],
            sampler_bindings: [SamplerGroupHandle::NULL; SAMPLER_BINDING_COUNT],
            grown_buffers: HashMap::new(),
            frame: None,
            draws: 0,
            terminated: false,
        }
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns `true` between `begin_render_pass` and `end_render_pass`.
    pub fn is_in_render_pass(&self) -> bool {
        self.pass.is_some()
    }

    /// Returns the frame opened by `begin_frame`, if any.
    pub fn current_frame(&self) -> Option<u32> {
        self.frame
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            raster_states: self.raster_states.stats(),
            raster_state_count: self.raster_states.len(),
            samplers: self.samplers.stats(),
            sampler_count: self.samplers.len(),
            pending_destructions: self.destruction.len(),
            retired_destructions: self.destruction.retired_count(),
            draws: self.draws,
        }
    }

    /// The cached native object for `state`, created on first use.
    pub fn raster_state(&mut self, state: &RasterState) -> Arc<B::RasterState> {
        let backend = &mut self.backend;
        self.raster_states
            .get_or_create(state.key(), || backend.create_raster_state(state))
            .or_fatal("raster state creation")
    }

    /// The cached native sampler for `params`, created on first use.
    pub fn sampler(&mut self, params: &SamplerParams) -> Arc<B::Sampler> {
        let backend = &mut self.backend;
        self.samplers
            .get_or_create(params.key(), || backend.create_sampler(params))
            .or_fatal("sampler creation")
    }

    // --- Internal helpers ---

    fn lifecycle(&self, message: fmt::Arguments<'_>) {
        if self.config.log_resource_lifecycle {
            log::debug!("Dispatcher: {message}");
        } else {
            log::trace!("Dispatcher: {message}");
        }
    }

    /// Resolves a handle that must not be null.
    #[track_caller]
    fn object<K: HandleKind, T: Any + Send + Sync>(&self, handle: Handle<K>, operation: &str) -> Arc<T> {
        ensure_contract!(!self.terminated, "{operation} called after terminate");
        match self.table.lookup(handle) {
            Some(object) => object,
            None => contract_violation(format_args!("{operation} received a null {:?}", K::KIND)),
        }
    }

    #[track_caller]
    fn require_pass(&self, operation: &str) -> ActivePass {
        match self.pass {
            Some(pass) => pass,
            None => contract_violation(format_args!("{operation} called outside a render pass")),
        }
    }

    #[track_caller]
    fn require_no_pass(&self, operation: &str) {
        ensure_contract!(
            self.pass.is_none(),
            "{operation} called inside a render pass"
        );
    }

    #[track_caller]
    fn require_alive(&self, operation: &str) {
        ensure_contract!(!self.terminated, "{operation} called after terminate");
    }

    /// Attaches `teardown` to the submission currently recording.
    fn schedule_destroy(&mut self, teardown: impl FnOnce(&mut B) + Send + 'static) {
        let submission = self.backend.recording_submission();
        self.destruction.schedule(submission, teardown);
    }

    /// Hands a consumed payload back once the GPU can no longer read it.
    fn release_payload(&mut self, data: Vec<u8>, callback: Option<ReleaseCallback>) {
        if let Some(callback) = callback {
            self.schedule_destroy(move |_| callback(data));
        }
    }

    fn retire(&mut self) -> usize {
        let completed = self.backend.completed_submission();
        let retired = self.destruction.retire(completed, &mut self.backend);
        if retired > 0 {
            log::trace!("Dispatcher: retired {retired} teardowns up to submission {completed}");
        }
        retired
    }

    fn submit(&mut self, operation: &str) -> SubmissionIndex {
        self.backend.submit().or_fatal(operation)
    }

    fn epoch(&self, id: HandleId) -> u64 {
        self.grown_buffers.get(&id).map_or(0, |grown| grown.epoch)
    }

    /// Records that native buffer `index` of `id` now holds `end` bytes, when that
    /// is past both its created size and any earlier growth.
    fn record_extent(&mut self, id: HandleId, index: u8, end: usize, created: usize) {
        if end > created {
            let grown = self.grown_buffers.entry(id).or_default();
            let size = grown.sizes.entry(index).or_insert(created);
            *size = (*size).max(end);
        }
    }

    /// Indices an index buffer currently holds.
    fn index_capacity(&self, id: HandleId, descriptor: &IndexBufferDescriptor) -> u64 {
        match self.grown_buffers.get(&id).and_then(|grown| grown.sizes.get(&0)) {
            Some(&bytes) => (bytes / descriptor.index_type.size() as usize) as u64,
            None => descriptor.index_count as u64,
        }
    }

    /// Whole vertices a vertex buffer currently holds across all its native buffers.
    fn vertex_capacity(&self, id: HandleId, descriptor: &VertexBufferDescriptor) -> u64 {
        let Some(sizes) = self
            .grown_buffers
            .get(&id)
            .map(|grown| &grown.sizes)
            .filter(|sizes| !sizes.is_empty())
        else {
            return descriptor.vertex_count as u64;
        };
        (0..descriptor.buffer_count)
            .map(|index| {
                let bytes = sizes
                    .get(&index)
                    .copied()
                    .unwrap_or_else(|| descriptor.buffer_size(index));
                descriptor.vertices_in(index, bytes)
            })
            .min()
            .unwrap_or(0)
    }

    fn handle_buffer_update(&mut self, id: HandleId, update: BufferUpdate<B::Garbage>) {
        if let BufferUpdate::Reallocated(previous) = update {
            self.grown_buffers.entry(id).or_default().epoch += 1;
            self.lifecycle(format_args!("buffer #{id} reallocated, dependent primitives will rebind"));
            self.schedule_destroy(move |backend| backend.release_garbage(previous));
        }
    }

    /// End of a write of `len` bytes at `offset`. An end past `usize::MAX` is out
    /// of bounds of any buffer.
    #[track_caller]
    fn write_end(offset: usize, len: usize, capacity: usize, operation: &str) -> usize {
        match offset.checked_add(len) {
            Some(end) => end,
            None => Err(ContractError::OutOfBounds {
                offset,
                len,
                capacity,
            })
            .or_fatal(operation),
        }
    }

    #[track_caller]
    fn check_region(descriptor: &TextureDescriptor, region: &TextureRegion, operation: &str) {
        ensure_contract!(
            region.level < descriptor.levels,
            "{operation}: level {} of a {}-level texture",
            region.level,
            descriptor.levels
        );
        let (width, height, depth) = descriptor.level_extent(region.level);
        let depth = depth.max(descriptor.layer_count());
        let fits = |offset: u32, extent: u32, size: u32| {
            extent > 0 && offset.checked_add(extent).is_some_and(|end| end <= size)
        };
        ensure_contract!(
            fits(region.offset.x, region.extent.width, width)
                && fits(region.offset.y, region.extent.height, height)
                && fits(region.offset.z, region.extent.depth, depth),
            "{operation}: region {region:?} exceeds level {} ({width}x{height}x{depth})",
            region.level
        );
    }

    fn resolve_attachment<'a>(
        objects: &'a [(TargetBufferFlags, Arc<TextureObject<B>>, TargetBufferInfo)],
        flag: TargetBufferFlags,
    ) -> Option<Attachment<'a, B>> {
        objects
            .iter()
            .find(|(candidate, _, _)| *candidate == flag)
            .map(|(_, texture, info)| Attachment {
                texture: &texture.native,
                descriptor: &texture.descriptor,
                level: info.level,
                layer: info.layer,
            })
    }
}

impl<B: Backend> Capabilities for Dispatcher<B> {
    fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
        self.backend.is_texture_format_supported(format)
    }

    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
        self.backend.is_render_target_format_supported(format)
    }

    fn can_generate_mipmaps(&self) -> bool {
        self.backend.can_generate_mipmaps()
    }
}

impl<B: Backend> Driver for Dispatcher<B> {
    fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn handle_table(&self) -> &Arc<HandleTable> {
        &self.table
    }

    // --- Frame control ---

    fn begin_frame(&mut self, frame_id: u32) {
        self.require_alive("beginFrame");
        log::trace!("Dispatcher: begin frame {frame_id}");
        self.frame = Some(frame_id);
        self.retire();
    }

    fn end_frame(&mut self, frame_id: u32) {
        self.require_no_pass("endFrame");
        if self.frame != Some(frame_id) {
            log::warn!(
                "Dispatcher: endFrame({frame_id}) does not match the open frame {:?}",
                self.frame
            );
        }
        self.submit("endFrame");
        self.frame = None;
        self.retire();
    }

    fn flush(&mut self) {
        self.require_no_pass("flush");
        self.submit("flush");
        self.retire();
    }

    fn finish(&mut self) {
        self.require_no_pass("finish");
        self.submit("finish");
        self.backend.finish().or_fatal("finish");
        self.retire();
    }

    fn make_current(&mut self, draw: SwapChainHandle, read: SwapChainHandle) {
        self.require_no_pass("makeCurrent");
        let read = if read.is_null() { draw } else { read };
        let draw_chain: Arc<SwapChainObject<B>> = self.object(draw, "makeCurrent");
        let read_chain: Arc<SwapChainObject<B>> = self.object(read, "makeCurrent");
        self.backend
            .make_current(&draw_chain.native, &read_chain.native)
            .or_fatal("makeCurrent");
        self.draw_swap_chain = draw;
        self.read_swap_chain = read;
    }

    fn commit(&mut self, swap_chain: SwapChainHandle) {
        self.require_no_pass("commit");
        let chain: Arc<SwapChainObject<B>> = self.object(swap_chain, "commit");
        self.submit("commit");
        self.backend.present(&chain.native).or_fatal("commit");
        self.retire();
    }

    fn resize_swap_chain(&mut self, swap_chain: SwapChainHandle, width: u32, height: u32) {
        self.require_no_pass("resizeSwapChain");
        ensure_contract!(width > 0 && height > 0, "resizeSwapChain: zero extent");
        let chain: Arc<SwapChainObject<B>> = self.object(swap_chain, "resizeSwapChain");
        self.backend
            .resize_swap_chain(&chain.native, width, height)
            .or_fatal("resizeSwapChain");
        self.lifecycle(format_args!("{swap_chain:?} resized to {width}x{height}"));
    }

    // --- Creation ---

    fn create_vertex_buffer_r(&mut self, handle: VertexBufferHandle, descriptor: VertexBufferDescriptor) {
        self.require_alive("createVertexBuffer");
        descriptor.validate().or_fatal("createVertexBuffer");
        let native = self
            .backend
            .create_vertex_buffer(&descriptor)
            .or_fatal("createVertexBuffer");
        self.lifecycle(format_args!(
            "created {handle:?} ({} vertices, {} buffers)",
            descriptor.vertex_count, descriptor.buffer_count
        ));
        self.table.construct(handle, Realized::new(descriptor, native));
    }

    fn create_index_buffer_r(&mut self, handle: IndexBufferHandle, descriptor: IndexBufferDescriptor) {
        self.require_alive("createIndexBuffer");
        descriptor.validate().or_fatal("createIndexBuffer");
        let native = self
            .backend
            .create_index_buffer(&descriptor)
            .or_fatal("createIndexBuffer");
        self.lifecycle(format_args!(
            "created {handle:?} ({} x {:?})",
            descriptor.index_count, descriptor.index_type
        ));
        self.table.construct(handle, Realized::new(descriptor, native));
    }

    fn create_texture_r(&mut self, handle: TextureHandle, descriptor: TextureDescriptor) {
        self.require_alive("createTexture");
        descriptor.validate().or_fatal("createTexture");
        ensure_contract!(
            self.backend.is_texture_format_supported(descriptor.format),
            "createTexture: {:?} is not supported by the {} backend",
            descriptor.format,
            self.backend.name()
        );
        let attachment = TextureUsage::COLOR_ATTACHMENT
            | TextureUsage::DEPTH_ATTACHMENT
            | TextureUsage::STENCIL_ATTACHMENT;
        if descriptor.usage.intersects(attachment) {
            ensure_contract!(
                self.backend.is_render_target_format_supported(descriptor.format),
                "createTexture: {:?} cannot be rendered to by the {} backend",
                descriptor.format,
                self.backend.name()
            );
        }
        let native = self
            .backend
            .create_texture(&descriptor)
            .or_fatal("createTexture");
        self.lifecycle(format_args!(
            "created {handle:?} ({}x{}x{} {:?}, {} levels)",
            descriptor.width, descriptor.height, descriptor.depth, descriptor.format, descriptor.levels
        ));
        self.table.construct(handle, Realized::new(descriptor, native));
    }

    fn create_sampler_group_r(&mut self, handle: SamplerGroupHandle, size: usize) {
        self.require_alive("createSamplerGroup");
        self.table.construct(handle, SamplerGroup::new(size));
    }

    fn create_uniform_buffer_r(&mut self, handle: UniformBufferHandle, size: usize, usage: BufferUsage) {
        self.require_alive("createUniformBuffer");
        let descriptor = UniformBufferDescriptor { size, usage };
        descriptor.validate().or_fatal("createUniformBuffer");
        let native = self
            .backend
            .create_uniform_buffer(&descriptor)
            .or_fatal("createUniformBuffer");
        self.lifecycle(format_args!("created {handle:?} ({size} bytes, {usage:?})"));
        self.table.construct(handle, Realized::new(descriptor, native));
    }

    fn create_render_primitive_r(&mut self, handle: RenderPrimitiveHandle) {
        self.require_alive("createRenderPrimitive");
        let native = self
            .backend
            .create_primitive_layout()
            .or_fatal("createRenderPrimitive");
        self.table.construct(handle, RenderPrimitive::new(native));
    }

    fn create_program_r(&mut self, handle: ProgramHandle, descriptor: ProgramDescriptor) {
        self.require_alive("createProgram");
        descriptor.validate().or_fatal("createProgram");
        let native = self
            .backend
            .create_program(&descriptor)
            .or_fatal("createProgram");
        self.lifecycle(format_args!("created {handle:?} '{}'", descriptor.name));
        self.table.construct(handle, Realized::new(descriptor, native));
    }

    fn create_default_render_target_r(&mut self, handle: RenderTargetHandle) {
        self.require_alive("createDefaultRenderTarget");
        let native = self
            .backend
            .create_default_render_target()
            .or_fatal("createDefaultRenderTarget");
        self.table
            .construct(handle, Realized::new(RenderTargetKind::Default, native));
    }

    fn create_render_target_r(&mut self, handle: RenderTargetHandle, descriptor: RenderTargetDescriptor) {
        self.require_alive("createRenderTarget");
        descriptor.validate().or_fatal("createRenderTarget");

        let required = [
            (TargetBufferFlags::COLOR, descriptor.color, TextureUsage::COLOR_ATTACHMENT),
            (TargetBufferFlags::DEPTH, descriptor.depth, TextureUsage::DEPTH_ATTACHMENT),
            (TargetBufferFlags::STENCIL, descriptor.stencil, TextureUsage::STENCIL_ATTACHMENT),
        ];
        let mut objects = Vec::new();
        for (flag, info, usage) in required {
            if !descriptor.flags.contains(flag) {
                continue;
            }
            let texture: Arc<TextureObject<B>> = self.object(info.handle, "createRenderTarget");
            let texture_descriptor = &texture.descriptor;
            ensure_contract!(
                texture_descriptor.usage.contains(usage),
                "createRenderTarget: {:?} lacks {usage:?}",
                info.handle
            );
            ensure_contract!(
                info.level < texture_descriptor.levels
                    && (info.layer as u32) < texture_descriptor.layer_count().max(texture_descriptor.depth),
                "createRenderTarget: level {} layer {} out of range for {:?}",
                info.level,
                info.layer,
                info.handle
            );
            let (width, height, _) = texture_descriptor.level_extent(info.level);
            ensure_contract!(
                width >= descriptor.width && height >= descriptor.height,
                "createRenderTarget: {:?} level {} is {width}x{height}, smaller than the target",
                info.handle,
                info.level
            );
            objects.push((flag, texture, info));
        }

        let attachments = RenderTargetAttachments {
            color: Self::resolve_attachment(&objects, TargetBufferFlags::COLOR),
            depth: Self::resolve_attachment(&objects, TargetBufferFlags::DEPTH),
            stencil: Self::resolve_attachment(&objects, TargetBufferFlags::STENCIL),
        };
        let native = self
            .backend
            .create_render_target(&descriptor, attachments)
            .or_fatal("createRenderTarget");
        self.lifecycle(format_args!(
            "created {handle:?} ({}x{}, {:?})",
            descriptor.width, descriptor.height, descriptor.flags
        ));
        self.table.construct(
            handle,
            Realized::new(RenderTargetKind::Offscreen(descriptor), native),
        );
    }

    fn create_fence_r(&mut self, handle: FenceHandle) {
        self.require_alive("createFence");
        let submission = self.backend.recording_submission();
        self.table.construct(handle, Fence { submission });
    }

    fn create_swap_chain_r(&mut self, handle: SwapChainHandle, window: NativeWindow) {
        self.require_alive("createSwapChain");
        let (width, height) = window.extent();
        ensure_contract!(width > 0 && height > 0, "createSwapChain: zero extent");
        let native = self
            .backend
            .create_swap_chain(&window)
            .or_fatal("createSwapChain");
        self.lifecycle(format_args!("created {handle:?} ({width}x{height})"));
        self.table.construct(handle, Realized::new((), native));
    }

    // --- Destruction ---

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        if let Some(object) = self.table.destruct::<_, VertexBufferObject<B>>(handle) {
            self.grown_buffers.remove(&handle.id());
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_vertex_buffer(&object.native));
        }
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        if let Some(object) = self.table.destruct::<_, IndexBufferObject<B>>(handle) {
            self.grown_buffers.remove(&handle.id());
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_index_buffer(&object.native));
        }
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(object) = self.table.destruct::<_, TextureObject<B>>(handle) {
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_texture(&object.native));
        }
    }

    fn destroy_sampler_group(&mut self, handle: SamplerGroupHandle) {
        self.table.destruct::<_, SamplerGroup>(handle);
    }

    fn destroy_uniform_buffer(&mut self, handle: UniformBufferHandle) {
        if let Some(object) = self.table.destruct::<_, UniformBufferObject<B>>(handle) {
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_uniform_buffer(&object.native));
        }
    }

    fn destroy_render_primitive(&mut self, handle: RenderPrimitiveHandle) {
        if let Some(object) = self.table.destruct::<_, PrimitiveObject<B>>(handle) {
            self.schedule_destroy(move |backend| backend.destroy_primitive_layout(&object.native));
        }
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if let Some(object) = self.table.destruct::<_, ProgramObject<B>>(handle) {
            self.lifecycle(format_args!("destroying {handle:?} '{}'", object.descriptor.name));
            self.schedule_destroy(move |backend| backend.destroy_program(&object.native));
        }
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        if let Some(pass) = self.pass {
            ensure_contract!(
                pass.target != handle,
                "destroyRenderTarget: {handle:?} is the target of the current pass"
            );
        }
        if let Some(object) = self.table.destruct::<_, RenderTargetObject<B>>(handle) {
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_render_target(&object.native));
        }
    }

    fn destroy_fence(&mut self, handle: FenceHandle) {
        self.table.destruct::<_, Fence>(handle);
    }

    fn destroy_swap_chain(&mut self, handle: SwapChainHandle) {
        if let Some(object) = self.table.destruct::<_, SwapChainObject<B>>(handle) {
            if self.draw_swap_chain == handle {
                self.draw_swap_chain = SwapChainHandle::NULL;
            }
            if self.read_swap_chain == handle {
                self.read_swap_chain = SwapChainHandle::NULL;
            }
            self.lifecycle(format_args!("destroying {handle:?}"));
            self.schedule_destroy(move |backend| backend.destroy_swap_chain(&object.native));
        }
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.require_no_pass("terminate");
        self.submit("terminate");
        self.backend.finish().or_fatal("terminate");
        let drained = self.destruction.drain_all(&mut self.backend);

        for state in self.raster_states.drain() {
            self.backend.destroy_raster_state(&state);
        }
        for sampler in self.samplers.drain() {
            self.backend.destroy_sampler(&sampler);
        }

        let census = self.table.census();
        if !census.is_empty() {
            log::warn!(
                "Dispatcher: {} handles still alive at terminate: {census:?}",
                self.table.len()
            );
        }
        self.backend.terminate();
        self.terminated = true;
        log::info!(
            "Dispatcher '{}' terminated ({drained} pending teardowns flushed, {} draws issued).",
            self.config.label,
            self.draws
        );
    }

    // --- Synchronization ---

    fn wait(&mut self, fence: FenceHandle, timeout: Duration) -> FenceStatus {
        if fence.is_null() || self.terminated || !self.table.contains(fence) {
            return FenceStatus::Error;
        }
        // Reserved through a command queue whose creation has not executed yet.
        let Some(object) = self.table.try_lookup::<_, Fence>(fence) else {
            return FenceStatus::TimeoutExpired;
        };
        if object.submission >= self.backend.recording_submission() && self.pass.is_none() {
            self.submit("wait");
        }
        let status = self.backend.wait_submission(object.submission, timeout);
        self.retire();
        status
    }

    // --- Updates ---

    fn update_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        index: u8,
        data: BufferDescriptor,
        offset: usize,
    ) {
        let object: Arc<VertexBufferObject<B>> = self.object(handle, "updateVertexBuffer");
        let descriptor = &object.descriptor;
        ensure_contract!(
            index < descriptor.buffer_count,
            "updateVertexBuffer: buffer {index} of {}",
            descriptor.buffer_count
        );
        let created = descriptor.buffer_size(index);
        let end = Self::write_end(offset, data.len(), created, "updateVertexBuffer");
        if descriptor.usage == BufferUsage::Dynamic && end > created {
            Err::<(), _>(ContractError::OutOfBounds {
                offset,
                len: data.len(),
                capacity: created,
            })
            .or_fatal("updateVertexBuffer (dynamic buffers never grow)");
        }
        let update = self
            .backend
            .update_vertex_buffer(&object.native, index, &data.data, offset)
            .or_fatal("updateVertexBuffer");
        self.record_extent(handle.id(), index, end, created);
        self.handle_buffer_update(handle.id(), update);
        let (bytes, callback) = data.into_parts();
        self.release_payload(bytes, callback);
    }

    fn update_index_buffer(&mut self, handle: IndexBufferHandle, data: BufferDescriptor, offset: usize) {
        let object: Arc<IndexBufferObject<B>> = self.object(handle, "updateIndexBuffer");
        let descriptor = &object.descriptor;
        let created = descriptor.size();
        let end = Self::write_end(offset, data.len(), created, "updateIndexBuffer");
        if descriptor.usage == BufferUsage::Dynamic && end > created {
            Err::<(), _>(ContractError::OutOfBounds {
                offset,
                len: data.len(),
                capacity: created,
            })
            .or_fatal("updateIndexBuffer (dynamic buffers never grow)");
        }
        let update = self
            .backend
            .update_index_buffer(&object.native, &data.data, offset)
            .or_fatal("updateIndexBuffer");
        self.record_extent(handle.id(), 0, end, created);
        self.handle_buffer_update(handle.id(), update);
        let (bytes, callback) = data.into_parts();
        self.release_payload(bytes, callback);
    }

    fn load_uniform_buffer(&mut self, handle: UniformBufferHandle, data: BufferDescriptor) {
        let object: Arc<UniformBufferObject<B>> = self.object(handle, "loadUniformBuffer");
        if data.len() > object.descriptor.size {
            Err::<(), _>(ContractError::OutOfBounds {
                offset: 0,
                len: data.len(),
                capacity: object.descriptor.size,
            })
            .or_fatal("loadUniformBuffer");
        }
        let update = self
            .backend
            .load_uniform_buffer(&object.native, &data.data)
            .or_fatal("loadUniformBuffer");
        self.handle_buffer_update(handle.id(), update);
        let (bytes, callback) = data.into_parts();
        self.release_payload(bytes, callback);
    }

    fn update_texture(&mut self, handle: TextureHandle, region: TextureRegion, data: PixelBufferDescriptor) {
        let object: Arc<TextureObject<B>> = self.object(handle, "updateTexture");
        let descriptor = &object.descriptor;
        ensure_contract!(
            descriptor.usage.contains(TextureUsage::UPLOADABLE),
            "updateTexture: {handle:?} is not UPLOADABLE"
        );
        ensure_contract!(
            data.format == descriptor.format,
            "updateTexture: {:?} data for a {:?} texture",
            data.format,
            descriptor.format
        );
        ensure_contract!(
            region.level == 0 || !descriptor.requires_mip_generation(),
            "updateTexture: {handle:?} generates its mip chain, upload level 0 and call generateMipmaps"
        );
        Self::check_region(descriptor, &region, "updateTexture");
        let needed = descriptor.format.data_size(
            region.extent.width,
            region.extent.height,
            region.extent.depth,
        );
        ensure_contract!(
            data.data.len() >= needed,
            "updateTexture: {} bytes supplied, {needed} needed",
            data.data.len()
        );
        self.backend
            .update_texture(&object.native, &region, &data.data[..needed])
            .or_fatal("updateTexture");
        let (bytes, callback) = data.into_parts();
        self.release_payload(bytes, callback);
    }

    fn update_cube_image(
        &mut self,
        handle: TextureHandle,
        level: u8,
        data: PixelBufferDescriptor,
        faces: FaceOffsets,
    ) {
        let object: Arc<TextureObject<B>> = self.object(handle, "updateCubeImage");
        let descriptor = &object.descriptor;
        ensure_contract!(
            descriptor.target == SamplerType::SamplerCubemap,
            "updateCubeImage: {handle:?} is a {:?}",
            descriptor.target
        );
        ensure_contract!(
            data.format == descriptor.format && descriptor.usage.contains(TextureUsage::UPLOADABLE),
            "updateCubeImage: {handle:?} cannot take {:?} uploads",
            data.format
        );
        ensure_contract!(
            level < descriptor.levels && (level == 0 || !descriptor.requires_mip_generation()),
            "updateCubeImage: level {level} cannot be uploaded to {handle:?}"
        );
        let (width, height, _) = descriptor.level_extent(level);
        let face_size = descriptor.level_size(level);
        for (face, &start) in faces.0.iter().enumerate() {
            let Some(bytes) = start
                .checked_add(face_size)
                .and_then(|end| data.data.get(start..end))
            else {
                contract_violation(format_args!(
                    "updateCubeImage: face {face} at offset {start} overflows {} bytes",
                    data.data.len()
                ))
            };
            let region = TextureRegion {
                level,
                offset: Offset3D {
                    x: 0,
                    y: 0,
                    z: face as u32,
                },
                extent: Extent3D::new_2d(width, height),
            };
            self.backend
                .update_texture(&object.native, &region, bytes)
                .or_fatal("updateCubeImage");
        }
        let (bytes, callback) = data.into_parts();
        self.release_payload(bytes, callback);
    }

    fn generate_mipmaps(&mut self, handle: TextureHandle) {
        let object: Arc<TextureObject<B>> = self.object(handle, "generateMipmaps");
        ensure_contract!(
            self.backend.can_generate_mipmaps(),
            "generateMipmaps: the {} backend cannot generate mipmaps",
            self.backend.name()
        );
        ensure_contract!(
            !object.descriptor.format.is_compressed(),
            "generateMipmaps: {:?} is compressed",
            object.descriptor.format
        );
        if object.descriptor.levels > 1 {
            self.backend
                .generate_mipmaps(&object.native)
                .or_fatal("generateMipmaps");
        }
    }

    fn copy_texture(
        &mut self,
        dst: TextureHandle,
        dst_region: TextureRegion,
        src: TextureHandle,
        src_region: TextureRegion,
        filter: SamplerMagFilter,
    ) {
        self.require_no_pass("copyTexture");
        let destination: Arc<TextureObject<B>> = self.object(dst, "copyTexture(dst)");
        let source: Arc<TextureObject<B>> = self.object(src, "copyTexture(src)");
        ensure_contract!(
            destination.descriptor.format == source.descriptor.format,
            "copyTexture: {:?} into {:?}",
            source.descriptor.format,
            destination.descriptor.format
        );
        Self::check_region(&destination.descriptor, &dst_region, "copyTexture(dst)");
        Self::check_region(&source.descriptor, &src_region, "copyTexture(src)");
        self.backend
            .copy_texture(&destination.native, &dst_region, &source.native, &src_region, filter)
            .or_fatal("copyTexture");
    }

    fn copy_texture_to_memory(
        &mut self,
        handle: TextureHandle,
        region: TextureRegion,
        mut data: PixelBufferDescriptor,
        on_complete: ReadbackCallback,
    ) {
        self.require_no_pass("copyTextureToMemory");
        let object: Arc<TextureObject<B>> = self.object(handle, "copyTextureToMemory");
        let descriptor = &object.descriptor;
        ensure_contract!(
            data.format == descriptor.format,
            "copyTextureToMemory: {:?} destination for a {:?} texture",
            data.format,
            descriptor.format
        );
        Self::check_region(descriptor, &region, "copyTextureToMemory");
        let needed = descriptor.format.data_size(
            region.extent.width,
            region.extent.height,
            region.extent.depth,
        );
        ensure_contract!(
            data.data.len() >= needed,
            "copyTextureToMemory: {} bytes of room, {needed} needed",
            data.data.len()
        );
        self.backend
            .read_texture(&object.native, &region, &mut data.data[..needed])
            .or_fatal("copyTextureToMemory");
        on_complete(data);
    }

    fn update_sampler_group(&mut self, handle: SamplerGroupHandle, entries: Vec<SamplerGroupEntry>) {
        let group: Arc<SamplerGroup> = self.object(handle, "updateSamplerGroup");
        ensure_contract!(
            entries.len() <= group.size(),
            "updateSamplerGroup: {} entries for a group of {}",
            entries.len(),
            group.size()
        );
        group.update(&entries);
    }

    fn set_render_primitive_buffer(
        &mut self,
        primitive: RenderPrimitiveHandle,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        enabled_attributes: u32,
    ) {
        let object: Arc<PrimitiveObject<B>> = self.object(primitive, "setRenderPrimitiveBuffer");
        let vertices: Arc<VertexBufferObject<B>> =
            self.object(vertex_buffer, "setRenderPrimitiveBuffer(vertex)");
        let indices: Arc<IndexBufferObject<B>> =
            self.object(index_buffer, "setRenderPrimitiveBuffer(index)");
        let unused = enabled_attributes & !vertices.descriptor.used_attributes();
        ensure_contract!(
            unused == 0,
            "setRenderPrimitiveBuffer: attributes {unused:#b} are enabled but not described by {vertex_buffer:?}"
        );
        self.backend
            .bind_primitive_buffers(
                &object.native,
                &vertices.native,
                &vertices.descriptor,
                &indices.native,
                enabled_attributes,
            )
            .or_fatal("setRenderPrimitiveBuffer");
        let epochs = (self.epoch(vertex_buffer.id()), self.epoch(index_buffer.id()));
        object.update(|binding| {
            binding.vertex_buffer = vertex_buffer;
            binding.index_buffer = index_buffer;
            binding.enabled_attributes = enabled_attributes;
            binding.bound_epochs = epochs;
        });
    }

    fn set_render_primitive_range(
        &mut self,
        primitive: RenderPrimitiveHandle,
        primitive_type: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    ) {
        let object: Arc<PrimitiveObject<B>> = self.object(primitive, "setRenderPrimitiveRange");
        ensure_contract!(
            min_index <= max_index,
            "setRenderPrimitiveRange: min index {min_index} above max index {max_index}"
        );
        let binding = object.binding();
        if binding.index_buffer.is_valid() {
            let indices: Arc<IndexBufferObject<B>> =
                self.object(binding.index_buffer, "setRenderPrimitiveRange");
            let capacity = self.index_capacity(binding.index_buffer.id(), &indices.descriptor);
            ensure_contract!(
                offset as u64 + count as u64 <= capacity,
                "setRenderPrimitiveRange: indices {offset}..{} exceed {capacity}",
                offset as u64 + count as u64
            );
        }
        object.update(|binding| {
            binding.range = PrimitiveRange {
                primitive_type,
                offset,
                min_index,
                max_index,
                count,
            };
        });
    }

    // --- Passes ---

    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams) {
        self.require_no_pass("beginRenderPass");
        let render_target: Arc<RenderTargetObject<B>> = self.object(target, "beginRenderPass");
        let mut params = *params;

        let (width, height) = match render_target.descriptor {
            RenderTargetKind::Default => {
                ensure_contract!(
                    self.draw_swap_chain.is_valid(),
                    "beginRenderPass: the default target needs a current swap chain (makeCurrent)"
                );
                let chain: Arc<SwapChainObject<B>> =
                    self.object(self.draw_swap_chain, "beginRenderPass");
                let (width, height) = self.backend.swap_chain_extent(&chain.native);
                let replaced = self
                    .backend
                    .prepare_default_target(
                        &render_target.native,
                        width,
                        height,
                        self.config.default_depth_format,
                    )
                    .or_fatal("beginRenderPass (default depth buffer)");
                if let Some(previous) = replaced {
                    self.lifecycle(format_args!(
                        "default depth buffer recreated for a {width}x{height} swap chain"
                    ));
                    self.schedule_destroy(move |backend| backend.release_garbage(previous));
                }
                if params.viewport.width == 0 || params.viewport.height == 0 {
                    params.viewport = Viewport::new(width, height);
                }
                self.backend
                    .begin_render_pass(&render_target.native, Some(&chain.native), &params)
                    .or_fatal("beginRenderPass");
                (width, height)
            }
            RenderTargetKind::Offscreen(descriptor) => {
                if params.viewport.width == 0 || params.viewport.height == 0 {
                    params.viewport = Viewport::new(descriptor.width, descriptor.height);
                }
                self.backend
                    .begin_render_pass(&render_target.native, None, &params)
                    .or_fatal("beginRenderPass");
                (descriptor.width, descriptor.height)
            }
        };
        log::trace!("Dispatcher: begin pass into {target:?} ({width}x{height})");
        self.pass = Some(ActivePass {
            target,
            width,
            height,
        });
    }

    fn end_render_pass(&mut self) {
        let pass = self.require_pass("endRenderPass");
        self.backend.end_render_pass().or_fatal("endRenderPass");
        self.pass = None;
        self.uniform_bindings = [None; UNIFORM_BINDING_COUNT];
        self.sampler_bindings = [SamplerGroupHandle::NULL; SAMPLER_BINDING_COUNT];
        log::trace!("Dispatcher: end pass into {:?}", pass.target);
    }

    fn set_viewport_scissor(&mut self, left: i32, bottom: i32, width: u32, height: u32) {
        let pass = self.require_pass("setViewportScissor");
        ensure_contract!(
            width > 0 && height > 0,
            "setViewportScissor: zero-sized rectangle"
        );
        let viewport = Viewport {
            left,
            bottom,
            width,
            height,
        };
        if left < 0
            || bottom < 0
            || left as u64 + width as u64 > pass.width as u64
            || bottom as u64 + height as u64 > pass.height as u64
        {
            log::trace!(
                "Dispatcher: scissor {viewport:?} extends past the {}x{} target",
                pass.width,
                pass.height
            );
        }
        self.backend.set_viewport_scissor(&viewport);
    }

    fn bind_uniform_buffer(&mut self, slot: usize, handle: UniformBufferHandle) {
        self.require_pass("bindUniformBuffer");
        ensure_contract!(
            slot < UNIFORM_BINDING_COUNT,
            "bindUniformBuffer: slot {slot} of {UNIFORM_BINDING_COUNT}"
        );
        if handle.is_null() {
            self.uniform_bindings[slot] = None;
            return;
        }
        let _: Arc<UniformBufferObject<B>> = self.object(handle, "bindUniformBuffer");
        self.uniform_bindings[slot] = Some(UniformSlot {
            buffer: handle,
            offset: 0,
            size: None,
        });
    }

    fn bind_uniform_buffer_range(
        &mut self,
        slot: usize,
        handle: UniformBufferHandle,
        offset: usize,
        size: usize,
    ) {
        self.require_pass("bindUniformBufferRange");
        ensure_contract!(
            slot < UNIFORM_BINDING_COUNT,
            "bindUniformBufferRange: slot {slot} of {UNIFORM_BINDING_COUNT}"
        );
        let object: Arc<UniformBufferObject<B>> = self.object(handle, "bindUniformBufferRange");
        let capacity = object.descriptor.size;
        let fits = offset
            .checked_add(size)
            .is_some_and(|end| end <= capacity);
        if size == 0 || offset >= capacity || !fits {
            Err::<(), _>(ContractError::OutOfBounds {
                offset,
                len: size,
                capacity,
            })
            .or_fatal("bindUniformBufferRange");
        }
        self.uniform_bindings[slot] = Some(UniformSlot {
            buffer: handle,
            offset,
            size: Some(size),
        });
    }

    fn bind_samplers(&mut self, slot: usize, handle: SamplerGroupHandle) {
        self.require_pass("bindSamplers");
        ensure_contract!(
            slot < SAMPLER_BINDING_COUNT,
            "bindSamplers: slot {slot} of {SAMPLER_BINDING_COUNT}"
        );
        if handle.is_valid() {
            let _: Arc<SamplerGroup> = self.object(handle, "bindSamplers");
        }
        self.sampler_bindings[slot] = handle;
    }

    fn draw(&mut self, state: &PipelineState, primitive: RenderPrimitiveHandle) {
        self.require_pass("draw");
        let program: Arc<ProgramObject<B>> = self.object(state.program, "draw(program)");
        let render_primitive: Arc<PrimitiveObject<B>> = self.object(primitive, "draw(primitive)");
        let binding = render_primitive.binding();
        ensure_contract!(
            binding.vertex_buffer.is_valid() && binding.index_buffer.is_valid(),
            "draw: {primitive:?} has no buffers (setRenderPrimitiveBuffer)"
        );
        if binding.range.count == 0 {
            log::trace!("Dispatcher: {primitive:?} has an empty range, nothing drawn");
            return;
        }
        let vertices: Arc<VertexBufferObject<B>> = self.object(binding.vertex_buffer, "draw(vertices)");
        let indices: Arc<IndexBufferObject<B>> = self.object(binding.index_buffer, "draw(indices)");
        let range = binding.range;
        let index_capacity = self.index_capacity(binding.index_buffer.id(), &indices.descriptor);
        let vertex_capacity = self.vertex_capacity(binding.vertex_buffer.id(), &vertices.descriptor);
        ensure_contract!(
            range.offset as u64 + range.count as u64 <= index_capacity
                && (range.max_index as u64) < vertex_capacity,
            "draw: range {range:?} exceeds {index_capacity} indices / {vertex_capacity} vertices"
        );

        // Static buffers reallocated since the primitive was bound need a rebind.
        let epochs = (
            self.epoch(binding.vertex_buffer.id()),
            self.epoch(binding.index_buffer.id()),
        );
        if epochs != binding.bound_epochs {
            self.backend
                .bind_primitive_buffers(
                    &render_primitive.native,
                    &vertices.native,
                    &vertices.descriptor,
                    &indices.native,
                    binding.enabled_attributes,
                )
                .or_fatal("draw (rebinding reallocated buffers)");
            render_primitive.update(|binding| binding.bound_epochs = epochs);
        }

        let raster_state = self.raster_state(&state.raster_state);

        let uniform_objects: Vec<Option<(Arc<UniformBufferObject<B>>, usize, usize)>> = self
            .uniform_bindings
            .iter()
            .map(|slot| {
                slot.map(|slot| {
                    let buffer: Arc<UniformBufferObject<B>> = self.object(slot.buffer, "draw(uniforms)");
                    let size = slot.size.unwrap_or(buffer.descriptor.size);
                    (buffer, slot.offset, size)
                })
            })
            .collect();

        let mut sampler_objects = Vec::new();
        for (slot, layout) in program.descriptor.sampler_groups.iter().enumerate() {
            let Some(layout) = layout else {
                continue;
            };
            let group = self.sampler_bindings[slot];
            if group.is_null() {
                continue;
            }
            let group: Arc<SamplerGroup> = self.object(group, "draw(samplers)");
            let entries = group.entries();
            for sampler_slot in &layout.samplers {
                let Some(entry) = entries.get(sampler_slot.binding as usize) else {
                    contract_violation(format_args!(
                        "draw: program '{}' reads sampler {} of a {}-entry group",
                        program.descriptor.name,
                        sampler_slot.binding,
                        entries.len()
                    ))
                };
                if entry.texture.is_null() {
                    continue;
                }
                let texture: Arc<TextureObject<B>> = self.object(entry.texture, "draw(texture)");
                ensure_contract!(
                    texture.descriptor.usage.contains(TextureUsage::SAMPLEABLE),
                    "draw: {:?} is not SAMPLEABLE",
                    entry.texture
                );
                let sampler = self.sampler(&entry.params);
                sampler_objects.push((slot, sampler_slot.binding, texture, sampler, entry.params));
            }
        }

        let uniforms: Vec<Option<UniformBinding<'_, B>>> = uniform_objects
            .iter()
            .map(|binding| {
                binding.as_ref().map(|(buffer, offset, size)| UniformBinding {
                    buffer: &buffer.native,
                    offset: *offset,
                    size: *size,
                })
            })
            .collect();
        let samplers: Vec<SamplerBinding<'_, B>> = sampler_objects
            .iter()
            .map(|(group, binding, texture, sampler, params)| SamplerBinding {
                group: *group,
                binding: *binding,
                texture: &texture.native,
                texture_descriptor: &texture.descriptor,
                sampler: sampler.as_ref(),
                params: *params,
            })
            .collect();

        let call = DrawCall {
            program: &program.native,
            program_descriptor: &program.descriptor,
            raster: &state.raster_state,
            raster_state: raster_state.as_ref(),
            polygon_offset: state.polygon_offset,
            primitive: &render_primitive.native,
            vertex_buffer: &vertices.native,
            vertex_layout: &vertices.descriptor,
            index_buffer: &indices.native,
            index_type: indices.descriptor.index_type,
            range,
            enabled_attributes: binding.enabled_attributes,
            uniforms: &uniforms,
            samplers: &samplers,
        };
        self.backend.draw(&call).or_fatal("draw");
        self.draws += 1;
    }
}

impl<B: Backend> Drop for Dispatcher<B> {
    fn drop(&mut self) {
        if self.terminated || std::thread::panicking() {
            return;
        }
        if self.pass.is_some() {
            log::warn!("Dispatcher dropped inside a render pass; native objects are leaked.");
            return;
        }
        log::warn!("Dispatcher dropped without terminate(); terminating now.");
        self.terminate();
    }
}

impl<B: Backend> fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backend", &self.backend.name())
            .field("table", &self.table)
            .field("in_pass", &self.pass.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
