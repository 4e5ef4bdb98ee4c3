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

use super::calls::NativeCall;
use super::formats::{encode_color, encode_depth, is_renderable, native_format, NativeFormatTriple};
use super::ledger::{NativeId, NativeKind, NativeLedger};
use super::mipmaps::{self, Image};
use super::resources::*;
use super::HeadlessConfig;
use lumen_core::driver::{
    Backend, BackendError, BufferUpdate, DrawCall, FenceStatus, IndexBufferDescriptor,
    NativeWindow, ProgramDescriptor, RasterState, RenderPassParams, RenderTargetAttachments,
    RenderTargetDescriptor, SamplerMagFilter, SamplerParams, SamplerType, ShaderSource,
    SubmissionIndex, TargetBufferFlags, TextureDescriptor, TextureFormat, TextureRegion,
    TextureUsage, UniformBufferDescriptor, VertexBufferDescriptor, Viewport,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct ActivePass {
    target_height: u32,
}

/// A backend that emulates an immediate-mode native API on the CPU.
///
/// Every native object is entered in a [`NativeLedger`], every state change and
/// draw is appended to a [`NativeCall`] log, and buffer and texture memory lives in
/// plain vectors. The GPU timeline is virtual: a submission completes
/// `retire_latency` submissions after it was made, or immediately on `finish`.
#[derive(Debug)]
pub struct HeadlessBackend {
    config: HeadlessConfig,
    ledger: NativeLedger,
    calls: Vec<NativeCall>,
    next_program_uid: u64,
    recording: SubmissionIndex,
    submitted: SubmissionIndex,
    completed: SubmissionIndex,
    pass: Option<ActivePass>,
    terminated: bool,
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> Self {
        log::info!(
            "Headless backend created (retire latency {}, mipmaps {}).",
            config.retire_latency,
            if config.can_generate_mipmaps { "on" } else { "off" }
        );
        Self {
            config,
            ledger: NativeLedger::new(),
            calls: Vec::new(),
            next_program_uid: 0,
            recording: SubmissionIndex(1),
            submitted: SubmissionIndex(0),
            completed: SubmissionIndex(0),
            pass: None,
            terminated: false,
        }
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Native objects currently alive.
    pub fn ledger(&self) -> &NativeLedger {
        &self.ledger
    }

    /// Every native call made so far.
    pub fn calls(&self) -> &[NativeCall] {
        &self.calls
    }

    /// Drains the call log.
    pub fn take_calls(&mut self) -> Vec<NativeCall> {
        std::mem::take(&mut self.calls)
    }

    /// The `DrawIndexed` calls made so far.
    pub fn draw_calls(&self) -> Vec<NativeCall> {
        self.calls.iter().filter(|call| call.is_draw()).cloned().collect()
    }

    /// Index of the last submitted submission.
    pub fn submitted(&self) -> SubmissionIndex {
        self.submitted
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn record(&mut self, call: NativeCall) {
        log::trace!("Headless: {call:?}");
        self.calls.push(call);
    }

    fn native_formats(&self, format: TextureFormat) -> Result<NativeFormatTriple, BackendError> {
        if !self.is_texture_format_supported(format) {
            return Err(BackendError::Unsupported(format!("texture format {format:?}")));
        }
        native_format(format)
            .ok_or_else(|| BackendError::Unsupported(format!("texture format {format:?}")))
    }

    fn record_viewport(&mut self, viewport: &Viewport, target_height: u32) {
        let (x, y) = (viewport.left, viewport.top_in(target_height));
        let (width, height) = (viewport.width, viewport.height);
        self.record(NativeCall::SetViewport { x, y, width, height });
        self.record(NativeCall::SetScissor { x, y, width, height });
    }

    fn read_region(texture: &HeadlessTexture, region: &TextureRegion) -> Result<Vec<u8>, BackendError> {
        let descriptor = &texture.descriptor;
        let size = descriptor.format.data_size(
            region.extent.width,
            region.extent.height,
            region.extent.depth,
        );
        let mut out = vec![0u8; size];
        let levels = lock(&texture.levels);
        let storage = levels
            .get(region.level as usize)
            .ok_or_else(|| BackendError::Native(format!("level {} does not exist", region.level)))?;
        let mut failed = false;
        for_each_row(descriptor, region, |at, tight, len| {
            match storage.get(at..at + len) {
                Some(row) => out[tight..tight + len].copy_from_slice(row),
                None => failed = true,
            }
        });
        if failed {
            return Err(BackendError::Native(format!(
                "region {region:?} exceeds texture {}",
                texture.texture
            )));
        }
        Ok(out)
    }

    fn write_region(texture: &HeadlessTexture, region: &TextureRegion, data: &[u8]) -> Result<(), BackendError> {
        let mut levels = lock(&texture.levels);
        let storage = levels
            .get_mut(region.level as usize)
            .ok_or_else(|| BackendError::Native(format!("level {} does not exist", region.level)))?;
        let mut failed = false;
        for_each_row(&texture.descriptor, region, |at, tight, len| {
            match (storage.get_mut(at..at + len), data.get(tight..tight + len)) {
                (Some(row), Some(source)) => row.copy_from_slice(source),
                _ => failed = true,
            }
        });
        if failed {
            return Err(BackendError::Native(format!(
                "region {region:?} exceeds texture {} or its data",
                texture.texture
            )));
        }
        Ok(())
    }

    fn clear_attachments(&mut self, params: &RenderPassParams, color: Option<&AttachmentView>, depth: Option<&AttachmentView>) {
        let clear = params.flags.clear;
        if let Some(color) = color.filter(|_| clear.contains(TargetBufferFlags::COLOR)) {
            if let Some(texel) = encode_color(color.texture.format, params.clear_color) {
                fill_image(&color.levels, &color.texture, color.level, color.layer as u32, &texel);
            }
            self.record(NativeCall::ClearColor {
                view: color.view,
                color: params.clear_color,
            });
        }
        if let Some(depth) = depth.filter(|_| clear.intersects(TargetBufferFlags::DEPTH_AND_STENCIL)) {
            if clear.contains(TargetBufferFlags::DEPTH) {
                if let Some(texel) = encode_depth(depth.texture.format, params.clear_depth) {
                    fill_image(&depth.levels, &depth.texture, depth.level, depth.layer as u32, &texel);
                }
            }
            self.record(NativeCall::ClearDepthStencil {
                view: depth.view,
                depth: clear.contains(TargetBufferFlags::DEPTH).then_some(params.clear_depth),
                stencil: clear
                    .contains(TargetBufferFlags::STENCIL)
                    .then_some(params.clear_stencil),
            });
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl Backend for HeadlessBackend {
    type VertexBuffer = HeadlessVertexBuffer;
    type IndexBuffer = HeadlessIndexBuffer;
    type UniformBuffer = HeadlessUniformBuffer;
    type Texture = HeadlessTexture;
    type Program = HeadlessProgram;
    type PrimitiveLayout = HeadlessPrimitive;
    type RenderTarget = HeadlessRenderTarget;
    type SwapChain = HeadlessSwapChain;
    type RasterState = HeadlessRasterState;
    type Sampler = HeadlessSampler;
    type Garbage = Vec<NativeId>;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
        match &self.config.supported_formats {
            Some(formats) => formats.contains(&format) && native_format(format).is_some(),
            None => native_format(format).is_some(),
        }
    }

    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
        self.is_texture_format_supported(format) && is_renderable(format)
    }

    fn can_generate_mipmaps(&self) -> bool {
        self.config.can_generate_mipmaps
    }

    // --- Buffers ---

    fn create_vertex_buffer(
        &mut self,
        descriptor: &VertexBufferDescriptor,
    ) -> Result<Self::VertexBuffer, BackendError> {
        let buffers = (0..descriptor.buffer_count)
            .map(|index| NativeBuffer::new(&mut self.ledger, descriptor.buffer_size(index), descriptor.usage))
            .collect();
        Ok(HeadlessVertexBuffer { buffers })
    }

    fn update_vertex_buffer(
        &mut self,
        buffer: &Self::VertexBuffer,
        index: u8,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError> {
        let native = buffer
            .buffers
            .get(index as usize)
            .ok_or_else(|| BackendError::Native(format!("vertex buffer has no buffer {index}")))?;
        self.record(NativeCall::UpdateBuffer {
            buffer: native.id(),
            offset,
            len: data.len(),
            discard: native.usage() == lumen_core::driver::BufferUsage::Dynamic,
        });
        native.write(&mut self.ledger, data, offset)
    }

    fn destroy_vertex_buffer(&mut self, buffer: &Self::VertexBuffer) {
        for native in &buffer.buffers {
            native.release(&mut self.ledger);
        }
    }

    fn create_index_buffer(
        &mut self,
        descriptor: &IndexBufferDescriptor,
    ) -> Result<Self::IndexBuffer, BackendError> {
        Ok(HeadlessIndexBuffer {
            buffer: NativeBuffer::new(&mut self.ledger, descriptor.size(), descriptor.usage),
            index_type: descriptor.index_type,
        })
    }

    fn update_index_buffer(
        &mut self,
        buffer: &Self::IndexBuffer,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError> {
        self.record(NativeCall::UpdateBuffer {
            buffer: buffer.buffer.id(),
            offset,
            len: data.len(),
            discard: buffer.buffer.usage() == lumen_core::driver::BufferUsage::Dynamic,
        });
        buffer.buffer.write(&mut self.ledger, data, offset)
    }

    fn destroy_index_buffer(&mut self, buffer: &Self::IndexBuffer) {
        buffer.buffer.release(&mut self.ledger);
    }

    fn create_uniform_buffer(
        &mut self,
        descriptor: &UniformBufferDescriptor,
    ) -> Result<Self::UniformBuffer, BackendError> {
        Ok(HeadlessUniformBuffer {
            buffer: NativeBuffer::new(&mut self.ledger, descriptor.size, descriptor.usage),
        })
    }

    fn load_uniform_buffer(
        &mut self,
        buffer: &Self::UniformBuffer,
        data: &[u8],
    ) -> Result<BufferUpdate<Self::Garbage>, BackendError> {
        self.record(NativeCall::UpdateBuffer {
            buffer: buffer.buffer.id(),
            offset: 0,
            len: data.len(),
            discard: buffer.buffer.usage() == lumen_core::driver::BufferUsage::Dynamic,
        });
        buffer.buffer.write(&mut self.ledger, data, 0)
    }

    fn destroy_uniform_buffer(&mut self, buffer: &Self::UniformBuffer) {
        buffer.buffer.release(&mut self.ledger);
    }

    // --- Textures ---

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<Self::Texture, BackendError> {
        let max = self.config.max_texture_dimension;
        if descriptor.width > max || descriptor.height > max || descriptor.depth > max {
            return Err(BackendError::Unsupported(format!(
                "{}x{}x{} texture exceeds the {max} texel limit",
                descriptor.width, descriptor.height, descriptor.depth
            )));
        }
        let formats = self.native_formats(descriptor.format)?;
        if formats.stored_as != descriptor.format {
            log::debug!(
                "Headless: {:?} stored as {:?}",
                descriptor.format,
                formats.stored_as
            );
        }
        let sampleable = descriptor.usage.contains(TextureUsage::SAMPLEABLE);
        Ok(HeadlessTexture::new(&mut self.ledger, descriptor, formats, sampleable))
    }

    fn update_texture(
        &mut self,
        texture: &Self::Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError> {
        Self::write_region(texture, region, data)?;
        self.record(NativeCall::UpdateTexture {
            texture: texture.texture,
            level: region.level,
            layer: region.offset.z,
            width: region.extent.width,
            height: region.extent.height,
        });
        Ok(())
    }

    fn copy_texture(
        &mut self,
        dst: &Self::Texture,
        dst_region: &TextureRegion,
        src: &Self::Texture,
        src_region: &TextureRegion,
        filter: SamplerMagFilter,
    ) -> Result<(), BackendError> {
        // Read first: source and destination may share storage.
        let source = Self::read_region(src, src_region)?;
        if src_region.extent == dst_region.extent {
            Self::write_region(dst, dst_region, &source)?;
        } else {
            let format = src.descriptor.format;
            if format.is_compressed() {
                return Err(BackendError::Unsupported(format!(
                    "scaled copy of compressed {format:?}"
                )));
            }
            // Both filters resolve to the nearest texel.
            let texel = format.block_info().2 as usize;
            let (s, d) = (src_region.extent, dst_region.extent);
            let mut scaled = vec![0u8; format.data_size(d.width, d.height, d.depth)];
            for z in 0..d.depth {
                let sz = (z * s.depth / d.depth) as usize;
                for y in 0..d.height {
                    let sy = (y * s.height / d.height) as usize;
                    for x in 0..d.width {
                        let sx = (x * s.width / d.width) as usize;
                        let from = ((sz * s.height as usize + sy) * s.width as usize + sx) * texel;
                        let to = ((z as usize * d.height as usize + y as usize) * d.width as usize
                            + x as usize)
                            * texel;
                        scaled[to..to + texel].copy_from_slice(&source[from..from + texel]);
                    }
                }
            }
            Self::write_region(dst, dst_region, &scaled)?;
        }
        self.record(NativeCall::CopyTexture {
            dst: dst.texture,
            src: src.texture,
            filter,
        });
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: &Self::Texture,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> Result<(), BackendError> {
        let pixels = Self::read_region(texture, region)?;
        let len = pixels.len().min(out.len());
        out[..len].copy_from_slice(&pixels[..len]);
        self.record(NativeCall::ReadTexture {
            texture: texture.texture,
            level: region.level,
        });
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: &Self::Texture) -> Result<(), BackendError> {
        let descriptor = &texture.descriptor;
        if !self.config.can_generate_mipmaps {
            return Err(BackendError::Unsupported("mipmap generation is disabled".into()));
        }
        if descriptor.target == SamplerType::Sampler3D || !mipmaps::is_filterable(descriptor.format) {
            return Err(BackendError::Unsupported(format!(
                "mipmap generation for {:?} {:?} textures",
                descriptor.target, descriptor.format
            )));
        }
        {
            let mut levels = lock(&texture.levels);
            for level in 1..descriptor.levels {
                let (src_w, src_h, _) = descriptor.level_extent(level - 1);
                let (dst_w, dst_h, _) = descriptor.level_extent(level);
                let (head, tail) = levels.split_at_mut(level as usize);
                mipmaps::downsample(
                    descriptor.format,
                    &head[level as usize - 1],
                    Image { width: src_w, height: src_h },
                    &mut tail[0],
                    Image { width: dst_w, height: dst_h },
                    descriptor.layer_count(),
                );
            }
        }
        self.record(NativeCall::GenerateMips {
            texture: texture.texture,
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: &Self::Texture) {
        self.ledger.release_all(texture.ids());
    }

    // --- Programs ---

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<Self::Program, BackendError> {
        for stage in [&descriptor.vertex, &descriptor.fragment] {
            if let ShaderSource::Wgsl(source) = &stage.source {
                if !source.contains(stage.entry_point.as_str()) {
                    return Err(BackendError::ShaderCompilation {
                        program: descriptor.name.clone(),
                        details: format!("entry point '{}' not found", stage.entry_point),
                    });
                }
            }
        }
        self.next_program_uid += 1;
        Ok(HeadlessProgram {
            uid: self.next_program_uid,
            vertex_shader: self.ledger.allocate(NativeKind::Shader),
            fragment_shader: self.ledger.allocate(NativeKind::Shader),
            name: descriptor.name.clone(),
        })
    }

    fn destroy_program(&mut self, program: &Self::Program) {
        self.ledger
            .release_all([program.vertex_shader, program.fragment_shader]);
    }

    // --- Render primitives ---

    fn create_primitive_layout(&mut self) -> Result<Self::PrimitiveLayout, BackendError> {
        Ok(HeadlessPrimitive::default())
    }

    fn bind_primitive_buffers(
        &mut self,
        primitive: &Self::PrimitiveLayout,
        _vertex_buffer: &Self::VertexBuffer,
        _vertex_layout: &VertexBufferDescriptor,
        _index_buffer: &Self::IndexBuffer,
        enabled_attributes: u32,
    ) -> Result<(), BackendError> {
        let mut enabled = lock(&primitive.enabled_attributes);
        if *enabled != enabled_attributes {
            // Input layouts describe the enabled attributes; rebuild them lazily.
            let stale: Vec<_> = lock(&primitive.input_layouts).drain().map(|(_, id)| id).collect();
            self.ledger.release_all(stale);
            *enabled = enabled_attributes;
        }
        Ok(())
    }

    fn destroy_primitive_layout(&mut self, primitive: &Self::PrimitiveLayout) {
        let layouts: Vec<_> = lock(&primitive.input_layouts).drain().map(|(_, id)| id).collect();
        self.ledger.release_all(layouts);
    }

    // --- Render targets and swap chains ---

    fn create_default_render_target(&mut self) -> Result<Self::RenderTarget, BackendError> {
        Ok(HeadlessRenderTarget::Default {
            depth: Default::default(),
        })
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
        attachments: RenderTargetAttachments<'_, Self>,
    ) -> Result<Self::RenderTarget, BackendError> {
        let mut view = |attachment: Option<lumen_core::driver::Attachment<'_, Self>>, kind| {
            attachment.map(|attachment| AttachmentView {
                view: self.ledger.allocate(kind),
                texture: *attachment.descriptor,
                levels: attachment.texture.levels.clone(),
                level: attachment.level,
                layer: attachment.layer,
            })
        };
        let color = view(attachments.color, NativeKind::RenderTargetView);
        let depth = view(attachments.depth, NativeKind::DepthStencilView);
        let stencil = view(attachments.stencil, NativeKind::DepthStencilView);
        Ok(HeadlessRenderTarget::Offscreen {
            width: descriptor.width,
            height: descriptor.height,
            color,
            depth,
            stencil,
        })
    }

    fn prepare_default_target(
        &mut self,
        target: &Self::RenderTarget,
        width: u32,
        height: u32,
        depth_format: TextureFormat,
    ) -> Result<Option<Self::Garbage>, BackendError> {
        let HeadlessRenderTarget::Default { depth } = target else {
            return Err(BackendError::Native("not the default render target".into()));
        };
        if !depth_format.is_depth() {
            return Err(BackendError::Unsupported(format!(
                "{depth_format:?} as a default depth buffer"
            )));
        }
        self.native_formats(depth_format)?;

        let mut depth = lock(depth);
        if let Some(current) = *depth {
            if current.width == width && current.height == height && current.format == depth_format {
                return Ok(None);
            }
        }
        let created = DefaultDepth {
            texture: self.ledger.allocate(NativeKind::Texture),
            view: self.ledger.allocate(NativeKind::DepthStencilView),
            width,
            height,
            format: depth_format,
        };
        log::debug!("Headless: default depth buffer {width}x{height} {depth_format:?}");
        Ok(depth
            .replace(created)
            .map(|previous| vec![previous.texture, previous.view]))
    }

    fn destroy_render_target(&mut self, target: &Self::RenderTarget) {
        match target {
            HeadlessRenderTarget::Default { depth } => {
                if let Some(depth) = lock(depth).take() {
                    self.ledger.release_all([depth.texture, depth.view]);
                }
            }
            HeadlessRenderTarget::Offscreen {
                color,
                depth,
                stencil,
                ..
            } => {
                let views = [color, depth, stencil]
                    .into_iter()
                    .flatten()
                    .map(|attachment| attachment.view)
                    .collect::<Vec<_>>();
                self.ledger.release_all(views);
            }
        }
    }

    fn create_swap_chain(&mut self, window: &NativeWindow) -> Result<Self::SwapChain, BackendError> {
        let (width, height) = window.extent();
        if width == 0 || height == 0 {
            return Err(BackendError::Presentation("zero-sized surface".into()));
        }
        Ok(HeadlessSwapChain::new(&mut self.ledger, width, height))
    }

    fn swap_chain_extent(&self, swap_chain: &Self::SwapChain) -> (u32, u32) {
        swap_chain.extent()
    }

    fn resize_swap_chain(
        &mut self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        let mut state = lock(&swap_chain.state);
        state.width = width;
        state.height = height;
        state.pixels = vec![0; width as usize * height as usize * 4];
        Ok(())
    }

    fn make_current(
        &mut self,
        _draw: &Self::SwapChain,
        _read: &Self::SwapChain,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn present(&mut self, swap_chain: &Self::SwapChain) -> Result<(), BackendError> {
        lock(&swap_chain.state).presented += 1;
        self.record(NativeCall::Present {
            swap_chain: swap_chain.swap_chain,
        });
        Ok(())
    }

    fn destroy_swap_chain(&mut self, swap_chain: &Self::SwapChain) {
        self.ledger
            .release_all([swap_chain.swap_chain, swap_chain.back_buffer_view]);
    }

    // --- Pipeline state ---

    fn create_raster_state(&mut self, state: &RasterState) -> Result<Self::RasterState, BackendError> {
        Ok(HeadlessRasterState {
            rasterizer: self.ledger.allocate(NativeKind::RasterizerState),
            blend: self.ledger.allocate(NativeKind::BlendState),
            depth_stencil: self.ledger.allocate(NativeKind::DepthStencilState),
            state: *state,
        })
    }

    fn destroy_raster_state(&mut self, state: &Self::RasterState) {
        self.ledger
            .release_all([state.rasterizer, state.blend, state.depth_stencil]);
    }

    fn create_sampler(&mut self, params: &SamplerParams) -> Result<Self::Sampler, BackendError> {
        Ok(HeadlessSampler {
            sampler: self.ledger.allocate(NativeKind::Sampler),
            params: *params,
        })
    }

    fn destroy_sampler(&mut self, sampler: &Self::Sampler) {
        self.ledger.release(sampler.sampler);
    }

    // --- Passes ---

    fn begin_render_pass(
        &mut self,
        target: &Self::RenderTarget,
        swap_chain: Option<&Self::SwapChain>,
        params: &RenderPassParams,
    ) -> Result<(), BackendError> {
        if self.pass.is_some() {
            return Err(BackendError::Native("render pass already open".into()));
        }
        let target_height = match target {
            HeadlessRenderTarget::Default { depth } => {
                let swap_chain = swap_chain.ok_or_else(|| {
                    BackendError::Presentation("default target without a swap chain".into())
                })?;
                let depth = *lock(depth);
                self.record(NativeCall::SetRenderTargets {
                    color: Some(swap_chain.back_buffer_view),
                    depth: depth.map(|depth| depth.view),
                });
                let clear = params.flags.clear;
                let height = {
                    let mut state = lock(&swap_chain.state);
                    if clear.contains(TargetBufferFlags::COLOR) {
                        if let Some(texel) = encode_color(TextureFormat::Rgba8, params.clear_color) {
                            for pixel in state.pixels.chunks_exact_mut(4) {
                                pixel.copy_from_slice(&texel);
                            }
                        }
                    }
                    state.height
                };
                if clear.contains(TargetBufferFlags::COLOR) {
                    self.record(NativeCall::ClearColor {
                        view: swap_chain.back_buffer_view,
                        color: params.clear_color,
                    });
                }
                if let Some(depth) = depth.filter(|_| clear.intersects(TargetBufferFlags::DEPTH_AND_STENCIL)) {
                    self.record(NativeCall::ClearDepthStencil {
                        view: depth.view,
                        depth: clear.contains(TargetBufferFlags::DEPTH).then_some(params.clear_depth),
                        stencil: clear
                            .contains(TargetBufferFlags::STENCIL)
                            .then_some(params.clear_stencil),
                    });
                }
                height
            }
            HeadlessRenderTarget::Offscreen {
                height,
                color,
                depth,
                stencil,
                ..
            } => {
                let depth = depth.as_ref().or(stencil.as_ref());
                self.record(NativeCall::SetRenderTargets {
                    color: color.as_ref().map(|color| color.view),
                    depth: depth.map(|depth| depth.view),
                });
                self.clear_attachments(params, color.as_ref(), depth);
                *height
            }
        };
        self.record_viewport(&params.viewport, target_height);
        self.pass = Some(ActivePass { target_height });
        Ok(())
    }

    fn set_viewport_scissor(&mut self, viewport: &Viewport) {
        let target_height = self.pass.map_or(0, |pass| pass.target_height);
        self.record_viewport(viewport, target_height);
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), BackendError> {
        if self.pass.is_none() {
            return Err(BackendError::Native("draw outside a render pass".into()));
        }
        self.record(NativeCall::SetShaders {
            vertex: call.program.vertex_shader,
            fragment: call.program.fragment_shader,
        });
        self.record(NativeCall::SetRasterState {
            rasterizer: call.raster_state.rasterizer,
            blend: call.raster_state.blend,
            depth_stencil: call.raster_state.depth_stencil,
        });
        for (slot, binding) in call.uniforms.iter().enumerate() {
            self.record(NativeCall::SetConstantBuffer {
                slot,
                buffer: binding.as_ref().map(|binding| binding.buffer.buffer.id()),
                offset: binding.as_ref().map_or(0, |binding| binding.offset),
                size: binding.as_ref().map_or(0, |binding| binding.size),
            });
        }
        for sampler in call.samplers {
            let view = sampler.texture.view.ok_or_else(|| {
                BackendError::Native(format!("{} has no shader resource view", sampler.texture.texture))
            })?;
            self.record(NativeCall::SetShaderResource {
                group: sampler.group,
                binding: sampler.binding,
                view,
            });
            self.record(NativeCall::SetSampler {
                group: sampler.group,
                binding: sampler.binding,
                sampler: sampler.sampler.sampler,
            });
        }

        let input_layout = {
            let mut layouts = lock(&call.primitive.input_layouts);
            *layouts
                .entry(call.program.uid)
                .or_insert_with(|| self.ledger.allocate(NativeKind::InputLayout))
        };
        self.record(NativeCall::SetInputLayout(input_layout));
        self.record(NativeCall::SetVertexBuffers(call.vertex_buffer.ids()));
        self.record(NativeCall::SetIndexBuffer {
            buffer: call.index_buffer.buffer.id(),
            index_type: call.index_type,
        });
        self.record(NativeCall::DrawIndexed {
            primitive_type: call.range.primitive_type,
            index_count: call.range.count,
            first_index: call.range.offset,
            min_index: call.range.min_index,
            max_index: call.range.max_index,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), BackendError> {
        if self.pass.take().is_none() {
            return Err(BackendError::Native("no render pass to end".into()));
        }
        self.record(NativeCall::UnbindShaderResources);
        Ok(())
    }

    // --- Timeline ---

    fn recording_submission(&self) -> SubmissionIndex {
        self.recording
    }

    fn submit(&mut self) -> Result<SubmissionIndex, BackendError> {
        let index = self.recording;
        self.record(NativeCall::Submit(index));
        self.submitted = index;
        self.recording = index.next();
        let retired = SubmissionIndex(index.0.saturating_sub(self.config.retire_latency));
        self.completed = self.completed.max(retired);
        Ok(index)
    }

    fn completed_submission(&mut self) -> SubmissionIndex {
        self.completed
    }

    fn wait_submission(&mut self, index: SubmissionIndex, timeout: Duration) -> FenceStatus {
        if index <= self.completed {
            return FenceStatus::ConditionSatisfied;
        }
        if index > self.submitted || timeout.is_zero() {
            return FenceStatus::TimeoutExpired;
        }
        self.completed = index;
        FenceStatus::ConditionSatisfied
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.completed = self.submitted;
        Ok(())
    }

    fn release_garbage(&mut self, garbage: Self::Garbage) {
        self.ledger.release_all(garbage);
    }

    fn terminate(&mut self) {
        if self.ledger.live_count() > 0 {
            log::warn!(
                "Headless backend terminated with {} live native objects: {:?}",
                self.ledger.live_count(),
                self.ledger.census()
            );
        }
        self.terminated = true;
        log::info!(
            "Headless backend terminated ({} native objects allocated, {} released).",
            self.ledger.total_allocated(),
            self.ledger.total_released()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::driver::{ShaderStageSource, TextureRegion};

    fn texture(backend: &mut HeadlessBackend, descriptor: TextureDescriptor) -> HeadlessTexture {
        backend.create_texture(&descriptor).unwrap()
    }

    #[test]
    fn test_submissions_retire_after_latency() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            retire_latency: 2,
            ..HeadlessConfig::default()
        });
        assert_eq!(backend.submit().unwrap(), SubmissionIndex(1));
        assert_eq!(backend.submit().unwrap(), SubmissionIndex(2));
        assert_eq!(backend.completed_submission(), SubmissionIndex(0));
        backend.submit().unwrap();
        assert_eq!(backend.completed_submission(), SubmissionIndex(1));
        assert_eq!(backend.recording_submission(), SubmissionIndex(4));

        backend.finish().unwrap();
        assert_eq!(backend.completed_submission(), SubmissionIndex(3));
    }

    #[test]
    fn test_wait_on_unsubmitted_work_times_out() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            retire_latency: 4,
            ..HeadlessConfig::default()
        });
        backend.submit().unwrap();
        assert_eq!(
            backend.wait_submission(SubmissionIndex(2), Duration::from_secs(1)),
            FenceStatus::TimeoutExpired
        );
        assert_eq!(
            backend.wait_submission(SubmissionIndex(1), Duration::ZERO),
            FenceStatus::TimeoutExpired
        );
        assert_eq!(
            backend.wait_submission(SubmissionIndex(1), Duration::from_millis(1)),
            FenceStatus::ConditionSatisfied
        );
        assert_eq!(backend.completed_submission(), SubmissionIndex(1));
    }

    #[test]
    fn test_missing_entry_point_fails_compilation() {
        let mut backend = HeadlessBackend::default();
        let descriptor = ProgramDescriptor::new(
            "broken",
            ShaderStageSource::wgsl("@vertex fn vs_main() {}", "vs_main"),
            ShaderStageSource::wgsl("@fragment fn main() {}", "fs_main"),
        );
        let error = backend.create_program(&descriptor).unwrap_err();
        assert!(matches!(error, BackendError::ShaderCompilation { .. }));
        assert_eq!(backend.ledger().live_count(), 0);
    }

    #[test]
    fn test_default_depth_recreated_on_resize() {
        let mut backend = HeadlessBackend::default();
        let target = backend.create_default_render_target().unwrap();
        let first = backend
            .prepare_default_target(&target, 64, 64, TextureFormat::Depth24Stencil8)
            .unwrap();
        assert!(first.is_none());
        let unchanged = backend
            .prepare_default_target(&target, 64, 64, TextureFormat::Depth24Stencil8)
            .unwrap();
        assert!(unchanged.is_none());

        let old = target.default_depth().unwrap();
        let garbage = backend
            .prepare_default_target(&target, 128, 32, TextureFormat::Depth24Stencil8)
            .unwrap()
            .unwrap();
        assert_eq!(garbage, vec![old.texture, old.view]);
        assert_eq!(target.default_depth().unwrap().width, 128);

        backend.release_garbage(garbage);
        backend.destroy_render_target(&target);
        assert_eq!(backend.ledger().live_count(), 0);
    }

    #[test]
    fn test_sub_region_update_and_readback() {
        let mut backend = HeadlessBackend::default();
        let texture = texture(
            &mut backend,
            TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false),
        );
        let region = TextureRegion::new_2d(0, 1, 1, 2, 2);
        backend.update_texture(&texture, &region, &[1, 2, 3, 4]).unwrap();

        let contents = texture.level_contents(0);
        assert_eq!(&contents[4..8], &[0, 1, 2, 0]);
        assert_eq!(&contents[8..12], &[0, 3, 4, 0]);

        let mut out = [0u8; 4];
        backend.read_texture(&texture, &region, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_scaled_copy_uses_nearest_texels() {
        let mut backend = HeadlessBackend::default();
        let src = texture(
            &mut backend,
            TextureDescriptor::texture_2d(TextureFormat::R8, 2, 2, false),
        );
        let dst = texture(
            &mut backend,
            TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false),
        );
        backend
            .update_texture(&src, &TextureRegion::new_2d(0, 0, 0, 2, 2), &[10, 20, 30, 40])
            .unwrap();
        backend
            .copy_texture(
                &dst,
                &TextureRegion::new_2d(0, 0, 0, 4, 4),
                &src,
                &TextureRegion::new_2d(0, 0, 0, 2, 2),
                SamplerMagFilter::Nearest,
            )
            .unwrap();
        assert_eq!(
            dst.level_contents(0),
            vec![10, 10, 20, 20, 10, 10, 20, 20, 30, 30, 40, 40, 30, 30, 40, 40]
        );
    }

    #[test]
    fn test_generate_mipmaps_fills_the_chain() {
        let mut backend = HeadlessBackend::default();
        let texture = texture(
            &mut backend,
            TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, true),
        );
        backend
            .update_texture(&texture, &TextureRegion::new_2d(0, 0, 0, 4, 4), &[200; 64])
            .unwrap();
        backend.generate_mipmaps(&texture).unwrap();
        assert_eq!(texture.level_contents(1), vec![200; 16]);
        assert_eq!(texture.level_contents(2), vec![200; 4]);
    }

    #[test]
    fn test_disabled_mipmaps_are_unsupported() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            can_generate_mipmaps: false,
            ..HeadlessConfig::default()
        });
        assert!(!backend.can_generate_mipmaps());
        let texture = texture(
            &mut backend,
            TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, true),
        );
        assert!(matches!(
            backend.generate_mipmaps(&texture),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn test_supported_format_override() {
        let backend = HeadlessBackend::new(HeadlessConfig {
            supported_formats: Some(vec![TextureFormat::Rgba8, TextureFormat::Depth16]),
            ..HeadlessConfig::default()
        });
        assert!(backend.is_texture_format_supported(TextureFormat::Rgba8));
        assert!(!backend.is_texture_format_supported(TextureFormat::Depth24));
        assert!(backend.is_render_target_format_supported(TextureFormat::Depth16));
    }
}
