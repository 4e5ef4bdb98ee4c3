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

use super::context::{WgpuConfig, WgpuContext};
use super::conversions::{texture_format, vertex_format, IntoWgpu};
use super::pipelines::{BlitRect, Blitter, PipelineCache, PipelineKey};
use super::resources::*;
use anyhow::Result;
use lumen_core::driver::{
    Backend, BackendError, BufferUpdate, BufferUsage, CullingMode, DrawCall, DriverConfig,
    FenceStatus, IndexBufferDescriptor, NativeWindow, PrimitiveType, ProgramDescriptor,
    RasterState, RenderPassParams, RenderTargetAttachments, RenderTargetDescriptor,
    SamplerCompareMode, SamplerMagFilter, SamplerParams, SamplerType, ShaderSource,
    ShaderStageSource, SubmissionIndex, TargetBufferFlags, TextureDescriptor, TextureFormat,
    TextureRegion, TextureUsage, UniformBufferDescriptor, VertexBufferDescriptor, Viewport,
};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Row pitch alignment of texture-to-buffer copies.
const READBACK_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Converts a bottom-left viewport to a top-left rectangle clipped to the target.
fn clip_viewport(viewport: &Viewport, width: u32, height: u32) -> Option<PixelRect> {
    let (width, height) = (i64::from(width), i64::from(height));
    let left = i64::from(viewport.left);
    let top = i64::from(viewport.top_in(height as u32));
    let x0 = left.clamp(0, width);
    let y0 = top.clamp(0, height);
    let x1 = (left + i64::from(viewport.width)).clamp(0, width);
    let y1 = (top + i64::from(viewport.height)).clamp(0, height);
    (x1 > x0 && y1 > y0).then(|| PixelRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// A draw with every binding resolved, replayed when the pass segment closes.
struct RecordedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex_buffers: Vec<(wgpu::Buffer, u64)>,
    index_buffer: wgpu::Buffer,
    index_format: wgpu::IndexFormat,
    indices: Range<u32>,
    scissor: PixelRect,
}

/// The render pass being recorded.
///
/// wgpu render passes borrow their encoder, so draws are collected here and
/// encoded in one segment when the pass ends or when an upload must be ordered
/// before them. Only the first segment applies the clears.
struct PassRecording {
    color: Option<AttachmentTarget>,
    depth_stencil: Option<AttachmentTarget>,
    samples: u32,
    width: u32,
    height: u32,
    params: RenderPassParams,
    first_segment: bool,
    scissor: Option<PixelRect>,
    draws: Vec<RecordedDraw>,
}

impl PassRecording {
    fn load_op<V>(&self, buffer: TargetBufferFlags, clear: V) -> wgpu::LoadOp<V> {
        let flags = self.params.flags;
        if self.first_segment && (flags.clear | flags.discard_start).contains(buffer) {
            wgpu::LoadOp::Clear(clear)
        } else {
            wgpu::LoadOp::Load
        }
    }

    fn store_op(&self, buffer: TargetBufferFlags, last: bool) -> wgpu::StoreOp {
        if last && self.params.flags.discard_end.contains(buffer) {
            wgpu::StoreOp::Discard
        } else {
            wgpu::StoreOp::Store
        }
    }
}

fn new_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lumen command encoder"),
    })
}

fn acquire_frame(
    surface: &wgpu::Surface<'static>,
    config: &wgpu::SurfaceConfiguration,
    device: &wgpu::Device,
) -> Result<wgpu::SurfaceTexture, BackendError> {
    match surface.get_current_texture() {
        Ok(frame) => Ok(frame),
        Err(error) => {
            log::warn!("Surface frame unavailable ({error}), reconfiguring.");
            surface.configure(device, config);
            surface
                .get_current_texture()
                .map_err(|e| BackendError::Presentation(e.to_string()))
        }
    }
}

fn texel_copy<'a>(
    texture: &'a WgpuTexture,
    level: u8,
    x: u32,
    y: u32,
    z: u32,
    aspect: wgpu::TextureAspect,
) -> wgpu::TexelCopyTextureInfo<'a> {
    wgpu::TexelCopyTextureInfo {
        texture: &texture.texture,
        mip_level: level as u32,
        origin: wgpu::Origin3d { x, y, z },
        aspect,
    }
}

/// Copy extents of compressed formats are whole blocks.
fn copy_extent(format: TextureFormat, region: &TextureRegion) -> wgpu::Extent3d {
    let (block_width, block_height, _) = format.block_info();
    wgpu::Extent3d {
        width: region.extent.width.div_ceil(block_width) * block_width,
        height: region.extent.height.div_ceil(block_height) * block_height,
        depth_or_array_layers: region.extent.depth,
    }
}

/// The hardware backend, over wgpu.
///
/// Commands are recorded into a single encoder per submission. Buffer and texture
/// uploads go through the queue, which orders them before the next submitted
/// encoder; pending pass work is flushed first so that an upload never
/// overtakes a draw recorded before it.
pub struct WgpuBackend {
    context: WgpuContext,
    label: String,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<PassRecording>,
    pipelines: PipelineCache,
    blitter: Option<Blitter>,
    next_program_uid: u64,
    recording: SubmissionIndex,
    submitted: SubmissionIndex,
    completed: Arc<AtomicU64>,
    in_flight: VecDeque<(SubmissionIndex, wgpu::SubmissionIndex)>,
    terminated: bool,
}

impl WgpuBackend {
    /// Opens a device for the driver described by `config`.
    ///
    /// ## Errors
    /// Fails when no adapter or logical device can be created.
    pub fn new(config: &DriverConfig) -> Result<Self> {
        Self::with_config(config, WgpuConfig::default())
    }

    /// Opens a device with explicit adapter and presentation preferences.
    ///
    /// ## Errors
    /// Fails when no adapter or no logical device is available.
    pub fn with_config(config: &DriverConfig, wgpu_config: WgpuConfig) -> Result<Self> {
        let context = WgpuContext::new(&config.label, wgpu_config)?;
        Ok(Self {
            context,
            label: config.label.clone(),
            encoder: None,
            pass: None,
            pipelines: PipelineCache::default(),
            blitter: None,
            next_program_uid: 1,
            recording: SubmissionIndex(1),
            submitted: SubmissionIndex(0),
            completed: Arc::new(AtomicU64::new(0)),
            in_flight: VecDeque::new(),
            terminated: false,
        })
    }

    pub fn context(&self) -> &WgpuContext {
        &self.context
    }

    /// Number of render pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn texture_features(
        &self,
        format: TextureFormat,
    ) -> Option<(wgpu::TextureFormat, wgpu::TextureFormatFeatures)> {
        let native = texture_format(format)?;
        if !self.context.device.features().contains(native.required_features()) {
            return None;
        }
        Some((native, self.context.adapter.get_texture_format_features(native)))
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder
            .take()
            .unwrap_or_else(|| new_encoder(&self.context.device))
    }

    /// Encodes the pending draws of the current pass as one render pass.
    fn replay_segment(&mut self, last: bool) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        let device = &self.context.device;
        let encoder = self.encoder.get_or_insert_with(|| new_encoder(device));
        let draws = std::mem::take(&mut pass.draws);

        let [r, g, b, a] = pass.params.clear_color.map(f64::from);
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = pass
            .color
            .iter()
            .map(|color| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    depth_slice: color.depth_slice,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: pass.load_op(TargetBufferFlags::COLOR, wgpu::Color { r, g, b, a }),
                        store: pass.store_op(TargetBufferFlags::COLOR, last),
                    },
                })
            })
            .collect();
        let depth_stencil_attachment = pass.depth_stencil.as_ref().map(|depth| {
            wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: depth.format.has_depth_aspect().then(|| wgpu::Operations {
                    load: pass.load_op(TargetBufferFlags::DEPTH, pass.params.clear_depth as f32),
                    store: pass.store_op(TargetBufferFlags::DEPTH, last),
                }),
                stencil_ops: depth.format.has_stencil_aspect().then(|| wgpu::Operations {
                    load: pass.load_op(TargetBufferFlags::STENCIL, pass.params.clear_stencil),
                    store: pass.store_op(TargetBufferFlags::STENCIL, last),
                }),
            }
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen render pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            for draw in &draws {
                render_pass.set_pipeline(&draw.pipeline);
                for (group, bind_group) in draw.bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(group as u32, Some(bind_group), &[]);
                }
                for (slot, (buffer, offset)) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(*offset..));
                }
                render_pass.set_index_buffer(draw.index_buffer.slice(..), draw.index_format);
                let rect = draw.scissor;
                render_pass.set_viewport(
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                render_pass.draw_indexed(draw.indices.clone(), 0, 0..1);
            }
        }
        pass.first_segment = false;
    }

    /// Sends everything recorded so far to the queue without closing the
    /// submission, so that a queue write lands after it.
    fn flush_pending(&mut self) {
        if self.pass.as_ref().is_some_and(|pass| !pass.draws.is_empty()) {
            self.replay_segment(false);
        }
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(Some(encoder.finish()));
        }
    }

    /// Writes `data` at `offset`, growing static buffers that are too small.
    ///
    /// Lengths are padded to the copy alignment, so up to three bytes past the
    /// range may be overwritten with zeros.
    fn write_buffer(
        &mut self,
        buffer: &WgpuBuffer,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<WgpuGarbage>, BackendError> {
        if offset as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(BackendError::Unsupported(format!(
                "buffer write at unaligned offset {offset}"
            )));
        }
        if data.is_empty() {
            return Ok(BufferUpdate::InPlace);
        }
        let padded_len = align_to(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
        let padded: Cow<'_, [u8]> = if padded_len == data.len() {
            Cow::Borrowed(data)
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded_len, 0);
            Cow::Owned(bytes)
        };
        self.flush_pending();

        let device = &self.context.device;
        let queue = &self.context.queue;
        let end = (offset + data.len()) as u64;
        let mut current = lock(&buffer.buffer);
        let mut update = BufferUpdate::InPlace;
        if end > current.size() {
            if buffer.usage != BufferUsage::Static {
                return Err(BackendError::Native(format!(
                    "{} of {} bytes cannot hold {end} bytes",
                    buffer.label,
                    current.size()
                )));
            }
            let grown = allocate_buffer(device, buffer.label, end as usize, buffer.wgpu_usage);
            let mut encoder = new_encoder(device);
            encoder.copy_buffer_to_buffer(&current, 0, &grown, 0, current.size());
            queue.submit(Some(encoder.finish()));
            log::debug!(
                "Grew {} from {} to {} bytes",
                buffer.label,
                current.size(),
                grown.size()
            );
            update = BufferUpdate::Reallocated(WgpuGarbage::Buffer(std::mem::replace(
                &mut *current,
                grown,
            )));
        }
        queue.write_buffer(&current, offset as u64, &padded);
        Ok(update)
    }

    fn shader_module(
        &self,
        program: &str,
        stage: &ShaderStageSource,
    ) -> Result<wgpu::ShaderModule, BackendError> {
        let ShaderSource::Wgsl(source) = &stage.source else {
            return Err(BackendError::Unsupported(format!(
                "program '{program}': precompiled shader binaries (WGSL only)"
            )));
        };
        let module = self
            .context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.as_str())),
            });
        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|message| message.message_type == wgpu::CompilationMessageType::Error)
            .map(|message| message.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(BackendError::ShaderCompilation {
                program: program.to_owned(),
                details: errors.join("\n"),
            });
        }
        Ok(module)
    }

    /// Scaled or mip blits need a filterable source and a renderable destination.
    fn ensure_blittable(&self, texture: &WgpuTexture) -> Result<(), BackendError> {
        let features = self.context.adapter.get_texture_format_features(texture.format);
        let renderable = features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
        let filterable = features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);
        let target = texture.descriptor.target;
        if !renderable || !filterable || target == SamplerType::Sampler3D {
            return Err(BackendError::Unsupported(format!(
                "blitting {:?} {:?} textures",
                texture.descriptor.format, target
            )));
        }
        Ok(())
    }

    fn blit_layers(
        &mut self,
        dst: &WgpuTexture,
        dst_region: &TextureRegion,
        src: &WgpuTexture,
        src_region: &TextureRegion,
        filter: wgpu::FilterMode,
    ) {
        let device = &self.context.device;
        let blitter = self.blitter.get_or_insert_with(|| Blitter::new(device));
        let encoder = self.encoder.get_or_insert_with(|| new_encoder(device));
        let (src_width, src_height, _) = src.descriptor.level_extent(src_region.level);
        for layer in 0..src_region.extent.depth.min(dst_region.extent.depth) {
            let source = src.single_view(src_region.level, src_region.offset.z + layer);
            let target = dst.single_view(dst_region.level, dst_region.offset.z + layer);
            blitter.blit(
                device,
                encoder,
                &source,
                (src_width, src_height),
                BlitRect {
                    x: src_region.offset.x,
                    y: src_region.offset.y,
                    width: src_region.extent.width,
                    height: src_region.extent.height,
                },
                &target,
                dst.format,
                BlitRect {
                    x: dst_region.offset.x,
                    y: dst_region.offset.y,
                    width: dst_region.extent.width,
                    height: dst_region.extent.height,
                },
                filter,
            );
        }
    }

    fn mark_completed(&self, index: SubmissionIndex) {
        self.completed.fetch_max(index.0, Ordering::AcqRel);
    }
}

impl Backend for WgpuBackend {
    type VertexBuffer = WgpuVertexBuffer;
    type IndexBuffer = WgpuIndexBuffer;
    type UniformBuffer = WgpuUniformBuffer;
    type Texture = WgpuTexture;
    type Program = WgpuProgram;
    type PrimitiveLayout = WgpuPrimitive;
    type RenderTarget = WgpuRenderTarget;
    type SwapChain = WgpuSwapChain;
    type RasterState = WgpuRasterState;
    type Sampler = WgpuSampler;
    type Garbage = WgpuGarbage;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
        self.texture_features(format).is_some_and(|(_, features)| {
            features
                .allowed_usages
                .contains(wgpu::TextureUsages::TEXTURE_BINDING)
        })
    }

    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
        self.texture_features(format).is_some_and(|(_, features)| {
            features
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        })
    }

    fn can_generate_mipmaps(&self) -> bool {
        true
    }

    // --- Buffers ---

    fn create_vertex_buffer(
        &mut self,
        descriptor: &VertexBufferDescriptor,
    ) -> Result<WgpuVertexBuffer, BackendError> {
        let buffers = (0..descriptor.buffer_count)
            .map(|index| {
                WgpuBuffer::new(
                    &self.context.device,
                    "lumen vertex buffer",
                    descriptor.buffer_size(index),
                    descriptor.usage,
                    wgpu::BufferUsages::VERTEX,
                )
            })
            .collect();
        Ok(WgpuVertexBuffer { buffers })
    }

    fn update_vertex_buffer(
        &mut self,
        buffer: &WgpuVertexBuffer,
        index: u8,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<WgpuGarbage>, BackendError> {
        let native = buffer
            .buffers
            .get(index as usize)
            .ok_or_else(|| BackendError::Native(format!("no vertex buffer {index}")))?;
        self.write_buffer(native, data, offset)
    }

    fn destroy_vertex_buffer(&mut self, buffer: &WgpuVertexBuffer) {
        for native in &buffer.buffers {
            native.current().destroy();
        }
    }

    fn create_index_buffer(
        &mut self,
        descriptor: &IndexBufferDescriptor,
    ) -> Result<WgpuIndexBuffer, BackendError> {
        Ok(WgpuIndexBuffer {
            buffer: WgpuBuffer::new(
                &self.context.device,
                "lumen index buffer",
                descriptor.size(),
                descriptor.usage,
                wgpu::BufferUsages::INDEX,
            ),
            index_type: descriptor.index_type,
        })
    }

    fn update_index_buffer(
        &mut self,
        buffer: &WgpuIndexBuffer,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<WgpuGarbage>, BackendError> {
        self.write_buffer(&buffer.buffer, data, offset)
    }

    fn destroy_index_buffer(&mut self, buffer: &WgpuIndexBuffer) {
        buffer.buffer.current().destroy();
    }

    fn create_uniform_buffer(
        &mut self,
        descriptor: &UniformBufferDescriptor,
    ) -> Result<WgpuUniformBuffer, BackendError> {
        Ok(WgpuUniformBuffer {
            buffer: WgpuBuffer::new(
                &self.context.device,
                "lumen uniform buffer",
                descriptor.size,
                descriptor.usage,
                wgpu::BufferUsages::UNIFORM,
            ),
        })
    }

    fn load_uniform_buffer(
        &mut self,
        buffer: &WgpuUniformBuffer,
        data: &[u8],
    ) -> Result<BufferUpdate<WgpuGarbage>, BackendError> {
        self.write_buffer(&buffer.buffer, data, 0)
    }

    fn destroy_uniform_buffer(&mut self, buffer: &WgpuUniformBuffer) {
        buffer.buffer.current().destroy();
    }

    // --- Textures ---

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<WgpuTexture, BackendError> {
        let (format, features) = self.texture_features(descriptor.format).ok_or_else(|| {
            BackendError::Unsupported(format!("texture format {:?}", descriptor.format))
        })?;
        let renderable = features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
            && !descriptor.format.is_compressed();
        let wants_attachment = descriptor.usage.intersects(
            TextureUsage::COLOR_ATTACHMENT
                | TextureUsage::DEPTH_ATTACHMENT
                | TextureUsage::STENCIL_ATTACHMENT,
        );
        if wants_attachment && !renderable {
            return Err(BackendError::Unsupported(format!(
                "{:?} render attachments",
                descriptor.format
            )));
        }

        let samples = u32::from(descriptor.samples.max(1));
        let usage = if samples > 1 {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            let mut usage = wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::TEXTURE_BINDING;
            if renderable {
                usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
            }
            usage
        };
        let depth_or_array_layers = match descriptor.target {
            SamplerType::Sampler3D => descriptor.depth,
            _ => descriptor.layer_count(),
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size: wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers,
            },
            mip_level_count: u32::from(descriptor.levels),
            sample_count: samples,
            dimension: descriptor.target.into_wgpu(),
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("lumen texture view"),
            dimension: Some(descriptor.target.into_wgpu()),
            ..Default::default()
        });
        Ok(WgpuTexture {
            texture,
            view,
            format,
            descriptor: *descriptor,
        })
    }

    fn update_texture(
        &mut self,
        texture: &WgpuTexture,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let format = texture.descriptor.format;
        if format.is_depth_or_stencil() {
            return Err(BackendError::Unsupported(format!("uploads to {format:?} textures")));
        }
        self.flush_pending();
        let (_, block_height, _) = format.block_info();
        self.context.queue.write_texture(
            texel_copy(
                texture,
                region.level,
                region.offset.x,
                region.offset.y,
                region.offset.z,
                wgpu::TextureAspect::All,
            ),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(format.row_size(region.extent.width) as u32),
                rows_per_image: Some(region.extent.height.div_ceil(block_height)),
            },
            copy_extent(format, region),
        );
        Ok(())
    }

    fn copy_texture(
        &mut self,
        dst: &WgpuTexture,
        dst_region: &TextureRegion,
        src: &WgpuTexture,
        src_region: &TextureRegion,
        filter: SamplerMagFilter,
    ) -> Result<(), BackendError> {
        if dst_region.extent == src_region.extent {
            let aspect = wgpu::TextureAspect::All;
            let encoder = self
                .encoder
                .get_or_insert_with(|| new_encoder(&self.context.device));
            encoder.copy_texture_to_texture(
                texel_copy(
                    src,
                    src_region.level,
                    src_region.offset.x,
                    src_region.offset.y,
                    src_region.offset.z,
                    aspect,
                ),
                texel_copy(
                    dst,
                    dst_region.level,
                    dst_region.offset.x,
                    dst_region.offset.y,
                    dst_region.offset.z,
                    aspect,
                ),
                copy_extent(src.descriptor.format, src_region),
            );
            return Ok(());
        }
        if src.descriptor.format.is_depth_or_stencil() || src.descriptor.format.is_compressed() {
            return Err(BackendError::Unsupported(format!(
                "scaled copies of {:?} textures",
                src.descriptor.format
            )));
        }
        if src_region.extent.depth != dst_region.extent.depth {
            return Err(BackendError::Unsupported(
                "scaled copies across a different number of layers".into(),
            ));
        }
        self.ensure_blittable(dst)?;
        self.blit_layers(dst, dst_region, src, src_region, filter.into_wgpu());
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: &WgpuTexture,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> Result<(), BackendError> {
        let format = texture.descriptor.format;
        let aspect = match format {
            TextureFormat::Depth16 | TextureFormat::Depth32f => wgpu::TextureAspect::DepthOnly,
            TextureFormat::Stencil8 => wgpu::TextureAspect::StencilOnly,
            _ if format.is_depth_or_stencil() => {
                return Err(BackendError::Unsupported(format!("reading back {format:?}")));
            }
            _ => wgpu::TextureAspect::All,
        };
        let (_, block_height, _) = format.block_info();
        let row_size = format.row_size(region.extent.width);
        let padded_row = align_to(row_size as u64, u64::from(READBACK_ROW_ALIGNMENT));
        let rows = u64::from(region.extent.height.div_ceil(block_height));
        let layers = u64::from(region.extent.depth.max(1));

        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen readback buffer"),
            size: padded_row * rows * layers,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.replay_segment(false);
        let mut encoder = self.take_encoder();
        encoder.copy_texture_to_buffer(
            texel_copy(
                texture,
                region.level,
                region.offset.x,
                region.offset.y,
                region.offset.z,
                aspect,
            ),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row as u32),
                    rows_per_image: Some(rows as u32),
                },
            },
            copy_extent(format, region),
        );
        let submission = self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|e| BackendError::DeviceLost(e.to_string()))?;
        receiver
            .recv()
            .map_err(|_| BackendError::Native("readback mapping was dropped".into()))?
            .map_err(|e| BackendError::Native(format!("readback mapping failed: {e}")))?;

        {
            let mapped = slice.get_mapped_range();
            for (row, chunk) in out.chunks_mut(row_size).enumerate() {
                let start = row * padded_row as usize;
                let len = chunk.len();
                chunk.copy_from_slice(&mapped[start..start + len]);
            }
        }
        staging.unmap();
        staging.destroy();
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: &WgpuTexture) -> Result<(), BackendError> {
        self.ensure_blittable(texture)?;
        let descriptor = texture.descriptor;
        let layers = descriptor.layer_count();
        for level in 1..descriptor.levels {
            let (src_width, src_height, _) = descriptor.level_extent(level - 1);
            let (width, height, _) = descriptor.level_extent(level);
            let mut src_region = TextureRegion::new_2d(level - 1, 0, 0, src_width, src_height);
            src_region.extent.depth = layers;
            let mut dst_region = TextureRegion::new_2d(level, 0, 0, width, height);
            dst_region.extent.depth = layers;
            self.blit_layers(texture, &dst_region, texture, &src_region, wgpu::FilterMode::Linear);
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: &WgpuTexture) {
        texture.texture.destroy();
    }

    // --- Programs ---

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<WgpuProgram, BackendError> {
        let vertex = self.shader_module(&descriptor.name, &descriptor.vertex)?;
        let fragment = self.shader_module(&descriptor.name, &descriptor.fragment)?;
        let device = &self.context.device;

        let uniform_slots: Vec<usize> = descriptor
            .uniform_blocks
            .iter()
            .enumerate()
            .filter_map(|(slot, block)| block.as_ref().map(|_| slot))
            .collect();
        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = uniform_slots
            .iter()
            .map(|&slot| wgpu::BindGroupLayoutEntry {
                binding: slot as u32,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen uniform layout"),
            entries: &uniform_entries,
        });

        let mut sampler_entries = Vec::new();
        let mut layout_entries = Vec::new();
        for (group, layout) in descriptor.sampler_groups.iter().enumerate() {
            let Some(layout) = layout else {
                continue;
            };
            for slot in &layout.samplers {
                let entry = SamplerEntry {
                    group,
                    binding: slot.binding,
                };
                let (sample_type, sampler_type) = if slot.shadow {
                    (
                        wgpu::TextureSampleType::Depth,
                        wgpu::SamplerBindingType::Comparison,
                    )
                } else {
                    (
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::SamplerBindingType::Filtering,
                    )
                };
                layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: entry.texture_binding(),
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type,
                        view_dimension: slot.target.into_wgpu(),
                        multisampled: false,
                    },
                    count: None,
                });
                layout_entries.push(wgpu::BindGroupLayoutEntry {
                    binding: entry.texture_binding() + 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Sampler(sampler_type),
                    count: None,
                });
                sampler_entries.push(entry);
            }
        }
        let sampler_layout = (!layout_entries.is_empty()).then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lumen sampler layout"),
                entries: &layout_entries,
            })
        });

        let mut bind_group_layouts = vec![&uniform_layout];
        bind_group_layouts.extend(sampler_layout.as_ref());
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&descriptor.name),
            bind_group_layouts: &bind_group_layouts,
            immediate_size: 0,
        });

        let uid = self.next_program_uid;
        self.next_program_uid += 1;
        log::debug!(
            "Program '{}' created with {} uniform slot(s) and {} sampler(s)",
            descriptor.name,
            uniform_slots.len(),
            sampler_entries.len()
        );
        Ok(WgpuProgram {
            uid,
            name: descriptor.name.clone(),
            vertex,
            vertex_entry: descriptor.vertex.entry_point.clone(),
            fragment,
            fragment_entry: descriptor.fragment.entry_point.clone(),
            uniform_slots,
            sampler_entries,
            uniform_layout,
            sampler_layout,
            pipeline_layout,
        })
    }

    fn destroy_program(&mut self, program: &WgpuProgram) {
        self.pipelines.evict_program(program.uid);
    }

    // --- Render primitives ---

    fn create_primitive_layout(&mut self) -> Result<WgpuPrimitive, BackendError> {
        Ok(WgpuPrimitive::default())
    }

    fn bind_primitive_buffers(
        &mut self,
        primitive: &WgpuPrimitive,
        _vertex_buffer: &WgpuVertexBuffer,
        vertex_layout: &VertexBufferDescriptor,
        _index_buffer: &WgpuIndexBuffer,
        enabled_attributes: u32,
    ) -> Result<(), BackendError> {
        let mut slots = Vec::new();
        for (location, attribute) in vertex_layout.attributes.iter().enumerate() {
            if !attribute.is_used() || enabled_attributes & (1 << location) == 0 {
                continue;
            }
            let format = vertex_format(attribute.element_type, attribute.flags).ok_or_else(|| {
                BackendError::Unsupported(format!(
                    "vertex attribute {location} of type {:?}",
                    attribute.element_type
                ))
            })?;
            slots.push(VertexSlot {
                location: location as u32,
                buffer: attribute.buffer,
                offset: u64::from(attribute.offset),
                stride: u64::from(attribute.effective_stride()),
                format,
            });
        }
        *lock(&primitive.layout) = Some(Arc::new(VertexLayout { slots }));
        Ok(())
    }

    fn destroy_primitive_layout(&mut self, primitive: &WgpuPrimitive) {
        lock(&primitive.layout).take();
    }

    // --- Render targets and swap chains ---

    fn create_default_render_target(&mut self) -> Result<WgpuRenderTarget, BackendError> {
        Ok(WgpuRenderTarget::Default {
            depth: Mutex::new(None),
        })
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
        attachments: RenderTargetAttachments<'_, Self>,
    ) -> Result<WgpuRenderTarget, BackendError> {
        let color = attachments.color.map(|attachment| AttachmentTarget {
            view: attachment
                .texture
                .single_view(attachment.level, u32::from(attachment.layer)),
            format: attachment.texture.format,
            depth_slice: (attachment.descriptor.target == SamplerType::Sampler3D)
                .then_some(u32::from(attachment.layer)),
        });
        let depth_stencil = attachments
            .depth
            .or(attachments.stencil)
            .map(|attachment| AttachmentTarget {
                view: attachment
                    .texture
                    .single_view(attachment.level, u32::from(attachment.layer)),
                format: attachment.texture.format,
                depth_slice: None,
            });
        Ok(WgpuRenderTarget::Offscreen {
            width: descriptor.width,
            height: descriptor.height,
            samples: u32::from(descriptor.samples.max(1)),
            color,
            depth_stencil,
        })
    }

    fn prepare_default_target(
        &mut self,
        target: &WgpuRenderTarget,
        width: u32,
        height: u32,
        depth_format: TextureFormat,
    ) -> Result<Option<WgpuGarbage>, BackendError> {
        let WgpuRenderTarget::Default { depth } = target else {
            return Err(BackendError::Native(
                "prepare_default_target on an offscreen target".into(),
            ));
        };
        let format = texture_format(depth_format)
            .filter(|format| format.is_depth_stencil_format())
            .ok_or_else(|| {
                BackendError::Unsupported(format!("default depth format {depth_format:?}"))
            })?;
        let mut depth = lock(depth);
        if depth
            .as_ref()
            .is_some_and(|d| d.width == width && d.height == height && d.format == format)
        {
            return Ok(None);
        }
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen default depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Default depth buffer is now {width}x{height} {format:?}");
        let previous = depth.replace(DefaultDepth {
            texture,
            view,
            width,
            height,
            format,
        });
        Ok(previous.map(|old| WgpuGarbage::Texture(old.texture)))
    }

    fn destroy_render_target(&mut self, target: &WgpuRenderTarget) {
        if let WgpuRenderTarget::Default { depth } = target {
            if let Some(depth) = lock(depth).take() {
                depth.texture.destroy();
            }
        }
    }

    fn create_swap_chain(&mut self, window: &NativeWindow) -> Result<WgpuSwapChain, BackendError> {
        match *window {
            NativeWindow::Raw {
                window,
                display,
                width,
                height,
            } => {
                // SAFETY: `NativeWindow::from_raw` requires the handles to outlive
                // the swap chain, which owns the surface.
                let surface = unsafe { self.context.create_surface(window, display) }
                    .map_err(|e| BackendError::Presentation(e.to_string()))?;
                let config = self
                    .context
                    .surface_configuration(&surface, width, height)
                    .map_err(|e| BackendError::Presentation(e.to_string()))?;
                surface.configure(&self.context.device, &config);
                let format = config.format;
                log::info!("Swap chain created: {width}x{height} {format:?}");
                Ok(WgpuSwapChain {
                    target: SwapChainTarget::Surface {
                        surface,
                        config: Mutex::new(config),
                    },
                    extent: Mutex::new((width, height)),
                    format,
                    frame: Mutex::new(None),
                })
            }
            NativeWindow::Offscreen { width, height } => {
                let format = wgpu::TextureFormat::Rgba8Unorm;
                let texture = offscreen_back_buffer(&self.context.device, width, height, format);
                log::info!("Offscreen swap chain created: {width}x{height}");
                Ok(WgpuSwapChain {
                    target: SwapChainTarget::Offscreen {
                        texture: Mutex::new(texture),
                    },
                    extent: Mutex::new((width, height)),
                    format,
                    frame: Mutex::new(None),
                })
            }
        }
    }

    fn swap_chain_extent(&self, swap_chain: &WgpuSwapChain) -> (u32, u32) {
        *lock(&swap_chain.extent)
    }

    fn resize_swap_chain(
        &mut self,
        swap_chain: &WgpuSwapChain,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        *lock(&swap_chain.extent) = (width, height);
        lock(&swap_chain.frame).take();
        match &swap_chain.target {
            SwapChainTarget::Surface { surface, config } => {
                let mut config = lock(config);
                config.width = width.max(1);
                config.height = height.max(1);
                surface.configure(&self.context.device, &config);
            }
            SwapChainTarget::Offscreen { texture } => {
                let mut texture = lock(texture);
                texture.destroy();
                *texture =
                    offscreen_back_buffer(&self.context.device, width, height, swap_chain.format);
            }
        }
        log::debug!("Swap chain resized to {width}x{height}");
        Ok(())
    }

    fn make_current(
        &mut self,
        _draw: &WgpuSwapChain,
        _read: &WgpuSwapChain,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn present(&mut self, swap_chain: &WgpuSwapChain) -> Result<(), BackendError> {
        match lock(&swap_chain.frame).take() {
            Some(frame) => frame.present(),
            None => log::trace!("Nothing was rendered into the swap chain this frame"),
        }
        Ok(())
    }

    fn destroy_swap_chain(&mut self, swap_chain: &WgpuSwapChain) {
        lock(&swap_chain.frame).take();
        if let SwapChainTarget::Offscreen { texture } = &swap_chain.target {
            lock(texture).destroy();
        }
    }

    // --- Pipeline state ---

    fn create_raster_state(&mut self, state: &RasterState) -> Result<WgpuRasterState, BackendError> {
        Ok(WgpuRasterState { state: *state })
    }

    fn destroy_raster_state(&mut self, _state: &WgpuRasterState) {}

    fn create_sampler(&mut self, params: &SamplerParams) -> Result<WgpuSampler, BackendError> {
        let mag_filter: wgpu::FilterMode = params.filter_mag.into_wgpu();
        let (min_filter, mipmap_filter): (wgpu::FilterMode, wgpu::MipmapFilterMode) =
            params.filter_min.into_wgpu();
        let all_linear = mag_filter == wgpu::FilterMode::Linear
            && min_filter == wgpu::FilterMode::Linear
            && mipmap_filter == wgpu::MipmapFilterMode::Linear;
        let sampler = self.context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u: params.wrap_s.into_wgpu(),
            address_mode_v: params.wrap_t.into_wgpu(),
            address_mode_w: params.wrap_r.into_wgpu(),
            mag_filter,
            min_filter,
            mipmap_filter,
            lod_min_clamp: 0.0,
            lod_max_clamp: params.max_lod(),
            compare: (params.compare_mode == SamplerCompareMode::CompareToTexture)
                .then(|| params.compare_func.into_wgpu()),
            // Anisotropy requires linear filtering everywhere.
            anisotropy_clamp: if all_linear { params.max_anisotropy() } else { 1 },
            border_color: None,
        });
        Ok(WgpuSampler {
            sampler,
            params: *params,
        })
    }

    fn destroy_sampler(&mut self, _sampler: &WgpuSampler) {}

    // --- Passes ---

    fn begin_render_pass(
        &mut self,
        target: &WgpuRenderTarget,
        swap_chain: Option<&WgpuSwapChain>,
        params: &RenderPassParams,
    ) -> Result<(), BackendError> {
        let device = &self.context.device;
        let (color, depth_stencil, samples, width, height) = match target {
            WgpuRenderTarget::Default { depth } => {
                let swap_chain = swap_chain.ok_or_else(|| {
                    BackendError::Native("default target without a swap chain".into())
                })?;
                let (width, height) = *lock(&swap_chain.extent);
                let view = match &swap_chain.target {
                    SwapChainTarget::Surface { surface, config } => {
                        let mut frame = lock(&swap_chain.frame);
                        let current = match frame.take() {
                            Some(current) => current,
                            None => acquire_frame(surface, &lock(config), device)?,
                        };
                        let view = current
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default());
                        *frame = Some(current);
                        view
                    }
                    SwapChainTarget::Offscreen { texture } => {
                        lock(texture).create_view(&wgpu::TextureViewDescriptor::default())
                    }
                };
                let color = AttachmentTarget {
                    view,
                    format: swap_chain.format,
                    depth_slice: None,
                };
                let depth = lock(depth).as_ref().map(|depth| AttachmentTarget {
                    view: depth.view.clone(),
                    format: depth.format,
                    depth_slice: None,
                });
                (Some(color), depth, 1, width, height)
            }
            WgpuRenderTarget::Offscreen {
                width,
                height,
                samples,
                color,
                depth_stencil,
            } => (color.clone(), depth_stencil.clone(), *samples, *width, *height),
        };

        let scissor = if params.viewport.width == 0 || params.viewport.height == 0 {
            clip_viewport(&Viewport::new(width, height), width, height)
        } else {
            clip_viewport(&params.viewport, width, height)
        };
        self.pass = Some(PassRecording {
            color,
            depth_stencil,
            samples,
            width,
            height,
            params: *params,
            first_segment: true,
            scissor,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn set_viewport_scissor(&mut self, viewport: &Viewport) {
        if let Some(pass) = self.pass.as_mut() {
            pass.scissor = clip_viewport(viewport, pass.width, pass.height);
        }
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), BackendError> {
        let Some(pass) = self.pass.as_ref() else {
            return Err(BackendError::Native("draw outside of a render pass".into()));
        };
        if call.raster.culling == CullingMode::FrontAndBack {
            return Ok(());
        }
        let Some(scissor) = pass.scissor else {
            return Ok(());
        };
        let layout = lock(&call.primitive.layout)
            .clone()
            .ok_or_else(|| BackendError::Native("draw with an unbound primitive".into()))?;
        let program = call.program;
        let device = &self.context.device;

        let mut uniform_buffers = Vec::with_capacity(program.uniform_slots.len());
        for &slot in &program.uniform_slots {
            let Some(Some(binding)) = call.uniforms.get(slot) else {
                log::warn!(
                    "Skipping draw with program '{}': uniform slot {slot} is unbound",
                    program.name
                );
                return Ok(());
            };
            uniform_buffers.push((slot, binding.buffer.buffer.current(), binding));
        }
        let uniform_entries: Vec<wgpu::BindGroupEntry<'_>> = uniform_buffers
            .iter()
            .map(|(slot, buffer, binding)| wgpu::BindGroupEntry {
                binding: *slot as u32,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: binding.offset as u64,
                    size: NonZeroU64::new(binding.size as u64),
                }),
            })
            .collect();
        let mut bind_groups = vec![device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen uniform bind group"),
            layout: &program.uniform_layout,
            entries: &uniform_entries,
        })];

        if let Some(sampler_layout) = &program.sampler_layout {
            let mut entries = Vec::with_capacity(program.sampler_entries.len() * 2);
            for entry in &program.sampler_entries {
                let Some(binding) = call
                    .samplers
                    .iter()
                    .find(|s| s.group == entry.group && s.binding == entry.binding)
                else {
                    log::warn!(
                        "Skipping draw with program '{}': sampler {}:{} is unbound",
                        program.name,
                        entry.group,
                        entry.binding
                    );
                    return Ok(());
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: entry.texture_binding(),
                    resource: wgpu::BindingResource::TextureView(&binding.texture.view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: entry.texture_binding() + 1,
                    resource: wgpu::BindingResource::Sampler(&binding.sampler.sampler),
                });
            }
            bind_groups.push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lumen sampler bind group"),
                layout: sampler_layout,
                entries: &entries,
            }));
        }

        let mut vertex_buffers = Vec::with_capacity(layout.slots.len());
        for slot in &layout.slots {
            let buffer = call
                .vertex_buffer
                .buffers
                .get(slot.buffer as usize)
                .ok_or_else(|| {
                    BackendError::Native(format!("attribute reads missing buffer {}", slot.buffer))
                })?;
            vertex_buffers.push((buffer.current(), slot.offset));
        }

        let index_format: wgpu::IndexFormat = call.index_type.into_wgpu();
        let strip_index_format = matches!(
            call.range.primitive_type,
            PrimitiveType::LineStrip | PrimitiveType::TriangleStrip
        )
        .then_some(index_format);
        let key = PipelineKey {
            program: program.uid,
            raster: call.raster.key(),
            polygon_offset: (
                call.polygon_offset.slope.to_bits(),
                call.polygon_offset.constant.to_bits(),
            ),
            vertex_layout: (*layout).clone(),
            primitive_type: call.range.primitive_type,
            strip_index_format,
            color_format: pass.color.as_ref().map(|color| color.format),
            depth_format: pass.depth_stencil.as_ref().map(|depth| depth.format),
            samples: pass.samples,
        };
        let pipeline = self.pipelines.get_or_create(
            device,
            key,
            program,
            &call.raster_state.state,
            call.polygon_offset,
        );

        let draw = RecordedDraw {
            pipeline,
            bind_groups,
            vertex_buffers,
            index_buffer: call.index_buffer.buffer.current(),
            index_format,
            indices: call.range.offset..call.range.offset + call.range.count,
            scissor,
        };
        if let Some(pass) = self.pass.as_mut() {
            pass.draws.push(draw);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), BackendError> {
        if self.pass.is_none() {
            return Err(BackendError::Native("no render pass to end".into()));
        }
        self.replay_segment(true);
        self.pass = None;
        Ok(())
    }

    // --- Timeline ---

    fn recording_submission(&self) -> SubmissionIndex {
        self.recording
    }

    fn submit(&mut self) -> Result<SubmissionIndex, BackendError> {
        if self.pass.is_some() {
            return Err(BackendError::Native("submit inside a render pass".into()));
        }
        let encoder = self.take_encoder();
        let native = self.context.queue.submit(Some(encoder.finish()));
        let index = self.recording;
        let completed = Arc::clone(&self.completed);
        self.context.queue.on_submitted_work_done(move || {
            completed.fetch_max(index.0, Ordering::AcqRel);
        });
        self.in_flight.push_back((index, native));
        self.submitted = index;
        self.recording = index.next();
        log::trace!("{} submitted {index}", self.label);
        Ok(index)
    }

    fn completed_submission(&mut self) -> SubmissionIndex {
        if let Err(error) = self.context.device.poll(wgpu::PollType::Poll) {
            log::warn!("Device poll failed: {error}");
        }
        let completed = self.completed.load(Ordering::Acquire);
        while self
            .in_flight
            .front()
            .is_some_and(|(index, _)| index.0 <= completed)
        {
            self.in_flight.pop_front();
        }
        SubmissionIndex(completed)
    }

    fn wait_submission(&mut self, index: SubmissionIndex, timeout: Duration) -> FenceStatus {
        if index <= self.completed_submission() {
            return FenceStatus::ConditionSatisfied;
        }
        if index > self.submitted || timeout.is_zero() {
            return FenceStatus::TimeoutExpired;
        }
        let Some(native) = self
            .in_flight
            .iter()
            .find(|(submitted, _)| *submitted >= index)
            .map(|(_, native)| native.clone())
        else {
            return FenceStatus::ConditionSatisfied;
        };
        let timeout = (timeout != Duration::MAX).then_some(timeout);
        match self.context.device.poll(wgpu::PollType::Wait {
            submission_index: Some(native),
            timeout,
        }) {
            Ok(_) => {
                self.mark_completed(index);
                FenceStatus::ConditionSatisfied
            }
            Err(wgpu::PollError::Timeout) => FenceStatus::TimeoutExpired,
            Err(error) => {
                log::error!("Waiting for {index} failed: {error}");
                FenceStatus::Error
            }
        }
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.context
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| BackendError::DeviceLost(e.to_string()))?;
        self.mark_completed(self.submitted);
        self.in_flight.clear();
        Ok(())
    }

    fn release_garbage(&mut self, garbage: WgpuGarbage) {
        garbage.destroy();
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.pass = None;
        self.encoder = None;
        if let Err(error) = self.finish() {
            log::warn!("Device did not drain before shutdown: {error}");
        }
        log::info!(
            "Terminating wgpu backend '{}' ({} cached pipeline(s)).",
            self.label,
            self.pipelines.len()
        );
        self.pipelines.clear();
        self.blitter = None;
        self.terminated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_flips_to_top_left_origin() {
        let viewport = Viewport {
            left: 10,
            bottom: 20,
            width: 100,
            height: 50,
        };
        assert_eq!(
            clip_viewport(&viewport, 200, 100),
            Some(PixelRect {
                x: 10,
                y: 30,
                width: 100,
                height: 50
            })
        );
    }

    #[test]
    fn test_viewport_is_clipped_to_target() {
        let viewport = Viewport {
            left: -10,
            bottom: -10,
            width: 300,
            height: 300,
        };
        assert_eq!(
            clip_viewport(&viewport, 64, 32),
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 64,
                height: 32
            })
        );
    }

    #[test]
    fn test_offscreen_viewport_is_empty() {
        let viewport = Viewport {
            left: 500,
            bottom: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(clip_viewport(&viewport, 64, 64), None);
    }

    #[test]
    fn test_compressed_copy_extent_is_block_aligned() {
        let region = TextureRegion::new_2d(3, 0, 0, 2, 1);
        let extent = copy_extent(TextureFormat::Etc2Rgb8, &region);
        assert_eq!((extent.width, extent.height, extent.depth_or_array_layers), (4, 4, 1));
    }
}
