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

//! Render pipeline cache and the blit pipelines behind scaled copies and mip
//! generation.

use super::conversions::IntoWgpu;
use super::resources::{VertexLayout, WgpuProgram};
use lumen_core::driver::{PolygonOffset, PrimitiveType, RasterState, RasterStateKey};
use std::borrow::Cow;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Everything a render pipeline is specialized on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub(crate) program: u64,
    pub(crate) raster: RasterStateKey,
    pub(crate) polygon_offset: (u32, u32),
    pub(crate) vertex_layout: VertexLayout,
    pub(crate) primitive_type: PrimitiveType,
    pub(crate) strip_index_format: Option<wgpu::IndexFormat>,
    pub(crate) color_format: Option<wgpu::TextureFormat>,
    pub(crate) depth_format: Option<wgpu::TextureFormat>,
    pub(crate) samples: u32,
}

/// Render pipelines keyed on program, state and attachment formats.
#[derive(Debug, Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub(crate) fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Drops every pipeline built for `program`.
    pub(crate) fn evict_program(&mut self, program: u64) {
        self.pipelines.retain(|key, _| key.program != program);
    }

    pub(crate) fn clear(&mut self) {
        self.pipelines.clear();
    }

    pub(crate) fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        program: &WgpuProgram,
        raster: &RasterState,
        polygon_offset: PolygonOffset,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }
        let pipeline = create_pipeline(device, &key, program, raster, polygon_offset);
        log::debug!(
            "Created render pipeline #{} for program '{}'",
            self.pipelines.len() + 1,
            program.name
        );
        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    program: &WgpuProgram,
    raster: &RasterState,
    polygon_offset: PolygonOffset,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
        .vertex_layout
        .slots
        .iter()
        .map(|slot| {
            [wgpu::VertexAttribute {
                format: slot.format,
                offset: 0,
                shader_location: slot.location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
        .vertex_layout
        .slots
        .iter()
        .zip(&attributes)
        .map(|(slot, attributes)| wgpu::VertexBufferLayout {
            array_stride: slot.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    let blend = raster.blend.enabled.then(|| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: raster.blend.src_rgb.into_wgpu(),
            dst_factor: raster.blend.dst_rgb.into_wgpu(),
            operation: raster.blend.equation_rgb.into_wgpu(),
        },
        alpha: wgpu::BlendComponent {
            src_factor: raster.blend.src_alpha.into_wgpu(),
            dst_factor: raster.blend.dst_alpha.into_wgpu(),
            operation: raster.blend.equation_alpha.into_wgpu(),
        },
    });
    let targets = [key.color_format.map(|format| wgpu::ColorTargetState {
        format,
        blend,
        write_mask: raster.color_write.into_wgpu(),
    })];

    let depth_stencil = key.depth_format.map(|format| {
        let stencil = &raster.stencil;
        let face = wgpu::StencilFaceState {
            compare: stencil.compare.into_wgpu(),
            fail_op: stencil.fail_op.into_wgpu(),
            depth_fail_op: stencil.depth_fail_op.into_wgpu(),
            pass_op: stencil.pass_op.into_wgpu(),
        };
        let face = if stencil.enabled {
            face
        } else {
            wgpu::StencilFaceState::IGNORE
        };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: raster.depth_write && format.has_depth_aspect(),
            depth_compare: if format.has_depth_aspect() {
                raster.depth_func.into_wgpu()
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: stencil.read_mask as u32,
                write_mask: stencil.write_mask as u32,
            },
            bias: wgpu::DepthBiasState {
                constant: polygon_offset.constant as i32,
                slope_scale: polygon_offset.slope,
                clamp: 0.0,
            },
        }
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&program.name),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(&program.vertex_entry),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(&program.fragment_entry),
            targets: if key.color_format.is_some() { &targets } else { &[] },
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.primitive_type.into_wgpu(),
            strip_index_format: key.strip_index_format,
            front_face: if raster.inverse_front_faces {
                wgpu::FrontFace::Cw
            } else {
                wgpu::FrontFace::Ccw
            },
            cull_mode: raster.culling.into_wgpu(),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.samples,
            ..Default::default()
        },
        multiview_mask: None,
        cache: None,
    })
}

// --- Blits ---

const BLIT_SHADER: &str = r#"
struct Region {
    offset: vec2<f32>,
    scale: vec2<f32>,
};

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(0) @binding(2) var<uniform> region: Region;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(corner.x * 2.0 - 1.0, 1.0 - corner.y * 2.0, 0.0, 1.0);
    out.uv = region.offset + corner * region.scale;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(source, source_sampler, in.uv, 0.0);
}
"#;

/// A texel rectangle of one image.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlitRect {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// Copies between color images of different sizes with a filtered draw.
#[derive(Debug)]
pub(crate) struct Blitter {
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl Blitter {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen blit shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(BLIT_SHADER)),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen blit bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen blit pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let sampler = |filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("lumen blit sampler"),
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        Self {
            nearest: sampler(wgpu::FilterMode::Nearest),
            linear: sampler(wgpu::FilterMode::Linear),
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    fn pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&format) {
            return pipeline.clone();
        }
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen blit pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert(format, pipeline.clone());
        pipeline
    }

    /// Records a blit of `src_rect` of `source` (an image of `src_size`) into
    /// `dst_rect` of `target`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn blit(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        src_size: (u32, u32),
        src_rect: BlitRect,
        target: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
        dst_rect: BlitRect,
        filter: wgpu::FilterMode,
    ) {
        let (width, height) = (src_size.0.max(1) as f32, src_size.1.max(1) as f32);
        let region: [f32; 4] = [
            src_rect.x as f32 / width,
            src_rect.y as f32 / height,
            src_rect.width as f32 / width,
            src_rect.height as f32 / height,
        ];
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen blit region"),
            contents: bytemuck::cast_slice(&region),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let sampler = match filter {
            wgpu::FilterMode::Nearest => &self.nearest,
            wgpu::FilterMode::Linear => &self.linear,
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen blit bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        });
        let pipeline = self.pipeline(device, target_format);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lumen blit pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, Some(&bind_group), &[]);
        pass.set_viewport(
            dst_rect.x as f32,
            dst_rect.y as f32,
            dst_rect.width as f32,
            dst_rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(dst_rect.x, dst_rect.y, dst_rect.width, dst_rect.height);
        pass.draw(0..3, 0..1);
    }
}
