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

// Lumen Sandbox
// Renders a few frames of a triangle through the driver layer.

use std::mem;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use lumen_core::driver::*;
use lumen_infra::create_driver;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl Vertex {
    const STRIDE: u8 = mem::size_of::<Vertex>() as u8;

    fn layout(vertex_count: u32) -> VertexBufferDescriptor {
        VertexBufferDescriptor::new(1, vertex_count, BufferUsage::Static)
            // @location(0) in shader: position
            .with_attribute(0, Attribute::new(0, ElementType::Float3, 0, Self::STRIDE))
            // @location(1) in shader: color
            .with_attribute(
                1,
                Attribute::new(0, ElementType::Float3, mem::size_of::<[f32; 3]>() as u32, Self::STRIDE),
            )
    }
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2];

const SHADER: &str = r#"
struct Frame {
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0) * frame.tint;
}
"#;

const FRAME_COUNT: u32 = 3;

/// Handles recorded by the loader thread.
struct Scene {
    vertices: VertexBufferHandle,
    indices: IndexBufferHandle,
    primitive: RenderPrimitiveHandle,
    program: ProgramHandle,
    frame_uniforms: UniformBufferHandle,
}

impl Scene {
    /// Records every resource of the scene. Runs off the render thread.
    fn load(queue: &CommandQueue) -> Self {
        let vertices = queue.create_vertex_buffer(Vertex::layout(VERTICES.len() as u32));
        queue.update_vertex_buffer(vertices, 0, BufferDescriptor::from_slice(VERTICES), 0);

        let indices = queue.create_index_buffer(IndexBufferDescriptor {
            index_type: IndexType::U16,
            index_count: INDICES.len() as u32,
            usage: BufferUsage::Static,
        });
        queue.update_index_buffer(indices, BufferDescriptor::from_slice(INDICES), 0);

        let primitive = queue.create_render_primitive();
        queue.set_render_primitive_buffer(primitive, vertices, indices, 0b11);
        queue.set_render_primitive_range(
            primitive,
            PrimitiveType::Triangles,
            0,
            0,
            VERTICES.len() as u32 - 1,
            INDICES.len() as u32,
        );

        let program = queue.create_program(
            ProgramDescriptor::new(
                "sandbox triangle",
                ShaderStageSource::wgsl(SHADER, "vs_main"),
                ShaderStageSource::wgsl(SHADER, "fs_main"),
            )
            .with_uniform_block(0, "Frame"),
        );
        let frame_uniforms = queue.create_uniform_buffer(mem::size_of::<[f32; 4]>(), BufferUsage::Dynamic);
        log::info!("Loader: scene recorded.");

        Self {
            vertices,
            indices,
            primitive,
            program,
            frame_uniforms,
        }
    }

    fn destroy(self, driver: &mut dyn Driver) {
        driver.destroy_render_primitive(self.primitive);
        driver.destroy_vertex_buffer(self.vertices);
        driver.destroy_index_buffer(self.indices);
        driver.destroy_program(self.program);
        driver.destroy_uniform_buffer(self.frame_uniforms);
    }
}

fn load_config() -> Result<DriverConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read driver configuration '{path}'"))?;
            DriverConfig::from_json(&text)
        }
        None => Ok(DriverConfig {
            label: "sandbox".to_owned(),
            ..DriverConfig::default()
        }),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let capacity = config.command_queue_capacity;
    let mut driver = create_driver(config)?;
    log::info!("Sandbox running on the {} backend.", driver.backend_name());

    let swap_chain = driver.create_swap_chain(NativeWindow::Offscreen {
        width: 320,
        height: 240,
    });
    driver.make_current(swap_chain, SwapChainHandle::NULL);
    let target = driver.create_default_render_target();

    let (queue, stream) = CommandQueue::for_driver(&driver, capacity);
    let loader = thread::Builder::new()
        .name("lumen-loader".into())
        .spawn(move || Scene::load(&queue))
        .context("Failed to spawn the loader thread")?;
    // A bounded queue blocks the loader once full, so drain while it records.
    while !loader.is_finished() {
        if stream.execute_pending(&mut driver) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    let scene = loader
        .join()
        .map_err(|_| anyhow::anyhow!("The loader thread panicked"))?;

    let state = PipelineState {
        program: scene.program,
        ..Default::default()
    };
    let params = RenderPassParams {
        flags: RenderPassFlags {
            clear: TargetBufferFlags::ALL,
            ..Default::default()
        },
        clear_color: [0.1, 0.1, 0.15, 1.0],
        ..Default::default()
    };

    for frame in 0..FRAME_COUNT {
        driver.begin_frame(frame);
        let executed = stream.execute_pending(&mut driver);
        if executed > 0 {
            log::debug!("Frame {frame}: executed {executed} recorded commands");
        }

        let fade = 1.0 - frame as f32 / FRAME_COUNT as f32;
        driver.load_uniform_buffer(
            scene.frame_uniforms,
            BufferDescriptor::from_slice(&[fade, fade, fade, 1.0f32]),
        );
        driver.begin_render_pass(target, &params);
        driver.bind_uniform_buffer(0, scene.frame_uniforms);
        driver.draw(&state, scene.primitive);
        driver.end_render_pass();
        driver.commit(swap_chain);
        driver.end_frame(frame);
    }

    let fence = driver.create_fence();
    let status = driver.wait(fence, Duration::from_secs(1));
    log::info!("Last frame fence: {status:?}");
    driver.destroy_fence(fence);

    scene.destroy(&mut driver);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
    log::info!("Sandbox finished: {:?}", driver.stats());
    Ok(())
}
