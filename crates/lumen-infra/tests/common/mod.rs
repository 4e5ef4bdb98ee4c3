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

//! Fixtures shared by the driver integration tests.

#![allow(dead_code)]

use lumen_core::driver::*;
use lumen_infra::graphics::headless::{HeadlessBackend, HeadlessConfig};
use std::any::Any;
use std::sync::Arc;

pub type TestDriver = Dispatcher<HeadlessBackend>;

pub const SHADER: &str = "@vertex fn vs_main() {}\n@fragment fn fs_main() {}";

/// Bytes per vertex of the test mesh: a position and a texture coordinate.
pub const VERTEX_STRIDE: usize = 32;

pub fn driver() -> TestDriver {
    driver_with(HeadlessConfig::default())
}

pub fn driver_with(config: HeadlessConfig) -> TestDriver {
    let _ = env_logger::builder().is_test(true).try_init();
    Dispatcher::new(HeadlessBackend::new(config), DriverConfig::default())
}

/// The realized object behind `handle`.
pub fn native<K: HandleKind, T: Any + Send + Sync>(driver: &TestDriver, handle: Handle<K>) -> Arc<T> {
    driver
        .handle_table()
        .lookup(handle)
        .expect("handle should be realized")
}

pub fn program(driver: &mut TestDriver, uniform_slots: &[usize]) -> ProgramHandle {
    let mut descriptor = ProgramDescriptor::new(
        "test",
        ShaderStageSource::wgsl(SHADER, "vs_main"),
        ShaderStageSource::wgsl(SHADER, "fs_main"),
    );
    for &slot in uniform_slots {
        descriptor = descriptor.with_uniform_block(slot, format!("Block{slot}"));
    }
    driver.create_program(descriptor)
}

pub fn vertex_layout(vertex_count: u32, usage: BufferUsage) -> VertexBufferDescriptor {
    VertexBufferDescriptor::new(1, vertex_count, usage)
        .with_attribute(0, Attribute::new(0, ElementType::Float3, 0, VERTEX_STRIDE as u8))
        .with_attribute(1, Attribute::new(0, ElementType::Float2, 12, VERTEX_STRIDE as u8))
}

/// A 12-vertex, 18-index mesh bound to a render primitive.
pub struct Mesh {
    pub vertices: VertexBufferHandle,
    pub indices: IndexBufferHandle,
    pub primitive: RenderPrimitiveHandle,
}

impl Mesh {
    pub fn new(driver: &mut TestDriver) -> Self {
        let vertices = driver.create_vertex_buffer(vertex_layout(12, BufferUsage::Static));
        driver.update_vertex_buffer(
            vertices,
            0,
            BufferDescriptor::new(vec![0x3f; 12 * VERTEX_STRIDE]),
            0,
        );

        let indices = driver.create_index_buffer(IndexBufferDescriptor {
            index_type: IndexType::U16,
            index_count: 18,
            usage: BufferUsage::Static,
        });
        let index_data: Vec<u16> = (0..18).map(|i| (i % 12) as u16).collect();
        driver.update_index_buffer(indices, BufferDescriptor::from_slice(&index_data), 0);

        let primitive = driver.create_render_primitive();
        driver.set_render_primitive_buffer(primitive, vertices, indices, 0b11);
        driver.set_render_primitive_range(primitive, PrimitiveType::Triangles, 0, 0, 11, 18);
        Self {
            vertices,
            indices,
            primitive,
        }
    }

    pub fn destroy(self, driver: &mut TestDriver) {
        driver.destroy_render_primitive(self.primitive);
        driver.destroy_vertex_buffer(self.vertices);
        driver.destroy_index_buffer(self.indices);
    }
}

/// An offscreen swap chain made current, with the default render target.
pub fn window(driver: &mut TestDriver, width: u32, height: u32) -> (SwapChainHandle, RenderTargetHandle) {
    let swap_chain = driver.create_swap_chain(NativeWindow::Offscreen { width, height });
    driver.make_current(swap_chain, SwapChainHandle::NULL);
    (swap_chain, driver.create_default_render_target())
}

pub fn clear_pass() -> RenderPassParams {
    RenderPassParams {
        flags: RenderPassFlags {
            clear: TargetBufferFlags::ALL,
            ..Default::default()
        },
        clear_color: [0.0, 0.0, 0.0, 1.0],
        ..Default::default()
    }
}

/// Reads `region` of `texture` back into memory.
pub fn read_back(driver: &mut TestDriver, texture: TextureHandle, format: TextureFormat, region: TextureRegion) -> Vec<u8> {
    let (sender, receiver) = flume::bounded(1);
    driver.copy_texture_to_memory(
        texture,
        region,
        PixelBufferDescriptor::for_readback(format, &region),
        Box::new(move |data| {
            let _ = sender.send(data.data);
        }),
    );
    receiver.recv().expect("readback callback dropped")
}
