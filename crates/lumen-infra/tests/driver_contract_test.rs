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

mod common;

use common::*;
use lumen_core::driver::*;
use lumen_infra::graphics::headless::HeadlessConfig;

#[test]
#[should_panic(expected = "driver contract violation: draw called outside a render pass")]
fn test_draw_outside_a_pass_panics() {
    let mut driver = driver();
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[]);

    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
}

#[test]
#[should_panic(expected = "beginRenderPass called inside a render pass")]
fn test_nested_passes_panic() {
    let mut driver = driver();
    let (_, target) = window(&mut driver, 8, 8);

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.begin_render_pass(target, &RenderPassParams::default());
}

#[test]
#[should_panic(expected = "bindUniformBuffer: slot 8 of 8")]
fn test_uniform_slot_out_of_range_panics() {
    let mut driver = driver();
    let (_, target) = window(&mut driver, 8, 8);
    let uniforms = driver.create_uniform_buffer(16, BufferUsage::Static);

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.bind_uniform_buffer(8, uniforms);
}

#[test]
#[should_panic(expected = "createTexture: width must be non-zero")]
fn test_zero_sized_texture_panics() {
    let mut driver = driver();
    driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 0, 4, false));
}

#[test]
#[should_panic(expected = "createTexture: R8 is not supported by the headless backend")]
fn test_unsupported_format_panics() {
    let mut driver = driver_with(HeadlessConfig {
        supported_formats: Some(vec![TextureFormat::Rgba8]),
        ..HeadlessConfig::default()
    });
    assert!(!driver.is_texture_format_supported(TextureFormat::R8));

    driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false));
}

#[test]
#[should_panic(expected = "generateMipmaps: the headless backend cannot generate mipmaps")]
fn test_mipmaps_on_an_incapable_backend_panic() {
    let mut driver = driver_with(HeadlessConfig {
        can_generate_mipmaps: false,
        ..HeadlessConfig::default()
    });
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, true));

    driver.generate_mipmaps(texture);
}

#[test]
#[should_panic(expected = "dynamic buffers never grow")]
fn test_dynamic_buffer_overflow_panics() {
    let mut driver = driver();
    let buffer = driver.create_vertex_buffer(vertex_layout(2, BufferUsage::Dynamic));

    driver.update_vertex_buffer(buffer, 0, BufferDescriptor::new(vec![0; 65]), 0);
}

#[test]
#[should_panic(expected = "setRenderPrimitiveRange: indices 0..25 exceed 24")]
fn test_range_past_grown_index_buffer_panics() {
    let mut driver = driver();
    let mesh = Mesh::new(&mut driver);
    driver.update_index_buffer(mesh.indices, BufferDescriptor::from_slice(&[0u16; 6]), 18 * 2);

    driver.set_render_primitive_range(mesh.primitive, PrimitiveType::Triangles, 0, 0, 11, 25);
}

#[test]
#[should_panic(expected = "updateIndexBuffer: range of 8 bytes at offset")]
fn test_write_offset_overflow_panics() {
    let mut driver = driver();
    let buffer = driver.create_index_buffer(IndexBufferDescriptor {
        index_type: IndexType::U16,
        index_count: 4,
        usage: BufferUsage::Static,
    });

    driver.update_index_buffer(buffer, BufferDescriptor::new(vec![0; 8]), usize::MAX - 2);
}

#[test]
#[should_panic(expected = "updateCubeImage: face 0 at offset")]
fn test_cube_face_offset_overflow_panics() {
    let mut driver = driver();
    let cube = driver.create_texture(TextureDescriptor::cubemap(TextureFormat::R8, 2, false));

    driver.update_cube_image(
        cube,
        0,
        PixelBufferDescriptor::new(vec![0; 24], TextureFormat::R8),
        FaceOffsets([usize::MAX - 2, 4, 8, 12, 16, 20]),
    );
}

#[test]
#[should_panic(expected = "updateVertexBuffer received a null")]
fn test_null_handle_panics() {
    let mut driver = driver();
    driver.update_vertex_buffer(VertexBufferHandle::NULL, 0, BufferDescriptor::new(vec![0; 4]), 0);
}

#[test]
#[should_panic(expected = "beginRenderPass: the default target needs a current swap chain (makeCurrent)")]
fn test_default_target_without_a_swap_chain_panics() {
    let mut driver = driver();
    driver.create_swap_chain(NativeWindow::Offscreen { width: 8, height: 8 });
    let target = driver.create_default_render_target();

    driver.begin_render_pass(target, &RenderPassParams::default());
}

#[test]
#[should_panic(expected = "are enabled but not described by")]
fn test_enabling_undescribed_attributes_panics() {
    let mut driver = driver();
    let mesh = Mesh::new(&mut driver);

    driver.set_render_primitive_buffer(mesh.primitive, mesh.vertices, mesh.indices, 0b111);
}

#[test]
#[should_panic(expected = "copyTexture: R8 into Rgba8")]
fn test_copy_between_formats_panics() {
    let mut driver = driver();
    let src = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false));
    let dst = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, false));
    let region = TextureRegion::new_2d(0, 0, 0, 4, 4);

    driver.copy_texture(dst, region, src, region, SamplerMagFilter::Linear);
}

#[test]
#[should_panic(expected = "createVertexBuffer called after terminate")]
fn test_creation_after_terminate_panics() {
    let mut driver = driver();
    driver.terminate();

    driver.create_vertex_buffer(vertex_layout(4, BufferUsage::Static));
}
