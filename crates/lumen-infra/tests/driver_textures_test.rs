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
use lumen_core::driver::dispatcher::TextureObject;
use lumen_core::driver::*;
use lumen_infra::graphics::headless::{HeadlessBackend, NativeCall, NativeKind};
use std::sync::{Arc, Mutex};

#[test]
fn test_sub_region_update_reads_back() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false));

    // --- 2. ACT ---
    driver.update_2d_image(
        texture,
        0,
        1,
        1,
        2,
        2,
        PixelBufferDescriptor::new(vec![1, 2, 3, 4], TextureFormat::R8),
    );
    let pixels = read_back(&mut driver, texture, TextureFormat::R8, TextureRegion::new_2d(0, 0, 0, 4, 4));

    // --- 3. ASSERT ---
    #[rustfmt::skip]
    let expected = vec![
        0, 0, 0, 0,
        0, 1, 2, 0,
        0, 3, 4, 0,
        0, 0, 0, 0,
    ];
    assert_eq!(pixels, expected);

    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn test_generated_mipmaps_average_level_zero() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let descriptor = TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, true);
    assert_eq!(descriptor.levels, 3);
    let texture = driver.create_texture(descriptor);
    driver.update_2d_image(
        texture,
        0,
        0,
        0,
        4,
        4,
        PixelBufferDescriptor::new(vec![200; 64], TextureFormat::Rgba8),
    );

    // --- 2. ACT ---
    driver.generate_mipmaps(texture);

    // --- 3. ASSERT ---
    let smallest = read_back(&mut driver, texture, TextureFormat::Rgba8, TextureRegion::whole_level(&descriptor, 2));
    assert_eq!(smallest, vec![200; 4]);
    let middle = read_back(&mut driver, texture, TextureFormat::Rgba8, TextureRegion::whole_level(&descriptor, 1));
    assert_eq!(middle, vec![200; 16]);

    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn test_single_level_texture_skips_mip_generation() {
    let mut driver = driver();
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, false));
    driver.backend_mut().take_calls();

    driver.generate_mipmaps(texture);

    assert!(!driver
        .backend()
        .calls()
        .iter()
        .any(|call| matches!(call, NativeCall::GenerateMips { .. })));
    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn test_cubemap_faces_are_uploaded_separately() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let texture = driver.create_texture(TextureDescriptor::cubemap(TextureFormat::R8, 2, false));
    let face_size = 4;
    let data: Vec<u8> = (0..6u8).flat_map(|face| [face * 10; 4]).collect();

    // --- 2. ACT ---
    driver.update_cube_image(
        texture,
        0,
        PixelBufferDescriptor::new(data, TextureFormat::R8),
        FaceOffsets::packed(face_size),
    );

    // --- 3. ASSERT ---
    for face in 0..6u32 {
        let mut region = TextureRegion::new_2d(0, 0, 0, 2, 2);
        region.offset.z = face;
        let pixels = read_back(&mut driver, texture, TextureFormat::R8, region);
        assert_eq!(pixels, vec![face as u8 * 10; 4], "face {face}");
    }
    let uploads = driver
        .backend()
        .calls()
        .iter()
        .filter(|call| matches!(call, NativeCall::UpdateTexture { .. }))
        .count();
    assert_eq!(uploads, 6);

    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn test_scaled_copy_picks_nearest_texels() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let src = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 2, 2, false));
    let dst = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false));
    driver.update_2d_image(src, 0, 0, 0, 2, 2, PixelBufferDescriptor::new(vec![1, 2, 3, 4], TextureFormat::R8));

    // --- 2. ACT ---
    driver.copy_texture(
        dst,
        TextureRegion::new_2d(0, 0, 0, 4, 4),
        src,
        TextureRegion::new_2d(0, 0, 0, 2, 2),
        SamplerMagFilter::Nearest,
    );

    // --- 3. ASSERT ---
    #[rustfmt::skip]
    let expected = vec![
        1, 1, 2, 2,
        1, 1, 2, 2,
        3, 3, 4, 4,
        3, 3, 4, 4,
    ];
    let pixels = read_back(&mut driver, dst, TextureFormat::R8, TextureRegion::new_2d(0, 0, 0, 4, 4));
    assert_eq!(pixels, expected);

    driver.destroy_texture(src);
    driver.destroy_texture(dst);
    driver.terminate();
}

#[test]
fn test_texture_payload_is_returned_after_retirement() {
    let mut driver = driver();
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 2, 2, false));
    let returned = Arc::new(Mutex::new(Vec::new()));
    let sink = returned.clone();

    driver.update_2d_image(
        texture,
        0,
        0,
        0,
        2,
        2,
        PixelBufferDescriptor::new(vec![5; 4], TextureFormat::R8)
            .with_release_callback(move |bytes| sink.lock().unwrap().push(bytes)),
    );
    driver.flush();
    assert!(returned.lock().unwrap().is_empty());
    driver.flush();

    assert_eq!(*returned.lock().unwrap(), vec![vec![5; 4]]);
    driver.destroy_texture(texture);
    driver.terminate();
}

#[test]
fn test_sampler_groups_bind_views_and_cached_samplers() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 16, 16);
    let mesh = Mesh::new(&mut driver);
    let layout = SamplerGroupLayout {
        samplers: vec![SamplerSlot {
            name: "albedo".into(),
            binding: 0,
            target: SamplerType::Sampler2D,
            shadow: false,
        }],
    };
    let program = driver.create_program(
        ProgramDescriptor::new(
            "textured",
            ShaderStageSource::wgsl(SHADER, "vs_main"),
            ShaderStageSource::wgsl(SHADER, "fs_main"),
        )
        .with_sampler_group(0, layout),
    );
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, false));
    let group = driver.create_sampler_group(1);
    driver.update_sampler_group(
        group,
        vec![SamplerGroupEntry {
            texture,
            params: SamplerParams::default(),
        }],
    );
    let view = native::<_, TextureObject<HeadlessBackend>>(&driver, texture)
        .native
        .view
        .expect("default textures are sampleable");
    driver.backend_mut().take_calls();

    // --- 2. ACT ---
    let state = PipelineState { program, ..Default::default() };
    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.bind_samplers(0, group);
    driver.draw(&state, mesh.primitive);
    driver.draw(&state, mesh.primitive);
    driver.end_render_pass();

    // --- 3. ASSERT ---
    let calls = driver.backend().calls();
    let bound_views = calls
        .iter()
        .filter(|call| **call == NativeCall::SetShaderResource { group: 0, binding: 0, view })
        .count();
    assert_eq!(bound_views, 2);
    assert_eq!(driver.stats().sampler_count, 1);
    assert_eq!(driver.stats().samplers.hits, 1);
    assert_eq!(driver.backend().ledger().live_of(NativeKind::Sampler), 1);

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_sampler_group(group);
    driver.destroy_texture(texture);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
    assert_eq!(driver.backend().ledger().live_count(), 0);
}
