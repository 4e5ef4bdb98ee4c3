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
use lumen_core::driver::dispatcher::{RenderTargetObject, SwapChainObject, VertexBufferObject};
use lumen_core::driver::*;
use lumen_infra::graphics::headless::{HeadlessBackend, NativeCall, NativeId, NativeKind};

fn constant_buffer_at(calls: &[NativeCall], slot: usize) -> Vec<Option<NativeId>> {
    calls
        .iter()
        .filter_map(|call| match call {
            NativeCall::SetConstantBuffer { slot: s, buffer, .. } if *s == slot => Some(*buffer),
            _ => None,
        })
        .collect()
}

#[test]
fn test_frame_draws_one_indexed_mesh_and_presents() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 64, 64);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[]);
    driver.backend_mut().take_calls();

    // --- 2. ACT ---
    driver.begin_frame(7);
    driver.begin_render_pass(target, &clear_pass());
    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
    driver.end_render_pass();
    driver.commit(swap_chain);
    driver.end_frame(7);

    // --- 3. ASSERT ---
    let draws = driver.backend().draw_calls();
    assert_eq!(
        draws,
        vec![NativeCall::DrawIndexed {
            primitive_type: PrimitiveType::Triangles,
            index_count: 18,
            first_index: 0,
            min_index: 0,
            max_index: 11,
        }]
    );
    assert_eq!(driver.stats().draws, 1);

    let chain = native::<_, SwapChainObject<HeadlessBackend>>(&driver, swap_chain);
    assert_eq!(chain.native.presented(), 1);
    // Cleared to opaque black.
    assert!(chain.native.back_buffer().chunks_exact(4).all(|px| px == [0, 0, 0, 255]));

    let calls = driver.backend().calls();
    let present = calls.iter().position(|call| matches!(call, NativeCall::Present { .. }));
    let first_submit = calls.iter().position(|call| matches!(call, NativeCall::Submit(_)));
    assert!(first_submit < present, "work must be submitted before presenting");

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
    assert_eq!(driver.backend().ledger().live_count(), 0);
}

#[test]
fn test_default_viewport_covers_the_swap_chain() {
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 64, 48);
    driver.backend_mut().take_calls();

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.set_viewport_scissor(0, 0, 16, 8);
    driver.end_render_pass();

    let viewports: Vec<_> = driver
        .backend()
        .calls()
        .iter()
        .filter(|call| matches!(call, NativeCall::SetViewport { .. }))
        .cloned()
        .collect();
    assert_eq!(
        viewports,
        vec![
            NativeCall::SetViewport { x: 0, y: 0, width: 64, height: 48 },
            // Bottom-left origin flipped to the native top-left one.
            NativeCall::SetViewport { x: 0, y: 40, width: 16, height: 8 },
        ]
    );

    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_uniform_bindings_reset_between_passes() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 16, 16);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[0]);
    let uniforms = driver.create_uniform_buffer(64, BufferUsage::Dynamic);
    let state = PipelineState { program, ..Default::default() };
    driver.backend_mut().take_calls();

    // --- 2. ACT ---
    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.bind_uniform_buffer(0, uniforms);
    driver.draw(&state, mesh.primitive);
    driver.end_render_pass();
    let first_pass = driver.backend_mut().take_calls();

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.draw(&state, mesh.primitive);
    driver.end_render_pass();
    let second_pass = driver.backend_mut().take_calls();

    // --- 3. ASSERT ---
    let bound = constant_buffer_at(&first_pass, 0);
    assert_eq!(bound.len(), 1);
    assert!(bound[0].is_some());
    assert_eq!(constant_buffer_at(&second_pass, 0), vec![None]);
    assert_eq!(constant_buffer_at(&second_pass, 7), vec![None]);

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_uniform_buffer(uniforms);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_sampler_bindings_reset_between_passes() {
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
    let state = PipelineState { program, ..Default::default() };
    driver.backend_mut().take_calls();

    // --- 2. ACT ---
    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.bind_samplers(0, group);
    driver.draw(&state, mesh.primitive);
    driver.end_render_pass();

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.draw(&state, mesh.primitive);
    driver.end_render_pass();
    let calls = driver.backend_mut().take_calls();

    // --- 3. ASSERT ---
    let unbinds: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, NativeCall::UnbindShaderResources))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(unbinds.len(), 2);
    let draws: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, NativeCall::DrawIndexed { .. }))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(draws.len(), 2);
    assert!(draws[0] < unbinds[0] && unbinds[0] < draws[1]);

    let (first_pass, second_pass) = calls.split_at(unbinds[0]);
    let group_zero = |call: &NativeCall| {
        matches!(
            call,
            NativeCall::SetShaderResource { group: 0, .. } | NativeCall::SetSampler { group: 0, .. }
        )
    };
    assert_eq!(first_pass.iter().filter(|&call| group_zero(call)).count(), 2);
    assert!(!second_pass.iter().any(group_zero));

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_sampler_group(group);
    driver.destroy_texture(texture);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_uniform_range_binding_reaches_the_draw() {
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 16, 16);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[2]);
    let uniforms = driver.create_uniform_buffer(512, BufferUsage::Static);
    driver.backend_mut().take_calls();

    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.bind_uniform_buffer_range(2, uniforms, 256, 128);
    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
    driver.end_render_pass();

    let range = driver.backend().calls().iter().find_map(|call| match call {
        NativeCall::SetConstantBuffer { slot: 2, offset, size, .. } => Some((*offset, *size)),
        _ => None,
    });
    assert_eq!(range, Some((256, 128)));

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_uniform_buffer(uniforms);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_dynamic_buffer_updates_in_place() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let buffer = driver.create_vertex_buffer(vertex_layout(2, BufferUsage::Dynamic));
    let object = native::<_, VertexBufferObject<HeadlessBackend>>(&driver, buffer);
    let id = object.native.ids()[0];

    // --- 2. ACT ---
    driver.update_vertex_buffer(buffer, 0, BufferDescriptor::new(vec![1; 64]), 0);
    driver.update_vertex_buffer(buffer, 0, BufferDescriptor::new(vec![2; 32]), 32);

    // --- 3. ASSERT ---
    let contents = object.native.contents(0);
    assert_eq!(&contents[..32], &[1; 32][..]);
    assert_eq!(&contents[32..], &[2; 32][..]);
    assert_eq!(object.native.ids(), vec![id]);
    assert!(driver
        .backend()
        .calls()
        .iter()
        .filter(|call| matches!(call, NativeCall::UpdateBuffer { .. }))
        .all(|call| matches!(call, NativeCall::UpdateBuffer { buffer, discard: true, .. } if *buffer == id)));

    driver.destroy_vertex_buffer(buffer);
    driver.terminate();
}

#[test]
fn test_static_buffer_growth_rebinds_and_retires_the_old_storage() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 16, 16);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[]);
    let object = native::<_, VertexBufferObject<HeadlessBackend>>(&driver, mesh.vertices);
    let old_id = object.native.ids()[0];

    // --- 2. ACT ---
    // Writing past the end of a static buffer reallocates it.
    driver.update_vertex_buffer(
        mesh.vertices,
        0,
        BufferDescriptor::new(vec![9; 4 * VERTEX_STRIDE]),
        12 * VERTEX_STRIDE,
    );
    driver.backend_mut().take_calls();
    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
    driver.end_render_pass();
    driver.flush();
    driver.flush();

    // --- 3. ASSERT ---
    let new_id = object.native.ids()[0];
    assert_ne!(new_id, old_id);
    assert!(driver
        .backend()
        .calls()
        .contains(&NativeCall::SetVertexBuffers(vec![new_id])));
    assert!(!driver.backend().ledger().is_live(old_id));
    assert!(driver.backend().ledger().is_live(new_id));
    assert_eq!(object.native.contents(0).len(), 16 * VERTEX_STRIDE);

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_grown_static_buffers_draw_their_new_range() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 16, 16);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[]);

    // --- 2. ACT ---
    // Four more vertices and six more indices than the buffers were created with.
    driver.update_vertex_buffer(
        mesh.vertices,
        0,
        BufferDescriptor::new(vec![7; 4 * VERTEX_STRIDE]),
        12 * VERTEX_STRIDE,
    );
    driver.update_index_buffer(
        mesh.indices,
        BufferDescriptor::from_slice(&[12u16, 13, 14, 14, 13, 15]),
        18 * 2,
    );
    driver.set_render_primitive_range(mesh.primitive, PrimitiveType::Triangles, 0, 0, 15, 24);
    driver.backend_mut().take_calls();
    driver.begin_render_pass(target, &RenderPassParams::default());
    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
    driver.end_render_pass();

    // --- 3. ASSERT ---
    assert_eq!(
        driver.backend().draw_calls(),
        vec![NativeCall::DrawIndexed {
            primitive_type: PrimitiveType::Triangles,
            index_count: 24,
            first_index: 0,
            min_index: 0,
            max_index: 15,
        }]
    );

    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_default_depth_follows_swap_chain_resize() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 64, 64);
    driver.begin_render_pass(target, &clear_pass());
    driver.end_render_pass();
    let render_target = native::<_, RenderTargetObject<HeadlessBackend>>(&driver, target);
    let first = render_target.native.default_depth().expect("depth created on first pass");

    // --- 2. ACT ---
    driver.resize_swap_chain(swap_chain, 128, 96);
    driver.begin_render_pass(target, &clear_pass());
    driver.end_render_pass();
    driver.finish();

    // --- 3. ASSERT ---
    let second = render_target.native.default_depth().expect("depth recreated");
    assert_eq!((first.width, first.height), (64, 64));
    assert_eq!((second.width, second.height), (128, 96));
    assert_eq!(second.format, driver.config().default_depth_format);
    let ledger = driver.backend().ledger();
    assert!(!ledger.is_live(first.texture) && !ledger.is_live(first.view));
    assert!(ledger.is_live(second.texture));
    assert_eq!(ledger.live_of(NativeKind::DepthStencilView), 1);

    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
}

#[test]
fn test_offscreen_pass_clears_its_attachment() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let color = driver.create_texture(
        TextureDescriptor::texture_2d(TextureFormat::Rgba8, 4, 4, false)
            .with_usage(TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE),
    );
    let target = driver.create_render_target(RenderTargetDescriptor {
        flags: TargetBufferFlags::COLOR,
        width: 4,
        height: 4,
        samples: 1,
        color: TargetBufferInfo::new(color),
        depth: TargetBufferInfo::default(),
        stencil: TargetBufferInfo::default(),
    });
    let mut params = clear_pass();
    params.clear_color = [1.0, 0.0, 0.0, 1.0];

    // --- 2. ACT ---
    driver.begin_render_pass(target, &params);
    driver.end_render_pass();

    // --- 3. ASSERT ---
    let region = TextureRegion::new_2d(0, 0, 0, 4, 4);
    let (sender, receiver) = flume::bounded(1);
    driver.copy_texture_to_memory(
        color,
        region,
        PixelBufferDescriptor::for_readback(TextureFormat::Rgba8, &region),
        Box::new(move |data| {
            let _ = sender.send(data.data);
        }),
    );
    let pixels = receiver.try_recv().expect("readback completes synchronously");
    assert_eq!(pixels.len(), 64);
    assert!(pixels.chunks_exact(4).all(|px| px == [255, 0, 0, 255]));

    driver.destroy_render_target(target);
    driver.destroy_texture(color);
    driver.terminate();
}
