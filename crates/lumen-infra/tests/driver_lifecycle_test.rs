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
use lumen_core::driver::dispatcher::VertexBufferObject;
use lumen_core::driver::*;
use lumen_infra::graphics::headless::{HeadlessBackend, HeadlessConfig, NativeKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn test_destroyed_buffer_outlives_the_submission_that_used_it() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let buffer = driver.create_vertex_buffer(vertex_layout(4, BufferUsage::Static));
    let native_id = native::<_, VertexBufferObject<HeadlessBackend>>(&driver, buffer).native.ids()[0];
    assert!(driver.backend().ledger().is_live(native_id));

    // --- 2. ACT ---
    driver.destroy_vertex_buffer(buffer);
    driver.flush();

    // --- 3. ASSERT ---
    // One submission of latency: the GPU may still read the buffer.
    assert!(!driver.handle_table().contains(buffer));
    assert!(driver.backend().ledger().is_live(native_id));
    assert_eq!(driver.stats().pending_destructions, 1);

    driver.flush();
    assert!(!driver.backend().ledger().is_live(native_id));
    assert_eq!(driver.stats().pending_destructions, 0);
    assert_eq!(driver.stats().retired_destructions, 1);

    driver.terminate();
}

#[test]
fn test_destroy_null_handle_is_a_no_op() {
    let mut driver = driver();

    driver.destroy_vertex_buffer(VertexBufferHandle::NULL);
    driver.destroy_texture(TextureHandle::NULL);
    driver.destroy_fence(FenceHandle::NULL);

    assert_eq!(driver.stats().pending_destructions, 0);
    driver.terminate();
}

#[test]
fn test_terminate_releases_every_native_object() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 32, 32);
    let mesh = Mesh::new(&mut driver);
    let program = program(&mut driver, &[0]);
    let uniforms = driver.create_uniform_buffer(64, BufferUsage::Dynamic);
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::Rgba8, 8, 8, true));

    driver.begin_frame(0);
    driver.begin_render_pass(target, &clear_pass());
    driver.bind_uniform_buffer(0, uniforms);
    driver.draw(&PipelineState { program, ..Default::default() }, mesh.primitive);
    driver.end_render_pass();
    driver.commit(swap_chain);
    driver.end_frame(0);

    // --- 2. ACT ---
    mesh.destroy(&mut driver);
    driver.destroy_program(program);
    driver.destroy_uniform_buffer(uniforms);
    driver.destroy_texture(texture);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();

    // --- 3. ASSERT ---
    let ledger = driver.backend().ledger();
    assert_eq!(ledger.live_count(), 0, "leaked: {:?}", ledger.census());
    assert!(driver.handle_table().is_empty());
    assert!(driver.backend().is_terminated());
}

#[test]
fn test_cached_states_are_destroyed_at_terminate() {
    let mut driver = driver();
    let culled = RasterState::default();
    let unculled = RasterState {
        culling: CullingMode::None,
        ..RasterState::default()
    };

    let first = driver.raster_state(&culled);
    let again = driver.raster_state(&culled);
    driver.raster_state(&unculled);

    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(driver.stats().raster_state_count, 2);
    assert_eq!(driver.backend().ledger().live_of(NativeKind::RasterizerState), 2);

    driver.terminate();
    assert_eq!(driver.backend().ledger().live_of(NativeKind::RasterizerState), 0);
}

#[test]
fn test_release_callback_runs_after_retirement() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let buffer = driver.create_index_buffer(IndexBufferDescriptor {
        index_type: IndexType::U16,
        index_count: 3,
        usage: BufferUsage::Static,
    });
    let returned = Arc::new(Mutex::new(None));
    let sink = returned.clone();

    // --- 2. ACT ---
    driver.update_index_buffer(
        buffer,
        BufferDescriptor::from_slice(&[0u16, 1, 2]).with_release_callback(move |bytes| {
            *sink.lock().unwrap() = Some(bytes);
        }),
        0,
    );
    driver.flush();
    let after_one_flush = returned.lock().unwrap().is_some();
    driver.flush();

    // --- 3. ASSERT ---
    assert!(!after_one_flush);
    assert_eq!(returned.lock().unwrap().as_deref(), Some(&[0u8, 0, 1, 0, 2, 0][..]));

    driver.destroy_index_buffer(buffer);
    driver.terminate();
}

#[test]
fn test_fence_times_out_then_signals() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let fence = driver.create_fence();

    // --- 2. ACT ---
    let immediate = driver.wait(fence, Duration::ZERO);
    let patient = driver.wait(fence, Duration::from_secs(1));

    // --- 3. ASSERT ---
    assert_eq!(immediate, FenceStatus::TimeoutExpired);
    assert_eq!(patient, FenceStatus::ConditionSatisfied);

    driver.destroy_fence(fence);
    driver.terminate();
}

#[test]
fn test_fence_signals_immediately_without_latency() {
    let mut driver = driver_with(HeadlessConfig {
        retire_latency: 0,
        ..HeadlessConfig::default()
    });
    let fence = driver.create_fence();

    assert_eq!(driver.wait(fence, Duration::ZERO), FenceStatus::ConditionSatisfied);
    driver.terminate();
}

#[test]
fn test_invalid_fences_report_errors() {
    let mut driver = driver();
    let fence = driver.create_fence();
    driver.destroy_fence(fence);

    assert_eq!(driver.wait(FenceHandle::NULL, Duration::ZERO), FenceStatus::Error);
    assert_eq!(driver.wait(fence, Duration::ZERO), FenceStatus::Error);

    driver.terminate();
    let late = driver.create_fence_s();
    assert_eq!(driver.wait(late, Duration::ZERO), FenceStatus::Error);
}

#[test]
fn test_finish_retires_everything() {
    let mut driver = driver_with(HeadlessConfig {
        retire_latency: 3,
        ..HeadlessConfig::default()
    });
    let uniforms = driver.create_uniform_buffer(16, BufferUsage::Static);
    driver.destroy_uniform_buffer(uniforms);

    driver.flush();
    assert_eq!(driver.stats().pending_destructions, 1);

    driver.finish();
    assert_eq!(driver.stats().pending_destructions, 0);
    assert_eq!(driver.backend().ledger().live_count(), 0);
    driver.terminate();
}

#[test]
fn test_dropping_without_terminate_still_cleans_up() {
    let mut driver = driver();
    let texture = driver.create_texture(TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false));
    driver.destroy_texture(texture);

    drop(driver);
}
