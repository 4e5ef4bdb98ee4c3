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
use lumen_core::driver::dispatcher::{IndexBufferObject, UniformBufferObject};
use lumen_core::driver::*;
use lumen_infra::graphics::headless::{HeadlessBackend, NativeCall};
use std::thread;
use std::time::Duration;

/// Handles a loader thread hands back to the render thread.
struct Loaded {
    vertices: VertexBufferHandle,
    indices: IndexBufferHandle,
    primitive: RenderPrimitiveHandle,
    program: ProgramHandle,
}

#[test]
fn test_loader_thread_records_and_render_thread_draws() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (swap_chain, target) = window(&mut driver, 32, 32);
    let (queue, stream) = CommandQueue::for_driver(&driver, None);

    // --- 2. ACT ---
    let loader = thread::spawn(move || {
        let vertices = queue.create_vertex_buffer(vertex_layout(12, BufferUsage::Static));
        queue.update_vertex_buffer(vertices, 0, BufferDescriptor::new(vec![0; 12 * VERTEX_STRIDE]), 0);
        let indices = queue.create_index_buffer(IndexBufferDescriptor {
            index_type: IndexType::U32,
            index_count: 6,
            usage: BufferUsage::Static,
        });
        queue.update_index_buffer(indices, BufferDescriptor::from_slice(&[0u32, 1, 2, 2, 1, 3]), 0);
        let primitive = queue.create_render_primitive();
        queue.set_render_primitive_buffer(primitive, vertices, indices, 0b11);
        queue.set_render_primitive_range(primitive, PrimitiveType::Triangles, 0, 0, 3, 6);
        let program = queue.create_program(ProgramDescriptor::new(
            "loaded",
            ShaderStageSource::wgsl(SHADER, "vs_main"),
            ShaderStageSource::wgsl(SHADER, "fs_main"),
        ));
        Loaded {
            vertices,
            indices,
            primitive,
            program,
        }
    });
    let loaded = loader.join().expect("loader thread panicked");

    // Handles exist before the commands run, but nothing is realized yet.
    assert!(!loaded.vertices.is_null());
    assert!(driver.handle_table().contains(loaded.indices));
    assert!(driver
        .handle_table()
        .try_lookup::<_, IndexBufferObject<HeadlessBackend>>(loaded.indices)
        .is_none());

    let executed = stream.execute_pending(&mut driver);
    driver.begin_render_pass(target, &clear_pass());
    driver.draw(
        &PipelineState {
            program: loaded.program,
            ..Default::default()
        },
        loaded.primitive,
    );
    driver.end_render_pass();
    driver.commit(swap_chain);

    // --- 3. ASSERT ---
    assert_eq!(executed, 8);
    assert_eq!(stream.pending(), 0);
    let indices = native::<_, IndexBufferObject<HeadlessBackend>>(&driver, loaded.indices);
    assert_eq!(indices.native.indices(), vec![0, 1, 2, 2, 1, 3]);
    assert_eq!(
        driver.backend().draw_calls(),
        vec![NativeCall::DrawIndexed {
            primitive_type: PrimitiveType::Triangles,
            index_count: 6,
            first_index: 0,
            min_index: 0,
            max_index: 3,
        }]
    );

    driver.destroy_render_primitive(loaded.primitive);
    driver.destroy_vertex_buffer(loaded.vertices);
    driver.destroy_index_buffer(loaded.indices);
    driver.destroy_program(loaded.program);
    driver.destroy_render_target(target);
    driver.destroy_swap_chain(swap_chain);
    driver.terminate();
    assert_eq!(driver.backend().ledger().live_count(), 0);
}

#[test]
fn test_queued_destruction_is_deferred_like_direct_calls() {
    let mut driver = driver();
    let (queue, stream) = CommandQueue::for_driver(&driver, Some(4));
    let uniforms = queue.create_uniform_buffer(32, BufferUsage::Dynamic);
    queue.destroy_uniform_buffer(uniforms);
    queue.flush();

    assert_eq!(stream.execute_pending(&mut driver), 3);

    // Destroyed during submission 1, released once it retires.
    assert_eq!(driver.stats().pending_destructions, 1);
    driver.flush();
    assert_eq!(driver.stats().pending_destructions, 0);
    assert_eq!(driver.backend().ledger().live_count(), 0);
    driver.terminate();
}

#[test]
fn test_bounded_queue_drains_while_the_loader_records() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (queue, stream) = CommandQueue::for_driver(&driver, Some(2));

    // --- 2. ACT ---
    let loader = thread::spawn(move || {
        (0..16)
            .map(|_| queue.create_uniform_buffer(16, BufferUsage::Static))
            .collect::<Vec<_>>()
    });
    let mut executed = 0;
    while !loader.is_finished() {
        executed += stream.execute_pending(&mut driver);
        thread::yield_now();
    }
    let buffers = loader.join().expect("loader thread panicked");
    executed += stream.execute_pending(&mut driver);

    // --- 3. ASSERT ---
    assert_eq!(executed, 16);
    for buffer in buffers {
        assert!(driver
            .handle_table()
            .try_lookup::<_, UniformBufferObject<HeadlessBackend>>(buffer)
            .is_some());
        driver.destroy_uniform_buffer(buffer);
    }
    driver.terminate();
}

#[test]
fn test_waiting_on_a_queued_fence_before_it_is_realized() {
    // --- 1. ARRANGE ---
    let mut driver = driver();
    let (queue, stream) = CommandQueue::for_driver(&driver, None);
    let fence = queue.create_fence();

    // --- 2. ACT ---
    let before = driver.wait(fence, Duration::from_millis(1));
    stream.execute_pending(&mut driver);
    let after = driver.wait(fence, Duration::from_secs(1));

    // --- 3. ASSERT ---
    assert_eq!(before, FenceStatus::TimeoutExpired);
    assert_eq!(after, FenceStatus::ConditionSatisfied);

    driver.destroy_fence(fence);
    driver.terminate();
}

#[test]
fn test_commands_recorded_after_the_stream_is_gone_are_dropped() {
    let driver = driver();
    let (queue, stream) = CommandQueue::for_driver(&driver, None);
    drop(stream);

    let handle = queue.create_fence();
    queue.destroy_fence(handle);

    assert!(handle.is_valid());
}
