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

//! Native objects of the headless backend.
//!
//! Every object keeps its memory on the CPU so tests can inspect exactly what
//! the driver wrote. Mutable storage sits behind a mutex: the dispatcher only
//! mutates objects from the render thread, but it shares them through `Arc`s.

use super::formats::NativeFormatTriple;
use super::ledger::{NativeId, NativeKind, NativeLedger};
use lumen_core::driver::{
    BackendError, BufferUpdate, BufferUsage, IndexType, RasterState, SamplerParams,
    TextureDescriptor, TextureFormat, TextureRegion,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Buffers ---

#[derive(Debug)]
struct BufferStorage {
    id: NativeId,
    bytes: Vec<u8>,
}

/// One native buffer with CPU-visible contents.
#[derive(Debug)]
pub struct NativeBuffer {
    usage: BufferUsage,
    storage: Mutex<BufferStorage>,
}

impl NativeBuffer {
    pub(crate) fn new(ledger: &mut NativeLedger, size: usize, usage: BufferUsage) -> Self {
        Self {
            usage,
            storage: Mutex::new(BufferStorage {
                id: ledger.allocate(NativeKind::Buffer),
                bytes: vec![0; size],
            }),
        }
    }

    /// The current native buffer. Changes when a static buffer reallocates.
    pub fn id(&self) -> NativeId {
        lock(&self.storage).id
    }

    /// Current size in bytes.
    pub fn capacity(&self) -> usize {
        lock(&self.storage).bytes.len()
    }

    /// A copy of the buffer contents.
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.storage).bytes.clone()
    }

    /// Writes `data` at `offset`.
    ///
    /// Dynamic buffers are written in place and never grow. A static buffer that
    /// is too small is replaced by a larger one; the old native buffer is handed
    /// back as garbage.
    pub(crate) fn write(
        &self,
        ledger: &mut NativeLedger,
        data: &[u8],
        offset: usize,
    ) -> Result<BufferUpdate<Vec<NativeId>>, BackendError> {
        let mut storage = lock(&self.storage);
        let end = offset + data.len();
        if end <= storage.bytes.len() {
            storage.bytes[offset..end].copy_from_slice(data);
            return Ok(BufferUpdate::InPlace);
        }
        if self.usage == BufferUsage::Dynamic {
            return Err(BackendError::Native(format!(
                "write of {} bytes at {offset} overflows dynamic buffer {} ({} bytes)",
                data.len(),
                storage.id,
                storage.bytes.len()
            )));
        }
        let mut bytes = std::mem::take(&mut storage.bytes);
        bytes.resize(end, 0);
        bytes[offset..end].copy_from_slice(data);
        let previous = std::mem::replace(&mut storage.id, ledger.allocate(NativeKind::Buffer));
        storage.bytes = bytes;
        log::debug!(
            "Headless: static buffer {previous} reallocated as {} ({end} bytes)",
            storage.id
        );
        Ok(BufferUpdate::Reallocated(vec![previous]))
    }

    pub(crate) fn release(&self, ledger: &mut NativeLedger) {
        ledger.release(self.id());
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

/// A vertex buffer: one native buffer per attribute buffer.
#[derive(Debug)]
pub struct HeadlessVertexBuffer {
    pub buffers: Vec<NativeBuffer>,
}

impl HeadlessVertexBuffer {
    /// Contents of native buffer `index`.
    pub fn contents(&self, index: usize) -> Vec<u8> {
        self.buffers
            .get(index)
            .map(NativeBuffer::contents)
            .unwrap_or_default()
    }

    pub fn ids(&self) -> Vec<NativeId> {
        self.buffers.iter().map(NativeBuffer::id).collect()
    }
}

#[derive(Debug)]
pub struct HeadlessIndexBuffer {
    pub buffer: NativeBuffer,
    pub index_type: IndexType,
}

impl HeadlessIndexBuffer {
    /// Decodes the indices currently stored.
    pub fn indices(&self) -> Vec<u32> {
        let bytes = self.buffer.contents();
        match self.index_type {
            IndexType::U16 => bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as u32)
                .collect(),
            IndexType::U32 => bytes
                .chunks_exact(4)
                .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct HeadlessUniformBuffer {
    pub buffer: NativeBuffer,
}

// --- Textures ---

/// Per-level storage of a texture; each level holds every layer back to back.
pub type TextureLevels = Arc<Mutex<Vec<Vec<u8>>>>;

#[derive(Debug)]
pub struct HeadlessTexture {
    pub texture: NativeId,
    /// Shader resource view, for sampleable textures.
    pub view: Option<NativeId>,
    pub formats: NativeFormatTriple,
    pub descriptor: TextureDescriptor,
    pub(crate) levels: TextureLevels,
}

impl HeadlessTexture {
    pub(crate) fn new(
        ledger: &mut NativeLedger,
        descriptor: &TextureDescriptor,
        formats: NativeFormatTriple,
        sampleable: bool,
    ) -> Self {
        let levels = (0..descriptor.levels)
            .map(|level| vec![0u8; level_bytes(descriptor, level)])
            .collect();
        let texture = ledger.allocate(NativeKind::Texture);
        let view = sampleable.then(|| ledger.allocate(NativeKind::ShaderResourceView));
        Self {
            texture,
            view,
            formats,
            descriptor: *descriptor,
            levels: Arc::new(Mutex::new(levels)),
        }
    }

    /// A copy of one level, every layer included.
    pub fn level_contents(&self, level: u8) -> Vec<u8> {
        lock(&self.levels)
            .get(level as usize)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = NativeId> {
        std::iter::once(self.texture).chain(self.view)
    }
}

/// Images stacked in one level: array layers, cube faces, or 3D slices.
pub(crate) fn level_images(descriptor: &TextureDescriptor, level: u8) -> u32 {
    let (_, _, depth) = descriptor.level_extent(level);
    depth.max(descriptor.layer_count())
}

pub(crate) fn level_bytes(descriptor: &TextureDescriptor, level: u8) -> usize {
    let (width, height, _) = descriptor.level_extent(level);
    descriptor
        .format
        .data_size(width, height, level_images(descriptor, level))
}

/// Calls `copy(level_offset, tight_offset, len)` for every block row of `region`.
pub(crate) fn for_each_row(
    descriptor: &TextureDescriptor,
    region: &TextureRegion,
    mut copy: impl FnMut(usize, usize, usize),
) {
    let format = descriptor.format;
    let (block_w, block_h, block_bytes) = format.block_info();
    let (level_w, level_h, _) = descriptor.level_extent(region.level);
    let level_row = format.row_size(level_w);
    let level_rows = level_h.div_ceil(block_h) as usize;
    let row_len = format.row_size(region.extent.width);
    let rows = region.extent.height.div_ceil(block_h) as usize;
    let x = (region.offset.x / block_w) as usize * block_bytes as usize;
    let first_row = (region.offset.y / block_h) as usize;

    let mut tight = 0;
    for z in 0..region.extent.depth {
        let image = (region.offset.z + z) as usize;
        for row in 0..rows {
            let at = (image * level_rows + first_row + row) * level_row + x;
            copy(at, tight, row_len);
            tight += row_len;
        }
    }
}

/// Fills image `layer` of `level` with a repeated texel.
pub(crate) fn fill_image(levels: &TextureLevels, descriptor: &TextureDescriptor, level: u8, layer: u32, texel: &[u8]) {
    let (width, height, _) = descriptor.level_extent(level);
    let image = descriptor.format.data_size(width, height, 1);
    let mut levels = lock(levels);
    let Some(storage) = levels.get_mut(level as usize) else {
        return;
    };
    let start = image * layer as usize;
    if let Some(bytes) = storage.get_mut(start..start + image) {
        for chunk in bytes.chunks_exact_mut(texel.len()) {
            chunk.copy_from_slice(texel);
        }
    }
}

// --- Programs and primitives ---

#[derive(Debug)]
pub struct HeadlessProgram {
    /// Unique per program, keys lazily created input layouts.
    pub uid: u64,
    pub vertex_shader: NativeId,
    pub fragment_shader: NativeId,
    pub name: String,
}

/// A render primitive. Input layouts depend on both the vertex layout and the
/// program, so they are created lazily at the first draw with each program.
#[derive(Debug, Default)]
pub struct HeadlessPrimitive {
    pub(crate) input_layouts: Mutex<HashMap<u64, NativeId>>,
    pub(crate) enabled_attributes: Mutex<u32>,
}

impl HeadlessPrimitive {
    /// Number of input layouts created so far.
    pub fn input_layout_count(&self) -> usize {
        lock(&self.input_layouts).len()
    }
}

// --- Render targets and swap chains ---

/// One attachment view of an offscreen target.
#[derive(Debug)]
pub struct AttachmentView {
    pub view: NativeId,
    pub(crate) texture: TextureDescriptor,
    pub(crate) levels: TextureLevels,
    pub level: u8,
    pub layer: u16,
}

/// The default target's lazily created depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDepth {
    pub texture: NativeId,
    pub view: NativeId,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug)]
pub enum HeadlessRenderTarget {
    /// Renders into the current swap chain.
    Default { depth: Mutex<Option<DefaultDepth>> },
    Offscreen {
        width: u32,
        height: u32,
        color: Option<AttachmentView>,
        depth: Option<AttachmentView>,
        stencil: Option<AttachmentView>,
    },
}

impl HeadlessRenderTarget {
    /// The default target's depth buffer, if it was created.
    pub fn default_depth(&self) -> Option<DefaultDepth> {
        match self {
            HeadlessRenderTarget::Default { depth } => *lock(depth),
            HeadlessRenderTarget::Offscreen { .. } => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SwapChainState {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// RGBA8 back buffer.
    pub(crate) pixels: Vec<u8>,
    pub(crate) presented: u64,
}

#[derive(Debug)]
pub struct HeadlessSwapChain {
    pub swap_chain: NativeId,
    pub back_buffer_view: NativeId,
    pub(crate) state: Mutex<SwapChainState>,
}

impl HeadlessSwapChain {
    pub(crate) fn new(ledger: &mut NativeLedger, width: u32, height: u32) -> Self {
        Self {
            swap_chain: ledger.allocate(NativeKind::SwapChain),
            back_buffer_view: ledger.allocate(NativeKind::RenderTargetView),
            state: Mutex::new(SwapChainState {
                width,
                height,
                pixels: vec![0; width as usize * height as usize * 4],
                presented: 0,
            }),
        }
    }

    pub fn extent(&self) -> (u32, u32) {
        let state = lock(&self.state);
        (state.width, state.height)
    }

    /// Number of frames presented.
    pub fn presented(&self) -> u64 {
        lock(&self.state).presented
    }

    /// A copy of the RGBA8 back buffer.
    pub fn back_buffer(&self) -> Vec<u8> {
        lock(&self.state).pixels.clone()
    }
}

// --- State objects ---

/// Rasterizer, blend and depth-stencil state objects for one `RasterState`.
#[derive(Debug)]
pub struct HeadlessRasterState {
    pub rasterizer: NativeId,
    pub blend: NativeId,
    pub depth_stencil: NativeId,
    pub state: RasterState,
}

#[derive(Debug)]
pub struct HeadlessSampler {
    pub sampler: NativeId,
    pub params: SamplerParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::driver::{SamplerType, TextureUsage};

    #[test]
    fn test_static_buffer_grows_and_returns_garbage() {
        let mut ledger = NativeLedger::new();
        let buffer = NativeBuffer::new(&mut ledger, 4, BufferUsage::Static);
        let first = buffer.id();

        assert!(matches!(
            buffer.write(&mut ledger, &[1, 2], 1),
            Ok(BufferUpdate::InPlace)
        ));
        assert_eq!(buffer.contents(), [0, 1, 2, 0]);

        match buffer.write(&mut ledger, &[9; 4], 2) {
            Ok(BufferUpdate::Reallocated(garbage)) => assert_eq!(garbage, vec![first]),
            other => panic!("expected a reallocation, got {other:?}"),
        }
        assert_ne!(buffer.id(), first);
        assert_eq!(buffer.contents(), [0, 1, 9, 9, 9, 9]);
        assert_eq!(ledger.live_count(), 2);
    }

    #[test]
    fn test_dynamic_buffer_never_grows() {
        let mut ledger = NativeLedger::new();
        let buffer = NativeBuffer::new(&mut ledger, 4, BufferUsage::Dynamic);
        assert!(buffer.write(&mut ledger, &[0; 8], 0).is_err());
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_cubemap_levels_hold_six_faces() {
        let descriptor = TextureDescriptor::cubemap(TextureFormat::Rgba8, 8, true);
        assert_eq!(descriptor.target, SamplerType::SamplerCubemap);
        assert_eq!(level_images(&descriptor, 0), 6);
        assert_eq!(level_bytes(&descriptor, 0), 8 * 8 * 4 * 6);
        assert_eq!(level_bytes(&descriptor, 3), 4 * 6);
    }

    #[test]
    fn test_rows_of_a_sub_region() {
        let descriptor = TextureDescriptor::texture_2d(TextureFormat::R8, 4, 4, false)
            .with_usage(TextureUsage::DEFAULT);
        let mut rows = Vec::new();
        for_each_row(
            &descriptor,
            &TextureRegion::new_2d(0, 1, 2, 2, 2),
            |at, tight, len| rows.push((at, tight, len)),
        );
        assert_eq!(rows, vec![(9, 0, 2), (13, 2, 2)]);
    }
}
