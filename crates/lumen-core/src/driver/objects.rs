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

//! Realized objects stored in the handle table.
//!
//! Backends only create native objects. The dispatcher wraps each of them with
//! the descriptor it was created from, and owns the objects that have no native
//! counterpart of their own (sampler groups, fences, the render primitive binding).

use crate::driver::api::{
    IndexBufferHandle, PrimitiveType, RenderTargetDescriptor, SamplerGroupEntry,
    VertexBufferHandle,
};
use crate::driver::destruction::SubmissionIndex;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A native object together with the descriptor it was created from.
#[derive(Debug)]
pub struct Realized<D, N> {
    /// The creation descriptor.
    pub descriptor: D,
    /// The backend object.
    pub native: N,
}

impl<D, N> Realized<D, N> {
    /// Pairs a descriptor with its native object.
    pub fn new(descriptor: D, native: N) -> Self {
        Self { descriptor, native }
    }
}

/// Whether a render target is the implicit swap-chain target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTargetKind {
    /// Renders into the current swap chain.
    Default,
    /// Renders into attachment textures.
    Offscreen(RenderTargetDescriptor),
}

/// Locks a per-object mutex, ignoring poisoning. Objects are only mutated by the
/// render thread, so a poisoned lock still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fixed-size group of texture/sampler pairs, bound as one unit.
#[derive(Debug)]
pub struct SamplerGroup {
    entries: Mutex<Vec<SamplerGroupEntry>>,
}

impl SamplerGroup {
    /// A group of `size` empty entries.
    pub fn new(size: usize) -> Self {
        Self {
            entries: Mutex::new(vec![SamplerGroupEntry::default(); size]),
        }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        lock(&self.entries).len()
    }

    /// A copy of the entries.
    pub fn entries(&self) -> Vec<SamplerGroupEntry> {
        lock(&self.entries).clone()
    }

    /// Replaces the leading entries with `entries`.
    pub(crate) fn update(&self, entries: &[SamplerGroupEntry]) {
        let mut current = lock(&self.entries);
        current[..entries.len()].copy_from_slice(entries);
    }
}

/// The index range a render primitive draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveRange {
    /// Topology.
    pub primitive_type: PrimitiveType,
    /// First index.
    pub offset: u32,
    /// Smallest vertex index referenced.
    pub min_index: u32,
    /// Largest vertex index referenced.
    pub max_index: u32,
    /// Number of indices.
    pub count: u32,
}

/// What a render primitive currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimitiveBinding {
    /// Vertex buffer.
    pub vertex_buffer: VertexBufferHandle,
    /// Index buffer.
    pub index_buffer: IndexBufferHandle,
    /// Bitmask of enabled attribute slots.
    pub enabled_attributes: u32,
    /// Draw range.
    pub range: PrimitiveRange,
    /// Reallocation epochs of the buffers when the native layout was last bound.
    pub bound_epochs: (u64, u64),
}

/// A render primitive: the backend's per-primitive layout object plus the
/// buffers and range it draws.
#[derive(Debug)]
pub struct RenderPrimitive<N> {
    /// Backend layout object (vertex array, input layout, ...).
    pub native: N,
    binding: Mutex<PrimitiveBinding>,
}

impl<N> RenderPrimitive<N> {
    /// An unbound primitive.
    pub fn new(native: N) -> Self {
        Self {
            native,
            binding: Mutex::new(PrimitiveBinding::default()),
        }
    }

    /// A copy of the current binding.
    pub fn binding(&self) -> PrimitiveBinding {
        *lock(&self.binding)
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut PrimitiveBinding)) {
        apply(&mut lock(&self.binding));
    }
}

/// A fence: signaled once its submission has retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    /// The submission the fence waits for.
    pub submission: SubmissionIndex,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::api::{SamplerParams, TextureHandle};

    #[test]
    fn test_sampler_group_partial_update() {
        let group = SamplerGroup::new(3);
        let entry = SamplerGroupEntry {
            texture: TextureHandle::from_raw(9),
            params: SamplerParams::LINEAR_MIPMAPPED,
        };
        group.update(&[entry]);
        let entries = group.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], entry);
        assert!(entries[1].texture.is_null());
    }

    #[test]
    fn test_primitive_binding_updates() {
        let primitive = RenderPrimitive::new(());
        primitive.update(|binding| binding.enabled_attributes = 0b11);
        assert_eq!(primitive.binding().enabled_attributes, 0b11);
        assert!(primitive.binding().vertex_buffer.is_null());
    }
}
