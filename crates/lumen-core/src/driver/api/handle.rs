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

//! Strongly typed, opaque resource handles.
//!
//! A handle is a plain integer id tagged with the resource category it refers to.
//! Id `0` is reserved for "no resource". Ids are handed out by the
//! [`HandleTable`](crate::driver::HandleTable) from a single monotonically
//! increasing counter and are never recycled, so a stale handle can never alias a
//! newer resource.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// The raw integer behind every handle.
pub type HandleId = u32;

/// The resource category a handle slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A vertex buffer (one or more native buffers plus an attribute layout).
    VertexBuffer,
    /// An index buffer.
    IndexBuffer,
    /// A texture of any target.
    Texture,
    /// A uniform (constant) buffer.
    UniformBuffer,
    /// A group of texture/sampler pairs bound together.
    SamplerGroup,
    /// A vertex buffer, an index buffer and a draw range.
    RenderPrimitive,
    /// A linked vertex + fragment program.
    Program,
    /// A set of attachments, or the implicit swap-chain target.
    RenderTarget,
    /// A presentable surface.
    SwapChain,
    /// A CPU-visible marker of GPU progress.
    Fence,
    /// An external video/camera stream.
    Stream,
}

/// Implemented by the zero-sized tag types that parameterize [`Handle`].
pub trait HandleKind: 'static {
    /// The category stored in the handle table for this tag.
    const KIND: ResourceKind;
}

/// An opaque, typed reference to a driver resource.
///
/// `Handle<T>` is `Copy`, `Send` and `Sync` regardless of `T`; only the id travels.
pub struct Handle<T> {
    id: HandleId,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The null handle. Binding it means "nothing bound".
    pub const NULL: Self = Self::from_raw(0);

    /// Wraps a raw id. Only the handle table should mint non-null handles.
    pub const fn from_raw(id: HandleId) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    /// Returns the raw id.
    pub const fn id(&self) -> HandleId {
        self.id
    }

    /// Returns `true` for the null handle.
    pub const fn is_null(&self) -> bool {
        self.id == 0
    }

    /// Returns `true` for any non-null handle.
    pub const fn is_valid(&self) -> bool {
        self.id != 0
    }
}

impl<T: HandleKind> Handle<T> {
    /// The category this handle refers to.
    pub const fn kind(&self) -> ResourceKind {
        T::KIND
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T: HandleKind> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle<{:?}>(null)", T::KIND)
        } else {
            write!(f, "Handle<{:?}>({})", T::KIND, self.id)
        }
    }
}

macro_rules! handle_kinds {
    ($($(#[$meta:meta])* $tag:ident => $kind:ident, $alias:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug)]
            pub enum $tag {}

            impl HandleKind for $tag {
                const KIND: ResourceKind = ResourceKind::$kind;
            }

            #[doc = concat!("Handle to a [`", stringify!($tag), "`] resource.")]
            pub type $alias = Handle<$tag>;
        )*
    };
}

handle_kinds! {
    /// Tag for vertex buffer handles.
    HwVertexBuffer => VertexBuffer, VertexBufferHandle;
    /// Tag for index buffer handles.
    HwIndexBuffer => IndexBuffer, IndexBufferHandle;
    /// Tag for texture handles.
    HwTexture => Texture, TextureHandle;
    /// Tag for uniform buffer handles.
    HwUniformBuffer => UniformBuffer, UniformBufferHandle;
    /// Tag for sampler group handles.
    HwSamplerGroup => SamplerGroup, SamplerGroupHandle;
    /// Tag for render primitive handles.
    HwRenderPrimitive => RenderPrimitive, RenderPrimitiveHandle;
    /// Tag for program handles.
    HwProgram => Program, ProgramHandle;
    /// Tag for render target handles.
    HwRenderTarget => RenderTarget, RenderTargetHandle;
    /// Tag for swap chain handles.
    HwSwapChain => SwapChain, SwapChainHandle;
    /// Tag for fence handles.
    HwFence => Fence, FenceHandle;
    /// Tag for stream handles.
    HwStream => Stream, StreamHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_null_handle() {
        let handle = TextureHandle::default();
        assert!(handle.is_null());
        assert!(!handle.is_valid());
        assert_eq!(handle, TextureHandle::NULL);
        assert_eq!(format!("{handle:?}"), "Handle<Texture>(null)");
    }

    #[test]
    fn test_handle_identity_is_the_id() {
        let a = ProgramHandle::from_raw(7);
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.kind(), ResourceKind::Program);

        let set: HashSet<_> = [a, b, ProgramHandle::from_raw(8)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
