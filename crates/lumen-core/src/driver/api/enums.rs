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

//! Enumerations shared by descriptors, state keys and backends.

use serde::{Deserialize, Serialize};

/// Whether a buffer is written once or rewritten frequently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BufferUsage {
    /// Uploaded once (or rarely), read by the GPU many times. Updates that exceed
    /// the current capacity reallocate the native storage.
    #[default]
    Static,
    /// Rewritten every frame through the backend's fast path. Never reallocates.
    Dynamic,
}

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SamplerType {
    /// A 2D texture.
    #[default]
    Sampler2D,
    /// An array of 2D textures, `depth` layers.
    Sampler2DArray,
    /// A cubemap, always 6 layers.
    SamplerCubemap,
    /// A 3D texture, `depth` slices.
    Sampler3D,
}

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Points.
    Points,
    /// Independent lines.
    Lines,
    /// Connected lines.
    LineStrip,
    /// Independent triangles.
    #[default]
    Triangles,
    /// Connected triangles.
    TriangleStrip,
}

/// The type of the indices stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    /// 16-bit unsigned indices.
    #[default]
    U16,
    /// 32-bit unsigned indices.
    U32,
}

impl IndexType {
    /// Size of a single index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// The element type of a vertex attribute.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementType {
    Byte,
    Byte2,
    Byte3,
    Byte4,
    UByte,
    UByte2,
    UByte3,
    UByte4,
    Short,
    Short2,
    Short3,
    Short4,
    UShort,
    UShort2,
    UShort3,
    UShort4,
    Int,
    UInt,
    #[default]
    Float,
    Float2,
    Float3,
    Float4,
    Half,
    Half2,
    Half3,
    Half4,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> u32 {
        use ElementType::*;
        match self {
            Byte | UByte => 1,
            Byte2 | UByte2 | Short | UShort | Half => 2,
            Byte3 | UByte3 => 3,
            Byte4 | UByte4 | Short2 | UShort2 | Half2 | Int | UInt | Float => 4,
            Short3 | UShort3 | Half3 => 6,
            Short4 | UShort4 | Half4 | Float2 => 8,
            Float3 => 12,
            Float4 => 16,
        }
    }
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullingMode {
    /// No culling.
    None = 0,
    /// Front faces are culled.
    Front = 1,
    /// Back faces are culled.
    #[default]
    Back = 2,
    /// Both front and back faces are culled.
    FrontAndBack = 3,
}

/// How source and destination are combined when blending.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

/// Blend factor applied to source or destination.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunction {
    Zero = 0,
    #[default]
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    DstColor = 4,
    OneMinusDstColor = 5,
    SrcAlpha = 6,
    OneMinusSrcAlpha = 7,
    DstAlpha = 8,
    OneMinusDstAlpha = 9,
    SrcAlphaSaturate = 10,
}

/// Comparison used by depth/stencil tests and shadow samplers.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    #[default]
    LessEqual = 0,
    GreaterEqual = 1,
    Less = 2,
    Greater = 3,
    Equal = 4,
    NotEqual = 5,
    Always = 6,
    Never = 7,
}

/// What happens to the stencil buffer value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    Increment = 3,
    IncrementWrap = 4,
    Decrement = 5,
    DecrementWrap = 6,
    Invert = 7,
}

/// Magnification filter.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerMagFilter {
    #[default]
    Nearest = 0,
    Linear = 1,
}

/// Minification filter, optionally mipmapped.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerMinFilter {
    #[default]
    Nearest = 0,
    Linear = 1,
    NearestMipmapNearest = 2,
    LinearMipmapNearest = 3,
    NearestMipmapLinear = 4,
    LinearMipmapLinear = 5,
}

impl SamplerMinFilter {
    /// Returns `true` if the filter samples from more than the base level.
    pub const fn uses_mipmaps(self) -> bool {
        !matches!(self, SamplerMinFilter::Nearest | SamplerMinFilter::Linear)
    }
}

/// Addressing mode outside `[0, 1]`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerWrapMode {
    #[default]
    ClampToEdge = 0,
    Repeat = 1,
    MirroredRepeat = 2,
}

/// Whether a sampler performs depth comparison.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerCompareMode {
    #[default]
    None = 0,
    CompareToTexture = 1,
}

/// Result of waiting on a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    /// The GPU work the fence tracks has completed.
    ConditionSatisfied,
    /// The timeout elapsed before the work completed.
    TimeoutExpired,
    /// The fence is invalid or the device can no longer make progress.
    Error,
}

/// Pixel formats a texture can be created with.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    // 8 bits per pixel
    R8,
    R8Snorm,
    R8ui,
    R8i,
    Stencil8,

    // 16 bits per pixel
    R16f,
    R16ui,
    R16i,
    Rg8,
    Rg8Snorm,
    Rg8ui,
    Rg8i,
    Rgb565,
    Rgba4,
    Depth16,

    // 24 bits per pixel
    Rgb8,
    Srgb8,
    Depth24,

    // 32 bits per pixel
    R32f,
    R32ui,
    R32i,
    Rg16f,
    Rg16ui,
    Rg16i,
    R11fG11fB10f,
    Rgb9E5,
    #[default]
    Rgba8,
    Srgb8A8,
    Rgba8Snorm,
    Rgb10A2,
    Rgba8ui,
    Rgba8i,
    Depth32f,
    Depth24Stencil8,

    // 48 bits and up
    Depth32fStencil8,
    Rgb16f,
    Rg32f,
    Rg32ui,
    Rg32i,
    Rgba16f,
    Rgba16ui,
    Rgba16i,
    Rgb32f,
    Rgba32f,
    Rgba32ui,
    Rgba32i,

    // Compressed
    EacR11,
    EacRg11,
    Etc2Rgb8,
    Etc2Srgb8,
    Etc2EacRgba8,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt3Rgba,
    Dxt5Rgba,
    Astc4x4Rgba,
}

impl TextureFormat {
    /// Returns `true` for formats with a depth component.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16
                | TextureFormat::Depth24
                | TextureFormat::Depth32f
                | TextureFormat::Depth24Stencil8
                | TextureFormat::Depth32fStencil8
        )
    }

    /// Returns `true` for formats with a stencil component.
    pub const fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Stencil8
                | TextureFormat::Depth24Stencil8
                | TextureFormat::Depth32fStencil8
        )
    }

    /// Returns `true` for depth and/or stencil formats.
    pub const fn is_depth_or_stencil(self) -> bool {
        self.is_depth() || self.has_stencil()
    }

    /// Returns `true` for block-compressed formats.
    pub const fn is_compressed(self) -> bool {
        matches!(
            self,
            TextureFormat::EacR11
                | TextureFormat::EacRg11
                | TextureFormat::Etc2Rgb8
                | TextureFormat::Etc2Srgb8
                | TextureFormat::Etc2EacRgba8
                | TextureFormat::Dxt1Rgb
                | TextureFormat::Dxt1Rgba
                | TextureFormat::Dxt3Rgba
                | TextureFormat::Dxt5Rgba
                | TextureFormat::Astc4x4Rgba
        )
    }

    /// Returns `true` for formats stored in sRGB encoding.
    pub const fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Srgb8 | TextureFormat::Srgb8A8 | TextureFormat::Etc2Srgb8
        )
    }

    /// Returns `(block_width, block_height, bytes_per_block)`.
    ///
    /// Uncompressed formats report 1x1 blocks, so the last value is bytes per pixel.
    pub const fn block_info(self) -> (u32, u32, u32) {
        use TextureFormat::*;
        match self {
            R8 | R8Snorm | R8ui | R8i | Stencil8 => (1, 1, 1),
            R16f | R16ui | R16i | Rg8 | Rg8Snorm | Rg8ui | Rg8i | Rgb565 | Rgba4 | Depth16 => {
                (1, 1, 2)
            }
            Rgb8 | Srgb8 | Depth24 => (1, 1, 3),
            R32f | R32ui | R32i | Rg16f | Rg16ui | Rg16i | R11fG11fB10f | Rgb9E5 | Rgba8
            | Srgb8A8 | Rgba8Snorm | Rgb10A2 | Rgba8ui | Rgba8i | Depth32f | Depth24Stencil8 => {
                (1, 1, 4)
            }
            Rgb16f => (1, 1, 6),
            Depth32fStencil8 | Rg32f | Rg32ui | Rg32i | Rgba16f | Rgba16ui | Rgba16i => (1, 1, 8),
            Rgb32f => (1, 1, 12),
            Rgba32f | Rgba32ui | Rgba32i => (1, 1, 16),
            EacR11 | Etc2Rgb8 | Etc2Srgb8 | Dxt1Rgb | Dxt1Rgba => (4, 4, 8),
            EacRg11 | Etc2EacRgba8 | Dxt3Rgba | Dxt5Rgba | Astc4x4Rgba => (4, 4, 16),
        }
    }

    /// Bytes per pixel for uncompressed formats, `None` for compressed ones.
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        if self.is_compressed() {
            None
        } else {
            Some(self.block_info().2)
        }
    }

    /// Number of bytes one row of `width` pixels occupies, in blocks for compressed
    /// formats.
    pub const fn row_size(self, width: u32) -> usize {
        let (block_w, _, block_bytes) = self.block_info();
        (width.div_ceil(block_w) * block_bytes) as usize
    }

    /// Number of bytes a `width x height x depth` region occupies.
    pub const fn data_size(self, width: u32, height: u32, depth: u32) -> usize {
        let (_, block_h, _) = self.block_info();
        self.row_size(width) * height.div_ceil(block_h) as usize * depth as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_stencil_classification() {
        assert!(TextureFormat::Depth24Stencil8.is_depth());
        assert!(TextureFormat::Depth24Stencil8.has_stencil());
        assert!(TextureFormat::Stencil8.is_depth_or_stencil());
        assert!(!TextureFormat::Stencil8.is_depth());
        assert!(!TextureFormat::Rgba8.is_depth_or_stencil());
    }

    #[test]
    fn test_data_size() {
        assert_eq!(TextureFormat::Rgba8.data_size(4, 4, 1), 64);
        assert_eq!(TextureFormat::Rgb8.row_size(3), 9);
        // A 5x5 BC1 image rounds up to 2x2 blocks of 8 bytes.
        assert_eq!(TextureFormat::Dxt1Rgb.data_size(5, 5, 1), 32);
        assert_eq!(TextureFormat::Dxt1Rgb.bytes_per_pixel(), None);
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::Float3.size(), 12);
        assert_eq!(ElementType::Half4.size(), 8);
        assert_eq!(IndexType::U32.size(), 4);
    }
}
