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

use lumen_core::driver::{
    AttributeFlags, BlendEquation, BlendFunction, ColorWriteMask, CompareFunction, CullingMode,
    ElementType, IndexType, PrimitiveType, SamplerMagFilter, SamplerMinFilter, SamplerType,
    SamplerWrapMode, StencilOperation, TextureFormat,
};

/// A local extension trait to convert driver types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveType {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
            PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
            PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexType {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexType::U16 => wgpu::IndexFormat::Uint16,
            IndexType::U32 => wgpu::IndexFormat::Uint32,
        }
    }
}

/// `FrontAndBack` has no wgpu equivalent; draws using it are skipped.
impl IntoWgpu<Option<wgpu::Face>> for CullingMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullingMode::None | CullingMode::FrontAndBack => None,
            CullingMode::Front => Some(wgpu::Face::Front),
            CullingMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendEquation {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendEquation::Add => wgpu::BlendOperation::Add,
            BlendEquation::Subtract => wgpu::BlendOperation::Subtract,
            BlendEquation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendEquation::Min => wgpu::BlendOperation::Min,
            BlendEquation::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFunction {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFunction::Zero => wgpu::BlendFactor::Zero,
            BlendFunction::One => wgpu::BlendFactor::One,
            BlendFunction::SrcColor => wgpu::BlendFactor::Src,
            BlendFunction::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFunction::DstColor => wgpu::BlendFactor::Dst,
            BlendFunction::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFunction::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFunction::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFunction::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFunction::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFunction::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
            CompareFunction::Never => wgpu::CompareFunction::Never,
        }
    }
}

impl IntoWgpu<wgpu::StencilOperation> for StencilOperation {
    fn into_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOperation::Keep => wgpu::StencilOperation::Keep,
            StencilOperation::Zero => wgpu::StencilOperation::Zero,
            StencilOperation::Replace => wgpu::StencilOperation::Replace,
            StencilOperation::Increment => wgpu::StencilOperation::IncrementClamp,
            StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOperation::Decrement => wgpu::StencilOperation::DecrementClamp,
            StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
            StencilOperation::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorWriteMask {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        let mut writes = wgpu::ColorWrites::empty();
        for (channel, write) in [
            (ColorWriteMask::RED, wgpu::ColorWrites::RED),
            (ColorWriteMask::GREEN, wgpu::ColorWrites::GREEN),
            (ColorWriteMask::BLUE, wgpu::ColorWrites::BLUE),
            (ColorWriteMask::ALPHA, wgpu::ColorWrites::ALPHA),
        ] {
            if self.contains(channel) {
                writes |= write;
            }
        }
        writes
    }
}

// --- Samplers ---

impl IntoWgpu<wgpu::AddressMode> for SamplerWrapMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            SamplerWrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            SamplerWrapMode::Repeat => wgpu::AddressMode::Repeat,
            SamplerWrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for SamplerMagFilter {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            SamplerMagFilter::Nearest => wgpu::FilterMode::Nearest,
            SamplerMagFilter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Splits a minification filter into its level filter and its mip filter.
impl IntoWgpu<(wgpu::FilterMode, wgpu::MipmapFilterMode)> for SamplerMinFilter {
    fn into_wgpu(self) -> (wgpu::FilterMode, wgpu::MipmapFilterMode) {
        use wgpu::FilterMode as F;
        use wgpu::MipmapFilterMode as M;
        match self {
            SamplerMinFilter::Nearest | SamplerMinFilter::NearestMipmapNearest => {
                (F::Nearest, M::Nearest)
            }
            SamplerMinFilter::Linear | SamplerMinFilter::LinearMipmapNearest => {
                (F::Linear, M::Nearest)
            }
            SamplerMinFilter::NearestMipmapLinear => (F::Nearest, M::Linear),
            SamplerMinFilter::LinearMipmapLinear => (F::Linear, M::Linear),
        }
    }
}

// --- Textures ---

impl IntoWgpu<wgpu::TextureDimension> for SamplerType {
    fn into_wgpu(self) -> wgpu::TextureDimension {
        match self {
            SamplerType::Sampler3D => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        }
    }
}

impl IntoWgpu<wgpu::TextureViewDimension> for SamplerType {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            SamplerType::Sampler2D => wgpu::TextureViewDimension::D2,
            SamplerType::Sampler2DArray => wgpu::TextureViewDimension::D2Array,
            SamplerType::SamplerCubemap => wgpu::TextureViewDimension::Cube,
            SamplerType::Sampler3D => wgpu::TextureViewDimension::D3,
        }
    }
}

/// The wgpu format storing `format`, or `None` when wgpu has no equivalent.
///
/// `Depth24` and `Depth24Stencil8` map to the `Plus` formats, whose precision is
/// at least the requested one. DXT1 without alpha is stored as BC1 with alpha.
pub fn texture_format(format: TextureFormat) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as W;
    let mapped = match format {
        TextureFormat::R8 => W::R8Unorm,
        TextureFormat::R8Snorm => W::R8Snorm,
        TextureFormat::R8ui => W::R8Uint,
        TextureFormat::R8i => W::R8Sint,
        TextureFormat::Stencil8 => W::Stencil8,
        TextureFormat::R16f => W::R16Float,
        TextureFormat::R16ui => W::R16Uint,
        TextureFormat::R16i => W::R16Sint,
        TextureFormat::Rg8 => W::Rg8Unorm,
        TextureFormat::Rg8Snorm => W::Rg8Snorm,
        TextureFormat::Rg8ui => W::Rg8Uint,
        TextureFormat::Rg8i => W::Rg8Sint,
        TextureFormat::Depth16 => W::Depth16Unorm,
        TextureFormat::Depth24 => W::Depth24Plus,
        TextureFormat::R32f => W::R32Float,
        TextureFormat::R32ui => W::R32Uint,
        TextureFormat::R32i => W::R32Sint,
        TextureFormat::Rg16f => W::Rg16Float,
        TextureFormat::Rg16ui => W::Rg16Uint,
        TextureFormat::Rg16i => W::Rg16Sint,
        TextureFormat::R11fG11fB10f => W::Rg11b10Ufloat,
        TextureFormat::Rgb9E5 => W::Rgb9e5Ufloat,
        TextureFormat::Rgba8 => W::Rgba8Unorm,
        TextureFormat::Srgb8A8 => W::Rgba8UnormSrgb,
        TextureFormat::Rgba8Snorm => W::Rgba8Snorm,
        TextureFormat::Rgb10A2 => W::Rgb10a2Unorm,
        TextureFormat::Rgba8ui => W::Rgba8Uint,
        TextureFormat::Rgba8i => W::Rgba8Sint,
        TextureFormat::Depth32f => W::Depth32Float,
        TextureFormat::Depth24Stencil8 => W::Depth24PlusStencil8,
        TextureFormat::Depth32fStencil8 => W::Depth32FloatStencil8,
        TextureFormat::Rg32f => W::Rg32Float,
        TextureFormat::Rg32ui => W::Rg32Uint,
        TextureFormat::Rg32i => W::Rg32Sint,
        TextureFormat::Rgba16f => W::Rgba16Float,
        TextureFormat::Rgba16ui => W::Rgba16Uint,
        TextureFormat::Rgba16i => W::Rgba16Sint,
        TextureFormat::Rgba32f => W::Rgba32Float,
        TextureFormat::Rgba32ui => W::Rgba32Uint,
        TextureFormat::Rgba32i => W::Rgba32Sint,
        TextureFormat::EacR11 => W::EacR11Unorm,
        TextureFormat::EacRg11 => W::EacRg11Unorm,
        TextureFormat::Etc2Rgb8 => W::Etc2Rgb8Unorm,
        TextureFormat::Etc2Srgb8 => W::Etc2Rgb8UnormSrgb,
        TextureFormat::Etc2EacRgba8 => W::Etc2Rgba8Unorm,
        TextureFormat::Dxt1Rgb | TextureFormat::Dxt1Rgba => W::Bc1RgbaUnorm,
        TextureFormat::Dxt3Rgba => W::Bc2RgbaUnorm,
        TextureFormat::Dxt5Rgba => W::Bc3RgbaUnorm,
        TextureFormat::Astc4x4Rgba => W::Astc {
            block: wgpu::AstcBlock::B4x4,
            channel: wgpu::AstcChannel::Unorm,
        },
        TextureFormat::Rgb565
        | TextureFormat::Rgba4
        | TextureFormat::Rgb8
        | TextureFormat::Srgb8
        | TextureFormat::Rgb16f
        | TextureFormat::Rgb32f => return None,
    };
    Some(mapped)
}

/// The wgpu vertex format of an attribute, or `None` when wgpu has no equivalent
/// (three-component 8- and 16-bit types).
///
/// wgpu cannot convert integers to floats on fetch: integer attributes without
/// `NORMALIZED` always reach the shader as integers.
pub fn vertex_format(element: ElementType, flags: AttributeFlags) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as V;
    use ElementType::*;
    let normalized = flags.contains(AttributeFlags::NORMALIZED);
    let format = match (element, normalized) {
        (Byte, true) => V::Snorm8,
        (Byte, false) => V::Sint8,
        (Byte2, true) => V::Snorm8x2,
        (Byte2, false) => V::Sint8x2,
        (Byte4, true) => V::Snorm8x4,
        (Byte4, false) => V::Sint8x4,
        (UByte, true) => V::Unorm8,
        (UByte, false) => V::Uint8,
        (UByte2, true) => V::Unorm8x2,
        (UByte2, false) => V::Uint8x2,
        (UByte4, true) => V::Unorm8x4,
        (UByte4, false) => V::Uint8x4,
        (Short, true) => V::Snorm16,
        (Short, false) => V::Sint16,
        (Short2, true) => V::Snorm16x2,
        (Short2, false) => V::Sint16x2,
        (Short4, true) => V::Snorm16x4,
        (Short4, false) => V::Sint16x4,
        (UShort, true) => V::Unorm16,
        (UShort, false) => V::Uint16,
        (UShort2, true) => V::Unorm16x2,
        (UShort2, false) => V::Uint16x2,
        (UShort4, true) => V::Unorm16x4,
        (UShort4, false) => V::Uint16x4,
        (Int, _) => V::Sint32,
        (UInt, _) => V::Uint32,
        (Float, _) => V::Float32,
        (Float2, _) => V::Float32x2,
        (Float3, _) => V::Float32x3,
        (Float4, _) => V::Float32x4,
        (Half, _) => V::Float16,
        (Half2, _) => V::Float16x2,
        (Half4, _) => V::Float16x4,
        (Byte3 | UByte3 | Short3 | UShort3 | Half3, _) => return None,
    };
    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_filter_split() {
        let (filter, mip) = SamplerMinFilter::LinearMipmapNearest.into_wgpu();
        assert_eq!(filter, wgpu::FilterMode::Linear);
        assert_eq!(mip, wgpu::MipmapFilterMode::Nearest);
    }

    #[test]
    fn test_formats_without_equivalent() {
        assert_eq!(texture_format(TextureFormat::Rgb8), None);
        assert_eq!(
            texture_format(TextureFormat::Depth24Stencil8),
            Some(wgpu::TextureFormat::Depth24PlusStencil8)
        );
        assert_eq!(
            vertex_format(ElementType::UByte4, AttributeFlags::NORMALIZED),
            Some(wgpu::VertexFormat::Unorm8x4)
        );
        assert_eq!(vertex_format(ElementType::Half3, AttributeFlags::NONE), None);
    }
}
