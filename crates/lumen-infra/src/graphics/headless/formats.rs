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

//! Native format table of the headless backend.
//!
//! The emulated API follows the typeless-storage model: a texture is allocated in
//! a storage format and read through a view format, and depth textures get a
//! separate depth-stencil view format. Formats without a native representation
//! map to `None`; DEPTH24 is substituted with a 32-bit float depth buffer.

use lumen_core::driver::TextureFormat;

/// Formats of the emulated native API.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Float,
    R16Uint,
    R16Sint,
    R16Typeless,
    R16Unorm,
    D16Unorm,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Uint,
    R8G8Sint,
    B5G6R5Unorm,
    B4G4R4A4Unorm,
    R32Float,
    R32Uint,
    R32Sint,
    R32Typeless,
    D32Float,
    R16G16Float,
    R16G16Uint,
    R16G16Sint,
    R11G11B10Float,
    R9G9B9E5SharedExp,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    R8G8B8A8Snorm,
    R8G8B8A8Uint,
    R8G8B8A8Sint,
    R10G10B10A2Unorm,
    R24G8Typeless,
    R24UnormX8Typeless,
    D24UnormS8Uint,
    R32G8X24Typeless,
    R32FloatX8X24Typeless,
    D32FloatS8X24Uint,
    R32G32Float,
    R32G32Uint,
    R32G32Sint,
    R16G16B16A16Float,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R32G32B32Float,
    R32G32B32A32Float,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc3Unorm,
}

/// How one texture format is allocated and viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormatTriple {
    /// Format the texture memory is allocated with.
    pub storage: NativeFormat,
    /// Format shader resource views read it through.
    pub view: NativeFormat,
    /// Format of depth-stencil views, for depth formats.
    pub depth_view: Option<NativeFormat>,
    /// The logical format actually stored, after substitution.
    pub stored_as: TextureFormat,
}

impl NativeFormatTriple {
    const fn color(format: NativeFormat, stored_as: TextureFormat) -> Self {
        Self {
            storage: format,
            view: format,
            depth_view: None,
            stored_as,
        }
    }

    const fn depth(
        storage: NativeFormat,
        view: NativeFormat,
        depth_view: NativeFormat,
        stored_as: TextureFormat,
    ) -> Self {
        Self {
            storage,
            view,
            depth_view: Some(depth_view),
            stored_as,
        }
    }
}

/// The native triple for `format`, or `None` when the format has no native
/// representation.
pub fn native_format(format: TextureFormat) -> Option<NativeFormatTriple> {
    use NativeFormat as N;
    use TextureFormat as T;
    let color = |native| Some(NativeFormatTriple::color(native, format));
    match format {
        T::R8 => color(N::R8Unorm),
        T::R8Snorm => color(N::R8Snorm),
        T::R8ui => color(N::R8Uint),
        T::R8i => color(N::R8Sint),
        T::R16f => color(N::R16Float),
        T::R16ui => color(N::R16Uint),
        T::R16i => color(N::R16Sint),
        T::Rg8 => color(N::R8G8Unorm),
        T::Rg8Snorm => color(N::R8G8Snorm),
        T::Rg8ui => color(N::R8G8Uint),
        T::Rg8i => color(N::R8G8Sint),
        T::Rgb565 => color(N::B5G6R5Unorm),
        T::Rgba4 => color(N::B4G4R4A4Unorm),
        T::R32f => color(N::R32Float),
        T::R32ui => color(N::R32Uint),
        T::R32i => color(N::R32Sint),
        T::Rg16f => color(N::R16G16Float),
        T::Rg16ui => color(N::R16G16Uint),
        T::Rg16i => color(N::R16G16Sint),
        T::R11fG11fB10f => color(N::R11G11B10Float),
        T::Rgb9E5 => color(N::R9G9B9E5SharedExp),
        T::Rgba8 => color(N::R8G8B8A8Unorm),
        T::Srgb8A8 => color(N::R8G8B8A8UnormSrgb),
        T::Rgba8Snorm => color(N::R8G8B8A8Snorm),
        T::Rgb10A2 => color(N::R10G10B10A2Unorm),
        T::Rgba8ui => color(N::R8G8B8A8Uint),
        T::Rgba8i => color(N::R8G8B8A8Sint),
        T::Rg32f => color(N::R32G32Float),
        T::Rg32ui => color(N::R32G32Uint),
        T::Rg32i => color(N::R32G32Sint),
        T::Rgba16f => color(N::R16G16B16A16Float),
        T::Rgba16ui => color(N::R16G16B16A16Uint),
        T::Rgba16i => color(N::R16G16B16A16Sint),
        T::Rgb32f => color(N::R32G32B32Float),
        T::Rgba32f => color(N::R32G32B32A32Float),
        T::Rgba32ui => color(N::R32G32B32A32Uint),
        T::Rgba32i => color(N::R32G32B32A32Sint),
        T::Dxt1Rgb | T::Dxt1Rgba => color(N::Bc1Unorm),
        T::Dxt3Rgba => color(N::Bc2Unorm),
        T::Dxt5Rgba => color(N::Bc3Unorm),

        T::Depth16 => Some(NativeFormatTriple::depth(
            N::R16Typeless,
            N::R16Unorm,
            N::D16Unorm,
            format,
        )),
        // No packed 24-bit depth without stencil; a float depth buffer is a
        // strict superset.
        T::Depth24 | T::Depth32f => Some(NativeFormatTriple::depth(
            N::R32Typeless,
            N::R32Float,
            N::D32Float,
            T::Depth32f,
        )),
        T::Depth24Stencil8 => Some(NativeFormatTriple::depth(
            N::R24G8Typeless,
            N::R24UnormX8Typeless,
            N::D24UnormS8Uint,
            format,
        )),
        T::Depth32fStencil8 => Some(NativeFormatTriple::depth(
            N::R32G8X24Typeless,
            N::R32FloatX8X24Typeless,
            N::D32FloatS8X24Uint,
            format,
        )),

        T::Stencil8
        | T::Rgb8
        | T::Srgb8
        | T::Rgb16f
        | T::EacR11
        | T::EacRg11
        | T::Etc2Rgb8
        | T::Etc2Srgb8
        | T::Etc2EacRgba8
        | T::Astc4x4Rgba => None,
    }
}

/// Returns `true` if the emulated API can render into `format`.
pub fn is_renderable(format: TextureFormat) -> bool {
    native_format(format).is_some()
        && !format.is_compressed()
        && !matches!(
            format,
            TextureFormat::Rgb9E5 | TextureFormat::Rgb32f | TextureFormat::Rgba4
        )
}

/// Bytes of one texel of a clear value, for the formats the emulated clear
/// writes. Other formats are left untouched by clears.
pub fn encode_color(format: TextureFormat, color: [f32; 4]) -> Option<Vec<u8>> {
    let unorm = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    let channels = match format {
        TextureFormat::R8 => 1,
        TextureFormat::Rg8 => 2,
        TextureFormat::Rgba8 | TextureFormat::Srgb8A8 => 4,
        TextureFormat::R32f => return Some(color[0].to_le_bytes().to_vec()),
        TextureFormat::Rg32f => return Some(bytemuck::cast_slice(&color[..2]).to_vec()),
        TextureFormat::Rgba32f => return Some(bytemuck::cast_slice(&color).to_vec()),
        _ => return None,
    };
    Some(color[..channels].iter().copied().map(unorm).collect())
}

/// Bytes of one texel of a depth clear value.
pub fn encode_depth(format: TextureFormat, depth: f64) -> Option<Vec<u8>> {
    match format {
        TextureFormat::Depth32f => Some((depth as f32).to_le_bytes().to_vec()),
        TextureFormat::Depth16 => {
            let value = (depth.clamp(0.0, 1.0) * u16::MAX as f64).round() as u16;
            Some(value.to_le_bytes().to_vec())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth24_is_substituted() {
        let triple = native_format(TextureFormat::Depth24).expect("depth24 maps to a native format");
        assert_eq!(triple.stored_as, TextureFormat::Depth32f);
        assert_eq!(triple.depth_view, Some(NativeFormat::D32Float));
        assert_eq!(triple.storage, NativeFormat::R32Typeless);
    }

    #[test]
    fn test_depth_formats_use_typeless_storage() {
        let triple = native_format(TextureFormat::Depth24Stencil8).expect("d24s8 is native");
        assert_eq!(triple.storage, NativeFormat::R24G8Typeless);
        assert_eq!(triple.view, NativeFormat::R24UnormX8Typeless);
        assert_eq!(triple.depth_view, Some(NativeFormat::D24UnormS8Uint));
    }

    #[test]
    fn test_unsupported_formats() {
        assert!(native_format(TextureFormat::Rgb8).is_none());
        assert!(native_format(TextureFormat::Etc2Rgb8).is_none());
        assert!(native_format(TextureFormat::Dxt1Rgb).is_some());
        assert!(!is_renderable(TextureFormat::Dxt1Rgb));
        assert!(is_renderable(TextureFormat::Rgba16f));
    }

    #[test]
    fn test_encode_color() {
        assert_eq!(
            encode_color(TextureFormat::Rgba8, [1.0, 0.0, 0.5, 1.0]),
            Some(vec![255, 0, 128, 255])
        );
        assert_eq!(encode_color(TextureFormat::Rgb10A2, [0.0; 4]), None);
    }
}
