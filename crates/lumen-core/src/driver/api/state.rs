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

//! Fixed-function pipeline state and sampler parameters, with their packed keys.
//!
//! Both structures pack losslessly into an integer. The key is what the state
//! caches hash on: two states with equal keys share one native object.

use super::enums::*;
use super::flags::ColorWriteMask;
use super::handle::ProgramHandle;

/// Blending configuration of the single color output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Blending on/off.
    pub enabled: bool,
    /// Equation for the color channels.
    pub equation_rgb: BlendEquation,
    /// Equation for the alpha channel.
    pub equation_alpha: BlendEquation,
    /// Source factor for color.
    pub src_rgb: BlendFunction,
    /// Source factor for alpha.
    pub src_alpha: BlendFunction,
    /// Destination factor for color.
    pub dst_rgb: BlendFunction,
    /// Destination factor for alpha.
    pub dst_alpha: BlendFunction,
}

impl BlendState {
    /// Premultiplied-alpha "over" blending.
    pub const PREMULTIPLIED_ALPHA: Self = Self {
        enabled: true,
        equation_rgb: BlendEquation::Add,
        equation_alpha: BlendEquation::Add,
        src_rgb: BlendFunction::One,
        src_alpha: BlendFunction::One,
        dst_rgb: BlendFunction::OneMinusSrcAlpha,
        dst_alpha: BlendFunction::OneMinusSrcAlpha,
    };
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            src_rgb: BlendFunction::One,
            src_alpha: BlendFunction::One,
            dst_rgb: BlendFunction::Zero,
            dst_alpha: BlendFunction::Zero,
        }
    }
}

/// Stencil test configuration, shared by front and back faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Stencil test on/off.
    pub enabled: bool,
    /// Comparison against the reference value.
    pub compare: CompareFunction,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes and the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
    /// Bits read by the test.
    pub read_mask: u8,
    /// Bits written by the operations.
    pub write_mask: u8,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: false,
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
            read_mask: 0xFF,
            write_mask: 0xFF,
        }
    }
}

/// Rasterizer, blend, depth and stencil state of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    /// Face culling.
    pub culling: CullingMode,
    /// Clockwise winding is front-facing when set.
    pub inverse_front_faces: bool,
    /// Blending.
    pub blend: BlendState,
    /// Depth writes on/off.
    pub depth_write: bool,
    /// Depth test; `Always` disables it.
    pub depth_func: CompareFunction,
    /// Stencil test.
    pub stencil: StencilState,
    /// Channels written.
    pub color_write: ColorWriteMask,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            culling: CullingMode::Back,
            inverse_front_faces: false,
            blend: BlendState::default(),
            depth_write: true,
            depth_func: CompareFunction::LessEqual,
            stencil: StencilState::default(),
            color_write: ColorWriteMask::ALL,
        }
    }
}

/// The packed form of a [`RasterState`]. 63 bits are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterStateKey(pub u64);

impl RasterState {
    /// Packs every field into a [`RasterStateKey`].
    ///
    /// Layout, low bit first: culling (2), inverse front faces (1), blend enable (1),
    /// blend equations rgb/alpha (3+3), blend functions src rgb/src alpha/dst rgb/
    /// dst alpha (4 each), depth write (1), depth function (3), stencil enable (1),
    /// stencil function (3), stencil fail/depth-fail/pass ops (3 each), stencil read
    /// and write masks (8 each), color write mask (4).
    pub fn key(&self) -> RasterStateKey {
        let blend = &self.blend;
        let stencil = &self.stencil;
        let mut packer = BitPacker::default();
        packer.push(self.culling as u64, 2);
        packer.push(self.inverse_front_faces as u64, 1);
        packer.push(blend.enabled as u64, 1);
        packer.push(blend.equation_rgb as u64, 3);
        packer.push(blend.equation_alpha as u64, 3);
        packer.push(blend.src_rgb as u64, 4);
        packer.push(blend.src_alpha as u64, 4);
        packer.push(blend.dst_rgb as u64, 4);
        packer.push(blend.dst_alpha as u64, 4);
        packer.push(self.depth_write as u64, 1);
        packer.push(self.depth_func as u64, 3);
        packer.push(stencil.enabled as u64, 1);
        packer.push(stencil.compare as u64, 3);
        packer.push(stencil.fail_op as u64, 3);
        packer.push(stencil.depth_fail_op as u64, 3);
        packer.push(stencil.pass_op as u64, 3);
        packer.push(stencil.read_mask as u64, 8);
        packer.push(stencil.write_mask as u64, 8);
        packer.push(self.color_write.bits() as u64, 4);
        RasterStateKey(packer.bits)
    }

    /// Returns `true` if the draw reads or writes depth.
    pub fn uses_depth(&self) -> bool {
        self.depth_write || self.depth_func != CompareFunction::Always
    }
}

/// Sampling parameters of one texture in a sampler group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerParams {
    /// Magnification filter.
    pub filter_mag: SamplerMagFilter,
    /// Minification filter.
    pub filter_min: SamplerMinFilter,
    /// Wrap mode along s.
    pub wrap_s: SamplerWrapMode,
    /// Wrap mode along t.
    pub wrap_t: SamplerWrapMode,
    /// Wrap mode along r.
    pub wrap_r: SamplerWrapMode,
    /// Base-2 logarithm of the maximum anisotropy, `0..=7`.
    pub anisotropy_log2: u8,
    /// Depth comparison on/off.
    pub compare_mode: SamplerCompareMode,
    /// Depth comparison function.
    pub compare_func: CompareFunction,
}

/// The packed form of [`SamplerParams`]. 17 bits are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerKey(pub u32);

impl SamplerParams {
    /// Linear filtering with trilinear mipmapping.
    pub const LINEAR_MIPMAPPED: Self = Self {
        filter_mag: SamplerMagFilter::Linear,
        filter_min: SamplerMinFilter::LinearMipmapLinear,
        wrap_s: SamplerWrapMode::ClampToEdge,
        wrap_t: SamplerWrapMode::ClampToEdge,
        wrap_r: SamplerWrapMode::ClampToEdge,
        anisotropy_log2: 0,
        compare_mode: SamplerCompareMode::None,
        compare_func: CompareFunction::LessEqual,
    };

    /// Packs every field into a [`SamplerKey`].
    ///
    /// Layout, low bit first: mag (1), min (3), wrap s/t/r (2 each),
    /// anisotropy log2 (3), compare mode (1), compare function (3).
    pub fn key(&self) -> SamplerKey {
        let mut packer = BitPacker::default();
        packer.push(self.filter_mag as u64, 1);
        packer.push(self.filter_min as u64, 3);
        packer.push(self.wrap_s as u64, 2);
        packer.push(self.wrap_t as u64, 2);
        packer.push(self.wrap_r as u64, 2);
        packer.push(self.anisotropy_log2.min(7) as u64, 3);
        packer.push(self.compare_mode as u64, 1);
        packer.push(self.compare_func as u64, 3);
        SamplerKey(packer.bits as u32)
    }

    /// Maximum anisotropy as a sample count.
    pub fn max_anisotropy(&self) -> u16 {
        1 << self.anisotropy_log2.min(7)
    }

    /// Highest level of detail the sampler reads. Non-mipmapped filters clamp to
    /// the base level.
    pub fn max_lod(&self) -> f32 {
        if self.filter_min.uses_mipmaps() {
            12.0
        } else {
            0.25
        }
    }
}

/// Depth bias applied to a draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolygonOffset {
    /// Factor scaled by the depth slope.
    pub slope: f32,
    /// Constant factor.
    pub constant: f32,
}

/// Everything `draw` needs besides the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PipelineState {
    /// The program.
    pub program: ProgramHandle,
    /// Fixed-function state.
    pub raster_state: RasterState,
    /// Depth bias.
    pub polygon_offset: PolygonOffset,
}

#[derive(Default)]
struct BitPacker {
    bits: u64,
    shift: u32,
}

impl BitPacker {
    fn push(&mut self, value: u64, width: u32) {
        debug_assert!(value < (1 << width), "value {value} overflows {width} bits");
        self.bits |= (value & ((1 << width) - 1)) << self.shift;
        self.shift += width;
        debug_assert!(self.shift <= 64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_key_is_deterministic() {
        assert_eq!(RasterState::default().key(), RasterState::default().key());
    }

    #[test]
    fn test_raster_key_distinguishes_every_field() {
        let base = RasterState::default();
        let variants = [
            RasterState {
                culling: CullingMode::None,
                ..base
            },
            RasterState {
                inverse_front_faces: true,
                ..base
            },
            RasterState {
                blend: BlendState {
                    enabled: true,
                    ..base.blend
                },
                ..base
            },
            RasterState {
                blend: BlendState {
                    dst_alpha: BlendFunction::OneMinusSrcAlpha,
                    ..base.blend
                },
                ..base
            },
            RasterState {
                depth_write: false,
                ..base
            },
            RasterState {
                depth_func: CompareFunction::Greater,
                ..base
            },
            RasterState {
                stencil: StencilState {
                    pass_op: StencilOperation::Replace,
                    ..base.stencil
                },
                ..base
            },
            RasterState {
                stencil: StencilState {
                    write_mask: 0x0F,
                    ..base.stencil
                },
                ..base
            },
            RasterState {
                color_write: ColorWriteMask::RED,
                ..base
            },
        ];
        for variant in variants {
            assert_ne!(variant.key(), base.key(), "{variant:?}");
        }
    }

    #[test]
    fn test_raster_key_fits_63_bits() {
        let everything = RasterState {
            culling: CullingMode::FrontAndBack,
            inverse_front_faces: true,
            blend: BlendState {
                enabled: true,
                equation_rgb: BlendEquation::Max,
                equation_alpha: BlendEquation::Max,
                src_rgb: BlendFunction::SrcAlphaSaturate,
                src_alpha: BlendFunction::SrcAlphaSaturate,
                dst_rgb: BlendFunction::SrcAlphaSaturate,
                dst_alpha: BlendFunction::SrcAlphaSaturate,
            },
            depth_write: true,
            depth_func: CompareFunction::Never,
            stencil: StencilState {
                enabled: true,
                compare: CompareFunction::Never,
                fail_op: StencilOperation::Invert,
                depth_fail_op: StencilOperation::Invert,
                pass_op: StencilOperation::Invert,
                read_mask: 0xFF,
                write_mask: 0xFF,
            },
            color_write: ColorWriteMask::ALL,
        };
        assert_eq!(everything.key().0 >> 63, 0);
    }

    #[test]
    fn test_sampler_key_and_lod() {
        let nearest = SamplerParams::default();
        let trilinear = SamplerParams::LINEAR_MIPMAPPED;
        assert_ne!(nearest.key(), trilinear.key());
        assert_eq!(nearest.max_lod(), 0.25);
        assert_eq!(trilinear.max_lod(), 12.0);

        let anisotropic = SamplerParams {
            anisotropy_log2: 3,
            ..trilinear
        };
        assert_eq!(anisotropic.max_anisotropy(), 8);
        assert_ne!(anisotropic.key(), trilinear.key());
    }
}
