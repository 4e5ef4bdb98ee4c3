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

//! Software mip chain generation with a 2x2 box filter.

use lumen_core::driver::TextureFormat;

enum Channels {
    Unorm8(usize),
    Float32(usize),
}

fn channels(format: TextureFormat) -> Option<Channels> {
    match format {
        TextureFormat::R8 => Some(Channels::Unorm8(1)),
        TextureFormat::Rg8 => Some(Channels::Unorm8(2)),
        TextureFormat::Rgba8 | TextureFormat::Srgb8A8 => Some(Channels::Unorm8(4)),
        TextureFormat::R32f => Some(Channels::Float32(1)),
        TextureFormat::Rg32f => Some(Channels::Float32(2)),
        TextureFormat::Rgba32f => Some(Channels::Float32(4)),
        _ => None,
    }
}

/// Returns `true` if [`downsample`] handles `format`.
pub fn is_filterable(format: TextureFormat) -> bool {
    channels(format).is_some()
}

/// Dimensions of one image in a layered level.
#[derive(Debug, Clone, Copy)]
pub struct Image {
    pub width: u32,
    pub height: u32,
}

/// Box-filters every layer of `src` into `dst`.
///
/// Both buffers hold `layers` tightly packed images. Odd source edges are
/// clamped. Returns `false` for formats the filter does not understand.
pub fn downsample(
    format: TextureFormat,
    src: &[u8],
    src_size: Image,
    dst: &mut [u8],
    dst_size: Image,
    layers: u32,
) -> bool {
    let Some(channels) = channels(format) else {
        return false;
    };
    let texel = format.block_info().2 as usize;
    let src_layer = src_size.width as usize * src_size.height as usize * texel;
    let dst_layer = dst_size.width as usize * dst_size.height as usize * texel;

    for layer in 0..layers as usize {
        let src = &src[layer * src_layer..(layer + 1) * src_layer];
        let dst = &mut dst[layer * dst_layer..(layer + 1) * dst_layer];
        for y in 0..dst_size.height {
            for x in 0..dst_size.width {
                let taps = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|(dx, dy)| {
                    let sx = (x * 2 + dx).min(src_size.width - 1) as usize;
                    let sy = (y * 2 + dy).min(src_size.height - 1) as usize;
                    (sy * src_size.width as usize + sx) * texel
                });
                let out = (y as usize * dst_size.width as usize + x as usize) * texel;
                match channels {
                    Channels::Unorm8(count) => {
                        for c in 0..count {
                            let sum: u32 = taps.iter().map(|&tap| src[tap + c] as u32).sum();
                            dst[out + c] = ((sum + 2) / 4) as u8;
                        }
                    }
                    Channels::Float32(count) => {
                        for c in 0..count {
                            let sum: f32 = taps
                                .iter()
                                .map(|&tap| {
                                    let at = tap + c * 4;
                                    f32::from_le_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]])
                                })
                                .sum();
                            let at = out + c * 4;
                            dst[at..at + 4].copy_from_slice(&(sum / 4.0).to_le_bytes());
                        }
                    }
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_box_filter() {
        #[rustfmt::skip]
        let src = [
            0, 0, 0, 255,     255, 0, 0, 255,
            0, 255, 0, 255,   0, 0, 255, 255,
        ];
        let mut dst = [0u8; 4];
        assert!(downsample(
            TextureFormat::Rgba8,
            &src,
            Image { width: 2, height: 2 },
            &mut dst,
            Image { width: 1, height: 1 },
            1,
        ));
        assert_eq!(dst, [64, 64, 64, 255]);
    }

    #[test]
    fn test_odd_edges_are_clamped() {
        let src: Vec<u8> = vec![10, 20, 30];
        let mut dst = [0u8; 1];
        assert!(downsample(
            TextureFormat::R8,
            &src,
            Image { width: 3, height: 1 },
            &mut dst,
            Image { width: 1, height: 1 },
            1,
        ));
        assert_eq!(dst, [15]);
    }

    #[test]
    fn test_float_layers() {
        let src: Vec<f32> = vec![1.0, 3.0, 5.0, 7.0, 2.0, 2.0, 2.0, 2.0];
        let mut dst = [0u8; 8];
        assert!(downsample(
            TextureFormat::R32f,
            bytemuck::cast_slice(&src),
            Image { width: 2, height: 2 },
            &mut dst,
            Image { width: 1, height: 1 },
            2,
        ));
        let out: Vec<f32> = dst
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        assert_eq!(out, [4.0, 2.0]);
    }

    #[test]
    fn test_unsupported_format() {
        assert!(!is_filterable(TextureFormat::Rgb10A2));
        assert!(!downsample(
            TextureFormat::Rgb10A2,
            &[0; 4],
            Image { width: 1, height: 1 },
            &mut [0; 4],
            Image { width: 1, height: 1 },
            1,
        ));
    }
}
