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

//! Picking formats the backend actually supports.

use crate::driver::api::TextureFormat;
use crate::driver::traits::Capabilities;

/// Depth formats in decreasing order of preference.
pub const DEPTH_FORMAT_PREFERENCES: &[TextureFormat] = &[
    TextureFormat::Depth32f,
    TextureFormat::Depth24,
    TextureFormat::Depth16,
];

/// Depth-stencil formats in decreasing order of preference.
pub const DEPTH_STENCIL_FORMAT_PREFERENCES: &[TextureFormat] = &[
    TextureFormat::Depth24Stencil8,
    TextureFormat::Depth32fStencil8,
];

/// Returns the first depth format of `preferences` that can be rendered to.
pub fn select_depth_format<C: Capabilities + ?Sized>(
    caps: &C,
    preferences: &[TextureFormat],
) -> Option<TextureFormat> {
    let selected = preferences
        .iter()
        .copied()
        .filter(|format| format.is_depth())
        .find(|&format| caps.is_render_target_format_supported(format));
    match selected {
        Some(format) => log::debug!("Selected depth format {format:?}"),
        None => log::warn!("None of the depth formats {preferences:?} is supported"),
    }
    selected
}

/// Returns the first format of `preferences` that can be sampled, and rendered
/// to when `render_target` is set.
pub fn select_texture_format<C: Capabilities + ?Sized>(
    caps: &C,
    preferences: &[TextureFormat],
    render_target: bool,
) -> Option<TextureFormat> {
    preferences.iter().copied().find(|&format| {
        caps.is_texture_format_supported(format)
            && (!render_target || caps.is_render_target_format_supported(format))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlyD16AndRgba8;

    impl Capabilities for OnlyD16AndRgba8 {
        fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
            matches!(
                format,
                TextureFormat::Depth16 | TextureFormat::Rgba8 | TextureFormat::Dxt1Rgb
            )
        }

        fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
            matches!(format, TextureFormat::Depth16 | TextureFormat::Rgba8)
        }

        fn can_generate_mipmaps(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_depth_falls_back_to_d16() {
        assert_eq!(
            select_depth_format(&OnlyD16AndRgba8, DEPTH_FORMAT_PREFERENCES),
            Some(TextureFormat::Depth16)
        );
        assert_eq!(
            select_depth_format(&OnlyD16AndRgba8, DEPTH_STENCIL_FORMAT_PREFERENCES),
            None
        );
    }

    #[test]
    fn test_depth_stencil_preferences_fall_back_to_d16() {
        let preferences = [
            TextureFormat::Depth24Stencil8,
            TextureFormat::Depth32f,
            TextureFormat::Depth16,
        ];
        assert_eq!(
            select_depth_format(&OnlyD16AndRgba8, &preferences),
            Some(TextureFormat::Depth16)
        );
    }

    #[test]
    fn test_color_formats_are_ignored_for_depth() {
        assert_eq!(
            select_depth_format(&OnlyD16AndRgba8, &[TextureFormat::Rgba8]),
            None
        );
    }

    #[test]
    fn test_texture_format_respects_render_target_flag() {
        let preferences = [TextureFormat::Etc2Rgb8, TextureFormat::Dxt1Rgb, TextureFormat::Rgba8];
        assert_eq!(
            select_texture_format(&OnlyD16AndRgba8, &preferences, false),
            Some(TextureFormat::Dxt1Rgb)
        );
        assert_eq!(
            select_texture_format(&OnlyD16AndRgba8, &preferences, true),
            Some(TextureFormat::Rgba8)
        );
    }
}
