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

//! Bit-set types used by descriptors.

use serde::{Deserialize, Serialize};

/// Declares a transparent bit-set struct with named constants and the usual set
/// operators.
macro_rules! driver_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident: $bits:ty {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        $vis struct $name {
            bits: $bits,
        }

        impl $name {
            /// No flag set.
            pub const NONE: Self = Self { bits: 0 };
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// Creates a set from raw bits.
            pub const fn from_bits(bits: $bits) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $bits {
                self.bits
            }

            /// Combines two sets.
            pub const fn union(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Keeps only the flags present in both sets.
            pub const fn intersection(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }

            /// Returns `true` if every flag of `other` is set.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if at least one flag of `other` is set.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                *self = self.union(rhs);
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self::Output {
                self.intersection(rhs)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut names = Vec::new();
                $(
                    if Self::$flag.bits != 0 && self.contains(Self::$flag) {
                        names.push(stringify!($flag));
                    }
                )*
                write!(f, "{}({})", stringify!($name), names.join(" | "))
            }
        }
    };
}

driver_flags! {
    /// How a texture is going to be used. Combinations that no native API can
    /// express are rejected at creation time.
    pub struct TextureUsage: u8 {
        /// The texture can be written by the CPU through `update*` calls.
        const UPLOADABLE = 1 << 0;
        /// The texture can be bound in a sampler group.
        const SAMPLEABLE = 1 << 1;
        /// The texture can be a color attachment of a render target.
        const COLOR_ATTACHMENT = 1 << 2;
        /// The texture can be a depth attachment of a render target.
        const DEPTH_ATTACHMENT = 1 << 3;
        /// The texture can be a stencil attachment of a render target.
        const STENCIL_ATTACHMENT = 1 << 4;
        /// Uploadable and sampleable, the usual texture asset.
        const DEFAULT = (1 << 0) | (1 << 1);
    }
}

driver_flags! {
    /// Selects render target buffers (for attachments, clears and discards).
    pub struct TargetBufferFlags: u8 {
        /// The color buffer.
        const COLOR = 1 << 0;
        /// The depth buffer.
        const DEPTH = 1 << 1;
        /// The stencil buffer.
        const STENCIL = 1 << 2;
        /// Depth and stencil.
        const DEPTH_AND_STENCIL = (1 << 1) | (1 << 2);
        /// Every buffer.
        const ALL = (1 << 0) | (1 << 1) | (1 << 2);
    }
}

driver_flags! {
    /// Which color channels a draw writes.
    pub struct ColorWriteMask: u8 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
        /// All four channels.
        const ALL = 0b1111;
    }
}

driver_flags! {
    /// Per-attribute interpretation flags.
    pub struct AttributeFlags: u8 {
        /// Integer data is normalized to `[0, 1]` (or `[-1, 1]`) when fetched.
        const NORMALIZED = 1 << 0;
        /// Integer data is fetched as integers instead of being converted to float.
        const INTEGER_TARGET = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_combinations() {
        let usage = TextureUsage::SAMPLEABLE | TextureUsage::COLOR_ATTACHMENT;
        assert!(usage.contains(TextureUsage::SAMPLEABLE));
        assert!(!usage.contains(TextureUsage::DEFAULT));
        assert!(usage.intersects(TextureUsage::DEFAULT));
        assert_eq!(
            format!("{usage:?}"),
            "TextureUsage(SAMPLEABLE | COLOR_ATTACHMENT)"
        );
    }

    #[test]
    fn test_target_buffer_groups() {
        assert_eq!(
            TargetBufferFlags::DEPTH | TargetBufferFlags::STENCIL,
            TargetBufferFlags::DEPTH_AND_STENCIL
        );
        assert!(TargetBufferFlags::ALL.contains(TargetBufferFlags::COLOR));
        assert!(TargetBufferFlags::NONE.is_empty());
    }
}
