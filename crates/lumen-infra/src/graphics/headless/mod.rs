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

//! A CPU-side backend that emulates an immediate-mode native API.
//!
//! It needs no GPU and no window, which makes it the backend of the test suite
//! and of headless tools. Every native object it creates is tracked in a
//! [`NativeLedger`], so leaks and double releases are observable.

mod backend;
mod calls;
mod formats;
mod ledger;
mod mipmaps;
mod resources;

pub use self::backend::HeadlessBackend;
pub use self::calls::NativeCall;
pub use self::formats::{native_format, NativeFormat, NativeFormatTriple};
pub use self::ledger::{NativeId, NativeKind, NativeLedger};
pub use self::resources::{
    AttachmentView, DefaultDepth, HeadlessIndexBuffer, HeadlessPrimitive, HeadlessProgram,
    HeadlessRasterState, HeadlessRenderTarget, HeadlessSampler, HeadlessSwapChain,
    HeadlessTexture, HeadlessUniformBuffer, HeadlessVertexBuffer, NativeBuffer,
};

use lumen_core::driver::TextureFormat;
use serde::{Deserialize, Serialize};

/// Settings of the headless backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Number of submissions the virtual GPU lags behind. `0` completes every
    /// submission as soon as it is made.
    pub retire_latency: u64,
    /// Restricts the supported texture formats. `None` supports every format
    /// with a native equivalent.
    pub supported_formats: Option<Vec<TextureFormat>>,
    /// Whether `generate_mipmaps` is available.
    pub can_generate_mipmaps: bool,
    /// Largest texture dimension accepted.
    pub max_texture_dimension: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            retire_latency: 1,
            supported_formats: None,
            can_generate_mipmaps: true,
            max_texture_dimension: 16384,
        }
    }
}
