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

//! Concrete backends for the lumen driver layer.
//!
//! The backend is chosen at compile time: `backend-wgpu` selects the hardware
//! backend, otherwise the headless backend is used.

pub mod graphics;

use anyhow::Result;
use lumen_core::driver::{Backend, Dispatcher, DriverConfig};

/// The backend this build renders with.
#[cfg(feature = "backend-wgpu")]
pub type PlatformBackend = graphics::wgpu::WgpuBackend;

/// The backend this build renders with.
#[cfg(not(feature = "backend-wgpu"))]
pub type PlatformBackend = graphics::headless::HeadlessBackend;

/// Creates a driver over the platform backend.
///
/// ## Errors
/// Fails when no native device can be opened.
pub fn create_driver(config: DriverConfig) -> Result<Dispatcher<PlatformBackend>> {
    #[cfg(feature = "backend-wgpu")]
    let backend = graphics::wgpu::WgpuBackend::new(&config)?;
    #[cfg(not(feature = "backend-wgpu"))]
    let backend = graphics::headless::HeadlessBackend::default();

    log::info!(
        "Creating '{}' driver on the {} backend.",
        config.label,
        backend.name()
    );
    Ok(Dispatcher::new(backend, config))
}
