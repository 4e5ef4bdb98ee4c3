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

use anyhow::{anyhow, Result};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle,
    RawWindowHandle, WindowHandle,
};
use serde::{Deserialize, Serialize};
use wgpu::{Features, SurfaceTargetUnsafe};

/// Which adapter to favor when several are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdapterPreference {
    /// Integrated GPUs first.
    LowPower,
    /// Discrete GPUs first.
    #[default]
    HighPerformance,
}

/// How swap chains pace presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentPreference {
    /// Mailbox when the surface offers it, FIFO otherwise.
    #[default]
    LowLatency,
    /// Always FIFO.
    VSync,
}

/// Settings of the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WgpuConfig {
    pub adapter: AdapterPreference,
    pub present: PresentPreference,
}

/// Optional features enabled whenever the adapter offers them.
fn wanted_features() -> Features {
    Features::TEXTURE_COMPRESSION_BC
        | Features::TEXTURE_COMPRESSION_ETC2
        | Features::TEXTURE_COMPRESSION_ASTC
        | Features::DEPTH32FLOAT_STENCIL8
}

/// The device-level wgpu state shared by every swap chain.
#[derive(Debug)]
pub struct WgpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub config: WgpuConfig,
}

impl WgpuContext {
    /// Opens the best available adapter. No surface is needed: swap chains are
    /// created later against the same instance.
    ///
    /// ## Errors
    /// Fails when no adapter or no logical device is available.
    pub fn new(label: &str, config: WgpuConfig) -> Result<Self> {
        log::info!("Initializing wgpu context '{label}'...");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: match config.adapter {
                AdapterPreference::LowPower => wgpu::PowerPreference::LowPower,
                AdapterPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            },
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| anyhow!("No suitable graphics adapter found: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?}, Type: {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let required_features = adapter.features() & wanted_features();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("wgpu uncaptured error: {e:?}");
        }));
        log::debug!("Active device features: {:?}", device.features());

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            adapter_info,
            config,
        })
    }

    /// Creates a presentable surface for a platform window.
    ///
    /// # Safety
    /// The window and display behind the handles must outlive the surface.
    pub unsafe fn create_surface(
        &self,
        window: RawWindowHandle,
        display: RawDisplayHandle,
    ) -> Result<wgpu::Surface<'static>> {
        let handles = RawHandles { window, display };
        let target = unsafe {
            SurfaceTargetUnsafe::from_window(&handles)
                .map_err(|e| anyhow!("Failed to create surface target: {e}"))?
        };
        let surface = unsafe { self.instance.create_surface_unsafe(target)? };
        log::debug!("wgpu surface created for the window.");
        Ok(surface)
    }

    /// Surface configuration preferring an sRGB format, paced as configured.
    pub fn surface_configuration(
        &self,
        surface: &wgpu::Surface<'_>,
        width: u32,
        height: u32,
    ) -> Result<wgpu::SurfaceConfiguration> {
        let caps = surface.get_capabilities(&self.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("Surface is not compatible with the adapter"))?;
        Ok(wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: match self.config.present {
                PresentPreference::LowLatency => caps
                    .present_modes
                    .iter()
                    .copied()
                    .find(|m| *m == wgpu::PresentMode::Mailbox)
                    .unwrap_or(wgpu::PresentMode::Fifo),
                PresentPreference::VSync => wgpu::PresentMode::Fifo,
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Opaque),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        })
    }
}

/// Raw platform handles lent to wgpu for surface creation.
struct RawHandles {
    window: RawWindowHandle,
    display: RawDisplayHandle,
}

impl HasWindowHandle for RawHandles {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        // SAFETY: `create_surface` requires the window to outlive the surface.
        Ok(unsafe { WindowHandle::borrow_raw(self.window) })
    }
}

impl HasDisplayHandle for RawHandles {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        // SAFETY: `create_surface` requires the display to outlive the surface.
        Ok(unsafe { DisplayHandle::borrow_raw(self.display) })
    }
}
