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

#![cfg(not(feature = "backend-wgpu"))]

use lumen_core::driver::{Capabilities, Driver, DriverConfig, TextureFormat};
use lumen_infra::create_driver;

#[test]
fn test_create_driver_uses_the_headless_backend() {
    // --- 1. ARRANGE ---
    let _ = env_logger::builder().is_test(true).try_init();
    let config = DriverConfig {
        label: "platform-test".into(),
        ..DriverConfig::default()
    };

    // --- 2. ACT ---
    let mut driver = create_driver(config).expect("the headless backend never fails");

    // --- 3. ASSERT ---
    assert_eq!(driver.backend_name(), "headless");
    assert_eq!(driver.config().label, "platform-test");
    assert!(driver.is_texture_format_supported(TextureFormat::Rgba8));
    assert!(driver.can_generate_mipmaps());
    driver.terminate();
}
