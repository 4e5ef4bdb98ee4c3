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

//! Driver configuration.

use crate::driver::api::TextureFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Label used in logs and native debug names.
    pub label: String,
    /// Format of the depth buffer the default render target creates lazily.
    pub default_depth_format: TextureFormat,
    /// Log every resource creation and destruction at debug level.
    pub log_resource_lifecycle: bool,
    /// Bound of the command queue between logic and render threads.
    /// `None` means unbounded.
    pub command_queue_capacity: Option<usize>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            label: "lumen".to_owned(),
            default_depth_format: TextureFormat::Depth24Stencil8,
            log_resource_lifecycle: false,
            command_queue_capacity: None,
        }
    }
}

impl DriverConfig {
    /// Parses a configuration from JSON. Missing fields take their default value.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse driver configuration")
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize driver configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DriverConfig::from_json(r#"{ "default_depth_format": "Depth32f" }"#).unwrap();
        assert_eq!(config.default_depth_format, TextureFormat::Depth32f);
        assert_eq!(config.label, "lumen");
        assert_eq!(config.command_queue_capacity, None);
    }

    #[test]
    fn test_json_round_trip() {
        let config = DriverConfig {
            log_resource_lifecycle: true,
            command_queue_capacity: Some(64),
            ..DriverConfig::default()
        };
        let parsed = DriverConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let error = DriverConfig::from_json("{ not json").unwrap_err();
        assert!(error.to_string().contains("driver configuration"));
    }
}
