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

//! Error types and the fatal-error policy of the driver layer.
//!
//! Two kinds of failure exist. A [`ContractError`] means the caller asked for
//! something impossible (a malformed descriptor, a pass-scoped call outside a pass,
//! an invalid handle). A [`BackendError`] means the native API failed (out of
//! memory, device lost). Neither is recoverable at the driver level: the
//! dispatcher logs them and panics through [`contract_violation`] or
//! [`OrFatal::or_fatal`].

use crate::driver::api::{TextureFormat, TextureUsage};
use std::fmt;
use thiserror::Error;

/// A violated usage contract, detected before any native call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// A dimension or count that must be positive is zero.
    #[error("{what} must be non-zero")]
    ZeroSized {
        /// What was zero.
        what: &'static str,
    },
    /// The requested mip level count does not fit the texture dimensions.
    #[error("level count {levels} out of range 1..={max} for a {width}x{height} texture")]
    LevelCount {
        /// Requested level count.
        levels: u8,
        /// Largest valid level count for these dimensions.
        max: u8,
        /// Texture width.
        width: u32,
        /// Texture height.
        height: u32,
    },
    /// The sample count is not a power of two in `1..=16`.
    #[error("unsupported sample count {0}")]
    SampleCount(u8),
    /// The usage flags cannot be honored for this format.
    #[error("usage {usage:?} is incompatible with format {format:?}")]
    IncompatibleUsage {
        /// The requested usage.
        usage: TextureUsage,
        /// The requested format.
        format: TextureFormat,
    },
    /// A write or read range falls outside the resource.
    #[error("range of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfBounds {
        /// Start of the range.
        offset: usize,
        /// Length of the range.
        len: usize,
        /// Size of the resource.
        capacity: usize,
    },
    /// Any other malformed descriptor.
    #[error("{0}")]
    InvalidDescriptor(String),
}

/// A failure reported by a native graphics API.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A native allocation failed.
    #[error("out of memory while allocating {what}: {details}")]
    OutOfMemory {
        /// The kind of object being allocated.
        what: &'static str,
        /// Native diagnostic.
        details: String,
    },
    /// The device was lost or removed.
    #[error("device lost: {0}")]
    DeviceLost(String),
    /// The presentation engine refused the frame.
    #[error("presentation failed: {0}")]
    Presentation(String),
    /// Shader compilation or program linking failed.
    #[error("failed to compile program '{program}': {details}")]
    ShaderCompilation {
        /// The program name.
        program: String,
        /// Compiler output.
        details: String,
    },
    /// The native API cannot perform the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// Any other native error.
    #[error("native error: {0}")]
    Native(String),
}

/// Logs and panics with a diagnostic naming the violated contract.
///
/// This is the single exit point for contract violations; it never returns.
#[cold]
#[track_caller]
pub fn contract_violation(message: impl fmt::Display) -> ! {
    log::error!("Driver contract violation: {message}");
    panic!("driver contract violation: {message}");
}

/// Panics with a contract violation unless `$cond` holds.
#[macro_export]
macro_rules! ensure_contract {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::driver::error::contract_violation(format_args!($($arg)+));
        }
    };
}

/// Escalates native failures to fatal errors.
pub trait OrFatal<T> {
    /// Returns the value, or logs the error and panics with `context`.
    fn or_fatal(self, context: &str) -> T;
}

impl<T> OrFatal<T> for Result<T, BackendError> {
    #[track_caller]
    fn or_fatal(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(error) => {
                log::error!("Backend failure during {context}: {error}");
                panic!("fatal backend error during {context}: {error}");
            }
        }
    }
}

impl<T> OrFatal<T> for Result<T, ContractError> {
    #[track_caller]
    fn or_fatal(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(error) => contract_violation(format_args!("{context}: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_messages() {
        let error = ContractError::LevelCount {
            levels: 12,
            max: 9,
            width: 300,
            height: 130,
        };
        assert_eq!(
            error.to_string(),
            "level count 12 out of range 1..=9 for a 300x130 texture"
        );
    }

    #[test]
    #[should_panic(expected = "driver contract violation: createTexture: width must be non-zero")]
    fn test_contract_error_is_fatal() {
        let result: Result<(), ContractError> = Err(ContractError::ZeroSized { what: "width" });
        result.or_fatal("createTexture");
    }

    #[test]
    #[should_panic(expected = "fatal backend error during commit: device lost: removed")]
    fn test_backend_error_is_fatal() {
        let result: Result<(), BackendError> = Err(BackendError::DeviceLost("removed".into()));
        result.or_fatal("commit");
    }
}
