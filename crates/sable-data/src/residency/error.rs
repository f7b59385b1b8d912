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

//! Error types for the residency pools and the memory-manager facade.

use crate::allocators::AllocError;
use sable_core::renderer::error::ResourceError;
use std::fmt;

/// An error reported by the residency pools or the memory manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// No resource is registered under the key, or its backing memory was
    /// reclaimed while unused. The caller re-uploads to recover; this is a
    /// cache miss, not a corruption.
    NotFound {
        /// The key that was looked up.
        key: String,
    },
    /// A backing buffer cannot hold the requested bytes, even after a full
    /// scan of its free records.
    OutOfMemory {
        /// The number of bytes the operation asked for.
        requested: u64,
        /// The number of free bytes at the time of the failure.
        free: u64,
    },
    /// The request itself is malformed (empty data, bad sizes).
    InvalidArgument(String),
    /// An error surfaced from the graphics device.
    Resource(ResourceError),
}

impl MemoryError {
    /// Maps an allocator error into the facade's taxonomy, attributing a
    /// stale handle to the keyed resource (the cache-miss case).
    pub(crate) fn from_alloc(key: &str, err: AllocError) -> Self {
        match err {
            AllocError::OutOfMemory { requested, free } => {
                MemoryError::OutOfMemory { requested, free }
            }
            AllocError::InvalidArgument(msg) => MemoryError::InvalidArgument(msg),
            AllocError::StaleHandle => MemoryError::NotFound {
                key: key.to_string(),
            },
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::NotFound { key } => {
                write!(f, "No resident GPU resource under key '{key}'")
            }
            MemoryError::OutOfMemory { requested, free } => {
                write!(
                    f,
                    "GPU pool exhausted: requested {requested} bytes, {free} free"
                )
            }
            MemoryError::InvalidArgument(msg) => {
                write!(f, "Invalid resource request: {msg}")
            }
            MemoryError::Resource(err) => write!(f, "Graphics resource operation failed: {err}"),
        }
    }
}

impl std::error::Error for MemoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoryError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for MemoryError {
    fn from(err: ResourceError) -> Self {
        MemoryError::Resource(err)
    }
}
