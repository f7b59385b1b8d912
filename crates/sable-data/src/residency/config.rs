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

//! Sizing configuration for the renderer's GPU memory pools.
//!
//! The config is an explicit value passed into
//! [`RendererMemoryManager::new`](crate::residency::RendererMemoryManager::new)
//! rather than read from any global state; tools load it from JSON, tests
//! construct it inline.

use serde::{Deserialize, Serialize};

/// Byte budgets for the shared GPU buffers.
///
/// The per-frame budget must cover the worst-case sum of per-object and
/// per-screen uniform writes in a single frame: running out mid-frame is a
/// fatal error, so size it from a one-time scan of all per-frame consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of the shared vertex buffer in bytes.
    pub vertex_buffer_bytes: u64,
    /// Capacity of the shared index buffer in bytes.
    pub index_buffer_bytes: u64,
    /// Capacity of the persistent model/material uniform buffer in bytes.
    pub model_uniform_bytes: u64,
    /// Capacity of ONE frame slot of the per-frame uniform stream in bytes.
    pub per_frame_uniform_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_bytes: 32 << 20,
            index_buffer_bytes: 8 << 20,
            model_uniform_bytes: 1 << 20,
            per_frame_uniform_bytes: 64 << 10,
        }
    }
}

impl MemoryConfig {
    /// Parses a config from JSON. Missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
