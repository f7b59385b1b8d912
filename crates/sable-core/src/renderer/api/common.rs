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

//! Provides common, backend-agnostic enums and data structures for the rendering API.

/// The number of frames the CPU may record while the GPU is still consuming
/// earlier ones. Per-frame resources rotate across this many slots so a slot
/// is only rewritten after the GPU has finished reading it.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Returns the size in bytes of a single index of this format.
    pub const fn byte_size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// A backend-agnostic representation of a graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Vulkan API.
    Vulkan,
    /// Apple's Metal API.
    Metal,
    /// Microsoft's DirectX 12 API.
    Dx12,
    /// OpenGL API.
    OpenGl,
    /// WebGPU API (for web builds).
    WebGpu,
    /// A host-memory device with no GPU behind it (tests, tools, CI).
    Headless,
    /// An unknown or unsupported backend.
    #[default]
    Unknown,
}

/// The physical type of a graphics device (GPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized or software-based GPU.
    VirtualGpu,
    /// A software device running on the CPU.
    Cpu,
    /// An unknown or unsupported device type.
    #[default]
    Unknown,
}

/// Provides standardized, backend-agnostic information about the graphics adapter.
#[derive(Debug, Clone, Default)]
pub struct AdapterInfo {
    /// The name of the adapter (e.g., "NVIDIA GeForce RTX 4090").
    pub name: String,
    /// The graphics API backend this adapter is associated with.
    pub backend: BackendKind,
    /// The physical type of the adapter.
    pub device_kind: DeviceKind,
}

/// Device limits the resource-management layer must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// The minimum alignment, in bytes, of offsets used when binding a range
    /// of a uniform buffer. Per-frame uniform writes are padded to this.
    pub min_uniform_buffer_offset_alignment: u32,
    /// The largest single buffer the backend will create.
    pub max_buffer_size: u64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            // The conservative value required by most APIs.
            min_uniform_buffer_offset_alignment: 256,
            max_buffer_size: 1 << 30,
        }
    }
}
