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

//! Backend-agnostic data structures for the rendering API.

pub mod buffer;
pub mod common;
pub mod frame_stream;
pub mod uniform_layout;

pub use self::buffer::{BufferDescriptor, BufferId, BufferUsage};
pub use self::common::{
    AdapterInfo, BackendKind, DeviceKind, DeviceLimits, IndexFormat, MAX_FRAMES_IN_FLIGHT,
};
pub use self::frame_stream::PerFrameUniformStream;
pub use self::uniform_layout::{
    UniformBlock, UniformFieldDesc, UniformFieldLayout, UniformLayout, UniformType,
};
