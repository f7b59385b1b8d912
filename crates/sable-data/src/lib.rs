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

//! # Sable Data
//!
//! Data layouts and allocation systems for the renderer: the free-list GPU
//! sub-allocator, the mesh/model residency pools with reference counting,
//! and the [`residency::RendererMemoryManager`] facade the rendering backend
//! and asset loaders talk to.

#![warn(missing_docs)]

pub mod allocators;
pub mod residency;
