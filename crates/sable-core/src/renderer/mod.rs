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

//! Provides the public, backend-agnostic rendering contracts for the Sable Engine.
//!
//! This module defines the "common language" for GPU resource management. It
//! contains the abstract `traits` (like [`GraphicsDevice`]), data structures
//! (like [`BufferDescriptor`]), the uniform layout engine, and the error types
//! that form the stable, public-facing API.
//!
//! This module defines the 'what' of resource management; the 'how' is handled
//! by a concrete backend in the `sable-infra` crate which implements these
//! traits, and by the allocation and residency systems in `sable-data` which
//! consume them without knowing the underlying graphics API.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{ResourceError, UniformError};
pub use self::traits::GraphicsDevice;
