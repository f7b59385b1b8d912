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

//! Provides the linear-algebra primitives used by the renderer.
//!
//! The vector and matrix types here are column-major and laid out `repr(C)`
//! so they can be memcpy'd into GPU-visible buffers. Only the operations
//! the uniform engine and its callers need are implemented.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub mod matrix;
pub mod vector;

pub use self::matrix::{Mat3, Mat4};
pub use self::vector::{Vec2, Vec3, Vec4};

/// Compares two floats for equality within `epsilon`.
#[inline]
pub fn approx_eq_eps(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() <= epsilon
}

/// Compares two floats for equality within [`EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    approx_eq_eps(a, b, EPSILON)
}
