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

//! Defines the `Mat3` and `Mat4` types and associated operations.

use super::{Vec3, Vec4};
use std::ops::Mul;

// --- Mat3 ---

/// A 3x3 column-major matrix.
///
/// Its primary role in the renderer is as the rotation/scale part of a
/// `Mat4` (e.g., a normal matrix) handed to the uniform engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat3 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec3; 3],
}

impl Mat3 {
    /// The 3x3 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    /// A 3x3 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec3::ZERO; 3],
    };

    /// Creates a new matrix from three column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self { cols: [c0, c1, c2] }
    }

    /// Creates a 3D scaling matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            cols: [
                Vec3::new(scale.x, 0.0, 0.0),
                Vec3::new(0.0, scale.y, 0.0),
                Vec3::new(0.0, 0.0, scale.z),
            ],
        }
    }

    /// Returns the transposed matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self {
            cols: [self.row(0), self.row(1), self.row(2)],
        }
    }

    /// Returns a row of the matrix as a `Vec3`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec3 {
        Vec3 {
            x: self.cols[0].get(index),
            y: self.cols[1].get(index),
            z: self.cols[2].get(index),
        }
    }
}

// --- Mat4 ---

/// A 4x4 column-major matrix, used for 3D transformations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// A 4x4 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO; 4],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            cols: [
                Vec4::X,
                Vec4::Y,
                Vec4::Z,
                Vec4::from_vec3(translation, 1.0),
            ],
        }
    }

    /// Creates a 3D scaling matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self {
            cols: [
                Vec4::new(scale.x, 0.0, 0.0, 0.0),
                Vec4::new(0.0, scale.y, 0.0, 0.0),
                Vec4::new(0.0, 0.0, scale.z, 0.0),
                Vec4::W,
            ],
        }
    }

    /// Returns the transposed matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self {
            cols: [self.row(0), self.row(1), self.row(2), self.row(3)],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        Vec4 {
            x: self.cols[0].get(index),
            y: self.cols[1].get(index),
            z: self.cols[2].get(index),
            w: self.cols[3].get(index),
        }
    }

    /// Returns the upper-left 3x3 part of the matrix.
    #[inline]
    pub fn to_mat3(&self) -> Mat3 {
        let c = |i: usize| Vec3::new(self.cols[i].x, self.cols[i].y, self.cols[i].z);
        Mat3::from_cols(c(0), c(1), c(2))
    }
}

impl Mul for Mat4 {
    type Output = Self;

    /// Multiplies two matrices (`self * rhs`).
    fn mul(self, rhs: Self) -> Self::Output {
        let mut cols = [Vec4::ZERO; 4];
        for (i, col) in cols.iter_mut().enumerate() {
            *col = Vec4 {
                x: self.row(0).dot(rhs.cols[i]),
                y: self.row(1).dot(rhs.cols[i]),
                z: self.row(2).dot(rhs.cols[i]),
                w: self.row(3).dot(rhs.cols[i]),
            };
        }
        Self { cols }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    /// Transforms a vector by this matrix.
    fn mul(self, rhs: Vec4) -> Self::Output {
        Vec4 {
            x: self.row(0).dot(rhs),
            y: self.row(1).dot(rhs),
            z: self.row(2).dot(rhs),
            w: self.row(3).dot(rhs),
        }
    }
}
