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

//! Defines the hierarchy of error types for the resource-management core.

use crate::renderer::api::uniform_layout::UniformType;
use std::fmt;

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The referenced resource does not exist on the device.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The device or a fixed-capacity region cannot hold the requested bytes.
    OutOfMemory {
        /// The number of bytes the operation asked for.
        requested: u64,
        /// The number of bytes that were actually available.
        available: u64,
    },
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfMemory {
                requested,
                available,
            } => {
                write!(
                    f,
                    "Out of memory: requested {requested} bytes, {available} available."
                )
            }
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// An error raised by the uniform layout engine's typed accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformError {
    /// The accessor's type does not match the field's declared type.
    TypeMismatch {
        /// The name of the accessed field.
        field: String,
        /// The type the field was declared with.
        declared: UniformType,
        /// The type the accessor asked for.
        requested: UniformType,
    },
    /// No field with the given name exists in the layout.
    FieldNotFound {
        /// The name that was looked up.
        field: String,
    },
    /// An array element index is outside the field's declared length.
    IndexOutOfBounds {
        /// The name of the accessed field.
        field: String,
        /// The requested element index.
        index: u32,
        /// The field's declared element count.
        len: u32,
    },
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformError::TypeMismatch {
                field,
                declared,
                requested,
            } => {
                write!(
                    f,
                    "Uniform field '{field}' is declared {declared:?} but was accessed as {requested:?}"
                )
            }
            UniformError::FieldNotFound { field } => {
                write!(f, "Uniform field '{field}' does not exist in the layout")
            }
            UniformError::IndexOutOfBounds { field, index, len } => {
                write!(
                    f,
                    "Index {index} is out of bounds for uniform field '{field}' of length {len}"
                )
            }
        }
    }
}

impl std::error::Error for UniformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_error_display() {
        let err = ResourceError::OutOfMemory {
            requested: 128,
            available: 64,
        };
        assert_eq!(
            format!("{err}"),
            "Out of memory: requested 128 bytes, 64 available."
        );

        let err = ResourceError::BackendError("device lost".to_string());
        assert_eq!(
            format!("{err}"),
            "Backend-specific resource error: device lost"
        );
    }

    #[test]
    fn uniform_error_display() {
        let err = UniformError::TypeMismatch {
            field: "model".to_string(),
            declared: UniformType::Mat4,
            requested: UniformType::Vec4,
        };
        assert_eq!(
            format!("{err}"),
            "Uniform field 'model' is declared Mat4 but was accessed as Vec4"
        );

        let err = UniformError::FieldNotFound {
            field: "tint".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Uniform field 'tint' does not exist in the layout"
        );
    }
}
