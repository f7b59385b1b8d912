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

//! Computes std140-compatible byte layouts for uniform blocks and provides
//! typed, validated access into a packed backing buffer.
//!
//! Uniform-buffer rules are stricter than `repr(C)`: a `vec3` starts on a
//! 16-byte boundary but occupies only 12 bytes (a trailing scalar may pack
//! into the gap), `mat3` columns are padded to a 16-byte stride, and array
//! elements always stride by a multiple of 16. The shader-side block
//! declaration and the layout computed here must agree byte for byte, which
//! is why every accessor validates the declared field type instead of
//! trusting the caller.

use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::renderer::error::UniformError;
use std::collections::HashMap;

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
const fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

/// The data type of a single uniform field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// A 32-bit float scalar.
    Float,
    /// A 32-bit unsigned integer scalar.
    UInt,
    /// A 2-component float vector.
    Vec2,
    /// A 3-component float vector.
    Vec3,
    /// A 4-component float vector.
    Vec4,
    /// A 3x3 float matrix, stored as three 16-byte-strided columns.
    Mat3,
    /// A 4x4 float matrix, stored as four 16-byte-strided columns.
    Mat4,
}

impl UniformType {
    /// The boundary the field's starting offset must be a multiple of.
    pub const fn base_alignment(self) -> u32 {
        match self {
            UniformType::Float | UniformType::UInt => 4,
            UniformType::Vec2 => 8,
            // vec3 rounds up to the 16-byte boundary even though it only
            // occupies 12 bytes.
            UniformType::Vec3 | UniformType::Vec4 => 16,
            UniformType::Mat3 | UniformType::Mat4 => 16,
        }
    }

    /// The number of bytes one value of this type occupies.
    pub const fn byte_size(self) -> u32 {
        match self {
            UniformType::Float | UniformType::UInt => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            // Three vec3 columns, each padded to a 16-byte stride.
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }

    /// The distance between consecutive elements when this type is used in
    /// an array. Both the stride and the array's base alignment round up to
    /// 16 bytes.
    pub const fn array_stride(self) -> u32 {
        align_up(self.byte_size(), 16)
    }
}

/// Describes one field of a uniform block, in declaration order.
#[derive(Debug, Clone)]
pub struct UniformFieldDesc {
    /// The field's name, used for lookup by the typed accessors.
    pub name: String,
    /// The field's data type.
    pub ty: UniformType,
    /// `0` for a plain field; `n >= 1` for an array of `n` elements.
    pub array_len: u32,
}

impl UniformFieldDesc {
    /// Describes a plain (non-array) field.
    pub fn new(name: impl Into<String>, ty: UniformType) -> Self {
        Self {
            name: name.into(),
            ty,
            array_len: 0,
        }
    }

    /// Describes an array field of `len` elements.
    pub fn array(name: impl Into<String>, ty: UniformType, len: u32) -> Self {
        debug_assert!(len > 0, "uniform arrays must have at least one element");
        Self {
            name: name.into(),
            ty,
            array_len: len,
        }
    }
}

/// The computed position of one named field inside a packed uniform buffer.
///
/// Immutable once the owning [`UniformLayout`] is constructed; only the
/// backing data bytes of a [`UniformBlock`] are mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformFieldLayout {
    /// The field's data type.
    pub ty: UniformType,
    /// `0` for a plain field; `n >= 1` for an array of `n` elements.
    pub array_len: u32,
    /// The field's starting byte offset, a multiple of its base alignment.
    pub offset: u32,
    /// The field's total size in bytes, padding included for matrices and
    /// arrays. May exceed the natural size (e.g., a `vec3` occupies 12).
    pub size: u32,
}

impl UniformFieldLayout {
    /// The number of addressable elements (1 for plain fields).
    pub fn element_count(&self) -> u32 {
        self.array_len.max(1)
    }

    /// The distance between consecutive elements of this field.
    fn element_stride(&self) -> u32 {
        if self.array_len > 0 {
            self.ty.array_stride()
        } else {
            self.ty.byte_size()
        }
    }
}

/// A name-addressable uniform block layout computed once from an ordered
/// field list.
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    fields: Vec<(String, UniformFieldLayout)>,
    by_name: HashMap<String, usize>,
    size: u32,
}

impl UniformLayout {
    /// Computes the layout of `fields` in declaration order.
    ///
    /// Each field is placed at the running offset rounded up to its base
    /// alignment; the running offset then advances by the field's size. The
    /// total size is the offset plus size of the last field.
    pub fn new(descs: &[UniformFieldDesc]) -> Self {
        let mut fields = Vec::with_capacity(descs.len());
        let mut by_name = HashMap::with_capacity(descs.len());
        let mut cursor = 0u32;

        for desc in descs {
            let (alignment, size) = if desc.array_len > 0 {
                // Array base alignment and element stride both round to 16.
                let stride = desc.ty.array_stride();
                (align_up(desc.ty.base_alignment(), 16), stride * desc.array_len)
            } else {
                (desc.ty.base_alignment(), desc.ty.byte_size())
            };

            let offset = align_up(cursor, alignment);
            cursor = offset + size;

            by_name.insert(desc.name.clone(), fields.len());
            fields.push((
                desc.name.clone(),
                UniformFieldLayout {
                    ty: desc.ty,
                    array_len: desc.array_len,
                    offset,
                    size,
                },
            ));
        }

        Self {
            fields,
            by_name,
            size: cursor,
        }
    }

    /// The total size of the packed block in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Looks up a field's layout by name.
    pub fn field(&self, name: &str) -> Option<&UniformFieldLayout> {
        self.by_name.get(name).map(|&i| &self.fields[i].1)
    }

    /// The number of fields in the layout.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the layout has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, layout)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformFieldLayout)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }
}

/// A packed byte buffer paired with its [`UniformLayout`], accessed through
/// typed getters and setters that validate the declared field types.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
}

impl UniformBlock {
    /// Creates a zero-initialized block sized for `layout`.
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0u8; layout.size() as usize];
        Self { layout, data }
    }

    /// The block's layout.
    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// The packed bytes, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Resolves `name[index]` to a byte offset, validating existence, the
    /// declared type, and the element index.
    fn locate(
        &self,
        name: &str,
        requested: UniformType,
        index: u32,
    ) -> Result<usize, UniformError> {
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| UniformError::FieldNotFound {
                field: name.to_string(),
            })?;
        if field.ty != requested {
            return Err(UniformError::TypeMismatch {
                field: name.to_string(),
                declared: field.ty,
                requested,
            });
        }
        let len = field.element_count();
        if index >= len {
            return Err(UniformError::IndexOutOfBounds {
                field: name.to_string(),
                index,
                len,
            });
        }
        Ok((field.offset + index * field.element_stride()) as usize)
    }

    fn write_pod<T: bytemuck::Pod>(
        &mut self,
        name: &str,
        ty: UniformType,
        index: u32,
        value: &T,
    ) -> Result<(), UniformError> {
        let offset = self.locate(name, ty, index)?;
        let bytes = bytemuck::bytes_of(value);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_pod<T: bytemuck::Pod>(
        &self,
        name: &str,
        ty: UniformType,
        index: u32,
    ) -> Result<T, UniformError> {
        let offset = self.locate(name, ty, index)?;
        let size = std::mem::size_of::<T>();
        Ok(bytemuck::pod_read_unaligned(&self.data[offset..offset + size]))
    }

    /// Writes a float scalar field.
    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), UniformError> {
        self.set_float_at(name, 0, value)
    }

    /// Writes one element of a float scalar array.
    pub fn set_float_at(&mut self, name: &str, index: u32, value: f32) -> Result<(), UniformError> {
        self.write_pod(name, UniformType::Float, index, &value)
    }

    /// Reads a float scalar field.
    pub fn get_float(&self, name: &str) -> Result<f32, UniformError> {
        self.get_float_at(name, 0)
    }

    /// Reads one element of a float scalar array.
    pub fn get_float_at(&self, name: &str, index: u32) -> Result<f32, UniformError> {
        self.read_pod(name, UniformType::Float, index)
    }

    /// Writes an unsigned integer scalar field.
    pub fn set_uint(&mut self, name: &str, value: u32) -> Result<(), UniformError> {
        self.set_uint_at(name, 0, value)
    }

    /// Writes one element of an unsigned integer scalar array.
    pub fn set_uint_at(&mut self, name: &str, index: u32, value: u32) -> Result<(), UniformError> {
        self.write_pod(name, UniformType::UInt, index, &value)
    }

    /// Reads an unsigned integer scalar field.
    pub fn get_uint(&self, name: &str) -> Result<u32, UniformError> {
        self.get_uint_at(name, 0)
    }

    /// Reads one element of an unsigned integer scalar array.
    pub fn get_uint_at(&self, name: &str, index: u32) -> Result<u32, UniformError> {
        self.read_pod(name, UniformType::UInt, index)
    }

    /// Writes a `vec2` field.
    pub fn set_vec2(&mut self, name: &str, value: Vec2) -> Result<(), UniformError> {
        self.set_vec2_at(name, 0, value)
    }

    /// Writes one element of a `vec2` array.
    pub fn set_vec2_at(&mut self, name: &str, index: u32, value: Vec2) -> Result<(), UniformError> {
        self.write_pod(name, UniformType::Vec2, index, &value)
    }

    /// Reads a `vec2` field.
    pub fn get_vec2(&self, name: &str) -> Result<Vec2, UniformError> {
        self.get_vec2_at(name, 0)
    }

    /// Reads one element of a `vec2` array.
    pub fn get_vec2_at(&self, name: &str, index: u32) -> Result<Vec2, UniformError> {
        self.read_pod(name, UniformType::Vec2, index)
    }

    /// Writes a `vec3` field. Only 12 bytes are written; the trailing pad
    /// byte range stays untouched so packed scalars survive.
    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> Result<(), UniformError> {
        self.set_vec3_at(name, 0, value)
    }

    /// Writes one element of a `vec3` array.
    pub fn set_vec3_at(&mut self, name: &str, index: u32, value: Vec3) -> Result<(), UniformError> {
        self.write_pod(name, UniformType::Vec3, index, &value)
    }

    /// Reads a `vec3` field.
    pub fn get_vec3(&self, name: &str) -> Result<Vec3, UniformError> {
        self.get_vec3_at(name, 0)
    }

    /// Reads one element of a `vec3` array.
    pub fn get_vec3_at(&self, name: &str, index: u32) -> Result<Vec3, UniformError> {
        self.read_pod(name, UniformType::Vec3, index)
    }

    /// Writes a `vec4` field.
    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> Result<(), UniformError> {
        self.set_vec4_at(name, 0, value)
    }

    /// Writes one element of a `vec4` array.
    pub fn set_vec4_at(&mut self, name: &str, index: u32, value: Vec4) -> Result<(), UniformError> {
        self.write_pod(name, UniformType::Vec4, index, &value)
    }

    /// Reads a `vec4` field.
    pub fn get_vec4(&self, name: &str) -> Result<Vec4, UniformError> {
        self.get_vec4_at(name, 0)
    }

    /// Reads one element of a `vec4` array.
    pub fn get_vec4_at(&self, name: &str, index: u32) -> Result<Vec4, UniformError> {
        self.read_pod(name, UniformType::Vec4, index)
    }

    /// Writes a `mat3` field column by column.
    ///
    /// Columns are NOT contiguous: each 12-byte column sits at its own
    /// 16-byte-strided sub-offset, leaving a 4-byte gap after it.
    pub fn set_mat3(&mut self, name: &str, value: &Mat3) -> Result<(), UniformError> {
        self.set_mat3_at(name, 0, value)
    }

    /// Writes one element of a `mat3` array.
    pub fn set_mat3_at(
        &mut self,
        name: &str,
        index: u32,
        value: &Mat3,
    ) -> Result<(), UniformError> {
        let offset = self.locate(name, UniformType::Mat3, index)?;
        for (col, v) in value.cols.iter().enumerate() {
            let at = offset + col * 16;
            self.data[at..at + 12].copy_from_slice(bytemuck::bytes_of(v));
        }
        Ok(())
    }

    /// Reads a `mat3` field column by column.
    pub fn get_mat3(&self, name: &str) -> Result<Mat3, UniformError> {
        self.get_mat3_at(name, 0)
    }

    /// Reads one element of a `mat3` array.
    pub fn get_mat3_at(&self, name: &str, index: u32) -> Result<Mat3, UniformError> {
        let offset = self.locate(name, UniformType::Mat3, index)?;
        let mut cols = [Vec3::ZERO; 3];
        for (col, v) in cols.iter_mut().enumerate() {
            let at = offset + col * 16;
            *v = bytemuck::pod_read_unaligned(&self.data[at..at + 12]);
        }
        Ok(Mat3 { cols })
    }

    /// Writes a `mat4` field (four contiguous 16-byte columns).
    pub fn set_mat4(&mut self, name: &str, value: &Mat4) -> Result<(), UniformError> {
        self.set_mat4_at(name, 0, value)
    }

    /// Writes one element of a `mat4` array.
    pub fn set_mat4_at(
        &mut self,
        name: &str,
        index: u32,
        value: &Mat4,
    ) -> Result<(), UniformError> {
        let offset = self.locate(name, UniformType::Mat4, index)?;
        self.data[offset..offset + 64].copy_from_slice(bytemuck::cast_slice(&value.cols));
        Ok(())
    }

    /// Reads a `mat4` field.
    pub fn get_mat4(&self, name: &str) -> Result<Mat4, UniformError> {
        self.get_mat4_at(name, 0)
    }

    /// Reads one element of a `mat4` array.
    pub fn get_mat4_at(&self, name: &str, index: u32) -> Result<Mat4, UniformError> {
        let offset = self.locate(name, UniformType::Mat4, index)?;
        let mut cols = [Vec4::ZERO; 4];
        for (col, v) in cols.iter_mut().enumerate() {
            let at = offset + col * 16;
            *v = bytemuck::pod_read_unaligned(&self.data[at..at + 16]);
        }
        Ok(Mat4 { cols })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(descs: &[UniformFieldDesc]) -> UniformLayout {
        UniformLayout::new(descs)
    }

    #[test]
    fn scalar_after_vec3_packs_into_the_gap() {
        // { float a; vec3 b; float c; mat3 d; }
        let l = layout(&[
            UniformFieldDesc::new("a", UniformType::Float),
            UniformFieldDesc::new("b", UniformType::Vec3),
            UniformFieldDesc::new("c", UniformType::Float),
            UniformFieldDesc::new("d", UniformType::Mat3),
        ]);

        assert_eq!(l.field("a").unwrap().offset, 0);
        assert_eq!(l.field("b").unwrap().offset, 16);
        // b occupies 12 bytes, so c packs right behind it at 28.
        assert_eq!(l.field("c").unwrap().offset, 28);
        // d aligns to the next 16-byte boundary after c's 4 bytes.
        assert_eq!(l.field("d").unwrap().offset, 32);
        assert_eq!(l.size(), 32 + 48);
    }

    #[test]
    fn vec2_aligns_to_eight() {
        let l = layout(&[
            UniformFieldDesc::new("a", UniformType::Float),
            UniformFieldDesc::new("b", UniformType::Vec2),
        ]);
        assert_eq!(l.field("b").unwrap().offset, 8);
        assert_eq!(l.size(), 16);
    }

    #[test]
    fn total_size_is_last_offset_plus_size() {
        let l = layout(&[UniformFieldDesc::new("only", UniformType::Vec3)]);
        assert_eq!(l.size(), 12);
    }

    #[test]
    fn scalar_arrays_stride_by_sixteen() {
        let l = layout(&[
            UniformFieldDesc::array("weights", UniformType::Float, 3),
            UniformFieldDesc::new("tail", UniformType::Float),
        ]);
        let weights = l.field("weights").unwrap();
        assert_eq!(weights.offset, 0);
        assert_eq!(weights.size, 48);
        // The array's padded size pushes the next field past it.
        assert_eq!(l.field("tail").unwrap().offset, 48);
    }

    #[test]
    fn mat3_array_elements_stride_by_48() {
        let l = layout(&[UniformFieldDesc::array("bones", UniformType::Mat3, 2)]);
        assert_eq!(l.field("bones").unwrap().size, 96);
    }

    #[test]
    fn scalar_round_trips_are_bit_exact() {
        let mut block = UniformBlock::new(layout(&[
            UniformFieldDesc::new("f", UniformType::Float),
            UniformFieldDesc::new("u", UniformType::UInt),
        ]));
        block.set_float("f", std::f32::consts::PI).unwrap();
        block.set_uint("u", 0xDEAD_BEEF).unwrap();
        assert_eq!(
            block.get_float("f").unwrap().to_bits(),
            std::f32::consts::PI.to_bits()
        );
        assert_eq!(block.get_uint("u").unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn vector_round_trips() {
        let mut block = UniformBlock::new(layout(&[
            UniformFieldDesc::new("a", UniformType::Vec2),
            UniformFieldDesc::new("b", UniformType::Vec3),
            UniformFieldDesc::new("c", UniformType::Vec4),
        ]));
        block.set_vec2("a", Vec2::new(1.5, -2.5)).unwrap();
        block.set_vec3("b", Vec3::new(0.1, 0.2, 0.3)).unwrap();
        block.set_vec4("c", Vec4::new(9.0, 8.0, 7.0, 6.0)).unwrap();
        assert_eq!(block.get_vec2("a").unwrap(), Vec2::new(1.5, -2.5));
        assert_eq!(block.get_vec3("b").unwrap(), Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(block.get_vec4("c").unwrap(), Vec4::new(9.0, 8.0, 7.0, 6.0));
    }

    #[test]
    fn mat3_columns_leave_pad_bytes_untouched() {
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::new(
            "m",
            UniformType::Mat3,
        )]));
        let m = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        block.set_mat3("m", &m).unwrap();

        // The 4-byte gap after each 12-byte column must stay zero.
        let bytes = block.bytes();
        assert_eq!(&bytes[12..16], &[0; 4]);
        assert_eq!(&bytes[28..32], &[0; 4]);
        assert_eq!(&bytes[44..48], &[0; 4]);

        assert_eq!(block.get_mat3("m").unwrap(), m);
    }

    #[test]
    fn mat4_round_trip() {
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::new(
            "mvp",
            UniformType::Mat4,
        )]));
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        block.set_mat4("mvp", &m).unwrap();
        assert_eq!(block.get_mat4("mvp").unwrap(), m);
    }

    #[test]
    fn array_element_access() {
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::array(
            "colors",
            UniformType::Vec4,
            4,
        )]));
        block
            .set_vec4_at("colors", 2, Vec4::new(0.0, 1.0, 0.0, 1.0))
            .unwrap();
        assert_eq!(
            block.get_vec4_at("colors", 2).unwrap(),
            Vec4::new(0.0, 1.0, 0.0, 1.0)
        );
        // Neighboring elements are unaffected.
        assert_eq!(block.get_vec4_at("colors", 1).unwrap(), Vec4::ZERO);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::new(
            "m",
            UniformType::Mat4,
        )]));
        let err = block.set_vec4("m", Vec4::ZERO).unwrap_err();
        assert_eq!(
            err,
            UniformError::TypeMismatch {
                field: "m".to_string(),
                declared: UniformType::Mat4,
                requested: UniformType::Vec4,
            }
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let block = UniformBlock::new(layout(&[]));
        assert_eq!(
            block.get_float("missing").unwrap_err(),
            UniformError::FieldNotFound {
                field: "missing".to_string()
            }
        );
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::array(
            "w",
            UniformType::Float,
            2,
        )]));
        let err = block.set_float_at("w", 2, 1.0).unwrap_err();
        assert_eq!(
            err,
            UniformError::IndexOutOfBounds {
                field: "w".to_string(),
                index: 2,
                len: 2,
            }
        );
        // A plain field only exposes element 0.
        let mut block = UniformBlock::new(layout(&[UniformFieldDesc::new(
            "s",
            UniformType::Float,
        )]));
        assert!(block.set_float_at("s", 1, 1.0).is_err());
    }
}
