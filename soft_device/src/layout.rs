//! Record schemas: an ordered list of semantically-tagged fields packed into
//! a contiguous byte block, plus typed views over one such block.

use std::ops::Range;

use bytemuck::{bytes_of, pod_read_unaligned, Pod};
use thiserror::Error;

use crate::semantic::Semantic;
use crate::types::{ScalarType, TypeError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate semantic {0}")]
    DuplicateSemantic(Semantic),
    #[error("port type mismatch for {semantic}: upstream {upstream:?}, downstream {downstream:?}")]
    TypeMismatch {
        semantic: Semantic,
        upstream: ScalarType,
        downstream: ScalarType,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub semantic: Semantic,
    pub ty: ScalarType,
    pub offset: usize,
    pub width: usize,
}

/// Schema of a packed record. Fields are laid out in declaration order with
/// no padding; each semantic may appear at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordLayout {
    fields: Vec<Field>,
    size: usize,
}

impl RecordLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field and returns its index.
    ///
    /// Fails on a repeated semantic or on a type that cannot be stored in a
    /// record (`Half`, `Sampler2D`, `Texture2D`).
    pub fn push(&mut self, semantic: Semantic, ty: ScalarType) -> Result<usize, SchemaError> {
        if self.position(semantic).is_some() {
            return Err(SchemaError::DuplicateSemantic(semantic));
        }

        let width = ty.size()?;
        self.fields.push(Field {
            semantic,
            ty,
            offset: self.size,
            width,
        });
        self.size += width;

        Ok(self.fields.len() - 1)
    }

    /// Index of the field tagged `semantic`, or `None` when absent. This is
    /// how higher layers probe a schema for optional attributes.
    pub fn position(&self, semantic: Semantic) -> Option<usize> {
        self.fields.iter().position(|f| f.semantic == semantic)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Byte range of field `index` within a record.
    pub fn field_range(&self, index: usize) -> Range<usize> {
        let field = &self.fields[index];
        field.offset..field.offset + field.width
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Total record size: the sum of all field widths.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn reset(&mut self) {
        self.fields.clear();
        self.size = 0;
    }
}

/// Immutable view of one record.
#[derive(Copy, Clone, Debug)]
pub struct RecordRef<'a> {
    pub(crate) layout: &'a RecordLayout,
    pub(crate) bytes: &'a [u8],
}

impl<'a> RecordRef<'a> {
    pub fn new(layout: &'a RecordLayout, bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len(), layout.size());
        Self { layout, bytes }
    }

    pub fn layout(&self) -> &'a RecordLayout {
        self.layout
    }

    pub fn field_bytes(&self, index: usize) -> &'a [u8] {
        &self.bytes[self.layout.field_range(index)]
    }

    pub fn read<T: Pod>(&self, index: usize) -> Result<T, TypeError> {
        let bytes = self.field_bytes(index);
        if bytes.len() != size_of::<T>() {
            return Err(TypeError::SizeMismatch {
                expected: size_of::<T>(),
                found: bytes.len(),
            });
        }
        Ok(pod_read_unaligned(bytes))
    }
}

/// Mutable view of one record.
#[derive(Debug)]
pub struct RecordMut<'a> {
    pub(crate) layout: &'a RecordLayout,
    pub(crate) bytes: &'a mut [u8],
}

impl<'a> RecordMut<'a> {
    pub fn new(layout: &'a RecordLayout, bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), layout.size());
        Self { layout, bytes }
    }

    pub fn field_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let range = self.layout.field_range(index);
        &mut self.bytes[range]
    }

    pub fn read<T: Pod>(&self, index: usize) -> Result<T, TypeError> {
        RecordRef {
            layout: self.layout,
            bytes: &*self.bytes,
        }
        .read(index)
    }

    pub fn write<T: Pod>(&mut self, index: usize, value: T) -> Result<(), TypeError> {
        let bytes = self.field_bytes_mut(index);
        if bytes.len() != size_of::<T>() {
            return Err(TypeError::SizeMismatch {
                expected: bytes.len(),
                found: size_of::<T>(),
            });
        }
        bytes.copy_from_slice(bytes_of(&value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::{RecordLayout, RecordMut, SchemaError};
    use crate::semantic::Semantic;
    use crate::types::ScalarType;

    #[test]
    fn offsets_are_packed() {
        let mut layout = RecordLayout::new();
        layout.push(Semantic::SV_POSITION, ScalarType::Float4).unwrap();
        layout.push(Semantic::COLOR0, ScalarType::Float3).unwrap();
        layout.push(Semantic::TEXCOORD0, ScalarType::Float2).unwrap();

        assert_eq!(layout.field_range(0), 0..16);
        assert_eq!(layout.field_range(1), 16..28);
        assert_eq!(layout.field_range(2), 28..36);
        assert_eq!(layout.size(), 36);
    }

    #[test]
    fn duplicate_semantic_is_rejected() {
        let mut layout = RecordLayout::new();
        layout.push(Semantic::COLOR0, ScalarType::Float3).unwrap();

        assert_eq!(
            layout.push(Semantic::COLOR0, ScalarType::Float4),
            Err(SchemaError::DuplicateSemantic(Semantic::COLOR0))
        );
    }

    #[test]
    fn absent_semantic_probes_as_none() {
        let mut layout = RecordLayout::new();
        layout.push(Semantic::POSITION0, ScalarType::Float3).unwrap();

        assert_eq!(layout.position(Semantic::POSITION0), Some(0));
        assert_eq!(layout.position(Semantic::TEXCOORD0), None);
    }

    #[test]
    fn half_is_rejected_at_registration() {
        let mut layout = RecordLayout::new();
        assert!(layout.push(Semantic::TEXCOORD0, ScalarType::Half).is_err());
        assert_eq!(layout.num_fields(), 0);
    }

    #[test]
    fn reset_empties_the_schema() {
        let mut layout = RecordLayout::new();
        layout.push(Semantic::POSITION0, ScalarType::Float3).unwrap();
        layout.reset();

        assert_eq!(layout.size(), 0);
        assert_eq!(layout.num_fields(), 0);
    }

    #[test]
    fn record_field_round_trip() {
        let mut layout = RecordLayout::new();
        layout.push(Semantic::SV_POSITION, ScalarType::Float4).unwrap();
        layout.push(Semantic::NORMAL0, ScalarType::Float3).unwrap();

        let mut storage = vec![0u8; layout.size()];
        let mut record = RecordMut::new(&layout, &mut storage);
        record.write(0, Vec4::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        record.write(1, Vec3::new(5.0, 6.0, 7.0)).unwrap();

        assert_eq!(record.read::<Vec4>(0).unwrap(), Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(record.read::<Vec3>(1).unwrap(), Vec3::new(5.0, 6.0, 7.0));
    }
}
