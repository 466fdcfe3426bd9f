//! Fixed-layout record arrays.
//!
//! A [`StructuredArray`] holds N records that share one packed layout: each
//! field has a name, a fixed-width scalar type and a byte offset. Records are
//! stored back to back in native byte order, which is exactly the memory image
//! an HDF5 compound dataset is written from.

use std::collections::HashSet;

use scopeloom_core::{LoomError, Result};

/// Fixed-width element types a record field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Float64,
    Int64,
    Bool,
}

impl ScalarType {
    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            ScalarType::Float64 | ScalarType::Int64 => 8,
            ScalarType::Bool => 1,
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float64(f64),
    Int64(i64),
    Bool(bool),
}

impl Scalar {
    pub fn dtype(&self) -> ScalarType {
        match self {
            Scalar::Float64(_) => ScalarType::Float64,
            Scalar::Int64(_) => ScalarType::Int64,
            Scalar::Bool(_) => ScalarType::Bool,
        }
    }

    /// Numeric view of the value; booleans map to 0.0 / 1.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Float64(v) => v,
            Scalar::Int64(v) => v as f64,
            Scalar::Bool(b) => f64::from(u8::from(b)),
        }
    }
}

/// One named field of the record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub dtype: ScalarType,
    pub offset: usize,
}

/// An array of packed fixed-layout records.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredArray {
    fields: Vec<Field>,
    record_size: usize,
    len: usize,
    data: Vec<u8>,
}

impl StructuredArray {
    /// A zero-filled array of `len` records with the given field layout.
    ///
    /// Fields are packed in the given order without padding.
    pub fn new(layout: Vec<(String, ScalarType)>, len: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(layout.len());
        let mut offset = 0;
        for (name, dtype) in layout {
            if !seen.insert(name.clone()) {
                return Err(LoomError::InvalidInput(format!(
                    "duplicate field name '{name}' in record layout"
                )));
            }
            fields.push(Field {
                name,
                dtype,
                offset,
            });
            offset += dtype.size();
        }
        Ok(Self {
            fields,
            record_size: offset,
            len,
            data: vec![0u8; offset * len],
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes per record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// The record layout in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names in layout order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The packed record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Write one field of one record. The value type must match the field.
    pub fn set(&mut self, record: usize, field: usize, value: Scalar) -> Result<()> {
        let f = self.fields.get(field).ok_or_else(|| {
            LoomError::InvalidInput(format!("field {field} out of range"))
        })?;
        if record >= self.len {
            return Err(LoomError::InvalidInput(format!(
                "record {record} out of range for {} records",
                self.len
            )));
        }
        if f.dtype != value.dtype() {
            return Err(LoomError::InvalidInput(format!(
                "field '{}' holds {:?}, got {:?}",
                f.name,
                f.dtype,
                value.dtype()
            )));
        }
        let start = record * self.record_size + f.offset;
        match value {
            Scalar::Float64(v) => self.data[start..start + 8].copy_from_slice(&v.to_ne_bytes()),
            Scalar::Int64(v) => self.data[start..start + 8].copy_from_slice(&v.to_ne_bytes()),
            Scalar::Bool(b) => self.data[start] = u8::from(b),
        }
        Ok(())
    }

    /// Read one field of one record.
    pub fn get(&self, record: usize, name: &str) -> Option<Scalar> {
        let f = self.field(name)?;
        if record >= self.len {
            return None;
        }
        let start = record * self.record_size + f.offset;
        let bytes = &self.data[start..start + f.dtype.size()];
        Some(match f.dtype {
            ScalarType::Float64 => Scalar::Float64(f64::from_ne_bytes(bytes.try_into().ok()?)),
            ScalarType::Int64 => Scalar::Int64(i64::from_ne_bytes(bytes.try_into().ok()?)),
            ScalarType::Bool => Scalar::Bool(bytes[0] != 0),
        })
    }

    /// All values of one field as f64, in record order.
    pub fn column_f64(&self, name: &str) -> Option<Vec<f64>> {
        self.field(name)?;
        (0..self.len)
            .map(|i| self.get(i, name).map(|s| s.as_f64()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layout_offsets() {
        let arr = StructuredArray::new(
            vec![
                ("a".into(), ScalarType::Bool),
                ("b".into(), ScalarType::Float64),
                ("c".into(), ScalarType::Int64),
            ],
            3,
        )
        .unwrap();
        let offsets: Vec<usize> = arr.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, [0, 1, 9]);
        assert_eq!(arr.record_size(), 17);
        assert_eq!(arr.as_bytes().len(), 51);
    }

    #[test]
    fn set_and_get_values() {
        let mut arr = StructuredArray::new(
            vec![("x".into(), ScalarType::Float64), ("k".into(), ScalarType::Int64)],
            2,
        )
        .unwrap();
        arr.set(1, 0, Scalar::Float64(-2.5)).unwrap();
        arr.set(1, 1, Scalar::Int64(42)).unwrap();
        assert_eq!(arr.get(1, "x"), Some(Scalar::Float64(-2.5)));
        assert_eq!(arr.get(1, "k"), Some(Scalar::Int64(42)));
        assert_eq!(arr.get(0, "x"), Some(Scalar::Float64(0.0)));
        assert_eq!(arr.column_f64("x"), Some(vec![0.0, -2.5]));
        assert_eq!(arr.get(2, "x"), None);
        assert_eq!(arr.get(0, "missing"), None);
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut arr = StructuredArray::new(vec![("x".into(), ScalarType::Float64)], 1).unwrap();
        assert!(arr.set(0, 0, Scalar::Bool(true)).is_err());
        assert!(arr.set(1, 0, Scalar::Float64(1.0)).is_err());
        assert!(arr.set(0, 3, Scalar::Float64(1.0)).is_err());
    }

    #[test]
    fn duplicate_field_names_rejected() {
        let layout = vec![("x".into(), ScalarType::Float64), ("x".into(), ScalarType::Int64)];
        assert!(StructuredArray::new(layout, 1).is_err());
    }
}
