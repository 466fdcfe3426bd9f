//! Attribute namespaces handed to a container writer.

use std::collections::BTreeMap;

use crate::meta::MetaData;
use crate::single_cell::ColumnData;
use crate::structured::StructuredArray;

/// One row or column attribute, aligned with the matrix rows (genes) or
/// columns (cells).
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A 1D typed column.
    Column(ColumnData),
    /// A 2D numeric table with one row per element, e.g. raw coordinates.
    Matrix(Vec<Vec<f64>>),
    /// Fixed-layout records, e.g. the embedding attributes.
    Structured(StructuredArray),
}

impl AttrValue {
    /// Number of aligned elements.
    pub fn len(&self) -> usize {
        match self {
            AttrValue::Column(c) => c.len(),
            AttrValue::Matrix(m) => m.len(),
            AttrValue::Structured(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_column(&self) -> Option<&ColumnData> {
        match self {
            AttrValue::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Vec<Vec<f64>>> {
        match self {
            AttrValue::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredArray> {
        match self {
            AttrValue::Structured(s) => Some(s),
            _ => None,
        }
    }
}

/// Row or column attributes by name.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A file-level attribute as held by the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalValue {
    Text(String),
    /// Kept structured until persisting, where it is compressed to text.
    MetaData(MetaData),
}

/// File-level attributes by name.
pub type GlobalAttrs = BTreeMap<String, GlobalValue>;
