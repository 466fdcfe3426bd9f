//! HDF5 plumbing shared by the `.h5ad` reader/writer and the loom writer.

use std::str::FromStr;

use hdf5::types::{TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, Group, H5Type};

use scopeloom_core::{LoomError, Result};

use crate::single_cell::ColumnData;

pub(crate) fn h5err(e: hdf5::Error) -> LoomError {
    LoomError::Container(format!("HDF5 error: {e}"))
}

/// Convert to an HDF5 variable-length string; interior NULs are rejected.
pub(crate) fn unicode(s: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(s)
        .map_err(|e| LoomError::InvalidInput(format!("cannot store '{s}' as HDF5 string: {e}")))
}

/// Write a VarLenUnicode scalar attribute on any HDF5 location.
/// Uses a macro because Group, Dataset, etc. all expose `new_attr` via Deref
/// chains but don't share a single trait that function generics can bind on.
macro_rules! write_attr_str {
    ($loc:expr, $key:expr, $val:expr) => {{
        $crate::hdf5_util::unicode($val).and_then(|s| {
            $loc.new_attr::<hdf5::types::VarLenUnicode>()
                .create($key)
                .and_then(|attr| attr.write_scalar(&s))
                .map_err($crate::hdf5_util::h5err)
        })
    }};
}
pub(crate) use write_attr_str;

/// Read a scalar string attribute, if present.
pub(crate) fn read_attr_str(group: &Group, key: &str) -> Option<String> {
    group
        .attr(key)
        .ok()
        .and_then(|a| a.read_scalar::<VarLenUnicode>().ok())
        .map(|s| s.as_str().to_string())
}

pub(crate) fn write_strings(group: &Group, name: &str, values: &[String]) -> Result<Dataset> {
    let unicode: Vec<VarLenUnicode> = values.iter().map(|s| unicode(s)).collect::<Result<_>>()?;
    write_1d(group, name, &unicode)
}

pub(crate) fn write_1d<T: H5Type>(group: &Group, name: &str, values: &[T]) -> Result<Dataset> {
    group
        .new_dataset_builder()
        .with_data(ndarray::ArrayView1::from(values))
        .create(name)
        .map_err(h5err)
}

/// Write a row-major table as a 2D `f64` dataset.
pub(crate) fn write_matrix_2d(group: &Group, name: &str, rows: &[Vec<f64>]) -> Result<Dataset> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, |r| r.len());
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let arr = ndarray::Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| LoomError::InvalidInput(format!("'{name}' shape error: {e}")))?;
    group
        .new_dataset_builder()
        .with_data(&arr)
        .create(name)
        .map_err(h5err)
}

/// Write a 1D column. Categorical columns are expanded to their labels.
pub(crate) fn write_column(group: &Group, name: &str, col: &ColumnData) -> Result<Dataset> {
    match col {
        ColumnData::Strings(v) => write_strings(group, name, v),
        ColumnData::Numeric(v) => write_1d(group, name, v),
        ColumnData::Integers(v) => write_1d(group, name, v),
        ColumnData::Booleans(v) => write_1d(group, name, v),
        ColumnData::Categorical { codes, categories } => write_strings(
            group,
            name,
            &ColumnData::decode_categories(codes, categories),
        ),
    }
}

pub(crate) fn read_strings(ds: &Dataset) -> Result<Vec<String>> {
    Ok(ds
        .read_1d::<VarLenUnicode>()
        .map_err(h5err)?
        .iter()
        .map(|s| s.as_str().to_string())
        .collect())
}

pub(crate) fn read_matrix_2d(ds: &Dataset) -> Result<Vec<Vec<f64>>> {
    let arr = ds.read_2d::<f64>().map_err(h5err)?;
    Ok(arr.rows().into_iter().map(|r| r.to_vec()).collect())
}

/// Read a 1D dataset into the column variant matching its element type.
pub(crate) fn read_column(ds: &Dataset) -> Result<ColumnData> {
    let desc = ds
        .dtype()
        .and_then(|t| t.to_descriptor())
        .map_err(h5err)?;
    match desc {
        TypeDescriptor::Float(_) => Ok(ColumnData::Numeric(
            ds.read_1d::<f64>().map_err(h5err)?.to_vec(),
        )),
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Ok(ColumnData::Integers(
            ds.read_1d::<i64>().map_err(h5err)?.to_vec(),
        )),
        TypeDescriptor::Boolean => Ok(ColumnData::Booleans(
            ds.read_1d::<bool>().map_err(h5err)?.to_vec(),
        )),
        TypeDescriptor::VarLenUnicode
        | TypeDescriptor::VarLenAscii
        | TypeDescriptor::FixedUnicode(_)
        | TypeDescriptor::FixedAscii(_) => Ok(ColumnData::Strings(read_strings(ds)?)),
        other => Err(LoomError::InvalidInput(format!(
            "unsupported column element type {other:?}"
        ))),
    }
}
