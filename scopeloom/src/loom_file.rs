//! HDF5-backed `.loom` writer.
//!
//! Layout written:
//!
//! ```text
//! /matrix          genes × cells, f32, chunked + gzip
//! /layers          (empty)
//! /row_attrs/*     one dataset per row attribute
//! /col_attrs/*     one dataset per column attribute
//! /row_graphs      (empty)
//! /col_graphs      (empty)
//! @<global>        one string attribute per global attribute
//! ```
//!
//! Structured attributes become compound datasets whose member names and
//! offsets follow the record layout. Requires the `hdf5-io` feature flag and
//! a system HDF5 library installation.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::Path;

use hdf5::types::{CompoundField, CompoundType, FloatSize, IntSize, TypeDescriptor};
use hdf5::{Datatype, File, Group};
use tracing::{debug, warn};

use scopeloom_core::{LoomError, Result};

use crate::attrs::{AttrMap, AttrValue};
use crate::hdf5_util::{h5err, write_attr_str, write_column, write_matrix_2d};
use crate::single_cell::MatrixData;
use crate::structured::{ScalarType, StructuredArray};
use crate::writer::{ContainerWriter, WriterConfig};

/// Writes containers as `.loom` (HDF5) files.
#[derive(Debug, Clone, Default)]
pub struct LoomWriter {
    config: WriterConfig,
}

impl LoomWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

impl ContainerWriter for LoomWriter {
    fn write(
        &self,
        path: &Path,
        matrix: &MatrixData,
        row_attrs: &AttrMap,
        col_attrs: &AttrMap,
        global_attrs: &BTreeMap<String, String>,
    ) -> Result<()> {
        let file = File::create(path).map_err(|e| {
            LoomError::Container(format!("cannot create loom file {}: {e}", path.display()))
        })?;

        write_main_matrix(&file, matrix, &self.config)?;
        for name in ["layers", "row_graphs", "col_graphs"] {
            file.create_group(name).map_err(h5err)?;
        }

        let rows = file.create_group("row_attrs").map_err(h5err)?;
        for (name, value) in row_attrs {
            write_attr(&rows, name, value)?;
        }
        let cols = file.create_group("col_attrs").map_err(h5err)?;
        for (name, value) in col_attrs {
            write_attr(&cols, name, value)?;
        }

        for (key, value) in global_attrs {
            write_attr_str!(file, key.as_str(), value.as_str())?;
        }
        if !global_attrs.contains_key("LOOM_SPEC_VERSION") {
            write_attr_str!(file, "LOOM_SPEC_VERSION", self.config.spec_version.as_str())?;
        }

        debug!(
            path = %path.display(),
            row_attrs = row_attrs.len(),
            col_attrs = col_attrs.len(),
            "loom file written"
        );
        Ok(())
    }
}

/// Write `/matrix` as f32, one band of `chunk_size` rows at a time.
fn write_main_matrix(file: &File, matrix: &MatrixData, config: &WriterConfig) -> Result<()> {
    let (n_rows, n_cols) = matrix.shape();
    let step = config.chunk_size.max(1);

    let mut builder = file.new_dataset::<f32>().shape((n_rows, n_cols));
    if n_rows > 0 && n_cols > 0 {
        builder = builder
            .chunk((n_rows.min(step), n_cols.min(step)))
            .deflate(config.compression_level);
    }
    let ds = builder.create("matrix").map_err(h5err)?;

    for start in (0..n_rows).step_by(step) {
        let end = (start + step).min(n_rows);
        let block = match matrix {
            MatrixData::Dense(rows) => f32_block(&rows[start..end], n_cols)?,
            MatrixData::Sparse(sm) => f32_block(&sm.dense_rows(start, end), n_cols)?,
        };
        ds.write_slice(&block, ndarray::s![start..end, ..])
            .map_err(h5err)?;
    }
    Ok(())
}

fn f32_block(rows: &[Vec<f64>], n_cols: usize) -> Result<ndarray::Array2<f32>> {
    let flat: Vec<f32> = rows
        .iter()
        .flat_map(|r| r.iter().map(|&v| v as f32))
        .collect();
    ndarray::Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|e| LoomError::InvalidInput(format!("matrix shape error: {e}")))
}

fn write_attr(group: &Group, name: &str, value: &AttrValue) -> Result<()> {
    match value {
        AttrValue::Column(col) => write_column(group, name, col).map(drop),
        AttrValue::Matrix(rows) => write_matrix_2d(group, name, rows).map(drop),
        AttrValue::Structured(arr) => write_structured(group, name, arr),
    }
}

/// HDF5 compound type mirroring the packed record layout.
fn compound_descriptor(arr: &StructuredArray) -> TypeDescriptor {
    let fields = arr
        .fields()
        .iter()
        .enumerate()
        .map(|(index, f)| CompoundField {
            name: f.name.clone(),
            ty: match f.dtype {
                ScalarType::Float64 => TypeDescriptor::Float(FloatSize::U8),
                ScalarType::Int64 => TypeDescriptor::Integer(IntSize::U8),
                ScalarType::Bool => TypeDescriptor::Boolean,
            },
            offset: f.offset,
            index,
        })
        .collect();
    TypeDescriptor::Compound(CompoundType {
        fields,
        size: arr.record_size(),
    })
}

fn write_structured(group: &Group, name: &str, arr: &StructuredArray) -> Result<()> {
    if arr.fields().is_empty() {
        warn!(name, "skipping structured attribute without fields");
        return Ok(());
    }
    let desc = compound_descriptor(arr);
    let dtype = Datatype::from_descriptor(&desc).map_err(h5err)?;
    let ds = group
        .new_dataset_builder()
        .empty_as(&desc)
        .shape(arr.len())
        .create(name)
        .map_err(h5err)?;
    if arr.is_empty() {
        return Ok(());
    }

    // SAFETY: the buffer holds `len` packed records laid out exactly as
    // `dtype` describes, and both ids stay alive for the duration of the call.
    let status = unsafe {
        hdf5_sys::h5d::H5Dwrite(
            ds.id(),
            dtype.id(),
            hdf5_sys::h5s::H5S_ALL,
            hdf5_sys::h5s::H5S_ALL,
            hdf5_sys::h5p::H5P_DEFAULT,
            arr.as_bytes().as_ptr() as *const c_void,
        )
    };
    if status < 0 {
        return Err(LoomError::Container(format!(
            "failed to write compound dataset '{name}'"
        )));
    }
    Ok(())
}
