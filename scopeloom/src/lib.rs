//! Build SCope-compatible `.loom` files from annotated single-cell matrices.
//!
//! This crate provides:
//!
//! - **Source data**: [`AnnData`] with a dense or sparse [`MatrixData`] and
//!   typed [`ColumnData`] metadata
//! - **Builder**: [`Loom`], which ingests a matrix, registers embeddings,
//!   annotations and metrics, and keeps every viewer attribute in sync
//! - **Metadata registry**: [`MetaData`], serialized as compressed JSON
//! - **Writers**: the [`ContainerWriter`] trait, an in-memory
//!   [`MemoryWriter`], and (with `hdf5-io`) the HDF5 `LoomWriter`
//!
//! # Quick start
//!
//! ```
//! use std::collections::BTreeMap;
//! use scopeloom::{Loom, MatrixData, MemoryWriter, Table};
//! use scopeloom_core::Summarizable;
//!
//! let mut loom = Loom::new("demo", ["lab", "tissue", ""]).unwrap();
//! let x = MatrixData::Dense(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
//! let genes = Table::new(vec!["g1".into(), "g2".into()]);
//! let cells = Table::new(vec!["c1".into(), "c2".into(), "c3".into()]);
//! loom.ingest(x, genes, cells, BTreeMap::new()).unwrap();
//!
//! let dir = tempfile::tempdir().unwrap();
//! loom.persist_with(dir.path().join("demo.loom"), &MemoryWriter::new()).unwrap();
//! assert_eq!(
//!     loom.summary(),
//!     "Loom 'demo': 2 genes \u{00d7} 3 cells, 0 embeddings, 0 annotations, 0 metrics"
//! );
//! ```

pub mod attrs;
pub mod codec;
pub mod keys;
pub mod loom;
pub mod meta;
pub mod single_cell;
pub mod sparse;
pub mod structured;
pub mod table;
pub mod writer;
#[cfg(feature = "hdf5-io")]
mod hdf5_util;
#[cfg(feature = "hdf5-io")]
pub mod h5ad;
#[cfg(feature = "hdf5-io")]
pub mod loom_file;

pub use attrs::{AttrMap, AttrValue, GlobalAttrs, GlobalValue};
pub use codec::{compress_encode, decode_decompress, table_to_structured_array};
pub use keys::{ReservedKey, MAX_ANNOTATION_VALUES};
pub use loom::{Hierarchy, Loom};
pub use meta::{AnnotationMeta, EmbeddingMeta, MetaData, MetricMeta};
pub use single_cell::{AnnData, ColumnData, MatrixData};
pub use sparse::SparseMatrix;
pub use structured::{Scalar, ScalarType, StructuredArray};
pub use table::Table;
pub use writer::{ContainerWriter, MemoryWriter, WriterConfig};
#[cfg(feature = "hdf5-io")]
pub use h5ad::{read_h5ad, write_h5ad};
#[cfg(feature = "hdf5-io")]
pub use loom_file::LoomWriter;
