//! Incremental builder for SCope-compatible `.loom` files.
//!
//! [`Loom`] owns the matrix, the row/column/global attribute namespaces and
//! the metadata registry. Ingestion and every `add_*_from_column` or
//! embedding call end with [`Loom::refresh`]. [`Loom::persist_with`] derives
//! the written attributes from the current state, so a persist reflects all
//! prior mutations, including `add_annotation_meta`/`add_metric_meta` calls
//! that did not refresh.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use scopeloom::loom::Loom;
//! use scopeloom::single_cell::MatrixData;
//! use scopeloom::table::Table;
//! use scopeloom::writer::MemoryWriter;
//!
//! let mut loom = Loom::new("pbmc", ["10x", "blood", ""]).unwrap();
//! let matrix = MatrixData::Dense(vec![vec![1.0, 0.0], vec![0.0, 2.0]]);
//! let genes = Table::new(vec!["CD3E".into(), "MS4A1".into()]);
//! let cells = Table::new(vec!["c1".into(), "c2".into()]);
//! let coords = BTreeMap::from([("tsne".to_string(), vec![vec![0.5, 1.5], vec![2.5, 3.5]])]);
//! loom.ingest(matrix, genes, cells, coords).unwrap();
//! loom.add_embedding_from_column("tsne", "t-SNE", true, false).unwrap();
//!
//! let dir = tempfile::tempdir().unwrap();
//! let writer = MemoryWriter::new();
//! loom.persist_with(dir.path().join("pbmc.loom"), &writer).unwrap();
//! assert_eq!(loom.meta_data().embeddings[0].id, "0");
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use scopeloom_core::{LoomError, Result, Summarizable};

use crate::attrs::{AttrMap, AttrValue, GlobalAttrs, GlobalValue};
use crate::codec::{compress_encode, table_to_structured_array};
use crate::keys::{ReservedKey, DEFAULT_X, DEFAULT_Y, MAX_ANNOTATION_VALUES};
use crate::meta::MetaData;
use crate::single_cell::{AnnData, ColumnData, MatrixData};
use crate::table::Table;
use crate::writer::ContainerWriter;

/// The three-level path a file is filed under in the viewer's browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy([String; 3]);

impl Hierarchy {
    /// Exactly three segments are required; empty strings are allowed.
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Result<Self> {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let n = segments.len();
        let segments: [String; 3] = segments
            .try_into()
            .map_err(|_| LoomError::InvalidHierarchy(n))?;
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String; 3] {
        &self.0
    }
}

/// Mutable loom under construction.
#[derive(Debug, Clone)]
pub struct Loom {
    title: String,
    hierarchy: Hierarchy,
    /// Genes × cells once ingested.
    matrix: Option<MatrixData>,
    row_attrs: AttrMap,
    row_index: Vec<String>,
    col_attrs: AttrMap,
    col_index: Vec<String>,
    global_attrs: GlobalAttrs,
    meta_data: MetaData,
    /// Default layout, columns `_X`/`_Y`.
    embedding: Table,
    /// One column per registered embedding id.
    embeddings_x: Table,
    embeddings_y: Table,
    /// Slot the default embedding occupies in the extra tables.
    default_id: Option<usize>,
}

impl Loom {
    /// Create an empty builder.
    ///
    /// # Errors
    ///
    /// Returns [`LoomError::InvalidHierarchy`] unless `hierarchy` has exactly
    /// three segments.
    pub fn new<S: Into<String>>(
        title: impl Into<String>,
        hierarchy: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        Ok(Self {
            title: title.into(),
            hierarchy: Hierarchy::new(hierarchy)?,
            matrix: None,
            row_attrs: AttrMap::new(),
            row_index: Vec::new(),
            col_attrs: AttrMap::new(),
            col_index: Vec::new(),
            global_attrs: GlobalAttrs::new(),
            meta_data: MetaData::default(),
            embedding: Table::default(),
            embeddings_x: Table::default(),
            embeddings_y: Table::default(),
            default_id: None,
        })
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Load a cells × genes matrix with its gene table, cell table and named
    /// coordinate sources.
    ///
    /// Each coordinate source needs one row per cell and at least two
    /// columns; only the first two are kept. The matrix is stored transposed
    /// (genes × cells). Any previously registered metadata is reset.
    pub fn ingest(
        &mut self,
        matrix: MatrixData,
        row_table: Table,
        column_table: Table,
        embeddings: BTreeMap<String, Vec<Vec<f64>>>,
    ) -> Result<()> {
        matrix.check_rectangular()?;
        let (n_cells, n_genes) = matrix.shape();
        if n_cells != column_table.n_rows() || (n_cells > 0 && n_genes != row_table.n_rows()) {
            return Err(LoomError::InvalidInput(format!(
                "matrix shape ({n_cells}, {n_genes}) does not match {} cells \u{00d7} {} genes",
                column_table.n_rows(),
                row_table.n_rows()
            )));
        }
        for (name, coords) in &embeddings {
            check_coordinates(name, coords, n_cells)?;
        }

        debug!("setting the row attributes");
        let mut row_attrs = table_attrs(&row_table);
        row_attrs.insert(
            ReservedKey::VarNames.as_str().to_string(),
            AttrValue::Column(ColumnData::Strings(row_table.index().to_vec())),
        );

        debug!("setting the column attributes");
        let mut col_attrs = table_attrs(&column_table);
        col_attrs.insert(
            ReservedKey::ObsNames.as_str().to_string(),
            AttrValue::Column(ColumnData::Strings(column_table.index().to_vec())),
        );
        debug!(sources = embeddings.len(), "adding coordinate sources to the column attributes");
        for (name, coords) in embeddings {
            let first_two = coords.into_iter().map(|row| row[..2].to_vec()).collect();
            col_attrs.insert(name, AttrValue::Matrix(first_two));
        }

        let matrix = match matrix {
            MatrixData::Dense(rows) if rows.is_empty() => {
                MatrixData::Dense(vec![Vec::new(); row_table.n_rows()])
            }
            other => other.transpose(),
        };

        self.row_attrs = row_attrs;
        self.row_index = row_table.index().to_vec();
        self.col_attrs = col_attrs;
        self.col_index = column_table.index().to_vec();
        self.matrix = Some(matrix);
        self.init();
        self.refresh()
    }

    /// Ingest an [`AnnData`]: `var` and `obs` columns in key order, `obsm` as
    /// coordinate sources.
    pub fn from_anndata(&mut self, adata: &AnnData) -> Result<()> {
        let row_table = Table::from_columns(adata.var_names().to_vec(), sorted(adata.var_columns()))?;
        let column_table =
            Table::from_columns(adata.obs_names().to_vec(), sorted(adata.obs_columns()))?;
        let embeddings = adata
            .obsm_keys()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.ingest(adata.x().clone(), row_table, column_table, embeddings)
    }

    /// Read an `.h5ad` file and ingest it.
    #[cfg(feature = "hdf5-io")]
    pub fn from_h5ad<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        debug!(path = %path.as_ref().display(), "reading AnnData file");
        let adata = crate::h5ad::read_h5ad(path)?;
        self.from_anndata(&adata)
    }

    fn init(&mut self) {
        self.meta_data = MetaData::default();
        self.embedding = Table::new(self.col_index.clone());
        self.embeddings_x = Table::new(self.col_index.clone());
        self.embeddings_y = Table::new(self.col_index.clone());
        self.default_id = None;
    }

    fn ensure_ingested(&self) -> Result<&MatrixData> {
        self.matrix
            .as_ref()
            .ok_or_else(|| LoomError::InvalidInput("no data has been ingested".into()))
    }

    // -----------------------------------------------------------------------
    // Embeddings
    // -----------------------------------------------------------------------

    /// Number of non-default embeddings: columns of `Embeddings_X` minus the
    /// one the default embedding occupies. `-1` before anything is registered.
    ///
    /// # Errors
    ///
    /// Returns [`LoomError::InconsistentEmbeddings`] if the X and Y tables
    /// have different column counts.
    pub fn count_embeddings(&self) -> Result<i64> {
        let x = self.embeddings_x.n_cols();
        let y = self.embeddings_y.n_cols();
        if x != y {
            return Err(LoomError::InconsistentEmbeddings { x, y });
        }
        Ok(x as i64 - 1)
    }

    /// Id the next newly placed embedding receives.
    fn next_slot(&self) -> Result<usize> {
        Ok((self.count_embeddings()? + 1) as usize)
    }

    /// Insert or replace the `{id, name}` entry. Entries matching either the
    /// id or the name are dropped first; the new entry goes last.
    pub fn register_embedding_metadata(&mut self, id: i64, name: &str) {
        self.meta_data.register_embedding(&id.to_string(), name);
    }

    /// Register a 2D layout.
    ///
    /// A negative `id` marks the default embedding: it is written to the
    /// `Embedding` attribute and keeps a single slot in the extra tables
    /// across re-registrations. A non-negative `id` is not honored; the
    /// embedding is always placed in the next free slot.
    pub fn add_embedding(&mut self, id: i64, name: &str, embedding: &[Vec<f64>]) -> Result<()> {
        self.ensure_ingested()?;
        check_coordinates(name, embedding, self.col_index.len())?;

        let is_default = id < 0;
        let next = self.next_slot()?;
        let slot = if is_default {
            self.default_id.unwrap_or(next)
        } else {
            next
        };
        debug!(name, slot, is_default, "adding embedding");

        let xs = ColumnData::Numeric(embedding.iter().map(|r| r[0]).collect());
        let ys = ColumnData::Numeric(embedding.iter().map(|r| r[1]).collect());
        let key = slot.to_string();

        let mut default_table = self.embedding.clone();
        if is_default {
            default_table.set_column(DEFAULT_X, xs.clone())?;
            default_table.set_column(DEFAULT_Y, ys.clone())?;
        }
        let mut embeddings_x = self.embeddings_x.clone();
        let mut embeddings_y = self.embeddings_y.clone();
        embeddings_x.set_column(&key, xs)?;
        embeddings_y.set_column(&key, ys)?;

        self.register_embedding_metadata(slot as i64, name);
        if is_default {
            self.embedding = default_table;
            self.default_id = Some(slot);
        }
        self.embeddings_x = embeddings_x;
        self.embeddings_y = embeddings_y;
        self.refresh()
    }

    /// Register a layout by name, as the default or in the next free slot.
    pub fn add_embedding_by_name(
        &mut self,
        name: &str,
        embedding: &[Vec<f64>],
        is_default: bool,
    ) -> Result<()> {
        let id = if is_default {
            -1
        } else {
            self.next_slot()? as i64
        };
        self.add_embedding(id, name, embedding)
    }

    /// Register a coordinate column attribute as an embedding, optionally
    /// dropping the source attribute afterwards.
    pub fn add_embedding_from_column(
        &mut self,
        key: &str,
        name: &str,
        is_default: bool,
        remove_source: bool,
    ) -> Result<()> {
        debug!(key, "adding embedding from existing column attribute");
        let coords = match self.col_attrs.get(key) {
            Some(AttrValue::Matrix(m)) => m.clone(),
            Some(_) => {
                return Err(LoomError::InvalidInput(format!(
                    "column attribute '{key}' is not a 2D coordinate table"
                )))
            }
            None => {
                return Err(LoomError::MissingKey {
                    kind: "column attribute",
                    key: key.to_string(),
                })
            }
        };
        self.add_embedding_by_name(name, &coords, is_default)?;
        if remove_source {
            self.col_attrs.remove(key);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Annotations & metrics
    // -----------------------------------------------------------------------

    /// Register an annotation with the sorted distinct values of `values`.
    pub fn add_annotation_meta(&mut self, name: &str, values: &ColumnData) {
        if self.meta_data.annotation(name).is_some() {
            debug!(name, "replacing registered annotation");
        }
        self.meta_data
            .register_annotation(name, values.unique_labels());
    }

    /// Register a column attribute as an annotation.
    ///
    /// # Errors
    ///
    /// - [`LoomError::MissingKey`] if `key` is not a column attribute
    /// - [`LoomError::TooManyValues`] above 245 distinct values
    pub fn add_annotation_from_column(&mut self, key: &str) -> Result<()> {
        debug!(key, "adding annotation from existing column attribute");
        let values = self.column(key, "annotation")?.unique_labels();
        if values.len() > MAX_ANNOTATION_VALUES {
            return Err(LoomError::TooManyValues {
                key: key.to_string(),
                count: values.len(),
                limit: MAX_ANNOTATION_VALUES,
            });
        }
        self.meta_data.register_annotation(key, values);
        self.refresh()
    }

    /// Register a metric by name.
    pub fn add_metric_meta(&mut self, name: &str) {
        if self.meta_data.metric(name).is_some() {
            debug!(name, "replacing registered metric");
        }
        self.meta_data.register_metric(name);
    }

    /// Register a column attribute as a metric.
    pub fn add_metric_from_column(&mut self, key: &str) -> Result<()> {
        debug!(key, "adding metric from existing column attribute");
        self.column(key, "metric")?;
        self.add_metric_meta(key);
        self.refresh()
    }

    fn column(&self, key: &str, kind: &'static str) -> Result<&ColumnData> {
        match self.col_attrs.get(key) {
            Some(AttrValue::Column(c)) => Ok(c),
            Some(_) => Err(LoomError::InvalidInput(format!(
                "column attribute '{key}' is not a 1D column"
            ))),
            None => Err(LoomError::MissingKey {
                kind,
                key: key.to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Derived attributes & persistence
    // -----------------------------------------------------------------------

    /// Recompute the embedding attributes, the `Gene` identity and the global
    /// attributes from the current state.
    pub fn refresh(&mut self) -> Result<()> {
        let (row_attrs, col_attrs, global_attrs) = self.derived_attrs()?;
        self.row_attrs = row_attrs;
        self.col_attrs = col_attrs;
        self.global_attrs = global_attrs;
        Ok(())
    }

    /// Row, column and global attributes with every derived key rebuilt from
    /// the embedding tables, the row index, the title, the hierarchy and the
    /// metadata registry.
    fn derived_attrs(&self) -> Result<(AttrMap, AttrMap, GlobalAttrs)> {
        let mut row_attrs = self.row_attrs.clone();
        let mut col_attrs = self.col_attrs.clone();
        let mut global_attrs = self.global_attrs.clone();

        for (key, table) in [
            (ReservedKey::Embedding, &self.embedding),
            (ReservedKey::EmbeddingsX, &self.embeddings_x),
            (ReservedKey::EmbeddingsY, &self.embeddings_y),
        ] {
            col_attrs.insert(
                key.as_str().to_string(),
                AttrValue::Structured(table_to_structured_array(table)?),
            );
        }
        row_attrs.insert(
            ReservedKey::Gene.as_str().to_string(),
            AttrValue::Column(ColumnData::Strings(self.row_index.clone())),
        );

        global_attrs.insert(
            ReservedKey::Title.as_str().to_string(),
            GlobalValue::Text(self.title.clone()),
        );
        global_attrs.insert(
            ReservedKey::MetaData.as_str().to_string(),
            GlobalValue::MetaData(self.meta_data.clone()),
        );
        for (key, segment) in ReservedKey::HIERARCHY.iter().zip(self.hierarchy.segments()) {
            global_attrs.insert(key.as_str().to_string(), GlobalValue::Text(segment.clone()));
        }
        Ok((row_attrs, col_attrs, global_attrs))
    }

    /// The global attributes as they are written: derived from the current
    /// state, with the metadata registry replaced by its compressed,
    /// base64-encoded JSON.
    pub fn finalized_global_attrs(&self) -> Result<BTreeMap<String, String>> {
        let (_, _, global_attrs) = self.derived_attrs()?;
        finalize(&global_attrs)
    }

    /// Write the loom through `writer`, replacing any file at `path`.
    ///
    /// Every derived attribute is rebuilt from the current state first, so
    /// the file reflects all prior mutations whether or not [`Loom::refresh`]
    /// ran since. The builder is left untouched, so this can be called more
    /// than once. Deleting the old file and writing the new one is not atomic.
    pub fn persist_with<P, W>(&self, path: P, writer: &W) -> Result<()>
    where
        P: AsRef<Path>,
        W: ContainerWriter + ?Sized,
    {
        let path = path.as_ref();
        let matrix = self.ensure_ingested()?;
        let (row_attrs, col_attrs, global_attrs) = self.derived_attrs()?;
        let global_attrs = finalize(&global_attrs)?;

        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                LoomError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: {}", path.display(), e),
                ))
            })?;
        }
        info!(path = %path.display(), "saving the loom");
        writer.write(path, matrix, &row_attrs, &col_attrs, &global_attrs)
    }

    /// Write a `.loom` file with the default HDF5 writer.
    #[cfg(feature = "hdf5-io")]
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.persist_with(path, &crate::loom_file::LoomWriter::default())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// The genes × cells matrix, once ingested.
    pub fn matrix(&self) -> Option<&MatrixData> {
        self.matrix.as_ref()
    }

    pub fn row_attrs(&self) -> &AttrMap {
        &self.row_attrs
    }

    pub fn col_attrs(&self) -> &AttrMap {
        &self.col_attrs
    }

    pub fn global_attrs(&self) -> &GlobalAttrs {
        &self.global_attrs
    }

    pub fn row_index(&self) -> &[String] {
        &self.row_index
    }

    pub fn col_index(&self) -> &[String] {
        &self.col_index
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    /// The default embedding table (`_X`, `_Y`).
    pub fn embedding(&self) -> &Table {
        &self.embedding
    }

    pub fn embeddings_x(&self) -> &Table {
        &self.embeddings_x
    }

    pub fn embeddings_y(&self) -> &Table {
        &self.embeddings_y
    }
}

impl Summarizable for Loom {
    fn summary(&self) -> String {
        format!(
            "Loom '{}': {} genes \u{00d7} {} cells, {} embeddings, {} annotations, {} metrics",
            self.title,
            self.row_index.len(),
            self.col_index.len(),
            self.meta_data.embeddings.len(),
            self.meta_data.annotations.len(),
            self.meta_data.metrics.len(),
        )
    }
}

fn check_coordinates(name: &str, coords: &[Vec<f64>], n_cells: usize) -> Result<()> {
    if coords.len() != n_cells {
        return Err(LoomError::InvalidInput(format!(
            "embedding '{name}' has {} rows, expected {n_cells}",
            coords.len()
        )));
    }
    if let Some(i) = coords.iter().position(|r| r.len() < 2) {
        return Err(LoomError::InvalidInput(format!(
            "embedding '{name}' row {i} has fewer than 2 dimensions"
        )));
    }
    Ok(())
}

fn finalize(global_attrs: &GlobalAttrs) -> Result<BTreeMap<String, String>> {
    global_attrs
        .iter()
        .map(|(key, value)| {
            let text = match value {
                GlobalValue::Text(s) => s.clone(),
                GlobalValue::MetaData(meta) => compress_encode(meta)?,
            };
            Ok((key.clone(), text))
        })
        .collect()
}

fn table_attrs(table: &Table) -> AttrMap {
    table
        .columns()
        .map(|(name, col)| (name.to_string(), AttrValue::Column(col.clone())))
        .collect()
}

fn sorted(columns: &std::collections::HashMap<String, ColumnData>) -> Vec<(String, ColumnData)> {
    let mut out: Vec<_> = columns.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}
