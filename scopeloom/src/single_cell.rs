//! AnnData-like source container for single-cell data.
//!
//! This is the in-memory shape the loom builder ingests from: a cells × genes
//! matrix with per-cell (`obs`) and per-gene (`var`) metadata columns, plus
//! multi-dimensional per-cell coordinates (`obsm`, e.g. PCA, t-SNE, UMAP).
//!
//! # Example
//!
//! ```
//! use scopeloom::single_cell::{AnnData, MatrixData};
//!
//! let x = MatrixData::Dense(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
//! let adata = AnnData::new(
//!     x,
//!     vec!["cell_1".into(), "cell_2".into()],
//!     vec!["gene_a".into(), "gene_b".into()],
//! ).unwrap();
//! assert_eq!(adata.n_obs(), 2);
//! assert_eq!(adata.n_vars(), 2);
//! ```

use std::collections::{BTreeSet, HashMap};

use scopeloom_core::{LoomError, Result, Summarizable};

use crate::sparse::SparseMatrix;

/// A numeric 2D matrix, either dense or sparse.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    /// Dense row-major matrix.
    Dense(Vec<Vec<f64>>),
    /// Sparse COO matrix.
    Sparse(SparseMatrix),
}

impl MatrixData {
    /// (n_rows, n_cols).
    pub fn shape(&self) -> (usize, usize) {
        match self {
            MatrixData::Dense(rows) => {
                let n_rows = rows.len();
                let n_cols = rows.first().map_or(0, |r| r.len());
                (n_rows, n_cols)
            }
            MatrixData::Sparse(s) => s.shape(),
        }
    }

    /// Get a value at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            MatrixData::Dense(rows) => {
                rows.get(row).and_then(|r| r.get(col)).copied().unwrap_or(0.0)
            }
            MatrixData::Sparse(s) => s.get(row, col),
        }
    }

    /// Whether the matrix is stored sparsely.
    pub fn is_sparse(&self) -> bool {
        matches!(self, MatrixData::Sparse(_))
    }

    /// Swap rows and columns. Sparse input stays in coordinate layout.
    pub fn transpose(&self) -> MatrixData {
        match self {
            MatrixData::Dense(rows) => {
                let (n_rows, n_cols) = self.shape();
                let mut t = vec![vec![0.0; n_rows]; n_cols];
                for (i, row) in rows.iter().enumerate() {
                    for (j, &v) in row.iter().enumerate() {
                        t[j][i] = v;
                    }
                }
                MatrixData::Dense(t)
            }
            MatrixData::Sparse(s) => MatrixData::Sparse(s.transpose()),
        }
    }

    /// Check that every dense row has the same width.
    pub(crate) fn check_rectangular(&self) -> Result<()> {
        if let MatrixData::Dense(rows) = self {
            let width = rows.first().map_or(0, |r| r.len());
            if let Some(i) = rows.iter().position(|r| r.len() != width) {
                return Err(LoomError::InvalidInput(format!(
                    "matrix row {i} has {} columns, expected {width}",
                    rows[i].len()
                )));
            }
        }
        Ok(())
    }
}

/// A metadata column with typed data.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Free-text string values.
    Strings(Vec<String>),
    /// Floating point values.
    Numeric(Vec<f64>),
    /// Integer values.
    Integers(Vec<i64>),
    /// Boolean flags.
    Booleans(Vec<bool>),
    /// Categorical data stored as integer codes indexing into a category list.
    /// A negative code marks a missing value.
    Categorical {
        codes: Vec<i32>,
        categories: Vec<String>,
    },
}

impl ColumnData {
    /// Number of elements in this column.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Strings(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Integers(v) => v.len(),
            ColumnData::Booleans(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand categorical codes to their labels; missing codes become `"nan"`.
    pub fn decode_categories(codes: &[i32], categories: &[String]) -> Vec<String> {
        codes
            .iter()
            .map(|&c| {
                usize::try_from(c)
                    .ok()
                    .and_then(|i| categories.get(i))
                    .cloned()
                    .unwrap_or_else(|| "nan".to_string())
            })
            .collect()
    }

    /// Sorted distinct values, each rendered as text.
    ///
    /// Values are ordered by their native type before being stringified, so a
    /// numeric column yields `["2.0", "10.0"]`, not `["10.0", "2.0"]`.
    pub fn unique_labels(&self) -> Vec<String> {
        match self {
            ColumnData::Strings(v) => {
                let set: BTreeSet<&str> = v.iter().map(String::as_str).collect();
                set.into_iter().map(str::to_string).collect()
            }
            ColumnData::Numeric(v) => {
                // one NaN and one zero, whatever their sign or payload
                let mut vals: Vec<f64> = v
                    .iter()
                    .map(|&x| {
                        if x.is_nan() {
                            f64::NAN
                        } else if x == 0.0 {
                            0.0
                        } else {
                            x
                        }
                    })
                    .collect();
                vals.sort_by(f64::total_cmp);
                vals.dedup_by(|a, b| a.total_cmp(b).is_eq());
                vals.into_iter().map(format_float).collect()
            }
            ColumnData::Integers(v) => {
                let set: BTreeSet<i64> = v.iter().copied().collect();
                set.into_iter().map(|i| i.to_string()).collect()
            }
            ColumnData::Booleans(v) => {
                let set: BTreeSet<bool> = v.iter().copied().collect();
                set.into_iter()
                    .map(|b| (if b { "True" } else { "False" }).to_string())
                    .collect()
            }
            ColumnData::Categorical { codes, categories } => {
                let set: BTreeSet<String> = Self::decode_categories(codes, categories)
                    .into_iter()
                    .collect();
                set.into_iter().collect()
            }
        }
    }
}

/// Render a float the way the viewer's label parser expects (`1.0`, `nan`, `-inf`).
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "inf" } else { "-inf" }).to_string()
    } else {
        format!("{v:?}")
    }
}

/// AnnData-like container for single-cell data.
#[derive(Debug, Clone)]
pub struct AnnData {
    /// Primary data matrix (n_obs × n_vars).
    x: MatrixData,
    /// Observation (cell) names.
    obs_names: Vec<String>,
    /// Variable (gene) names.
    var_names: Vec<String>,
    /// Per-cell metadata.
    obs: HashMap<String, ColumnData>,
    /// Per-gene metadata.
    var: HashMap<String, ColumnData>,
    /// Multi-dimensional observation annotations (e.g. PCA embeddings).
    obsm: HashMap<String, Vec<Vec<f64>>>,
}

impl AnnData {
    /// Create a new AnnData container.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix dimensions don't match the name vectors.
    pub fn new(x: MatrixData, obs_names: Vec<String>, var_names: Vec<String>) -> Result<Self> {
        x.check_rectangular()?;
        let (n_obs, n_vars) = x.shape();
        if obs_names.len() != n_obs {
            return Err(LoomError::InvalidInput(format!(
                "obs_names length ({}) does not match n_obs ({})",
                obs_names.len(),
                n_obs
            )));
        }
        // A dense matrix with no rows carries no width information.
        if var_names.len() != n_vars && !(n_obs == 0 && !x.is_sparse()) {
            return Err(LoomError::InvalidInput(format!(
                "var_names length ({}) does not match n_vars ({})",
                var_names.len(),
                n_vars
            )));
        }

        Ok(Self {
            x,
            obs_names,
            var_names,
            obs: HashMap::new(),
            var: HashMap::new(),
            obsm: HashMap::new(),
        })
    }

    /// Number of observations (cells).
    pub fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    /// Number of variables (genes).
    pub fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    /// Shape as (n_obs, n_vars).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_obs(), self.n_vars())
    }

    /// Access the primary data matrix.
    pub fn x(&self) -> &MatrixData {
        &self.x
    }

    /// Observation names.
    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    /// Variable names.
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Add a per-cell string metadata column.
    pub fn add_obs(&mut self, key: &str, values: Vec<String>) -> Result<()> {
        self.add_obs_column(key, ColumnData::Strings(values))
    }

    /// Add a per-cell numeric metadata column.
    pub fn add_obs_numeric(&mut self, key: &str, values: Vec<f64>) -> Result<()> {
        self.add_obs_column(key, ColumnData::Numeric(values))
    }

    /// Add a per-cell metadata column of any type.
    pub fn add_obs_column(&mut self, key: &str, data: ColumnData) -> Result<()> {
        if data.len() != self.n_obs() {
            return Err(LoomError::InvalidInput(format!(
                "obs '{}' length ({}) does not match n_obs ({})",
                key,
                data.len(),
                self.n_obs()
            )));
        }
        self.obs.insert(key.to_string(), data);
        Ok(())
    }

    /// Get per-cell metadata column as typed data.
    pub fn get_obs(&self, key: &str) -> Option<&ColumnData> {
        self.obs.get(key)
    }

    /// All observation metadata columns.
    pub fn obs_columns(&self) -> &HashMap<String, ColumnData> {
        &self.obs
    }

    /// Add a per-gene string metadata column.
    pub fn add_var(&mut self, key: &str, values: Vec<String>) -> Result<()> {
        self.add_var_column(key, ColumnData::Strings(values))
    }

    /// Add a per-gene metadata column of any type.
    pub fn add_var_column(&mut self, key: &str, data: ColumnData) -> Result<()> {
        if data.len() != self.n_vars() {
            return Err(LoomError::InvalidInput(format!(
                "var '{}' length ({}) does not match n_vars ({})",
                key,
                data.len(),
                self.n_vars()
            )));
        }
        self.var.insert(key.to_string(), data);
        Ok(())
    }

    /// Get per-gene metadata column as typed data.
    pub fn get_var(&self, key: &str) -> Option<&ColumnData> {
        self.var.get(key)
    }

    /// All variable metadata columns.
    pub fn var_columns(&self) -> &HashMap<String, ColumnData> {
        &self.var
    }

    /// Add a multi-dimensional observation annotation (e.g. PCA embedding).
    pub fn add_obsm(&mut self, key: &str, data: Vec<Vec<f64>>) -> Result<()> {
        if data.len() != self.n_obs() {
            return Err(LoomError::InvalidInput(format!(
                "obsm '{}' length ({}) does not match n_obs ({})",
                key,
                data.len(),
                self.n_obs()
            )));
        }
        self.obsm.insert(key.to_string(), data);
        Ok(())
    }

    /// Get a multi-dimensional observation annotation.
    pub fn get_obsm(&self, key: &str) -> Option<&Vec<Vec<f64>>> {
        self.obsm.get(key)
    }

    /// All observation multi-dimensional annotations.
    pub fn obsm_keys(&self) -> &HashMap<String, Vec<Vec<f64>>> {
        &self.obsm
    }
}

impl Summarizable for AnnData {
    fn summary(&self) -> String {
        format!(
            "AnnData: {} obs \u{00d7} {} vars, {} obs columns, {} var columns, {} obsm",
            self.n_obs(),
            self.n_vars(),
            self.obs.len(),
            self.var.len(),
            self.obsm.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_adata() -> AnnData {
        let x = MatrixData::Dense(vec![
            vec![1.0, 2.0, 0.0],
            vec![3.0, 0.0, 4.0],
            vec![0.0, 5.0, 6.0],
        ]);
        AnnData::new(
            x,
            vec!["cell_1".into(), "cell_2".into(), "cell_3".into()],
            vec!["gene_a".into(), "gene_b".into(), "gene_c".into()],
        )
        .unwrap()
    }

    #[test]
    fn dimension_mismatch_error() {
        let x = MatrixData::Dense(vec![vec![1.0, 2.0]]);
        let result = AnnData::new(
            x,
            vec!["cell_1".into(), "cell_2".into()], // 2 names, 1 row
            vec!["gene_a".into(), "gene_b".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn ragged_matrix_rejected() {
        let x = MatrixData::Dense(vec![vec![1.0, 2.0], vec![3.0]]);
        let result = AnnData::new(x, vec!["a".into(), "b".into()], vec!["g1".into(), "g2".into()]);
        assert!(matches!(result, Err(LoomError::InvalidInput(_))));
    }

    #[test]
    fn empty_dense_matrix_keeps_var_names() {
        let adata = AnnData::new(MatrixData::Dense(vec![]), vec![], vec!["g1".into()]).unwrap();
        assert_eq!(adata.shape(), (0, 1));
    }

    #[test]
    fn obs_and_var_metadata() {
        let mut adata = sample_adata();
        adata
            .add_obs("cell_type", vec!["T".into(), "B".into(), "NK".into()])
            .unwrap();
        adata
            .add_var("gene_type", vec!["coding".into(), "coding".into(), "lncRNA".into()])
            .unwrap();
        assert_eq!(
            adata.get_obs("cell_type"),
            Some(&ColumnData::Strings(vec!["T".into(), "B".into(), "NK".into()]))
        );
        assert!(adata.get_obs("missing").is_none());
        assert!(adata.add_obs("bad", vec!["a".into()]).is_err());
        assert_eq!(adata.var_columns().len(), 1);
    }

    #[test]
    fn obsm_embedding() {
        let mut adata = sample_adata();
        let pca = vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]];
        adata.add_obsm("X_pca", pca).unwrap();
        assert_eq!(adata.get_obsm("X_pca").unwrap()[0], vec![0.1, 0.2]);
        assert!(adata.add_obsm("short", vec![vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn transpose_dense_and_sparse() {
        let dense = MatrixData::Dense(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let t = dense.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t, MatrixData::Dense(vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]));

        let s = SparseMatrix::from_triplets(vec![0, 1], vec![2, 0], vec![7.0, 8.0], 2, 3).unwrap();
        let t = MatrixData::Sparse(s).transpose();
        assert!(t.is_sparse());
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.get(2, 0), 7.0);
        assert_eq!(t.get(0, 1), 8.0);
    }

    #[test]
    fn unique_labels_per_type() {
        let strings = ColumnData::Strings(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(strings.unique_labels(), vec!["a", "b"]);

        let numeric = ColumnData::Numeric(vec![10.0, 2.0, 2.0, 0.5]);
        assert_eq!(numeric.unique_labels(), vec!["0.5", "2.0", "10.0"]);

        let ints = ColumnData::Integers(vec![3, -1, 3]);
        assert_eq!(ints.unique_labels(), vec!["-1", "3"]);

        let flags = ColumnData::Booleans(vec![true, false, true]);
        assert_eq!(flags.unique_labels(), vec!["False", "True"]);

        let cats = ColumnData::Categorical {
            codes: vec![1, 0, 1, -1],
            categories: vec!["T".into(), "B".into()],
        };
        assert_eq!(cats.unique_labels(), vec!["B", "T", "nan"]);
    }

    #[test]
    fn unique_labels_collapse_nan_and_signed_zero() {
        let quiet_payload = f64::from_bits(0x7ff8_0000_0000_0001);
        let numeric = ColumnData::Numeric(vec![
            f64::NAN,
            -f64::NAN,
            quiet_payload,
            -0.0,
            0.0,
            1.5,
        ]);
        assert_eq!(numeric.unique_labels(), vec!["0.0", "1.5", "nan"]);
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn summary_format() {
        let s = sample_adata().summary();
        assert!(s.contains("3 obs"));
        assert!(s.contains("0 obsm"));
    }
}
