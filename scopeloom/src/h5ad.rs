//! HDF5-backed AnnData reader/writer for `.h5ad` files.
//!
//! Only the parts a loom is built from are handled: `X` (dense or CSR
//! sparse), `obs`/`var` (index plus columns) and `obsm` (coordinate
//! matrices). Categorical columns are read in both the legacy
//! `__categories/<name>` layout and the `{codes, categories}` group layout.
//!
//! Requires the `hdf5-io` feature flag and a system HDF5 library installation
//! (`brew install hdf5` on macOS, `apt install libhdf5-dev` on Linux).

use std::path::Path;

use hdf5::{File, Group};
use tracing::{debug, warn};

use scopeloom_core::{LoomError, Result};

use crate::hdf5_util::{
    h5err, read_attr_str, read_column, read_matrix_2d, read_strings, write_1d, write_attr_str,
    write_column, write_matrix_2d, write_strings,
};
use crate::single_cell::{AnnData, ColumnData, MatrixData};
use crate::sparse::SparseMatrix;

/// Read an `.h5ad` file into an [`AnnData`] container.
pub fn read_h5ad<P: AsRef<Path>>(path: P) -> Result<AnnData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        LoomError::Container(format!("cannot open h5ad file {}: {e}", path.display()))
    })?;

    let x = read_x(&file)?;
    let (n_obs, n_vars) = x.shape();

    let obs_names = read_index(&file, "obs", n_obs)?;
    let var_names = read_index(&file, "var", n_vars)?;
    let mut adata = AnnData::new(x, obs_names, var_names)?;

    for (name, col) in read_frame_columns(&file, "obs")? {
        if let Err(e) = adata.add_obs_column(&name, col) {
            warn!(column = %name, error = %e, "skipping obs column");
        }
    }
    for (name, col) in read_frame_columns(&file, "var")? {
        if let Err(e) = adata.add_var_column(&name, col) {
            warn!(column = %name, error = %e, "skipping var column");
        }
    }

    if file.link_exists("obsm") {
        let group = file.group("obsm").map_err(h5err)?;
        for name in group.member_names().map_err(h5err)? {
            match group.dataset(&name).map_err(h5err).and_then(|ds| read_matrix_2d(&ds)) {
                Ok(data) => adata.add_obsm(&name, data)?,
                Err(e) => warn!(key = %name, error = %e, "skipping obsm entry"),
            }
        }
    }

    debug!(
        path = %path.display(),
        n_obs = adata.n_obs(),
        n_vars = adata.n_vars(),
        "read h5ad file"
    );
    Ok(adata)
}

/// Write an [`AnnData`] container to an `.h5ad` file.
pub fn write_h5ad<P: AsRef<Path>>(adata: &AnnData, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        LoomError::Container(format!("cannot create h5ad file {}: {e}", path.display()))
    })?;

    write_x(&file, adata.x())?;

    let obs = file.create_group("obs").map_err(h5err)?;
    write_frame(&obs, adata.obs_names(), adata.obs_columns().iter())?;
    let var = file.create_group("var").map_err(h5err)?;
    write_frame(&var, adata.var_names(), adata.var_columns().iter())?;

    if !adata.obsm_keys().is_empty() {
        let group = file.create_group("obsm").map_err(h5err)?;
        for (key, data) in adata.obsm_keys() {
            write_matrix_2d(&group, key, data)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Read X from file. Supports dense arrays and CSR sparse matrices.
fn read_x(file: &File) -> Result<MatrixData> {
    if let Ok(ds) = file.dataset("X") {
        return Ok(MatrixData::Dense(read_matrix_2d(&ds)?));
    }

    let group = file
        .group("X")
        .map_err(|_| LoomError::InvalidInput("no X dataset or group found".into()))?;
    match read_attr_str(&group, "encoding-type").as_deref() {
        Some("csr_matrix") | None => read_csr_group(&group),
        Some(other) => Err(LoomError::InvalidInput(format!(
            "unsupported X encoding-type: {other}"
        ))),
    }
}

fn read_usize_1d(group: &Group, name: &str) -> Result<Vec<usize>> {
    group
        .dataset(name)
        .and_then(|ds| ds.read_1d::<i64>())
        .map_err(h5err)?
        .iter()
        .map(|&v| {
            usize::try_from(v)
                .map_err(|_| LoomError::InvalidInput(format!("negative value {v} in '{name}'")))
        })
        .collect()
}

/// Read a CSR group into a SparseMatrix.
fn read_csr_group(group: &Group) -> Result<MatrixData> {
    let data = group
        .dataset("data")
        .and_then(|ds| ds.read_1d::<f64>())
        .map_err(h5err)?
        .to_vec();
    let indices = read_usize_1d(group, "indices")?;
    let indptr = read_usize_1d(group, "indptr")?;

    let n_rows = indptr.len().saturating_sub(1);
    let n_cols = match group.attr("shape").and_then(|a| a.read_1d::<i64>()) {
        Ok(shape) if shape.len() == 2 => usize::try_from(shape[1])
            .map_err(|_| LoomError::InvalidInput("negative X shape".into()))?,
        _ => indices.iter().copied().max().map_or(0, |m| m + 1),
    };

    let sm = SparseMatrix::from_csr(data, indices, indptr, n_rows, n_cols)?;
    Ok(MatrixData::Sparse(sm))
}

fn write_x(file: &File, x: &MatrixData) -> Result<()> {
    match x {
        MatrixData::Dense(rows) => {
            let ds = write_matrix_2d(file, "X", rows)?;
            write_attr_str!(ds, "encoding-type", "array")?;
            write_attr_str!(ds, "encoding-version", "0.2.0")?;
        }
        MatrixData::Sparse(sm) => {
            let (data, indices, indptr) = sm.to_csr();
            let (n_rows, n_cols) = sm.shape();

            let group = file.create_group("X").map_err(h5err)?;
            write_attr_str!(group, "encoding-type", "csr_matrix")?;
            write_attr_str!(group, "encoding-version", "0.1.0")?;

            let shape_arr = ndarray::arr1(&[n_rows as i64, n_cols as i64]);
            group
                .new_attr_builder()
                .with_data(&shape_arr)
                .create("shape")
                .map_err(h5err)?;

            write_1d(&group, "data", &data)?;
            let to_i64 = |v: Vec<usize>| v.into_iter().map(|i| i as i64).collect::<Vec<_>>();
            write_1d(&group, "indices", &to_i64(indices))?;
            write_1d(&group, "indptr", &to_i64(indptr))?;
        }
    }
    Ok(())
}

/// Row names of `obs`/`var`, or `0..n` when the file carries none.
fn read_index(file: &File, group_name: &str, expected: usize) -> Result<Vec<String>> {
    let default = || (0..expected).map(|i| i.to_string()).collect();
    if !file.link_exists(group_name) {
        return Ok(default());
    }
    let group = file.group(group_name).map_err(h5err)?;
    let index_name = read_attr_str(&group, "_index").unwrap_or_else(|| "_index".to_string());
    if !group.link_exists(&index_name) {
        return Ok(default());
    }
    read_strings(&group.dataset(&index_name).map_err(h5err)?)
}

/// Every readable column of an `obs`/`var` frame. Unreadable members are
/// skipped with a warning.
fn read_frame_columns(file: &File, group_name: &str) -> Result<Vec<(String, ColumnData)>> {
    if !file.link_exists(group_name) {
        return Ok(Vec::new());
    }
    let group = file.group(group_name).map_err(h5err)?;
    let index_name = read_attr_str(&group, "_index").unwrap_or_else(|| "_index".to_string());

    let mut columns = Vec::new();
    for name in group.member_names().map_err(h5err)? {
        if name == index_name || name == "__categories" {
            continue;
        }
        match read_frame_member(&group, &name) {
            Ok(col) => columns.push((name, col)),
            Err(e) => warn!(frame = group_name, column = %name, error = %e, "skipping column"),
        }
    }
    Ok(columns)
}

fn read_frame_member(group: &Group, name: &str) -> Result<ColumnData> {
    // {codes, categories} group layout
    if let Ok(sub) = group.group(name) {
        let codes = sub.dataset("codes").and_then(|ds| ds.read_1d::<i32>()).map_err(h5err)?;
        let categories = read_strings(&sub.dataset("categories").map_err(h5err)?)?;
        return Ok(ColumnData::Categorical {
            codes: codes.to_vec(),
            categories,
        });
    }

    let ds = group.dataset(name).map_err(h5err)?;
    // legacy __categories/<name> layout
    if let Ok(cats) = group.dataset(&format!("__categories/{name}")) {
        let codes = ds.read_1d::<i32>().map_err(h5err)?.to_vec();
        let categories = read_strings(&cats)?;
        return Ok(ColumnData::Categorical { codes, categories });
    }
    read_column(&ds)
}

/// Write a frame index plus its columns. Categoricals use the legacy
/// `__categories/<name>` layout.
fn write_frame<'a>(
    group: &Group,
    names: &[String],
    columns: impl Iterator<Item = (&'a String, &'a ColumnData)>,
) -> Result<()> {
    write_attr_str!(group, "_index", "_index")?;
    write_strings(group, "_index", names)?;
    for (key, col) in columns {
        match col {
            ColumnData::Categorical { codes, categories } => {
                write_1d(group, key, codes)?;
                let cats = match group.group("__categories") {
                    Ok(g) => g,
                    Err(_) => group.create_group("__categories").map_err(h5err)?,
                };
                write_strings(&cats, key, categories)?;
            }
            other => {
                write_column(group, key, other)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dense_adata() -> AnnData {
        let x = MatrixData::Dense(vec![vec![1.0, 2.0, 0.0], vec![0.0, 3.0, 4.0]]);
        AnnData::new(
            x,
            vec!["cell_1".into(), "cell_2".into()],
            vec!["gene_a".into(), "gene_b".into(), "gene_c".into()],
        )
        .unwrap()
    }

    fn sample_sparse_adata() -> AnnData {
        let sm = SparseMatrix::from_triplets(
            vec![0, 0, 1, 1],
            vec![0, 2, 1, 2],
            vec![1.0, 2.0, 3.0, 4.0],
            2,
            3,
        )
        .unwrap();
        AnnData::new(
            MatrixData::Sparse(sm),
            vec!["c1".into(), "c2".into()],
            vec!["g1".into(), "g2".into(), "g3".into()],
        )
        .unwrap()
    }

    #[test]
    fn write_read_roundtrip_dense() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dense.h5ad");
        write_h5ad(&sample_dense_adata(), &path).unwrap();

        let loaded = read_h5ad(&path).unwrap();
        assert_eq!(loaded.n_obs(), 2);
        assert_eq!(loaded.n_vars(), 3);
        assert_eq!(loaded.obs_names(), &["cell_1", "cell_2"]);
        assert_eq!(loaded.var_names(), &["gene_a", "gene_b", "gene_c"]);
        assert_eq!(loaded.x().get(0, 1), 2.0);
        assert_eq!(loaded.x().get(1, 2), 4.0);
    }

    #[test]
    fn sparse_x_stays_sparse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.h5ad");
        write_h5ad(&sample_sparse_adata(), &path).unwrap();

        let loaded = read_h5ad(&path).unwrap();
        assert!(loaded.x().is_sparse());
        assert_eq!(loaded.shape(), (2, 3));
        assert_eq!(loaded.x().get(0, 2), 2.0);
        assert_eq!(loaded.x().get(1, 0), 0.0);
    }

    #[test]
    fn columns_and_obsm_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cols.h5ad");
        let mut adata = sample_dense_adata();
        adata
            .add_obs_column(
                "louvain",
                ColumnData::Categorical {
                    codes: vec![1, 0],
                    categories: vec!["0".into(), "1".into()],
                },
            )
            .unwrap();
        adata.add_obs_numeric("n_counts", vec![3.0, 7.0]).unwrap();
        adata
            .add_var_column("highly_variable", ColumnData::Booleans(vec![true, false, true]))
            .unwrap();
        adata
            .add_var_column("n_cells", ColumnData::Integers(vec![1, 2, 1]))
            .unwrap();
        adata
            .add_obsm("X_tsne", vec![vec![0.1, 0.2], vec![0.3, 0.4]])
            .unwrap();
        write_h5ad(&adata, &path).unwrap();

        let loaded = read_h5ad(&path).unwrap();
        assert_eq!(
            loaded.get_obs("louvain"),
            Some(&ColumnData::Categorical {
                codes: vec![1, 0],
                categories: vec!["0".into(), "1".into()],
            })
        );
        assert_eq!(
            loaded.get_obs("n_counts"),
            Some(&ColumnData::Numeric(vec![3.0, 7.0]))
        );
        assert_eq!(
            loaded.get_var("highly_variable"),
            Some(&ColumnData::Booleans(vec![true, false, true]))
        );
        assert_eq!(
            loaded.get_var("n_cells"),
            Some(&ColumnData::Integers(vec![1, 2, 1]))
        );
        assert_eq!(
            loaded.get_obsm("X_tsne"),
            Some(&vec![vec![0.1, 0.2], vec![0.3, 0.4]])
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_h5ad(dir.path().join("absent.h5ad")).is_err());
    }
}
