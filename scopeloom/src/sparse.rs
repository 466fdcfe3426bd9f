//! Coordinate-format (COO) sparse matrix.
//!
//! [`SparseMatrix`] stores non-zero entries as `(row, col, value)` triplets.
//! Loom ingestion keeps sparse count matrices in this layout: transposing a
//! COO matrix is a swap of the row and column vectors, and the writer
//! densifies it chunk by chunk only when persisting.

use scopeloom_core::{LoomError, Result, Summarizable};

/// A sparse matrix in COO (coordinate) format.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl SparseMatrix {
    /// Create an empty sparse matrix with the given dimensions.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
            n_rows,
            n_cols,
        }
    }

    /// Create a sparse matrix from triplet vectors.
    ///
    /// All three vectors must have the same length, and all indices must be
    /// within bounds.
    pub fn from_triplets(
        rows: Vec<usize>,
        cols: Vec<usize>,
        values: Vec<f64>,
        n_rows: usize,
        n_cols: usize,
    ) -> Result<Self> {
        if rows.len() != cols.len() || cols.len() != values.len() {
            return Err(LoomError::InvalidInput(
                "rows, cols, and values must have the same length".into(),
            ));
        }
        for (i, (&r, &c)) in rows.iter().zip(cols.iter()).enumerate() {
            if r >= n_rows || c >= n_cols {
                return Err(LoomError::InvalidInput(format!(
                    "triplet {i} index ({r}, {c}) out of bounds for ({n_rows}, {n_cols})"
                )));
            }
        }
        Ok(Self {
            rows,
            cols,
            values,
            n_rows,
            n_cols,
        })
    }

    /// Get the value at `(row, col)`. Returns 0.0 if no entry is stored.
    ///
    /// This is an O(nnz) scan; the last inserted duplicate wins.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.iter()
            .filter(|&(r, c, _)| r == row && c == col)
            .last()
            .map_or(0.0, |(_, _, v)| v)
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// (n_rows, n_cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Swap rows and columns. Entry order is preserved.
    pub fn transpose(&self) -> SparseMatrix {
        SparseMatrix {
            rows: self.cols.clone(),
            cols: self.rows.clone(),
            values: self.values.clone(),
            n_rows: self.n_cols,
            n_cols: self.n_rows,
        }
    }

    /// Densify the row band `start..end` (clamped to the matrix).
    ///
    /// Used by the writer to stream large matrices one chunk of rows at a time.
    pub fn dense_rows(&self, start: usize, end: usize) -> Vec<Vec<f64>> {
        let end = end.min(self.n_rows);
        let start = start.min(end);
        let mut band = vec![vec![0.0; self.n_cols]; end - start];
        for (r, c, v) in self.iter() {
            if r >= start && r < end {
                band[r - start][c] = v;
            }
        }
        band
    }

    /// Convert COO to CSR format.
    ///
    /// Returns `(data, indices, indptr)` where:
    /// - `data` contains the non-zero values
    /// - `indices` contains the column index for each value
    /// - `indptr[i]..indptr[i+1]` gives the range of entries for row `i`
    pub fn to_csr(&self) -> (Vec<f64>, Vec<usize>, Vec<usize>) {
        let nnz = self.values.len();
        let mut order: Vec<usize> = (0..nnz).collect();
        order.sort_by_key(|&i| (self.rows[i], self.cols[i]));

        let mut data = Vec::with_capacity(nnz);
        let mut indices = Vec::with_capacity(nnz);
        let mut indptr = vec![0usize; self.n_rows + 1];

        for &i in &order {
            data.push(self.values[i]);
            indices.push(self.cols[i]);
            indptr[self.rows[i] + 1] += 1;
        }

        for i in 1..=self.n_rows {
            indptr[i] += indptr[i - 1];
        }

        (data, indices, indptr)
    }

    /// Create a sparse matrix from CSR format.
    ///
    /// - `data`: non-zero values
    /// - `indices`: column index for each value
    /// - `indptr`: row pointer array (length `n_rows + 1`)
    pub fn from_csr(
        data: Vec<f64>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
        n_rows: usize,
        n_cols: usize,
    ) -> Result<Self> {
        if data.len() != indices.len() {
            return Err(LoomError::InvalidInput(
                "CSR data and indices must have the same length".into(),
            ));
        }
        if indptr.len() != n_rows + 1 {
            return Err(LoomError::InvalidInput(format!(
                "CSR indptr length ({}) must be n_rows + 1 ({})",
                indptr.len(),
                n_rows + 1
            )));
        }

        let nnz = data.len();
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);

        for row in 0..n_rows {
            for idx in indptr[row]..indptr[row + 1] {
                if idx >= nnz {
                    return Err(LoomError::InvalidInput(format!(
                        "CSR indptr references index {idx} but nnz is {nnz}"
                    )));
                }
                if indices[idx] >= n_cols {
                    return Err(LoomError::InvalidInput(format!(
                        "CSR column index {} out of bounds for n_cols={}",
                        indices[idx], n_cols
                    )));
                }
                rows.push(row);
                cols.push(indices[idx]);
            }
        }

        Ok(Self {
            rows,
            cols,
            values: data,
            n_rows,
            n_cols,
        })
    }

    /// Iterate over stored triplets `(row, col, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.values.iter())
            .map(|((&r, &c), &v)| (r, c, v))
    }
}

impl Summarizable for SparseMatrix {
    fn summary(&self) -> String {
        format!(
            "SparseMatrix: {}\u{00d7}{}, {} stored entries",
            self.n_rows,
            self.n_cols,
            self.nnz()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // 2 cells x 3 genes
        SparseMatrix::from_triplets(vec![0, 0, 1], vec![0, 2, 1], vec![1.0, 2.0, 3.0], 2, 3)
            .unwrap()
    }

    #[test]
    fn test_from_triplets_bounds_check() {
        assert!(SparseMatrix::from_triplets(vec![5], vec![0], vec![1.0], 3, 3).is_err());
        assert!(SparseMatrix::from_triplets(vec![0, 1], vec![0], vec![1.0], 3, 3).is_err());
    }

    #[test]
    fn test_duplicate_entries_last_wins() {
        let m = SparseMatrix::from_triplets(vec![0, 0], vec![0, 0], vec![5.0, 6.0], 3, 3)
            .unwrap();
        assert_eq!(m.get(0, 0), 6.0);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn test_transpose() {
        let t = sample().transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.nnz(), 3);
        assert_eq!(t.get(2, 0), 2.0);
        assert_eq!(t.get(1, 1), 3.0);
        assert_eq!(t.get(0, 1), 0.0);
        assert_eq!(t.transpose(), sample());
    }

    #[test]
    fn test_full_band_is_dense_matrix() {
        assert_eq!(
            sample().dense_rows(0, 2),
            vec![vec![1.0, 0.0, 2.0], vec![0.0, 3.0, 0.0]]
        );
    }

    #[test]
    fn test_dense_rows_band() {
        let t = sample().transpose();
        assert_eq!(t.dense_rows(1, 3), vec![vec![0.0, 3.0], vec![2.0, 0.0]]);
        assert_eq!(t.dense_rows(2, 10), vec![vec![2.0, 0.0]]);
        assert!(t.dense_rows(5, 10).is_empty());
    }

    #[test]
    fn test_summary() {
        let m = SparseMatrix::from_triplets(vec![0], vec![0], vec![1.0], 100, 50).unwrap();
        assert_eq!(m.summary(), "SparseMatrix: 100\u{00d7}50, 1 stored entries");
        assert_eq!(SparseMatrix::new(0, 0).nnz(), 0);
    }

    #[test]
    fn test_csr_roundtrip() {
        let m = SparseMatrix::from_triplets(
            vec![0, 0, 1, 2, 2],
            vec![0, 2, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
        )
        .unwrap();

        let (data, indices, indptr) = m.to_csr();
        assert_eq!(indptr, vec![0, 2, 3, 5]);
        let m2 = SparseMatrix::from_csr(data, indices, indptr, 3, 3).unwrap();
        assert_eq!(m2.dense_rows(0, 3), m.dense_rows(0, 3));
    }

    #[test]
    fn test_csr_rejects_bad_indptr() {
        assert!(SparseMatrix::from_csr(vec![1.0], vec![0], vec![0, 1], 2, 2).is_err());
        assert!(SparseMatrix::from_csr(vec![1.0], vec![4], vec![0, 1], 1, 2).is_err());
    }
}
