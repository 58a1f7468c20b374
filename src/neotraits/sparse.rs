//! Compressed sparse row matrices

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{H5Error, Result};

/// A CSR matrix of `f64` values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    shape: (usize, usize),
    data: Vec<f64>,
    indices: Vec<usize>,
    indptr: Vec<usize>,
}

impl SparseMatrix {
    /// Build from raw CSR components, checking structural consistency
    pub fn from_csr(
        shape: (usize, usize),
        data: Vec<f64>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
    ) -> Result<Self> {
        let invalid = |reason: String| H5Error::validation("sparse matrix", reason);

        if indptr.len() != shape.0 + 1 {
            return Err(invalid(format!(
                "indptr has {} entries, expected {}",
                indptr.len(),
                shape.0 + 1
            )));
        }
        if indptr[0] != 0 || indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid("indptr must start at 0 and be non-decreasing".into()));
        }
        if indices.len() != data.len() || indptr[shape.0] != data.len() {
            return Err(invalid(format!(
                "{} values, {} column indices, indptr ends at {}",
                data.len(),
                indices.len(),
                indptr[shape.0]
            )));
        }
        if let Some(&col) = indices.iter().find(|&&c| c >= shape.1) {
            return Err(invalid(format!("column {} out of range for {} columns", col, shape.1)));
        }

        Ok(Self { shape, data, indices, indptr })
    }

    /// Build from `(row, col, value)` triplets. Duplicate coordinates are summed.
    pub fn from_triplets(shape: (usize, usize), triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut sorted = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut data = Vec::with_capacity(sorted.len());
        let mut indices = Vec::with_capacity(sorted.len());
        let mut indptr = vec![0usize; shape.0 + 1];
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in sorted {
            if row >= shape.0 || col >= shape.1 {
                return Err(H5Error::validation(
                    "sparse matrix",
                    format!("entry ({}, {}) outside shape {:?}", row, col, shape),
                ));
            }
            if last == Some((row, col)) {
                if let Some(v) = data.last_mut() {
                    *v += value;
                }
                continue;
            }
            data.push(value);
            indices.push(col);
            indptr[row + 1] += 1;
            last = Some((row, col));
        }
        for r in 0..shape.0 {
            indptr[r + 1] += indptr[r];
        }

        Self::from_csr(shape, data, indices, indptr)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    /// Value at `(row, col)`, zero when not stored
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.shape.0 {
            return 0.0;
        }
        let (lo, hi) = (self.indptr[row], self.indptr[row + 1]);
        self.indices[lo..hi]
            .iter()
            .position(|&c| c == col)
            .map(|p| self.data[lo + p])
            .unwrap_or(0.0)
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros(self.shape);
        for row in 0..self.shape.0 {
            for k in self.indptr[row]..self.indptr[row + 1] {
                dense[[row, self.indices[k]]] += self.data[k];
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplets_build_csr() {
        let triplets = [(2, 0, 4.0), (0, 1, 1.0), (0, 1, 0.5)];
        let m = SparseMatrix::from_triplets((3, 3), &triplets).unwrap();
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.indptr(), &[0, 1, 1, 2]);
        assert_eq!(m.get(0, 1), 1.5);
        assert_eq!(m.get(2, 0), 4.0);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(m.to_dense()[[2, 0]], 4.0);
    }

    #[test]
    fn test_rejects_inconsistent_components() {
        assert!(SparseMatrix::from_csr((2, 2), vec![1.0], vec![0], vec![0, 1]).is_err());
        assert!(SparseMatrix::from_csr((1, 2), vec![1.0], vec![5], vec![0, 1]).is_err());
        assert!(SparseMatrix::from_triplets((1, 1), &[(1, 0, 1.0)]).is_err());
    }
}
