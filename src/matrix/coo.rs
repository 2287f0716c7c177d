//! Coordinate (COO) matrix format implementation

use crate::error::LoadError;
use crate::matrix::format::scalar;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix stored as unordered `(row, col, value)` triples
///
/// Entries may appear in any order and the same coordinate may appear more
/// than once; duplicates add up. The kernel launches one thread per stored
/// entry, and thread `i` atomically adds `data[i] * x[col[i]]` into
/// `y[row[i]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrixCOO {
    n_rows: usize,
    n_cols: usize,
    row: Vec<u32>,
    col: Vec<u32>,
    data: Vec<f32>,
}

impl SparseMatrixCOO {
    /// Creates a new COO matrix
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShapeInvalid`] if `row`, `col` and `data` differ
    /// in length or an index falls outside the matrix.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row: Vec<u32>,
        col: Vec<u32>,
        data: Vec<f32>,
    ) -> Result<Self, LoadError> {
        const F: FormatTag = FormatTag::Coo;

        validate::dimension(F, "num_rows", n_rows)?;
        validate::dimension(F, "num_cols", n_cols)?;
        validate::dimension(F, "nnz", data.len())?;
        validate::length(F, "row", row.len(), data.len())?;
        validate::length(F, "col", col.len(), data.len())?;
        validate::indices_below(F, "row", &row, n_rows)?;
        validate::indices_below(F, "col", &col, n_cols)?;

        Ok(Self {
            n_rows,
            n_cols,
            row,
            col,
            data,
        })
    }

    /// Row index of every entry
    pub fn row(&self) -> &[u32] {
        &self.row
    }

    /// Column index of every entry
    pub fn col(&self) -> &[u32] {
        &self.col
    }

    /// Value of every entry
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of stored entries, duplicates included
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Iterates over the stored triples in storage order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.row
            .iter()
            .zip(&self.col)
            .zip(&self.data)
            .map(|((&r, &c), &v)| (r as usize, c as usize, v))
    }
}

impl SpmvKernel for SparseMatrixCOO {
    fn format(&self) -> FormatTag {
        FormatTag::Coo
    }

    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_cols(&self) -> usize {
        self.n_cols
    }

    fn thread_count(&self) -> usize {
        self.nnz()
    }

    fn kernel_args(&self) -> Vec<KernelArg<'_>> {
        vec![
            KernelArg::Indices(&self.row),
            KernelArg::Indices(&self.col),
            KernelArg::Values(&self.data),
            KernelArg::InputVector,
            KernelArg::OutputVector,
            KernelArg::Scalar(scalar(self.nnz())),
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for (r, c, v) in self.iter() {
            f(r, c, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_are_kept() {
        let matrix = SparseMatrixCOO::new(1, 1, vec![0, 0], vec![0, 0], vec![1.0, 2.0]).unwrap();

        assert_eq!(matrix.nnz(), 2);
        assert_eq!(matrix.thread_count(), 2);
        assert_eq!(matrix.kernel_args()[5], KernelArg::Scalar(2));
    }

    #[test]
    fn test_unordered_entries() {
        let matrix =
            SparseMatrixCOO::new(3, 3, vec![2, 0, 1], vec![0, 2, 1], vec![3.0, 1.0, 2.0]).unwrap();

        let triples: Vec<_> = matrix.iter().collect();
        assert_eq!(triples, vec![(2, 0, 3.0), (0, 2, 1.0), (1, 1, 2.0)]);
    }

    #[test]
    fn test_row_out_of_bounds() {
        let result = SparseMatrixCOO::new(2, 2, vec![0, 2], vec![0, 1], vec![1.0, 1.0]);
        assert!(matches!(result, Err(LoadError::ShapeInvalid { .. })));
    }

    #[test]
    fn test_length_mismatch() {
        let result = SparseMatrixCOO::new(2, 2, vec![0, 1], vec![0], vec![1.0, 1.0]);
        assert!(result.is_err());
    }
}
