//! Diagonal (DIA) matrix format implementation

use crate::error::LoadError;
use crate::matrix::format::scalar;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix stored as constant-offset diagonals
///
/// `offsets[d]` is the column minus row delta of diagonal `d`, and
/// `values[d * n_rows + r]` holds the entry at `(r, r + offsets[d])`.
/// Slots whose column falls outside `[0, n_cols)` are ignored by the
/// kernel whatever they contain.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrixDIA {
    n_rows: usize,
    n_cols: usize,
    offsets: Vec<i32>,
    values: Vec<f32>,
}

impl SparseMatrixDIA {
    /// Creates a new DIA matrix
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShapeInvalid`] unless `offsets` has
    /// `n_diagonals` entries and `values` has `n_diagonals * n_rows`.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        n_diagonals: usize,
        offsets: Vec<i32>,
        values: Vec<f32>,
    ) -> Result<Self, LoadError> {
        const F: FormatTag = FormatTag::Dia;

        validate::dimension(F, "num_rows", n_rows)?;
        validate::dimension(F, "num_cols", n_cols)?;
        validate::dimension(F, "num_diagonals", n_diagonals)?;
        validate::length(F, "offsets", offsets.len(), n_diagonals)?;
        let slots = validate::product(F, "num_diagonals * num_rows", n_diagonals, n_rows)?;
        validate::dimension(F, "num_diagonals * num_rows", slots)?;
        validate::length(F, "values", values.len(), slots)?;

        Ok(Self {
            n_rows,
            n_cols,
            offsets,
            values,
        })
    }

    /// Number of stored diagonals
    pub fn n_diagonals(&self) -> usize {
        self.offsets.len()
    }

    /// Column minus row delta of each diagonal
    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Diagonal-major values, `n_rows` per diagonal
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Column of row `r` on diagonal `d`, if it lies inside the matrix
    pub fn column(&self, r: usize, d: usize) -> Option<usize> {
        let col = r as i64 + self.offsets[d] as i64;
        (col >= 0 && (col as usize) < self.n_cols).then_some(col as usize)
    }
}

impl SpmvKernel for SparseMatrixDIA {
    fn format(&self) -> FormatTag {
        FormatTag::Dia
    }

    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_cols(&self) -> usize {
        self.n_cols
    }

    fn thread_count(&self) -> usize {
        self.n_rows
    }

    fn kernel_args(&self) -> Vec<KernelArg<'_>> {
        vec![
            KernelArg::Values(&self.values),
            KernelArg::Offsets(&self.offsets),
            KernelArg::InputVector,
            KernelArg::OutputVector,
            KernelArg::Scalar(scalar(self.n_rows)),
            KernelArg::Scalar(scalar(self.n_cols)),
            KernelArg::Scalar(scalar(self.n_diagonals())),
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for d in 0..self.n_diagonals() {
            for r in 0..self.n_rows {
                let v = self.values[d * self.n_rows + r];
                // Zero-filled slots inside the matrix are padding too
                if let Some(c) = self.column(r, d).filter(|_| v != 0.0) {
                    f(r, c, v);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_diagonal() {
        let matrix = SparseMatrixDIA::new(3, 3, 1, vec![0], vec![2.0, 2.0, 2.0]).unwrap();

        let mut entries = Vec::new();
        matrix.for_each_entry(&mut |r, c, v| entries.push((r, c, v)));
        assert_eq!(entries, vec![(0, 0, 2.0), (1, 1, 2.0), (2, 2, 2.0)]);
    }

    #[test]
    fn test_out_of_range_slots_ignored() {
        // Super- and sub-diagonal of a 3x3 matrix; the first slot of the
        // sub-diagonal and the last of the super-diagonal fall outside.
        let matrix = SparseMatrixDIA::new(
            3,
            3,
            2,
            vec![-1, 1],
            vec![9.0, 1.0, 2.0, 3.0, 4.0, 9.0],
        )
        .unwrap();

        assert_eq!(matrix.column(0, 0), None);
        assert_eq!(matrix.column(2, 1), None);

        let mut entries = Vec::new();
        matrix.for_each_entry(&mut |r, c, v| entries.push((r, c, v)));
        assert_eq!(
            entries,
            vec![(1, 0, 1.0), (2, 1, 2.0), (0, 1, 3.0), (1, 2, 4.0)]
        );
    }

    #[test]
    fn test_zero_slots_skipped() {
        // Main diagonal plus a super-diagonal with a hole at row 1
        let matrix =
            SparseMatrixDIA::new(3, 3, 2, vec![0, 1], vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0])
                .unwrap();

        let mut entries = Vec::new();
        matrix.for_each_entry(&mut |r, c, v| entries.push((r, c, v)));
        assert_eq!(entries, vec![(0, 0, 1.0), (1, 1, 2.0), (2, 2, 3.0), (0, 1, 4.0)]);
    }

    #[test]
    fn test_values_length_checked() {
        let result = SparseMatrixDIA::new(3, 3, 2, vec![0, 1], vec![1.0; 3]);
        assert!(matches!(result, Err(LoadError::ShapeInvalid { .. })));
    }

    #[test]
    fn test_binding_order() {
        let matrix = SparseMatrixDIA::new(2, 4, 1, vec![1], vec![1.0, 1.0]).unwrap();
        let args = matrix.kernel_args();
        assert_eq!(args[1], KernelArg::Offsets(&[1]));
        assert_eq!(args[4], KernelArg::Scalar(2));
        assert_eq!(args[5], KernelArg::Scalar(4));
        assert_eq!(args[6], KernelArg::Scalar(1));
    }
}
