//! Hybrid (HYB) matrix format: an ELL body plus a COO overflow tail

use crate::error::LoadError;
use crate::matrix::ell::{check_body, row_slots};
use crate::matrix::format::scalar;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix split into a fixed-width ELL body and a COO tail
///
/// Each row keeps up to `ell_width` entries in the ELL body; entries beyond
/// that width live in the tail, which has the same semantics as a COO
/// matrix (any order, duplicates accumulate).
///
/// One launch of `n_rows` threads handles both parts. Thread `r` adds its
/// ELL row sum into `y[r]` atomically, then walks the tail with a stride of
/// `n_rows` and atomically adds each product. Nothing is ever stored with a
/// plain write, so the tail extends the body's contribution instead of
/// replacing it.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrixHYB {
    n_rows: usize,
    n_cols: usize,
    ell_width: usize,
    ell_indices: Vec<u32>,
    ell_values: Vec<f32>,
    tail_row: Vec<u32>,
    tail_col: Vec<u32>,
    tail_data: Vec<f32>,
}

/// Overflow entries of a HYB matrix
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CooTail {
    /// Row index per entry
    pub row: Vec<u32>,
    /// Column index per entry
    pub col: Vec<u32>,
    /// Value per entry
    pub data: Vec<f32>,
}

impl SparseMatrixHYB {
    /// Creates a new HYB matrix
    ///
    /// The ELL body follows the same padding convention as
    /// [`SparseMatrixELL`](crate::matrix::SparseMatrixELL).
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        ell_width: usize,
        ell_indices: Vec<u32>,
        ell_values: Vec<f32>,
        tail: CooTail,
    ) -> Result<Self, LoadError> {
        const F: FormatTag = FormatTag::Hyb;

        check_body(F, n_rows, n_cols, ell_width, &ell_indices, &ell_values)?;

        let CooTail { row, col, data } = tail;
        validate::dimension(F, "COO_tail length", data.len())?;
        validate::length(F, "COO_tail.row", row.len(), data.len())?;
        validate::length(F, "COO_tail.col", col.len(), data.len())?;
        validate::indices_below(F, "COO_tail.row", &row, n_rows)?;
        validate::indices_below(F, "COO_tail.col", &col, n_cols)?;

        // Only rows with a full ELL body may spill into the tail
        let sentinel = n_cols as u32;
        for &r in &row {
            let start = r as usize * ell_width;
            if ell_indices[start..start + ell_width].contains(&sentinel) {
                return Err(LoadError::shape(
                    F,
                    format!("COO_tail holds row {} whose ELL body has free slots", r),
                ));
            }
        }

        Ok(Self {
            n_rows,
            n_cols,
            ell_width,
            ell_indices,
            ell_values,
            tail_row: row,
            tail_col: col,
            tail_data: data,
        })
    }

    /// Slots per row in the ELL body
    pub fn ell_width(&self) -> usize {
        self.ell_width
    }

    /// Column index per ELL slot
    pub fn ell_indices(&self) -> &[u32] {
        &self.ell_indices
    }

    /// Value per ELL slot
    pub fn ell_values(&self) -> &[f32] {
        &self.ell_values
    }

    /// Number of overflow entries
    pub fn tail_len(&self) -> usize {
        self.tail_data.len()
    }

    /// Iterates over the overflow triples
    pub fn tail_iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.tail_row
            .iter()
            .zip(&self.tail_col)
            .zip(&self.tail_data)
            .map(|((&r, &c), &v)| (r as usize, c as usize, v))
    }

    /// Iterates over the occupied ELL slots of row `r`
    pub fn ell_row_iter(&self, r: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        row_slots(&self.ell_indices, &self.ell_values, self.ell_width, self.n_cols, r)
    }
}

impl SpmvKernel for SparseMatrixHYB {
    fn format(&self) -> FormatTag {
        FormatTag::Hyb
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
            KernelArg::Indices(&self.ell_indices),
            KernelArg::Values(&self.ell_values),
            KernelArg::Indices(&self.tail_row),
            KernelArg::Indices(&self.tail_col),
            KernelArg::Values(&self.tail_data),
            KernelArg::InputVector,
            KernelArg::OutputVector,
            KernelArg::Scalar(scalar(self.n_rows)),
            KernelArg::Scalar(scalar(self.ell_width)),
            KernelArg::Scalar(scalar(self.tail_len())),
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for r in 0..self.n_rows {
            for (c, v) in self.ell_row_iter(r) {
                f(r, c, v);
            }
        }
        for (r, c, v) in self.tail_iter() {
            f(r, c, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overflowing() -> SparseMatrixHYB {
        // Row 0 has three entries, width 1 keeps one in the body
        SparseMatrixHYB::new(
            2,
            3,
            1,
            vec![0, 1],
            vec![1.0, 5.0],
            CooTail {
                row: vec![0, 0],
                col: vec![1, 2],
                data: vec![2.0, 3.0],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_entries_cover_body_and_tail() {
        let matrix = overflowing();
        let mut entries = Vec::new();
        matrix.for_each_entry(&mut |r, c, v| entries.push((r, c, v)));

        assert_eq!(
            entries,
            vec![(0, 0, 1.0), (1, 1, 5.0), (0, 1, 2.0), (0, 2, 3.0)]
        );
    }

    #[test]
    fn test_binding_order() {
        let matrix = overflowing();
        let args = matrix.kernel_args();

        assert_eq!(args.len(), 10);
        assert_eq!(args[2], KernelArg::Indices(&[0, 0]));
        assert_eq!(args[5], KernelArg::InputVector);
        assert_eq!(args[6], KernelArg::OutputVector);
        assert_eq!(args[7], KernelArg::Scalar(2));
        assert_eq!(args[8], KernelArg::Scalar(1));
        assert_eq!(args[9], KernelArg::Scalar(2));
    }

    #[test]
    fn test_tail_out_of_bounds() {
        let result = SparseMatrixHYB::new(
            1,
            1,
            1,
            vec![0],
            vec![1.0],
            CooTail {
                row: vec![1],
                col: vec![0],
                data: vec![1.0],
            },
        );
        assert!(matches!(result, Err(LoadError::ShapeInvalid { .. })));
    }

    #[test]
    fn test_tail_row_with_free_slots_rejected() {
        // Row 1 pads its only slot yet has a tail entry
        let result = SparseMatrixHYB::new(
            2,
            3,
            1,
            vec![0, 3],
            vec![1.0, 0.0],
            CooTail {
                row: vec![1],
                col: vec![2],
                data: vec![4.0],
            },
        );
        assert!(matches!(result, Err(LoadError::ShapeInvalid { .. })));
    }

    #[test]
    fn test_empty_tail() {
        let matrix =
            SparseMatrixHYB::new(1, 1, 1, vec![0], vec![2.0], CooTail::default()).unwrap();
        assert_eq!(matrix.tail_len(), 0);
        assert_eq!(matrix.kernel_args()[9], KernelArg::Scalar(0));
    }
}
