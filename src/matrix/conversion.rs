//! Conversion functions from CSR into the other layouts
//!
//! These build an equivalent matrix out of place; the source is never
//! modified. They exist so the same logical matrix can be multiplied in
//! every layout and the results compared.

use std::collections::BTreeMap;

use num_traits::ToPrimitive;

use crate::error::LoadError;
use crate::matrix::hyb::CooTail;
use crate::matrix::{
    SparseMatrixCOO, SparseMatrixCSC, SparseMatrixCSR, SparseMatrixDIA, SparseMatrixELL,
    SparseMatrixHYB, SpmvKernel,
};
use crate::matrix::FormatTag;
use crate::utils::exclusive_scan;

impl SparseMatrixCSR {
    /// Converts this CSR matrix to COO format, entries in row order
    pub fn to_coo(&self) -> Result<SparseMatrixCOO, LoadError> {
        let mut row = Vec::with_capacity(self.nnz());
        for r in 0..self.n_rows() {
            row.extend(std::iter::repeat(r as u32).take(self.row_len(r)));
        }

        SparseMatrixCOO::new(
            self.n_rows(),
            self.n_cols(),
            row,
            self.col_ind().to_vec(),
            self.data().to_vec(),
        )
    }

    /// Converts this CSR matrix to CSC format
    pub fn to_csc(&self) -> Result<SparseMatrixCSC, LoadError> {
        let mut col_counts = vec![0u32; self.n_cols()];
        for &col in self.col_ind() {
            col_counts[col as usize] += 1;
        }

        let col_ptr = exclusive_scan(&col_counts)
            .ok_or_else(|| LoadError::shape(FormatTag::Csc, "nnz does not fit in u32"))?;

        let nnz = self.nnz();
        let mut row_indices = vec![0u32; nnz];
        let mut values = vec![0.0f32; nnz];
        let mut next = col_ptr.clone();

        for r in 0..self.n_rows() {
            for (col, val) in self.row_iter(r) {
                let pos = next[col] as usize;
                row_indices[pos] = r as u32;
                values[pos] = val;
                next[col] += 1;
            }
        }

        SparseMatrixCSC::new(self.n_rows(), self.n_cols(), col_ptr, row_indices, values)
    }

    /// Length of the longest row
    pub fn max_row_len(&self) -> usize {
        (0..self.n_rows()).map(|r| self.row_len(r)).max().unwrap_or(0)
    }

    /// Converts this CSR matrix to ELL format with the narrowest width that
    /// holds every row
    pub fn to_ell(&self) -> Result<SparseMatrixELL, LoadError> {
        let width = self.max_row_len();
        let (indices, values) = self.ell_slots(width);
        SparseMatrixELL::new(self.n_rows(), self.n_cols(), width, indices, values)
    }

    /// Converts this CSR matrix to HYB format
    ///
    /// The first `width` entries of every row go to the ELL body; the rest
    /// go to the COO tail in row order.
    pub fn to_hyb(&self, width: usize) -> Result<SparseMatrixHYB, LoadError> {
        let (indices, values) = self.ell_slots(width);

        let mut tail = CooTail::default();
        for r in 0..self.n_rows() {
            for (col, val) in self.row_iter(r).skip(width) {
                tail.row.push(r as u32);
                tail.col.push(col as u32);
                tail.data.push(val);
            }
        }

        SparseMatrixHYB::new(self.n_rows(), self.n_cols(), width, indices, values, tail)
    }

    /// Converts this CSR matrix to DIA format, one diagonal per distinct
    /// `col - row` offset, ordered by offset
    pub fn to_dia(&self) -> Result<SparseMatrixDIA, LoadError> {
        let mut diagonals: BTreeMap<i64, usize> = BTreeMap::new();
        for r in 0..self.n_rows() {
            for (col, _) in self.row_iter(r) {
                diagonals.entry(col as i64 - r as i64).or_insert(0);
            }
        }

        let mut offsets = Vec::with_capacity(diagonals.len());
        for (d, (&offset, slot)) in diagonals.iter_mut().enumerate() {
            *slot = d;
            offsets.push(offset.to_i32().ok_or_else(|| {
                LoadError::shape(FormatTag::Dia, format!("offset {} does not fit in i32", offset))
            })?);
        }

        let n_rows = self.n_rows();
        let mut values = vec![0.0f32; offsets.len() * n_rows];
        for r in 0..n_rows {
            for (col, val) in self.row_iter(r) {
                let d = diagonals[&(col as i64 - r as i64)];
                values[d * n_rows + r] += val;
            }
        }

        SparseMatrixDIA::new(n_rows, self.n_cols(), offsets.len(), offsets, values)
    }

    /// Row-major padded slots holding the first `width` entries of each row
    fn ell_slots(&self, width: usize) -> (Vec<u32>, Vec<f32>) {
        let sentinel = self.n_cols() as u32;
        let mut indices = vec![sentinel; self.n_rows() * width];
        let mut values = vec![0.0f32; self.n_rows() * width];

        for r in 0..self.n_rows() {
            for (k, (col, val)) in self.row_iter(r).take(width).enumerate() {
                indices[r * width + k] = col as u32;
                values[r * width + k] = val;
            }
        }

        (indices, values)
    }
}

/// Chooses the ELL width for a HYB split
///
/// Returns the widest `k` such that at least a third of the rows hold `k`
/// or more entries, so the padded body stays mostly full and only long
/// rows spill into the tail.
pub fn ell_width_for(csr: &SparseMatrixCSR) -> usize {
    let n_rows = csr.n_rows();
    if n_rows == 0 {
        return 0;
    }

    let max_len = csr.max_row_len();
    let mut histogram = vec![0usize; max_len + 1];
    for r in 0..n_rows {
        histogram[csr.row_len(r)] += 1;
    }

    // Rows holding k or more entries, counted from the longest length down
    let mut rows_at_least = 0;
    for k in (1..=max_len).rev() {
        rows_at_least += histogram[k];
        if rows_at_least * 3 >= n_rows {
            return k;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    //    [1 2 0]
    //    [0 3 0]
    //    [4 0 5]
    fn sample() -> SparseMatrixCSR {
        SparseMatrixCSR::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap()
    }

    fn entries(m: &dyn SpmvKernel) -> Vec<(usize, usize, f32)> {
        let mut out = Vec::new();
        m.for_each_entry(&mut |r, c, v| out.push((r, c, v)));
        out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    #[test]
    fn test_csr_to_csc_conversion() {
        let csc = sample().to_csc().unwrap();

        assert_eq!(csc.col_ptr(), &[0, 2, 4, 5]);

        let col0: Vec<_> = csc.col_iter(0).collect();
        assert_eq!(col0, vec![(0, 1.0), (2, 4.0)]);

        let col1: Vec<_> = csc.col_iter(1).collect();
        assert_eq!(col1, vec![(0, 2.0), (1, 3.0)]);

        let col2: Vec<_> = csc.col_iter(2).collect();
        assert_eq!(col2, vec![(2, 5.0)]);
    }

    #[test]
    fn test_csr_to_coo_conversion() {
        let coo = sample().to_coo().unwrap();
        assert_eq!(coo.row(), &[0, 0, 1, 2, 2]);
        assert_eq!(entries(&coo), entries(&sample()));
    }

    #[test]
    fn test_csr_to_ell_conversion() {
        let ell = sample().to_ell().unwrap();

        assert_eq!(ell.width(), 2);
        assert_eq!(ell.indices(), &[0, 1, 1, 3, 0, 2]);
        assert_eq!(ell.values(), &[1.0, 2.0, 3.0, 0.0, 4.0, 5.0]);
        assert_eq!(entries(&ell), entries(&sample()));
    }

    #[test]
    fn test_csr_to_hyb_conversion() {
        let hyb = sample().to_hyb(1).unwrap();

        assert_eq!(hyb.ell_width(), 1);
        assert_eq!(hyb.tail_len(), 2);
        let tail: Vec<_> = hyb.tail_iter().collect();
        assert_eq!(tail, vec![(0, 1, 2.0), (2, 2, 5.0)]);
        assert_eq!(entries(&hyb), entries(&sample()));
    }

    #[test]
    fn test_csr_to_dia_conversion() {
        let dia = sample().to_dia().unwrap();

        assert_eq!(dia.offsets(), &[-2, 0, 1]);
        assert_eq!(entries(&dia), entries(&sample()));
    }

    #[test]
    fn test_ell_width_for() {
        // Row lengths 2, 1, 2: two thirds of the rows hold 2 entries
        assert_eq!(ell_width_for(&sample()), 2);

        // One long row among short ones spills into the tail
        let skewed = SparseMatrixCSR::new(
            4,
            4,
            vec![0, 4, 5, 6, 7],
            vec![0, 1, 2, 3, 0, 1, 2],
            vec![1.0; 7],
        )
        .unwrap();
        assert_eq!(ell_width_for(&skewed), 1);
    }
}
