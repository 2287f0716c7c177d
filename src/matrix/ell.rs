//! ELL (ELLPACK) matrix format implementation

use crate::error::LoadError;
use crate::matrix::format::scalar;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix stored as fixed-width padded rows
///
/// Row `r` occupies slots `[r * width, r * width + width)` of `indices` and
/// `values` (row-major). Rows with fewer than `width` entries are padded
/// with the sentinel column `n_cols` and value `0.0`, see
/// [`SparseMatrixELL::padding_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrixELL {
    n_rows: usize,
    n_cols: usize,
    width: usize,
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseMatrixELL {
    /// Creates a new ELL matrix
    ///
    /// # Arguments
    ///
    /// * `n_rows` - Number of rows
    /// * `n_cols` - Number of columns
    /// * `width` - Slots per row (`num_cols_per_row`)
    /// * `indices` - Column index per slot, `n_rows * width` entries
    /// * `values` - Value per slot, `n_rows * width` entries
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShapeInvalid`] on a length mismatch, a column
    /// index above the sentinel, or a sentinel slot holding a nonzero value.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        width: usize,
        indices: Vec<u32>,
        values: Vec<f32>,
    ) -> Result<Self, LoadError> {
        check_body(FormatTag::Ell, n_rows, n_cols, width, &indices, &values)?;

        Ok(Self {
            n_rows,
            n_cols,
            width,
            indices,
            values,
        })
    }

    /// Column index that marks an unused slot
    pub fn padding_index(&self) -> u32 {
        scalar(self.n_cols)
    }

    /// Slots per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Column index per slot
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Value per slot
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterates over the occupied slots of row `r`, skipping padding
    pub fn row_iter(&self, r: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        row_slots(&self.indices, &self.values, self.width, self.n_cols, r)
    }
}

/// Shape checks shared with the ELL body of a HYB matrix
pub(crate) fn check_body(
    format: FormatTag,
    n_rows: usize,
    n_cols: usize,
    width: usize,
    indices: &[u32],
    values: &[f32],
) -> Result<(), LoadError> {
    validate::dimension(format, "num_rows", n_rows)?;
    validate::dimension(format, "num_cols", n_cols)?;
    validate::dimension(format, "num_cols_per_row", width)?;
    let slots = validate::product(format, "num_rows * num_cols_per_row", n_rows, width)?;
    validate::dimension(format, "num_rows * num_cols_per_row", slots)?;
    validate::length(format, "indices", indices.len(), slots)?;
    validate::length(format, "values", values.len(), slots)?;
    validate::padded_slots(format, indices, values, n_cols)
}

pub(crate) fn row_slots<'a>(
    indices: &'a [u32],
    values: &'a [f32],
    width: usize,
    n_cols: usize,
    r: usize,
) -> impl Iterator<Item = (usize, f32)> + 'a {
    let start = r * width;
    indices[start..start + width]
        .iter()
        .zip(&values[start..start + width])
        .map(|(&c, &v)| (c as usize, v))
        .filter(move |&(c, _)| c < n_cols)
}

impl SpmvKernel for SparseMatrixELL {
    fn format(&self) -> FormatTag {
        FormatTag::Ell
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
            KernelArg::Indices(&self.indices),
            KernelArg::Values(&self.values),
            KernelArg::InputVector,
            KernelArg::OutputVector,
            KernelArg::Scalar(scalar(self.n_rows)),
            KernelArg::Scalar(scalar(self.width)),
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for r in 0..self.n_rows {
            for (c, v) in self.row_iter(r) {
                f(r, c, v);
            }
        }
    }
}
