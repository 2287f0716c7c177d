//! Compressed Sparse Column (CSC) matrix format implementation

use std::fmt;

use crate::error::LoadError;
use crate::matrix::format::scalar;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix in Compressed Sparse Column (CSC) format
///
/// The CSC format stores a sparse matrix using three arrays:
/// - col_ptr: Array of size n_cols + 1 containing offsets into row_indices and values
/// - row_indices: Array of size nnz containing row indices of non-zero elements
/// - values: Array of size nnz containing the non-zero values
///
/// The kernel launches one thread per column. Thread `c` adds
/// `values[k] * x[c]` into `y[row_indices[k]]` for each entry of its
/// column, so different threads hit the same output row and every add is
/// atomic.
#[derive(Clone, PartialEq)]
pub struct SparseMatrixCSC {
    n_rows: usize,
    n_cols: usize,
    col_ptr: Vec<u32>,
    row_indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseMatrixCSC {
    /// Creates a new CSC matrix with the given dimensions and data
    ///
    /// # Arguments
    ///
    /// * `n_rows` - Number of rows
    /// * `n_cols` - Number of columns
    /// * `col_ptr` - Column pointers
    /// * `row_indices` - Row indices
    /// * `values` - Non-zero values
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShapeInvalid`] if the input arrays are inconsistent:
    /// - col_ptr.len() must be n_cols + 1, start at 0 and never decrease
    /// - row_indices.len() must equal values.len()
    /// - col_ptr[n_cols] must equal row_indices.len()
    /// - every row index must be below n_rows
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<u32>,
        row_indices: Vec<u32>,
        values: Vec<f32>,
    ) -> Result<Self, LoadError> {
        const F: FormatTag = FormatTag::Csc;

        validate::dimension(F, "num_rows", n_rows)?;
        validate::dimension(F, "num_cols", n_cols)?;
        validate::dimension(F, "nnz", row_indices.len())?;
        validate::length(F, "values", values.len(), row_indices.len())?;
        validate::pointer_array(F, "col_ptr", &col_ptr, n_cols, row_indices.len())?;
        validate::indices_below(F, "row_indices", &row_indices, n_rows)?;

        Ok(Self {
            n_rows,
            n_cols,
            col_ptr,
            row_indices,
            values,
        })
    }

    /// Column pointers (size: n_cols + 1)
    pub fn col_ptr(&self) -> &[u32] {
        &self.col_ptr
    }

    /// Row indices (size: nnz)
    pub fn row_indices(&self) -> &[u32] {
        &self.row_indices
    }

    /// Non-zero values (size: nnz)
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns an iterator over the non-zero elements in column j
    ///
    /// Each item is a tuple (row, value)
    pub fn col_iter(&self, j: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let start = self.col_ptr[j] as usize;
        let end = self.col_ptr[j + 1] as usize;

        self.row_indices[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&row, &val)| (row as usize, val))
    }
}

impl SpmvKernel for SparseMatrixCSC {
    fn format(&self) -> FormatTag {
        FormatTag::Csc
    }

    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_cols(&self) -> usize {
        self.n_cols
    }

    fn thread_count(&self) -> usize {
        self.n_cols
    }

    fn kernel_args(&self) -> Vec<KernelArg<'_>> {
        vec![
            KernelArg::Indices(&self.col_ptr),
            KernelArg::Indices(&self.row_indices),
            KernelArg::Values(&self.values),
            KernelArg::InputVector,
            KernelArg::OutputVector,
            KernelArg::Scalar(scalar(self.n_cols)),
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for col in 0..self.n_cols {
            for (row, val) in self.col_iter(col) {
                f(row, col, val);
            }
        }
    }
}

impl fmt::Debug for SparseMatrixCSC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrixCSC {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz())?;

        let max_cols_to_print = 5.min(self.n_cols);

        if max_cols_to_print > 0 {
            writeln!(f, "  content sample:")?;

            for j in 0..max_cols_to_print {
                write!(f, "    col {}: ", j)?;
                let len = (self.col_ptr[j + 1] - self.col_ptr[j]) as usize;

                if len == 0 {
                    writeln!(f, "(empty)")?;
                } else {
                    let max_elements = 5.min(len);

                    for (row, val) in self.col_iter(j).take(max_elements) {
                        write!(f, "({}, {:?}) ", row, val)?;
                    }

                    if len > max_elements {
                        write!(f, "... ({} more)", len - max_elements)?;
                    }

                    writeln!(f)?;
                }
            }

            if self.n_cols > max_cols_to_print {
                writeln!(f, "    ... ({} more columns)", self.n_cols - max_cols_to_print)?;
            }
        }

        write!(f, "}}")
    }
}
