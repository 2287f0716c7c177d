//! Compressed Sparse Row (CSR) matrix format implementation

use std::fmt;

use crate::error::LoadError;
use crate::matrix::{validate, FormatTag, KernelArg, SpmvKernel};

/// A sparse matrix in Compressed Sparse Row (CSR) format
///
/// The CSR format stores a sparse matrix using three arrays:
/// - row_ptr: Array of size n_rows + 1 containing offsets into col_ind and data
/// - col_ind: Array of size nnz containing column indices of non-zero elements
/// - data: Array of size nnz containing the non-zero values
///
/// The kernel launches one thread per row. Thread `r` sums
/// `data[k] * x[col_ind[k]]` over `row_ptr[r]..row_ptr[r + 1]` and stores
/// the result in `y[r]`, so no two threads touch the same output.
#[derive(Clone, PartialEq)]
pub struct SparseMatrixCSR {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<u32>,
    col_ind: Vec<u32>,
    data: Vec<f32>,
}

impl SparseMatrixCSR {
    /// Creates a new CSR matrix with the given dimensions and data
    ///
    /// # Arguments
    ///
    /// * `n_rows` - Number of rows
    /// * `n_cols` - Number of columns
    /// * `row_ptr` - Row pointers
    /// * `col_ind` - Column indices
    /// * `data` - Non-zero values
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ShapeInvalid`] if the input arrays are inconsistent:
    /// - row_ptr.len() must be n_rows + 1, start at 0 and never decrease
    /// - col_ind.len() must equal data.len()
    /// - row_ptr[n_rows] must equal col_ind.len()
    /// - every column index must be below n_cols
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<u32>,
        col_ind: Vec<u32>,
        data: Vec<f32>,
    ) -> Result<Self, LoadError> {
        const F: FormatTag = FormatTag::Csr;

        validate::dimension(F, "num_rows", n_rows)?;
        validate::dimension(F, "num_cols", n_cols)?;
        validate::dimension(F, "nnz", col_ind.len())?;
        validate::length(F, "data", data.len(), col_ind.len())?;
        validate::pointer_array(F, "row_ptr", &row_ptr, n_rows, col_ind.len())?;
        validate::indices_below(F, "col_ind", &col_ind, n_cols)?;

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_ind,
            data,
        })
    }

    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Result<Self, LoadError> {
        let index = |i: usize| u32::try_from(i).unwrap_or(u32::MAX);
        let row_ptr = (0..=n).map(index).collect();
        let col_ind = (0..n).map(index).collect();
        Self::new(n, n, row_ptr, col_ind, vec![1.0; n])
    }

    /// Row pointers (size: n_rows + 1)
    pub fn row_ptr(&self) -> &[u32] {
        &self.row_ptr
    }

    /// Column indices (size: nnz)
    pub fn col_ind(&self) -> &[u32] {
        &self.col_ind
    }

    /// Non-zero values (size: nnz)
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Returns an iterator over the non-zero elements in row i
    ///
    /// Each item is a tuple (col, value)
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let start = self.row_ptr[i] as usize;
        let end = self.row_ptr[i + 1] as usize;

        self.col_ind[start..end]
            .iter()
            .zip(&self.data[start..end])
            .map(|(&col, &val)| (col as usize, val))
    }

    /// Number of stored entries in row i
    pub fn row_len(&self, i: usize) -> usize {
        (self.row_ptr[i + 1] - self.row_ptr[i]) as usize
    }
}

impl SpmvKernel for SparseMatrixCSR {
    fn format(&self) -> FormatTag {
        FormatTag::Csr
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
            KernelArg::Indices(&self.row_ptr),
            KernelArg::Indices(&self.col_ind),
            KernelArg::Values(&self.data),
            KernelArg::InputVector,
            KernelArg::OutputVector,
        ]
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        for row in 0..self.n_rows {
            for (col, val) in self.row_iter(row) {
                f(row, col, val);
            }
        }
    }
}

impl fmt::Debug for SparseMatrixCSR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrixCSR {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz())?;

        // Print a sample of the matrix content
        let max_rows_to_print = 5.min(self.n_rows);

        if max_rows_to_print > 0 {
            writeln!(f, "  content sample:")?;

            for i in 0..max_rows_to_print {
                write!(f, "    row {}: ", i)?;
                let len = self.row_len(i);

                if len == 0 {
                    writeln!(f, "(empty)")?;
                } else {
                    let max_elements = 5.min(len);

                    for (col, val) in self.row_iter(i).take(max_elements) {
                        write!(f, "({}, {:?}) ", col, val)?;
                    }

                    if len > max_elements {
                        write!(f, "... ({} more)", len - max_elements)?;
                    }

                    writeln!(f)?;
                }
            }

            if self.n_rows > max_rows_to_print {
                writeln!(f, "    ... ({} more rows)", self.n_rows - max_rows_to_print)?;
            }
        }

        write!(f, "}}")
    }
}
