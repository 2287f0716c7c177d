//! Reference implementation of SpMV on the host
//!
//! This provides a baseline for correctness testing of the accelerator
//! kernels. The product is computed in f64 from the logical
//! `(row, col, value)` entries of any layout, with duplicates summed, so it
//! is independent of how a layout stores or orders its entries.

use ndarray::Array1;
use sprs::{CsMat, TriMat};

use crate::matrix::SpmvKernel;

/// Dense reference product `A·x` plus the per-row magnitude `|A|·|x|`
#[derive(Debug, Clone)]
pub struct ReferenceProduct {
    y: Vec<f64>,
    magnitude: Vec<f64>,
}

/// Outcome of comparing an accelerator result against the reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Largest scaled error over all rows
    pub max_error: f64,
    /// Row where it occurred, `None` for an empty vector
    pub worst_row: Option<usize>,
}

impl Comparison {
    /// Whether every row is within `rel_tol`
    pub fn within(&self, rel_tol: f64) -> bool {
        self.max_error <= rel_tol
    }
}

/// Performs `y = A·x` on the host as a reference
pub fn reference_spmv(matrix: &dyn SpmvKernel, x: &[f32]) -> ReferenceProduct {
    assert_eq!(
        x.len(),
        matrix.n_cols(),
        "Input vector length must equal the number of columns"
    );

    let n_rows = matrix.n_rows();
    if n_rows == 0 {
        return ReferenceProduct {
            y: Vec::new(),
            magnitude: Vec::new(),
        };
    }

    let shape = (n_rows, matrix.n_cols());
    let mut signed = TriMat::new(shape);
    let mut absolute = TriMat::new(shape);
    matrix.for_each_entry(&mut |r, c, v| {
        signed.add_triplet(r, c, v as f64);
        absolute.add_triplet(r, c, (v as f64).abs());
    });

    // Duplicate triplets are summed by the conversion
    let a: CsMat<f64> = signed.to_csr();
    let a_abs: CsMat<f64> = absolute.to_csr();

    let x64: Array1<f64> = x.iter().map(|&v| v as f64).collect();
    let x_abs = x64.mapv(f64::abs);

    let y = &a * &x64;
    let magnitude = &a_abs * &x_abs;

    ReferenceProduct {
        y: y.to_vec(),
        magnitude: magnitude.to_vec(),
    }
}

impl ReferenceProduct {
    /// Reference output vector
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Compares `y` against the reference.
    ///
    /// The error of row `r` is `|y[r] - ref[r]|` divided by
    /// `max(1, |A|·|x|)[r]`. Scaling by the magnitude of the summed terms
    /// rather than by `|ref[r]|` keeps rows with heavy cancellation from
    /// reporting spurious failures.
    pub fn compare(&self, y: &[f32]) -> Comparison {
        assert_eq!(y.len(), self.y.len(), "Result length must equal the number of rows");

        let mut result = Comparison {
            max_error: 0.0,
            worst_row: None,
        };

        for (r, ((&got, &want), &mag)) in y.iter().zip(&self.y).zip(&self.magnitude).enumerate() {
            let err = (got as f64 - want).abs() / mag.max(1.0);
            if result.worst_row.is_none() || err > result.max_error {
                result.max_error = err;
                result.worst_row = Some(r);
            }
        }

        result
    }
}
