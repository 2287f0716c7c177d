//! Seeded random matrices for tests and benchmarks

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::LoadError;
use crate::matrix::SparseMatrixCSR;

/// Generates a random CSR matrix
///
/// Each row draws `round(n_cols * density)` column positions (duplicates
/// dropped, so rows end up with slightly varying lengths) and values in
/// `[-1, 1)`. A `seed` always yields the same matrix.
pub fn random_csr(
    n_rows: usize,
    n_cols: usize,
    density: f64,
    seed: u64,
) -> Result<SparseMatrixCSR, LoadError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let per_row = ((n_cols as f64) * density.clamp(0.0, 1.0)).round() as usize;

    let mut row_ptr = Vec::with_capacity(n_rows + 1);
    let mut col_ind = Vec::with_capacity(n_rows * per_row);
    let mut data = Vec::with_capacity(n_rows * per_row);

    row_ptr.push(0u32);
    for _ in 0..n_rows {
        let mut cols: Vec<u32> = (0..per_row)
            .map(|_| rng.gen_range(0..n_cols as u32))
            .collect();
        cols.sort_unstable();
        cols.dedup();

        for col in cols {
            col_ind.push(col);
            data.push(rng.gen_range(-1.0f32..1.0));
        }
        row_ptr.push(col_ind.len() as u32);
    }

    SparseMatrixCSR::new(n_rows, n_cols, row_ptr, col_ind, data)
}

/// Generates a random CSR matrix with skewed row lengths
///
/// Most rows hold `base` entries; every `period`-th row holds `base * 8`.
/// Useful to force a HYB split with a non-empty tail.
pub fn skewed_csr(
    n_rows: usize,
    n_cols: usize,
    base: usize,
    period: usize,
    seed: u64,
) -> Result<SparseMatrixCSR, LoadError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut row_ptr = vec![0u32];
    let mut col_ind = Vec::new();
    let mut data = Vec::new();

    for r in 0..n_rows {
        let len = if period > 0 && r % period == 0 { base * 8 } else { base };
        let mut cols: Vec<u32> = (0..len.min(n_cols))
            .map(|_| rng.gen_range(0..n_cols as u32))
            .collect();
        cols.sort_unstable();
        cols.dedup();

        for col in cols {
            col_ind.push(col);
            data.push(rng.gen_range(-1.0f32..1.0));
        }
        row_ptr.push(col_ind.len() as u32);
    }

    SparseMatrixCSR::new(n_rows, n_cols, row_ptr, col_ind, data)
}
