//! Structural checks shared by the layout constructors

use num_traits::ToPrimitive;

use crate::error::LoadError;
use crate::matrix::FormatTag;

/// Every dimension is passed to kernels as a 32-bit scalar
pub(crate) fn dimension(format: FormatTag, name: &str, value: usize) -> Result<(), LoadError> {
    if value.to_u32().is_none() {
        return Err(LoadError::shape(
            format,
            format!("{} = {} does not fit in 32 bits", name, value),
        ));
    }
    Ok(())
}

pub(crate) fn length(
    format: FormatTag,
    name: &str,
    actual: usize,
    expected: usize,
) -> Result<(), LoadError> {
    if actual != expected {
        return Err(LoadError::shape(
            format,
            format!("{} has length {}, expected {}", name, actual, expected),
        ));
    }
    Ok(())
}

/// `n * width` without overflow
pub(crate) fn product(
    format: FormatTag,
    name: &str,
    n: usize,
    width: usize,
) -> Result<usize, LoadError> {
    n.checked_mul(width)
        .ok_or_else(|| LoadError::shape(format, format!("{} overflows ({} x {})", name, n, width)))
}

/// Validates a CSR `row_ptr` or CSC `col_ptr` array.
///
/// The array must have `n + 1` entries, start at 0, never decrease and
/// end at `nnz`.
pub(crate) fn pointer_array(
    format: FormatTag,
    name: &str,
    ptr: &[u32],
    n: usize,
    nnz: usize,
) -> Result<(), LoadError> {
    length(format, name, ptr.len(), n + 1)?;

    if ptr[0] != 0 {
        return Err(LoadError::shape(
            format,
            format!("{}[0] is {}, expected 0", name, ptr[0]),
        ));
    }

    if let Some(i) = ptr.windows(2).position(|w| w[1] < w[0]) {
        return Err(LoadError::shape(
            format,
            format!(
                "{} is not monotonic: {}[{}] = {} > {}[{}] = {}",
                name,
                name,
                i,
                ptr[i],
                name,
                i + 1,
                ptr[i + 1]
            ),
        ));
    }

    if ptr[n] as usize != nnz {
        return Err(LoadError::shape(
            format,
            format!("{}[{}] is {}, expected nnz = {}", name, n, ptr[n], nnz),
        ));
    }

    Ok(())
}

/// Every entry of `indices` must lie in `[0, bound)`
pub(crate) fn indices_below(
    format: FormatTag,
    name: &str,
    indices: &[u32],
    bound: usize,
) -> Result<(), LoadError> {
    match indices.iter().position(|&i| i as usize >= bound) {
        Some(pos) => Err(LoadError::shape(
            format,
            format!(
                "{}[{}] = {} is out of range [0, {})",
                name, pos, indices[pos], bound
            ),
        )),
        None => Ok(()),
    }
}

/// Checks a padded ELL index/value pair.
///
/// An in-range column is always accepted. The sentinel `n_cols` is a
/// padding slot and must carry exactly zero. Anything larger is rejected.
pub(crate) fn padded_slots(
    format: FormatTag,
    indices: &[u32],
    values: &[f32],
    n_cols: usize,
) -> Result<(), LoadError> {
    for (slot, (&col, &val)) in indices.iter().zip(values).enumerate() {
        let col = col as usize;
        if col > n_cols {
            return Err(LoadError::shape(
                format,
                format!(
                    "indices[{}] = {} exceeds the padding sentinel {}",
                    slot, col, n_cols
                ),
            ));
        }
        if col == n_cols && val != 0.0 {
            return Err(LoadError::shape(
                format,
                format!("padding slot {} carries nonzero value {}", slot, val),
            ));
        }
    }
    Ok(())
}
