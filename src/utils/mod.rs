//! Small helpers shared by the format conversions

/// Exclusive prefix sum of per-bucket counts, as a `u32` pointer array
///
/// The output has `counts.len() + 1` entries, starting at 0 and ending at
/// the total. Returns `None` if the total does not fit in `u32`.
pub fn exclusive_scan(counts: &[u32]) -> Option<Vec<u32>> {
    let mut ptr = Vec::with_capacity(counts.len() + 1);
    let mut total = 0u32;
    ptr.push(total);
    for &count in counts {
        total = total.checked_add(count)?;
        ptr.push(total);
    }
    Some(ptr)
}
