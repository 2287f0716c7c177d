//! Host implementations of the six SpMV kernels
//!
//! Each kernel body runs for one logical thread index and addresses its
//! arguments positionally, exactly like the Metal kernels in
//! `spmv_kernels.metal`. Buffers are slices of `AtomicU32` words so that
//! scatter kernels can accumulate into `y` from many threads at once.

use std::sync::atomic::{AtomicU32, Ordering};

/// Kind of one positional argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Buffer,
    Scalar,
}

/// A bound argument as the kernel body sees it
#[derive(Debug, Clone, Copy)]
pub(crate) enum Slot<'a> {
    Words(&'a [AtomicU32]),
    Scalar(u32),
}

/// Positional arguments of one launch
///
/// Accessors index without checks beyond slice bounds. The signature was
/// validated at encode time; an out-of-range index inside a body panics
/// and the backend reports the launch as failed.
pub(crate) struct KernelArgs<'a> {
    slots: Vec<Slot<'a>>,
}

impl<'a> KernelArgs<'a> {
    pub(crate) fn new(slots: Vec<Slot<'a>>) -> Self {
        Self { slots }
    }

    fn words(&self, slot: usize) -> &'a [AtomicU32] {
        match self.slots[slot] {
            Slot::Words(w) => w,
            Slot::Scalar(_) => panic!("slot {} is a scalar, expected a buffer", slot),
        }
    }

    fn scalar(&self, slot: usize) -> usize {
        match self.slots[slot] {
            Slot::Scalar(v) => v as usize,
            Slot::Words(_) => panic!("slot {} is a buffer, expected a scalar", slot),
        }
    }

    fn u32_at(&self, slot: usize, i: usize) -> usize {
        self.words(slot)[i].load(Ordering::Relaxed) as usize
    }

    fn i32_at(&self, slot: usize, i: usize) -> i32 {
        self.words(slot)[i].load(Ordering::Relaxed) as i32
    }

    fn f32_at(&self, slot: usize, i: usize) -> f32 {
        f32::from_bits(self.words(slot)[i].load(Ordering::Relaxed))
    }

    fn store_f32(&self, slot: usize, i: usize, v: f32) {
        self.words(slot)[i].store(v.to_bits(), Ordering::Relaxed);
    }

    fn add_f32(&self, slot: usize, i: usize, v: f32) {
        atomic_add_f32(&self.words(slot)[i], v);
    }
}

/// Adds `v` to the f32 stored in `word` with a compare-and-swap loop
pub(crate) fn atomic_add_f32(word: &AtomicU32, v: f32) {
    let mut current = word.load(Ordering::Relaxed);
    loop {
        let next = (f32::from_bits(current) + v).to_bits();
        match word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// A named kernel with its positional signature
pub(crate) struct CpuKernel {
    pub name: &'static str,
    pub signature: &'static [SlotKind],
    pub body: fn(usize, &KernelArgs<'_>),
}

use SlotKind::{Buffer as B, Scalar as S};

static KERNELS: [CpuKernel; 6] = [
    CpuKernel {
        name: "csr_spmv",
        signature: &[B, B, B, B, B],
        body: csr_spmv,
    },
    CpuKernel {
        name: "coo_spmv",
        signature: &[B, B, B, B, B, S],
        body: coo_spmv,
    },
    CpuKernel {
        name: "ell_spmv",
        signature: &[B, B, B, B, S, S],
        body: ell_spmv,
    },
    CpuKernel {
        name: "hyb_spmv",
        signature: &[B, B, B, B, B, B, B, S, S, S],
        body: hyb_spmv,
    },
    CpuKernel {
        name: "dia_spmv",
        signature: &[B, B, B, B, S, S, S],
        body: dia_spmv,
    },
    CpuKernel {
        name: "csc_spmv",
        signature: &[B, B, B, B, B, S],
        body: csc_spmv,
    },
];

/// Finds a kernel by name
pub(crate) fn lookup(name: &str) -> Option<&'static CpuKernel> {
    KERNELS.iter().find(|k| k.name == name)
}

// row_ptr, col_ind, data, x, y
fn csr_spmv(row: usize, a: &KernelArgs<'_>) {
    let start = a.u32_at(0, row);
    let end = a.u32_at(0, row + 1);

    let mut sum = 0.0f32;
    for j in start..end {
        sum += a.f32_at(2, j) * a.f32_at(3, a.u32_at(1, j));
    }
    a.store_f32(4, row, sum);
}

// row, col, data, x, y, nnz
fn coo_spmv(i: usize, a: &KernelArgs<'_>) {
    if i >= a.scalar(5) {
        return;
    }
    let product = a.f32_at(2, i) * a.f32_at(3, a.u32_at(1, i));
    a.add_f32(4, a.u32_at(0, i), product);
}

/// Sum of one padded row; zero-valued slots are padding and never touch `x`
fn padded_row_sum(
    a: &KernelArgs<'_>,
    indices: usize,
    values: usize,
    x: usize,
    row: usize,
    width: usize,
) -> f32 {
    let mut sum = 0.0f32;
    for k in row * width..(row + 1) * width {
        let v = a.f32_at(values, k);
        if v != 0.0 {
            sum += v * a.f32_at(x, a.u32_at(indices, k));
        }
    }
    sum
}

// indices, values, x, y, num_rows, width
fn ell_spmv(row: usize, a: &KernelArgs<'_>) {
    if row >= a.scalar(4) {
        return;
    }
    let sum = padded_row_sum(a, 0, 1, 2, row, a.scalar(5));
    a.store_f32(3, row, sum);
}

// ell indices, ell values, tail row, tail col, tail data, x, y,
// num_rows, ell width, tail length
fn hyb_spmv(row: usize, a: &KernelArgs<'_>) {
    let n_rows = a.scalar(7);
    if row >= n_rows {
        return;
    }

    let body = padded_row_sum(a, 0, 1, 5, row, a.scalar(8));
    a.add_f32(6, row, body);

    let tail_len = a.scalar(9);
    let mut i = row;
    while i < tail_len {
        let product = a.f32_at(4, i) * a.f32_at(5, a.u32_at(3, i));
        a.add_f32(6, a.u32_at(2, i), product);
        i += n_rows;
    }
}

// values, offsets, x, y, num_rows, num_cols, num_diagonals
fn dia_spmv(row: usize, a: &KernelArgs<'_>) {
    let n_rows = a.scalar(4);
    if row >= n_rows {
        return;
    }
    let n_cols = a.scalar(5) as i64;

    let mut sum = 0.0f32;
    for d in 0..a.scalar(6) {
        let col = row as i64 + a.i32_at(1, d) as i64;
        if col >= 0 && col < n_cols {
            sum += a.f32_at(0, d * n_rows + row) * a.f32_at(2, col as usize);
        }
    }
    a.store_f32(3, row, sum);
}

// col_ptr, row_indices, values, x, y, num_cols
fn csc_spmv(col: usize, a: &KernelArgs<'_>) {
    if col >= a.scalar(5) {
        return;
    }
    let xc = a.f32_at(3, col);
    let start = a.u32_at(0, col);
    let end = a.u32_at(0, col + 1);
    for j in start..end {
        a.add_f32(4, a.u32_at(1, j), a.f32_at(2, j) * xc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn words(values: &[u32]) -> Vec<AtomicU32> {
        values.iter().map(|&v| AtomicU32::new(v)).collect()
    }

    fn floats(values: &[f32]) -> Vec<AtomicU32> {
        values.iter().map(|&v| AtomicU32::new(v.to_bits())).collect()
    }

    fn read(words: &[AtomicU32]) -> Vec<f32> {
        words
            .iter()
            .map(|w| f32::from_bits(w.load(Ordering::Relaxed)))
            .collect()
    }

    #[test]
    fn test_atomic_add_concurrent() {
        let word = Arc::new(AtomicU32::new(0.0f32.to_bits()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        atomic_add_f32(&word, 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(f32::from_bits(word.load(Ordering::Relaxed)), 8000.0);
    }

    #[test]
    fn test_registry_signatures() {
        assert_eq!(lookup("csr_spmv").unwrap().signature.len(), 5);
        assert_eq!(lookup("hyb_spmv").unwrap().signature.len(), 10);
        assert_eq!(lookup("dia_spmv").unwrap().signature.len(), 7);
        assert!(lookup("bsr_spmv").is_none());
    }

    #[test]
    fn test_ell_skips_sentinel() {
        // Row 0: (0, 2.0) + sentinel; row 1: (1, 3.0) + sentinel
        let indices = words(&[0, 2, 1, 2]);
        let values = floats(&[2.0, 0.0, 3.0, 0.0]);
        let x = floats(&[1.0, 1.0]);
        let y = floats(&[0.0, 0.0]);

        let args = KernelArgs::new(vec![
            Slot::Words(&indices),
            Slot::Words(&values),
            Slot::Words(&x),
            Slot::Words(&y),
            Slot::Scalar(2),
            Slot::Scalar(2),
        ]);
        for row in 0..2 {
            ell_spmv(row, &args);
        }
        assert_eq!(read(&y), vec![2.0, 3.0]);
    }

    #[test]
    fn test_dia_negative_offset() {
        // Sub-diagonal of a 3x3 matrix, all ones
        let values = floats(&[0.0, 1.0, 1.0]);
        let offsets = words(&[(-1i32) as u32]);
        let x = floats(&[1.0, 2.0, 3.0]);
        let y = floats(&[0.0; 3]);

        let args = KernelArgs::new(vec![
            Slot::Words(&values),
            Slot::Words(&offsets),
            Slot::Words(&x),
            Slot::Words(&y),
            Slot::Scalar(3),
            Slot::Scalar(3),
            Slot::Scalar(1),
        ]);
        for row in 0..3 {
            dia_spmv(row, &args);
        }
        assert_eq!(read(&y), vec![0.0, 1.0, 2.0]);
    }
}
