//! Format descriptors shared by every storage layout
//!
//! Each layout describes itself to the dispatcher through [`SpmvKernel`]:
//! which kernel to run, how many logical threads to launch, how the
//! threads accumulate into `y`, and the positional argument list the
//! kernel expects. The dispatcher and marshaller never match on a
//! concrete layout.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{
    SparseMatrixCOO, SparseMatrixCSC, SparseMatrixCSR, SparseMatrixDIA, SparseMatrixELL,
    SparseMatrixHYB,
};

/// The six interchangeable storage layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// Compressed sparse row
    Csr,
    /// Coordinate list
    Coo,
    /// Fixed-width padded rows (ELLPACK)
    Ell,
    /// ELL body with a COO overflow tail
    Hyb,
    /// Constant-offset diagonals
    Dia,
    /// Compressed sparse column
    Csc,
}

impl FormatTag {
    /// Every layout, in the order results are usually reported
    pub const ALL: [FormatTag; 6] = [
        FormatTag::Csr,
        FormatTag::Coo,
        FormatTag::Ell,
        FormatTag::Hyb,
        FormatTag::Dia,
        FormatTag::Csc,
    ];

    /// Discriminator as written in the `format` field of a matrix file
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Csr => "CSR",
            FormatTag::Coo => "COO",
            FormatTag::Ell => "ELL",
            FormatTag::Hyb => "HYB",
            FormatTag::Dia => "DIA",
            FormatTag::Csc => "CSC",
        }
    }

    /// Name of the accelerator kernel that multiplies this layout
    pub fn kernel_name(&self) -> &'static str {
        match self {
            FormatTag::Csr => "csr_spmv",
            FormatTag::Coo => "coo_spmv",
            FormatTag::Ell => "ell_spmv",
            FormatTag::Hyb => "hyb_spmv",
            FormatTag::Dia => "dia_spmv",
            FormatTag::Csc => "csc_spmv",
        }
    }

    /// How the kernel's threads write into `y`
    pub fn accumulation(&self) -> Accumulation {
        match self {
            FormatTag::Csr | FormatTag::Ell | FormatTag::Dia => Accumulation::Gather,
            FormatTag::Coo | FormatTag::Csc => Accumulation::Scatter,
            FormatTag::Hyb => Accumulation::Mixed,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known layout
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown sparse format '{0}' (expected one of CSR, COO, ELL, HYB, DIA, CSC)")]
pub struct ParseFormatError(pub String);

impl FromStr for FormatTag {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

/// Accumulation strategy of a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Each thread owns one output slot and stores it once
    Gather,
    /// Threads share output slots and must add atomically
    Scatter,
    /// Gather body plus an atomically accumulated scatter tail
    Mixed,
}

impl Accumulation {
    /// Whether concurrent threads may write the same element of `y`
    pub fn has_write_conflicts(&self) -> bool {
        !matches!(self, Accumulation::Gather)
    }
}

/// One positional kernel argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelArg<'a> {
    /// Unsigned 32-bit index array
    Indices(&'a [u32]),
    /// Signed 32-bit offset array (DIA)
    Offsets(&'a [i32]),
    /// Nonzero values
    Values(&'a [f32]),
    /// The dense input vector `x`
    InputVector,
    /// The zero-filled output vector `y`
    OutputVector,
    /// Inline 32-bit constant
    Scalar(u32),
}

/// Format descriptor consumed by the marshaller and dispatcher
pub trait SpmvKernel {
    /// Layout of this matrix
    fn format(&self) -> FormatTag;

    /// Number of rows (length of `y`)
    fn n_rows(&self) -> usize;

    /// Number of columns (length of `x`)
    fn n_cols(&self) -> usize;

    /// Number of logical threads the kernel is launched with
    fn thread_count(&self) -> usize;

    /// Kernel arguments in binding-slot order
    fn kernel_args(&self) -> Vec<KernelArg<'_>>;

    /// Visits every stored `(row, col, value)` that contributes to the product
    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32));

    /// Kernel identifier
    fn kernel_name(&self) -> &'static str {
        self.format().kernel_name()
    }

    /// Accumulation strategy
    fn accumulation(&self) -> Accumulation {
        self.format().accumulation()
    }
}

/// A loaded matrix in any of the six layouts
#[derive(Debug, Clone)]
pub enum SparseMatrix {
    Csr(SparseMatrixCSR),
    Coo(SparseMatrixCOO),
    Ell(SparseMatrixELL),
    Hyb(SparseMatrixHYB),
    Dia(SparseMatrixDIA),
    Csc(SparseMatrixCSC),
}

impl SparseMatrix {
    fn inner(&self) -> &dyn SpmvKernel {
        match self {
            SparseMatrix::Csr(m) => m,
            SparseMatrix::Coo(m) => m,
            SparseMatrix::Ell(m) => m,
            SparseMatrix::Hyb(m) => m,
            SparseMatrix::Dia(m) => m,
            SparseMatrix::Csc(m) => m,
        }
    }
}

impl SpmvKernel for SparseMatrix {
    fn format(&self) -> FormatTag {
        self.inner().format()
    }

    fn n_rows(&self) -> usize {
        self.inner().n_rows()
    }

    fn n_cols(&self) -> usize {
        self.inner().n_cols()
    }

    fn thread_count(&self) -> usize {
        self.inner().thread_count()
    }

    fn kernel_args(&self) -> Vec<KernelArg<'_>> {
        self.inner().kernel_args()
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f32)) {
        self.inner().for_each_entry(f)
    }
}

macro_rules! impl_from_layout {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SparseMatrix {
                fn from(m: $ty) -> Self {
                    SparseMatrix::$variant(m)
                }
            }
        )*
    };
}

impl_from_layout! {
    Csr => SparseMatrixCSR,
    Coo => SparseMatrixCOO,
    Ell => SparseMatrixELL,
    Hyb => SparseMatrixHYB,
    Dia => SparseMatrixDIA,
    Csc => SparseMatrixCSC,
}

/// Narrows a dimension that construction already checked against `u32::MAX`
pub(crate) fn scalar(v: usize) -> u32 {
    debug_assert!(v <= u32::MAX as usize);
    v as u32
}
