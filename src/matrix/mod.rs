// Matrix data structures and operations

pub mod config;
pub mod conversion;
pub mod coo;
pub mod csc;
pub mod csr;
pub mod dia;
pub mod ell;
pub mod format;
pub mod hyb;
pub mod random;
pub mod reference;
mod validate;

pub use config::{BackendKind, SpmvConfig, SystemParameters, XPolicy};
pub use conversion::ell_width_for;
pub use coo::SparseMatrixCOO;
pub use csc::SparseMatrixCSC;
pub use csr::SparseMatrixCSR;
pub use dia::SparseMatrixDIA;
pub use ell::SparseMatrixELL;
pub use format::{Accumulation, FormatTag, KernelArg, ParseFormatError, SparseMatrix, SpmvKernel};
pub use hyb::{CooTail, SparseMatrixHYB};
pub use random::{random_csr, skewed_csr};
pub use reference::{reference_spmv, Comparison, ReferenceProduct};
