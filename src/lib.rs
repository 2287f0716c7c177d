//! # spmv-bench: sparse matrix-vector multiplication across storage layouts
//!
//! Computes `y = A·x` for one sparse matrix stored in any of six layouts
//! (CSR, COO, ELL, HYB, DIA, CSC) on a data-parallel accelerator, and
//! reports the result with the kernel's execution time.
//!
//! ## Overview
//!
//! - **Loader**: reads a JSON matrix file and validates its structure
//! - **Marshaller**: turns the layout's arrays into device buffers
//! - **Dispatcher**: compiles the layout's kernel, picks the launch
//!   geometry, binds arguments in a fixed order, launches and waits
//! - **Result reader**: copies `y` back and keeps the elapsed time
//! - **Orchestrator**: ties the four together
//!
//! Every layout describes itself through [`SpmvKernel`], so there is one
//! pipeline for all six rather than one per layout.
//!
//! ## Accumulation
//!
//! CSR, ELL and DIA kernels gather: one thread owns one output row. COO
//! and CSC kernels scatter: many threads add into the same row, so every
//! write is an atomic add. HYB does both in a single launch.
//!
//! ## Usage
//!
//! ```
//! use spmv_bench::{CpuAccelerator, SparseMatrixCSR, SpmvConfig, SpmvRunner, XPolicy};
//!
//! let a = SparseMatrixCSR::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1.0, 2.0, 3.0]).unwrap();
//!
//! let config = SpmvConfig {
//!     x_policy: XPolicy::Explicit(vec![1.0, 2.0]),
//!     ..SpmvConfig::default()
//! };
//! let accelerator = CpuAccelerator::new(&config.system_params).unwrap();
//! let mut runner = SpmvRunner::new(accelerator, config);
//!
//! let result = runner.run_matrix(&a).unwrap();
//! assert_eq!(result.y(), &[5.0, 6.0]);
//! ```

pub mod device;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod marshal;
pub mod matrix;
pub mod orchestrator;
pub mod result;
pub mod utils;

// Re-export primary components
pub use device::cpu::CpuAccelerator;
pub use device::{Accelerator, Binding, LaunchGeometry};
pub use dispatch::{DispatchState, KernelDispatcher};
pub use error::{DeviceError, LoadError, SpmvError};
pub use loader::{detect_format, load_matrix, parse_matrix};
pub use matrix::{
    ell_width_for, random_csr, reference_spmv, Accumulation, BackendKind, Comparison, CooTail,
    FormatTag, SparseMatrix, SparseMatrixCOO, SparseMatrixCSC, SparseMatrixCSR, SparseMatrixDIA,
    SparseMatrixELL, SparseMatrixHYB, SpmvConfig, SpmvKernel, SystemParameters, XPolicy,
};
pub use orchestrator::{run_spmv, SpmvRunner, VERIFY_TOLERANCE};
pub use result::SpmvResult;

#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
pub use device::metal::MetalAccelerator;
