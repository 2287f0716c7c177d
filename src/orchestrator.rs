//! Orchestrator: load, build `x`, dispatch
//!
//! Failures from any stage travel upward unchanged. Nothing partial is
//! ever returned: either the caller gets a complete `y` or an error.

use std::path::Path;

use log::{info, warn};

use crate::device::Accelerator;
use crate::dispatch::KernelDispatcher;
use crate::error::Result;
use crate::loader::load_matrix;
use crate::matrix::{reference_spmv, Comparison, FormatTag, SpmvConfig, SpmvKernel};
use crate::result::SpmvResult;

/// Relative tolerance used when checking a result against the host reference
pub const VERIFY_TOLERANCE: f64 = 1e-5;

/// Loads `path` as a `format` matrix and computes `A·x` on `accelerator`,
/// with `x` built from `config.x_policy`.
pub fn run_spmv<A>(
    format: FormatTag,
    path: impl AsRef<Path>,
    config: &SpmvConfig,
    accelerator: &mut A,
) -> Result<SpmvResult>
where
    A: Accelerator + ?Sized,
{
    let matrix = load_matrix(path, format)?;
    let x = config.x_policy.build(matrix.n_cols())?;
    KernelDispatcher::new(config).dispatch(accelerator, &matrix, &x)
}

/// An accelerator paired with the configuration it runs under
pub struct SpmvRunner<A> {
    accelerator: A,
    config: SpmvConfig,
}

impl<A: Accelerator> SpmvRunner<A> {
    /// Creates a runner
    pub fn new(accelerator: A, config: SpmvConfig) -> Self {
        Self {
            accelerator,
            config,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &SpmvConfig {
        &self.config
    }

    /// The underlying accelerator
    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Loads and multiplies one matrix file
    pub fn run(&mut self, format: FormatTag, path: impl AsRef<Path>) -> Result<SpmvResult> {
        run_spmv(format, path, &self.config, &mut self.accelerator)
    }

    /// Multiplies an in-memory matrix by the configured `x`
    pub fn run_matrix(&mut self, matrix: &dyn SpmvKernel) -> Result<SpmvResult> {
        let x = self.config.x_policy.build(matrix.n_cols())?;
        KernelDispatcher::new(&self.config).dispatch(&mut self.accelerator, matrix, &x)
    }

    /// Multiplies an in-memory matrix and checks `y` against the host
    /// reference product.
    pub fn run_verified(&mut self, matrix: &dyn SpmvKernel) -> Result<(SpmvResult, Comparison)> {
        let x = self.config.x_policy.build(matrix.n_cols())?;
        let result =
            KernelDispatcher::new(&self.config).dispatch(&mut self.accelerator, matrix, &x)?;

        let comparison = reference_spmv(matrix, &x).compare(result.y());
        if comparison.within(VERIFY_TOLERANCE) {
            info!(
                "{} verified, max error {:.3e}",
                result.format(),
                comparison.max_error
            );
        } else {
            warn!(
                "{} differs from the reference: max error {:.3e} at row {:?}",
                result.format(),
                comparison.max_error,
                comparison.worst_row
            );
        }
        Ok((result, comparison))
    }
}
