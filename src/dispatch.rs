//! Kernel dispatcher
//!
//! One generic pipeline for every layout, driven by the format's
//! [`SpmvKernel`] descriptor:
//!
//! 1. compile the kernel (fails before any buffer exists)
//! 2. marshal arguments into device buffers
//! 3. encode one launch with the format's geometry
//! 4. submit and block until completion
//! 5. read `y` back
//!
//! A zero thread count skips steps 2 to 4 entirely.

use std::time::Duration;

use log::{debug, info};

use crate::device::{Accelerator, LaunchGeometry};
use crate::error::SpmvError;
use crate::marshal::MatrixBuffers;
use crate::matrix::{SpmvConfig, SpmvKernel};
use crate::result::SpmvResult;

/// Where an invocation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing allocated
    Unbound,
    /// Buffers created and bound
    BuffersBound,
    /// Launch submitted, waiting for completion
    Dispatched,
    /// `y` is final and readable
    Completed,
}

/// Runs format kernels on an accelerator
#[derive(Debug)]
pub struct KernelDispatcher<'c> {
    config: &'c SpmvConfig,
    state: DispatchState,
}

impl<'c> KernelDispatcher<'c> {
    /// Creates a dispatcher using `config` for launch geometry
    pub fn new(config: &'c SpmvConfig) -> Self {
        Self {
            config,
            state: DispatchState::Unbound,
        }
    }

    /// State reached by the last invocation
    pub fn state(&self) -> DispatchState {
        self.state
    }

    fn advance(&mut self, next: DispatchState) {
        debug!("dispatch {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Computes `y = A·x` for `matrix` on `accelerator`.
    ///
    /// On error every buffer created for the invocation has been released
    /// and no partial `y` is returned.
    pub fn dispatch<A>(
        &mut self,
        accelerator: &mut A,
        matrix: &dyn SpmvKernel,
        x: &[f32],
    ) -> Result<SpmvResult, SpmvError>
    where
        A: Accelerator + ?Sized,
    {
        self.state = DispatchState::Unbound;
        let format = matrix.format();

        if x.len() != matrix.n_cols() {
            return Err(SpmvError::VectorLength {
                expected: matrix.n_cols(),
                got: x.len(),
            });
        }

        let pipeline = accelerator.compile_pipeline(matrix.kernel_name())?;

        // A zero-row CSC still has n_cols threads; nothing can land in y
        let threads = matrix.thread_count();
        if matrix.n_rows() == 0 || threads == 0 {
            debug!("{}: zero threads, nothing to launch", format);
            self.advance(DispatchState::Completed);
            return Ok(
                SpmvResult::new(format, vec![0.0; matrix.n_rows()], Duration::ZERO)
                    .with_preview_len(self.config.preview_len),
            );
        }

        let buffers = MatrixBuffers::create(&*accelerator, matrix, x)?;
        debug!("{}: {} buffers created", format, buffers.buffer_count());
        self.advance(DispatchState::BuffersBound);

        let geometry = LaunchGeometry::for_kernel(
            matrix.accumulation(),
            threads,
            accelerator.max_threads_per_group(&pipeline),
            self.config,
        );
        debug!(
            "{}: {} threads in {} groups of {}",
            matrix.kernel_name(),
            geometry.threads,
            geometry.groups(),
            geometry.threads_per_group
        );

        accelerator.encode(&pipeline, &buffers.bindings(), geometry)?;
        self.advance(DispatchState::Dispatched);

        let elapsed = accelerator.submit_and_wait()?;
        self.advance(DispatchState::Completed);

        let result = SpmvResult::read_back(&*accelerator, &buffers, format, elapsed)?
            .with_preview_len(self.config.preview_len);
        info!(
            "{} on {}: {:.3} ms",
            format,
            accelerator.name(),
            result.elapsed_ms()
        );
        Ok(result)
    }
}
