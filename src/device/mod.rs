//! Accelerator abstraction
//!
//! The dispatcher drives any backend through [`Accelerator`]: compile a
//! named kernel, upload byte buffers, encode one launch with positional
//! bindings, submit, wait, read back. Two backends implement it:
//!
//! - [`cpu::CpuAccelerator`]: host threads on a rayon pool, available everywhere
//! - `metal::MetalAccelerator`: Apple GPU, compiled only on aarch64 macOS

use std::time::Duration;

use crate::error::DeviceError;
use crate::matrix::{Accumulation, SpmvConfig};

pub mod cpu;
mod cpu_kernels;

#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
pub mod metal;

/// One positional kernel binding
#[derive(Debug)]
pub enum Binding<'a, B> {
    /// A device buffer
    Buffer(&'a B),
    /// An inline 32-bit constant
    Scalar(u32),
}

// Manual impls: a derive would require `B: Clone`.
impl<B> Clone for Binding<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for Binding<'_, B> {}

/// One-dimensional launch geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    /// Logical threads, one per index in `[0, threads)`
    pub threads: usize,
    /// Threads per group
    pub threads_per_group: usize,
}

impl LaunchGeometry {
    /// Picks the group width for a kernel.
    ///
    /// Gather kernels use the pipeline's maximum, optionally capped by
    /// `config.max_threadgroup_width`, and never wider than the thread
    /// count. Scatter and mixed kernels use the fixed
    /// `config.scatter_threadgroup_width`.
    pub fn for_kernel(
        accumulation: Accumulation,
        threads: usize,
        pipeline_max: usize,
        config: &SpmvConfig,
    ) -> Self {
        let width = if accumulation.has_write_conflicts() {
            config.scatter_threadgroup_width
        } else {
            let cap = config.max_threadgroup_width.unwrap_or(pipeline_max);
            pipeline_max.min(cap).min(threads)
        };

        Self {
            threads,
            threads_per_group: width.max(1),
        }
    }

    /// Number of threadgroups, the last one possibly partial
    pub fn groups(&self) -> usize {
        self.threads.div_ceil(self.threads_per_group)
    }
}

/// A compute device that can run the SpMV kernels
pub trait Accelerator {
    /// Device-resident buffer
    type Buffer;
    /// Compiled kernel
    type Pipeline;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Looks up a kernel by name and builds its pipeline
    fn compile_pipeline(&self, kernel: &str) -> Result<Self::Pipeline, DeviceError>;

    /// Widest threadgroup the pipeline supports
    fn max_threads_per_group(&self, pipeline: &Self::Pipeline) -> usize;

    /// Creates a buffer initialized with `bytes`
    fn create_buffer(&self, bytes: &[u8]) -> Result<Self::Buffer, DeviceError>;

    /// Records one launch of `pipeline` with positional `bindings`
    fn encode(
        &mut self,
        pipeline: &Self::Pipeline,
        bindings: &[Binding<'_, Self::Buffer>],
        geometry: LaunchGeometry,
    ) -> Result<(), DeviceError>;

    /// Runs everything encoded so far and blocks until it completes.
    ///
    /// Returns the time spent between submission and completion.
    fn submit_and_wait(&mut self) -> Result<Duration, DeviceError>;

    /// Reads the first `len` f32 values of a buffer
    fn read_buffer(&self, buffer: &Self::Buffer, len: usize) -> Result<Vec<f32>, DeviceError>;
}
