//! Metal backend using the metal-rs crate
//!
//! Compiles `spmv_kernels.metal` from source when the accelerator is
//! created, so a missing toolchain or a shader error surfaces as
//! `DeviceInitFailure` before any matrix is touched.

#![cfg(all(target_arch = "aarch64", target_os = "macos"))]

use std::ffi::c_void;
use std::mem;
use std::time::{Duration, Instant};

use log::{debug, trace};
use metal::{
    Buffer, CommandBuffer, CommandQueue, CompileOptions, ComputePipelineState, Device, Library,
    MTLCommandBufferStatus, MTLLanguageVersion, MTLResourceOptions, MTLSize,
};

use super::{Accelerator, Binding, LaunchGeometry};
use crate::error::DeviceError;

const SHADER_SOURCE: &str = include_str!("spmv_kernels.metal");

/// A device buffer plus its logical byte length
///
/// Zero-length arrays are backed by a one-word allocation that no kernel
/// reads, since Metal refuses empty buffers.
pub struct MetalBuffer {
    buffer: Buffer,
    len: usize,
}

/// Accelerator backed by the system default Metal device
pub struct MetalAccelerator {
    device: Device,
    queue: CommandQueue,
    library: Library,
    pending: Option<CommandBuffer>,
}

impl MetalAccelerator {
    /// Opens the default device and compiles the kernel library
    pub fn new() -> Result<Self, DeviceError> {
        let device = Device::system_default()
            .ok_or_else(|| DeviceError::DeviceInitFailure("no Metal device".to_string()))?;

        let options = CompileOptions::new();
        options.set_language_version(MTLLanguageVersion::V3_0);
        let library = device
            .new_library_with_source(SHADER_SOURCE, &options)
            .map_err(|e| DeviceError::DeviceInitFailure(format!("shader compile: {}", e)))?;

        let queue = device.new_command_queue();
        debug!("metal accelerator on {}", device.name());

        Ok(Self {
            device,
            queue,
            library,
            pending: None,
        })
    }

    /// Whether a Metal device is present
    pub fn is_available() -> bool {
        Device::system_default().is_some()
    }
}

impl Accelerator for MetalAccelerator {
    type Buffer = MetalBuffer;
    type Pipeline = ComputePipelineState;

    fn name(&self) -> &'static str {
        "metal"
    }

    fn compile_pipeline(&self, kernel: &str) -> Result<ComputePipelineState, DeviceError> {
        let compile_failure = |reason: String| DeviceError::KernelCompileFailure {
            kernel: kernel.to_string(),
            reason,
        };

        let function = self
            .library
            .get_function(kernel, None)
            .map_err(compile_failure)?;
        self.device
            .new_compute_pipeline_state_with_function(&function)
            .map_err(compile_failure)
    }

    fn max_threads_per_group(&self, pipeline: &ComputePipelineState) -> usize {
        pipeline.max_total_threads_per_threadgroup() as usize
    }

    fn create_buffer(&self, bytes: &[u8]) -> Result<MetalBuffer, DeviceError> {
        let buffer = if bytes.is_empty() {
            self.device
                .new_buffer(mem::size_of::<u32>() as u64, MTLResourceOptions::StorageModeShared)
        } else {
            self.device.new_buffer_with_data(
                bytes.as_ptr() as *const c_void,
                bytes.len() as u64,
                MTLResourceOptions::StorageModeShared,
            )
        };

        if buffer.contents().is_null() {
            return Err(DeviceError::DeviceAllocationFailure {
                bytes: bytes.len(),
                reason: "device returned no storage".to_string(),
            });
        }

        trace!("metal buffer of {} bytes", bytes.len());
        Ok(MetalBuffer {
            buffer,
            len: bytes.len(),
        })
    }

    fn encode(
        &mut self,
        pipeline: &ComputePipelineState,
        bindings: &[Binding<'_, MetalBuffer>],
        geometry: LaunchGeometry,
    ) -> Result<(), DeviceError> {
        let command_buffer = self
            .pending
            .get_or_insert_with(|| self.queue.new_command_buffer().to_owned());

        let encoder = command_buffer.new_compute_command_encoder();
        encoder.set_compute_pipeline_state(pipeline);

        for (slot, binding) in bindings.iter().enumerate() {
            match binding {
                Binding::Buffer(b) => encoder.set_buffer(slot as u64, Some(&b.buffer), 0),
                Binding::Scalar(v) => encoder.set_bytes(
                    slot as u64,
                    mem::size_of::<u32>() as u64,
                    v as *const u32 as *const c_void,
                ),
            }
        }

        // Exact grid; Apple GPUs support a partial last threadgroup
        encoder.dispatch_threads(
            MTLSize::new(geometry.threads as u64, 1, 1),
            MTLSize::new(geometry.threads_per_group as u64, 1, 1),
        );
        encoder.end_encoding();
        Ok(())
    }

    fn submit_and_wait(&mut self) -> Result<Duration, DeviceError> {
        let Some(command_buffer) = self.pending.take() else {
            return Ok(Duration::ZERO);
        };

        let start = Instant::now();
        command_buffer.commit();
        command_buffer.wait_until_completed();
        let elapsed = start.elapsed();

        if command_buffer.status() == MTLCommandBufferStatus::Error {
            return Err(DeviceError::DispatchFailure(
                "command buffer completed with an error".to_string(),
            ));
        }
        Ok(elapsed)
    }

    fn read_buffer(&self, buffer: &MetalBuffer, len: usize) -> Result<Vec<f32>, DeviceError> {
        if len * mem::size_of::<f32>() > buffer.len {
            return Err(DeviceError::DispatchFailure(format!(
                "read of {} values from a {} byte buffer",
                len, buffer.len
            )));
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let ptr = buffer.buffer.contents() as *const f32;
        // Shared storage; the command buffer has completed
        let values = unsafe { std::slice::from_raw_parts(ptr, len) };
        Ok(values.to_vec())
    }
}
