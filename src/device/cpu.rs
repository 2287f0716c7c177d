//! Host backend: kernels run on a dedicated rayon pool
//!
//! Buffers are shared arrays of `AtomicU32` words. A launch covers the
//! logical indices `[0, threads)` group by group; groups run in parallel
//! with no ordering among them, like threadgroups on a GPU.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::cpu_kernels::{self, CpuKernel, KernelArgs, Slot, SlotKind};
use super::{Accelerator, Binding, LaunchGeometry};
use crate::error::DeviceError;
use crate::matrix::SystemParameters;

/// Widest threadgroup the host backend reports by default
pub const DEFAULT_MAX_THREADS_PER_GROUP: usize = 256;

/// Byte accounting shared by an accelerator and its buffers
#[derive(Debug)]
struct MemoryTracker {
    limit: Option<usize>,
    in_use: AtomicUsize,
    live: AtomicUsize,
}

impl MemoryTracker {
    fn reserve(&self, bytes: usize) -> Result<(), DeviceError> {
        let before = self.in_use.fetch_add(bytes, Ordering::AcqRel);
        if let Some(limit) = self.limit {
            if before.saturating_add(bytes) > limit {
                self.in_use.fetch_sub(bytes, Ordering::AcqRel);
                return Err(DeviceError::DeviceAllocationFailure {
                    bytes,
                    reason: format!("{} of {} bytes already in use", before, limit),
                });
            }
        }
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A host buffer of 32-bit words
///
/// Dropping the buffer returns its bytes to the accelerator's budget.
#[derive(Debug)]
pub struct CpuBuffer {
    words: Arc<[AtomicU32]>,
    bytes: usize,
    tracker: Arc<MemoryTracker>,
}

impl CpuBuffer {
    /// Length in 32-bit words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the buffer holds no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Drop for CpuBuffer {
    fn drop(&mut self) {
        self.tracker.release(self.bytes);
    }
}

/// A resolved host kernel
#[derive(Clone, Copy)]
pub struct CpuPipeline {
    kernel: &'static CpuKernel,
}

impl CpuPipeline {
    /// Kernel name
    pub fn name(&self) -> &'static str {
        self.kernel.name
    }
}

enum PendingSlot {
    Words(Arc<[AtomicU32]>),
    Scalar(u32),
}

struct PendingLaunch {
    kernel: &'static CpuKernel,
    slots: Vec<PendingSlot>,
    geometry: LaunchGeometry,
}

/// Accelerator backed by host threads
pub struct CpuAccelerator {
    pool: ThreadPool,
    max_threads_per_group: usize,
    tracker: Arc<MemoryTracker>,
    pending: Vec<PendingLaunch>,
}

impl CpuAccelerator {
    /// Creates a host accelerator with `params.n_threads` worker threads
    pub fn new(params: &SystemParameters) -> Result<Self, DeviceError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(params.n_threads)
            .thread_name(|i| format!("spmv-cpu-{}", i))
            .build()
            .map_err(|e| DeviceError::DeviceInitFailure(e.to_string()))?;

        debug!("cpu accelerator with {} threads", pool.current_num_threads());

        Ok(Self {
            pool,
            max_threads_per_group: DEFAULT_MAX_THREADS_PER_GROUP,
            tracker: Arc::new(MemoryTracker {
                limit: None,
                in_use: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
            }),
            pending: Vec::new(),
        })
    }

    /// Sets the threadgroup width reported for every pipeline
    pub fn with_threads_per_group(mut self, width: usize) -> Self {
        self.max_threads_per_group = width.max(1);
        self
    }

    /// Caps the bytes that may be allocated at once
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.tracker = Arc::new(MemoryTracker {
            limit: Some(bytes),
            in_use: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        });
        self
    }

    /// Buffers created by this accelerator that are still alive
    pub fn live_allocations(&self) -> usize {
        self.tracker.live.load(Ordering::Acquire)
    }

    /// Bytes held by live buffers
    pub fn bytes_in_use(&self) -> usize {
        self.tracker.in_use.load(Ordering::Acquire)
    }

    fn run(&self, launch: &PendingLaunch) {
        let slots = launch
            .slots
            .iter()
            .map(|s| match s {
                PendingSlot::Words(w) => Slot::Words(&w[..]),
                PendingSlot::Scalar(v) => Slot::Scalar(*v),
            })
            .collect();
        let args = KernelArgs::new(slots);

        let LaunchGeometry {
            threads,
            threads_per_group,
        } = launch.geometry;
        let body = launch.kernel.body;

        self.pool.install(|| {
            (0..launch.geometry.groups()).into_par_iter().for_each(|group| {
                let start = group * threads_per_group;
                let end = (start + threads_per_group).min(threads);
                for t in start..end {
                    body(t, &args);
                }
            });
        });
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}

impl Accelerator for CpuAccelerator {
    type Buffer = CpuBuffer;
    type Pipeline = CpuPipeline;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn compile_pipeline(&self, kernel: &str) -> Result<CpuPipeline, DeviceError> {
        cpu_kernels::lookup(kernel)
            .map(|kernel| CpuPipeline { kernel })
            .ok_or_else(|| DeviceError::KernelCompileFailure {
                kernel: kernel.to_string(),
                reason: "no such kernel in the host registry".to_string(),
            })
    }

    fn max_threads_per_group(&self, _pipeline: &CpuPipeline) -> usize {
        self.max_threads_per_group
    }

    fn create_buffer(&self, bytes: &[u8]) -> Result<CpuBuffer, DeviceError> {
        if bytes.len() % 4 != 0 {
            return Err(DeviceError::DeviceAllocationFailure {
                bytes: bytes.len(),
                reason: "length is not a whole number of 32-bit words".to_string(),
            });
        }

        self.tracker.reserve(bytes.len())?;

        let words: Arc<[AtomicU32]> = bytes
            .chunks_exact(4)
            .map(|c| AtomicU32::new(bytemuck::pod_read_unaligned::<u32>(c)))
            .collect();

        trace!("cpu buffer of {} bytes", bytes.len());
        Ok(CpuBuffer {
            words,
            bytes: bytes.len(),
            tracker: Arc::clone(&self.tracker),
        })
    }

    fn encode(
        &mut self,
        pipeline: &CpuPipeline,
        bindings: &[Binding<'_, CpuBuffer>],
        geometry: LaunchGeometry,
    ) -> Result<(), DeviceError> {
        let signature = pipeline.kernel.signature;
        if bindings.len() != signature.len() {
            return Err(DeviceError::DispatchFailure(format!(
                "{} takes {} arguments, {} bound",
                pipeline.name(),
                signature.len(),
                bindings.len()
            )));
        }

        let mut slots = Vec::with_capacity(bindings.len());
        for (i, (binding, kind)) in bindings.iter().zip(signature).enumerate() {
            let slot = match (binding, kind) {
                (Binding::Buffer(b), SlotKind::Buffer) => PendingSlot::Words(Arc::clone(&b.words)),
                (Binding::Scalar(v), SlotKind::Scalar) => PendingSlot::Scalar(*v),
                _ => {
                    return Err(DeviceError::DispatchFailure(format!(
                        "{} argument {} expects a {:?}",
                        pipeline.name(),
                        i,
                        kind
                    )))
                }
            };
            slots.push(slot);
        }

        if geometry.threads_per_group == 0 {
            return Err(DeviceError::DispatchFailure(
                "threadgroup width must be positive".to_string(),
            ));
        }

        self.pending.push(PendingLaunch {
            kernel: pipeline.kernel,
            slots,
            geometry,
        });
        Ok(())
    }

    fn submit_and_wait(&mut self) -> Result<Duration, DeviceError> {
        let launches = std::mem::take(&mut self.pending);
        let start = Instant::now();

        for launch in &launches {
            panic::catch_unwind(AssertUnwindSafe(|| self.run(launch))).map_err(|payload| {
                DeviceError::DispatchFailure(format!(
                    "{}: {}",
                    launch.kernel.name,
                    panic_message(payload)
                ))
            })?;
        }

        Ok(start.elapsed())
    }

    fn read_buffer(&self, buffer: &CpuBuffer, len: usize) -> Result<Vec<f32>, DeviceError> {
        if len > buffer.len() {
            return Err(DeviceError::DispatchFailure(format!(
                "read of {} values from a buffer of {}",
                len,
                buffer.len()
            )));
        }
        Ok(buffer.words[..len]
            .iter()
            .map(|w| f32::from_bits(w.load(Ordering::Acquire)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accelerator() -> CpuAccelerator {
        CpuAccelerator::new(&SystemParameters { n_threads: 2 }).unwrap()
    }

    fn f32_bytes(v: &[f32]) -> &[u8] {
        bytemuck::cast_slice(v)
    }

    #[test]
    fn test_unknown_kernel() {
        let acc = accelerator();
        let err = acc.compile_pipeline("bsr_spmv").err().unwrap();
        assert!(matches!(err, DeviceError::KernelCompileFailure { .. }));
    }

    #[test]
    fn test_buffer_accounting() {
        let acc = accelerator();
        let a = acc.create_buffer(f32_bytes(&[1.0, 2.0])).unwrap();
        let b = acc.create_buffer(&[]).unwrap();
        assert_eq!(acc.live_allocations(), 2);
        assert_eq!(acc.bytes_in_use(), 8);
        assert_eq!(acc.read_buffer(&a, 2).unwrap(), vec![1.0, 2.0]);
        assert!(b.is_empty());

        drop(a);
        drop(b);
        assert_eq!(acc.live_allocations(), 0);
        assert_eq!(acc.bytes_in_use(), 0);
    }

    #[test]
    fn test_memory_limit() {
        let acc = accelerator().with_memory_limit(16);
        let _a = acc.create_buffer(&[0u8; 12]).unwrap();
        let err = acc.create_buffer(&[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::DeviceAllocationFailure { bytes: 8, .. }
        ));
        assert_eq!(acc.live_allocations(), 1);
    }

    #[test]
    fn test_unaligned_length_rejected() {
        let acc = accelerator();
        assert!(acc.create_buffer(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_signature_mismatch() {
        let mut acc = accelerator();
        let pipeline = acc.compile_pipeline("coo_spmv").unwrap();
        let buf = acc.create_buffer(f32_bytes(&[0.0])).unwrap();
        let geometry = LaunchGeometry {
            threads: 1,
            threads_per_group: 32,
        };

        let too_few = [Binding::Buffer(&buf)];
        assert!(acc.encode(&pipeline, &too_few, geometry).is_err());

        let wrong_kind = [
            Binding::Buffer(&buf),
            Binding::Buffer(&buf),
            Binding::Buffer(&buf),
            Binding::Buffer(&buf),
            Binding::Buffer(&buf),
            Binding::Buffer(&buf),
        ];
        assert!(acc.encode(&pipeline, &wrong_kind, geometry).is_err());
    }

    #[test]
    fn test_out_of_range_read_is_dispatch_failure() {
        let mut acc = accelerator();
        let pipeline = acc.compile_pipeline("csr_spmv").unwrap();
        // row_ptr claims one entry but col_ind and data are empty
        let row_ptr = acc.create_buffer(bytemuck::cast_slice(&[0u32, 1])).unwrap();
        let empty = acc.create_buffer(&[]).unwrap();
        let x = acc.create_buffer(f32_bytes(&[1.0])).unwrap();
        let y = acc.create_buffer(f32_bytes(&[0.0])).unwrap();

        let bindings = [
            Binding::Buffer(&row_ptr),
            Binding::Buffer(&empty),
            Binding::Buffer(&empty),
            Binding::Buffer(&x),
            Binding::Buffer(&y),
        ];
        let geometry = LaunchGeometry {
            threads: 1,
            threads_per_group: 1,
        };
        acc.encode(&pipeline, &bindings, geometry).unwrap();
        let err = acc.submit_and_wait().unwrap_err();
        assert!(matches!(err, DeviceError::DispatchFailure(_)));
    }

    #[test]
    fn test_every_index_runs_once() {
        let mut acc = accelerator();
        let pipeline = acc.compile_pipeline("coo_spmv").unwrap();

        // 100 entries all landing in y[0]; partial last group of width 32
        let n = 100;
        let rows = acc.create_buffer(bytemuck::cast_slice(&vec![0u32; n][..])).unwrap();
        let cols = acc.create_buffer(bytemuck::cast_slice(&vec![0u32; n][..])).unwrap();
        let data = acc.create_buffer(f32_bytes(&vec![1.0; n])).unwrap();
        let x = acc.create_buffer(f32_bytes(&[1.0])).unwrap();
        let y = acc.create_buffer(f32_bytes(&[0.0])).unwrap();

        let bindings = [
            Binding::Buffer(&rows),
            Binding::Buffer(&cols),
            Binding::Buffer(&data),
            Binding::Buffer(&x),
            Binding::Buffer(&y),
            Binding::Scalar(n as u32),
        ];
        let geometry = LaunchGeometry {
            threads: n,
            threads_per_group: 32,
        };
        acc.encode(&pipeline, &bindings, geometry).unwrap();
        acc.submit_and_wait().unwrap();

        assert_eq!(acc.read_buffer(&y, 1).unwrap(), vec![100.0]);
    }
}
