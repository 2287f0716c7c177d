//! Buffer marshalling
//!
//! Turns a format's positional kernel arguments into device buffers and
//! inline scalars. Host arrays are viewed as bytes with `bytemuck`, never
//! copied element by element. `y` is always a fresh zero-filled buffer, so
//! scatter kernels can accumulate into it directly.

use log::trace;

use crate::device::{Accelerator, Binding};
use crate::error::DeviceError;
use crate::matrix::{KernelArg, SpmvKernel};

enum Marshalled<B> {
    Buffer(B),
    Output,
    Scalar(u32),
}

/// Device-side arguments of one invocation, in binding-slot order
///
/// Owns every buffer it created; dropping it releases them.
pub struct MatrixBuffers<B> {
    slots: Vec<Marshalled<B>>,
    output: B,
    output_len: usize,
}

impl<B> MatrixBuffers<B> {
    /// Uploads `matrix`'s arrays and `x`, and allocates a zeroed `y`.
    ///
    /// A failed allocation drops the buffers created so far before the
    /// error is returned.
    pub fn create<A>(
        accelerator: &A,
        matrix: &dyn SpmvKernel,
        x: &[f32],
    ) -> Result<Self, DeviceError>
    where
        A: Accelerator<Buffer = B> + ?Sized,
    {
        let args = matrix.kernel_args();
        let mut slots = Vec::with_capacity(args.len());
        let mut output = None;

        for arg in args {
            let marshalled = match arg {
                KernelArg::Indices(a) => upload(accelerator, bytemuck::cast_slice(a))?,
                KernelArg::Offsets(a) => upload(accelerator, bytemuck::cast_slice(a))?,
                KernelArg::Values(a) => upload(accelerator, bytemuck::cast_slice(a))?,
                KernelArg::InputVector => upload(accelerator, bytemuck::cast_slice(x))?,
                KernelArg::OutputVector => {
                    let y = vec![0.0f32; matrix.n_rows()];
                    output = Some(accelerator.create_buffer(bytemuck::cast_slice(&y[..]))?);
                    Marshalled::Output
                }
                KernelArg::Scalar(v) => Marshalled::Scalar(v),
            };
            slots.push(marshalled);
        }

        let output = output.ok_or_else(|| {
            DeviceError::DispatchFailure(format!("{} binds no output vector", matrix.kernel_name()))
        })?;

        trace!(
            "marshalled {} arguments for {}",
            slots.len(),
            matrix.kernel_name()
        );

        Ok(Self {
            slots,
            output,
            output_len: matrix.n_rows(),
        })
    }

    /// Bindings in slot order, ready for [`Accelerator::encode`]
    pub fn bindings(&self) -> Vec<Binding<'_, B>> {
        self.slots
            .iter()
            .map(|s| match s {
                Marshalled::Buffer(b) => Binding::Buffer(b),
                Marshalled::Output => Binding::Buffer(&self.output),
                Marshalled::Scalar(v) => Binding::Scalar(*v),
            })
            .collect()
    }

    /// The `y` buffer
    pub fn output(&self) -> &B {
        &self.output
    }

    /// Number of f32 values in `y`
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Number of device buffers held, `y` included
    pub fn buffer_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s, Marshalled::Scalar(_)))
            .count()
    }
}

fn upload<A>(accelerator: &A, bytes: &[u8]) -> Result<Marshalled<A::Buffer>, DeviceError>
where
    A: Accelerator + ?Sized,
{
    accelerator.create_buffer(bytes).map(Marshalled::Buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::cpu::CpuAccelerator;
    use crate::matrix::{SparseMatrixCOO, SparseMatrixDIA, SystemParameters};

    fn accelerator() -> CpuAccelerator {
        CpuAccelerator::new(&SystemParameters { n_threads: 1 }).unwrap()
    }

    #[test]
    fn test_coo_binding_order() {
        let acc = accelerator();
        let coo = SparseMatrixCOO::new(2, 2, vec![0, 1], vec![1, 0], vec![5.0, 6.0]).unwrap();
        let buffers = MatrixBuffers::create(&acc, &coo, &[1.0, 1.0]).unwrap();

        let bindings = buffers.bindings();
        assert_eq!(bindings.len(), 6);
        assert!(matches!(bindings[5], Binding::Scalar(2)));
        assert_eq!(buffers.buffer_count(), 5);
        assert_eq!(acc.live_allocations(), 5);

        let y = acc.read_buffer(buffers.output(), buffers.output_len()).unwrap();
        assert_eq!(y, vec![0.0, 0.0]);
    }

    #[test]
    fn test_dia_offsets_keep_sign() {
        let acc = accelerator();
        let dia = SparseMatrixDIA::new(2, 2, 1, vec![-1], vec![0.0, 1.0]).unwrap();
        let buffers = MatrixBuffers::create(&acc, &dia, &[1.0, 1.0]).unwrap();

        match buffers.bindings()[1] {
            Binding::Buffer(b) => {
                let raw = acc.read_buffer(b, 1).unwrap();
                assert_eq!(raw[0].to_bits() as i32, -1);
            }
            Binding::Scalar(_) => panic!("offsets must be a buffer"),
        }
    }

    #[test]
    fn test_failed_allocation_releases_everything() {
        // Room for the COO arrays but not for x and y
        let acc = accelerator().with_memory_limit(24);
        let coo = SparseMatrixCOO::new(2, 2, vec![0, 1], vec![1, 0], vec![5.0, 6.0]).unwrap();

        let result = MatrixBuffers::create(&acc, &coo, &[1.0, 1.0]);
        assert!(matches!(
            result.err(),
            Some(DeviceError::DeviceAllocationFailure { .. })
        ));
        assert_eq!(acc.live_allocations(), 0);
    }
}
