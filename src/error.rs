//! Error types for spmv-bench

use std::path::PathBuf;
use thiserror::Error;

use crate::matrix::FormatTag;

/// Result type alias using the crate's top-level error
pub type Result<T> = std::result::Result<T, SpmvError>;

/// Failures while turning a matrix file into a validated format model.
///
/// None of these ever reach the accelerator: a matrix that fails to load
/// is rejected before any buffer is created.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be opened or read
    #[error("Cannot read matrix file {path}: {source}")]
    FileUnreadable {
        /// Path that was requested
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON, missing or unknown fields, or a mismatched format tag
    #[error("Cannot decode matrix file {path}: {message}")]
    DecodeFailure {
        /// Path that was decoded
        path: PathBuf,
        /// What the decoder rejected
        message: String,
    },

    /// A structural invariant of the storage layout does not hold
    #[error("Invalid {format} matrix: {reason}")]
    ShapeInvalid {
        /// Layout being validated
        format: FormatTag,
        /// The violated invariant
        reason: String,
    },
}

impl LoadError {
    pub(crate) fn shape(format: FormatTag, reason: impl Into<String>) -> Self {
        LoadError::ShapeInvalid {
            format,
            reason: reason.into(),
        }
    }
}

/// Failures reported by an accelerator backend.
///
/// Each one aborts the current invocation. Buffers owned by the invocation
/// are released on the way out, so a later run on the same accelerator
/// starts clean.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No device, command queue or shader library
    #[error("Accelerator initialization failed: {0}")]
    DeviceInitFailure(String),

    /// The kernel symbol is missing or its pipeline could not be built
    #[error("Cannot compile kernel '{kernel}': {reason}")]
    KernelCompileFailure {
        /// Kernel that was requested
        kernel: String,
        /// Backend message
        reason: String,
    },

    /// Buffer creation failed
    #[error("Cannot allocate {bytes} byte device buffer: {reason}")]
    DeviceAllocationFailure {
        /// Requested size in bytes
        bytes: usize,
        /// Backend message
        reason: String,
    },

    /// Encoding, launching or reading back failed
    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),
}

/// Top-level error for one SpMV invocation
#[derive(Error, Debug)]
pub enum SpmvError {
    /// Loading the matrix failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The accelerator reported a failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// An explicit input vector does not match the matrix width
    #[error("Input vector has length {got}, matrix has {expected} columns")]
    VectorLength {
        /// num_cols of the matrix
        expected: usize,
        /// Length that was supplied
        got: usize,
    },

    /// Writing the result array failed
    #[error("Cannot export result to {path}: {message}")]
    Export {
        /// Destination path
        path: PathBuf,
        /// Underlying error message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shape_invalid() {
        let err = LoadError::shape(FormatTag::Csr, "row_ptr is not monotonic");
        assert_eq!(err.to_string(), "Invalid CSR matrix: row_ptr is not monotonic");
    }

    #[test]
    fn load_error_converts_transparently() {
        let err: SpmvError = LoadError::shape(FormatTag::Dia, "offsets too short").into();
        assert!(matches!(err, SpmvError::Load(LoadError::ShapeInvalid { .. })));
        assert_eq!(err.to_string(), "Invalid DIA matrix: offsets too short");
    }

    #[test]
    fn display_kernel_compile_failure() {
        let err = DeviceError::KernelCompileFailure {
            kernel: "csr_spmv".into(),
            reason: "function not found".into(),
        };
        assert!(err.to_string().contains("csr_spmv"));
        let dyn_err: &dyn std::error::Error = &err;
        assert!(dyn_err.source().is_none());
    }
}
