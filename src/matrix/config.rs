//! Configuration and system parameters for spmv-bench

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::SpmvError;

/// Which accelerator executes the kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Host threads standing in for accelerator threads
    Cpu,
    /// Apple GPU through Metal (aarch64 macOS only)
    Metal,
    /// Metal when available, otherwise Cpu
    Auto,
}

impl BackendKind {
    /// Resolves `Auto` to a concrete backend for this build
    pub fn resolve(self) -> BackendKind {
        match self {
            BackendKind::Auto => detect_backend(),
            other => other,
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(BackendKind::Cpu),
            "metal" => Ok(BackendKind::Metal),
            "auto" => Ok(BackendKind::Auto),
            other => Err(format!("unknown backend '{}' (expected cpu, metal or auto)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Cpu => "cpu",
            BackendKind::Metal => "metal",
            BackendKind::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// How the dense input vector `x` is synthesized
#[derive(Debug, Clone, PartialEq, Default)]
pub enum XPolicy {
    /// Every element is 1.0
    #[default]
    Ones,
    /// Every element is the given value
    Constant(f32),
    /// Uniform values in `[0, 1)` from a seeded ChaCha8 stream
    Random {
        /// RNG seed
        seed: u64,
    },
    /// A caller-supplied vector of length `num_cols`
    Explicit(Vec<f32>),
}

impl XPolicy {
    /// Builds `x` for a matrix with `n_cols` columns
    pub fn build(&self, n_cols: usize) -> Result<Vec<f32>, SpmvError> {
        match self {
            XPolicy::Ones => Ok(vec![1.0; n_cols]),
            XPolicy::Constant(v) => Ok(vec![*v; n_cols]),
            XPolicy::Random { seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                Ok((0..n_cols).map(|_| rng.gen::<f32>()).collect())
            }
            XPolicy::Explicit(x) if x.len() == n_cols => Ok(x.clone()),
            XPolicy::Explicit(x) => Err(SpmvError::VectorLength {
                expected: n_cols,
                got: x.len(),
            }),
        }
    }
}

impl FromStr for XPolicy {
    type Err = String;

    /// Parses `ones`, `const:<value>` or `random:<seed>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ones") {
            return Ok(XPolicy::Ones);
        }
        if let Some(v) = s.strip_prefix("const:") {
            return v
                .parse()
                .map(XPolicy::Constant)
                .map_err(|e| format!("invalid constant '{}': {}", v, e));
        }
        if let Some(seed) = s.strip_prefix("random:") {
            return seed
                .parse()
                .map(|seed| XPolicy::Random { seed })
                .map_err(|e| format!("invalid seed '{}': {}", seed, e));
        }
        Err(format!(
            "unknown x policy '{}' (expected ones, const:<v> or random:<seed>)",
            s
        ))
    }
}

/// System parameters for the host side
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Number of host worker threads for the CPU backend
    pub n_threads: usize,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(), // Use all available cores
        }
    }
}

/// Threadgroup width for scatter kernels
pub const SCATTER_THREADGROUP_WIDTH: usize = 32;

/// Number of leading output entries shown in a preview
pub const PREVIEW_LEN: usize = 10;

/// Configuration for one SpMV run
#[derive(Debug, Clone)]
pub struct SpmvConfig {
    /// System parameters for the host side
    pub system_params: SystemParameters,

    /// Threadgroup width for scatter (COO, CSC) and mixed (HYB) kernels
    pub scatter_threadgroup_width: usize,

    /// Optional cap on the gather threadgroup width.
    /// If None, the pipeline's reported maximum is used.
    pub max_threadgroup_width: Option<usize>,

    /// How `x` is built
    pub x_policy: XPolicy,

    /// Entries shown by [`SpmvResult::preview`](crate::SpmvResult::preview)
    pub preview_len: usize,

    /// Accelerator to run on
    pub backend: BackendKind,
}

impl Default for SpmvConfig {
    fn default() -> Self {
        Self {
            system_params: SystemParameters::default(),
            scatter_threadgroup_width: SCATTER_THREADGROUP_WIDTH,
            max_threadgroup_width: None,
            x_policy: XPolicy::default(),
            preview_len: PREVIEW_LEN,
            backend: BackendKind::Auto,
        }
    }
}

impl SpmvConfig {
    /// Create a config targeting a specific backend
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }
}

/// Picks the backend for the current build and machine
pub fn detect_backend() -> BackendKind {
    #[cfg(all(target_arch = "aarch64", target_os = "macos"))]
    {
        if crate::device::metal::MetalAccelerator::is_available() {
            return BackendKind::Metal;
        }
    }

    BackendKind::Cpu
}
