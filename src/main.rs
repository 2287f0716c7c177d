//! spmv-bench CLI - run one SpMV kernel on one matrix file.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;

use spmv_bench::{
    detect_format, load_matrix, Accelerator, BackendKind, CpuAccelerator, FormatTag, SpmvConfig,
    SpmvRunner, SystemParameters, XPolicy, VERIFY_TOLERANCE,
};

#[derive(Parser)]
#[command(name = "spmv-bench")]
#[command(about = "Sparse matrix-vector multiplication across storage formats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multiply one matrix file by a dense vector
    Run {
        /// Path to the JSON matrix file
        #[arg(short, long)]
        matrix: PathBuf,

        /// Storage format of the file (read from the file when omitted)
        #[arg(short, long)]
        format: Option<FormatTag>,

        /// Accelerator: cpu, metal or auto
        #[arg(short, long, default_value = "auto")]
        backend: BackendKind,

        /// Input vector: ones, const:<value> or random:<seed>
        #[arg(short, long, default_value = "ones")]
        x: XPolicy,

        /// Host worker threads for the cpu backend
        #[arg(long)]
        threads: Option<usize>,

        /// Cap on the threadgroup width of gather kernels
        #[arg(long)]
        max_threadgroup: Option<usize>,

        /// Write the full result vector as JSON
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Check the result against the host reference product
        #[arg(long)]
        verify: bool,
    },
}

struct RunArgs {
    matrix: PathBuf,
    format: FormatTag,
    export: Option<PathBuf>,
    verify: bool,
}

fn execute<A: Accelerator>(accelerator: A, config: SpmvConfig, args: &RunArgs) -> anyhow::Result<()> {
    let matrix = load_matrix(&args.matrix, args.format)
        .with_context(|| format!("loading {}", args.matrix.display()))?;

    let mut runner = SpmvRunner::new(accelerator, config);
    let (result, comparison) = if args.verify {
        let (result, comparison) = runner.run_verified(&matrix)?;
        (result, Some(comparison))
    } else {
        (runner.run_matrix(&matrix)?, None)
    };

    println!("format:  {}", result.format());
    println!("backend: {}", runner.accelerator().name());
    println!("rows:    {}", result.y().len());
    println!("time:    {:.3} ms", result.elapsed_ms());
    println!("y[..{}]: {:?}", result.preview().len(), result.preview());

    if let Some(comparison) = comparison {
        let verdict = if comparison.within(VERIFY_TOLERANCE) {
            "ok"
        } else {
            "MISMATCH"
        };
        println!(
            "verify:  {} (max error {:.3e})",
            verdict, comparison.max_error
        );
    }

    if let Some(path) = &args.export {
        result.export_json(path)?;
        println!("exported to {}", path.display());
    }

    if let Some(comparison) = comparison {
        if !comparison.within(VERIFY_TOLERANCE) {
            bail!(
                "result differs from the reference at row {:?}",
                comparison.worst_row
            );
        }
    }
    Ok(())
}

#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
fn execute_metal(config: SpmvConfig, args: &RunArgs) -> anyhow::Result<()> {
    let accelerator = spmv_bench::MetalAccelerator::new()?;
    execute(accelerator, config, args)
}

#[cfg(not(all(target_arch = "aarch64", target_os = "macos")))]
fn execute_metal(_config: SpmvConfig, _args: &RunArgs) -> anyhow::Result<()> {
    bail!("the metal backend is only available on aarch64 macOS")
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            matrix,
            format,
            backend,
            x,
            threads,
            max_threadgroup,
            export,
            verify,
        } => {
            let format = match format {
                Some(format) => format,
                None => detect_format(&matrix)
                    .with_context(|| format!("reading format of {}", matrix.display()))?,
            };

            let mut config = SpmvConfig {
                x_policy: x,
                max_threadgroup_width: max_threadgroup,
                ..SpmvConfig::for_backend(backend)
            };
            if let Some(n_threads) = threads {
                config.system_params = SystemParameters { n_threads };
            }

            let args = RunArgs {
                matrix,
                format,
                export,
                verify,
            };

            let backend = config.backend.resolve();
            info!("running {} on {} backend", args.format, backend);
            match backend {
                BackendKind::Metal => execute_metal(config, &args)?,
                BackendKind::Cpu | BackendKind::Auto => {
                    let accelerator = CpuAccelerator::new(&config.system_params)?;
                    execute(accelerator, config, &args)?
                }
            }
        }
    }

    Ok(())
}
