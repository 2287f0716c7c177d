//! Benchmarks for SpMV in every storage layout on the host backend

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spmv_bench::{
    ell_width_for, random_csr, CpuAccelerator, KernelDispatcher, SparseMatrix, SpmvConfig,
    SpmvKernel, XPolicy,
};
use spmv_bench::matrix::skewed_csr;

fn layouts(name: &str, csr: &spmv_bench::SparseMatrixCSR) -> Vec<(String, SparseMatrix)> {
    let hyb = csr.to_hyb(ell_width_for(csr)).unwrap();
    let mut out: Vec<(String, SparseMatrix)> = vec![
        (format!("{}/CSR", name), csr.clone().into()),
        (format!("{}/COO", name), csr.to_coo().unwrap().into()),
        (format!("{}/ELL", name), csr.to_ell().unwrap().into()),
        (format!("{}/HYB", name), hyb.into()),
        (format!("{}/CSC", name), csr.to_csc().unwrap().into()),
    ];
    // DIA only pays off for banded matrices; random ones have thousands of diagonals
    if diagonal_count(csr) <= 64 {
        out.push((format!("{}/DIA", name), csr.to_dia().unwrap().into()));
    }
    out
}

fn diagonal_count(csr: &spmv_bench::SparseMatrixCSR) -> usize {
    let mut offsets = BTreeSet::new();
    for r in 0..csr.n_rows() {
        for (col, _) in csr.row_iter(r) {
            offsets.insert(col as i64 - r as i64);
        }
    }
    offsets.len()
}

/// Banded matrix with `half_width` diagonals on each side of the main one
fn banded_csr(n: usize, half_width: usize) -> spmv_bench::SparseMatrixCSR {
    let mut row_ptr = vec![0u32];
    let mut col_ind = Vec::new();
    let mut data = Vec::new();
    for r in 0..n {
        let lo = r.saturating_sub(half_width);
        let hi = (r + half_width + 1).min(n);
        for c in lo..hi {
            col_ind.push(c as u32);
            data.push(1.0 / (1 + r.abs_diff(c)) as f32);
        }
        row_ptr.push(col_ind.len() as u32);
    }
    spmv_bench::SparseMatrixCSR::new(n, n, row_ptr, col_ind, data).unwrap()
}

fn bench_formats(c: &mut Criterion) {
    let config = SpmvConfig {
        x_policy: XPolicy::Random { seed: 1 },
        ..SpmvConfig::default()
    };
    let mut accelerator = CpuAccelerator::new(&config.system_params).unwrap();

    let inputs = [
        ("uniform", random_csr(20_000, 20_000, 0.0005, 42).unwrap()),
        ("skewed", skewed_csr(20_000, 20_000, 4, 50, 42).unwrap()),
        ("banded", banded_csr(20_000, 3)),
    ];

    let mut group = c.benchmark_group("spmv");
    for (name, csr) in &inputs {
        let x = config.x_policy.build(csr.n_cols()).unwrap();
        for (id, matrix) in layouts(name, csr) {
            group.bench_with_input(BenchmarkId::from_parameter(id), &matrix, |b, m| {
                b.iter(|| {
                    let mut dispatcher = KernelDispatcher::new(&config);
                    black_box(dispatcher.dispatch(&mut accelerator, m, &x).unwrap())
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_formats);
criterion_main!(benches);
