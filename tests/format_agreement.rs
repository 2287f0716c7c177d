//! Property: every layout of the same matrix yields the same product

use proptest::prelude::*;
use spmv_bench::{
    ell_width_for, reference_spmv, CpuAccelerator, SparseMatrix, SparseMatrixCSR, SpmvConfig,
    SpmvKernel, SpmvRunner, SystemParameters, XPolicy, VERIFY_TOLERANCE,
};

/// Random CSR matrix with small integer-ish values and possibly empty rows
fn csr_strategy() -> impl Strategy<Value = SparseMatrixCSR> {
    (1usize..24, 1usize..24).prop_flat_map(|(n_rows, n_cols)| {
        let entry = (0..n_cols as u32, -8i32..8).prop_map(|(c, v)| (c, v as f32 * 0.25));
        prop::collection::vec(prop::collection::vec(entry, 0..6), n_rows).prop_map(
            move |rows| {
                let mut row_ptr = vec![0u32];
                let mut col_ind = Vec::new();
                let mut data = Vec::new();
                for mut row in rows {
                    row.sort_by_key(|&(c, _)| c);
                    row.dedup_by_key(|&mut (c, _)| c);
                    for (c, v) in row {
                        col_ind.push(c);
                        data.push(v);
                    }
                    row_ptr.push(col_ind.len() as u32);
                }
                SparseMatrixCSR::new(n_rows, n_cols, row_ptr, col_ind, data)
                    .expect("generated CSR is valid")
            },
        )
    })
}

fn layouts(csr: &SparseMatrixCSR) -> Vec<SparseMatrix> {
    vec![
        csr.clone().into(),
        csr.to_coo().unwrap().into(),
        csr.to_ell().unwrap().into(),
        csr.to_hyb(ell_width_for(csr)).unwrap().into(),
        csr.to_dia().unwrap().into(),
        csr.to_csc().unwrap().into(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn all_formats_agree(csr in csr_strategy(), seed in any::<u64>()) {
        let config = SpmvConfig {
            x_policy: XPolicy::Random { seed },
            ..SpmvConfig::default()
        };
        let x = config.x_policy.build(csr.n_cols()).unwrap();
        let reference = reference_spmv(&csr, &x);

        let accelerator = CpuAccelerator::new(&SystemParameters { n_threads: 3 }).unwrap();
        let mut runner = SpmvRunner::new(accelerator, config);

        for matrix in layouts(&csr) {
            let result = runner.run_matrix(&matrix).unwrap();
            let comparison = reference.compare(result.y());
            prop_assert!(
                comparison.within(VERIFY_TOLERANCE),
                "{} max error {} at {:?}",
                matrix.format(),
                comparison.max_error,
                comparison.worst_row
            );
        }
    }

    #[test]
    fn scatter_layouts_are_order_independent(csr in csr_strategy()) {
        // Quarter-step values and x = 1 keep every partial sum exact
        let accelerator = CpuAccelerator::new(&SystemParameters { n_threads: 4 }).unwrap();
        let mut runner = SpmvRunner::new(accelerator, SpmvConfig::default());

        let coo = csr.to_coo().unwrap();
        let csc = csr.to_csc().unwrap();
        let hyb = csr.to_hyb(1).unwrap();
        let expected = runner.run_matrix(&csr).unwrap().into_y();

        let scatter: [&dyn SpmvKernel; 3] = [&coo, &csc, &hyb];
        for matrix in scatter {
            let y = runner.run_matrix(matrix).unwrap().into_y();
            prop_assert_eq!(&y, &expected, "{}", matrix.format());
        }
    }
}
