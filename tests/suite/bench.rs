//! Benchmark harness

use std::hint::black_box;

use isthmus_bench::{BenchSettings, HarnessError, NAME_COLUMN_WIDTH, measure, run_suite};
use isthmus_core::exports;

#[test]
fn no_op_dispatch_measures_positive_finite_cost() {
    let report = measure("no_op (bridged)", 10_000, || {
        black_box(exports::no_op()).ok();
    })
    .unwrap();
    assert_eq!(report.iterations, 10_000);
    let per_iter = report.ms_per_iter();
    assert!(per_iter.is_finite() && per_iter > 0.0, "{per_iter}");
    assert!(!report.per_iteration().is_zero());
}

#[test]
fn non_positive_iterations_are_flagged_not_reported() {
    for iterations in [0, -10_000] {
        let err = measure("no_op (bridged)", iterations, || {}).unwrap_err();
        assert!(matches!(err, HarnessError::NonPositiveIterations { .. }));
        assert!(err.to_string().contains(&iterations.to_string()));
    }
}

#[tokio::test]
async fn selected_scenarios_render_in_fixed_columns() {
    let mut settings = BenchSettings::with_iterations(100);
    settings.scenarios = Some(vec!["no_op".to_owned(), "serialize".to_owned()]);
    let reports = run_suite(&settings).await.unwrap();

    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "no_op (foreign)",
            "no_op (bridged)",
            "serialize (foreign)",
            "serialize (bridged)"
        ]
    );
    for report in &reports {
        let line = report.to_string();
        assert_eq!(&line[..NAME_COLUMN_WIDTH], format!("{:<35}", report.name));
        assert!(line.contains(" ms/iter ("));
        assert!(line.ends_with(&format!(" ms/{})", report.iterations)));
    }
    assert_eq!(reports[3].iterations, 2);
}
