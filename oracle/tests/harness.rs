//! Reporting: mismatches, evaluation errors, skipped scenarios and exit codes.

use objsize_oracle::syntax::layout::LayoutError;
use objsize_oracle::syntax::{CheckError, IntSize, Type};
use objsize_oracle::{
    Candidate, Config, EvalError, FailureReason, FreedPolicy, Harness, Kind, SizeEstimator, scenarios,
};

/// An estimator that answers every query with the same size.
struct Constant(u64);

impl SizeEstimator for Constant {
    fn object_size(&self, _candidates: &[Candidate], _kind: Kind) -> u64 {
        self.0
    }

    fn side_effecting(&self, _kind: Kind) -> u64 {
        self.0
    }
}

#[test]
fn mismatches_are_reported() {
    #[scenarios]
    mod test {
        fn check_small() {
            let a: [u8; 4];
            check!(object_size(&a, 0), 4);
            check!(object_size(&a[3], 0), 1);
        }

        fn check_lucky() {
            let b: [u8; 7];
            check!(object_size(&b, 2), 7);
        }
    }
    test.check().unwrap();

    let report = Harness::with_estimator(Config::default(), Constant(7)).quiet().run(&test);
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.exit_code(), 2);

    let failure = &report.failures[0];
    assert_eq!(failure.function, "check_small");
    let line = failure.to_string();
    assert!(line.starts_with("[FAIL] "), "{line}");
    assert!(line.contains("tests/harness.rs:"), "{line}");
    assert!(line.ends_with("check_small: 4 != object_size(&a, 0), expecting 4 got 7"), "{line}");

    let site = failure.site().unwrap();
    assert_eq!(site.actual, "object_size(&a, 0)");
    assert_eq!(site.expected, "4");
}

#[test]
fn sentinel_prints_signed() {
    #[scenarios]
    mod test {
        fn check_claims_size() {
            let p = malloc(opaque());
            check!(object_size(p, 0), 32);
        }
    }
    test.check().unwrap();
    let report = Harness::default().quiet().run(&test);
    assert_eq!(report.failed(), 1);
    assert!(report.failures[0].to_string().ends_with("expecting 32 got -1"));
}

#[test]
fn indeterminate_check() {
    #[scenarios]
    mod test {
        fn check_opaque() {
            check!(opaque(), 3);
            check!(1 + 2, 3);
        }
    }
    test.check().unwrap();
    let report = Harness::default().quiet().run(&test);
    assert_eq!(report.passed, 1);
    assert!(matches!(report.failures[0].reason, FailureReason::Indeterminate { .. }));
}

#[test]
fn evaluation_errors() {
    #[scenarios]
    mod test {
        fn spin(p: *mut u8) -> *mut u8 {
            if opaque() != 0 {
                return p;
            }
            spin(p + 1)
        }

        fn check_runaway_recursion() {
            let buf: [u8; 4];
            check!(object_size(&buf, 0), 4);
            let p = spin(&buf[0]);
            check!(object_size(p, 0), 4);
        }

        fn check_variable_kind() {
            let buf: [u8; 4];
            check!(object_size(&buf, opaque()), 4);
        }
    }
    test.check().unwrap();

    let config = Config { max_call_depth: 8, ..Config::default() };
    let report = Harness::new(config).quiet().run(&test);
    // Checks before the error still count.
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed(), 2);

    let reasons: Vec<_> = report.failures.iter().map(|f| (f.function.as_str(), &f.reason)).collect();
    assert!(reasons.contains(&("check_runaway_recursion", &FailureReason::Error(EvalError::CallDepth(8)))));
    assert!(reasons.contains(&("check_variable_kind", &FailureReason::Error(EvalError::NonConstantKind))));
    assert!(report.failures.iter().all(|f| f.site().is_none()));
}

#[test]
fn ignored_scenarios() {
    #[scenarios]
    mod test {
        fn check_live() {
            let p = malloc(16);
            check!(object_size(p, 0), 16);
        }

        #[ignore]
        fn check_after_free() {
            let p = malloc(16);
            free(p);
            check!(object_size(p, 0), 16);
        }
    }
    test.check().unwrap();

    let report = Harness::default().run(&test);
    assert!(report.is_success());
    assert_eq!(report.skipped, vec!["check_after_free".to_string()]);
    assert_eq!(report.to_string(), "test: 1 passed, 0 failed, 1 skipped");

    let config = Config { run_ignored: true, ..Config::default() };
    let report = Harness::new(config).quiet().run(&test);
    assert_eq!(report.failed(), 1);
    assert!(report.skipped.is_empty());

    let config = Config { run_ignored: true, freed: FreedPolicy::Stale, ..Config::default() };
    let report = Harness::new(config).run(&test);
    assert!(report.is_success());
    assert_eq!(report.passed, 2);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn malformed_suite() {
    #[scenarios]
    mod test {
        fn check_typo() {
            let a: [u8; 4];
            check!(object_size(&b, 0), 4);
        }
    }
    assert!(test.check().is_err());
}

#[test]
fn oversized_local() {
    #[scenarios]
    mod test {
        fn check_fits() {
            let a: [u8; 4];
            check!(object_size(&a, 0), 4);
        }

        fn check_overflowing_array() {
            let huge: [[u64; 4294967296]; 4294967296];
            check!(object_size(&huge, 0), 0);
        }
    }
    let huge = Type::array(Type::array(Type::Int { size: IntSize::I64, signed: false }, 1 << 32), 1 << 32);
    assert_eq!(test.check(), Err(CheckError::Layout(LayoutError::TooLarge(huge.clone()))));

    let report = Harness::default().quiet().run(&test);
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.function, "check_overflowing_array");
    assert_eq!(failure.reason, FailureReason::Error(EvalError::Layout(LayoutError::TooLarge(huge))));
}
