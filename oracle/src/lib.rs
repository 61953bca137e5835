pub mod config;
mod eval;
pub mod harness;
mod names;
pub mod oracle;
pub mod provenance;
pub mod suites;
pub mod syntax;

pub use config::{Config, ConfigError};
pub use eval::EvalError;
pub use harness::{Failure, FailureReason, Harness, Report};
pub use objsize_scenario_derive::scenarios;
pub use oracle::{Candidate, FreedPolicy, Kind, Oracle, SizeEstimator, UNKNOWN_SIZE};

#[cfg(test)]
mod tests {
    use objsize_scenario_derive::scenarios_crate;

    use crate::harness::Harness;

    #[test]
    fn local_array() {
        #[scenarios_crate]
        mod test {
            fn check_array() {
                let a: [i32; 4];
                check!(object_size(&a, 0), 16);
                check!(object_size(&a[1], 0), 12);
            }
        }
        test.check().unwrap();
        let report = Harness::default().run(&test);
        assert_eq!(report.passed, 2);
        assert!(report.is_success());
    }

    #[test]
    fn helper_call() {
        #[scenarios_crate]
        mod test {
            fn second(p: *mut i64) -> *mut i64 {
                p + 1
            }

            fn check_helper() {
                let a: [i64; 3];
                let p = second(&a[0]);
                check!(object_size(p, 0), 16);
            }
        }
        test.check().unwrap();
        assert!(Harness::default().run(&test).is_success());
    }
}
