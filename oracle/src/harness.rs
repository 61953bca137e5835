//! Runs scenarios against a [`SizeEstimator`] and tallies the checks.

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::eval::{CheckRecord, EvalError, Interpreter};
use crate::oracle::{Oracle, SizeEstimator};
use crate::syntax::{Site, Suite};

pub struct Harness<E = Oracle> {
    config: Config,
    estimator: E,
    /// Print each failure to stderr as it is found.
    echo: bool,
}

impl Harness<Oracle> {
    pub fn new(config: Config) -> Self {
        let estimator = Oracle::new(config.freed);
        Self::with_estimator(config, estimator)
    }
}

impl Default for Harness<Oracle> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<E: SizeEstimator> Harness<E> {
    pub fn with_estimator(config: Config, estimator: E) -> Self {
        Self { config, estimator, echo: true }
    }

    pub fn quiet(self) -> Self {
        Self { echo: false, ..self }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, suite: &Suite) -> Report {
        let mut report = Report { suite: suite.name.clone(), ..Report::default() };
        for (name, fnc) in suite.scenarios() {
            if fnc.ignored && !self.config.run_ignored {
                warn!(suite = %suite.name, scenario = name, "scenario disabled, skipping");
                report.skipped.push(name.to_string());
                continue;
            }
            debug!(suite = %suite.name, scenario = name, "running scenario");
            let (checks, result) = match Interpreter::new(suite, &self.config, &self.estimator) {
                Ok(mut interp) => {
                    let result = interp.run(name);
                    (interp.take_checks(), result)
                }
                Err(err) => (Vec::new(), Err(err)),
            };
            for check in checks {
                self.record(&mut report, check);
            }
            if let Err(err) = result {
                self.fail(&mut report, Failure { function: name.to_string(), reason: FailureReason::Error(err) });
            }
        }
        info!(suite = %report.suite, passed = report.passed, failed = report.failed(), "suite finished");
        report
    }

    fn record(&self, report: &mut Report, check: CheckRecord) {
        let CheckRecord { function, site, values } = check;
        let reason = match values {
            Some((expected, actual)) if expected == actual => {
                report.passed += 1;
                return;
            }
            Some((expected, actual)) => FailureReason::Mismatch { site, expected, actual },
            None => FailureReason::Indeterminate { site },
        };
        self.fail(report, Failure { function, reason });
    }

    fn fail(&self, report: &mut Report, failure: Failure) {
        if self.echo {
            eprintln!("{failure}");
        }
        report.failures.push(failure);
    }
}

/// Outcome of running one suite.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub suite: String,
    pub passed: usize,
    pub failures: Vec<Failure>,
    pub skipped: Vec<String>,
}

impl Report {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit status: the number of failed checks.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.failed()).unwrap_or(i32::MAX)
    }

    pub fn merge(&mut self, other: Report) {
        self.passed += other.passed;
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} passed, {} failed", self.suite, self.passed, self.failed())?;
        if !self.skipped.is_empty() {
            write!(f, ", {} skipped", self.skipped.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// Innermost function the failing check ran in.
    pub function: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Mismatch { site: Site, expected: u64, actual: u64 },
    /// An operand of the check did not evaluate to a constant.
    Indeterminate { site: Site },
    /// The scenario could not be evaluated.
    Error(EvalError),
}

impl Failure {
    pub fn site(&self) -> Option<&Site> {
        match &self.reason {
            FailureReason::Mismatch { site, .. } | FailureReason::Indeterminate { site } => Some(site),
            FailureReason::Error(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            // Sizes print signed so the unknown sentinel reads as -1.
            FailureReason::Mismatch { site, expected, actual } => write!(
                f,
                "[FAIL] {}:{} {}: {} != {}, expecting {} got {}",
                site.file, site.line, self.function, site.expected, site.actual, *expected as i64, *actual as i64
            ),
            FailureReason::Indeterminate { site } => write!(
                f,
                "[FAIL] {}:{} {}: {} != {}, value is not a constant",
                site.file, site.line, self.function, site.expected, site.actual
            ),
            FailureReason::Error(err) => write!(f, "[FAIL] {}: {err}", self.function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site { file: "tests/heap.rs".into(), line: 12, actual: "object_size(p, 0)".into(), expected: "10".into() }
    }

    #[test]
    fn failure_line_format() {
        let failure = Failure {
            function: "check_malloc".into(),
            reason: FailureReason::Mismatch { site: site(), expected: 10, actual: u64::MAX },
        };
        assert_eq!(
            failure.to_string(),
            "[FAIL] tests/heap.rs:12 check_malloc: 10 != object_size(p, 0), expecting 10 got -1"
        );
    }

    #[test]
    fn report_totals() {
        let mut report = Report { suite: "a".into(), passed: 2, ..Report::default() };
        report.merge(Report {
            suite: "b".into(),
            passed: 1,
            failures: vec![Failure { function: "f".into(), reason: FailureReason::Indeterminate { site: site() } }],
            skipped: vec!["check_skipped".into()],
        });
        assert_eq!(report.passed, 3);
        assert_eq!(report.exit_code(), 1);
        assert!(!report.is_success());
        assert_eq!(report.to_string(), "a: 3 passed, 1 failed, 1 skipped");
    }
}
