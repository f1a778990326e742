/// Result Aggregator - Turns Raw Runs into Test Results
///
/// **Core Responsibility:**
/// Classify each raw execution output and keep the results in submission
/// order, stamping `test_id` from the originating test case.
///
/// **Critical Properties:**
/// - Knows nothing about interpreters or process groups
/// - Knows nothing about workspaces
/// - Every test case that ran yields exactly one result, failures included
///
/// **Classification:**
/// - wall-clock timeout → status -3
/// - launch failure, abnormal exit, missing or malformed verdict → status -2
/// - otherwise the harness verdict as reported
use codesandbox_common::{TestCase, TestResult};
use tracing::{debug, error, info, warn};

use crate::demux;
use crate::runner::{ExecutionOutput, ExitOutcome};

/// Counts over the collected results, used for logging and metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub harness_failures: usize,
    pub timeouts: usize,
}

impl Summary {
    fn record(&mut self, result: &TestResult) {
        self.total += 1;
        if result.is_success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        if result.is_harness_failure() {
            self.harness_failures += 1;
        }
        if result.is_timeout() {
            self.timeouts += 1;
        }
    }
}

/// Classify one raw execution output
///
/// Only stdout is searched for the verdict; stderr feeds failure messages.
pub fn to_test_result(test_id: u32, execution: ExecutionOutput) -> TestResult {
    let diagnostics = execution.diagnostics();
    match execution.exit {
        ExitOutcome::TimedOut { wall_clock_ms } => {
            warn!(test_id, wall_clock_ms, "time limit exceeded");
            let mut result = TestResult::time_limit_exceeded(test_id, wall_clock_ms);
            if !diagnostics.trim().is_empty() {
                result.result = format!("{}\n{}", result.result, diagnostics);
            }
            result
        }
        ExitOutcome::LaunchFailed(message) => {
            error!(test_id, %message, "harness could not be launched");
            TestResult::harness_failure(test_id, message)
        }
        ExitOutcome::Failed { code } => {
            error!(test_id, ?code, "harness exited abnormally");
            TestResult::harness_failure(
                test_id,
                raw_or(diagnostics, || match code {
                    Some(code) => format!("harness exited with status {}", code),
                    None => "harness terminated by signal".to_string(),
                }),
            )
        }
        ExitOutcome::Success => {
            match demux::demultiplex(&execution.stdout, execution.side_channel.as_deref()) {
                Ok(verdict) => verdict.into_result(test_id),
                Err(violation) => {
                    error!(test_id, %violation, "harness protocol violation");
                    TestResult::harness_failure(
                        test_id,
                        raw_or(diagnostics, || violation.to_string()),
                    )
                }
            }
        }
    }
}

/// Ordered result collection for one submission
#[derive(Debug, Default)]
pub struct Aggregator {
    results: Vec<TestResult>,
    summary: Summary,
}

impl Aggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
            summary: Summary::default(),
        }
    }

    /// Append the result for `test`; callers push in submission order
    pub fn push(&mut self, test: &TestCase, execution: ExecutionOutput) -> &TestResult {
        let result = to_test_result(test.test_id, execution);
        debug!(
            test_id = result.test_id,
            status = result.status,
            is_success = result.is_success,
            "test case judged"
        );
        self.summary.record(&result);
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn finish(self) -> (Vec<TestResult>, Summary) {
        info!(
            total = self.summary.total,
            passed = self.summary.passed,
            failed = self.summary.failed,
            harness_failures = self.summary.harness_failures,
            timeouts = self.summary.timeouts,
            "aggregation complete"
        );
        (self.results, self.summary)
    }
}
