/// Test Evaluator - turns raw runner output into pass/fail outcomes
///
/// **Core Responsibility:**
/// Parse the harness's JSON line and compare it against the expected output.
///
/// **Critical Properties:**
/// - Knows nothing about processes or interpreters
/// - Pure function: (raw outputs, test cases) → ExecutionResult
///
/// **Comparison Rules:**
/// - Trim leading and trailing whitespace on both sides: YES
/// - Case sensitivity: YES (exact match required)
/// - Numeric tolerance: NO ("4.0" does not match "4")
/// - A reported error always fails the test, whatever the output
///
/// **Failure Containment:**
/// - Output that is not the harness JSON line fails with "Failed to parse output"
///   and keeps the raw text as the actual output
/// - A runner error (timeout, spawn, oversized input) fails that test only,
///   with zero execution time
use crate::engine::TestExecutionOutput;
use aura_common::types::{ExecutionResult, TestCase, TestOutcome};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse output";

/// The single JSON line printed by every harness
#[derive(Debug, Deserialize)]
struct HarnessLine {
    #[serde(default)]
    output: String,
    #[serde(default)]
    error: Option<String>,
}

/// Parsed harness report: (actual output, error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessReport {
    pub output: String,
    pub error: Option<String>,
}

/// Parse the blob returned by the runner
pub fn parse_harness_output(raw: &str) -> HarnessReport {
    match serde_json::from_str::<HarnessLine>(raw.trim()) {
        Ok(line) => HarnessReport {
            output: line.output,
            error: line.error,
        },
        Err(_) => HarnessReport {
            output: raw.to_string(),
            error: Some(PARSE_FAILURE_MESSAGE.to_string()),
        },
    }
}

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Evaluate a single test case execution output
pub fn evaluate_test(output: &TestExecutionOutput, test_case: &TestCase) -> TestOutcome {
    match &output.result {
        Ok(run) => {
            let report = parse_harness_output(&run.output);
            let passed = report.error.is_none()
                && normalize_output(&report.output) == normalize_output(&test_case.expected_output);

            TestOutcome {
                index: output.index,
                passed,
                expected_output: test_case.expected_output.clone(),
                actual_output: report.output,
                error_message: report.error,
                execution_time_ms: run.elapsed.as_millis() as u64,
            }
        }
        Err(e) => TestOutcome {
            index: output.index,
            passed: false,
            expected_output: test_case.expected_output.clone(),
            actual_output: String::new(),
            error_message: Some(e.to_string()),
            execution_time_ms: 0,
        },
    }
}

/// Aggregate per-test outcomes into the final result
///
/// `success` is the conjunction of every `passed`; an empty submission is
/// vacuously successful. Total time only counts runs that finished.
pub fn aggregate_results(outputs: &[TestExecutionOutput], test_cases: &[TestCase]) -> ExecutionResult {
    let mut outcomes = Vec::with_capacity(test_cases.len());
    let mut total_time = Duration::ZERO;

    for (output, test_case) in outputs.iter().zip(test_cases) {
        if let Ok(run) = &output.result {
            total_time += run.elapsed;
        }

        let outcome = evaluate_test(output, test_case);
        debug!(
            test_num = outcome.index + 1,
            passed = outcome.passed,
            execution_ms = outcome.execution_time_ms,
            error = outcome.error_message.as_deref().unwrap_or(""),
            "Test evaluated"
        );
        outcomes.push(outcome);
    }

    let success = outcomes.iter().all(|o| o.passed);
    let passed = outcomes.iter().filter(|o| o.passed).count();

    info!(
        passed,
        total = outcomes.len(),
        success,
        execution_ms = total_time.as_millis() as u64,
        "Evaluation complete"
    );

    ExecutionResult {
        success,
        outcomes,
        total_execution_time_ms: total_time.as_millis() as u64,
        error: None,
    }
}

/// Main entry point for evaluation
pub fn evaluate(test_cases: &[TestCase], outputs: Vec<TestExecutionOutput>) -> ExecutionResult {
    aggregate_results(&outputs, test_cases)
}
