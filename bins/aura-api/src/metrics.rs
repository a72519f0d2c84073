// Prometheus metrics for the Aura API

use aura_common::types::ExecutionResult;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aura_executions_total",
        "Sandbox submissions by language and outcome",
        &["language", "outcome"]
    )
    .unwrap();
    pub static ref TEST_CASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aura_test_cases_total",
        "Individual test cases by result",
        &["result"]
    )
    .unwrap();
    pub static ref LLM_CACHE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aura_llm_cache_total",
        "LLM response cache lookups by result",
        &["result"]
    )
    .unwrap();
    pub static ref COOLDOWN_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        "aura_cooldown_rejections_total",
        "Requests rejected by the per-session cooldown"
    )
    .unwrap();
    pub static ref EXECUTION_DURATION_SECONDS: Histogram = register_histogram!(
        "aura_execution_duration_seconds",
        "Wall time spent executing one submission",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();
}

pub fn record_execution(language: &str, result: &ExecutionResult, elapsed_secs: f64) {
    let outcome = if result.error.is_some() {
        "rejected"
    } else if result.success {
        "passed"
    } else {
        "failed"
    };
    EXECUTIONS_TOTAL.with_label_values(&[language, outcome]).inc();

    for test in &result.outcomes {
        let label = if test.passed { "passed" } else { "failed" };
        TEST_CASES_TOTAL.with_label_values(&[label]).inc();
    }

    EXECUTION_DURATION_SECONDS.observe(elapsed_secs);
}

/// Render the default registry in the text exposition format
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
