// Prometheus metrics for the judging API

use codesandbox_common::types::status_code;
use codesandbox_common::JudgingResponse;
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use std::time::Duration;
use tracing::warn;

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Judgements total (counter with language and response code labels)
    pub static ref JUDGEMENTS: CounterVec = CounterVec::new(
        Opts::new("codesandbox_judgements_total", "Total number of judgement requests"),
        &["language", "code"]
    )
    .expect("metric can be created");

    // Test case results (counter with language and harness status labels)
    pub static ref TEST_RESULTS: CounterVec = CounterVec::new(
        Opts::new("codesandbox_test_results_total", "Total number of judged test cases"),
        &["language", "status"]
    )
    .expect("metric can be created");

    // Judgement wall time histogram (in milliseconds)
    pub static ref JUDGEMENT_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "codesandbox_judgement_duration_ms",
            "Judgement wall time in milliseconds"
        )
        .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
        &["language"]
    )
    .expect("metric can be created");

    // Harness-level failures (launch errors, abnormal exits, protocol violations)
    pub static ref HARNESS_FAILURES: CounterVec = CounterVec::new(
        Opts::new("codesandbox_harness_failures_total", "Total harness-level test failures"),
        &["language"]
    )
    .expect("metric can be created");

    // Requests rejected before reaching the pipeline
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("codesandbox_requests_rejected_total", "Total requests with unparseable bodies"),
        &["reason"]
    )
    .expect("metric can be created");
}

static INIT: Once = Once::new();

/// Register every collector; repeated calls are no-ops
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(JUDGEMENTS.clone()),
            Box::new(TEST_RESULTS.clone()),
            Box::new(JUDGEMENT_DURATION.clone()),
            Box::new(HARNESS_FAILURES.clone()),
            Box::new(REQUESTS_REJECTED.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                warn!(%err, "failed to register collector");
            }
        }
    });
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Record a finished judgement; `language` must already be a bounded label
pub fn record_judgement(language: &str, response: &JudgingResponse, elapsed: Duration) {
    JUDGEMENTS
        .with_label_values(&[language, &response.code.to_string()])
        .inc();
    JUDGEMENT_DURATION
        .with_label_values(&[language])
        .observe(elapsed.as_secs_f64() * 1000.0);

    for result in &response.results {
        TEST_RESULTS
            .with_label_values(&[language, status_label(result.status)])
            .inc();
        if result.is_harness_failure() {
            HARNESS_FAILURES.with_label_values(&[language]).inc();
        }
    }
}

pub fn record_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}

fn status_label(status: i32) -> &'static str {
    match status {
        status_code::OK => "ok",
        status_code::SOLUTION_ERROR => "solution_error",
        status_code::HARNESS_FAILURE => "harness_failure",
        status_code::TIME_LIMIT_EXCEEDED => "time_limit_exceeded",
        status_code::MEMORY_LIMIT_EXCEEDED => "memory_limit_exceeded",
        _ => "other",
    }
}
