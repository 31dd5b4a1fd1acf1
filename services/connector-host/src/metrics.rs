//! Prometheus metrics exposition
//!
//! The library crates emit through the `metrics` facade:
//!
//! - `oauth_token_refreshes_total` (counter): label `outcome`
//! - `connector_tool_calls_total` (counter): labels `tool`, `outcome`
//! - `connector_tool_call_duration_seconds` (histogram): label `tool`
//!
//! This module installs the recorder that renders them on `/metrics`.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const TOOL_CALL_DURATION: &str = "connector_tool_call_duration_seconds";

/// Buckets from 5ms to 60s, covering the configurable provider timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(TOOL_CALL_DURATION.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `connector_tool_call_duration_seconds` renders as a histogram (`_bucket`
/// lines) rather than the default summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}
