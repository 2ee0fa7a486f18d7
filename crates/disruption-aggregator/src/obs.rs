//! Structured observability hooks for disruption analysis.
//!
//! This module provides:
//! - An analysis-scoped tracing span via [`analysis_span`]
//! - Emission functions for key lifecycle events: collection, policy
//!   decisions, case evaluation, suite completion
//!
//! Events carry an `event` field so they can be filtered in JSON output.

use tracing::{info, warn};

/// Span tagged with the artifact bucket root of one analysis.
///
/// Attach it with `tracing::Instrument` so the analysis future stays `Send`.
///
/// # Example
///
/// ```ignore
/// analyzer_future.instrument(analysis_span("origin-ci-test/logs/job")).await
/// ```
pub fn analysis_span(bucket_root: &str) -> tracing::Span {
    tracing::info_span!("disruption.analysis", bucket_root = %bucket_root)
}

/// Emit event: collection started for `job_runs` runs.
pub fn emit_collection_started(job_runs: usize, prefix: &str) {
    info!(event = "collection.started", job_runs = job_runs, prefix = %prefix);
}

/// Emit event: a job run produced no disruption files.
pub fn emit_job_run_empty(job_run_id: &str) {
    warn!(
        event = "collection.job_run_empty",
        job_run_id = %job_run_id,
        "Could not fetch backend disruption data for job run"
    );
}

/// Emit event: a job run was skipped because of an error.
pub fn emit_job_run_failed(job_run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "collection.job_run_failed", job_run_id = %job_run_id, error = %error);
}

/// Emit event: collection finished.
pub fn emit_collection_finished(job_runs_with_data: usize, errors: usize) {
    info!(
        event = "collection.finished",
        job_runs_with_data = job_runs_with_data,
        errors = errors,
    );
}

/// Emit event: some runs failed but enough data remained to aggregate.
pub fn emit_collection_incomplete(error: &dyn std::fmt::Display) {
    warn!(
        event = "collection.incomplete",
        error = %error,
        "Could not fetch backend disruption data for all runs"
    );
}

/// Emit event: too few runs with data; checks are skipped.
pub fn emit_insufficient_data(job_runs_with_data: usize, minimum: usize) {
    warn!(
        event = "analysis.insufficient_data",
        job_runs_with_data = job_runs_with_data,
        minimum = minimum,
    );
}

/// Emit event: one check evaluated for one backend.
pub fn emit_case_evaluated(case_name: &str, failed: bool, failed_runs: usize) {
    info!(
        event = "analysis.case_evaluated",
        case = %case_name,
        failed = failed,
        failed_runs = failed_runs,
    );
}

/// Emit event: suite assembled.
pub fn emit_suite_finished(suite_name: &str, test_cases: usize, num_failed: u32) {
    info!(
        event = "analysis.suite_finished",
        suite = %suite_name,
        test_cases = test_cases,
        num_failed = num_failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_job_run_empty_logs_run_id() {
        emit_job_run_empty("run-empty-1");
        assert!(logs_contain("collection.job_run_empty"));
        assert!(logs_contain("run-empty-1"));
    }

    #[traced_test]
    #[test]
    fn test_collection_incomplete_logs_error() {
        emit_collection_incomplete(&"bucket unavailable");
        assert!(logs_contain("bucket unavailable"));
    }

    #[traced_test]
    #[test]
    fn test_analysis_span_tags_events() {
        let span = analysis_span("origin-ci-test/logs/job");
        let _entered = span.enter();
        emit_collection_finished(3, 0);
        assert!(logs_contain("origin-ci-test/logs/job"));
    }
}
