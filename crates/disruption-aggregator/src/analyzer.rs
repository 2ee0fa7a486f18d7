//! Backend disruption analysis: collection, minimum-sample policy, and the
//! check × backend evaluation matrix.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::availability::{AvailabilityParser, RequiredBackendSource, BACKEND_DISRUPTION_PREFIX};
use crate::backends::{all_backend_names, disruption_for_backend};
use crate::checks::CheckRegistry;
use crate::collector::RawDataCollector;
use crate::error::{AggregatorError, AggregatorResult};
use crate::job_run::JobRun;
use crate::obs;
use crate::report::{disruption_to_test_case, TestCase, TestSuite};
use crate::urls::UrlFormatter;

/// Runs with data required before any check is evaluated.
pub const MIN_JOB_RUNS_WITH_DATA: usize = 3;

/// Name of the leading case that reports on data collection.
pub const COLLECT_DATA_TEST_CASE: &str = "should collect disruption data";

/// Failure message of the leading case when too few runs have data.
pub const NOT_ENOUGH_DATA_MESSAGE: &str = "not enough data to aggregate";

/// Analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Name of the produced test suite.
    pub suite_name: String,
    /// File name prefix of disruption artifacts.
    pub artifact_prefix: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            suite_name: "BackendDisruption".to_string(),
            artifact_prefix: BACKEND_DISRUPTION_PREFIX.to_string(),
        }
    }
}

/// Aggregates disruption data from finished job runs into a [`TestSuite`].
pub struct DisruptionAnalyzer {
    config: AnalyzerConfig,
    collector: RawDataCollector,
    required_backends: Arc<dyn RequiredBackendSource>,
    checks: CheckRegistry,
    urls: Arc<dyn UrlFormatter>,
}

impl DisruptionAnalyzer {
    pub fn new(
        config: AnalyzerConfig,
        parser: Arc<dyn AvailabilityParser>,
        required_backends: Arc<dyn RequiredBackendSource>,
        checks: CheckRegistry,
        urls: Arc<dyn UrlFormatter>,
    ) -> Self {
        let collector = RawDataCollector::new(parser, config.artifact_prefix.clone());
        Self {
            config,
            collector,
            required_backends,
            checks,
            urls,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Build the disruption test suite for `job_runs`.
    ///
    /// The first case, [`COLLECT_DATA_TEST_CASE`], carries the collected raw
    /// data. With fewer than [`MIN_JOB_RUNS_WITH_DATA`] runs with data the
    /// result depends on collection errors: if any occurred the whole call
    /// fails, otherwise the leading case is failed and no checks run.
    /// Otherwise every registered check is evaluated for every backend, in
    /// template then backend-name order; a check error aborts the call.
    pub async fn calculate_disruption_test_suite(
        &self,
        cancel: &CancellationToken,
        job_gcs_bucket_root: &str,
        job_runs: &[Arc<dyn JobRun>],
    ) -> AggregatorResult<TestSuite> {
        self.analyze(cancel, job_gcs_bucket_root, job_runs)
            .instrument(obs::analysis_span(job_gcs_bucket_root))
            .await
    }

    async fn analyze(
        &self,
        cancel: &CancellationToken,
        job_gcs_bucket_root: &str,
        job_runs: &[Arc<dyn JobRun>],
    ) -> AggregatorResult<TestSuite> {
        let mut suite = TestSuite::new(self.config.suite_name.clone());
        let mut collected_data_case = TestCase::new(COLLECT_DATA_TEST_CASE);

        let collected = self.collector.collect(cancel, job_runs).await?;
        match serde_yaml::to_string(&collected.by_job_run) {
            Ok(raw) => collected_data_case.system_out = raw,
            Err(e) => debug!(error = %e, "could not serialize collected disruption data"),
        }

        let job_runs_with_data = collected.job_runs_with_data();
        if job_runs_with_data < MIN_JOB_RUNS_WITH_DATA {
            if let Some(err) = collected.error {
                return Err(AggregatorError::Collection(err));
            }
            obs::emit_insufficient_data(job_runs_with_data, MIN_JOB_RUNS_WITH_DATA);
            collected_data_case.fail(NOT_ENOUGH_DATA_MESSAGE);
            suite.push_case(collected_data_case);
            obs::emit_suite_finished(suite.name(), suite.test_cases().len(), suite.num_failed());
            return Ok(suite);
        }
        if let Some(err) = &collected.error {
            obs::emit_collection_incomplete(err);
        }
        suite.push_case(collected_data_case);

        let disruption = collected.by_job_run;
        let backends = all_backend_names(&self.required_backends.required_backends(), &disruption);

        for registered in self.checks.iter() {
            for backend in &backends {
                let for_backend = disruption_for_backend(&disruption, backend);

                let checked = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
                    checked = registered.check.check(cancel, &for_backend, backend) => checked,
                };
                let outcome = match checked {
                    Ok(outcome) => outcome,
                    Err(AggregatorError::Cancelled) => return Err(AggregatorError::Cancelled),
                    Err(e) => {
                        return Err(AggregatorError::Check {
                            template: registered.template.to_string(),
                            backend: backend.clone(),
                            source: Box::new(e),
                        })
                    }
                };

                let test_case_name = registered.template.render(backend);
                let test_case = disruption_to_test_case(
                    &test_case_name,
                    job_gcs_bucket_root,
                    &outcome.failed_job_run_ids,
                    &outcome.successful_job_run_ids,
                    outcome.failed,
                    &outcome.message,
                    self.urls.as_ref(),
                )?;
                obs::emit_case_evaluated(
                    &test_case_name,
                    outcome.failed,
                    outcome.failed_job_run_ids.len(),
                );
                suite.push_case(test_case);
            }
        }

        obs::emit_suite_finished(suite.name(), suite.test_cases().len(), suite.num_failed());
        Ok(suite)
    }
}
