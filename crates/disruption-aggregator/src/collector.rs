//! Partial-failure-tolerant collection of per-run disruption data.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::availability::AvailabilityParser;
use crate::error::{AggregateError, AggregatorError, AggregatorResult};
use crate::job_run::JobRun;
use crate::model::DisruptionMap;
use crate::obs;

/// What a collection pass gathered.
#[derive(Debug, Default)]
pub struct CollectedDisruption {
    /// Data for every run that produced any, keyed by job run ID.
    pub by_job_run: DisruptionMap,
    /// Every per-run error, or `None` if all runs were fetched cleanly.
    pub error: Option<AggregateError>,
}

impl CollectedDisruption {
    /// Number of job runs that contributed data.
    pub fn job_runs_with_data(&self) -> usize {
        self.by_job_run.len()
    }
}

/// Fetches and parses disruption artifacts for a set of finished job runs.
pub struct RawDataCollector {
    parser: Arc<dyn AvailabilityParser>,
    prefix: String,
}

impl RawDataCollector {
    pub fn new(parser: Arc<dyn AvailabilityParser>, prefix: impl Into<String>) -> Self {
        Self {
            parser,
            prefix: prefix.into(),
        }
    }

    /// Collect disruption data from `job_runs`, one run at a time.
    ///
    /// A run that fails to fetch or parse is recorded in the aggregate error
    /// and skipped; a run with no matching files is skipped with a warning.
    /// The only error returned directly is [`AggregatorError::Cancelled`].
    pub async fn collect(
        &self,
        cancel: &CancellationToken,
        job_runs: &[Arc<dyn JobRun>],
    ) -> AggregatorResult<CollectedDisruption> {
        obs::emit_collection_started(job_runs.len(), &self.prefix);

        let mut by_job_run = DisruptionMap::new();
        let mut errors = AggregateError::new();

        for job_run in job_runs {
            let job_run_id = job_run.job_run_id();

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AggregatorError::Cancelled),
                fetched = job_run.artifact_files_with_prefix(cancel, &self.prefix) => fetched,
            };
            let raw_files = match fetched {
                Ok(files) => files,
                Err(AggregatorError::Cancelled) => return Err(AggregatorError::Cancelled),
                Err(e) => {
                    obs::emit_job_run_failed(job_run_id, &e);
                    errors.push(e);
                    continue;
                }
            };

            if raw_files.is_empty() {
                obs::emit_job_run_empty(job_run_id);
                continue;
            }

            match self.parser.parse_availability(job_run_id, &raw_files) {
                Ok(disruption) => {
                    by_job_run.insert(job_run_id.to_string(), disruption);
                }
                Err(e) => {
                    obs::emit_job_run_failed(job_run_id, &e);
                    errors.push(e);
                }
            }
        }

        obs::emit_collection_finished(by_job_run.len(), errors.len());

        Ok(CollectedDisruption {
            by_job_run,
            error: errors.into_option(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::BackendDisruptionJsonParser;
    use crate::fakes::MemoryJobRun;

    fn collector() -> RawDataCollector {
        RawDataCollector::new(Arc::new(BackendDisruptionJsonParser), "backend-disruption")
    }

    #[tokio::test]
    async fn test_failed_run_does_not_abort_others() {
        let runs: Vec<Arc<dyn JobRun>> = vec![
            Arc::new(MemoryJobRun::failing("r1", "bucket unavailable")),
            Arc::new(MemoryJobRun::with_disruption("r2", &[("kube-api-new-connections", 2)])),
        ];

        let collected = collector()
            .collect(&CancellationToken::new(), &runs)
            .await
            .expect("collect");

        assert_eq!(collected.job_runs_with_data(), 1);
        assert!(collected.by_job_run.contains_key("r2"));
        let err = collected.error.expect("aggregate error");
        assert_eq!(err.len(), 1);
        assert!(err.to_string().contains("r1"));
    }

    #[tokio::test]
    async fn test_empty_run_is_skipped_without_error() {
        let runs: Vec<Arc<dyn JobRun>> = vec![
            Arc::new(MemoryJobRun::empty("r1")),
            Arc::new(MemoryJobRun::with_disruption("r2", &[("kube-api-new-connections", 0)])),
        ];

        let collected = collector()
            .collect(&CancellationToken::new(), &runs)
            .await
            .expect("collect");

        assert!(!collected.by_job_run.contains_key("r1"));
        assert_eq!(collected.job_runs_with_data(), 1);
        assert!(collected.error.is_none());
    }

    #[tokio::test]
    async fn test_parse_error_is_aggregated() {
        let runs: Vec<Arc<dyn JobRun>> = vec![Arc::new(MemoryJobRun::with_files(
            "r1",
            [("backend-disruption_e2e.json", b"{oops".to_vec())],
        ))];

        let collected = collector()
            .collect(&CancellationToken::new(), &runs)
            .await
            .expect("collect");

        assert!(collected.by_job_run.is_empty());
        assert!(matches!(
            collected.error.as_ref().map(|e| &e.errors()[0]),
            Some(AggregatorError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_collection_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runs: Vec<Arc<dyn JobRun>> = vec![Arc::new(MemoryJobRun::with_disruption(
            "r1",
            &[("kube-api-new-connections", 1)],
        ))];

        let result = collector().collect(&cancel, &runs).await;
        assert!(matches!(result, Err(AggregatorError::Cancelled)));
    }
}
