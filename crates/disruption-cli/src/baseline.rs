//! Historical disruption baseline and the checks that compare against it.
//!
//! The baseline is precomputed elsewhere; this module only loads it and
//! compares each backend's runs to the stored thresholds.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use disruption_aggregator::{
    AggregatorResult, BackendDisruption, CancellationToken, CheckOutcome, CheckRegistry,
    DisruptionCheck,
};
use serde::{Deserialize, Serialize};

pub const MEAN_CHECK_TEMPLATE: &str =
    "{backend} mean disruption should be less than historical plus two standard deviations";
pub const P95_CHECK_TEMPLATE: &str = "{backend} disruption P95 should not be worse";

/// Historical disruption statistics for one backend, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendBaseline {
    pub mean_seconds: f64,
    pub std_dev_seconds: f64,
    pub p95_seconds: f64,
}

/// Historical statistics keyed by backend name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default)]
    pub backends: BTreeMap<String, BackendBaseline>,
}

impl Baseline {
    /// Load a baseline from JSON, or YAML when the extension is `.yaml`/`.yml`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read baseline file: {:?}", path))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&content).context("Failed to parse baseline as YAML")
        } else {
            serde_json::from_str(&content).context("Failed to parse baseline as JSON")
        }
    }

    /// Registry with the mean and P95 checks backed by this baseline.
    pub fn check_registry(self: Arc<Self>) -> AggregatorResult<CheckRegistry> {
        CheckRegistry::new()
            .with_check(
                MEAN_CHECK_TEMPLATE,
                Arc::new(MeanWithinTwoStdDevs {
                    baseline: self.clone(),
                }),
            )?
            .with_check(P95_CHECK_TEMPLATE, Arc::new(P95NotWorse { baseline: self }))
    }
}

/// Split runs into (failed, successful) by whether they exceed `threshold`.
fn partition_runs(disruption: &BackendDisruption, threshold: f64) -> (Vec<String>, Vec<String>) {
    let mut failed = Vec::new();
    let mut successful = Vec::new();
    for (job_run_id, result) in disruption {
        if result.seconds_unavailable as f64 > threshold {
            failed.push(job_run_id.clone());
        } else {
            successful.push(job_run_id.clone());
        }
    }
    (failed, successful)
}

fn skipped(disruption: &BackendDisruption, message: String) -> CheckOutcome {
    CheckOutcome {
        failed_job_run_ids: Vec::new(),
        successful_job_run_ids: disruption.keys().cloned().collect(),
        failed: false,
        message,
    }
}

/// Nearest-rank percentile of `values`; `None` when empty.
fn percentile(values: &mut [u64], pct: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let rank = ((pct / 100.0) * values.len() as f64).ceil() as usize;
    Some(values[rank.clamp(1, values.len()) - 1])
}

/// Fails when the mean over all runs exceeds historical mean + 2σ.
struct MeanWithinTwoStdDevs {
    baseline: Arc<Baseline>,
}

#[async_trait]
impl DisruptionCheck for MeanWithinTwoStdDevs {
    async fn check(
        &self,
        _cancel: &CancellationToken,
        disruption: &BackendDisruption,
        backend: &str,
    ) -> AggregatorResult<CheckOutcome> {
        let Some(historical) = self.baseline.backends.get(backend) else {
            return Ok(skipped(disruption, format!("no historical data for {backend}")));
        };
        if disruption.is_empty() {
            return Ok(skipped(disruption, format!("no disruption data for {backend}")));
        }

        let threshold = historical.mean_seconds + 2.0 * historical.std_dev_seconds;
        let total: u64 = disruption.values().map(|r| r.seconds_unavailable).sum();
        let mean = total as f64 / disruption.len() as f64;
        let (failed_job_run_ids, successful_job_run_ids) = partition_runs(disruption, threshold);
        let failed = mean > threshold;

        Ok(CheckOutcome {
            failed_job_run_ids,
            successful_job_run_ids,
            failed,
            message: format!(
                "mean disruption of {backend} is {mean:.2}s, historical mean {:.2}s plus two standard deviations is {threshold:.2}s",
                historical.mean_seconds
            ),
        })
    }
}

/// Fails when the observed P95 exceeds the historical P95.
struct P95NotWorse {
    baseline: Arc<Baseline>,
}

#[async_trait]
impl DisruptionCheck for P95NotWorse {
    async fn check(
        &self,
        _cancel: &CancellationToken,
        disruption: &BackendDisruption,
        backend: &str,
    ) -> AggregatorResult<CheckOutcome> {
        let Some(historical) = self.baseline.backends.get(backend) else {
            return Ok(skipped(disruption, format!("no historical data for {backend}")));
        };
        let mut seconds: Vec<u64> = disruption.values().map(|r| r.seconds_unavailable).collect();
        let Some(observed) = percentile(&mut seconds, 95.0) else {
            return Ok(skipped(disruption, format!("no disruption data for {backend}")));
        };

        let (failed_job_run_ids, successful_job_run_ids) =
            partition_runs(disruption, historical.p95_seconds);
        let failed = observed as f64 > historical.p95_seconds;

        Ok(CheckOutcome {
            failed_job_run_ids,
            successful_job_run_ids,
            failed,
            message: format!(
                "P95 disruption of {backend} is {observed}s, historical P95 is {:.2}s",
                historical.p95_seconds
            ),
        })
    }
}
