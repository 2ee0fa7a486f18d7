//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryJobRun` and `StaticCheck` that satisfy the trait
//! contracts without touching CI storage or a real baseline.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::checks::{CheckOutcome, DisruptionCheck};
use crate::error::{AggregatorError, AggregatorResult};
use crate::job_run::JobRun;
use crate::model::BackendDisruption;

// ---------------------------------------------------------------------------
// MemoryJobRun
// ---------------------------------------------------------------------------

/// Job run whose artifacts live in memory.
#[derive(Debug)]
pub struct MemoryJobRun {
    job_run_id: String,
    files: Result<BTreeMap<String, Vec<u8>>, String>,
}

impl MemoryJobRun {
    /// A run holding exactly `files`; prefix filtering still applies.
    pub fn with_files<I, K>(job_run_id: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self {
            job_run_id: job_run_id.to_string(),
            files: Ok(files.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// A run with one `backend-disruption_e2e.json` file reporting
    /// `(backend, seconds)` pairs.
    pub fn with_disruption(job_run_id: &str, backends: &[(&str, u64)]) -> Self {
        let disruptions: serde_json::Map<String, serde_json::Value> = backends
            .iter()
            .map(|(name, seconds)| {
                (
                    name.to_string(),
                    json!({
                        "Name": name,
                        "ConnectionType": "New",
                        "DisruptedDuration": seconds * 1_000_000_000,
                    }),
                )
            })
            .collect();
        let body = json!({ "BackendDisruptions": disruptions }).to_string();
        Self::with_files(
            job_run_id,
            [("backend-disruption_e2e.json", body.into_bytes())],
        )
    }

    /// A run that produced no artifact files.
    pub fn empty(job_run_id: &str) -> Self {
        Self::with_files(job_run_id, Vec::<(String, Vec<u8>)>::new())
    }

    /// A run whose artifact fetch always fails with `reason`.
    pub fn failing(job_run_id: &str, reason: &str) -> Self {
        Self {
            job_run_id: job_run_id.to_string(),
            files: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl JobRun for MemoryJobRun {
    fn job_run_id(&self) -> &str {
        &self.job_run_id
    }

    async fn artifact_files_with_prefix(
        &self,
        _cancel: &CancellationToken,
        prefix: &str,
    ) -> AggregatorResult<BTreeMap<String, Vec<u8>>> {
        match &self.files {
            Ok(files) => Ok(files
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .map(|(name, bytes)| (name.clone(), bytes.clone()))
                .collect()),
            Err(reason) => Err(AggregatorError::Fetch {
                job_run_id: self.job_run_id.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticCheck
// ---------------------------------------------------------------------------

/// Check that returns a fixed outcome (or error) and records every backend
/// it was asked about.
#[derive(Debug)]
pub struct StaticCheck {
    outcome: Result<CheckOutcome, String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticCheck {
    pub fn passing(message: &str) -> Self {
        Self::returning(CheckOutcome {
            failed_job_run_ids: vec![],
            successful_job_run_ids: vec![],
            failed: false,
            message: message.to_string(),
        })
    }

    pub fn returning(outcome: CheckOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn erroring(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(backend, number of runs in the projection)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DisruptionCheck for StaticCheck {
    async fn check(
        &self,
        _cancel: &CancellationToken,
        disruption: &BackendDisruption,
        backend: &str,
    ) -> AggregatorResult<CheckOutcome> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((backend.to_string(), disruption.len()));
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(reason) => Err(AggregatorError::Evaluation(reason.clone())),
        }
    }
}
