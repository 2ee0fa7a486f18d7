//! Availability parsing and the required backend set.
//!
//! Both are collaborators of the analyzer: parsers turn raw artifact bytes
//! into [`AvailabilityResult`]s, and a [`RequiredBackendSource`] names the
//! backends that must always be evaluated, even when no run reported them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{AggregatorError, AggregatorResult};
use crate::model::{AvailabilityResult, BackendAvailability};

/// Default artifact file name prefix for backend disruption data.
pub const BACKEND_DISRUPTION_PREFIX: &str = "backend-disruption";

/// Turns the raw disruption files of one job run into per-backend results.
pub trait AvailabilityParser: Send + Sync {
    fn parse_availability(
        &self,
        job_run_id: &str,
        raw_files: &BTreeMap<String, Vec<u8>>,
    ) -> AggregatorResult<BackendAvailability>;
}

#[derive(Debug, Deserialize)]
struct BackendDisruptionList {
    #[serde(rename = "BackendDisruptions", default)]
    backend_disruptions: BTreeMap<String, BackendDisruptionEntry>,
}

#[derive(Debug, Deserialize)]
struct BackendDisruptionEntry {
    /// Go `time.Duration`, in nanoseconds.
    #[serde(rename = "DisruptedDuration", default)]
    disrupted_duration: u64,
}

/// Parses `backend-disruption*.json` files of the form
/// `{"BackendDisruptions": {"<name>": {"DisruptedDuration": <ns>, ...}}}`.
///
/// Durations are rounded up to whole seconds. A backend reported by several
/// files of the same run accumulates the seconds of each file.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendDisruptionJsonParser;

impl AvailabilityParser for BackendDisruptionJsonParser {
    fn parse_availability(
        &self,
        job_run_id: &str,
        raw_files: &BTreeMap<String, Vec<u8>>,
    ) -> AggregatorResult<BackendAvailability> {
        let mut results = BackendAvailability::new();
        for (file_name, bytes) in raw_files {
            let list: BackendDisruptionList =
                serde_json::from_slice(bytes).map_err(|e| AggregatorError::Parse {
                    job_run_id: job_run_id.to_string(),
                    reason: format!("{file_name}: {e}"),
                })?;

            for (backend, entry) in list.backend_disruptions {
                let seconds = ceil_seconds(entry.disrupted_duration);
                results
                    .entry(backend.clone())
                    .and_modify(|r| r.seconds_unavailable += seconds)
                    .or_insert(AvailabilityResult {
                        server_name: backend,
                        seconds_unavailable: seconds,
                    });
            }
        }
        Ok(results)
    }
}

fn ceil_seconds(nanos: u64) -> u64 {
    nanos.div_ceil(1_000_000_000)
}

/// Source of backend names that must appear in every report.
pub trait RequiredBackendSource: Send + Sync {
    fn required_backends(&self) -> BTreeSet<String>;
}

impl RequiredBackendSource for BTreeSet<String> {
    fn required_backends(&self) -> BTreeSet<String> {
        self.clone()
    }
}

/// Backends every cluster is expected to report disruption data for.
pub fn default_required_backends() -> BTreeSet<String> {
    [
        "kube-api-new-connections",
        "kube-api-reused-connections",
        "openshift-api-new-connections",
        "openshift-api-reused-connections",
        "oauth-api-new-connections",
        "oauth-api-reused-connections",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_parse_rounds_up_to_seconds() {
        let raw = files(&[(
            "backend-disruption_e2e.json",
            r#"{"BackendDisruptions": {
                "kube-api-new-connections": {"Name": "kube-api-new-connections", "DisruptedDuration": 1500000000},
                "oauth-api-new-connections": {"Name": "oauth-api-new-connections", "DisruptedDuration": 0}
            }}"#,
        )]);

        let parsed = BackendDisruptionJsonParser
            .parse_availability("r1", &raw)
            .expect("parse");

        assert_eq!(parsed["kube-api-new-connections"].seconds_unavailable, 2);
        assert_eq!(parsed["oauth-api-new-connections"].seconds_unavailable, 0);
        assert_eq!(
            parsed["kube-api-new-connections"].server_name,
            "kube-api-new-connections"
        );
    }

    #[test]
    fn test_parse_accumulates_across_files() {
        let raw = files(&[
            (
                "backend-disruption_e2e.json",
                r#"{"BackendDisruptions": {"kube-api-new-connections": {"DisruptedDuration": 3000000000}}}"#,
            ),
            (
                "backend-disruption_upgrade.json",
                r#"{"BackendDisruptions": {"kube-api-new-connections": {"DisruptedDuration": 1000000000}}}"#,
            ),
        ]);

        let parsed = BackendDisruptionJsonParser
            .parse_availability("r1", &raw)
            .expect("parse");
        assert_eq!(parsed["kube-api-new-connections"].seconds_unavailable, 4);
    }

    #[test]
    fn test_parse_malformed_names_run_and_file() {
        let raw = files(&[("backend-disruption_bad.json", "{not json")]);
        let err = BackendDisruptionJsonParser
            .parse_availability("r9", &raw)
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("r9"));
        assert!(msg.contains("backend-disruption_bad.json"));
    }

    #[test]
    fn test_default_required_backends_sorted() {
        let required = default_required_backends();
        assert_eq!(required.len(), 6);
        assert_eq!(
            required.iter().next().map(String::as_str),
            Some("kube-api-new-connections")
        );
    }
}
