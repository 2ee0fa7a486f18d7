//! Core data model for collected disruption measurements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of one finished CI job run.
pub type JobRunId = String;

/// Name of a monitored backend (e.g. `"kube-api-new-connections"`).
pub type BackendName = String;

/// Disruption measured for one backend during one job run.
///
/// Produced by an [`AvailabilityParser`](crate::availability::AvailabilityParser)
/// and interpreted only by [`DisruptionCheck`](crate::checks::DisruptionCheck)
/// implementations; aggregation moves it around as an opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub server_name: String,
    pub seconds_unavailable: u64,
}

/// Backend name → measurement for a single job run.
pub type BackendAvailability = BTreeMap<BackendName, AvailabilityResult>;

/// Job run ID → backend name → measurement.
///
/// A run absent from the map has no data; it is never treated as a zero
/// measurement.
pub type DisruptionMap = BTreeMap<JobRunId, BackendAvailability>;

/// Job run ID → measurement, narrowed to a single backend.
pub type BackendDisruption = BTreeMap<JobRunId, AvailabilityResult>;
