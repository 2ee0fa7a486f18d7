//! Backend discovery and per-backend projection of a [`DisruptionMap`].

use std::collections::BTreeSet;

use crate::model::{BackendDisruption, BackendName, DisruptionMap};

/// Every backend to evaluate: `required` plus every backend observed in any
/// run, deduplicated and sorted.
pub fn all_backend_names(
    required: &BTreeSet<BackendName>,
    disruption: &DisruptionMap,
) -> BTreeSet<BackendName> {
    let mut names = required.clone();
    for backends in disruption.values() {
        names.extend(backends.keys().cloned());
    }
    names
}

/// Narrow `disruption` to one backend. Runs that did not report `backend`
/// are omitted, never defaulted.
pub fn disruption_for_backend(disruption: &DisruptionMap, backend: &str) -> BackendDisruption {
    disruption
        .iter()
        .filter_map(|(job_run_id, backends)| {
            backends
                .get(backend)
                .map(|result| (job_run_id.clone(), result.clone()))
        })
        .collect()
}
