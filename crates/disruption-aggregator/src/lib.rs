//! Backend Disruption Aggregator
//!
//! Aggregates per-run backend disruption data from finished CI job runs and
//! synthesizes a deterministic test suite:
//! - Collects and parses disruption artifacts, tolerating per-run failures
//! - Enforces a minimum number of runs with data
//! - Evaluates every registered check for every backend
//! - Emits one test case per (check, backend) with links to each job run

pub mod analyzer;
pub mod availability;
pub mod backends;
pub mod checks;
pub mod collector;
pub mod error;
pub mod fakes;
pub mod job_run;
pub mod model;
pub mod obs;
pub mod report;
pub mod urls;

// Re-export key types
pub use analyzer::{
    AnalyzerConfig, DisruptionAnalyzer, COLLECT_DATA_TEST_CASE, MIN_JOB_RUNS_WITH_DATA,
    NOT_ENOUGH_DATA_MESSAGE,
};
pub use availability::{
    default_required_backends, AvailabilityParser, BackendDisruptionJsonParser,
    RequiredBackendSource, BACKEND_DISRUPTION_PREFIX,
};
pub use backends::{all_backend_names, disruption_for_backend};
pub use checks::{CheckOutcome, CheckRegistry, CheckTemplate, DisruptionCheck, FnCheck};
pub use collector::{CollectedDisruption, RawDataCollector};
pub use error::{AggregateError, AggregatorError, AggregatorResult};
pub use job_run::JobRun;
pub use model::{AvailabilityResult, BackendDisruption, DisruptionMap};
pub use report::{
    disruption_to_test_case, FailureOutput, JobRunLink, TestCase, TestCaseDetails, TestSuite,
};
pub use urls::{join_location, GcsUrlFormatter, UrlFormatter};

/// Re-exported so callers can build tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
