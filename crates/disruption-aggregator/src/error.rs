//! Error types for disruption aggregation.

use thiserror::Error;

/// Errors produced while collecting and evaluating disruption data.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Fetching artifact files for a job run failed.
    #[error("failed to fetch artifacts for job run {job_run_id}: {reason}")]
    Fetch { job_run_id: String, reason: String },

    /// The raw disruption files of a job run could not be parsed.
    #[error("failed to parse disruption data for job run {job_run_id}: {reason}")]
    Parse { job_run_id: String, reason: String },

    /// One or more job runs could not be collected.
    #[error("could not fetch backend disruption data: {0}")]
    Collection(#[from] AggregateError),

    /// A disruption check failed internally.
    #[error("disruption check '{template}' failed for backend {backend}")]
    Check {
        template: String,
        backend: String,
        #[source]
        source: Box<AggregatorError>,
    },

    /// A check implementation could not evaluate its input.
    #[error("check evaluation failed: {0}")]
    Evaluation(String),

    /// A report payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A check name template does not carry exactly one backend slot.
    #[error("invalid check template '{template}': expected exactly one {{backend}} placeholder")]
    InvalidTemplate { template: String },

    /// The same check template was registered twice.
    #[error("duplicate check template: {template}")]
    DuplicateTemplate { template: String },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for AggregatorError {
    fn from(err: serde_yaml::Error) -> Self {
        AggregatorError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AggregatorError {
    fn from(err: serde_json::Error) -> Self {
        AggregatorError::Serialization(err.to_string())
    }
}

/// Convenience result alias.
pub type AggregatorResult<T> = std::result::Result<T, AggregatorError>;

/// Every error encountered during a best-effort pass, in encounter order.
///
/// Displays as `[first, second, ...]`, or just the message when there is
/// a single error.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<AggregatorError>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: AggregatorError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[AggregatorError] {
        &self.errors
    }

    /// `None` when nothing was recorded.
    pub fn into_option(self) -> Option<Self> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.len() == 1 {
            return write!(f, "{}", self.errors[0]);
        }
        write!(f, "[")?;
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{err}")?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for AggregateError {}
