//! Job run provider seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AggregatorResult;

/// One finished CI job run whose artifacts can be retrieved.
///
/// Implement this trait to plug in real CI storage, a local directory, or
/// test stubs.
#[async_trait]
pub trait JobRun: Send + Sync {
    /// Unique ID of the job run.
    fn job_run_id(&self) -> &str;

    /// Fetch every artifact file whose name starts with `prefix`, keyed by
    /// file name. An empty map means the run produced no such files.
    async fn artifact_files_with_prefix(
        &self,
        cancel: &CancellationToken,
        prefix: &str,
    ) -> AggregatorResult<BTreeMap<String, Vec<u8>>>;
}
