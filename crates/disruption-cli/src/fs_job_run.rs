//! Job runs backed by a local directory of downloaded artifacts.
//!
//! Layout: `<root>/<job run ID>/**/<artifact files>`. Every immediate
//! sub-directory of the root is one job run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use disruption_aggregator::{AggregatorError, AggregatorResult, CancellationToken, JobRun};

/// One job run whose artifacts live under `dir`.
#[derive(Debug, Clone)]
pub struct FsJobRun {
    job_run_id: String,
    dir: PathBuf,
}

impl FsJobRun {
    pub fn new(job_run_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            job_run_id: job_run_id.into(),
            dir: dir.into(),
        }
    }

    fn fetch_error(&self, err: impl std::fmt::Display) -> AggregatorError {
        AggregatorError::Fetch {
            job_run_id: self.job_run_id.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl JobRun for FsJobRun {
    fn job_run_id(&self) -> &str {
        &self.job_run_id
    }

    async fn artifact_files_with_prefix(
        &self,
        cancel: &CancellationToken,
        prefix: &str,
    ) -> AggregatorResult<BTreeMap<String, Vec<u8>>> {
        let mut files = BTreeMap::new();
        let mut pending = vec![self.dir.clone()];

        while let Some(dir) = pending.pop() {
            if cancel.is_cancelled() {
                return Err(AggregatorError::Cancelled);
            }
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| self.fetch_error(format!("{}: {e}", dir.display())))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| self.fetch_error(e))?
            {
                let file_type = entry.file_type().await.map_err(|e| self.fetch_error(e))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if !name.starts_with(prefix) {
                    continue;
                }
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| self.fetch_error(format!("{}: {e}", path.display())))?;
                files.insert(name, bytes);
            }
        }

        Ok(files)
    }
}

/// Every job run directory under `root`, ordered by job run ID.
pub async fn discover_job_runs(root: &Path) -> AggregatorResult<Vec<Arc<dyn JobRun>>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            let job_run_id = entry.file_name().to_string_lossy().to_string();
            found.push(FsJobRun::new(job_run_id, entry.path()));
        }
    }
    found.sort_by(|a, b| a.job_run_id.cmp(&b.job_run_id));
    Ok(found
        .into_iter()
        .map(|run| Arc::new(run) as Arc<dyn JobRun>)
        .collect())
}
