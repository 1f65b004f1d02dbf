//! Batch job lifecycle
//!
//! A job owns a uniquely named transient workspace for as long as it runs.
//! The workspace is a [`TempDir`], so it is removed on every exit path:
//! explicitly through [`BatchJob::close`], or on drop if the job unwinds.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FxError, Result};

/// Prefix for job workspace directories
const WORKSPACE_PREFIX: &str = "fxvariants-job-";

/// Shared flag used to cancel a running job between variants
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One upload's unit of work
#[derive(Debug)]
pub struct BatchJob {
    id: Uuid,
    created_at: DateTime<Utc>,
    workspace: TempDir,
    output_dir: PathBuf,
}

impl BatchJob {
    /// Create the output directory (if needed) and a fresh workspace
    ///
    /// The workspace lives under `temp_root` when given, otherwise under the
    /// system temp directory. Its name embeds the job id, so concurrent jobs
    /// never share a path.
    pub fn create(output_dir: &Path, temp_root: Option<&Path>) -> Result<Self> {
        fs::create_dir_all(output_dir)?;

        let id = Uuid::new_v4();
        let prefix = format!("{}{}-", WORKSPACE_PREFIX, id);
        let workspace = match temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir()?,
        };

        info!(
            "Created job {} with workspace {}",
            id,
            workspace.path().display()
        );

        Ok(Self {
            id,
            created_at: Utc::now(),
            workspace,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create (or reuse) the staging directory for the `index`th input
    pub fn staging_dir(&self, index: usize) -> Result<PathBuf> {
        let dir = self.workspace.path().join(format!("input-{:03}", index));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Fail with `Cancelled` if `token` has been triggered
    pub fn check_cancelled(&self, token: &CancelToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(FxError::Cancelled {
                job_id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Remove the workspace, reporting any filesystem error
    pub fn close(self) -> Result<()> {
        let path = self.workspace.path().to_path_buf();
        self.workspace.close()?;
        debug!("Removed workspace {}", path.display());
        info!("Cleaned up job {}", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_jobs_get_distinct_workspaces() {
        let root = tempdir().unwrap();
        let out = root.path().join("out");
        let a = BatchJob::create(&out, Some(root.path())).unwrap();
        let b = BatchJob::create(&out, Some(root.path())).unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.workspace(), b.workspace());
        assert!(a.workspace().exists() && b.workspace().exists());
        assert!(out.is_dir());
    }

    #[test]
    fn test_close_removes_workspace() {
        let root = tempdir().unwrap();
        let job = BatchJob::create(&root.path().join("out"), Some(root.path())).unwrap();
        let staging = job.staging_dir(0).unwrap();
        fs::write(staging.join("a.wav"), b"data").unwrap();
        let workspace = job.workspace().to_path_buf();

        job.close().unwrap();
        assert!(!workspace.exists());
    }

    #[test]
    fn test_drop_removes_workspace() {
        let root = tempdir().unwrap();
        let workspace = {
            let job = BatchJob::create(&root.path().join("out"), Some(root.path())).unwrap();
            job.workspace().to_path_buf()
        };
        assert!(!workspace.exists());
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let root = tempdir().unwrap();
        let job = BatchJob::create(&root.path().join("out"), Some(root.path())).unwrap();
        let token = CancelToken::new();
        let handle = token.clone();

        assert!(job.check_cancelled(&token).is_ok());
        handle.cancel();
        assert_eq!(
            job.check_cancelled(&token).unwrap_err().error_code(),
            "CANCELLED"
        );
    }
}
