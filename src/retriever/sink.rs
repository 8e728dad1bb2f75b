//! Filesystem download sink

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::DownloadSink;
use crate::error::{Error, Result};
use crate::handle::HandleSnapshot;
use crate::utils::{collision_free_path, sanitize_file_name};

/// Writes downloads into a directory
///
/// File names are sanitised to a single path component; existing files are
/// never overwritten, a ` (n)` suffix is added instead.
#[derive(Clone, Debug)]
pub struct FileSystemSink {
    dir: PathBuf,
}

impl FileSystemSink {
    /// Sink writing into `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for FileSystemSink {
    async fn save(
        &self,
        file_name: &str,
        handle: &HandleSnapshot,
        bytes: Bytes,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::SaveFailed {
                file_name: file_name.to_string(),
                dir: self.dir.clone(),
                reason: format!("cannot create directory: {e}"),
            })?;

        let name = sanitize_file_name(file_name);
        let target = collision_free_path(&self.dir, &name)?;

        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| Error::SaveFailed {
                file_name: file_name.to_string(),
                dir: self.dir.clone(),
                reason: e.to_string(),
            })?;

        debug!(handle = %handle.id, path = %target.display(), len = bytes.len(), "file written");
        Ok(target)
    }
}
