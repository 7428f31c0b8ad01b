//! Local temporary files that remove themselves.

use shared_types::BusError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// A file in the work directory that is deleted when dropped, whether or
/// not the operation using it succeeded.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    /// Take responsibility for `path`, which may not exist yet.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Create `path` holding `bytes`. A partially written file is still
    /// removed.
    pub async fn write(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, BusError> {
        let scratch = Self::adopt(path);
        let mut file = tokio::fs::File::create(&scratch.path)
            .await
            .map_err(|e| BusError::io(&scratch.path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| BusError::io(&scratch.path, e))?;
        file.flush()
            .await
            .map_err(|e| BusError::io(&scratch.path, e))?;
        Ok(scratch)
    }

    /// Local path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole contents of the file.
    pub async fn read(&self) -> Result<Vec<u8>, BusError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| BusError::io(&self.path, e))
    }

    /// Keep the file on disk and hand its path to the caller.
    pub fn persist(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file"),
        }
    }
}
