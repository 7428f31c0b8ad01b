//! Repository transport backed by local directories.
//!
//! Each registered endpoint maps onto a root directory; remote paths resolve
//! below it. Useful for agents sharing one host and for tests. Credentials
//! are accepted but not checked.

use crate::error::RepositoryError;
use crate::ports::{Credentials, RepositoryEndpoint, RepositorySession, RepositoryTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Repository transport that stores objects below a local directory per endpoint.
#[derive(Debug, Default)]
pub struct FileSystemRepository {
    roots: RwLock<HashMap<RepositoryEndpoint, PathBuf>>,
}

impl FileSystemRepository {
    /// Transport with no endpoints; connections fail until one is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_endpoint(self, endpoint: RepositoryEndpoint, root: impl Into<PathBuf>) -> Self {
        self.register(endpoint, root);
        self
    }

    /// Serve `endpoint` from `root`. Replaces an earlier registration.
    pub fn register(&self, endpoint: RepositoryEndpoint, root: impl Into<PathBuf>) {
        self.roots.write().insert(endpoint, root.into());
    }
}

#[async_trait]
impl RepositoryTransport for FileSystemRepository {
    async fn connect(
        &self,
        endpoint: &RepositoryEndpoint,
        _credentials: Option<&Credentials>,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError> {
        let root = self.roots.read().get(endpoint).cloned().ok_or_else(|| {
            RepositoryError::Connection {
                endpoint: endpoint.address(),
                reason: "no repository registered for endpoint".to_string(),
            }
        })?;

        let is_dir = tokio::fs::metadata(&root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(RepositoryError::Connection {
                endpoint: endpoint.address(),
                reason: format!("root {} is not a directory", root.display()),
            });
        }

        trace!(endpoint = %endpoint, root = %root.display(), "Repository session opened");
        Ok(Box::new(FileSystemSession { root }))
    }
}

struct FileSystemSession {
    root: PathBuf,
}

impl FileSystemSession {
    /// Map a remote path below the root, refusing to climb out of it.
    fn resolve(&self, path: &str) -> Result<PathBuf, RepositoryError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                _ => {
                    return Err(RepositoryError::Io {
                        path: path.to_string(),
                        reason: "path escapes repository root".to_string(),
                    })
                }
            }
        }
        Ok(resolved)
    }
}

fn map_io(path: &str, error: std::io::Error) -> RepositoryError {
    match error.kind() {
        ErrorKind::AlreadyExists => RepositoryError::AlreadyExists(path.to_string()),
        ErrorKind::NotFound => RepositoryError::NotFound(path.to_string()),
        _ => RepositoryError::io(path, error),
    }
}

#[async_trait]
impl RepositorySession for FileSystemSession {
    async fn make_directory(&mut self, path: &str) -> Result<(), RepositoryError> {
        let local = self.resolve(path)?;
        tokio::fs::create_dir(&local)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, RepositoryError> {
        let local = self.resolve(path)?;
        let mut file = tokio::fs::File::create(&local)
            .await
            .map_err(|e| map_io(path, e))?;
        let written = tokio::io::copy(source, &mut file)
            .await
            .map_err(|e| RepositoryError::io(path, e))?;
        file.flush().await.map_err(|e| RepositoryError::io(path, e))?;
        Ok(written)
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RepositoryError> {
        let local = self.resolve(path)?;
        let mut file = tokio::fs::File::open(&local)
            .await
            .map_err(|e| map_io(path, e))?;
        let read = tokio::io::copy(&mut file, sink)
            .await
            .map_err(|e| RepositoryError::io(path, e))?;
        sink.flush().await.map_err(|e| RepositoryError::io(path, e))?;
        Ok(read)
    }

    async fn list(&mut self, path: &str) -> Result<Vec<String>, RepositoryError> {
        let local = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| map_io(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RepositoryError::io(path, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| RepositoryError::io(path, e))?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&mut self, path: &str) -> Result<(), RepositoryError> {
        let local = self.resolve(path)?;
        tokio::fs::remove_file(&local)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn close(&mut self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
