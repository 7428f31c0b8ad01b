//! Repository connector service.

use crate::domain::cache::directory_prefixes;
use crate::domain::{select_expired, BlobPointer, CleanupReport, DirectoryCache};
use crate::error::RepositoryError;
use crate::ports::{Credentials, RepositoryEndpoint, RepositorySession, RepositoryTransport};
use crate::scratch::ScratchFile;
use shared_types::{BusConfig, BusError, TimestampSource, JSON_FILE_EXTENSION};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

/// Uploads, downloads and cleans up blobs for one agent.
///
/// All of the agent's objects live below `<prefix>/<busVersion>/<experiment>/<agent>`
/// on its own repository. Downloads may target any repository, since a
/// pointer can come from a peer.
pub struct RepositoryConnector {
    transport: Arc<dyn RepositoryTransport>,
    endpoint: RepositoryEndpoint,
    credentials: Option<Credentials>,
    agent_id: String,
    root: String,
    work_directory: PathBuf,
    directories: DirectoryCache,
    timestamps: Arc<dyn TimestampSource>,
}

impl RepositoryConnector {
    /// Connector for the repository named in `config`. No connection is made
    /// until the first operation.
    pub fn new(
        config: &BusConfig,
        transport: Arc<dyn RepositoryTransport>,
        timestamps: Arc<dyn TimestampSource>,
    ) -> Self {
        let repository = &config.repository;
        let credentials = (!repository.user.is_empty())
            .then(|| Credentials::new(&repository.user, &repository.password));

        Self {
            transport,
            endpoint: RepositoryEndpoint::new(&repository.server, repository.port),
            credentials,
            agent_id: config.agent_id.clone(),
            root: config.repository_root(),
            work_directory: config.work_directory.clone(),
            directories: DirectoryCache::new(),
            timestamps,
        }
    }

    /// This agent's own repository.
    pub fn endpoint(&self) -> &RepositoryEndpoint {
        &self.endpoint
    }

    /// Remote directory holding this agent's objects.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Local directory for scratch files.
    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    /// Remote directories already created or confirmed.
    pub fn directory_cache(&self) -> &DirectoryCache {
        &self.directories
    }

    /// Remote directory for a topic below the agent root.
    pub fn remote_directory(&self, topic_path: &str) -> String {
        let topic_path = topic_path.trim_matches('/');
        match (self.root.is_empty(), topic_path.is_empty()) {
            (true, _) => topic_path.to_string(),
            (false, true) => self.root.clone(),
            (false, false) => format!("{}/{}", self.root, topic_path),
        }
    }

    /// Where [`download`](Self::download) puts a local copy.
    pub fn local_path(&self, pointer: &BlobPointer, local_name: &str) -> PathBuf {
        self.work_directory
            .join(format!("{}{}", local_name, pointer.file_extension))
    }

    async fn open(
        &self,
        endpoint: &RepositoryEndpoint,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn RepositorySession>, BusError> {
        self.transport
            .connect(endpoint, credentials)
            .await
            .map_err(|e| BusError::Connection {
                endpoint: endpoint.address(),
                reason: e.to_string(),
            })
    }

    async fn close(&self, mut session: Box<dyn RepositorySession>) {
        if let Err(e) = session.close().await {
            warn!(endpoint = %self.endpoint, error = %e, "Closing repository session failed");
        }
    }

    /// Make sure `path` exists remotely, creating it one segment at a time.
    ///
    /// A path in the directory cache costs nothing. Concurrent first calls
    /// for the same path may both run the creation sequence; the second one
    /// just sees "already exists".
    pub async fn ensure_remote_directory(&self, path: &str) -> Result<(), BusError> {
        if path.trim_matches('/').is_empty() || self.directories.contains(path) {
            return Ok(());
        }

        let mut session = self.open(&self.endpoint, self.credentials.as_ref()).await?;
        let result = self.create_prefixes(session.as_mut(), path).await;
        self.close(session).await;
        result?;

        self.directories.insert(path);
        debug!(path = %path, "Remote directory ready");
        Ok(())
    }

    async fn create_prefixes(
        &self,
        session: &mut dyn RepositorySession,
        path: &str,
    ) -> Result<(), BusError> {
        for prefix in directory_prefixes(path) {
            if self.directories.contains(&prefix) {
                continue;
            }
            match session.make_directory(&prefix).await {
                Ok(()) | Err(RepositoryError::AlreadyExists(_)) => {
                    self.directories.insert(&prefix);
                }
                Err(e) => {
                    return Err(BusError::Upload {
                        path: prefix,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Stream `source` to `<root>/<topic_path>/<file_name><file_extension>`.
    pub async fn upload_from(
        &self,
        topic_path: &str,
        file_name: &str,
        file_extension: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<BlobPointer, BusError> {
        let directory = self.remote_directory(topic_path);
        self.ensure_remote_directory(&directory).await?;

        let file_path = if directory.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", directory, file_name)
        };
        let pointer = BlobPointer::new(
            &self.endpoint.server,
            self.endpoint.port,
            file_path,
            file_extension,
        );
        let remote_path = pointer.remote_path();

        let mut session = self.open(&self.endpoint, self.credentials.as_ref()).await?;
        let result = session.store(&remote_path, source).await;
        self.close(session).await;

        let bytes = result.map_err(|e| BusError::Upload {
            path: remote_path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %remote_path, bytes, "Uploaded blob");
        Ok(pointer)
    }

    /// Upload a local file.
    pub async fn upload(
        &self,
        topic_path: &str,
        file_name: &str,
        file_extension: &str,
        local_path: &Path,
    ) -> Result<BlobPointer, BusError> {
        let mut file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| BusError::io(local_path, e))?;
        self.upload_from(topic_path, file_name, file_extension, &mut file)
            .await
    }

    /// Upload JSON bytes through a timestamp-named scratch file. The scratch
    /// file is gone when this returns, successful or not.
    pub async fn upload_json_payload(
        &self,
        topic_path: &str,
        bytes: &[u8],
    ) -> Result<BlobPointer, BusError> {
        let timestamp = self.timestamps.next_timestamp();
        let scratch_path = self.work_directory.join(format!(
            "{}-{}{}",
            self.agent_id, timestamp, JSON_FILE_EXTENSION
        ));
        let scratch = ScratchFile::write(scratch_path, bytes).await?;
        self.upload(topic_path, &timestamp, JSON_FILE_EXTENSION, scratch.path())
            .await
    }

    /// Fetch the object behind `pointer` into
    /// `<work_directory>/<local_name><extension>`.
    ///
    /// Connects anonymously to the pointer's own server, which need not be
    /// this agent's repository. A failed transfer may leave a partial file
    /// at [`local_path`](Self::local_path).
    pub async fn download(
        &self,
        pointer: &BlobPointer,
        local_name: &str,
    ) -> Result<PathBuf, BusError> {
        let local_path = self.local_path(pointer, local_name);
        let mut file = tokio::fs::File::create(&local_path)
            .await
            .map_err(|e| BusError::io(&local_path, e))?;

        let endpoint = RepositoryEndpoint::new(&pointer.server, pointer.port);
        let mut session = self.open(&endpoint, None).await?;
        let remote_path = pointer.remote_path();
        let result = session.retrieve(&remote_path, &mut file).await;
        self.close(session).await;

        let bytes = result.map_err(|e| BusError::Download {
            path: remote_path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %remote_path, local = %local_path.display(), bytes, "Downloaded blob");
        Ok(local_path)
    }

    /// Delete objects under `<root>/<topic_path>`: everything when `cutoff`
    /// is empty, otherwise those whose name sorts strictly before it.
    ///
    /// A missing directory means there is nothing to delete. A listing
    /// failure aborts; a failed deletion is recorded and the rest proceed.
    pub async fn cleanup(&self, topic_path: &str, cutoff: &str) -> Result<CleanupReport, BusError> {
        let directory = self.remote_directory(topic_path);
        let mut session = self.open(&self.endpoint, self.credentials.as_ref()).await?;

        let names = match session.list(&directory).await {
            Ok(names) => names,
            Err(RepositoryError::NotFound(_)) => {
                self.close(session).await;
                return Ok(CleanupReport::default());
            }
            Err(e) => {
                self.close(session).await;
                return Err(BusError::Retrieval {
                    location: directory,
                    reason: e.to_string(),
                });
            }
        };

        let mut report = CleanupReport::default();
        for name in select_expired(&names, cutoff) {
            let path = format!("{}/{}", directory, name);
            match session.delete(&path).await {
                Ok(()) => report.deleted.push(path),
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to delete blob");
                    report.failed.push((path, e));
                }
            }
        }
        self.close(session).await;

        info!(
            directory = %directory,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Repository cleanup finished"
        );
        Ok(report)
    }
}
