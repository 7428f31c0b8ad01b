//! In-memory repository transport with operation counters.
//!
//! One instance can serve any number of endpoints, so several agents in a
//! test can upload to their own repositories and download from each other.

use crate::error::RepositoryError;
use crate::ports::{Credentials, RepositoryEndpoint, RepositorySession, RepositoryTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Operation counts since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    /// Sessions opened.
    pub connections: u64,
    /// Directories created, not counting ones that already existed.
    pub directories_created: u64,
    /// Objects written.
    pub stores: u64,
    /// Objects read.
    pub retrieves: u64,
    /// Objects removed.
    pub deletes: u64,
    /// Total bytes written.
    pub bytes_stored: u64,
    /// Total bytes read.
    pub bytes_retrieved: u64,
}

#[derive(Debug, Default)]
struct EndpointStore {
    directories: BTreeSet<String>,
    objects: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    stores: Mutex<HashMap<String, EndpointStore>>,
    unreachable: Mutex<HashSet<String>>,
    undeletable: Mutex<HashSet<String>>,
    unlistable: Mutex<HashSet<String>>,
    connections: AtomicU64,
    directories_created: AtomicU64,
    stores_count: AtomicU64,
    retrieves: AtomicU64,
    deletes: AtomicU64,
    bytes_stored: AtomicU64,
    bytes_retrieved: AtomicU64,
}

/// Repository transport that keeps every object in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<Inner>,
}

impl InMemoryRepository {
    /// Empty repository reachable on every endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse connections to `endpoint` from now on.
    pub fn set_unreachable(&self, endpoint: &RepositoryEndpoint) {
        self.inner.unreachable.lock().insert(endpoint.address());
    }

    /// Make deletes of `path` fail with an I/O error on every endpoint.
    pub fn deny_delete(&self, path: &str) {
        self.inner.undeletable.lock().insert(normalize(path).to_string());
    }

    /// Make listings of directory `path` fail with an I/O error on every
    /// endpoint.
    pub fn deny_list(&self, path: &str) {
        self.inner.unlistable.lock().insert(normalize(path).to_string());
    }

    /// Stored bytes of `path` on `endpoint`, if any.
    pub fn object(&self, endpoint: &RepositoryEndpoint, path: &str) -> Option<Vec<u8>> {
        self.inner
            .stores
            .lock()
            .get(&endpoint.address())
            .and_then(|store| store.objects.get(normalize(path)).cloned())
    }

    /// Number of objects stored on `endpoint`.
    pub fn object_count(&self, endpoint: &RepositoryEndpoint) -> usize {
        self.inner
            .stores
            .lock()
            .get(&endpoint.address())
            .map(|store| store.objects.len())
            .unwrap_or(0)
    }

    /// Whether `path` was created as a directory on `endpoint`.
    pub fn has_directory(&self, endpoint: &RepositoryEndpoint, path: &str) -> bool {
        self.inner
            .stores
            .lock()
            .get(&endpoint.address())
            .map(|store| store.directories.contains(normalize(path)))
            .unwrap_or(false)
    }

    /// Counters across all endpoints.
    pub fn stats(&self) -> RepositoryStats {
        let inner = &self.inner;
        RepositoryStats {
            connections: inner.connections.load(Ordering::Relaxed),
            directories_created: inner.directories_created.load(Ordering::Relaxed),
            stores: inner.stores_count.load(Ordering::Relaxed),
            retrieves: inner.retrieves.load(Ordering::Relaxed),
            deletes: inner.deletes.load(Ordering::Relaxed),
            bytes_stored: inner.bytes_stored.load(Ordering::Relaxed),
            bytes_retrieved: inner.bytes_retrieved.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RepositoryTransport for InMemoryRepository {
    async fn connect(
        &self,
        endpoint: &RepositoryEndpoint,
        _credentials: Option<&Credentials>,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError> {
        let address = endpoint.address();
        if self.inner.unreachable.lock().contains(&address) {
            return Err(RepositoryError::Connection {
                endpoint: address,
                reason: "connection refused".to_string(),
            });
        }
        self.inner.connections.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(InMemorySession {
            inner: Arc::clone(&self.inner),
            address,
        }))
    }
}

struct InMemorySession {
    inner: Arc<Inner>,
    address: String,
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

impl EndpointStore {
    fn directory_exists(&self, path: &str) -> bool {
        path.is_empty() || self.directories.contains(path)
    }
}

impl InMemorySession {
    fn with_store<T>(&self, f: impl FnOnce(&mut EndpointStore) -> T) -> T {
        let mut stores = self.inner.stores.lock();
        f(stores.entry(self.address.clone()).or_default())
    }
}

#[async_trait]
impl RepositorySession for InMemorySession {
    async fn make_directory(&mut self, path: &str) -> Result<(), RepositoryError> {
        let path = normalize(path);
        self.with_store(|store| {
            if store.directory_exists(path) || store.objects.contains_key(path) {
                return Err(RepositoryError::AlreadyExists(path.to_string()));
            }
            if !store.directory_exists(parent(path)) {
                return Err(RepositoryError::NotFound(path.to_string()));
            }
            store.directories.insert(path.to_string());
            Ok(())
        })?;
        self.inner.directories_created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, RepositoryError> {
        let path = normalize(path);
        let parent_exists = self.with_store(|store| store.directory_exists(parent(path)));
        if !parent_exists {
            return Err(RepositoryError::NotFound(path.to_string()));
        }

        let mut bytes = Vec::new();
        source
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| RepositoryError::io(path, e))?;
        let written = bytes.len() as u64;

        self.with_store(|store| store.objects.insert(path.to_string(), bytes));
        self.inner.stores_count.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_stored.fetch_add(written, Ordering::Relaxed);
        Ok(written)
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RepositoryError> {
        let path = normalize(path);
        let bytes = self
            .with_store(|store| store.objects.get(path).cloned())
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))?;

        sink.write_all(&bytes)
            .await
            .map_err(|e| RepositoryError::io(path, e))?;
        sink.flush().await.map_err(|e| RepositoryError::io(path, e))?;

        let read = bytes.len() as u64;
        self.inner.retrieves.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_retrieved.fetch_add(read, Ordering::Relaxed);
        Ok(read)
    }

    async fn list(&mut self, path: &str) -> Result<Vec<String>, RepositoryError> {
        let path = normalize(path);
        if self.inner.unlistable.lock().contains(path) {
            return Err(RepositoryError::io(path, "permission denied"));
        }
        self.with_store(|store| {
            if !store.directory_exists(path) {
                return Err(RepositoryError::NotFound(path.to_string()));
            }
            Ok(store
                .objects
                .keys()
                .filter(|key| parent(key) == path)
                .map(|key| key.rsplit('/').next().unwrap_or(key.as_str()).to_string())
                .collect())
        })
    }

    async fn delete(&mut self, path: &str) -> Result<(), RepositoryError> {
        let path = normalize(path);
        if self.inner.undeletable.lock().contains(path) {
            return Err(RepositoryError::io(path, "permission denied"));
        }
        self.with_store(|store| store.objects.remove(path))
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))?;
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
