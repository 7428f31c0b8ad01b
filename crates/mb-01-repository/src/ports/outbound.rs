//! Outbound ports (Driven Ports)
//!
//! A repository is reached through a [`RepositoryTransport`] which opens a
//! [`RepositorySession`] per operation. Paths are `/`-separated and relative
//! to the server root.

use crate::error::RepositoryError;
use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Host and port of a blob store server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryEndpoint {
    /// Host name or address.
    pub server: String,
    /// TCP port.
    pub port: u16,
}

impl RepositoryEndpoint {
    /// Endpoint at `server:port`.
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }

    /// `server:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

impl fmt::Display for RepositoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.port)
    }
}

/// Login used for the agent's own repository. Peer downloads are anonymous.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub user: String,
    /// Password; redacted from `Debug` output.
    pub password: String,
}

impl Credentials {
    /// Login for `user`.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opens sessions against repository servers.
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Open a session on `endpoint`, logging in when `credentials` are given.
    /// Fails with `Connection` if the server cannot be reached or refuses the login.
    async fn connect(
        &self,
        endpoint: &RepositoryEndpoint,
        credentials: Option<&Credentials>,
    ) -> Result<Box<dyn RepositorySession>, RepositoryError>;
}

/// One connected session.
#[async_trait]
pub trait RepositorySession: Send {
    /// Create a single directory. Fails with `AlreadyExists` if present and
    /// `NotFound` if the parent is missing.
    async fn make_directory(&mut self, path: &str) -> Result<(), RepositoryError>;

    /// Store the whole of `source` under `path`, replacing any previous
    /// object. Returns the number of bytes written.
    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, RepositoryError>;

    /// Stream the object at `path` into `sink`. Returns the number of bytes
    /// read.
    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, RepositoryError>;

    /// Names of the files (not subdirectories) directly inside `path`.
    async fn list(&mut self, path: &str) -> Result<Vec<String>, RepositoryError>;

    /// Remove the object at `path`.
    async fn delete(&mut self, path: &str) -> Result<(), RepositoryError>;

    /// End the session.
    async fn close(&mut self) -> Result<(), RepositoryError>;
}
