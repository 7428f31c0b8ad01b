//! Address of an object stored in a repository.

use std::fmt;

/// Everything a receiver needs to fetch an uploaded object, including from
/// a peer agent's repository.
///
/// `file_path` is the remote path without extension; the extension is kept
/// apart so receivers can name their local copy after their own timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPointer {
    /// Host of the repository holding the object.
    pub server: String,
    /// Port of that repository.
    pub port: u16,
    /// Remote path without extension.
    pub file_path: String,
    /// Extension including the leading dot, e.g. `.json`.
    pub file_extension: String,
}

impl BlobPointer {
    /// Pointer to `file_path` + `file_extension` on `server:port`.
    pub fn new(
        server: impl Into<String>,
        port: u16,
        file_path: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            file_path: file_path.into(),
            file_extension: file_extension.into(),
        }
    }

    /// Full remote path of the object.
    pub fn remote_path(&self) -> String {
        format!("{}{}", self.file_path, self.file_extension)
    }

    /// Remote directory holding the object.
    pub fn directory(&self) -> &str {
        self.file_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

impl fmt::Display for BlobPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.server, self.port, self.remote_path())
    }
}
