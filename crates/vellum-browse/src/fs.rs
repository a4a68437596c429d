//! Filesystem access
//!
//! The browsing core only needs two primitives, `stat` and `read_dir`, both
//! addressed by normalized repository paths (`""` is the root). Local disk is
//! the default backend; a virtual or network filesystem can stand in behind
//! the same trait.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;

/// What the core needs to know about a filesystem object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub len: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub readonly: bool,
}

impl FsMetadata {
    pub fn file(len: u64) -> Self {
        Self {
            is_dir: false,
            len,
            created: None,
            modified: None,
            accessed: None,
            readonly: false,
        }
    }

    pub fn dir() -> Self {
        Self {
            is_dir: true,
            ..Self::file(0)
        }
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

impl From<std::fs::Metadata> for FsMetadata {
    fn from(meta: std::fs::Metadata) -> Self {
        Self {
            is_dir: meta.is_dir(),
            len: meta.len(),
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            accessed: meta.accessed().ok(),
            readonly: meta.permissions().readonly(),
        }
    }
}

/// Filesystem access primitive
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Metadata of the object at a repository path, following symlinks
    async fn stat(&self, path: &str) -> io::Result<FsMetadata>;

    /// Names of the entries of a directory, in no particular order
    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>>;
}

/// [`FileSystem`] over a directory on local disk
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalized repository path onto disk
    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, path: &str) -> io::Result<FsMetadata> {
        Ok(fs::metadata(self.resolve(path)).await?.into())
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let mut dir = fs::read_dir(self.resolve(path)).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            // Names that are not valid UTF-8 cannot be addressed by a
            // repository path.
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }
}
