//! Per-request traversal context

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;
use vellum_permissions::{path as repo_path, PermissionEngine, Role};

use crate::fs::{FileSystem, FsMetadata};

/// A child that survived name and permission filtering
#[derive(Debug, Clone)]
pub struct Child {
    pub name: String,
    /// Normalized repository path
    pub path: String,
    pub meta: FsMetadata,
}

/// Shared state of one listing or tree request
///
/// Filesystem calls are bounded by a semaphore and each call carries its own
/// timeout. A call that times out is reported as `TimedOut`.
pub struct TraversalContext {
    fs: Arc<dyn FileSystem>,
    engine: Arc<PermissionEngine>,
    role: Role,
    io_permits: Semaphore,
    timeout: Duration,
    reserved_names: Arc<[String]>,
    skip_hidden: bool,
}

impl TraversalContext {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        engine: Arc<PermissionEngine>,
        role: Role,
        max_concurrent_io: usize,
        timeout: Duration,
        reserved_names: Arc<[String]>,
    ) -> Self {
        Self {
            fs,
            engine,
            role,
            io_permits: Semaphore::new(max_concurrent_io.clamp(1, Semaphore::MAX_PERMITS)),
            timeout,
            reserved_names,
            skip_hidden: true,
        }
    }

    /// Keep or drop names starting with `.`
    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn engine(&self) -> &PermissionEngine {
        &self.engine
    }

    pub async fn stat(&self, path: &str) -> io::Result<FsMetadata> {
        let _permit = self.permit().await?;
        match tokio::time::timeout(self.timeout, self.fs.stat(path)).await {
            Ok(result) => result,
            Err(_) => Err(timed_out("stat", path)),
        }
    }

    pub async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let _permit = self.permit().await?;
        match tokio::time::timeout(self.timeout, self.fs.read_dir(path)).await {
            Ok(result) => result,
            Err(_) => Err(timed_out("read_dir", path)),
        }
    }

    async fn permit(&self) -> io::Result<tokio::sync::SemaphorePermit<'_>> {
        self.io_permits
            .acquire()
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "I/O permits closed"))
    }

    /// Whether the caller can read a normalized path
    pub fn can_read(&self, path: &str) -> bool {
        self.engine.can_read(self.role, path)
    }

    /// Names the caller may see in a directory, without touching metadata
    ///
    /// Hidden names, reserved index markers and unreadable paths are dropped.
    /// An unreadable directory yields nothing.
    pub async fn visible_names(&self, dir: &str) -> Vec<(String, String)> {
        let names = match self.read_dir(dir).await {
            Ok(names) => names,
            Err(e) => {
                warn!(path = %repo_path::to_repository_path(dir), error = %e, "skipping unreadable directory");
                return Vec::new();
            }
        };

        names
            .into_iter()
            .filter(|name| !(self.skip_hidden && name.starts_with('.')))
            .filter(|name| !self.reserved_names.iter().any(|reserved| reserved == name))
            .map(|name| {
                let path = repo_path::join(dir, &name);
                (name, path)
            })
            .filter(|(_, path)| self.can_read(path))
            .collect()
    }

    /// Visible children of a directory with their metadata
    ///
    /// Children are stat-ed concurrently; any that cannot be stat-ed are
    /// skipped.
    pub async fn visible_children(&self, dir: &str) -> Vec<Child> {
        let names = self.visible_names(dir).await;
        let stats = join_all(names.into_iter().map(|(name, path)| async move {
            match self.stat(&path).await {
                Ok(meta) => Some(Child { name, path, meta }),
                Err(e) => {
                    warn!(path = %repo_path::to_repository_path(&path), error = %e, "skipping unreadable entry");
                    None
                }
            }
        }))
        .await;
        stats.into_iter().flatten().collect()
    }
}

fn timed_out(operation: &str, path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{} {} timed out", operation, repo_path::to_repository_path(path)),
    )
}
