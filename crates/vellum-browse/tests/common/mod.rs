//! Shared repository fixture for browse tests

#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use vellum_browse::{DirectoryService, FileSystem, FsMetadata, LocalFileSystem};
use vellum_permissions::{PermissionConfig, PermissionEngine, PermissionRule, Role};

/// Builds this layout:
///
/// ```text
/// _index.md
/// .hidden
/// README.md
/// notes.txt
/// admin/secret.md          (ADMIN only)
/// docs/intro.md
/// docs/guide/setup.md
/// docs/guide/deep/x.md
/// images/logo.png
/// ```
pub fn repository() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    for dir in ["admin", "docs/guide/deep", "images"] {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    for (file, content) in [
        ("_index.md", "index"),
        (".hidden", "h"),
        ("README.md", "# Readme\n"),
        ("notes.txt", "notes"),
        ("admin/secret.md", "secret"),
        ("docs/intro.md", "intro"),
        ("docs/guide/setup.md", "setup"),
        ("docs/guide/deep/x.md", "x"),
        ("images/logo.png", "png-bytes"),
    ] {
        std::fs::write(root.join(file), content).unwrap();
    }
    temp_dir
}

pub fn engine() -> Arc<PermissionEngine> {
    let mut config = PermissionConfig::new();
    config.add_rule(PermissionRule::new("/admin*", [Role::Admin]));
    Arc::new(PermissionEngine::new(config).unwrap())
}

pub fn service(root: &Path) -> DirectoryService {
    DirectoryService::builder()
        .root(root)
        .permissions(engine())
        .build()
        .unwrap()
}

/// Local filesystem where one directory cannot be listed
pub struct FlakyFs {
    pub inner: LocalFileSystem,
    pub broken_dir: &'static str,
    pub hang: bool,
}

#[async_trait]
impl FileSystem for FlakyFs {
    async fn stat(&self, path: &str) -> io::Result<FsMetadata> {
        self.inner.stat(path).await
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        if path == self.broken_dir {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.inner.read_dir(path).await
    }
}

pub fn flaky_service(root: &Path, broken_dir: &'static str, hang: bool) -> DirectoryService {
    DirectoryService::builder()
        .filesystem(Arc::new(FlakyFs {
            inner: LocalFileSystem::new(root),
            broken_dir,
            hang,
        }))
        .permissions(engine())
        .fs_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
}
