//! Directory service
//!
//! Entry point for role-filtered listings, tree views and single-entry
//! lookups. Every read goes through the cache first; a hit returns before
//! any filesystem access.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use vellum_cache::{CacheConfig, CacheKey, CacheStats, CacheStore, TtlCategory};
use vellum_config::{AppConfig, ConfigManager, RepositoryConfig, MAX_CONCURRENT_IO};
use vellum_permissions::{path as repo_path, PermissionEngine, ResolvedPermission, Role};

use crate::error::{BrowseError, Result};
use crate::fs::{FileSystem, FsMetadata, LocalFileSystem};
use crate::listing::{collect_entries, paginate, ListingFilter};
use crate::models::{DirectoryTreeResponse, Entry, FileListResponse};
use crate::query::{FileListQuery, TreeQuery};
use crate::traversal::TraversalContext;
use crate::tree::{build_node, TreeOptions};

const FILES_RESOURCE: &str = "files";
const TREE_RESOURCE: &str = "tree";
const ENTRY_RESOURCE: &str = "entry";
const PERMISSION_RESOURCE: &str = "permissions";

/// Role-filtered access to a content repository
pub struct DirectoryService {
    fs: Arc<dyn FileSystem>,
    permissions: Arc<PermissionEngine>,
    cache: Arc<CacheStore>,
    reserved_names: Arc<[String]>,
    fs_timeout: Duration,
    max_concurrent_io: usize,
}

impl DirectoryService {
    pub fn builder() -> DirectoryServiceBuilder {
        DirectoryServiceBuilder::new()
    }

    /// Wire a service from application configuration
    ///
    /// Loads the permission rules (inline, then the rules file), compiles
    /// them and creates the cache. Does not start the cache sweeper; see
    /// [`DirectoryService::start_cache_sweeper`].
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let rules = ConfigManager::load_permissions(config)?;
        let engine = PermissionEngine::new(rules)?;
        let cache = CacheStore::new(config.cache.clone())?;

        Self::builder()
            .repository(&config.repository)
            .permissions(Arc::new(engine))
            .cache(Arc::new(cache))
            .build()
    }

    pub fn permissions(&self) -> &Arc<PermissionEngine> {
        &self.permissions
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Start the background TTL sweep of the cache
    pub fn start_cache_sweeper(&self) -> JoinHandle<()> {
        self.cache.spawn_sweeper()
    }

    /// One page of a directory listing
    ///
    /// # Errors
    /// - `InvalidParameter` for a bad query or a path that is not a directory
    /// - `NotFound` when the path does not exist
    /// - `PermissionDenied` when the role cannot read the path itself
    ///
    /// Children the role cannot read are omitted, never reported.
    #[instrument(skip(self, query), fields(path = %query.path, role = %role))]
    pub async fn get_files(&self, query: &FileListQuery, role: Role) -> Result<FileListResponse> {
        query.validate()?;
        let normalized = repo_path::normalize_path(&query.path);

        let key = cache_key(FILES_RESOURCE, &normalized, &query_params(query), role);
        if let Some(cached) = self.cached::<FileListResponse>(key.as_ref()).await {
            return Ok(cached);
        }

        let ctx = self.context(role);
        self.require_directory(&ctx, &normalized).await?;

        let filter = ListingFilter::from_query(query);
        let entries = collect_entries(&ctx, &filter, query, normalized.clone(), 1).await;
        let parent = repo_path::parent_path(&normalized).map(|p| repo_path::to_repository_path(&p));
        let permissions = self.permissions.resolve(role, &normalized);
        let response = paginate(entries, query, parent, permissions);

        debug!(
            total = response.total_count,
            returned = response.entries.len(),
            "listing built"
        );
        self.store(key.as_ref(), &response, TtlCategory::Listing).await;
        Ok(response)
    }

    /// Directory tree rooted at the query path
    ///
    /// Same errors as [`DirectoryService::get_files`].
    #[instrument(skip(self, query), fields(path = %query.path, role = %role))]
    pub async fn get_directory_tree(
        &self,
        query: &TreeQuery,
        role: Role,
    ) -> Result<DirectoryTreeResponse> {
        query.validate()?;
        let normalized = repo_path::normalize_path(&query.path);

        let key = cache_key(TREE_RESOURCE, &normalized, &query_params(query), role);
        if let Some(cached) = self.cached::<DirectoryTreeResponse>(key.as_ref()).await {
            return Ok(cached);
        }

        let ctx = self.context(role).with_skip_hidden(query.exclude_hidden);
        let meta = self.require_directory(&ctx, &normalized).await?;

        let options = TreeOptions::from_query(query);
        let name = root_name(&normalized);
        let (root, delta) = build_node(&ctx, &options, name, normalized, meta, 0).await;
        let response = DirectoryTreeResponse {
            root,
            stats: delta.into(),
        };

        debug!(
            nodes = response.stats.total_nodes,
            depth = response.stats.max_depth_reached,
            "tree built"
        );
        self.store(key.as_ref(), &response, TtlCategory::Tree).await;
        Ok(response)
    }

    /// A single file or directory with metadata and permissions
    #[instrument(skip(self), fields(role = %role))]
    pub async fn get_entry(&self, path: &str, role: Role) -> Result<Entry> {
        let normalized = repo_path::normalize_path(path);

        let key = cache_key(ENTRY_RESOURCE, &normalized, &(), role);
        if let Some(cached) = self.cached::<Entry>(key.as_ref()).await {
            return Ok(cached);
        }

        let ctx = self.context(role);
        let meta = self.stat_requested(&ctx, &normalized).await?;
        if !ctx.can_read(&normalized) {
            return Err(denied(&normalized));
        }

        let mut entry = Entry::new(
            root_name(&normalized),
            repo_path::to_repository_path(&normalized),
            &meta,
        )
        .with_metadata(&meta, 0);
        if meta.is_dir {
            entry.child_count = Some(ctx.visible_names(&normalized).await.len());
        }
        entry.permissions = Some(self.permissions.resolve(role, &normalized));

        self.store(key.as_ref(), &entry, TtlCategory::Entry).await;
        Ok(entry)
    }

    /// The role's permissions on a path, whether or not it exists
    pub async fn get_permissions(&self, path: &str, role: Role) -> ResolvedPermission {
        let normalized = repo_path::normalize_path(path);

        let key = cache_key(PERMISSION_RESOURCE, &normalized, &(), role);
        if let Some(cached) = self.cached::<ResolvedPermission>(key.as_ref()).await {
            return cached;
        }

        let resolved = self.permissions.resolve(role, &normalized);
        self.store(key.as_ref(), &resolved, TtlCategory::Permission).await;
        resolved
    }

    /// Drop cached results for a changed path, its ancestors and descendants
    ///
    /// Meant for the content-sync process after it updates the repository.
    #[instrument(skip(self))]
    pub async fn invalidate_path(&self, path: &str) -> Result<usize> {
        let removed = self.cache.invalidate_path(path).await?;
        info!(removed, "cache invalidated for path");
        Ok(removed)
    }

    /// Drop every cached result computed for a role
    #[instrument(skip(self))]
    pub async fn invalidate_role(&self, role: Role) -> Result<usize> {
        let removed = self.cache.invalidate_role(role).await?;
        info!(removed, "cache invalidated for role");
        Ok(removed)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn context(&self, role: Role) -> TraversalContext {
        TraversalContext::new(
            self.fs.clone(),
            self.permissions.clone(),
            role,
            self.max_concurrent_io,
            self.fs_timeout,
            self.reserved_names.clone(),
        )
    }

    async fn stat_requested(&self, ctx: &TraversalContext, normalized: &str) -> Result<FsMetadata> {
        ctx.stat(normalized).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                BrowseError::NotFound(repo_path::to_repository_path(normalized))
            }
            _ => BrowseError::Internal(format!(
                "cannot read {}: {}",
                repo_path::to_repository_path(normalized),
                e
            )),
        })
    }

    async fn require_directory(&self, ctx: &TraversalContext, normalized: &str) -> Result<FsMetadata> {
        let meta = self.stat_requested(ctx, normalized).await?;
        if !meta.is_dir {
            return Err(BrowseError::invalid("path", "is not a directory"));
        }
        if !ctx.can_read(normalized) {
            return Err(denied(normalized));
        }
        Ok(meta)
    }

    async fn cached<T: DeserializeOwned>(&self, key: Option<&CacheKey>) -> Option<T> {
        let key = key?;
        match self.cache.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, recomputing");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: Option<&CacheKey>, value: &T, category: TtlCategory) {
        let Some(key) = key else {
            return;
        };
        if let Err(e) = self.cache.set(key.as_str(), value, category).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

/// Query parameters that shape a response, minus the path
fn query_params<Q: Serialize>(query: &Q) -> serde_json::Value {
    let mut params = serde_json::to_value(query).unwrap_or(serde_json::Value::Null);
    if let Some(object) = params.as_object_mut() {
        object.remove("path");
    }
    params
}

/// Key derivation failures only disable caching for the request
fn cache_key<P: Serialize + ?Sized>(
    resource: &str,
    normalized: &str,
    params: &P,
    role: Role,
) -> Option<CacheKey> {
    match CacheKey::derive(resource, normalized, params, role) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(resource, error = %e, "cache key derivation failed, bypassing cache");
            None
        }
    }
}

fn root_name(normalized: &str) -> String {
    match normalized.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None if normalized.is_empty() => "/".to_string(),
        None => normalized.to_string(),
    }
}

fn denied(normalized: &str) -> BrowseError {
    BrowseError::PermissionDenied(repo_path::to_repository_path(normalized))
}

/// Builder for [`DirectoryService`]
pub struct DirectoryServiceBuilder {
    fs: Option<Arc<dyn FileSystem>>,
    permissions: Option<Arc<PermissionEngine>>,
    cache: Option<Arc<CacheStore>>,
    reserved_names: Vec<String>,
    fs_timeout: Duration,
    max_concurrent_io: usize,
}

impl DirectoryServiceBuilder {
    pub fn new() -> Self {
        let defaults = RepositoryConfig::default();
        Self {
            fs: None,
            permissions: None,
            cache: None,
            reserved_names: defaults.reserved_names.clone(),
            fs_timeout: defaults.fs_timeout(),
            max_concurrent_io: defaults.max_concurrent_io,
        }
    }

    /// Serve a directory on local disk
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.fs = Some(Arc::new(LocalFileSystem::new(root)));
        self
    }

    /// Serve any [`FileSystem`]
    pub fn filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Apply root, reserved names and I/O limits from configuration
    pub fn repository(self, config: &RepositoryConfig) -> Self {
        self.root(config.root.clone())
            .reserved_names(config.reserved_names.iter().cloned())
            .fs_timeout(config.fs_timeout())
            .max_concurrent_io(config.max_concurrent_io)
    }

    pub fn permissions(mut self, engine: Arc<PermissionEngine>) -> Self {
        self.permissions = Some(engine);
        self
    }

    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn reserved_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.reserved_names = names.into_iter().collect();
        self
    }

    pub fn fs_timeout(mut self, timeout: Duration) -> Self {
        self.fs_timeout = timeout;
        self
    }

    pub fn max_concurrent_io(mut self, limit: usize) -> Self {
        self.max_concurrent_io = limit;
        self
    }

    /// Build the service
    ///
    /// Without explicit rules every path is readable and nothing is
    /// writable; without an explicit cache a default one is created.
    pub fn build(self) -> Result<DirectoryService> {
        let fs = self
            .fs
            .ok_or_else(|| BrowseError::invalid("root", "a repository root or filesystem is required"))?;
        if !(1..=MAX_CONCURRENT_IO).contains(&self.max_concurrent_io) {
            return Err(BrowseError::invalid(
                "max_concurrent_io",
                format!("must be between 1 and {}", MAX_CONCURRENT_IO),
            ));
        }
        if self.fs_timeout.is_zero() {
            return Err(BrowseError::invalid("fs_timeout", "must be greater than 0"));
        }

        let permissions = self
            .permissions
            .unwrap_or_else(|| Arc::new(PermissionEngine::empty()));
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(CacheStore::new(CacheConfig::default())?),
        };

        info!(
            rules = permissions.len(),
            reserved = ?self.reserved_names,
            max_concurrent_io = self.max_concurrent_io,
            "directory service ready"
        );

        Ok(DirectoryService {
            fs,
            permissions,
            cache,
            reserved_names: Arc::from(self.reserved_names),
            fs_timeout: self.fs_timeout,
            max_concurrent_io: self.max_concurrent_io,
        })
    }
}

impl Default for DirectoryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
