//! Role-filtered browsing of a content repository
//!
//! [`DirectoryService`] produces paginated listings and lazily expandable
//! tree views. Every candidate entry is checked against the
//! [`PermissionEngine`](vellum_permissions::PermissionEngine); entries the
//! caller cannot read are left out entirely. Responses are cached per role
//! in a [`CacheStore`](vellum_cache::CacheStore).
//!
//! ```ignore
//! use vellum_browse::{DirectoryService, FileListQuery};
//! use vellum_permissions::Role;
//!
//! let service = DirectoryService::builder().root("content").build()?;
//! let page = service.get_files(&FileListQuery::for_path("/guides"), Role::Guest).await?;
//! ```

pub mod error;
pub mod fs;
pub mod listing;
pub mod models;
pub mod query;
pub mod service;
pub mod traversal;
pub mod tree;

pub use error::{BrowseError, ErrorKind, Result};
pub use fs::{FileSystem, FsMetadata, LocalFileSystem};
pub use models::{
    entry_id, DirectoryTreeResponse, Entry, EntryMetadata, EntryType, FileListResponse,
    ListingStats, TreeDelta, TreeNode, TreeStats,
};
pub use query::{EntryTypeFilter, FileListQuery, SortBy, SortOrder, TreeQuery};
pub use service::{DirectoryService, DirectoryServiceBuilder};
pub use tree::AUTO_EXPAND_LEVEL;
