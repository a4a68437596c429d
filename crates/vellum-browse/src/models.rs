//! Data models for repository browsing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vellum_permissions::ResolvedPermission;

use crate::fs::FsMetadata;

/// Kind of a repository entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
}

impl EntryType {
    /// Prefix of entry ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Directory => "dir",
        }
    }
}

/// Stable id of an entry: type prefix plus a digest of its path
///
/// The same path always yields the same id, so clients can diff trees
/// across requests.
pub fn entry_id(entry_type: EntryType, repository_path: &str) -> String {
    let digest = hex::encode(Sha256::digest(repository_path.as_bytes()));
    format!("{}_{}", entry_type.id_prefix(), &digest[..16])
}

/// Optional per-entry details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Lower-cased extension without the dot
    pub extension: Option<String>,
    /// MIME type guessed from the extension
    pub mime_type: Option<String>,
    pub readonly: bool,
    /// Levels below the queried directory, starting at 1
    pub depth: usize,
}

/// A file or directory visible to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub name: String,
    /// Repository-absolute, `/`-rooted path
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Size in bytes, files only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    /// Visible children, directories only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ResolvedPermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl Entry {
    /// Build an entry from filesystem metadata
    ///
    /// `repository_path` must already be in `/`-rooted form.
    pub fn new(name: impl Into<String>, repository_path: String, meta: &FsMetadata) -> Self {
        let entry_type = if meta.is_dir {
            EntryType::Directory
        } else {
            EntryType::File
        };

        Self {
            id: entry_id(entry_type, &repository_path),
            name: name.into(),
            path: repository_path,
            entry_type,
            size: (!meta.is_dir).then_some(meta.len),
            created: meta.created.map(DateTime::<Utc>::from),
            modified: meta.modified.map(DateTime::<Utc>::from),
            accessed: meta.accessed.map(DateTime::<Utc>::from),
            child_count: None,
            permissions: None,
            metadata: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// Lower-cased extension of a file name
    pub fn extension(&self) -> Option<String> {
        if self.is_dir() {
            return None;
        }
        file_extension(&self.name)
    }

    /// Attach extension, MIME type, read-only flag and depth
    pub fn with_metadata(mut self, meta: &FsMetadata, depth: usize) -> Self {
        let extension = self.extension();
        let mime_type = if self.is_dir() {
            None
        } else {
            mime_guess::from_path(&self.name)
                .first()
                .map(|mime| mime.essence_str().to_string())
        };
        self.metadata = Some(EntryMetadata {
            extension,
            mime_type,
            readonly: meta.readonly,
            depth,
        });
        self
    }
}

/// Lower-cased extension of a file name, without the dot
pub fn file_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// A directory tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub entry: Entry,
    /// Directories first, then by name; empty unless expanded
    pub children: Vec<TreeNode>,
    /// Distance from the tree root, which is level 0
    pub level: usize,
    pub is_expanded: bool,
    pub is_leaf: bool,
    pub has_children: bool,
}

/// Counters accumulated while building a tree
///
/// Every recursive step returns its own delta; the caller merges them, so
/// siblings built concurrently never share mutable state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeDelta {
    pub nodes: usize,
    pub files: usize,
    pub directories: usize,
    pub max_depth: usize,
}

impl TreeDelta {
    /// Delta of a single node at `level`
    pub fn node(is_dir: bool, level: usize) -> Self {
        Self {
            nodes: 1,
            files: usize::from(!is_dir),
            directories: usize::from(is_dir),
            max_depth: level,
        }
    }

    pub fn merge(self, other: TreeDelta) -> Self {
        Self {
            nodes: self.nodes + other.nodes,
            files: self.files + other.files,
            directories: self.directories + other.directories,
            max_depth: self.max_depth.max(other.max_depth),
        }
    }
}

/// Totals over a returned tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub total_files: usize,
    pub total_directories: usize,
    /// Deepest level present in the returned tree
    pub max_depth_reached: usize,
}

impl From<TreeDelta> for TreeStats {
    fn from(delta: TreeDelta) -> Self {
        Self {
            total_nodes: delta.nodes,
            total_files: delta.files,
            total_directories: delta.directories,
            max_depth_reached: delta.max_depth,
        }
    }
}

/// Response of a tree request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTreeResponse {
    pub root: TreeNode,
    pub stats: TreeStats,
}

/// Aggregates over the whole filtered listing, before pagination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    pub file_count: usize,
    pub directory_count: usize,
    /// Sum of file sizes in bytes
    pub total_size: u64,
}

impl ListingStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut stats, entry| {
            if entry.is_dir() {
                stats.directory_count += 1;
            } else {
                stats.file_count += 1;
                stats.total_size += entry.size.unwrap_or(0);
            }
            stats
        })
    }
}

/// One page of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    pub entries: Vec<Entry>,
    /// Entries across all pages
    pub total_count: usize,
    pub total_pages: usize,
    pub page: usize,
    pub per_page: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub stats: ListingStats,
    /// One level up, `None` at the repository root
    pub parent_path: Option<String>,
    /// The caller's permissions on the listed directory
    pub permissions: ResolvedPermission,
}
