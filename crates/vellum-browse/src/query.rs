//! Listing and tree queries

use serde::{Deserialize, Serialize};

use crate::error::{BrowseError, Result};

/// Which entry kinds a listing returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryTypeFilter {
    File,
    Directory,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Modified,
    Created,
    Size,
    /// File extension
    Type,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

pub const MAX_LIST_DEPTH: usize = 10;
pub const MAX_PER_PAGE: usize = 100;
pub const MAX_TREE_DEPTH: usize = 5;

/// Flat listing query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileListQuery {
    pub path: String,
    pub recursive: bool,
    /// Levels to descend when `recursive` is set (1 to 10)
    pub depth: usize,
    #[serde(rename = "type")]
    pub entry_type: EntryTypeFilter,
    /// File extensions to keep; leading dot optional, case-insensitive
    pub extensions: Vec<String>,
    /// Globs matched against entry names and repository-relative paths
    pub exclude_patterns: Vec<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: usize,
    pub per_page: usize,
    pub include_metadata: bool,
    pub include_permissions: bool,
}

impl Default for FileListQuery {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            recursive: false,
            depth: 1,
            entry_type: EntryTypeFilter::All,
            extensions: Vec::new(),
            exclude_patterns: Vec::new(),
            sort_by: SortBy::Name,
            sort_order: SortOrder::Asc,
            page: 1,
            per_page: 20,
            include_metadata: false,
            include_permissions: false,
        }
    }
}

impl FileListQuery {
    /// Listing of `path` with default options
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Check every parameter before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LIST_DEPTH).contains(&self.depth) {
            return Err(BrowseError::invalid(
                "depth",
                format!("must be between 1 and {}", MAX_LIST_DEPTH),
            ));
        }
        if self.page == 0 {
            return Err(BrowseError::invalid("page", "must be at least 1"));
        }
        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(BrowseError::invalid(
                "per_page",
                format!("must be between 1 and {}", MAX_PER_PAGE),
            ));
        }
        validate_path(&self.path)?;
        validate_extensions("extensions", &self.extensions)?;
        for pattern in &self.exclude_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                BrowseError::invalid("exclude_patterns", format!("'{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Levels the listing descends into
    pub fn effective_depth(&self) -> usize {
        if self.recursive {
            self.depth
        } else {
            1
        }
    }
}

/// Tree view query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeQuery {
    pub path: String,
    /// Deepest level that may be expanded, exclusive (1 to 5)
    pub max_depth: usize,
    /// Expand only the shallow levels and `expand_paths`
    pub lazy_load: bool,
    pub expand_paths: Vec<String>,
    pub include_files: bool,
    pub file_extensions: Vec<String>,
    pub exclude_hidden: bool,
    pub include_counts: bool,
    pub include_permissions: bool,
}

impl Default for TreeQuery {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_depth: 3,
            lazy_load: true,
            expand_paths: Vec::new(),
            include_files: true,
            file_extensions: Vec::new(),
            exclude_hidden: true,
            include_counts: true,
            include_permissions: false,
        }
    }
}

impl TreeQuery {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TREE_DEPTH).contains(&self.max_depth) {
            return Err(BrowseError::invalid(
                "max_depth",
                format!("must be between 1 and {}", MAX_TREE_DEPTH),
            ));
        }
        validate_path(&self.path)?;
        for path in &self.expand_paths {
            validate_path(path).map_err(|_| {
                BrowseError::invalid("expand_paths", "paths must not contain NUL bytes")
            })?;
        }
        validate_extensions("file_extensions", &self.file_extensions)
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.contains('\0') {
        return Err(BrowseError::invalid("path", "must not contain NUL bytes"));
    }
    Ok(())
}

fn validate_extensions(field: &str, extensions: &[String]) -> Result<()> {
    if extensions
        .iter()
        .any(|ext| ext.trim_start_matches('.').is_empty())
    {
        return Err(BrowseError::invalid(field, "extensions must not be empty"));
    }
    Ok(())
}

/// Lower-case extensions with any leading dot removed
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect()
}
