//! Error types for repository browsing

use thiserror::Error;

/// Coarse classification callers map onto transport status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    InvalidParameter,
    Internal,
}

/// Errors that can occur while browsing the repository
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The requested path does not exist
    #[error("Path not found: {0}")]
    NotFound(String),

    /// The caller may not read the requested path itself
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A query parameter failed validation; nothing was read
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },

    /// Unexpected I/O failure on the requested path
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] vellum_config::ConfigError),

    #[error("Permission rules error: {0}")]
    Permissions(#[from] vellum_permissions::PermissionError),

    #[error("Cache error: {0}")]
    Cache(#[from] vellum_cache::CacheError),
}

impl BrowseError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BrowseError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowseError::NotFound(_) => ErrorKind::NotFound,
            BrowseError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            BrowseError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            BrowseError::Internal(_)
            | BrowseError::Config(_)
            | BrowseError::Permissions(_)
            | BrowseError::Cache(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for browsing operations
pub type Result<T> = std::result::Result<T, BrowseError>;
