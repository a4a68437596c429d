//! Permission rules for Vellum
//!
//! Decides per-path, per-role access to repository content. Rules are path
//! patterns with `*` wildcards; when several rules match a path the most
//! specific one governs it, and paths matched by no rule are readable by
//! everyone but never mutable.

pub mod error;
pub mod path;
pub mod pattern;
pub mod permission;

pub use error::{PermissionError, Result};
pub use path::{normalize_path, parent_path, to_repository_path};
pub use pattern::{CompiledPattern, WILDCARD_PENALTY};
pub use permission::{
    Action, ActionFlags, PermissionConfig, PermissionEngine, PermissionRule, ResolvedPermission,
    Role,
};
