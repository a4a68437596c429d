//! Permission rules and their evaluation

pub mod config;
pub mod engine;
pub mod models;

pub use config::PermissionConfig;
pub use engine::PermissionEngine;
pub use models::{Action, ActionFlags, PermissionRule, ResolvedPermission, Role};
