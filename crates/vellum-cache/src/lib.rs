//! # Vellum Cache
//!
//! Memoizes expensive repository reads keyed by resource, path, query
//! parameters and role.
//!
//! ## Features
//!
//! - **Role isolation**: the role is a discrete key segment, so a response
//!   cached for one role is never served to another
//! - **Path invalidation**: dropping a path also drops its ancestors and
//!   descendants, since parent listings aggregate their children
//! - **Bounded memory**: insertion-order eviction plus a background TTL sweep
//! - **Pluggable durable tier**: any [`CacheStorage`] can sit behind the
//!   in-process map without callers noticing

pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod storage;
pub mod store;

pub use config::{CacheConfig, TtlCategory, TtlConfig, MAX_SWEEP_INTERVAL_SECS, MAX_TTL_SECS};
pub use error::{CacheError, Result};
pub use key::{wildcard_match, CacheKey};
pub use metrics::{CacheMetrics, CacheStats};
pub use storage::{CacheEntry, CacheStorage, DiskStorage, MemoryStorage};
pub use store::{CacheStore, CacheStoreBuilder};
