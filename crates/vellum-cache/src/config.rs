//! Cache configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Longest TTL an entry can carry (one year)
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Longest background sweep period (one day)
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Lifetime class of a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlCategory {
    /// Paginated flat listings
    Listing,
    /// Directory tree views
    Tree,
    /// Permission summaries
    Permission,
    /// Single-entry lookups
    Entry,
}

/// Per-category time-to-live, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub listing_secs: u64,
    pub tree_secs: u64,
    pub permission_secs: u64,
    pub entry_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            listing_secs: 300,
            tree_secs: 600,
            permission_secs: 900,
            entry_secs: 300,
        }
    }
}

impl TtlConfig {
    /// TTL for a category
    pub fn for_category(&self, category: TtlCategory) -> Duration {
        let secs = match category {
            TtlCategory::Listing => self.listing_secs,
            TtlCategory::Tree => self.tree_secs,
            TtlCategory::Permission => self.permission_secs,
            TtlCategory::Entry => self.entry_secs,
        };
        Duration::from_secs(secs)
    }

    /// The longest of the category TTLs
    pub fn longest(&self) -> Duration {
        let secs = self
            .listing_secs
            .max(self.tree_secs)
            .max(self.permission_secs)
            .max(self.entry_secs);
        Duration::from_secs(secs.min(MAX_TTL_SECS))
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries kept in memory
    pub max_entries: usize,
    /// Share of `max_entries` evicted, oldest first, when the map overflows
    pub eviction_fraction: f64,
    /// How often the background sweep drops expired entries
    pub sweep_interval_secs: u64,
    /// Per-category TTLs
    pub ttl: TtlConfig,
    /// Directory of the optional durable tier
    pub disk_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            eviction_fraction: 0.1,
            sweep_interval_secs: 60,
            ttl: TtlConfig::default(),
            disk_path: None,
        }
    }
}

impl CacheConfig {
    /// Background sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Number of entries dropped by one overflow eviction (at least one)
    pub fn eviction_batch(&self) -> usize {
        ((self.max_entries as f64 * self.eviction_fraction).ceil() as usize).max(1)
    }

    /// Reject configurations the store cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "eviction_fraction must be in (0, 1], got {}",
                self.eviction_fraction
            )));
        }
        if !(1..=MAX_SWEEP_INTERVAL_SECS).contains(&self.sweep_interval_secs) {
            return Err(CacheError::InvalidConfig(format!(
                "sweep_interval_secs must be between 1 and {}",
                MAX_SWEEP_INTERVAL_SECS
            )));
        }
        let ttl = &self.ttl;
        for (name, secs) in [
            ("listing_secs", ttl.listing_secs),
            ("tree_secs", ttl.tree_secs),
            ("permission_secs", ttl.permission_secs),
            ("entry_secs", ttl.entry_secs),
        ] {
            if !(1..=MAX_TTL_SECS).contains(&secs) {
                return Err(CacheError::InvalidConfig(format!(
                    "ttl.{} must be between 1 and {}, got {}",
                    name, MAX_TTL_SECS, secs
                )));
            }
        }
        Ok(())
    }
}
