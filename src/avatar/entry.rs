//! Per-identity avatar metadata.
//!
//! Stored as a `.json` sidecar next to the cached image, replacing the legacy
//! `.count`/`.update`/`.mark` file triplet with a single record so a partially
//! written aux set can never disagree with itself.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored in `{identity}.json` next to the cached avatar image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMetadata {
    /// Times this avatar was reused from cache while fresh
    pub use_count: u64,
    /// Timestamp of the most recent successful download
    pub last_updated: DateTime<Utc>,
}

impl AvatarMetadata {
    /// Fresh record for a newly downloaded avatar.
    pub fn new() -> Self {
        Self {
            use_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Refresh after a successful re-download. The use count survives the
    /// refresh; only the timestamp moves.
    pub fn refreshed(&self) -> Self {
        Self {
            use_count: self.use_count,
            last_updated: Utc::now(),
        }
    }

    /// Record one cache reuse.
    pub fn touched(&self) -> Self {
        Self {
            use_count: self.use_count.saturating_add(1),
            last_updated: self.last_updated,
        }
    }

    /// Age of the entry relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is still within its freshness window.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) <= ttl
    }
}

impl Default for AvatarMetadata {
    fn default() -> Self {
        Self::new()
    }
}
