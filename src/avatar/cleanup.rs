//! Cache eviction: scheduled scans plus operator-invoked bulk and targeted
//! cleanup.
//!
//! The scheduled scan and the manual clear-all intentionally use different
//! staleness windows and predicates; both policies are kept distinct.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use super::entry::AvatarMetadata;
use super::store::AvatarCacheStore;
use crate::config::CacheConfig;
use crate::errors::CacheError;

/// Staleness window for the operator-invoked clear-all. More aggressive than
/// the scheduled policy and independent of use count.
pub const MANUAL_CLEAR_AGE: Duration = Duration::from_secs(3 * 86_400);

/// Result of one cleanup scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub scanned: usize,
    pub entries_removed: usize,
    pub files_removed: usize,
}

/// Eviction policies over an [`AvatarCacheStore`].
#[derive(Debug, Clone)]
pub struct CacheCleaner {
    store: AvatarCacheStore,
    cache_config: CacheConfig,
}

impl CacheCleaner {
    pub fn new(store: AvatarCacheStore, cache_config: CacheConfig) -> Self {
        Self {
            store,
            cache_config,
        }
    }

    /// Timer-driven scan: remove entries that are both rarely used and stale.
    /// Entries with no metadata sidecar are conservatively kept; staleness
    /// cannot be proven for them.
    pub async fn scheduled_cleanup(&self) -> Result<CleanupStats, CacheError> {
        let threshold = self.cache_config.cleanup_use_threshold;
        let expire_age = self.cache_config.cleanup_expire_age();
        let now = Utc::now();

        let outcome = self
            .store
            .remove_all(|_, metadata: Option<&AvatarMetadata>| match metadata {
                Some(meta) => meta.use_count < threshold && meta.age(now) > expire_age,
                None => false,
            })
            .await?;

        let stats = CleanupStats {
            scanned: outcome.scanned,
            entries_removed: outcome.entries_removed,
            files_removed: outcome.files_removed,
        };
        info!(
            "avatar cache cleanup completed: scanned={} removed={} files={}",
            stats.scanned, stats.entries_removed, stats.files_removed
        );
        Ok(stats)
    }

    /// Operator-invoked bulk cleanup: sweep every leftover staging file
    /// unconditionally, then remove entries not refreshed within the fixed
    /// 3-day window regardless of use count. Returns total files removed.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let mut files_removed = self.store.sweep_staging().await?;
        let now = Utc::now();

        let outcome = self
            .store
            .remove_all(|_, metadata: Option<&AvatarMetadata>| match metadata {
                Some(meta) => meta.age(now) > MANUAL_CLEAR_AGE,
                None => false,
            })
            .await?;
        files_removed += outcome.files_removed;

        info!(
            "avatar cache clear-all completed: scanned={} files_removed={}",
            outcome.scanned, files_removed
        );
        Ok(files_removed)
    }

    /// Operator-invoked targeted cleanup: remove one identity regardless of
    /// staleness. Returns the number of files removed.
    pub async fn clear_one(&self, identity: &str) -> Result<usize, CacheError> {
        let removed = self.store.remove(identity).await?;
        info!(identity, removed, "avatar cache targeted clear completed");
        Ok(removed)
    }

    /// Spawn the background cleanup task, ticking every configured interval.
    pub fn spawn_scheduled_task(&self) -> tokio::task::JoinHandle<()> {
        let cleaner = self.clone();
        let interval = self.cache_config.cleanup_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh start does
            // not race a still-populating cache.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = cleaner.scheduled_cleanup().await {
                    error!("scheduled avatar cleanup failed: {e}");
                }
            }
        })
    }
}
