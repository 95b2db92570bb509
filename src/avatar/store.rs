//! Disk-backed avatar cache store.
//!
//! Maps an opaque user identity to a cached image file plus a JSON metadata
//! sidecar. The store exclusively owns its directory; no other component
//! writes avatar files directly.
//!
//! Writes are rename-based: payloads land in a uniquely named `*.tmp` staging
//! file and are renamed into place, so a reader never observes a partially
//! written image even with concurrent puts for the same identity.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::entry::AvatarMetadata;
use crate::config::CacheConfig;
use crate::errors::CacheError;

/// File extensions that can belong to one identity. `remove` sweeps them all;
/// the last three are legacy aux files from the multi-file layout and are
/// never written by this store.
const ENTRY_EXTENSIONS: &[&str] = &["jpg", "json", "tmp", "count", "update", "mark"];

/// Per-process counter for unique staging file names.
static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(0);

/// Outcome of a predicate scan over the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Identities considered by the scan
    pub scanned: usize,
    /// Identities whose files were removed
    pub entries_removed: usize,
    /// Individual files removed
    pub files_removed: usize,
}

/// Disk-backed key-value store: identity -> (image file, metadata sidecar).
///
/// Sidecar updates are read-modify-write cycles; they are serialized behind
/// one lock shared by all clones so a `touch` racing a concurrent `put`
/// cannot lose a use-count increment.
#[derive(Debug, Clone)]
pub struct AvatarCacheStore {
    avatar_dir: PathBuf,
    sidecar_lock: Arc<Mutex<()>>,
}

impl AvatarCacheStore {
    /// Open a store rooted at `avatar_dir`, creating the directory if needed.
    pub async fn open<P: Into<PathBuf>>(avatar_dir: P) -> Result<Self, CacheError> {
        let avatar_dir = avatar_dir.into();
        fs::create_dir_all(&avatar_dir).await?;
        Ok(Self {
            avatar_dir,
            sidecar_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn avatar_dir(&self) -> &Path {
        &self.avatar_dir
    }

    /// Canonical image path for an identity.
    pub fn image_path(&self, identity: &str) -> Result<PathBuf, CacheError> {
        validate_identity(identity)?;
        Ok(self.avatar_dir.join(format!("{identity}.jpg")))
    }

    fn metadata_path(&self, identity: &str) -> PathBuf {
        self.avatar_dir.join(format!("{identity}.json"))
    }

    fn staging_path(&self, identity: &str) -> PathBuf {
        let nonce = NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed);
        self.avatar_dir
            .join(format!("{identity}.{:08x}.tmp", nonce))
    }

    /// Return the canonical file path if an entry exists on disk. Never
    /// triggers a fetch.
    pub async fn get(&self, identity: &str) -> Result<Option<PathBuf>, CacheError> {
        let path = self.image_path(identity)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            _ => Ok(None),
        }
    }

    /// Atomically write image bytes for an identity, overwriting any prior
    /// content. Refreshes `last_updated`; a prior use count survives.
    pub async fn put(&self, identity: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let image_path = self.image_path(identity)?;
        fs::create_dir_all(&self.avatar_dir).await?;

        let staging = self.staging_path(identity);
        fs::write(&staging, bytes).await?;
        if let Err(e) = fs::rename(&staging, &image_path).await {
            // Leave nothing behind if the commit itself failed.
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        {
            let _guard = self.sidecar_lock.lock().await;
            let metadata = match self.metadata(identity).await? {
                Some(existing) => existing.refreshed(),
                None => AvatarMetadata::new(),
            };
            self.write_metadata(identity, &metadata).await?;
        }

        debug!(
            identity,
            bytes = bytes.len(),
            "stored avatar: {}",
            image_path.display()
        );
        Ok(image_path)
    }

    /// Increment the use count for an identity.
    ///
    /// An entry whose sidecar is missing gets one created so future cleanup
    /// scans can reason about it; a missing entry is a no-op.
    pub async fn touch(&self, identity: &str) -> Result<(), CacheError> {
        let image_path = self.image_path(identity)?;
        let _guard = self.sidecar_lock.lock().await;
        let metadata = match self.metadata(identity).await? {
            Some(existing) => existing.touched(),
            None => {
                let Ok(file_meta) = fs::metadata(&image_path).await else {
                    return Ok(());
                };
                let last_updated = file_meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                AvatarMetadata {
                    use_count: 1,
                    last_updated,
                }
            }
        };
        self.write_metadata(identity, &metadata).await
    }

    /// Read the metadata sidecar for an identity, if present and parseable.
    pub async fn metadata(&self, identity: &str) -> Result<Option<AvatarMetadata>, CacheError> {
        validate_identity(identity)?;
        let path = self.metadata_path(identity);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };
        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                warn!("unreadable metadata sidecar {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn write_metadata(
        &self,
        identity: &str,
        metadata: &AvatarMetadata,
    ) -> Result<(), CacheError> {
        let path = self.metadata_path(identity);
        let json = serde_json::to_vec_pretty(metadata).map_err(|source| CacheError::Metadata {
            path: path.clone(),
            source,
        })?;
        let staging = self.staging_path(identity);
        fs::write(&staging, &json).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Whether the cached entry for an identity is still within its freshness
    /// window. Entries without a sidecar fall back to file mtime against the
    /// shorter default TTL.
    pub async fn is_fresh(
        &self,
        identity: &str,
        cache_config: &CacheConfig,
    ) -> Result<bool, CacheError> {
        let Some(path) = self.get(identity).await? else {
            return Ok(false);
        };
        let now = Utc::now();
        if let Some(metadata) = self.metadata(identity).await? {
            return Ok(metadata.is_fresh(cache_config.real_avatar_ttl(), now));
        }
        let file_meta = fs::metadata(&path).await?;
        let modified = file_meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(now);
        let age = (now - modified).to_std().unwrap_or_default();
        Ok(age <= cache_config.default_avatar_ttl())
    }

    /// Delete every file belonging to an identity. Returns how many files
    /// actually existed and were deleted.
    pub async fn remove(&self, identity: &str) -> Result<usize, CacheError> {
        validate_identity(identity)?;
        let mut removed = 0;
        for ext in ENTRY_EXTENSIONS {
            let path = self.avatar_dir.join(format!("{identity}.{ext}"));
            if fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(identity, removed, "removed avatar cache entry");
        }
        Ok(removed)
    }

    /// List the identities with an image file in the store. Subdirectories
    /// encountered during the scan are skipped, not recursed.
    pub async fn list_identities(&self) -> Result<Vec<String>, CacheError> {
        let mut identities = Vec::new();
        let mut entries = fs::read_dir(&self.avatar_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some("jpg")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                identities.push(stem.to_string());
            }
        }
        Ok(identities)
    }

    /// Scan every entry and delete those matching the removal predicate. The
    /// predicate sees the identity and its metadata sidecar (if any).
    pub async fn remove_all<F>(&self, predicate: F) -> Result<RemoveOutcome, CacheError>
    where
        F: Fn(&str, Option<&AvatarMetadata>) -> bool,
    {
        let mut outcome = RemoveOutcome::default();
        for identity in self.list_identities().await? {
            outcome.scanned += 1;
            let metadata = self.metadata(&identity).await?;
            if predicate(&identity, metadata.as_ref()) {
                let files = self.remove(&identity).await?;
                if files > 0 {
                    outcome.entries_removed += 1;
                    outcome.files_removed += files;
                }
            }
        }
        Ok(outcome)
    }

    /// Delete every leftover `*.tmp` staging file. Returns the number removed.
    pub async fn sweep_staging(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.avatar_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some("tmp")
                && fs::remove_file(&path).await.is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Identities become file names; reject anything that could escape the cache
/// directory or collide with the sidecar naming scheme.
fn validate_identity(identity: &str) -> Result<(), CacheError> {
    let reason = if identity.is_empty() {
        Some("empty")
    } else if identity.contains('/') || identity.contains('\\') {
        Some("contains path separator")
    } else if identity.contains('\0') {
        Some("contains NUL byte")
    } else if identity == "." || identity == ".." {
        Some("reserved name")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(CacheError::InvalidIdentity {
            identity: identity.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, AvatarCacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AvatarCacheStore::open(dir.path().join("avatars"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let (_dir, store) = temp_store().await;
        let payload = vec![0xAB; 5000];

        let written = store.put("u1", &payload).await.unwrap();
        let found = store.get("u1").await.unwrap().expect("entry should exist");
        assert_eq!(written, found);
        assert_eq!(fs::read(&found).await.unwrap(), payload);

        let metadata = store.metadata("u1").await.unwrap().unwrap();
        assert_eq!(metadata.use_count, 0);
        assert!(metadata.age(Utc::now()).as_secs() < 5);
    }

    #[tokio::test]
    async fn get_misses_without_put() {
        let (_dir, store) = temp_store().await;
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_then_get_yields_miss() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"0123456789abcdef").await.unwrap();

        let removed = store.remove("u1").await.unwrap();
        assert_eq!(removed, 2); // image + sidecar
        assert!(store.get("u1").await.unwrap().is_none());
        assert!(store.metadata("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_counts_legacy_aux_files() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"payload").await.unwrap();
        for ext in ["count", "update", "mark", "tmp"] {
            fs::write(store.avatar_dir().join(format!("u1.{ext}")), b"x")
                .await
                .unwrap();
        }

        let removed = store.remove("u1").await.unwrap();
        assert_eq!(removed, 6);
    }

    #[tokio::test]
    async fn touch_increments_use_count() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"payload").await.unwrap();

        store.touch("u1").await.unwrap();
        store.touch("u1").await.unwrap();

        let metadata = store.metadata("u1").await.unwrap().unwrap();
        assert_eq!(metadata.use_count, 2);
    }

    #[tokio::test]
    async fn touch_without_entry_is_noop() {
        let (_dir, store) = temp_store().await;
        store.touch("ghost").await.unwrap();
        assert!(store.metadata("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_preserves_use_count() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"first").await.unwrap();
        store.touch("u1").await.unwrap();
        store.put("u1", b"second").await.unwrap();

        let metadata = store.metadata("u1").await.unwrap().unwrap();
        assert_eq!(metadata.use_count, 1);
        let path = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn concurrent_puts_do_not_corrupt_entries() {
        let (_dir, store) = temp_store().await;
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let identity = format!("user{}", i % 2);
                let payload = vec![i; 4096];
                store.put(&identity, &payload).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Whatever won the race, each entry must be one intact payload.
        for identity in ["user0", "user1"] {
            let path = store.get(identity).await.unwrap().unwrap();
            let bytes = fs::read(&path).await.unwrap();
            assert_eq!(bytes.len(), 4096);
            assert!(bytes.windows(2).all(|w| w[0] == w[1]));
        }
        // No staging files left behind.
        assert_eq!(store.sweep_staging().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_touches_count_every_reuse() {
        let (_dir, store) = temp_store().await;
        store.put("alice", b"payload").await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.touch("alice").await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let metadata = store.metadata("alice").await.unwrap().unwrap();
        assert_eq!(metadata.use_count, 16);
    }

    #[tokio::test]
    async fn rejects_path_escaping_identities() {
        let (_dir, store) = temp_store().await;
        for identity in ["../evil", "a/b", "", "..", "nul\0byte"] {
            assert!(matches!(
                store.put(identity, b"payload").await,
                Err(CacheError::InvalidIdentity { .. })
            ));
        }
    }

    #[tokio::test]
    async fn list_identities_skips_directories_and_non_images() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"payload").await.unwrap();
        store.put("u2", b"payload").await.unwrap();
        fs::create_dir(store.avatar_dir().join("subdir"))
            .await
            .unwrap();
        fs::write(store.avatar_dir().join("stray.txt"), b"x")
            .await
            .unwrap();

        let mut identities = store.list_identities().await.unwrap();
        identities.sort();
        assert_eq!(identities, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn remove_all_applies_predicate() {
        let (_dir, store) = temp_store().await;
        store.put("keep", b"payload").await.unwrap();
        store.put("drop", b"payload").await.unwrap();

        let outcome = store.remove_all(|identity, _| identity == "drop").await.unwrap();
        assert_eq!(outcome.scanned, 2);
        assert_eq!(outcome.entries_removed, 1);
        assert_eq!(outcome.files_removed, 2);
        assert!(store.get("keep").await.unwrap().is_some());
        assert!(store.get("drop").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_staging_removes_only_tmp_files() {
        let (_dir, store) = temp_store().await;
        store.put("u1", b"payload").await.unwrap();
        fs::write(store.avatar_dir().join("u9.0000.tmp"), b"partial")
            .await
            .unwrap();
        fs::write(store.avatar_dir().join("u9.tmp"), b"legacy")
            .await
            .unwrap();

        assert_eq!(store.sweep_staging().await.unwrap(), 2);
        assert!(store.get("u1").await.unwrap().is_some());
    }
}
