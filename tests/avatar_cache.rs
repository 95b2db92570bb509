//! Integration tests for the avatar cache store and its eviction policies.

use chrono::{Duration as ChronoDuration, Utc};
use memegen::avatar::{AvatarCacheStore, AvatarMetadata, CacheCleaner};
use memegen::config::CacheConfig;
use tokio::fs;

async fn open_store() -> (tempfile::TempDir, AvatarCacheStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = AvatarCacheStore::open(dir.path().join("avatars"))
        .await
        .unwrap();
    (dir, store)
}

async fn backdate(store: &AvatarCacheStore, identity: &str, days: i64, use_count: u64) {
    let metadata = AvatarMetadata {
        use_count,
        last_updated: Utc::now() - ChronoDuration::days(days),
    };
    fs::write(
        store.avatar_dir().join(format!("{identity}.json")),
        serde_json::to_vec(&metadata).unwrap(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn put_creates_image_and_metadata_sidecar() {
    let (_dir, store) = open_store().await;

    let path = store.put("alice", b"image-bytes").await.unwrap();
    assert_eq!(path, store.avatar_dir().join("alice.jpg"));
    assert_eq!(fs::read(&path).await.unwrap(), b"image-bytes");

    let metadata = store.metadata("alice").await.unwrap().unwrap();
    assert_eq!(metadata.use_count, 0);

    // No staging leftovers after a successful commit.
    let mut leftovers = fs::read_dir(store.avatar_dir()).await.unwrap();
    while let Some(entry) = leftovers.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().to_string();
        assert!(!name.ends_with(".tmp"), "staging file left behind: {name}");
    }
}

#[tokio::test]
async fn refresh_preserves_use_count() {
    let (_dir, store) = open_store().await;

    store.put("alice", b"first-version").await.unwrap();
    store.touch("alice").await.unwrap();
    store.touch("alice").await.unwrap();
    store.put("alice", b"second-version").await.unwrap();

    let metadata = store.metadata("alice").await.unwrap().unwrap();
    assert_eq!(metadata.use_count, 2);
    assert_eq!(
        fs::read(store.avatar_dir().join("alice.jpg")).await.unwrap(),
        b"second-version"
    );
}

#[tokio::test]
async fn fresh_entry_is_reusable_without_refetch() {
    let (_dir, store) = open_store().await;
    let cache_config = CacheConfig::default();

    store.put("alice", b"image-bytes").await.unwrap();
    assert!(store.is_fresh("alice", &cache_config).await.unwrap());

    backdate(&store, "alice", 2, 0).await;
    assert!(!store.is_fresh("alice", &cache_config).await.unwrap());
}

#[tokio::test]
async fn entry_without_sidecar_uses_file_age_and_shorter_window() {
    let (_dir, store) = open_store().await;
    let cache_config = CacheConfig::default();

    store.put("bare", b"image-bytes").await.unwrap();
    fs::remove_file(store.avatar_dir().join("bare.json"))
        .await
        .unwrap();

    // Just written, so well within the default window.
    assert!(store.is_fresh("bare", &cache_config).await.unwrap());
}

#[tokio::test]
async fn remove_sweeps_legacy_auxiliary_files() {
    let (_dir, store) = open_store().await;

    store.put("alice", b"image-bytes").await.unwrap();
    for ext in ["count", "update", "mark"] {
        fs::write(store.avatar_dir().join(format!("alice.{ext}")), b"1")
            .await
            .unwrap();
    }

    let removed = store.remove("alice").await.unwrap();
    assert_eq!(removed, 5); // image + sidecar + three legacy files
    assert!(store.get("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn clear_all_respects_grace_window_and_sweeps_staging() {
    let (_dir, store) = open_store().await;
    let cleaner = CacheCleaner::new(store.clone(), CacheConfig::default());

    store.put("recent", b"image-bytes").await.unwrap();
    store.put("ancient", b"image-bytes").await.unwrap();
    backdate(&store, "ancient", 4, 100).await;
    fs::write(store.avatar_dir().join("orphan.00ff.tmp"), b"partial")
        .await
        .unwrap();

    let files_removed = cleaner.clear_all().await.unwrap();
    assert_eq!(files_removed, 3); // ancient image + sidecar + staging file
    assert!(store.get("recent").await.unwrap().is_some());
    assert!(store.get("ancient").await.unwrap().is_none());
}

#[tokio::test]
async fn scheduled_and_manual_policies_disagree_on_popular_entries() {
    let (_dir, store) = open_store().await;
    let cleaner = CacheCleaner::new(store.clone(), CacheConfig::default());

    // Old but heavily used: the scheduled sweep keeps it, clear-all does not.
    store.put("popular", b"image-bytes").await.unwrap();
    backdate(&store, "popular", 30, 100).await;

    let stats = cleaner.scheduled_cleanup().await.unwrap();
    assert_eq!(stats.entries_removed, 0);
    assert!(store.get("popular").await.unwrap().is_some());

    let files_removed = cleaner.clear_all().await.unwrap();
    assert_eq!(files_removed, 2);
    assert!(store.get("popular").await.unwrap().is_none());
}

#[tokio::test]
async fn identities_with_path_separators_are_rejected() {
    let (_dir, store) = open_store().await;

    for identity in ["../escape", "a/b", "a\\b", "", ".", ".."] {
        assert!(
            store.put(identity, b"image-bytes").await.is_err(),
            "identity {identity:?} should be rejected"
        );
    }
}
