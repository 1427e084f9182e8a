//! Integration tests for the SQLite catalog
//!
//! Runs against in-memory databases; disk-backed behavior (file payload
//! unlink) uses a tempdir.

use chrono::{Duration, TimeZone, Utc};

use framesync_catalog::{CatalogPool, SqliteCatalog};
use framesync_core::config::SortMode;
use framesync_core::domain::{CachePayload, Photo, PhotoId, ProviderKey};
use framesync_core::ports::ICatalog;

fn photo(id: &str, created: chrono::DateTime<Utc>) -> Photo {
    Photo {
        id: PhotoId::new(id).unwrap(),
        provider_key: ProviderKey::new("graph").unwrap(),
        container_key: "root".to_string(),
        filename: format!("{id}.jpg"),
        creation_time: created,
        width: Some(4000),
        height: Some(3000),
        latitude: None,
        longitude: None,
        location_name: None,
        last_viewed_at: None,
        cache: CachePayload::Unset,
    }
}

fn ts(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

async fn catalog(sort: SortMode) -> (CatalogPool, SqliteCatalog) {
    let pool = CatalogPool::in_memory().await.unwrap();
    let catalog = SqliteCatalog::new(pool.pool().clone(), sort);
    (pool, catalog)
}

async fn cache_all(catalog: &SqliteCatalog, ids: &[&str]) {
    for id in ids {
        catalog
            .attach_blob(&PhotoId::new(*id).unwrap(), &[0xAB; 16], "image/jpeg")
            .await
            .unwrap();
    }
}

// ============================================================================
// Upsert semantics
// ============================================================================

#[tokio::test]
async fn upsert_and_get_round_trip() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    let mut p = photo("p1", ts(2024, 3, 1));
    p.latitude = Some(48.8584);
    p.longitude = Some(2.2945);
    catalog.upsert_photos(&[p.clone()]).await.unwrap();

    let loaded = catalog.get_photo(&p.id).await.unwrap().unwrap();
    assert_eq!(loaded, p);
    assert_eq!(catalog.total_count().await.unwrap(), 1);
}

#[tokio::test]
async fn upsert_twice_is_idempotent() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    let p = photo("p1", ts(2024, 3, 1));
    catalog.upsert_photos(&[p.clone()]).await.unwrap();
    let first = catalog.get_photo(&p.id).await.unwrap().unwrap();

    catalog.upsert_photos(&[p.clone()]).await.unwrap();
    let second = catalog.get_photo(&p.id).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(catalog.total_count().await.unwrap(), 1);
}

#[tokio::test]
async fn upsert_preserves_view_state_and_cache_payload() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    let p = photo("p1", ts(2024, 3, 1));
    catalog.upsert_photos(&[p.clone()]).await.unwrap();
    catalog
        .attach_blob(&p.id, b"display-ready", "image/jpeg")
        .await
        .unwrap();
    catalog.mark_viewed(&p.id, ts(2024, 4, 1)).await.unwrap();

    // A re-scan of the same photo with refreshed metadata must not
    // disturb view state or the payload.
    let mut rescan = photo("p1", ts(2024, 3, 1));
    rescan.filename = "renamed.jpg".to_string();
    catalog.upsert_photos(&[rescan]).await.unwrap();

    let loaded = catalog.get_photo(&p.id).await.unwrap().unwrap();
    assert_eq!(loaded.filename, "renamed.jpg");
    assert_eq!(loaded.last_viewed_at, Some(ts(2024, 4, 1)));
    assert!(matches!(loaded.cache, CachePayload::Blob { ref bytes, .. } if bytes == b"display-ready"));
}

#[tokio::test]
async fn upsert_batch_is_atomic() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    let batch: Vec<Photo> = (0..50)
        .map(|i| photo(&format!("p{i:03}"), ts(2024, 1, 1)))
        .collect();
    catalog.upsert_photos(&batch).await.unwrap();
    assert_eq!(catalog.total_count().await.unwrap(), 50);
}

// ============================================================================
// Display candidate ordering
// ============================================================================

#[tokio::test]
async fn sequential_cycle_shows_each_photo_once_before_repeating() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    // Inserted out of lexicographic order on purpose.
    catalog
        .upsert_photos(&[
            photo("photo_c", ts(2024, 3, 1)),
            photo("photo_a", ts(2024, 1, 1)),
            photo("photo_b", ts(2024, 2, 1)),
        ])
        .await
        .unwrap();
    cache_all(&catalog, &["photo_a", "photo_b", "photo_c"]).await;

    let mut seen = Vec::new();
    let mut now = Utc::now();
    for _ in 0..4 {
        let candidate = catalog.next_display_candidate().await.unwrap().unwrap();
        catalog.mark_viewed(&candidate.id, now).await.unwrap();
        now += Duration::seconds(60);
        seen.push(candidate.id.as_str().to_string());
    }

    assert_eq!(seen, vec!["photo_a", "photo_b", "photo_c", "photo_a"]);
}

#[tokio::test]
async fn newest_mode_orders_by_creation_time_descending() {
    let (_pool, catalog) = catalog(SortMode::Newest).await;

    catalog
        .upsert_photos(&[
            photo("old_photo", ts(2020, 1, 1)),
            photo("new_photo", ts(2024, 12, 1)),
            photo("mid_photo", ts(2022, 6, 1)),
        ])
        .await
        .unwrap();
    cache_all(&catalog, &["old_photo", "new_photo", "mid_photo"]).await;

    let mut seen = Vec::new();
    let mut now = Utc::now();
    for _ in 0..3 {
        let candidate = catalog.next_display_candidate().await.unwrap().unwrap();
        catalog.mark_viewed(&candidate.id, now).await.unwrap();
        now += Duration::seconds(60);
        seen.push(candidate.id.as_str().to_string());
    }

    assert_eq!(seen, vec!["new_photo", "mid_photo", "old_photo"]);
}

#[tokio::test]
async fn oldest_mode_orders_by_creation_time_ascending() {
    let (_pool, catalog) = catalog(SortMode::Oldest).await;

    catalog
        .upsert_photos(&[
            photo("old_photo", ts(2020, 1, 1)),
            photo("new_photo", ts(2024, 12, 1)),
        ])
        .await
        .unwrap();
    cache_all(&catalog, &["old_photo", "new_photo"]).await;

    let first = catalog.next_display_candidate().await.unwrap().unwrap();
    assert_eq!(first.id.as_str(), "old_photo");
}

#[tokio::test]
async fn unviewed_photos_precede_viewed_in_every_mode() {
    for mode in [
        SortMode::Sequential,
        SortMode::Random,
        SortMode::Newest,
        SortMode::Oldest,
    ] {
        let (_pool, catalog) = catalog(mode).await;

        catalog
            .upsert_photos(&[photo("viewed", ts(2024, 12, 1)), photo("fresh", ts(2020, 1, 1))])
            .await
            .unwrap();
        cache_all(&catalog, &["viewed", "fresh"]).await;
        catalog
            .mark_viewed(&PhotoId::new("viewed").unwrap(), Utc::now())
            .await
            .unwrap();

        let candidate = catalog.next_display_candidate().await.unwrap().unwrap();
        assert_eq!(candidate.id.as_str(), "fresh", "mode {mode:?}");
    }
}

#[tokio::test]
async fn uncached_photos_never_become_display_candidates() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();

    assert!(catalog.next_display_candidate().await.unwrap().is_none());
}

// ============================================================================
// Fetch and eviction candidate ordering
// ============================================================================

#[tokio::test]
async fn fetch_candidates_are_uncached_never_viewed_first() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    catalog
        .upsert_photos(&[
            photo("a_viewed_long_ago", ts(2024, 1, 1)),
            photo("b_viewed_recently", ts(2024, 1, 2)),
            photo("c_never_viewed", ts(2024, 1, 3)),
            photo("d_cached", ts(2024, 1, 4)),
        ])
        .await
        .unwrap();
    cache_all(&catalog, &["d_cached"]).await;

    catalog
        .mark_viewed(&PhotoId::new("a_viewed_long_ago").unwrap(), ts(2024, 2, 1))
        .await
        .unwrap();
    catalog
        .mark_viewed(&PhotoId::new("b_viewed_recently").unwrap(), ts(2024, 3, 1))
        .await
        .unwrap();

    let candidates = catalog.list_fetch_candidates(10).await.unwrap();
    let ids: Vec<&str> = candidates.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["c_never_viewed", "a_viewed_long_ago", "b_viewed_recently"]
    );

    let limited = catalog.list_fetch_candidates(1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id.as_str(), "c_never_viewed");
}

#[tokio::test]
async fn eviction_candidates_are_oldest_viewed_first_never_viewed_last() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    catalog
        .upsert_photos(&[
            photo("viewed_2024_01", ts(2023, 1, 1)),
            photo("viewed_2024_06", ts(2023, 1, 2)),
            photo("never_viewed", ts(2023, 1, 3)),
        ])
        .await
        .unwrap();
    cache_all(&catalog, &["viewed_2024_01", "viewed_2024_06", "never_viewed"]).await;

    catalog
        .mark_viewed(&PhotoId::new("viewed_2024_01").unwrap(), ts(2024, 1, 1))
        .await
        .unwrap();
    catalog
        .mark_viewed(&PhotoId::new("viewed_2024_06").unwrap(), ts(2024, 6, 1))
        .await
        .unwrap();

    let candidates = catalog.list_eviction_candidates(10).await.unwrap();
    let ids: Vec<&str> = candidates.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["viewed_2024_01", "viewed_2024_06", "never_viewed"]
    );
}

// ============================================================================
// Cache payload forms
// ============================================================================

#[tokio::test]
async fn attach_blob_then_file_keeps_exactly_one_form() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();

    catalog.attach_blob(&id, &[1, 2, 3], "image/jpeg").await.unwrap();
    let loaded = catalog.get_photo(&id).await.unwrap().unwrap();
    assert!(matches!(loaded.cache, CachePayload::Blob { .. }));

    catalog
        .attach_file(&id, std::path::Path::new("/tmp/p1.jpg"), 900)
        .await
        .unwrap();
    let loaded = catalog.get_photo(&id).await.unwrap().unwrap();
    match loaded.cache {
        CachePayload::File { ref path, size_bytes, .. } => {
            assert_eq!(path.to_str(), Some("/tmp/p1.jpg"));
            assert_eq!(size_bytes, 900);
        }
        other => panic!("expected file payload, got {other:?}"),
    }

    // Switching back also drops the file reference.
    catalog.attach_blob(&id, &[9, 9], "image/jpeg").await.unwrap();
    let loaded = catalog.get_photo(&id).await.unwrap().unwrap();
    assert!(matches!(loaded.cache, CachePayload::Blob { .. }));
}

#[tokio::test]
async fn attach_rejects_unknown_photo_and_empty_payload() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    let missing = PhotoId::new("ghost").unwrap();
    assert!(catalog
        .attach_blob(&missing, &[1], "image/jpeg")
        .await
        .is_err());

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();
    assert!(catalog
        .attach_blob(&PhotoId::new("p1").unwrap(), &[], "image/jpeg")
        .await
        .is_err());
}

#[tokio::test]
async fn cache_bytes_total_matches_sum_of_cached_sizes() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    catalog
        .upsert_photos(&[
            photo("p1", ts(2024, 1, 1)),
            photo("p2", ts(2024, 1, 2)),
            photo("p3", ts(2024, 1, 3)),
        ])
        .await
        .unwrap();

    assert_eq!(catalog.cache_bytes_total().await.unwrap(), 0);

    catalog
        .attach_blob(&PhotoId::new("p1").unwrap(), &vec![0; 1000], "image/jpeg")
        .await
        .unwrap();
    catalog
        .attach_file(
            &PhotoId::new("p2").unwrap(),
            std::path::Path::new("/tmp/p2.jpg"),
            2500,
        )
        .await
        .unwrap();

    assert_eq!(catalog.cache_bytes_total().await.unwrap(), 3500);
    assert_eq!(catalog.cached_count().await.unwrap(), 2);
    assert_eq!(catalog.total_count().await.unwrap(), 3);

    catalog
        .clear_cache(&PhotoId::new("p1").unwrap())
        .await
        .unwrap();
    assert_eq!(catalog.cache_bytes_total().await.unwrap(), 2500);
    assert_eq!(catalog.cached_count().await.unwrap(), 1);
}

#[tokio::test]
async fn clear_cache_returns_photo_to_fetch_queue() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();
    catalog.attach_blob(&id, &[1, 2, 3], "image/jpeg").await.unwrap();
    assert!(catalog.list_fetch_candidates(10).await.unwrap().is_empty());

    catalog.clear_cache(&id).await.unwrap();
    let candidates = catalog.list_fetch_candidates(10).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert!(!candidates[0].is_cached());
}

// ============================================================================
// View marking
// ============================================================================

#[tokio::test]
async fn mark_viewed_only_advances() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();

    catalog.mark_viewed(&id, ts(2024, 6, 1)).await.unwrap();
    // An older (or equal) timestamp must not regress the stored value.
    catalog.mark_viewed(&id, ts(2024, 3, 1)).await.unwrap();
    catalog.mark_viewed(&id, ts(2024, 6, 1)).await.unwrap();

    let loaded = catalog.get_photo(&id).await.unwrap().unwrap();
    assert_eq!(loaded.last_viewed_at, Some(ts(2024, 6, 1)));

    catalog.mark_viewed(&id, ts(2024, 7, 1)).await.unwrap();
    let loaded = catalog.get_photo(&id).await.unwrap().unwrap();
    assert_eq!(loaded.last_viewed_at, Some(ts(2024, 7, 1)));
}

#[tokio::test]
async fn mark_viewed_on_unknown_photo_is_a_no_op() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    catalog
        .mark_viewed(&PhotoId::new("ghost").unwrap(), Utc::now())
        .await
        .unwrap();
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn delete_photo_removes_row_and_blob() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();
    catalog.attach_blob(&id, &[1; 500], "image/jpeg").await.unwrap();

    catalog.delete_photo(&id).await.unwrap();
    assert!(catalog.get_photo(&id).await.unwrap().is_none());
    assert_eq!(catalog.cache_bytes_total().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_photo_unlinks_file_payload() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("p1.jpg");
    std::fs::write(&file_path, [0u8; 128]).unwrap();

    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();
    catalog.attach_file(&id, &file_path, 128).await.unwrap();

    catalog.delete_photo(&id).await.unwrap();
    assert!(!file_path.exists());
    assert!(catalog.get_photo(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_tolerates_missing_file() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;
    let id = PhotoId::new("p1").unwrap();

    catalog
        .upsert_photos(&[photo("p1", ts(2024, 1, 1))])
        .await
        .unwrap();
    catalog
        .attach_file(&id, std::path::Path::new("/nonexistent/p1.jpg"), 128)
        .await
        .unwrap();

    // The unlink fails but the row still goes away.
    catalog.delete_photo(&id).await.unwrap();
    assert!(catalog.get_photo(&id).await.unwrap().is_none());
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn settings_round_trip_and_replace() {
    let (_pool, catalog) = catalog(SortMode::Sequential).await;

    assert!(catalog
        .get_setting("delta_token:graph")
        .await
        .unwrap()
        .is_none());

    catalog.put_setting("delta_token:graph", "T1").await.unwrap();
    assert_eq!(
        catalog.get_setting("delta_token:graph").await.unwrap(),
        Some("T1".to_string())
    );

    catalog.put_setting("delta_token:graph", "T2").await.unwrap();
    assert_eq!(
        catalog.get_setting("delta_token:graph").await.unwrap(),
        Some("T2".to_string())
    );
}
