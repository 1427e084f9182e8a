//! Catalog port (driven/secondary port)
//!
//! The durable, crash-safe store and query layer for photos and settings.
//! The catalog owns every persistent datum; all other components request
//! mutations through this interface, which serializes them.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem) and don't need domain-level classification.
//! - The display sort policy is fixed at construction time of the
//!   implementing adapter, so `next_display_candidate` takes no arguments.
//! - Read operations return `None`/empty rather than failing when the
//!   store is empty.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::{Photo, PhotoId};

/// Port trait for persistent photo and settings storage
///
/// ## Implementation Notes
///
/// - `upsert_photos` must be a single transaction: all rows or none. An
///   upsert of an already-known photo refreshes provider metadata only
///   and must leave view state and cache payload untouched, so replaying
///   the same provider result is a no-op.
/// - `attach_blob` / `attach_file` must clear the other payload form in
///   the same mutation; a photo never holds both.
/// - `mark_viewed` only advances: a timestamp not strictly greater than
///   the stored one is ignored.
/// - `delete_photo` removes the row and its cache payload together; an
///   orphaned cache file left by a crash mid-delete is tolerated.
#[async_trait::async_trait]
pub trait ICatalog: Send + Sync {
    /// Batch-upserts provider discovery results under one transaction
    ///
    /// Conflicts on `photo_id` update metadata in place. Rolls back all
    /// rows on any failure.
    async fn upsert_photos(&self, photos: &[Photo]) -> anyhow::Result<()>;

    /// Removes a photo row together with its cache payload
    async fn delete_photo(&self, id: &PhotoId) -> anyhow::Result<()>;

    /// Retrieves one photo by id
    async fn get_photo(&self, id: &PhotoId) -> anyhow::Result<Option<Photo>>;

    /// Picks the next photo to display, per the configured sort policy
    ///
    /// Only cached photos qualify. Unviewed photos precede viewed ones in
    /// every mode; among viewed photos the least recently viewed comes
    /// first, so one display cycle shows every cached photo once before
    /// any repeats. Returns `None` when nothing is cached.
    async fn next_display_candidate(&self) -> anyhow::Result<Option<Photo>>;

    /// Advances `last_viewed_at`, only if `now` is strictly greater
    async fn mark_viewed(&self, id: &PhotoId, now: DateTime<Utc>) -> anyhow::Result<()>;

    /// Uncached photos to fetch next, never-viewed then least-recently-viewed
    async fn list_fetch_candidates(&self, limit: u32) -> anyhow::Result<Vec<Photo>>;

    /// Cached photos in eviction order: ascending `last_viewed_at`, never-viewed last
    async fn list_eviction_candidates(&self, limit: u32) -> anyhow::Result<Vec<Photo>>;

    /// Stores a display-ready payload in-catalog, clearing any file payload
    async fn attach_blob(&self, id: &PhotoId, bytes: &[u8], mime_type: &str)
        -> anyhow::Result<()>;

    /// Records an on-disk payload, clearing any blob payload
    async fn attach_file(&self, id: &PhotoId, path: &Path, size_bytes: u64)
        -> anyhow::Result<()>;

    /// Drops both payload forms, returning the photo to the fetch queue
    async fn clear_cache(&self, id: &PhotoId) -> anyhow::Result<()>;

    /// Sum of all cached payload sizes; the authoritative eviction metric
    async fn cache_bytes_total(&self) -> anyhow::Result<u64>;

    /// Number of photos with a cache payload
    async fn cached_count(&self) -> anyhow::Result<u64>;

    /// Number of photos tracked, cached or not
    async fn total_count(&self) -> anyhow::Result<u64>;

    /// Reads a settings value (e.g. a persisted delta token)
    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Writes a settings value, replacing any previous one
    async fn put_setting(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
