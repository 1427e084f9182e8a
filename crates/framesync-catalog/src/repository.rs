//! SQLite implementation of ICatalog
//!
//! Concrete catalog adapter over a [`sqlx::SqlitePool`]. Handles row
//! mapping, the display sort policy, and the cache-payload exclusivity
//! rules.
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                  |
//! |--------------------|----------|-------------------------------------------|
//! | PhotoId            | TEXT     | String via `.as_str()` / `PhotoId::new()` |
//! | ProviderKey        | TEXT     | String via `.as_str()`                    |
//! | DateTime<Utc>      | INTEGER  | Epoch milliseconds                        |
//! | CachePayload       | columns  | `cache_kind` discriminator + payload cols |

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use framesync_core::config::SortMode;
use framesync_core::domain::{CachePayload, Photo, PhotoId, ProviderKey};
use framesync_core::ports::ICatalog;

use crate::CatalogError;

/// Column list shared by every photo SELECT
const PHOTO_COLUMNS: &str = "photo_id, provider_key, container_key, filename, creation_time, \
     width, height, latitude, longitude, location_name, last_viewed_at, \
     cache_kind, cache_blob, cache_path, cache_mime, cache_size, cached_at";

/// SQLite-backed implementation of the catalog port
///
/// The display sort policy is fixed at construction; every other piece of
/// behavior is driven by the port contract.
pub struct SqliteCatalog {
    pool: SqlitePool,
    sort_mode: SortMode,
}

impl SqliteCatalog {
    /// Creates a catalog over the given pool with the configured sort policy
    pub fn new(pool: SqlitePool, sort_mode: SortMode) -> Self {
        Self { pool, sort_mode }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Epoch milliseconds for storage
fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Parse epoch milliseconds back to a DateTime
fn from_millis(ms: i64) -> Result<DateTime<Utc>, CatalogError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CatalogError::SerializationError(format!("Invalid timestamp: {ms}")))
}

/// Reconstruct a Photo from a database row
fn photo_from_row(row: &SqliteRow) -> Result<Photo, CatalogError> {
    let id_str: String = row.get("photo_id");
    let provider_key_str: String = row.get("provider_key");
    let creation_time_ms: i64 = row.get("creation_time");
    let last_viewed_ms: Option<i64> = row.get("last_viewed_at");
    let cache_kind: String = row.get("cache_kind");

    let id = PhotoId::new(id_str.clone())
        .map_err(|e| CatalogError::SerializationError(format!("Invalid photo_id: {e}")))?;
    let provider_key = ProviderKey::new(provider_key_str)
        .map_err(|e| CatalogError::SerializationError(format!("Invalid provider_key: {e}")))?;

    let last_viewed_at = last_viewed_ms.map(from_millis).transpose()?;

    let cache = match cache_kind.as_str() {
        "unset" => CachePayload::Unset,
        "blob" => {
            let bytes: Vec<u8> = row.get("cache_blob");
            let mime_type: Option<String> = row.get("cache_mime");
            let size_bytes: i64 = row.get("cache_size");
            let cached_at_ms: i64 = row.get("cached_at");
            CachePayload::Blob {
                bytes,
                mime_type: mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
                size_bytes: size_bytes as u64,
                cached_at: from_millis(cached_at_ms)?,
            }
        }
        "file" => {
            let path: String = row.get("cache_path");
            let size_bytes: i64 = row.get("cache_size");
            let cached_at_ms: i64 = row.get("cached_at");
            CachePayload::File {
                path: PathBuf::from(path),
                size_bytes: size_bytes as u64,
                cached_at: from_millis(cached_at_ms)?,
            }
        }
        other => {
            return Err(CatalogError::SerializationError(format!(
                "Unknown cache kind: {other}"
            )))
        }
    };

    Ok(Photo {
        id,
        provider_key,
        container_key: row.get("container_key"),
        filename: row.get("filename"),
        creation_time: from_millis(creation_time_ms)?,
        width: row.get::<Option<i64>, _>("width").map(|v| v as u32),
        height: row.get::<Option<i64>, _>("height").map(|v| v as u32),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        location_name: row.get("location_name"),
        last_viewed_at,
        cache,
    })
}

/// ORDER BY clause implementing the display rotation policy
///
/// Unviewed photos come first in every mode (NULL `last_viewed_at` sorts
/// ahead). Among viewed photos, ascending `last_viewed_at` guarantees a
/// full cycle shows each photo once before any repeats; the per-mode key
/// orders the unviewed class and breaks ties among the viewed.
fn display_order_clause(mode: SortMode) -> &'static str {
    match mode {
        SortMode::Sequential => {
            "ORDER BY (last_viewed_at IS NOT NULL), last_viewed_at, photo_id"
        }
        SortMode::Random => "ORDER BY (last_viewed_at IS NOT NULL), last_viewed_at, RANDOM()",
        SortMode::Newest => {
            "ORDER BY (last_viewed_at IS NOT NULL), last_viewed_at, creation_time DESC, photo_id"
        }
        SortMode::Oldest => {
            "ORDER BY (last_viewed_at IS NOT NULL), last_viewed_at, creation_time ASC, photo_id"
        }
    }
}

// ============================================================================
// ICatalog implementation
// ============================================================================

#[async_trait::async_trait]
impl ICatalog for SqliteCatalog {
    async fn upsert_photos(&self, photos: &[Photo]) -> anyhow::Result<()> {
        if photos.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for photo in photos {
            // Conflicts refresh provider metadata only; view state and the
            // cache payload stay untouched so replayed scans are no-ops.
            sqlx::query(
                "INSERT INTO photos \
                 (photo_id, provider_key, container_key, filename, creation_time, \
                  width, height, latitude, longitude, location_name) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(photo_id) DO UPDATE SET \
                   provider_key = excluded.provider_key, \
                   container_key = excluded.container_key, \
                   filename = excluded.filename, \
                   creation_time = excluded.creation_time, \
                   width = excluded.width, \
                   height = excluded.height, \
                   latitude = excluded.latitude, \
                   longitude = excluded.longitude, \
                   location_name = COALESCE(excluded.location_name, photos.location_name)",
            )
            .bind(photo.id.as_str())
            .bind(photo.provider_key.as_str())
            .bind(&photo.container_key)
            .bind(&photo.filename)
            .bind(to_millis(photo.creation_time))
            .bind(photo.width.map(|v| v as i64))
            .bind(photo.height.map(|v| v as i64))
            .bind(photo.latitude)
            .bind(photo.longitude)
            .bind(&photo.location_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::trace!(count = photos.len(), "Upserted photos");
        Ok(())
    }

    async fn delete_photo(&self, id: &PhotoId) -> anyhow::Result<()> {
        // Removing the row drops any blob payload with it; a file payload
        // is unlinked afterwards, tolerating an orphan if we crash between.
        let cache_path: Option<String> = sqlx::query_scalar(
            "SELECT cache_path FROM photos WHERE photo_id = ? AND cache_kind = 'file'",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        sqlx::query("DELETE FROM photos WHERE photo_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if let Some(path) = cache_path {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(photo_id = %id, path, error = %e, "Failed to unlink cache file");
            }
        }

        tracing::trace!(photo_id = %id, "Deleted photo");
        Ok(())
    }

    async fn get_photo(&self, id: &PhotoId) -> anyhow::Result<Option<Photo>> {
        let row = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE photo_id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(photo_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn next_display_candidate(&self) -> anyhow::Result<Option<Photo>> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE cache_kind != 'unset' {} LIMIT 1",
            display_order_clause(self.sort_mode)
        );

        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

        match row {
            Some(ref r) => Ok(Some(photo_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_viewed(&self, id: &PhotoId, now: DateTime<Utc>) -> anyhow::Result<()> {
        let now_ms = to_millis(now);

        sqlx::query(
            "UPDATE photos SET last_viewed_at = ? \
             WHERE photo_id = ? AND (last_viewed_at IS NULL OR last_viewed_at < ?)",
        )
        .bind(now_ms)
        .bind(id.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_fetch_candidates(&self, limit: u32) -> anyhow::Result<Vec<Photo>> {
        let rows = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE cache_kind = 'unset' \
             ORDER BY (last_viewed_at IS NOT NULL), last_viewed_at, photo_id LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut photos = Vec::with_capacity(rows.len());
        for row in &rows {
            photos.push(photo_from_row(row)?);
        }
        Ok(photos)
    }

    async fn list_eviction_candidates(&self, limit: u32) -> anyhow::Result<Vec<Photo>> {
        // Oldest-viewed first; never-viewed photos are only disposable
        // once nothing viewed remains, so NULLs sort last here.
        let rows = sqlx::query(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE cache_kind != 'unset' \
             ORDER BY (last_viewed_at IS NULL), last_viewed_at, photo_id LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut photos = Vec::with_capacity(rows.len());
        for row in &rows {
            photos.push(photo_from_row(row)?);
        }
        Ok(photos)
    }

    async fn attach_blob(
        &self,
        id: &PhotoId,
        bytes: &[u8],
        mime_type: &str,
    ) -> anyhow::Result<()> {
        if bytes.is_empty() {
            anyhow::bail!("refusing to attach empty payload for photo {id}");
        }

        let result = sqlx::query(
            "UPDATE photos SET \
               cache_kind = 'blob', cache_blob = ?, cache_mime = ?, \
               cache_size = ?, cached_at = ?, cache_path = NULL \
             WHERE photo_id = ?",
        )
        .bind(bytes)
        .bind(mime_type)
        .bind(bytes.len() as i64)
        .bind(to_millis(Utc::now()))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("cannot attach payload: photo {id} not in catalog");
        }

        tracing::trace!(photo_id = %id, size = bytes.len(), "Attached blob payload");
        Ok(())
    }

    async fn attach_file(
        &self,
        id: &PhotoId,
        path: &Path,
        size_bytes: u64,
    ) -> anyhow::Result<()> {
        if size_bytes == 0 {
            anyhow::bail!("refusing to attach empty payload for photo {id}");
        }

        let result = sqlx::query(
            "UPDATE photos SET \
               cache_kind = 'file', cache_path = ?, cache_size = ?, cached_at = ?, \
               cache_blob = NULL, cache_mime = NULL \
             WHERE photo_id = ?",
        )
        .bind(path.to_string_lossy().as_ref())
        .bind(size_bytes as i64)
        .bind(to_millis(Utc::now()))
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("cannot attach payload: photo {id} not in catalog");
        }

        tracing::trace!(photo_id = %id, size = size_bytes, "Attached file payload");
        Ok(())
    }

    async fn clear_cache(&self, id: &PhotoId) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE photos SET \
               cache_kind = 'unset', cache_blob = NULL, cache_path = NULL, \
               cache_mime = NULL, cache_size = 0, cached_at = NULL \
             WHERE photo_id = ?",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        tracing::trace!(photo_id = %id, "Cleared cache payload");
        Ok(())
    }

    async fn cache_bytes_total(&self) -> anyhow::Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(cache_size), 0) FROM photos WHERE cache_kind != 'unset'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total as u64)
    }

    async fn cached_count(&self) -> anyhow::Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE cache_kind != 'unset'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn total_count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        tracing::trace!(key, "Saved setting");
        Ok(())
    }
}
