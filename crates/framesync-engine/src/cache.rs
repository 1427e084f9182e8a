//! Cache engine
//!
//! On a fixed periodic tick, keeps the local cache healthy: below its
//! byte budget, and as full of display-ready photos as the network
//! permits. A tick that overlaps a still-running one is a no-op, and a
//! run of fully-failed fetch batches triggers a cool-down so outages do
//! not become retry storms.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{debug, info, warn};

use framesync_core::config::Config;
use framesync_core::domain::{CachePayload, Photo, PhotoId};
use framesync_core::ports::{CacheStatsSnapshot, ICatalog, IHostChannel, OutboundMessage};

use crate::handle::ProviderHandle;
use crate::transform;

/// Cadence of the cache upkeep tick
pub const CACHE_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Photos fetched per tick
const FETCH_BATCH_SIZE: u32 = 5;

/// Eviction candidates examined per query while over budget
const EVICTION_BATCH_SIZE: u32 = 10;

/// Fully-failed batches tolerated before the cool-down kicks in
const OFFLINE_TICK_THRESHOLD: u32 = 3;

/// Cool-down slept inside the tick once the threshold is exceeded
const OFFLINE_COOLDOWN: Duration = Duration::from_secs(60);

/// Attempts per individual download, with linear 1s/2s backoff between
const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Per-attempt download timeout
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodic cache upkeep: eviction and batched fetch + transform
pub struct CacheEngine {
    catalog: Arc<dyn ICatalog>,
    provider: Arc<ProviderHandle>,
    host: Arc<dyn IHostChannel>,
    config: Config,
    ticking: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl CacheEngine {
    pub fn new(
        catalog: Arc<dyn ICatalog>,
        provider: Arc<ProviderHandle>,
        host: Arc<dyn IHostChannel>,
        config: Config,
    ) -> Self {
        Self {
            catalog,
            provider,
            host,
            config,
            ticking: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// One upkeep pass; overlapping invocations are dropped
    pub async fn tick(&self) {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Cache tick still running, skipping this fire");
            return;
        }

        let changed = match self.run_tick().await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "Cache tick failed");
                false
            }
        };

        if changed {
            self.emit_stats().await;
        }

        self.ticking.store(false, Ordering::Release);
    }

    async fn run_tick(&self) -> Result<bool> {
        let mut changed = self.evict_over_budget().await?;

        if !self.provider.is_ready() {
            debug!("Provider not ready, skipping fetch");
            return Ok(changed);
        }

        if self.consecutive_failures.load(Ordering::Acquire) > OFFLINE_TICK_THRESHOLD {
            info!(
                cooldown_secs = OFFLINE_COOLDOWN.as_secs(),
                "Repeated failed fetch batches, cooling down"
            );
            tokio::time::sleep(OFFLINE_COOLDOWN).await;
            self.consecutive_failures.store(0, Ordering::Release);
            return Ok(changed);
        }

        let batch = self.catalog.list_fetch_candidates(FETCH_BATCH_SIZE).await?;
        if batch.is_empty() {
            return Ok(changed);
        }

        debug!(batch = batch.len(), "Fetching next cache batch");

        // Settle-all: one failed candidate does not abort its siblings.
        let results =
            futures::future::join_all(batch.iter().map(|photo| self.fetch_one(photo))).await;

        let mut succeeded = 0usize;
        for (photo, result) in batch.iter().zip(&results) {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!(photo_id = %photo.id, error = %e, "Fetch failed, photo left uncached")
                }
            }
        }

        if succeeded == 0 {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
            debug!(failures, "Entire fetch batch failed");
        } else {
            self.consecutive_failures.store(0, Ordering::Release);
            changed = true;
        }

        Ok(changed)
    }

    /// Evicts oldest-viewed payloads until the cache fits the budget
    async fn evict_over_budget(&self) -> Result<bool> {
        let budget = self.config.max_cache_bytes();
        let mut total = self.catalog.cache_bytes_total().await?;
        if total <= budget {
            return Ok(false);
        }

        info!(total, budget, "Cache over budget, evicting");

        let mut evicted = 0u32;
        while total > budget {
            let batch = self
                .catalog
                .list_eviction_candidates(EVICTION_BATCH_SIZE)
                .await?;
            if batch.is_empty() {
                break;
            }

            for photo in &batch {
                if total <= budget {
                    break;
                }
                let size = photo.cache.size_bytes();
                self.evict_one(photo).await?;
                total = total.saturating_sub(size);
                evicted += 1;
            }
        }

        info!(evicted, remaining_bytes = total, "Eviction pass complete");
        Ok(evicted > 0)
    }

    /// Drops one payload: file payloads unlink first, then the row clears
    ///
    /// An unlink failure is logged and the row cleared anyway; orphaned
    /// files are tolerated.
    async fn evict_one(&self, photo: &Photo) -> Result<()> {
        if let CachePayload::File { path, .. } = &photo.cache {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(
                    photo_id = %photo.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to unlink evicted cache file"
                );
            }
        }
        self.catalog.clear_cache(&photo.id).await
    }

    /// Downloads and stores one photo, retrying in place
    async fn fetch_one(&self, photo: &Photo) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match self.download_and_store(photo).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(photo_id = %photo.id, attempt, error = %e, "Download attempt failed");
                    last_error = Some(e);
                    if attempt < DOWNLOAD_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("download retries exhausted for {}", photo.id)))
    }

    async fn download_and_store(&self, photo: &Photo) -> Result<()> {
        let mut stream = self
            .provider
            .provider()
            .download(&photo.id, DOWNLOAD_TIMEOUT)
            .await?;

        let mut source: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            source.extend_from_slice(&chunk?);
        }
        if source.is_empty() {
            anyhow::bail!("download for photo {} returned no bytes", photo.id);
        }

        if transform::available() {
            let (max_w, max_h, quality) = (
                self.config.display_width,
                self.config.display_height,
                self.config.jpeg_quality,
            );
            // Resize bursts run off the scheduler thread.
            let transformed = tokio::task::spawn_blocking(move || {
                transform::to_display_jpeg(&source, max_w, max_h, quality)
            })
            .await
            .context("transform task aborted")??;

            if self.config.use_blob_storage {
                self.catalog
                    .attach_blob(&photo.id, &transformed.bytes, "image/jpeg")
                    .await?;
            } else {
                let path = self.cache_file_path(&photo.id);
                self.write_cache_file(&path, &transformed.bytes).await?;
                self.catalog
                    .attach_file(&photo.id, &path, transformed.bytes.len() as u64)
                    .await?;
            }

            debug!(
                photo_id = %photo.id,
                size = transformed.bytes.len(),
                width = transformed.width,
                height = transformed.height,
                "Cached transformed photo"
            );
        } else {
            // Degraded mode: original bytes straight to disk.
            let path = self.cache_file_path(&photo.id);
            self.write_cache_file(&path, &source).await?;
            self.catalog
                .attach_file(&photo.id, &path, source.len() as u64)
                .await?;

            debug!(photo_id = %photo.id, size = source.len(), "Cached original photo");
        }

        Ok(())
    }

    async fn write_cache_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create cache dir {}", parent.display()))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("failed to write cache file {}", path.display()))
    }

    fn cache_file_path(&self, id: &PhotoId) -> PathBuf {
        self.config
            .cache_dir()
            .join(format!("{}.jpg", sanitize_file_stem(id.as_str())))
    }

    /// Current cache health
    pub async fn stats(&self) -> Result<CacheStatsSnapshot> {
        let total_bytes = self.catalog.cache_bytes_total().await?;
        let cached_count = self.catalog.cached_count().await?;
        let total_count = self.catalog.total_count().await?;
        let max_bytes = self.config.max_cache_bytes();

        let mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
        let percent = |part: f64, whole: f64| {
            if whole > 0.0 {
                (part / whole * 10_000.0).round() / 100.0
            } else {
                0.0
            }
        };

        Ok(CacheStatsSnapshot {
            total_size_mb: (mb(total_bytes) * 100.0).round() / 100.0,
            max_size_mb: mb(max_bytes),
            usage_percent: percent(total_bytes as f64, max_bytes as f64),
            cached_count,
            total_count,
            cache_percent: percent(cached_count as f64, total_count as f64),
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
            is_offline: !self.provider.is_ready(),
        })
    }

    /// Emits a `CACHE_STATS` message; failures are logged, never raised
    pub async fn emit_stats(&self) {
        match self.stats().await {
            Ok(snapshot) => {
                if let Err(e) = self.host.emit(&OutboundMessage::CacheStats(snapshot)).await {
                    debug!(error = %e, "Cache stats emit failed");
                }
            }
            Err(e) => warn!(error = %e, "Cache stats query failed"),
        }
    }
}

fn sanitize_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
