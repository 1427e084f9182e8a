//! Display dispatcher
//!
//! On the configured cadence, picks the next cached photo and emits it to
//! the host as a base64 payload. View marking is fire-and-forget; a
//! marking failure never blocks or delays display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, warn};

use framesync_core::domain::{CachePayload, Photo};
use framesync_core::ports::{ICatalog, IHostChannel, OutboundMessage};

/// Delay before the first emission after startup, ahead of the cadence
pub const FIRST_DISPLAY_DELAY: Duration = Duration::from_secs(2);

/// Payload-less cached rows skipped within one tick before giving up
const MAX_ADVANCES_PER_TICK: u32 = 3;

/// Cadenced photo emission toward the host
pub struct DisplayDispatcher {
    catalog: Arc<dyn ICatalog>,
    host: Arc<dyn IHostChannel>,
    dispatching: AtomicBool,
}

impl DisplayDispatcher {
    pub fn new(catalog: Arc<dyn ICatalog>, host: Arc<dyn IHostChannel>) -> Self {
        Self {
            catalog,
            host,
            dispatching: AtomicBool::new(false),
        }
    }

    /// One display pass; overlapping invocations are dropped
    pub async fn tick(&self) {
        if self
            .dispatching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Display tick still running, skipping this fire");
            return;
        }

        self.run_tick().await;
        self.dispatching.store(false, Ordering::Release);
    }

    async fn run_tick(&self) {
        for _ in 0..MAX_ADVANCES_PER_TICK {
            let candidate = match self.catalog.next_display_candidate().await {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(error = %e, "Display candidate query failed");
                    return;
                }
            };

            let Some(photo) = candidate else {
                self.emit(&OutboundMessage::UpdateStatus {
                    message: "Waiting for photos to cache...".to_string(),
                })
                .await;
                return;
            };

            match self.read_payload(&photo).await {
                Ok(bytes) => {
                    self.dispatch(photo, bytes).await;
                    return;
                }
                Err(e) => {
                    // A cached row whose payload cannot be read is a bug
                    // (or a crash ghost), not a user-facing error. Clear
                    // it so a later fetch heals it, and advance.
                    warn!(
                        photo_id = %photo.id,
                        error = %format!("{e:#}"),
                        "Cached photo payload unreadable, clearing and advancing"
                    );
                    if let Err(e) = self.catalog.clear_cache(&photo.id).await {
                        warn!(photo_id = %photo.id, error = %e, "Failed to clear ghost payload");
                        return;
                    }
                }
            }
        }
    }

    async fn read_payload(&self, photo: &Photo) -> Result<Vec<u8>> {
        match &photo.cache {
            CachePayload::Blob { bytes, .. } => Ok(bytes.clone()),
            CachePayload::File { path, .. } => tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read cache file {}", path.display())),
            CachePayload::Unset => anyhow::bail!("photo {} has no cache payload", photo.id),
        }
    }

    async fn dispatch(&self, photo: Photo, bytes: Vec<u8>) {
        let message = OutboundMessage::DisplayPhoto {
            id: photo.id.as_str().to_string(),
            image: BASE64.encode(&bytes),
            filename: photo.filename.clone(),
            width: photo.width,
            height: photo.height,
            creation_time: photo.creation_time.timestamp_millis(),
            location_name: photo.location_name.clone(),
        };

        if let Err(e) = self.host.emit(&message).await {
            warn!(photo_id = %photo.id, error = %e, "Display emit failed");
            return;
        }

        debug!(photo_id = %photo.id, bytes = bytes.len(), "Dispatched photo");

        // Dispatch-time marking is authoritative for rotation; the host's
        // later IMAGE_LOADED ack re-marks harmlessly.
        let catalog = Arc::clone(&self.catalog);
        let id = photo.id.clone();
        tokio::spawn(async move {
            if let Err(e) = catalog.mark_viewed(&id, Utc::now()).await {
                debug!(photo_id = %id, error = %e, "View marking failed");
            }
        });
    }

    async fn emit(&self, message: &OutboundMessage) {
        if let Err(e) = self.host.emit(message).await {
            debug!(error = %e, "Host emit failed");
        }
    }
}
