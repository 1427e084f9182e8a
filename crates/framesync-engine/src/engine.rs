//! Engine wiring and lifecycle
//!
//! Builds the components from a normalized configuration, runs the single
//! startup init attempt, and owns the three recurring timers (display,
//! cache tick, periodic sync). Shutdown cancels the shared token, which
//! both stops the timer loops and aborts any in-flight tick work; a
//! dropped download leaves its photo uncached, never half-cached.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use framesync_core::config::Config;
use framesync_core::domain::PhotoId;
use framesync_core::ports::{ICatalog, IHostChannel, InboundMessage};

use crate::cache::{CacheEngine, CACHE_TICK_INTERVAL};
use crate::display::{DisplayDispatcher, FIRST_DISPLAY_DELAY};
use crate::handle::ProviderHandle;
use crate::registry::ProviderRegistry;
use crate::sync::SyncController;

/// The assembled engine
pub struct Engine {
    catalog: Arc<dyn ICatalog>,
    sync: Arc<SyncController>,
    cache: Arc<CacheEngine>,
    display: Arc<DisplayDispatcher>,
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Builds the components and starts the recurring timers
    ///
    /// The provider init attempt runs after the display and cache timers
    /// are up, so cached content is served even when the provider is
    /// unreachable at boot. Returns an error only for configuration
    /// problems (unknown provider key, invalid key syntax); in that case
    /// no timers have been started.
    pub async fn start(
        config: Config,
        catalog: Arc<dyn ICatalog>,
        host: Arc<dyn IHostChannel>,
        registry: &ProviderRegistry,
    ) -> Result<Arc<Self>> {
        let config = config.normalized();

        let provider = registry.build(&config)?;
        let provider = Arc::new(ProviderHandle::new(provider));
        let shutdown = CancellationToken::new();

        let sync = Arc::new(SyncController::new(
            Arc::clone(&catalog),
            Arc::clone(&provider),
            Arc::clone(&host),
            config.clone(),
            shutdown.clone(),
        )?);
        let cache = Arc::new(CacheEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&provider),
            Arc::clone(&host),
            config.clone(),
        ));
        let display = Arc::new(DisplayDispatcher::new(
            Arc::clone(&catalog),
            Arc::clone(&host),
        ));

        let engine = Arc::new(Self {
            catalog,
            sync,
            cache,
            display,
            shutdown,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        });

        engine.spawn_display_timer(config.update_interval()).await;
        engine.spawn_cache_timer().await;

        // One synchronous init attempt; failures fall into the retry
        // lifecycle without blocking startup any further.
        engine.sync.startup().await;

        engine.spawn_sync_timer(config.scan_interval()).await;

        info!("Engine started");
        Ok(engine)
    }

    async fn spawn_display_timer(&self, period: std::time::Duration) {
        let display = Arc::clone(&self.display);
        let token = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            // Prompt first emission shortly after startup.
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(FIRST_DISPLAY_DELAY) => {}
            }
            tokio::select! {
                _ = token.cancelled() => return,
                _ = display.tick() => {}
            }

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = display.tick() => {}
                        }
                    }
                }
            }
        });

        self.tasks.lock().await.push(handle);
    }

    async fn spawn_cache_timer(&self) {
        let cache = Arc::clone(&self.cache);
        let token = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CACHE_TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = cache.tick() => {}
                        }
                    }
                }
            }
        });

        self.tasks.lock().await.push(handle);
    }

    async fn spawn_sync_timer(&self, period: std::time::Duration) {
        let sync = Arc::clone(&self.sync);
        let token = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Startup already synced; the first periodic fire waits a full
            // period.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = sync.periodic_tick() => {}
                        }
                    }
                }
            }
        });

        self.tasks.lock().await.push(handle);
    }

    /// Handles one inbound host message
    pub async fn handle_message(&self, message: InboundMessage) {
        match message {
            InboundMessage::Init { .. } => {
                warn!("Engine already initialized, ignoring INIT");
            }
            InboundMessage::ImageLoaded { id } => match PhotoId::new(id) {
                Ok(id) => {
                    // Render acks re-mark; the monotonic guard keeps the
                    // double write harmless for rotation order.
                    if let Err(e) = self.catalog.mark_viewed(&id, Utc::now()).await {
                        debug!(photo_id = %id, error = %e, "View marking from ack failed");
                    }
                }
                Err(e) => warn!(error = %e, "IMAGE_LOADED carried an unusable id"),
            },
            InboundMessage::GetCacheStats => self.cache.emit_stats().await,
        }
    }

    /// The sync controller, for state inspection
    pub fn sync(&self) -> &Arc<SyncController> {
        &self.sync
    }

    /// The cache engine, for stats inspection
    pub fn cache(&self) -> &Arc<CacheEngine> {
        &self.cache
    }

    /// Cancels the timers and waits for them to wind down
    ///
    /// In-flight downloads are dropped at the cancellation point; their
    /// photos stay uncached and are retried after the next start.
    pub async fn shutdown(&self) {
        info!("Engine shutting down");
        self.shutdown.cancel();

        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Timer task ended abnormally");
                }
            }
        }
    }
}
