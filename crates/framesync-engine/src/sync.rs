//! Sync controller
//!
//! Drives the provider lifecycle (`initializing -> online <-> offline ->
//! terminal error`), the initial and periodic synchronization cycles, and
//! the reconnect backoff. Every failure passes through the classifier:
//! permanent errors end retrying for good (cached content keeps being
//! served), transient ones restart the backoff schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use framesync_core::config::Config;
use framesync_core::domain::{DeltaToken, Photo, ProviderKey};
use framesync_core::ports::photo_provider::DeltaPage;
use framesync_core::ports::{ConnectionState, ICatalog, IHostChannel, OutboundMessage};

use crate::backoff::RetrySchedule;
use crate::classify::{classify, is_known_transient, is_stale_delta_token, ErrorClass};
use crate::handle::ProviderHandle;

/// Provider lifecycle and synchronization driver
pub struct SyncController {
    catalog: Arc<dyn ICatalog>,
    provider: Arc<ProviderHandle>,
    host: Arc<dyn IHostChannel>,
    config: Config,
    provider_key: ProviderKey,
    state: Mutex<ConnectionState>,
    retry: RetrySchedule,
    terminal: AtomicBool,
    syncing: AtomicBool,
    shutdown: CancellationToken,
}

impl SyncController {
    pub fn new(
        catalog: Arc<dyn ICatalog>,
        provider: Arc<ProviderHandle>,
        host: Arc<dyn IHostChannel>,
        config: Config,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let provider_key = ProviderKey::new(config.provider_key.clone())?;
        let retry = RetrySchedule::new(config.max_auth_backoff(), config.max_auth_retries);

        Ok(Self {
            catalog,
            provider,
            host,
            config,
            provider_key,
            state: Mutex::new(ConnectionState::Initializing),
            retry,
            terminal: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
            shutdown,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Whether a permanent error ended the retry lifecycle
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Whether a reconnect is currently scheduled
    pub fn retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// One provider initialization attempt during engine startup
    ///
    /// Failure never prevents the engine from starting: the display path
    /// keeps serving cached content while retries run in the background.
    pub async fn startup(self: &Arc<Self>) {
        self.set_state(ConnectionState::Initializing, "connecting to provider")
            .await;

        match self.provider.provider().init().await {
            Ok(()) => self.after_successful_init().await,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Provider initialization failed");
                self.handle_provider_error(e, "provider initialization failed")
                    .await;
            }
        }
    }

    async fn after_successful_init(self: &Arc<Self>) {
        self.provider.set_ready(true);
        self.retry.reset();
        let name = self.provider.provider().name().to_string();
        self.set_state(ConnectionState::Online, &format!("connected to {name}"))
            .await;

        if let Err(e) = self.sync_once().await {
            self.handle_sync_error(e).await;
        }
    }

    /// Routes a failed init through the classifier
    async fn handle_provider_error(self: &Arc<Self>, err: anyhow::Error, what: &str) {
        match classify(&err) {
            ErrorClass::Permanent => self.enter_terminal_error(what, err).await,
            ErrorClass::Transient => {
                debug!(
                    recognized = is_known_transient(&err),
                    "Transient provider error, will retry"
                );
                self.go_offline().await;
                self.schedule_retry();
            }
        }
    }

    /// Routes a failed sync: transient failures mark the provider
    /// uninitialized and restart the backoff from zero
    async fn handle_sync_error(self: &Arc<Self>, err: anyhow::Error) {
        match classify(&err) {
            ErrorClass::Permanent => self.enter_terminal_error("synchronization failed", err).await,
            ErrorClass::Transient => {
                warn!(error = %format!("{err:#}"), "Sync failed with a transient error");
                self.retry.reset();
                self.go_offline().await;
                self.schedule_retry();
            }
        }
    }

    /// Permanent failure: surface a terminal ERROR and stop retrying
    ///
    /// Cached content keeps being served; only provider traffic ends.
    async fn enter_terminal_error(&self, what: &str, err: anyhow::Error) {
        self.terminal.store(true, Ordering::Release);
        self.provider.set_ready(false);
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = ConnectionState::Error;

        error!(error = %format!("{err:#}"), "{what}; not retrying");

        self.emit(&OutboundMessage::Error {
            message: format!("{what}: {err}"),
            details: Some(format!("{err:#}")),
        })
        .await;
        self.emit(&OutboundMessage::ConnectionStatus {
            status: ConnectionState::Error,
            message: what.to_string(),
        })
        .await;
    }

    async fn go_offline(&self) {
        self.provider.set_ready(false);
        let cached = self.catalog.cached_count().await.unwrap_or(0);
        self.set_state(
            ConnectionState::Offline,
            &format!("{cached} cached photos"),
        )
        .await;
    }

    /// Schedules one background reconnect attempt
    ///
    /// A no-op when a retry is already pending, when the controller is
    /// terminal, or when the retry cap is exhausted.
    pub fn schedule_retry(self: &Arc<Self>) {
        if self.terminal.load(Ordering::Acquire) {
            return;
        }
        if self.retry.exhausted() {
            info!(
                attempts = self.retry.attempts(),
                "Retry cap exhausted, staying offline"
            );
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.emit(&OutboundMessage::ConnectionStatus {
                    status: ConnectionState::Offline,
                    message: "max retries exceeded".to_string(),
                })
                .await;
            });
            return;
        }
        if !self.retry.try_begin() {
            debug!("Reconnect already scheduled");
            return;
        }

        let delay = self.retry.next_delay();
        let attempt = self.retry.record_attempt();
        info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = this.shutdown.cancelled() => {
                    this.retry.end_pending();
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            this.retry.end_pending();
            this.run_retry_attempt(attempt).await;
        });
    }

    async fn run_retry_attempt(self: &Arc<Self>, attempt: u32) {
        if self.terminal.load(Ordering::Acquire) {
            return;
        }

        self.set_state(
            ConnectionState::Retrying,
            &format!("reconnect attempt {attempt}"),
        )
        .await;

        match self.provider.provider().init().await {
            Ok(()) => self.after_successful_init().await,
            Err(e) => {
                warn!(attempt, error = %format!("{e:#}"), "Reconnect attempt failed");
                self.handle_provider_error(e, "provider initialization failed")
                    .await;
            }
        }
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Periodic timer callback; guarded against overlapping fires
    pub async fn periodic_tick(self: &Arc<Self>) {
        if self.terminal.load(Ordering::Acquire) {
            return;
        }
        if !self.provider.is_ready() {
            debug!("Provider not ready, skipping periodic sync");
            return;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync still running, skipping this fire");
            return;
        }

        let result = self.sync_once().await;
        self.syncing.store(false, Ordering::Release);

        if let Err(e) = result {
            self.handle_sync_error(e).await;
        }
    }

    /// One synchronization cycle: delta when possible, full scan otherwise
    pub async fn sync_once(&self) -> Result<()> {
        let provider = self.provider.provider();
        let token_key = format!("delta_token:{}", self.provider_key);

        if provider.supports_delta() {
            if let Some(stored) = self.catalog.get_setting(&token_key).await? {
                let token = DeltaToken::new(stored)?;
                match provider.delta(&token).await {
                    Ok(page) => return self.apply_delta(page, &token_key).await,
                    Err(e) if is_stale_delta_token(&e) => {
                        warn!("Persisted delta token rejected, falling back to full scan");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.full_scan_cycle(&token_key).await
    }

    async fn apply_delta(&self, page: DeltaPage, token_key: &str) -> Result<()> {
        info!(
            added_or_modified = page.added_or_modified.len(),
            deleted = page.deleted_ids.len(),
            "Applying delta"
        );

        let photos: Vec<Photo> = page
            .added_or_modified
            .into_iter()
            .map(|meta| meta.into_photo(&self.provider_key))
            .collect();
        self.catalog.upsert_photos(&photos).await?;

        for id in &page.deleted_ids {
            self.catalog.delete_photo(id).await?;
        }

        // Token last: a crash mid-apply replays against the old cursor,
        // which the idempotent upserts absorb.
        self.catalog
            .put_setting(token_key, page.next_token.as_str())
            .await?;

        Ok(())
    }

    async fn full_scan_cycle(&self, token_key: &str) -> Result<()> {
        let provider = self.provider.provider();

        // Cursor taken before the scan: changes landing mid-scan are
        // replayed by the next delta instead of being lost.
        let start_token = if provider.supports_delta() {
            Some(provider.delta_start_token().await?)
        } else {
            None
        };

        let metas = provider.full_scan(&self.config.containers).await?;
        info!(photos = metas.len(), "Full scan completed, upserting");

        let photos: Vec<Photo> = metas
            .into_iter()
            .map(|meta| meta.into_photo(&self.provider_key))
            .collect();
        self.catalog.upsert_photos(&photos).await?;

        if let Some(token) = start_token {
            self.catalog
                .put_setting(token_key, token.as_str())
                .await?;
        }

        Ok(())
    }

    // ========================================================================
    // Status plumbing
    // ========================================================================

    async fn set_state(&self, state: ConnectionState, message: &str) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
        self.emit(&OutboundMessage::ConnectionStatus {
            status: state,
            message: message.to_string(),
        })
        .await;
    }

    async fn emit(&self, message: &OutboundMessage) {
        if let Err(e) = self.host.emit(message).await {
            debug!(error = %e, "Host emit failed");
        }
    }
}
