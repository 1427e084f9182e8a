//! Shared provider handle
//!
//! The cache engine and the sync controller both consult the provider,
//! but only the sync controller decides whether it is usable. The handle
//! pairs the provider with a readiness flag: set after a successful
//! `init()`, cleared when a sync fails with a transient error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framesync_core::ports::IPhotoProvider;

/// A provider plus its readiness state
pub struct ProviderHandle {
    provider: Arc<dyn IPhotoProvider>,
    ready: AtomicBool,
}

impl ProviderHandle {
    /// Wraps a provider, initially not ready
    pub fn new(provider: Arc<dyn IPhotoProvider>) -> Self {
        Self {
            provider,
            ready: AtomicBool::new(false),
        }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &Arc<dyn IPhotoProvider> {
        &self.provider
    }

    /// Whether authentication has succeeded and syncs may run
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Updates the readiness flag
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }
}
