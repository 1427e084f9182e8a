//! Framesync Engine - cache, sync, and display orchestration
//!
//! Drives the ports defined in `framesync-core`:
//!
//! - [`Engine`] - component wiring, the three recurring timers, inbound
//!   message handling, graceful shutdown
//! - [`CacheEngine`] - periodic cache upkeep: eviction under the byte
//!   budget, batched fetch + transform of new payloads
//! - [`SyncController`] - provider lifecycle, delta/full-scan cycles,
//!   error classification, backoff retries
//! - [`DisplayDispatcher`] - cadenced photo emission to the host
//! - [`ProviderRegistry`] - provider-key to constructor map

pub mod backoff;
pub mod cache;
pub mod classify;
pub mod display;
pub mod engine;
pub mod handle;
pub mod registry;
pub mod sync;
pub mod transform;

pub use backoff::RetrySchedule;
pub use cache::CacheEngine;
pub use classify::{classify, ErrorClass};
pub use display::DisplayDispatcher;
pub use engine::Engine;
pub use handle::ProviderHandle;
pub use registry::{ProviderContext, ProviderRegistry};
pub use sync::SyncController;
