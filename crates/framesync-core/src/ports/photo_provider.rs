//! Photo provider port (driven/secondary port)
//!
//! Uniform adapter interface over a cloud photo backend. The primary
//! implementation targets Microsoft OneDrive via the Graph API, but the
//! trait is provider-agnostic; a deployment selects exactly one provider
//! through the registry at startup.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result`: errors at port boundaries are adapter-specific.
//!   Providers must surface enough detail (well-known message substrings,
//!   wrapped `std::io::Error` / HTTP errors) for the sync controller to
//!   classify failures as permanent or transient.
//! - `PhotoMeta` is a port-level DTO, not a domain entity; the sync
//!   controller maps it to [`Photo`] for catalog upserts.
//! - Delta support is optional. The default implementations bail, and
//!   `supports_delta()` lets callers fall back to `full_scan` without
//!   probing for errors.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::{DeltaToken, Photo, PhotoId, ProviderKey};

/// Lazy byte stream of an original image download
pub type ByteStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// One container to monitor, with its recursion bound
///
/// "Container" is provider-specific: a folder on hierarchical stores, a
/// prefix on flat ones. `depth = -1` means unbounded, `0` means the named
/// container only, `N` means at most N levels below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Provider-specific container identifier
    pub id: String,
    /// Recursion bound; `-1` = unbounded
    #[serde(default = "default_depth")]
    pub depth: i32,
}

fn default_depth() -> i32 {
    -1
}

impl ContainerSpec {
    /// A container scanned without a recursion bound
    pub fn unbounded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depth: -1,
        }
    }
}

/// Uniform photo metadata yielded by every provider
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMeta {
    /// Provider-issued identifier
    pub id: PhotoId,
    /// Original filename
    pub filename: String,
    /// Container the photo was discovered in
    pub container_key: String,
    /// Capture time, or upload time when the backend lacks EXIF data
    pub creation_time: DateTime<Utc>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl PhotoMeta {
    /// Maps this discovery result to a fresh catalog entity
    ///
    /// View state starts unviewed and the cache payload unset; an upsert
    /// of an already-known photo leaves both untouched.
    #[must_use]
    pub fn into_photo(self, provider_key: &ProviderKey) -> Photo {
        Photo {
            id: self.id,
            provider_key: provider_key.clone(),
            container_key: self.container_key,
            filename: self.filename,
            creation_time: self.creation_time,
            width: self.width,
            height: self.height,
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: None,
            last_viewed_at: None,
            cache: crate::domain::CachePayload::Unset,
        }
    }
}

/// Result of one incremental-sync query
#[derive(Debug, Clone)]
pub struct DeltaPage {
    /// Photos added or modified since the supplied token
    pub added_or_modified: Vec<PhotoMeta>,
    /// Photos removed or trashed since the supplied token
    pub deleted_ids: Vec<PhotoId>,
    /// Cursor to persist and reuse on the next cycle
    pub next_token: DeltaToken,
}

/// Port trait for cloud photo backends
///
/// ## Implementation Notes
///
/// - `init` makes one lightweight call that fails fast on
///   permanent-permission errors; it must not enumerate content.
/// - `full_scan` deduplicates by photo id, skips non-image MIME types,
///   and must terminate on cyclic container graphs (visited set).
/// - `download` applies `timeout` per attempt; retries are the caller's
///   concern.
#[async_trait::async_trait]
pub trait IPhotoProvider: Send + Sync {
    /// Acquires credentials and verifies reachability
    async fn init(&self) -> anyhow::Result<()>;

    /// Enumerates all image entries under the configured containers
    async fn full_scan(&self, containers: &[ContainerSpec]) -> anyhow::Result<Vec<PhotoMeta>>;

    /// Opens a lazy byte stream of the original image
    async fn download(&self, id: &PhotoId, timeout: Duration) -> anyhow::Result<ByteStream>;

    /// Human label for logs
    fn name(&self) -> &str;

    /// Whether this backend supports incremental sync
    fn supports_delta(&self) -> bool {
        false
    }

    /// Produces a token corresponding to "now"
    ///
    /// Future `delta` calls with this token enumerate only subsequent
    /// changes.
    async fn delta_start_token(&self) -> anyhow::Result<DeltaToken> {
        anyhow::bail!("provider '{}' does not support delta sync", self.name())
    }

    /// Enumerates changes since `token`
    async fn delta(&self, token: &DeltaToken) -> anyhow::Result<DeltaPage> {
        let _ = token;
        anyhow::bail!("provider '{}' does not support delta sync", self.name())
    }
}
