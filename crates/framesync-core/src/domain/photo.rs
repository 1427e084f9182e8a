//! The Photo entity and its cache payload states

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{PhotoId, ProviderKey};

/// Local cache state of one photo
///
/// At most one payload form is ever populated. The catalog schema enforces
/// the same exclusivity with column checks, so the two forms cannot
/// co-exist even across a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachePayload {
    /// No local payload; the photo is a fetch candidate
    Unset,
    /// Display-ready payload stored in-catalog
    Blob {
        bytes: Vec<u8>,
        mime_type: String,
        size_bytes: u64,
        cached_at: DateTime<Utc>,
    },
    /// Payload stored on the filesystem (pass-through / legacy mode)
    File {
        path: PathBuf,
        size_bytes: u64,
        cached_at: DateTime<Utc>,
    },
}

impl CachePayload {
    /// Whether any payload form is populated
    #[must_use]
    pub fn is_cached(&self) -> bool {
        !matches!(self, CachePayload::Unset)
    }

    /// Payload size in bytes; zero when unset
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        match self {
            CachePayload::Unset => 0,
            CachePayload::Blob { size_bytes, .. } | CachePayload::File { size_bytes, .. } => {
                *size_bytes
            }
        }
    }
}

/// A single cloud-originated image tracked by the engine
///
/// Identity (`id`) is provider-supplied and never minted locally. Metadata
/// comes from provider discovery; view state is advanced by the display
/// path; cache state is owned by the cache engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Provider-issued identifier, unique across the deployment
    pub id: PhotoId,
    /// Which provider owns this photo
    pub provider_key: ProviderKey,
    /// Folder / prefix the photo was discovered in
    pub container_key: String,
    /// Original filename as reported by the provider
    pub filename: String,
    /// Capture time when the provider knows it, upload time otherwise
    pub creation_time: DateTime<Utc>,
    /// Pre-transform pixel width, if the provider supplied it
    pub width: Option<u32>,
    /// Pre-transform pixel height, if the provider supplied it
    pub height: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Resolved place name, when an external geocoder filled it in
    pub location_name: Option<String>,
    /// Last time this photo was dispatched for display; `None` = never
    pub last_viewed_at: Option<DateTime<Utc>>,
    /// Local cache state
    pub cache: CachePayload,
}

impl Photo {
    /// Whether this photo currently has a display-ready payload
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.is_cached()
    }
}
