//! Engine configuration
//!
//! Typed configuration mapping the host's INIT payload (JSON) and the
//! optional on-disk config file (YAML). Every field has a default;
//! invalid values fall back to their defaults with a warning rather than
//! failing startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ports::photo_provider::ContainerSpec;

/// Display rotation order
///
/// In every mode, unviewed photos precede viewed ones, so a full display
/// cycle shows each cached photo once before any repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Lexicographic by photo id
    Sequential,
    /// Unbiased random within each class
    Random,
    /// Descending creation time
    Newest,
    /// Ascending creation time
    Oldest,
}

impl SortMode {
    /// Parses the configuration string form; `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(SortMode::Sequential),
            "random" => Some(SortMode::Random),
            "newest" => Some(SortMode::Newest),
            "oldest" => Some(SortMode::Oldest),
            _ => None,
        }
    }
}

/// Floor for the display cadence (ms)
pub const MIN_UPDATE_INTERVAL_MS: u64 = 10_000;
/// Allowed range for the auth retry backoff ceiling (ms)
pub const AUTH_BACKOFF_RANGE_MS: (u64, u64) = (5_000, 600_000);

const DEFAULT_UPDATE_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SCAN_INTERVAL_MS: u64 = 6 * 60 * 60 * 1000;
const DEFAULT_MAX_CACHE_MB: u64 = 200;
const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_MAX_AUTH_BACKOFF_MS: u64 = 120_000;
const DEFAULT_DISPLAY_WIDTH: u32 = 1920;
const DEFAULT_DISPLAY_HEIGHT: u32 = 1080;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which registered provider to use
    pub provider_key: String,
    /// Opaque map forwarded to the chosen provider
    pub provider_config: serde_json::Map<String, serde_json::Value>,
    /// Containers to monitor
    pub containers: Vec<ContainerSpec>,
    /// Target transform width in pixels
    pub display_width: u32,
    /// Target transform height in pixels
    pub display_height: u32,
    /// Display cadence in milliseconds; floored at 10 000
    pub update_interval: u64,
    /// Sync cadence in milliseconds
    pub scan_interval: u64,
    /// Cache byte budget in MiB
    pub max_cache_mb: u64,
    /// JPEG re-encode quality, 1-100
    pub jpeg_quality: u8,
    /// Store transformed payloads in-catalog instead of on disk
    pub use_blob_storage: bool,
    /// `sequential | random | newest | oldest`
    pub sort_mode: String,
    /// Cap on provider auth retries; `None` = unbounded
    pub max_auth_retries: Option<u32>,
    /// Backoff ceiling for auth retries (ms), clamped to 5 000-600 000
    pub max_auth_backoff_ms: u64,
    /// Provider credential file location (read-only for the engine)
    pub credentials_path: Option<PathBuf>,
    /// OAuth token file location (read-only for the engine)
    pub token_path: Option<PathBuf>,
    /// Catalog database file; platform data dir when unset
    pub catalog_path: Option<PathBuf>,
    /// Cache directory for file-mode payloads; platform data dir when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_key: "graph".to_string(),
            provider_config: serde_json::Map::new(),
            containers: vec![ContainerSpec::unbounded("root")],
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            update_interval: DEFAULT_UPDATE_INTERVAL_MS,
            scan_interval: DEFAULT_SCAN_INTERVAL_MS,
            max_cache_mb: DEFAULT_MAX_CACHE_MB,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            use_blob_storage: true,
            sort_mode: "sequential".to_string(),
            max_auth_retries: None,
            max_auth_backoff_ms: DEFAULT_MAX_AUTH_BACKOFF_MS,
            credentials_path: None,
            token_path: None,
            catalog_path: None,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Parse configuration from an INIT message payload
    pub fn from_json(value: &serde_json::Value) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Overlay top-level keys from an INIT payload onto this configuration
    ///
    /// Keys present in `overlay` replace the corresponding file values;
    /// absent keys keep the file values.
    pub fn merged_with(&self, overlay: &serde_json::Value) -> anyhow::Result<Self> {
        let mut base = serde_json::to_value(self)?;
        if let (Some(base_map), Some(overlay_map)) = (base.as_object_mut(), overlay.as_object()) {
            for (key, value) in overlay_map {
                base_map.insert(key.clone(), value.clone());
            }
        }
        Self::from_json(&base)
    }

    /// Clamp invalid values back to their defaults, warning for each
    ///
    /// Startup always runs configuration through this pass; the returned
    /// value is safe to use without further validation.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.update_interval < MIN_UPDATE_INTERVAL_MS {
            tracing::warn!(
                update_interval = self.update_interval,
                minimum = MIN_UPDATE_INTERVAL_MS,
                "update_interval below minimum, clamping"
            );
            self.update_interval = MIN_UPDATE_INTERVAL_MS;
        }
        if self.scan_interval == 0 {
            tracing::warn!("scan_interval must be positive, using default");
            self.scan_interval = DEFAULT_SCAN_INTERVAL_MS;
        }
        if self.max_cache_mb == 0 {
            tracing::warn!("max_cache_mb must be positive, using default");
            self.max_cache_mb = DEFAULT_MAX_CACHE_MB;
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            tracing::warn!(
                jpeg_quality = self.jpeg_quality,
                "jpeg_quality outside 1-100, using default"
            );
            self.jpeg_quality = DEFAULT_JPEG_QUALITY;
        }
        if SortMode::parse(&self.sort_mode).is_none() {
            tracing::warn!(sort_mode = %self.sort_mode, "unknown sort_mode, using sequential");
            self.sort_mode = "sequential".to_string();
        }
        let (backoff_min, backoff_max) = AUTH_BACKOFF_RANGE_MS;
        if self.max_auth_backoff_ms < backoff_min || self.max_auth_backoff_ms > backoff_max {
            tracing::warn!(
                max_auth_backoff_ms = self.max_auth_backoff_ms,
                "max_auth_backoff_ms outside allowed range, clamping"
            );
            self.max_auth_backoff_ms = self.max_auth_backoff_ms.clamp(backoff_min, backoff_max);
        }
        if self.display_width == 0 {
            tracing::warn!("display_width must be positive, using default");
            self.display_width = DEFAULT_DISPLAY_WIDTH;
        }
        if self.display_height == 0 {
            tracing::warn!("display_height must be positive, using default");
            self.display_height = DEFAULT_DISPLAY_HEIGHT;
        }
        if self.containers.is_empty() {
            tracing::warn!("no containers configured, monitoring provider root");
            self.containers = vec![ContainerSpec::unbounded("root")];
        }
        self
    }

    /// The parsed sort mode; call after [`Config::normalized`]
    #[must_use]
    pub fn sort_mode(&self) -> SortMode {
        SortMode::parse(&self.sort_mode).unwrap_or(SortMode::Sequential)
    }

    /// Display cadence as a [`Duration`]
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval)
    }

    /// Sync cadence as a [`Duration`]
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval)
    }

    /// Cache byte budget in bytes
    #[must_use]
    pub fn max_cache_bytes(&self) -> u64 {
        self.max_cache_mb * 1024 * 1024
    }

    /// Auth retry backoff ceiling as a [`Duration`]
    #[must_use]
    pub fn max_auth_backoff(&self) -> Duration {
        Duration::from_millis(self.max_auth_backoff_ms)
    }

    /// Catalog database path, defaulting under the platform data dir
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("framesync")
                .join("catalog.db")
        })
    }

    /// File-mode cache directory, defaulting under the platform data dir
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("framesync")
                .join("cache")
        })
    }
}
