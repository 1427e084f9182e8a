//! Host channel port and message types
//!
//! The engine exposes a narrow message interface to the process-level
//! lifecycle host: a handful of inbound commands and a small set of
//! outbound notifications. Payload bytes cross the boundary as base64
//! strings; that is a wire-format decision of the host protocol.
//!
//! ## Design Notes
//!
//! - Messages are internally tagged (`"type"`) serde enums so the host
//!   can switch on one field.
//! - `emit` is best-effort from the engine's point of view: a failed
//!   status emission is logged by the caller and never propagated into
//!   the sync or display paths.

use serde::{Deserialize, Serialize};

/// Inbound commands from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Initialize the engine with the given configuration
    #[serde(rename = "INIT")]
    Init { config: serde_json::Value },

    /// Acknowledgement that the latest emitted photo has been rendered
    #[serde(rename = "IMAGE_LOADED")]
    ImageLoaded { id: String },

    /// Request an immediate `CACHE_STATS` emission
    #[serde(rename = "GET_CACHE_STATS")]
    GetCacheStats,
}

/// Connection lifecycle state reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Initializing,
    Online,
    Offline,
    Retrying,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Initializing => "initializing",
            ConnectionState::Online => "online",
            ConnectionState::Offline => "offline",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Cache health snapshot, camelCase on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: f64,
    pub usage_percent: f64,
    pub cached_count: u64,
    pub total_count: u64,
    pub cache_percent: f64,
    pub consecutive_failures: u32,
    pub is_offline: bool,
}

/// Outbound notifications to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// The next photo to render
    #[serde(rename = "DISPLAY_PHOTO")]
    DisplayPhoto {
        id: String,
        /// Base64-encoded display-ready image bytes
        image: String,
        filename: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        /// Epoch milliseconds
        creation_time: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        location_name: Option<String>,
    },

    /// Human-readable one-liner
    #[serde(rename = "UPDATE_STATUS")]
    UpdateStatus { message: String },

    /// Connection lifecycle change
    #[serde(rename = "CONNECTION_STATUS")]
    ConnectionStatus {
        status: ConnectionState,
        message: String,
    },

    /// Terminal error surface
    #[serde(rename = "ERROR")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },

    /// Cache health report
    #[serde(rename = "CACHE_STATS")]
    CacheStats(CacheStatsSnapshot),
}

/// Port trait for the outbound host message channel
#[async_trait::async_trait]
pub trait IHostChannel: Send + Sync {
    /// Delivers one message to the host
    async fn emit(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
