//! Port definitions (traits for adapters)
//!
//! Driven (secondary) ports in the hexagonal architecture: the catalog
//! store, cloud photo providers, and the host message channel. Adapter
//! crates implement these; the engine crate drives them.

pub mod catalog;
pub mod host_channel;
pub mod photo_provider;

pub use catalog::ICatalog;
pub use host_channel::{
    CacheStatsSnapshot, ConnectionState, IHostChannel, InboundMessage, OutboundMessage,
};
pub use photo_provider::{ByteStream, ContainerSpec, DeltaPage, IPhotoProvider, PhotoMeta};
