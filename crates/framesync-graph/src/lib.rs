//! Framesync Graph - Microsoft Graph photo provider
//!
//! Implements the `IPhotoProvider` port from `framesync-core` against the
//! OneDrive surface of the Microsoft Graph API:
//!
//! - [`GraphClient`] - typed HTTP client with auth headers and a
//!   test-overridable base URL
//! - [`GraphPhotoProvider`] - scan / delta / download adapter
//! - [`TokenFile`] - read-only loader for externally-managed OAuth tokens

pub mod client;
pub mod provider;
pub mod token;

pub use client::GraphClient;
pub use provider::GraphPhotoProvider;
pub use token::TokenFile;
