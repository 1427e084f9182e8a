//! Framesync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal core of the photo-frame sync engine:
//! - Domain entities (Photo, cache payload forms)
//! - Typed configuration with warning-based fallbacks
//! - Port definitions (traits for the catalog, photo providers, and the
//!   host message channel)

pub mod config;
pub mod domain;
pub mod ports;
