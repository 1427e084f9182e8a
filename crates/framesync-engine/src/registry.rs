//! Provider registry
//!
//! A startup-time map from provider-key string to a constructor closure.
//! The daemon registers the providers it links; the engine resolves the
//! configured key once during startup, and an unknown key is a
//! configuration error that prevents the timers from starting.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use framesync_core::config::Config;
use framesync_core::ports::IPhotoProvider;

/// Provider-facing slice of the configuration
///
/// The engine does not interpret any of it; each provider reads what it
/// needs.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Opaque provider-specific settings
    pub provider_config: serde_json::Map<String, serde_json::Value>,
    /// Credential file location, if configured
    pub credentials_path: Option<PathBuf>,
    /// OAuth token file location, if configured
    pub token_path: Option<PathBuf>,
}

impl ProviderContext {
    /// Extracts the provider-facing fields from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider_config: config.provider_config.clone(),
            credentials_path: config.credentials_path.clone(),
            token_path: config.token_path.clone(),
        }
    }
}

type ProviderFactory = Box<dyn Fn(&ProviderContext) -> Result<Arc<dyn IPhotoProvider>> + Send + Sync>;

/// Map from provider key to constructor
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `key`, replacing any previous one
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderContext) -> Result<Arc<dyn IPhotoProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Box::new(factory));
    }

    /// Builds the provider selected by `config.provider_key`
    pub fn build(&self, config: &Config) -> Result<Arc<dyn IPhotoProvider>> {
        let factory = self.factories.get(&config.provider_key).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown provider key '{}' (registered: {})",
                config.provider_key,
                self.keys().join(", ")
            )
        })?;
        factory(&ProviderContext::from_config(config))
    }

    /// Registered provider keys, sorted for stable messages
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
