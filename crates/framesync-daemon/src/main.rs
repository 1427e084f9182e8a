//! Framesync Daemon - photo engine host process
//!
//! Speaks the engine's message protocol over stdio: JSON lines in on
//! stdin (`INIT`, `IMAGE_LOADED`, `GET_CACHE_STATS`), JSON lines out on
//! stdout (`DISPLAY_PHOTO`, `CONNECTION_STATUS`, ...). Logs go to stderr
//! so stdout stays a clean message channel.
//!
//! # Lifecycle
//!
//! An optional YAML config file path may be passed as the first
//! argument; the `INIT` message's config is overlaid on top of it. The
//! engine starts on `INIT` and runs until stdin closes or a SIGTERM /
//! SIGINT arrives, at which point the timers are cancelled and the
//! catalog closed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use framesync_catalog::{CatalogPool, SqliteCatalog};
use framesync_core::config::Config;
use framesync_core::ports::{ICatalog, IHostChannel, InboundMessage, OutboundMessage};
use framesync_engine::{Engine, ProviderRegistry};
use framesync_graph::GraphPhotoProvider;

// ============================================================================
// Stdio host channel
// ============================================================================

/// Host channel writing one JSON object per line to stdout
struct StdioHostChannel {
    stdout: tokio::sync::Mutex<tokio::io::Stdout>,
}

impl StdioHostChannel {
    fn new() -> Self {
        Self {
            stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait::async_trait]
impl IHostChannel for StdioHostChannel {
    async fn emit(&self, message: &OutboundMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Registers every provider this binary links
fn build_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.register("graph", |ctx| {
        let token_path = ctx
            .token_path
            .clone()
            .or_else(|| {
                ctx.provider_config
                    .get("token_path")
                    .and_then(|v| v.as_str())
                    .map(PathBuf::from)
            })
            .context("graph provider requires token_path")?;
        Ok(Arc::new(GraphPhotoProvider::new(token_path)) as _)
    });

    registry
}

/// Opens the catalog and starts the engine for one INIT payload
async fn start_engine(
    file_config: &Config,
    init_config: &serde_json::Value,
    host: Arc<dyn IHostChannel>,
) -> Result<(CatalogPool, Arc<Engine>)> {
    let config = file_config
        .merged_with(init_config)
        .context("INIT carried an undecodable config")?
        .normalized();

    let pool = CatalogPool::open(&config.catalog_path()).await?;
    let catalog: Arc<dyn ICatalog> =
        Arc::new(SqliteCatalog::new(pool.pool().clone(), config.sort_mode()));

    let registry = build_registry();
    let engine = Engine::start(config, catalog, host, &registry).await?;

    Ok((pool, engine))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let file_config = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "Loading configuration file");
            Config::load_or_default(&path)
        }
        None => Config::default(),
    };

    let host: Arc<dyn IHostChannel> = Arc::new(StdioHostChannel::new());

    let mut engine: Option<(CatalogPool, Arc<Engine>)> = None;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    info!("Daemon ready, waiting for messages");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
                break;
            }
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        handle_line(line, &file_config, &host, &mut engine).await;
                    }
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "stdin read failed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    if let Some((pool, engine)) = engine {
        engine.shutdown().await;
        pool.close().await;
    }

    info!("Daemon stopped");
    Ok(())
}

async fn handle_line(
    line: &str,
    file_config: &Config,
    host: &Arc<dyn IHostChannel>,
    engine: &mut Option<(CatalogPool, Arc<Engine>)>,
) {
    let message: InboundMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Dropping unparseable inbound message");
            return;
        }
    };

    if let Some((_, running)) = engine.as_ref() {
        running.handle_message(message).await;
        return;
    }

    match message {
        InboundMessage::Init { config } => {
            match start_engine(file_config, &config, Arc::clone(host)).await {
                Ok(started) => *engine = Some(started),
                Err(e) => {
                    // Configuration errors are terminal: surface them and
                    // leave the timers unstarted. A corrected INIT may
                    // still follow.
                    error!(error = %format!("{e:#}"), "Engine start failed");
                    let emit = host
                        .emit(&OutboundMessage::Error {
                            message: format!("engine start failed: {e}"),
                            details: Some(format!("{e:#}")),
                        })
                        .await;
                    if let Err(e) = emit {
                        debug!(error = %e, "Error emit failed");
                    }
                }
            }
        }
        _ => warn!("Message received before INIT, dropping"),
    }
}
