// =============================================================================
// ShadowPips — Main Entry Point
// =============================================================================
//
// Periodically pulls a candle series and an order feed, derives the moving
// average and Bollinger bands, and publishes the combined chart bundle over
// HTTP and WebSocket for the chart front-end.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod indicators;
mod market_data;
mod refresh;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{FeedClient, HttpOrderFeed, HttpSeriesSource};
use crate::refresh::RefreshCycle;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "shadowpips.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("ShadowPips chart service starting up");

    let config_path =
        std::env::var("SHADOWPIPS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(url) = std::env::var("SHADOWPIPS_SERIES_URL") {
        config.series_url = url;
    }
    if let Ok(url) = std::env::var("SHADOWPIPS_ORDERS_URL") {
        config.orders_url = url;
    }
    if let Ok(addr) = std::env::var("SHADOWPIPS_BIND_ADDR") {
        config.bind_addr = addr;
    }

    config.validate().context("refusing to start with invalid config")?;

    info!(
        series_url = %config.series_url,
        orders_url = %config.orders_url,
        interval_secs = config.refresh_interval_secs,
        window = config.window,
        "Configured chart feeds"
    );

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let client = Arc::new(FeedClient::new(config.fetch_timeout())?);
    let series = Arc::new(HttpSeriesSource::new(client.clone(), config.series_url.clone()));
    let orders = Arc::new(HttpOrderFeed::new(client, config.orders_url.clone()));
    let state = Arc::new(AppState::new());

    // ── 3. Refresh cycle ─────────────────────────────────────────────────
    let cycle = Arc::new(
        RefreshCycle::new(series, orders, state.clone(), config.cycle_settings())
            .context("invalid indicator settings")?,
    );
    tokio::spawn(cycle.run(config.refresh_interval()));

    // ── 4. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    let app = api::rest::router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("ShadowPips shut down complete.");
    Ok(())
}
