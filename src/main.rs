// =============================================================================
// Candlevault — Main Entry Point
// =============================================================================
//
// Boot order matters: storage and caches come up first, the live buffer is
// seeded from stored daily history, then the ticker stream, API server, and
// background refresh/training loops are spawned.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod cache;
mod features;
mod freshness;
mod history;
mod indicators;
mod live;
mod live_stream;
mod merge;
mod runtime_config;
mod storage;
mod training;
mod types;

use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;
use crate::types::Timeframe;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║         Candlevault Data Service — Starting Up           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path = std::env::var("CANDLEVAULT_CONFIG")
        .unwrap_or_else(|_| "candlevault_config.json".into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(path = %config_path, error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("CANDLEVAULT_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = vec!["BTC".into(), "SOL".into(), "TAO".into(), "WIF".into()];
    }
    if let Ok(dir) = std::env::var("CANDLEVAULT_DATA_DIR") {
        if !dir.trim().is_empty() {
            config.data_dir = dir.trim().to_string();
        }
    }

    info!(symbols = ?config.symbols, "Tracked symbols");
    info!(
        data_dir = %config.data_dir,
        quote_asset = %config.quote_asset,
        "Storage & upstream configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Seed live buffers from stored daily history ───────────────────
    live_stream::warmup(&state).await;

    // ── 4. Spawn the live ticker stream ──────────────────────────────────
    let stream_state = state.clone();
    tokio::spawn(async move {
        loop {
            let (symbols, quote_asset, ws_base_url) = {
                let cfg = stream_state.runtime_config.read();
                (
                    cfg.symbols.clone(),
                    cfg.quote_asset.clone(),
                    cfg.ws_base_url.clone(),
                )
            };
            if let Err(e) =
                live_stream::run_ticker_stream(&symbols, &quote_asset, &ws_base_url, &stream_state)
                    .await
            {
                error!(error = %e, "Ticker stream error — reconnecting in 5s");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });

    // ── 5. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr =
        std::env::var("CANDLEVAULT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    // ── 6. Scheduled series refresh ──────────────────────────────────────
    let refresh_state = state.clone();
    tokio::spawn(async move {
        let (hours, pause_ms) = {
            let cfg = refresh_state.runtime_config.read();
            (cfg.refresh_interval_hours.max(1), cfg.refresh_pause_ms)
        };
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        // Data was just synced during warmup; the first scheduled pass runs
        // one full interval later.
        interval.tick().await;

        loop {
            interval.tick().await;
            info!("Scheduled refresh starting");

            let symbols = refresh_state.runtime_config.read().symbols.clone();
            for symbol in &symbols {
                for timeframe in [Timeframe::Hour1, Timeframe::Hour4, Timeframe::Day1] {
                    let points = history::default_refresh_points(timeframe);
                    let total = refresh_state.engine.refresh(symbol, timeframe, points).await;
                    info!(
                        symbol = %symbol,
                        timeframe = %timeframe,
                        points = total,
                        "scheduled refresh pass done"
                    );
                    tokio::time::sleep(Duration::from_millis(pause_ms)).await;
                }
            }

            refresh_state.increment_version();
            info!("Scheduled refresh complete");
        }
    });

    // ── 7. Scheduled training dataset build ──────────────────────────────
    let training_state = state.clone();
    tokio::spawn(async move {
        // Wait for initial data
        tokio::time::sleep(Duration::from_secs(60)).await;
        info!("Training dataset loop starting");

        let hours = training_state
            .runtime_config
            .read()
            .training_interval_hours
            .max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        loop {
            interval.tick().await;

            let symbols = training_state.runtime_config.read().symbols.clone();
            let (built, skipped) = training::collect_all(&training_state.engine, &symbols).await;
            info!(built, skipped, "training dataset build finished");
        }
    });

    // ── 8. Periodic status log ───────────────────────────────────────────
    let status_state = state.clone();
    tokio::spawn(async move {
        let secs = status_state
            .runtime_config
            .read()
            .status_log_interval_secs
            .max(10);
        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        interval.tick().await;

        loop {
            interval.tick().await;
            let symbols = status_state.runtime_config.read().symbols.clone();
            for symbol in &symbols {
                info!(
                    symbol = %symbol,
                    live_points = status_state.live.data_count(symbol),
                    coverage_days = format!("{:.1}", status_state.live.coverage_days(symbol)),
                    price = ?status_state.live.current_price(symbol),
                    "live buffer status"
                );
            }
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 9. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Candlevault shut down complete.");
    Ok(())
}
