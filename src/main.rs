// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use axum::{routing::{get, post}, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::floor_registry::FloorPlanRegistry;
use crate::application::heatmap_service::HeatmapService;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::device_feed::{DeviceLocationFeed, DeviceScanFeed};
use crate::infrastructure::settings_store::SettingsStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    capture_status, capture_tick, clear_floor_samples, create_blank_floor, create_floor,
    floor_heatmap, floor_samples, get_settings, health_check, list_floors, place_marker,
    push_location, push_scan, render_updates, select_floor, start_capture, stop_capture,
    update_settings,
};

/// How long a capture tick waits for the device to push a scan
const SCAN_WAIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let settings_store = Arc::new(SettingsStore::load(&config.settings.path).await?);
    let settings = settings_store.current();

    // Build the engine (application layer)
    let rasterizer = config.engine.rasterizer()?;
    let registry = FloorPlanRegistry::new(
        config.engine.default_dimensions()?,
        config.engine.tracker_config()?,
        settings.sensitivity,
    )
    .with_max_side(config.engine.max_floor_side);

    // Device adapters (infrastructure layer)
    let scan_feed = Arc::new(DeviceScanFeed::new(SCAN_WAIT));
    let location_feed = DeviceLocationFeed::new();

    let heatmap_service = HeatmapService::new(
        registry,
        scan_feed.clone(),
        rasterizer,
        settings_store.subscribe(),
    );

    // Cancelled on ctrl-c: ends location tracking and open update streams
    let shutdown = CancellationToken::new();
    let tracking = {
        let service = heatmap_service.clone();
        let locations = Arc::new(location_feed.clone());
        let cancel = shutdown.clone();
        tokio::spawn(async move { service.run_tracking(locations, cancel).await })
    };

    // Create application state
    let state = Arc::new(AppState {
        heatmap_service: heatmap_service.clone(),
        settings_store,
        location_feed,
        scan_feed,
        shutdown: shutdown.clone(),
    });

    // Build router (presentation layer)
    // Compression is handled in the response builders, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/floors", get(list_floors).post(create_floor))
        .route("/floors/blank", post(create_blank_floor))
        .route("/floors/:id/select", post(select_floor))
        .route("/floors/:id/heatmap", get(floor_heatmap))
        .route("/floors/:id/samples", get(floor_samples).delete(clear_floor_samples))
        .route("/marker", post(place_marker))
        .route("/location", post(push_location))
        .route("/scan", post(push_scan))
        .route("/capture", get(capture_status))
        .route("/capture/start", post(start_capture))
        .route("/capture/stop", post(stop_capture))
        .route("/capture/tick", post(capture_tick))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/updates", get(render_updates))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_addr))?;
    tracing::info!("Starting wifi-heatmap service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutting down");
                shutdown.cancel();
            }
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = tracking.await {
        tracing::error!("Tracking task failed: {}", e);
    }
    heatmap_service.shutdown().await;

    Ok(())
}
