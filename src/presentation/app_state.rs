// Application state for HTTP handlers
use crate::application::heatmap_service::HeatmapService;
use crate::infrastructure::device_feed::{DeviceLocationFeed, DeviceScanFeed};
use crate::infrastructure::settings_store::SettingsStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub heatmap_service: HeatmapService,
    pub settings_store: Arc<SettingsStore>,
    pub location_feed: DeviceLocationFeed,
    pub scan_feed: Arc<DeviceScanFeed>,
    /// Cancelled when the server starts shutting down; ends long-lived streams
    pub shutdown: CancellationToken,
}
