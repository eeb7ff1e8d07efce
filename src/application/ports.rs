// Ports for the external capabilities the session consumes
use crate::application::reading::ScanReport;
use crate::domain::anchor::GpsFix;
use crate::domain::error::HeatmapError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub const MIN_SCAN_INTERVAL_MS: u64 = 500;
pub const MAX_SCAN_INTERVAL_MS: u64 = 60_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("WiFi radio unavailable")]
    RadioUnavailable,

    #[error("scan throttled by the platform")]
    Throttled,

    #[error("no scan reported yet")]
    NoReport,

    #[error("{0}")]
    Other(String),
}

impl From<ScanError> for HeatmapError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::PermissionDenied => HeatmapError::PermissionDenied,
            other => HeatmapError::ScanFailure(other.to_string()),
        }
    }
}

#[async_trait]
pub trait WifiScanner: Send + Sync {
    /// Fails with `PermissionDenied` when capturing must not start
    async fn check_permission(&self) -> Result<(), ScanError>;

    async fn scan(&self) -> Result<ScanReport, ScanError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(GpsFix),
    Error(String),
}

pub trait LocationStream: Send + Sync {
    /// Start receiving fixes. Dropping the returned handle unsubscribes.
    fn subscribe(&self) -> LocationSubscription;

    fn set_high_accuracy(&self, enabled: bool);
}

/// Live location subscription; unsubscribes on drop
pub struct LocationSubscription {
    receiver: mpsc::Receiver<LocationEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LocationSubscription {
    pub fn new(
        receiver: mpsc::Receiver<LocationEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub async fn next(&mut self) -> Option<LocationEvent> {
        self.receiver.recv().await
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// User-tunable settings; owned and persisted outside the core
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Movement sensitivity slider, 0 to 100
    pub sensitivity: f64,
    pub high_accuracy: bool,
    pub scan_interval_ms: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            sensitivity: 50.0,
            high_accuracy: true,
            scan_interval_ms: 5000,
        }
    }
}

impl TrackingSettings {
    pub fn validate(&self) -> Result<(), HeatmapError> {
        if !(0.0..=100.0).contains(&self.sensitivity) {
            return Err(HeatmapError::InvalidSettings(format!(
                "sensitivity must be within [0, 100], got {}",
                self.sensitivity
            )));
        }
        if !(MIN_SCAN_INTERVAL_MS..=MAX_SCAN_INTERVAL_MS).contains(&self.scan_interval_ms) {
            return Err(HeatmapError::InvalidSettings(format!(
                "scan interval must be within [{}, {}] ms, got {}",
                MIN_SCAN_INTERVAL_MS, MAX_SCAN_INTERVAL_MS, self.scan_interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_settings_validation() {
        assert!(TrackingSettings::default().validate().is_ok());

        let mut settings = TrackingSettings::default();
        settings.sensitivity = 101.0;
        assert!(settings.validate().is_err());

        let mut settings = TrackingSettings::default();
        settings.sensitivity = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = TrackingSettings::default();
        settings.scan_interval_ms = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_scan_error_conversion() {
        assert_eq!(HeatmapError::from(ScanError::PermissionDenied), HeatmapError::PermissionDenied);
        assert_eq!(
            HeatmapError::from(ScanError::Throttled),
            HeatmapError::ScanFailure("scan throttled by the platform".to_string())
        );
    }

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = mpsc::channel(1);
        let flag = released.clone();
        let subscription = LocationSubscription::new(rx, move || flag.store(true, Ordering::SeqCst));

        assert!(!released.load(Ordering::SeqCst));
        drop(subscription);
        assert!(released.load(Ordering::SeqCst));
    }
}
