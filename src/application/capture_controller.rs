// Periodic capture task with a cancellable handle
use crate::application::heatmap_service::HeatmapService;
use crate::application::ports::TrackingSettings;
use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct CaptureController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the timer loop for one capture generation, replacing any running loop.
    /// A previous loop that ended abnormally is logged and never blocks the new one.
    pub async fn start(
        &mut self,
        service: HeatmapService,
        generation: u64,
        settings: watch::Receiver<TrackingSettings>,
    ) {
        if let Err(e) = self.stop().await {
            tracing::warn!("Previous capture loop ended abnormally: {:#}", e);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            service,
            generation,
            settings,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Cancel the loop and wait for it, so no tick runs after this returns.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new()
    }
}

fn capture_ticker(interval_ms: u64) -> Interval {
    let period = Duration::from_millis(interval_ms);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn capture_loop(
    service: HeatmapService,
    generation: u64,
    mut settings: watch::Receiver<TrackingSettings>,
    cancel_token: CancellationToken,
) {
    let mut interval_ms = settings.borrow_and_update().scan_interval_ms;
    let mut ticker = capture_ticker(interval_ms);
    let mut settings_open = true;
    tracing::info!("Capture loop started (every {} ms)", interval_ms);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    result = service.tick(generation) => {
                        if let Err(e) = result {
                            tracing::warn!("Capture tick failed: {}", e);
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
            changed = settings.changed(), if settings_open => {
                if changed.is_err() {
                    // publisher gone, keep the current interval
                    settings_open = false;
                    continue;
                }
                let next = settings.borrow_and_update().scan_interval_ms;
                if next != interval_ms {
                    tracing::info!("Capture interval changed {} -> {} ms", interval_ms, next);
                    interval_ms = next;
                    ticker = capture_ticker(interval_ms);
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }

    tracing::info!("Capture loop shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::floor_registry::FloorPlanRegistry;
    use crate::application::interpolator::SignalInterpolator;
    use crate::application::ports::{ScanError, WifiScanner};
    use crate::application::position_tracker::TrackerConfig;
    use crate::application::rasterizer::HeatmapRasterizer;
    use crate::application::reading::ScanReport;
    use crate::domain::color::ColorMapper;
    use crate::domain::geometry::Dimensions;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct IdleScanner;

    #[async_trait]
    impl WifiScanner for IdleScanner {
        async fn check_permission(&self) -> Result<(), ScanError> {
            Ok(())
        }

        async fn scan(&self) -> Result<ScanReport, ScanError> {
            Err(ScanError::NoReport)
        }
    }

    fn service() -> (HeatmapService, watch::Sender<TrackingSettings>) {
        let (tx, rx) = watch::channel(TrackingSettings::default());
        let registry = FloorPlanRegistry::new(
            Dimensions::new(500.0, 500.0).unwrap(),
            TrackerConfig::default(),
            50.0,
        );
        let rasterizer = HeatmapRasterizer::new(
            SignalInterpolator::default(),
            ColorMapper::default(),
            10.0,
            0.7,
        )
        .unwrap();
        (HeatmapService::new(registry, Arc::new(IdleScanner), rasterizer, rx), tx)
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (service, tx) = service();
        let mut controller = CaptureController::new();
        assert!(!controller.is_running());

        controller.start(service, 1, tx.subscribe()).await;
        assert!(controller.is_running());

        controller.stop().await.unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_start_replaces_a_crashed_loop() {
        let (service, tx) = service();
        let mut controller = CaptureController::new();
        controller.handle = Some(tokio::spawn(async {
            panic!("capture loop crashed");
        }));
        tokio::task::yield_now().await;

        controller.start(service, 2, tx.subscribe()).await;
        assert!(controller.is_running());
        assert!(controller.stop().await.is_ok());
    }
}
