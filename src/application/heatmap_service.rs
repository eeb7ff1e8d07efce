// Heatmap session service - floors, tracking, capture and rendering
use crate::application::capture_controller::CaptureController;
use crate::application::floor_registry::{Floor, FloorPlanRegistry, PlanImage};
use crate::application::ports::{LocationEvent, LocationStream, TrackingSettings, WifiScanner};
use crate::application::rasterizer::HeatmapRasterizer;
use crate::application::reading::reduce_scan;
use crate::domain::anchor::GpsFix;
use crate::domain::error::{HeatmapError, HeatmapResult};
use crate::domain::geometry::{Dimensions, PlanPoint};
use crate::domain::heatmap::RenderModel;
use crate::domain::sample::Sample;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

/// Scan status indicator shown next to the capture controls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    Scanning,
    NoNetworks,
    WaitingForAnchor,
    Captured { strength: f64, distance: Option<f64> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturedSample {
    pub floor_id: String,
    #[serde(flatten)]
    pub sample: Sample,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureSnapshot {
    pub capturing: bool,
    pub status: CaptureStatus,
    pub samples: Vec<CapturedSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorSummary {
    pub id: String,
    pub dimensions: Dimensions,
    pub plan_image: Option<String>,
    pub sample_count: usize,
    pub marker_position: Option<PlanPoint>,
    pub anchored: bool,
    pub current: bool,
}

struct Session {
    registry: FloorPlanRegistry,
    last_fix: Option<GpsFix>,
    capturing: bool,
    generation: u64,
    status: CaptureStatus,
    session_samples: Vec<CapturedSample>,
}

impl FloorSummary {
    fn of(floor: &Floor, current: bool) -> Self {
        Self {
            id: floor.id().to_string(),
            dimensions: *floor.dimensions(),
            plan_image: floor.plan_image().map(str::to_string),
            sample_count: floor.samples().len(),
            marker_position: floor.tracker().marker_position(),
            anchored: floor.tracker().anchor().is_some(),
            current,
        }
    }
}

impl Session {
    fn current_floor(&self) -> HeatmapResult<&Floor> {
        self.registry.current().ok_or(HeatmapError::NoCurrentFloor)
    }

    fn current_floor_mut(&mut self) -> HeatmapResult<&mut Floor> {
        self.registry.current_mut().ok_or(HeatmapError::NoCurrentFloor)
    }
}

/// One capture session. All mutation goes through a single lock, so events
/// are applied one at a time in arrival order.
#[derive(Clone)]
pub struct HeatmapService {
    session: Arc<Mutex<Session>>,
    capture: Arc<Mutex<CaptureController>>,
    scanner: Arc<dyn WifiScanner>,
    rasterizer: HeatmapRasterizer,
    settings: watch::Receiver<TrackingSettings>,
    revision: Arc<watch::Sender<u64>>,
}

impl HeatmapService {
    pub fn new(
        registry: FloorPlanRegistry,
        scanner: Arc<dyn WifiScanner>,
        rasterizer: HeatmapRasterizer,
        settings: watch::Receiver<TrackingSettings>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        let mut registry = registry;
        registry.set_sensitivity(settings.borrow().sensitivity);

        Self {
            session: Arc::new(Mutex::new(Session {
                registry,
                last_fix: None,
                capturing: false,
                generation: 0,
                status: CaptureStatus::Idle,
                session_samples: Vec::new(),
            })),
            capture: Arc::new(Mutex::new(CaptureController::new())),
            scanner,
            rasterizer,
            settings,
            revision: Arc::new(revision),
        }
    }

    /// Bumped whenever anything a renderer shows has changed
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    // ---- floors ----

    pub async fn list_floors(&self) -> Vec<FloorSummary> {
        let session = self.session.lock().await;
        let current = session.registry.current().map(|f| f.id());
        session
            .registry
            .list()
            .iter()
            .map(|f| FloorSummary::of(f, current == Some(f.id())))
            .collect()
    }

    pub async fn add_floor(&self, name: &str, image: Option<PlanImage>) -> HeatmapResult<FloorSummary> {
        let mut session = self.session.lock().await;
        let summary = FloorSummary::of(session.registry.add_floor(name, image)?, true);
        drop(session);
        self.notify();
        Ok(summary)
    }

    pub async fn create_blank_floor(&self) -> FloorSummary {
        let mut session = self.session.lock().await;
        let summary = FloorSummary::of(session.registry.create_blank_floor(), true);
        drop(session);
        self.notify();
        summary
    }

    pub async fn select_floor(&self, id: &str) -> HeatmapResult<()> {
        self.session.lock().await.registry.select(id)?;
        self.notify();
        Ok(())
    }

    // ---- tracking ----

    /// Place the marker on the current floor, anchoring it to the latest fix
    /// if one has been received.
    pub async fn place_marker(&self, pixel: PlanPoint) -> HeatmapResult<FloorSummary> {
        let mut session = self.session.lock().await;
        if session.capturing {
            return Err(HeatmapError::AlreadyCapturing);
        }
        let last_fix = session.last_fix;
        let floor = session.current_floor_mut()?;
        floor.tracker_mut().place_marker(pixel, last_fix);
        let summary = FloorSummary::of(floor, true);
        drop(session);
        self.notify();
        Ok(summary)
    }

    pub async fn on_location(&self, fix: GpsFix) {
        if !fix.is_valid() {
            tracing::warn!(
                "Dropping invalid GPS fix ({}, {})",
                fix.latitude,
                fix.longitude
            );
            return;
        }

        let mut session = self.session.lock().await;
        session.last_fix = Some(fix);
        let moved = match session.registry.current_mut() {
            Some(floor) => {
                let bounds = *floor.dimensions();
                floor.tracker_mut().on_fix(fix, Some(&bounds))
            }
            None => None,
        };
        drop(session);

        if let Some(position) = moved {
            tracing::debug!("Marker moved to ({:.1}, {:.1})", position.x, position.y);
            self.notify();
        }
    }

    pub fn on_location_error(&self, message: &str) {
        tracing::warn!("Location error: {}", message);
    }

    /// Consume the location stream until cancelled. The subscription is
    /// owned by this future, so it is released on every exit path.
    pub async fn run_tracking(&self, locations: Arc<dyn LocationStream>, cancel: CancellationToken) {
        let mut settings = self.settings.clone();
        let mut settings_open = true;
        locations.set_high_accuracy(settings.borrow_and_update().high_accuracy);

        let mut subscription = locations.subscribe();
        tracing::info!("Location tracking started");

        loop {
            tokio::select! {
                event = subscription.next() => match event {
                    Some(LocationEvent::Fix(fix)) => self.on_location(fix).await,
                    Some(LocationEvent::Error(message)) => self.on_location_error(&message),
                    None => {
                        tracing::warn!("Location stream closed");
                        break;
                    }
                },
                changed = settings.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let updated = *settings.borrow_and_update();
                    locations.set_high_accuracy(updated.high_accuracy);
                    self.apply_settings(&updated).await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        drop(subscription);
        tracing::info!("Location tracking stopped");
    }

    async fn apply_settings(&self, settings: &TrackingSettings) {
        self.session
            .lock()
            .await
            .registry
            .set_sensitivity(settings.sensitivity);
        tracing::info!("Applied sensitivity {}", settings.sensitivity);
    }

    // ---- capture ----

    pub async fn start_capturing(&self) -> HeatmapResult<()> {
        let mut capture = self.capture.lock().await;

        {
            let session = self.session.lock().await;
            if session.capturing {
                return Err(HeatmapError::AlreadyCapturing);
            }
            if session.current_floor()?.tracker().marker_position().is_none() {
                return Err(HeatmapError::NoMarkerPlaced);
            }
        }

        self.scanner.check_permission().await?;

        let generation = {
            let mut session = self.session.lock().await;
            session.capturing = true;
            session.generation += 1;
            session.status = CaptureStatus::Idle;
            session.session_samples.clear();
            session.generation
        };

        capture
            .start(self.clone(), generation, self.settings.clone())
            .await;

        tracing::info!("Capturing started (generation {})", generation);
        self.notify();
        Ok(())
    }

    pub async fn stop_capturing(&self) -> HeatmapResult<()> {
        let mut capture = self.capture.lock().await;

        {
            let mut session = self.session.lock().await;
            if !session.capturing {
                return Err(HeatmapError::NotCapturing);
            }
            session.capturing = false;
            session.generation += 1;
            session.status = CaptureStatus::Idle;
        }

        if let Err(e) = capture.stop().await {
            tracing::error!("Capture loop did not stop cleanly: {:#}", e);
        }

        tracing::info!("Capturing stopped");
        self.notify();
        Ok(())
    }

    /// On-demand capture ("add data point")
    pub async fn capture_now(&self) -> HeatmapResult<Option<Sample>> {
        let generation = {
            let session = self.session.lock().await;
            if !session.capturing {
                return Err(HeatmapError::NotCapturing);
            }
            session.generation
        };
        self.tick(generation).await
    }

    /// One capture tick. Returns the new sample, or `None` if the tick was
    /// skipped. A scan failure is recorded in the status and returned.
    pub async fn tick(&self, generation: u64) -> HeatmapResult<Option<Sample>> {
        {
            let mut session = self.session.lock().await;
            if !session.capturing || session.generation != generation {
                return Ok(None);
            }
            if session.current_floor()?.tracker().anchor().is_none() {
                session.status = CaptureStatus::WaitingForAnchor;
                drop(session);
                tracing::debug!("Skipping capture tick: no anchor yet");
                self.notify();
                return Ok(None);
            }
            session.status = CaptureStatus::Scanning;
        }
        self.notify();

        let scan = self.scanner.scan().await;

        let mut session = self.session.lock().await;
        if !session.capturing || session.generation != generation {
            tracing::debug!("Discarding scan that completed after capture stopped");
            return Ok(None);
        }

        let report = match scan {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("WiFi scan failed: {}", e);
                session.status = CaptureStatus::Error {
                    message: e.to_string(),
                };
                drop(session);
                self.notify();
                return Err(HeatmapError::ScanFailure(e.to_string()));
            }
        };

        let Some(reading) = reduce_scan(&report) else {
            session.status = CaptureStatus::NoNetworks;
            drop(session);
            self.notify();
            return Ok(None);
        };

        let floor = session.current_floor_mut()?;
        let Some(position) = floor.tracker().marker_position() else {
            return Ok(None);
        };
        let floor_id = floor.id().to_string();
        let sample = Sample::new(position, reading.strength)
            .with_ranging(reading.distance, reading.quality);
        floor.samples_mut().append(sample.clone());

        session.session_samples.push(CapturedSample {
            floor_id: floor_id.clone(),
            sample: sample.clone(),
        });
        session.status = CaptureStatus::Captured {
            strength: reading.strength,
            distance: reading.distance,
        };
        drop(session);

        tracing::info!(
            "Captured {} dBm at ({:.1}, {:.1}) on {}",
            reading.strength,
            position.x,
            position.y,
            floor_id
        );
        self.notify();
        Ok(Some(sample))
    }

    pub async fn capture_snapshot(&self) -> CaptureSnapshot {
        let session = self.session.lock().await;
        CaptureSnapshot {
            capturing: session.capturing,
            status: session.status.clone(),
            samples: session.session_samples.clone(),
        }
    }

    // ---- samples and rendering ----

    pub async fn samples(&self, floor_id: &str) -> HeatmapResult<Vec<Sample>> {
        let session = self.session.lock().await;
        Ok(session.registry.get(floor_id)?.samples().all().to_vec())
    }

    pub async fn clear_samples(&self, floor_id: &str) -> HeatmapResult<()> {
        self.session
            .lock()
            .await
            .registry
            .get_mut(floor_id)?
            .samples_mut()
            .clear();
        tracing::info!("Cleared samples for floor {}", floor_id);
        self.notify();
        Ok(())
    }

    /// Recompute the heatmap for a floor from its current samples
    pub async fn render(&self, floor_id: &str) -> HeatmapResult<RenderModel> {
        let (dimensions, plan_image, samples, marker_position) = {
            let session = self.session.lock().await;
            let floor = session.registry.get(floor_id)?;
            (
                *floor.dimensions(),
                floor.plan_image().map(str::to_string),
                floor.samples().all().to_vec(),
                floor.tracker().marker_position(),
            )
        };

        let cells = self.rasterizer.rasterize(&dimensions, &samples);
        Ok(RenderModel {
            floor_id: floor_id.to_string(),
            dimensions,
            plan_image,
            cells,
            marker_position,
            sample_count: samples.len(),
        })
    }

    pub async fn render_current(&self) -> HeatmapResult<RenderModel> {
        let id = {
            let session = self.session.lock().await;
            session.current_floor()?.id().to_string()
        };
        self.render(&id).await
    }

    /// Stop any running capture loop; used on shutdown
    pub async fn shutdown(&self) {
        if self.stop_capturing().await.is_ok() {
            tracing::info!("Capture stopped for shutdown");
        }
    }
}
