// HTTP request handlers
use crate::application::floor_registry::PlanImage;
use crate::application::ports::LocationEvent;
use crate::application::reading::ScanReport;
use crate::domain::anchor::GpsFix;
use crate::domain::error::HeatmapError;
use crate::domain::geometry::PlanPoint;
use crate::infrastructure::chunked_json::stream_render_updates;
use crate::infrastructure::device_feed::scan_error_from_code;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::settings_store::SettingsUpdate;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maps session errors onto HTTP statuses with a JSON body
pub struct ApiError(pub HeatmapError);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl From<HeatmapError> for ApiError {
    fn from(err: HeatmapError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            HeatmapError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied"),
            HeatmapError::ScanFailure(_) => (StatusCode::BAD_GATEWAY, "scan_failure"),
            HeatmapError::NoMarkerPlaced => (StatusCode::CONFLICT, "no_marker_placed"),
            HeatmapError::NotCapturing => (StatusCode::CONFLICT, "not_capturing"),
            HeatmapError::AlreadyCapturing => (StatusCode::CONFLICT, "already_capturing"),
            HeatmapError::NoCurrentFloor => (StatusCode::CONFLICT, "no_current_floor"),
            HeatmapError::UnknownFloor(_) => (StatusCode::NOT_FOUND, "unknown_floor"),
            HeatmapError::DuplicateFloor(_) => (StatusCode::CONFLICT, "duplicate_floor"),
            HeatmapError::EmptyFloorName => (StatusCode::BAD_REQUEST, "empty_floor_name"),
            HeatmapError::InvalidDimensions { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_dimensions")
            }
            HeatmapError::InvalidCellSize(_) => (StatusCode::BAD_REQUEST, "invalid_cell_size"),
            HeatmapError::InvalidSettings(_) => (StatusCode::BAD_REQUEST, "invalid_settings"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn respond<T: Serialize>(data: &T, headers: &HeaderMap) -> Response {
    match json_response(data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[derive(Deserialize)]
pub struct CreateFloorRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<PlanImage>,
}

/// Either a fix or a provider error pushed by the device
#[derive(Deserialize)]
#[serde(untagged)]
pub enum LocationReport {
    Error { error: String },
    Fix(GpsFix),
}

/// Either a completed scan or a failure code pushed by the device
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ScanPush {
    Failure { error: String },
    Report(ScanReport),
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_floors(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let floors = state.heatmap_service.list_floors().await;
    respond(&floors, &headers).await
}

pub async fn create_floor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateFloorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let floor = state
        .heatmap_service
        .add_floor(&request.name, request.image)
        .await?;
    Ok((StatusCode::CREATED, Json(floor)))
}

pub async fn create_blank_floor(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let floor = state.heatmap_service.create_blank_floor().await;
    (StatusCode::CREATED, Json(floor))
}

pub async fn select_floor(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.heatmap_service.select_floor(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Render model for one floor
pub async fn floor_heatmap(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let model = state.heatmap_service.render(&id).await?;
    Ok(respond(&model, &headers).await)
}

pub async fn floor_samples(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let samples = state.heatmap_service.samples(&id).await?;
    Ok(respond(&samples, &headers).await)
}

pub async fn clear_floor_samples(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.heatmap_service.clear_samples(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn place_marker(
    State(state): State<Arc<AppState>>,
    Json(point): Json<PlanPoint>,
) -> Result<impl IntoResponse, ApiError> {
    let floor = state.heatmap_service.place_marker(point).await?;
    Ok(Json(floor))
}

pub async fn push_location(
    State(state): State<Arc<AppState>>,
    Json(report): Json<LocationReport>,
) -> StatusCode {
    let event = match report {
        LocationReport::Fix(fix) => LocationEvent::Fix(fix),
        LocationReport::Error { error } => LocationEvent::Error(error),
    };
    state.location_feed.publish(event);
    StatusCode::ACCEPTED
}

pub async fn push_scan(
    State(state): State<Arc<AppState>>,
    Json(push): Json<ScanPush>,
) -> StatusCode {
    let outcome = match push {
        ScanPush::Report(report) => Ok(report),
        ScanPush::Failure { error } => Err(scan_error_from_code(&error)),
    };
    state.scan_feed.report(outcome);
    StatusCode::ACCEPTED
}

pub async fn start_capture(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.heatmap_service.start_capturing().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stop_capture(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.heatmap_service.stop_capturing().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a data point now
pub async fn capture_tick(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let sample = state.heatmap_service.capture_now().await?;
    Ok(Json(sample))
}

pub async fn capture_status(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.heatmap_service.capture_snapshot().await;
    respond(&snapshot, &headers).await
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.settings_store.current())
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings_store.update(update).await?;
    Ok(Json(settings))
}

/// Stream render updates for the current floor
pub async fn render_updates(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_render_updates(
        state.heatmap_service.clone(),
        accepts_brotli(&headers),
        state.shutdown.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::floor_registry::FloorPlanRegistry;
    use crate::application::heatmap_service::HeatmapService;
    use crate::infrastructure::config::EngineSettings;
    use crate::infrastructure::device_feed::{DeviceLocationFeed, DeviceScanFeed};
    use crate::infrastructure::settings_store::SettingsStore;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    async fn state() -> Arc<AppState> {
        let engine = EngineSettings::default();
        let path = std::env::temp_dir()
            .join(format!("wifi-heatmap-handlers-{}", std::process::id()))
            .join("settings.toml");
        let settings_store = Arc::new(SettingsStore::load(path).await.unwrap());
        let scan_feed = Arc::new(DeviceScanFeed::new(Duration::from_millis(50)));
        let registry = FloorPlanRegistry::new(
            engine.default_dimensions().unwrap(),
            engine.tracker_config().unwrap(),
            settings_store.current().sensitivity,
        );
        let heatmap_service = HeatmapService::new(
            registry,
            scan_feed.clone(),
            engine.rasterizer().unwrap(),
            settings_store.subscribe(),
        );
        Arc::new(AppState {
            heatmap_service,
            settings_store,
            location_feed: DeviceLocationFeed::new(),
            scan_feed,
            shutdown: CancellationToken::new(),
        })
    }

    #[tokio::test]
    async fn test_start_without_marker_is_conflict() {
        let state = state().await;
        create_blank_floor(State(state.clone())).await;

        let err = start_capture(State(state)).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_floor_is_not_found() {
        let state = state().await;
        let err = floor_heatmap(Path("nope".to_string()), HeaderMap::new(), State(state))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_floor_is_conflict() {
        let state = state().await;
        let request = || CreateFloorRequest {
            name: "Lab".to_string(),
            image: None,
        };
        assert!(create_floor(State(state.clone()), Json(request())).await.is_ok());
        let err = create_floor(State(state), Json(request())).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_oversized_plan_is_bad_request() {
        let state = state().await;
        let request = CreateFloorRequest {
            name: "Campus".to_string(),
            image: Some(PlanImage {
                uri: "file:///plans/campus.png".to_string(),
                width: 1e12,
                height: 1e12,
            }),
        };
        let err = create_floor(State(state.clone()), Json(request)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(state.heatmap_service.list_floors().await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_failure_push_denies_permission() {
        let state = state().await;
        let push: ScanPush = serde_json::from_str(r#"{"error":"permission_denied"}"#).unwrap();
        assert_eq!(push_scan(State(state.clone()), Json(push)).await, StatusCode::ACCEPTED);

        state.heatmap_service.add_floor("Lab", None).await.unwrap();
        state
            .heatmap_service
            .place_marker(PlanPoint::new(5.0, 5.0))
            .await
            .unwrap();
        let err = start_capture(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_push_payload_shapes() {
        let fix: LocationReport =
            serde_json::from_str(r#"{"latitude":10.0,"longitude":20.0,"accuracy":4.5}"#).unwrap();
        assert!(matches!(fix, LocationReport::Fix(f) if f.accuracy == Some(4.5)));

        let err: LocationReport = serde_json::from_str(r#"{"error":"timeout"}"#).unwrap();
        assert!(matches!(err, LocationReport::Error { .. }));

        let scan: ScanPush = serde_json::from_str(
            r#"{"access_points":[{"ssid":"lab","level":-52}],"ranging":[]}"#,
        )
        .unwrap();
        assert!(matches!(scan, ScanPush::Report(r) if r.access_points.len() == 1));
    }

    #[tokio::test]
    async fn test_invalid_settings_are_bad_request() {
        let state = state().await;
        let update = SettingsUpdate {
            scan_interval_ms: Some(1),
            ..SettingsUpdate::default()
        };
        let err = update_settings(State(state), Json(update)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
