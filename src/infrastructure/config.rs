use crate::application::floor_registry::DEFAULT_MAX_FLOOR_SIDE;
use crate::application::interpolator::{DEFAULT_MAX_DISTANCE, SignalInterpolator};
use crate::application::position_tracker::{
    DEFAULT_PIXEL_SCALE, DEFAULT_SMOOTHING_FACTOR, TrackerConfig,
};
use crate::application::rasterizer::{
    DEFAULT_CELL_SIZE, DEFAULT_INDEX_THRESHOLD, DEFAULT_OPACITY, HeatmapRasterizer,
};
use crate::domain::color::{ColorMapper, ColorRamp};
use crate::domain::error::HeatmapResult;
use crate::domain::geometry::Dimensions;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub settings: SettingsFile,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    /// Radius of influence in plan pixels
    pub max_distance: f64,
    pub cell_size: f64,
    pub opacity: f64,
    pub color_ramp: ColorRamp,
    pub smoothing_factor: f64,
    pub pixel_scale: f64,
    pub default_floor_width: f64,
    pub default_floor_height: f64,
    pub tracker_fallback_width: f64,
    pub tracker_fallback_height: f64,
    pub spatial_index_threshold: usize,
    /// Longest accepted plan side, for uploaded images and the blank default
    pub max_floor_side: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            cell_size: DEFAULT_CELL_SIZE,
            opacity: DEFAULT_OPACITY,
            color_ramp: ColorRamp::Discrete,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            pixel_scale: DEFAULT_PIXEL_SCALE,
            default_floor_width: 500.0,
            default_floor_height: 500.0,
            tracker_fallback_width: 300.0,
            tracker_fallback_height: 200.0,
            spatial_index_threshold: DEFAULT_INDEX_THRESHOLD,
            max_floor_side: DEFAULT_MAX_FLOOR_SIDE,
        }
    }
}

impl EngineSettings {
    pub fn rasterizer(&self) -> HeatmapResult<HeatmapRasterizer> {
        let interpolator = SignalInterpolator::new(self.max_distance)?;
        let rasterizer = HeatmapRasterizer::new(
            interpolator,
            ColorMapper::new(self.color_ramp),
            self.cell_size,
            self.opacity,
        )?;
        Ok(rasterizer.with_index_threshold(self.spatial_index_threshold))
    }

    pub fn tracker_config(&self) -> HeatmapResult<TrackerConfig> {
        let config = TrackerConfig {
            pixel_scale: self.pixel_scale,
            smoothing_factor: self.smoothing_factor,
            fallback_bounds: Dimensions::new(
                self.tracker_fallback_width,
                self.tracker_fallback_height,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn default_dimensions(&self) -> HeatmapResult<Dimensions> {
        Dimensions::bounded(
            self.default_floor_width,
            self.default_floor_height,
            self.max_floor_side,
        )
    }
}

/// Where user settings are persisted
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsFile {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_settings_path() -> String {
    "config/settings.toml".to_string()
}

/// Load `config/heatmap.*` (optional) overlaid with `HEATMAP__SECTION__KEY` variables
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/heatmap").required(false))
        .add_source(config::Environment::with_prefix("HEATMAP").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
