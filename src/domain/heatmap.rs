// Renderer-facing heatmap models
use super::color::Color;
use super::geometry::{Dimensions, PlanPoint};
use serde::Serialize;

/// One tile of the rasterized grid. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub strength: f64,
    pub color: Color,
    pub opacity: f64,
}

/// Everything a renderer needs to draw one floor
#[derive(Debug, Clone, Serialize)]
pub struct RenderModel {
    pub floor_id: String,
    pub dimensions: Dimensions,
    pub plan_image: Option<String>,
    pub cells: Vec<HeatmapCell>,
    pub marker_position: Option<PlanPoint>,
    pub sample_count: usize,
}
