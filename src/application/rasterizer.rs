// Heatmap rasterization over the floor-plan grid
use crate::application::interpolator::SignalInterpolator;
use crate::domain::color::ColorMapper;
use crate::domain::error::HeatmapError;
use crate::domain::geometry::{Dimensions, PlanPoint};
use crate::domain::heatmap::HeatmapCell;
use crate::domain::sample::Sample;

pub const DEFAULT_CELL_SIZE: f64 = 10.0;
pub const DEFAULT_OPACITY: f64 = 0.7;
pub const DEFAULT_INDEX_THRESHOLD: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct HeatmapRasterizer {
    interpolator: SignalInterpolator,
    color_mapper: ColorMapper,
    cell_size: f64,
    opacity: f64,
    index_threshold: usize,
}

impl HeatmapRasterizer {
    pub fn new(
        interpolator: SignalInterpolator,
        color_mapper: ColorMapper,
        cell_size: f64,
        opacity: f64,
    ) -> Result<Self, HeatmapError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(HeatmapError::InvalidCellSize(cell_size));
        }
        if !(0.0..=1.0).contains(&opacity) {
            return Err(HeatmapError::InvalidSettings(format!(
                "opacity must be within [0, 1], got {}",
                opacity
            )));
        }
        Ok(Self {
            interpolator,
            color_mapper,
            cell_size,
            opacity,
            index_threshold: DEFAULT_INDEX_THRESHOLD,
        })
    }

    /// Sample count above which cell queries go through a bucket index
    pub fn with_index_threshold(mut self, threshold: usize) -> Self {
        self.index_threshold = threshold;
        self
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Tile `[0, width) x [0, height)` into whole cells and emit one cell per
    /// grid position that has an estimate. Cells without an in-range sample
    /// are omitted; a partial row or column at the high edge is not covered.
    pub fn rasterize(&self, dimensions: &Dimensions, samples: &[Sample]) -> Vec<HeatmapCell> {
        if samples.is_empty() {
            return Vec::new();
        }

        let columns = (dimensions.width / self.cell_size).floor() as usize;
        let rows = (dimensions.height / self.cell_size).floor() as usize;

        let index = (samples.len() > self.index_threshold)
            .then(|| self.interpolator.build_index(samples));

        let mut cells = Vec::new();
        for row in 0..rows {
            for col in 0..columns {
                let center = PlanPoint::new(
                    (col as f64 + 0.5) * self.cell_size,
                    (row as f64 + 0.5) * self.cell_size,
                );
                let estimate = match &index {
                    Some(index) => self.interpolator.estimate_indexed(center, index),
                    None => self.interpolator.estimate(center, samples),
                };

                if let Some(strength) = estimate {
                    cells.push(HeatmapCell {
                        x: col as f64 * self.cell_size,
                        y: row as f64 * self.cell_size,
                        width: self.cell_size,
                        height: self.cell_size,
                        strength,
                        color: self.color_mapper.color_for(strength),
                        opacity: self.opacity,
                    });
                }
            }
        }

        tracing::debug!(
            "Rasterized {} of {} cells from {} samples",
            cells.len(),
            columns * rows,
            samples.len()
        );

        cells
    }
}
