// Floor-plan geometry: pixel coordinates and plan dimensions
use crate::domain::error::HeatmapError;
use serde::{Deserialize, Serialize};

/// A position on a floor plan in plan-pixel units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PlanPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Component-wise clamp into `[0, width] x [0, height]`
    pub fn clamp_to(&self, bounds: &Dimensions) -> PlanPoint {
        PlanPoint::new(
            self.x.clamp(0.0, bounds.width),
            self.y.clamp(0.0, bounds.height),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    /// Validated constructor; plan dimensions must be finite and positive.
    pub fn new(width: f64, height: f64) -> Result<Self, HeatmapError> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(HeatmapError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Like [`Dimensions::new`], also rejecting any side longer than `max_side`.
    pub fn bounded(width: f64, height: f64, max_side: f64) -> Result<Self, HeatmapError> {
        let dimensions = Self::new(width, height)?;
        if width > max_side || height > max_side {
            return Err(HeatmapError::InvalidDimensions { width, height });
        }
        Ok(dimensions)
    }

    pub fn contains(&self, point: &PlanPoint) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_dimensions() {
        assert!(Dimensions::new(0.0, 10.0).is_err());
        assert!(Dimensions::new(10.0, -1.0).is_err());
        assert!(Dimensions::new(f64::NAN, 10.0).is_err());
        assert!(Dimensions::new(f64::INFINITY, 10.0).is_err());
        assert!(Dimensions::new(500.0, 500.0).is_ok());
    }

    #[test]
    fn test_bounded_rejects_oversized_plans() {
        assert!(Dimensions::bounded(1e12, 1e12, 20_000.0).is_err());
        assert!(Dimensions::bounded(500.0, 20_001.0, 20_000.0).is_err());
        assert!(Dimensions::bounded(20_000.0, 20_000.0, 20_000.0).is_ok());
        assert!(Dimensions::bounded(0.0, 10.0, 20_000.0).is_err());
    }

    #[test]
    fn test_clamp_to_bounds() {
        let bounds = Dimensions::new(300.0, 200.0).unwrap();
        let p = PlanPoint::new(-40.0, 900.0).clamp_to(&bounds);
        assert_eq!(p, PlanPoint::new(0.0, 200.0));
        assert!(bounds.contains(&p));
    }

    #[test]
    fn test_distance() {
        let a = PlanPoint::new(0.0, 0.0);
        let b = PlanPoint::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }
}
