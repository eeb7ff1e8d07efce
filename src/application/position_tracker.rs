// Dead-reckoning marker tracker driven by GPS deltas
use crate::domain::anchor::{Anchor, GpsFix};
use crate::domain::error::HeatmapError;
use crate::domain::geometry::{Dimensions, PlanPoint};

/// Base degrees-to-meters-like multiplier at sensitivity 0
const BASE_SENSITIVITY_SCALE: f64 = 50_000.0;
/// Added multiplier per sensitivity step
const SENSITIVITY_STEP: f64 = 1_500.0;

pub const DEFAULT_PIXEL_SCALE: f64 = 20.0;
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.2;
pub const DEFAULT_SENSITIVITY: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub pixel_scale: f64,
    pub smoothing_factor: f64,
    /// Bounds used when the floor's dimensions are unknown
    pub fallback_bounds: Dimensions,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pixel_scale: DEFAULT_PIXEL_SCALE,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            fallback_bounds: Dimensions {
                width: 300.0,
                height: 200.0,
            },
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), HeatmapError> {
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(HeatmapError::InvalidSettings(format!(
                "smoothing factor must be within (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if !self.pixel_scale.is_finite() || self.pixel_scale <= 0.0 {
            return Err(HeatmapError::InvalidSettings(format!(
                "pixel scale must be positive, got {}",
                self.pixel_scale
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    /// No anchor yet. A marker may exist if it was placed without a GPS fix.
    Unanchored { marker: Option<PlanPoint> },
    Anchored { anchor: Anchor, position: PlanPoint },
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    config: TrackerConfig,
    sensitivity: f64,
    state: TrackerState,
}

impl PositionTracker {
    pub fn new(config: TrackerConfig, sensitivity: f64) -> Self {
        Self {
            config,
            sensitivity: clamp_sensitivity(sensitivity),
            state: TrackerState::Unanchored { marker: None },
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        match &self.state {
            TrackerState::Anchored { anchor, .. } => Some(anchor),
            TrackerState::Unanchored { .. } => None,
        }
    }

    pub fn marker_position(&self) -> Option<PlanPoint> {
        match &self.state {
            TrackerState::Anchored { position, .. } => Some(*position),
            TrackerState::Unanchored { marker } => *marker,
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        self.sensitivity = clamp_sensitivity(sensitivity);
    }

    /// Place (or re-place) the marker. Any previous anchor and smoothed
    /// position are discarded; the tracker anchors only if a fix is known.
    pub fn place_marker(&mut self, pixel: PlanPoint, current_fix: Option<GpsFix>) {
        self.state = match current_fix {
            Some(fix) => {
                tracing::info!(
                    "Anchored marker at ({:.1}, {:.1}) to fix ({:.6}, {:.6})",
                    pixel.x,
                    pixel.y,
                    fix.latitude,
                    fix.longitude
                );
                TrackerState::Anchored {
                    anchor: Anchor::new(fix, pixel),
                    position: pixel,
                }
            }
            None => {
                tracing::info!(
                    "Marker placed at ({:.1}, {:.1}) without a GPS fix; tracking stays idle",
                    pixel.x,
                    pixel.y
                );
                TrackerState::Unanchored {
                    marker: Some(pixel),
                }
            }
        };
    }

    /// Advance the marker by the movement since the anchor fix and roll the
    /// anchor forward. A no-op returning `None` while unanchored.
    pub fn on_fix(&mut self, fix: GpsFix, bounds: Option<&Dimensions>) -> Option<PlanPoint> {
        let bounds = bounds.copied().unwrap_or(self.config.fallback_bounds);
        let scale = self.sensitivity_scale();
        let factor = self.config.smoothing_factor;
        let pixel_scale = self.config.pixel_scale;

        let TrackerState::Anchored { anchor, position } = &mut self.state else {
            tracing::debug!("Ignoring GPS fix while unanchored");
            return None;
        };

        let lat_diff = fix.latitude - anchor.gps_fix.latitude;
        let lon_diff = fix.longitude - anchor.gps_fix.longitude;

        let moved_lat = lat_diff * scale;
        let moved_lon = lon_diff * scale * fix.latitude.to_radians().cos();

        let dx = moved_lon * pixel_scale;
        let dy = -moved_lat * pixel_scale;

        let raw = PlanPoint::new(position.x + dx, position.y + dy).clamp_to(&bounds);
        *position = smooth(raw, *position, factor);
        anchor.gps_fix = fix;

        Some(*position)
    }

    fn sensitivity_scale(&self) -> f64 {
        BASE_SENSITIVITY_SCALE + self.sensitivity * SENSITIVITY_STEP
    }
}

/// Exponential smoothing: `old + (target - old) * factor`
pub fn smooth(target: PlanPoint, old: PlanPoint, factor: f64) -> PlanPoint {
    PlanPoint::new(
        old.x + (target.x - old.x) * factor,
        old.y + (target.y - old.y) * factor,
    )
}

fn clamp_sensitivity(sensitivity: f64) -> f64 {
    if sensitivity.is_nan() {
        DEFAULT_SENSITIVITY
    } else {
        sensitivity.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn floor() -> Dimensions {
        Dimensions::new(500.0, 500.0).unwrap()
    }

    fn anchored_at(x: f64, y: f64, lat: f64, lon: f64) -> PositionTracker {
        let mut tracker = PositionTracker::new(TrackerConfig::default(), 50.0);
        tracker.place_marker(PlanPoint::new(x, y), Some(GpsFix::new(lat, lon)));
        tracker
    }

    #[test]
    fn test_unanchored_ignores_fixes() {
        let mut tracker = PositionTracker::new(TrackerConfig::default(), 50.0);
        assert_eq!(tracker.on_fix(GpsFix::new(10.0, 20.0), Some(&floor())), None);
        assert_eq!(tracker.marker_position(), None);
        assert!(tracker.anchor().is_none());
    }

    #[test]
    fn test_marker_without_fix_stays_unanchored() {
        let mut tracker = PositionTracker::new(TrackerConfig::default(), 50.0);
        tracker.place_marker(PlanPoint::new(40.0, 60.0), None);
        assert_eq!(tracker.marker_position(), Some(PlanPoint::new(40.0, 60.0)));
        assert_eq!(tracker.on_fix(GpsFix::new(10.0, 20.0), Some(&floor())), None);
        assert_eq!(tracker.marker_position(), Some(PlanPoint::new(40.0, 60.0)));
    }

    #[test]
    fn test_scenario_northward_jump_clamps_and_smooths() {
        let mut tracker = anchored_at(100.0, 100.0, 10.0, 20.0);
        let updated = tracker.on_fix(GpsFix::new(10.0001, 20.0), Some(&floor())).unwrap();

        assert_relative_eq!(updated.x, 100.0);
        assert_relative_eq!(updated.y, 80.0, epsilon = 1e-9);
        assert_eq!(tracker.anchor().unwrap().gps_fix.latitude, 10.0001);
        // the anchor pixel is the original tap
        assert_eq!(tracker.anchor().unwrap().pixel_position, PlanPoint::new(100.0, 100.0));
    }

    #[test]
    fn test_eastward_movement_scaled_by_latitude() {
        let mut tracker = anchored_at(100.0, 100.0, 60.0, 20.0);
        let updated = tracker.on_fix(GpsFix::new(60.0, 20.00001), Some(&floor())).unwrap();

        // 0.00001 * 125000 * cos(60deg) * 20 = 12.5 px raw, 2.5 px after smoothing
        assert_relative_eq!(updated.x, 102.5, epsilon = 1e-6);
        assert_relative_eq!(updated.y, 100.0);
    }

    #[test]
    fn test_sensitivity_changes_scale() {
        let mut slow = anchored_at(250.0, 250.0, 0.0, 0.0);
        slow.set_sensitivity(0.0);
        let mut fast = anchored_at(250.0, 250.0, 0.0, 0.0);
        fast.set_sensitivity(100.0);

        let a = slow.on_fix(GpsFix::new(-0.00001, 0.0), Some(&floor())).unwrap();
        let b = fast.on_fix(GpsFix::new(-0.00001, 0.0), Some(&floor())).unwrap();
        // 50000 vs 200000 degrees multiplier
        assert_relative_eq!(a.y - 250.0, 2.0, epsilon = 1e-6);
        assert_relative_eq!(b.y - 250.0, 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_position_always_within_bounds() {
        let mut tracker = anchored_at(10.0, 490.0, 0.0, 0.0);
        let jumps = [(5.0, -7.0), (-80.0, 170.0), (0.5, 0.5), (-89.0, -179.0), (45.0, 90.0)];
        for (lat, lon) in jumps {
            let p = tracker.on_fix(GpsFix::new(lat, lon), Some(&floor())).unwrap();
            assert!(floor().contains(&p), "{:?} escaped the plan", p);
        }
    }

    #[test]
    fn test_fallback_bounds_when_dimensions_unknown() {
        let mut tracker = anchored_at(150.0, 100.0, 0.0, 0.0);
        for _ in 0..200 {
            let last = tracker.anchor().unwrap().gps_fix;
            tracker.on_fix(GpsFix::new(last.latitude - 0.01, last.longitude + 0.01), None);
        }
        let p = tracker.marker_position().unwrap();
        assert!(p.x <= 300.0 && p.y <= 200.0);
        assert_relative_eq!(p.x, 300.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_smoothing_converges_without_overshoot() {
        let mut tracker = anchored_at(100.0, 100.0, 10.0, 20.0);
        let mut previous = 100.0;
        let mut lat = 10.0;
        for _ in 0..60 {
            lat += 0.0001;
            let p = tracker.on_fix(GpsFix::new(lat, 20.0), Some(&floor())).unwrap();
            // target is clamped to y = 0 every step
            assert!(p.y >= 0.0);
            assert!(p.y < previous);
            assert_relative_eq!(p.y, previous * 0.8, epsilon = 1e-9);
            previous = p.y;
        }
        assert!(previous < 0.01);
    }

    #[test]
    fn test_replacing_marker_resets_state() {
        let mut tracker = anchored_at(100.0, 100.0, 10.0, 20.0);
        tracker.on_fix(GpsFix::new(10.0001, 20.0), Some(&floor()));

        tracker.place_marker(PlanPoint::new(300.0, 300.0), Some(GpsFix::new(11.0, 21.0)));
        assert_eq!(tracker.marker_position(), Some(PlanPoint::new(300.0, 300.0)));
        let anchor = tracker.anchor().unwrap();
        assert_eq!(anchor.gps_fix.latitude, 11.0);
        assert_eq!(anchor.pixel_position, PlanPoint::new(300.0, 300.0));
    }

    #[test]
    fn test_smoothing_factor_validation() {
        let mut config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        config.smoothing_factor = 0.0;
        assert!(config.validate().is_err());
        config.smoothing_factor = 1.2;
        assert!(config.validate().is_err());
        config.smoothing_factor = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_smooth_helper() {
        let p = smooth(PlanPoint::new(10.0, 0.0), PlanPoint::new(0.0, 10.0), 0.2);
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 8.0);
    }
}
