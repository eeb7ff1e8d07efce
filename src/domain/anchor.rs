// GPS fix and dead-reckoning anchor
use super::geometry::PlanPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Reference pairing of a GPS fix and the plan pixel it corresponds to.
/// The fix rolls forward on every tracker update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub gps_fix: GpsFix,
    pub pixel_position: PlanPoint,
}

impl Anchor {
    pub fn new(gps_fix: GpsFix, pixel_position: PlanPoint) -> Self {
        Self {
            gps_fix,
            pixel_position,
        }
    }
}
