// Sample domain model
use super::geometry::PlanPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scan reading bound to a plan location. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub position: PlanPoint,
    /// Signal level in dBm, typically in [-100, 0]
    pub strength: f64,
    /// Ranged distance to the access point in meters
    pub distance: Option<f64>,
    pub quality: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(position: PlanPoint, strength: f64) -> Self {
        Self {
            position,
            strength,
            distance: None,
            quality: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_ranging(mut self, distance: Option<f64>, quality: Option<f64>) -> Self {
        self.distance = distance;
        self.quality = quality;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
