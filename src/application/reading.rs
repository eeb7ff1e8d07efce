// Reduce a WiFi scan to the single reading stored with a sample
use crate::domain::color::normalize_strength;
use serde::{Deserialize, Serialize};

/// Distance at which ranging contributes nothing to quality, in meters
const MAX_RANGING_DISTANCE_M: f64 = 50.0;
const RSSI_QUALITY_WEIGHT: f64 = 0.7;
const DISTANCE_QUALITY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    #[serde(default)]
    pub bssid: Option<String>,
    /// Signal level in dBm
    pub level: i32,
    #[serde(default)]
    pub frequency: Option<u32>,
    /// Whether the AP answers 802.11mc round-trip-time ranging
    #[serde(default)]
    pub rtt_responder: bool,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub quality: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangingResult {
    pub bssid: String,
    pub rssi: i32,
    pub distance_mm: i32,
    #[serde(default)]
    pub distance_std_dev_mm: Option<i32>,
}

impl RangingResult {
    pub fn distance_m(&self) -> f64 {
        self.distance_mm as f64 / 1000.0
    }

    pub fn quality(&self) -> f64 {
        signal_quality(self.rssi, self.distance_mm)
    }
}

/// What a single scan produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default)]
    pub access_points: Vec<AccessPoint>,
    #[serde(default)]
    pub ranging: Vec<RangingResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub strength: f64,
    pub distance: Option<f64>,
    pub quality: Option<f64>,
}

/// Blend of normalized RSSI and inverted ranged distance, in [0, 1]
pub fn signal_quality(rssi: i32, distance_mm: i32) -> f64 {
    let rssi_part = normalize_strength(rssi as f64);
    let distance_m = distance_mm as f64 / 1000.0;
    let distance_part = 1.0 - (distance_m / MAX_RANGING_DISTANCE_M).clamp(0.0, 1.0);
    RSSI_QUALITY_WEIGHT * rssi_part + DISTANCE_QUALITY_WEIGHT * distance_part
}

/// Prefer the best-quality ranging result when an RTT responder is visible,
/// otherwise fall back to the strongest access point. `None` for an empty scan.
pub fn reduce_scan(report: &ScanReport) -> Option<Reading> {
    if report.access_points.is_empty() {
        return None;
    }

    let has_responder = report.access_points.iter().any(|ap| ap.rtt_responder);
    if has_responder {
        let best = report
            .ranging
            .iter()
            .max_by(|a, b| a.quality().total_cmp(&b.quality()));
        if let Some(best) = best {
            return Some(Reading {
                strength: best.rssi as f64,
                distance: Some(best.distance_m()),
                quality: Some(best.quality()),
            });
        }
        tracing::debug!("RTT responders visible but no ranging results; using RSSI");
    }

    report
        .access_points
        .iter()
        .max_by_key(|ap| ap.level)
        .map(|ap| Reading {
            strength: ap.level as f64,
            distance: ap.distance,
            quality: Some(ap.quality.unwrap_or(0.0)),
        })
}
