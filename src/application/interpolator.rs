// Inverse-distance weighted signal interpolation
use crate::domain::error::HeatmapError;
use crate::domain::geometry::PlanPoint;
use crate::domain::sample::Sample;
use std::collections::HashMap;

pub const DEFAULT_MAX_DISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
pub struct SignalInterpolator {
    max_distance: f64,
}

impl Default for SignalInterpolator {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl SignalInterpolator {
    /// `max_distance` is the radius of influence in plan pixels (inclusive).
    pub fn new(max_distance: f64) -> Result<Self, HeatmapError> {
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(HeatmapError::InvalidSettings(format!(
                "max_distance must be a non-negative finite number, got {}",
                max_distance
            )));
        }
        Ok(Self { max_distance })
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Weighted mean of in-range sample strengths with `w = 1 / (d + 1)`.
    /// Returns `None` when no sample lies within `max_distance` of `query`.
    pub fn estimate(&self, query: PlanPoint, samples: &[Sample]) -> Option<f64> {
        self.accumulate(query, samples.iter())
    }

    /// Same result as [`estimate`](Self::estimate), but only visits samples
    /// in buckets that can be in range.
    pub fn estimate_indexed(&self, query: PlanPoint, index: &SampleIndex<'_>) -> Option<f64> {
        let candidates = index.candidates(query);
        self.accumulate(query, candidates.into_iter().map(|i| &index.samples[i]))
    }

    pub fn build_index<'a>(&self, samples: &'a [Sample]) -> SampleIndex<'a> {
        SampleIndex::new(samples, self.max_distance)
    }

    fn accumulate<'a>(
        &self,
        query: PlanPoint,
        samples: impl Iterator<Item = &'a Sample>,
    ) -> Option<f64> {
        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        let mut in_range = 0usize;
        let mut last_strength = 0.0;

        for sample in samples.filter(|s| is_usable(s)) {
            let distance = query.distance_to(&sample.position);
            if distance <= self.max_distance {
                let weight = 1.0 / (distance + 1.0);
                total_weight += weight;
                weighted_sum += weight * sample.strength;
                in_range += 1;
                last_strength = sample.strength;
            }
        }

        match in_range {
            0 => None,
            // w * s / w can be off by an ulp
            1 => Some(last_strength),
            _ => Some(weighted_sum / total_weight),
        }
    }
}

fn is_usable(sample: &Sample) -> bool {
    sample.strength.is_finite() && sample.position.x.is_finite() && sample.position.y.is_finite()
}

/// Grid-bucket index over a sample slice. Bucket side equals the radius of
/// influence, so every in-range sample sits in the query's bucket or a
/// neighbouring one.
pub struct SampleIndex<'a> {
    samples: &'a [Sample],
    bucket_size: f64,
    reach: i64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl<'a> SampleIndex<'a> {
    fn new(samples: &'a [Sample], max_distance: f64) -> Self {
        let bucket_size = max_distance.max(1.0);
        let reach = (max_distance / bucket_size).ceil() as i64;

        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, sample) in samples.iter().enumerate() {
            if !is_usable(sample) {
                continue;
            }
            buckets
                .entry(bucket_of(sample.position, bucket_size))
                .or_default()
                .push(i);
        }

        Self {
            samples,
            bucket_size,
            reach,
            buckets,
        }
    }

    /// Candidate indices in original order, so the weighted sums accumulate
    /// in the same order as a full scan.
    fn candidates(&self, query: PlanPoint) -> Vec<usize> {
        let (bx, by) = bucket_of(query, self.bucket_size);
        let mut out = Vec::new();
        for dx in -self.reach..=self.reach {
            for dy in -self.reach..=self.reach {
                if let Some(indices) = self.buckets.get(&(bx + dx, by + dy)) {
                    out.extend_from_slice(indices);
                }
            }
        }
        out.sort_unstable();
        out
    }
}

fn bucket_of(point: PlanPoint, bucket_size: f64) -> (i64, i64) {
    (
        (point.x / bucket_size).floor() as i64,
        (point.y / bucket_size).floor() as i64,
    )
}
