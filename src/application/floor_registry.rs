// Floors and the registry that owns them
use crate::application::position_tracker::{PositionTracker, TrackerConfig};
use crate::application::sample_store::SampleStore;
use crate::domain::error::{HeatmapError, HeatmapResult};
use crate::domain::geometry::Dimensions;
use serde::{Deserialize, Serialize};

/// Longest accepted plan side in pixels; larger plans would rasterize into
/// an unbounded number of cells.
pub const DEFAULT_MAX_FLOOR_SIDE: f64 = 20_000.0;

/// Plan image handed over by the image picker. Its dimensions become the
/// floor's dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanImage {
    pub uri: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct Floor {
    id: String,
    plan_image: Option<String>,
    dimensions: Dimensions,
    samples: SampleStore,
    tracker: PositionTracker,
}

impl Floor {
    fn new(
        id: String,
        plan_image: Option<String>,
        dimensions: Dimensions,
        tracker: PositionTracker,
    ) -> Self {
        Self {
            id,
            plan_image,
            dimensions,
            samples: SampleStore::new(),
            tracker,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plan_image(&self) -> Option<&str> {
        self.plan_image.as_deref()
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut SampleStore {
        &mut self.samples
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PositionTracker {
        &mut self.tracker
    }
}

#[derive(Debug, Clone)]
pub struct FloorPlanRegistry {
    floors: Vec<Floor>,
    current: Option<usize>,
    default_dimensions: Dimensions,
    tracker_config: TrackerConfig,
    sensitivity: f64,
    max_side: f64,
}

impl FloorPlanRegistry {
    pub fn new(default_dimensions: Dimensions, tracker_config: TrackerConfig, sensitivity: f64) -> Self {
        Self {
            floors: Vec::new(),
            current: None,
            default_dimensions,
            tracker_config,
            sensitivity,
            max_side: DEFAULT_MAX_FLOOR_SIDE,
        }
    }

    pub fn with_max_side(mut self, max_side: f64) -> Self {
        self.max_side = max_side;
        self
    }

    /// Add a named floor and make it current.
    pub fn add_floor(&mut self, name: &str, image: Option<PlanImage>) -> HeatmapResult<&Floor> {
        let id = name.trim();
        if id.is_empty() {
            return Err(HeatmapError::EmptyFloorName);
        }
        if self.position(id).is_some() {
            return Err(HeatmapError::DuplicateFloor(id.to_string()));
        }

        let (dimensions, plan_image) = match image {
            Some(image) => (
                Dimensions::bounded(image.width, image.height, self.max_side)?,
                Some(image.uri),
            ),
            None => (self.default_dimensions, None),
        };

        Ok(self.insert(id.to_string(), plan_image, dimensions))
    }

    /// Add a blank floor named `Floor N` and make it current.
    pub fn create_blank_floor(&mut self) -> &Floor {
        let mut n = self.floors.len() + 1;
        let mut id = format!("Floor {}", n);
        while self.position(&id).is_some() {
            n += 1;
            id = format!("Floor {}", n);
        }
        let dimensions = self.default_dimensions;
        self.insert(id, None, dimensions)
    }

    pub fn select(&mut self, id: &str) -> HeatmapResult<()> {
        let idx = self
            .position(id)
            .ok_or_else(|| HeatmapError::UnknownFloor(id.to_string()))?;
        self.current = Some(idx);
        tracing::info!("Selected floor {}", id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> HeatmapResult<&Floor> {
        self.position(id)
            .map(|idx| &self.floors[idx])
            .ok_or_else(|| HeatmapError::UnknownFloor(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> HeatmapResult<&mut Floor> {
        match self.position(id) {
            Some(idx) => Ok(&mut self.floors[idx]),
            None => Err(HeatmapError::UnknownFloor(id.to_string())),
        }
    }

    pub fn current(&self) -> Option<&Floor> {
        self.current.map(|idx| &self.floors[idx])
    }

    pub fn current_mut(&mut self) -> Option<&mut Floor> {
        self.current.map(|idx| &mut self.floors[idx])
    }

    pub fn list(&self) -> &[Floor] {
        &self.floors
    }

    /// Apply a new sensitivity to every floor's tracker and to floors created later
    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        self.sensitivity = sensitivity;
        for floor in &mut self.floors {
            floor.tracker.set_sensitivity(sensitivity);
        }
    }

    fn insert(&mut self, id: String, plan_image: Option<String>, dimensions: Dimensions) -> &Floor {
        tracing::info!(
            "Created floor {} ({}x{})",
            id,
            dimensions.width,
            dimensions.height
        );
        let tracker = PositionTracker::new(self.tracker_config, self.sensitivity);
        self.floors.push(Floor::new(id, plan_image, dimensions, tracker));
        let idx = self.floors.len() - 1;
        self.current = Some(idx);
        &self.floors[idx]
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.floors.iter().position(|f| f.id == id)
    }
}
