// Error taxonomy for the heatmap session
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeatmapError {
    #[error("Location or WiFi permission denied")]
    PermissionDenied,

    #[error("WiFi scan failed: {0}")]
    ScanFailure(String),

    #[error("Please place a marker on the floor plan before capturing")]
    NoMarkerPlaced,

    #[error("Capturing is not active")]
    NotCapturing,

    #[error("Capturing is already active")]
    AlreadyCapturing,

    #[error("No floor is selected")]
    NoCurrentFloor,

    #[error("Unknown floor: {0}")]
    UnknownFloor(String),

    #[error("Floor already exists: {0}")]
    DuplicateFloor(String),

    #[error("Floor name must not be empty")]
    EmptyFloorName,

    #[error("Invalid floor dimensions {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("Cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for session operations
pub type HeatmapResult<T> = Result<T, HeatmapError>;
