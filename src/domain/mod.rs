// Domain layer - Core value types and pure functions
pub mod anchor;
pub mod color;
pub mod error;
pub mod geometry;
pub mod heatmap;
pub mod sample;
