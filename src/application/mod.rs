// Application layer - Heatmap engine and session use cases
pub mod capture_controller;
pub mod floor_registry;
pub mod heatmap_service;
pub mod interpolator;
pub mod ports;
pub mod position_tracker;
pub mod rasterizer;
pub mod reading;
pub mod sample_store;
