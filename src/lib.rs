//! tumble - headless rigid-body simulation host
//!
//! Library half of the application: layered configuration, scene
//! construction and the fixed-timestep loop around the physics core.

pub mod config;
pub mod scene;
pub mod systems;
