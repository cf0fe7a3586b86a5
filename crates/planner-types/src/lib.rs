//! Common types module for the motion-planning server.
//!
//! This module defines the data types shared by the planner, the algorithm
//! crates and the remote server: robot configurations, paths, the algorithm
//! factory capability and the self-registration trait used by every
//! algorithm implementation.

/// Robot configuration vectors.
pub mod configuration;
/// Algorithm factory capability.
pub mod factory;
/// Planar pose helpers shared by the car-like algorithms.
pub mod geometry;
/// Paths produced by steering methods.
pub mod path;
/// Self-registration trait for algorithm implementations.
pub mod registry;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use configuration::Configuration;
pub use factory::AlgorithmFactory;
pub use geometry::{normalize_angle, Maneuver, PlanarPose};
pub use path::{Path, PathError};
pub use registry::ImplementationRegistry;
pub use validation::*;
