//! Core planning module for the motion-planning server.
//!
//! The [`Planner`] holds the state of one planning problem: the robot, the
//! obstacles, the initial and goal configurations, the selected steering
//! method and distance function, and the paths computed so far. It is not
//! reentrant; the server shares it behind a [`PlannerHandle`] and serializes
//! every access.

use planner_distance::DistanceError;
use planner_steering::SteeringError;
use planner_types::PathError;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub mod obstacle;
pub mod planner;

pub use obstacle::{Obstacle, Shape};
pub use planner::{Planner, Robot};

/// Shared, serialized access to a planner.
pub type PlannerHandle = Arc<Mutex<Planner>>;

/// Errors that can occur during planning operations.
#[derive(Debug, Error)]
pub enum PlannerError {
	#[error("No robot has been created")]
	NoRobot,
	#[error("Invalid robot: {0}")]
	InvalidRobot(String),
	#[error("Configuration has {actual} dofs, robot has {expected}")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("No initial configuration")]
	NoInitialConfig,
	#[error("No goal configuration")]
	NoGoalConfig,
	#[error("Obstacle already exists: {0}")]
	ObstacleExists(String),
	#[error("Unknown obstacle: {0}")]
	UnknownObstacle(String),
	#[error("Invalid obstacle: {0}")]
	InvalidObstacle(String),
	#[error("Unknown path: {0}")]
	UnknownPath(usize),
	#[error("Steering error: {0}")]
	Steering(#[from] SteeringError),
	#[error("Distance error: {0}")]
	Distance(#[from] DistanceError),
	#[error("Path error: {0}")]
	Path(#[from] PathError),
}
