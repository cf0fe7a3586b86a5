//! Obstacles of the planning problem.

use serde::{Deserialize, Serialize};

/// Geometric primitive of an obstacle, dimensions in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
	Box { x: f64, y: f64, z: f64 },
	Sphere { radius: f64 },
	Cylinder { radius: f64, height: f64 },
}

impl Shape {
	/// Whether every dimension is finite and strictly positive.
	pub fn is_valid(&self) -> bool {
		let dims: &[f64] = match self {
			Shape::Box { x, y, z } => &[*x, *y, *z],
			Shape::Sphere { radius } => &[*radius],
			Shape::Cylinder { radius, height } => &[*radius, *height],
		};
		dims.iter().all(|d| d.is_finite() && *d > 0.0)
	}
}

/// An obstacle placed in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
	pub shape: Shape,
	/// Position of the obstacle's center.
	pub position: [f64; 3],
}

impl Obstacle {
	pub fn new(shape: Shape, position: [f64; 3]) -> Self {
		Self { shape, position }
	}
}
