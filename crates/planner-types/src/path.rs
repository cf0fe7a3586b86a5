//! Paths produced by steering methods.
//!
//! A path is a polyline of configurations together with the length the
//! steering method assigned to it. The length is the algorithm's own measure
//! (it accounts for turning arcs for car-like methods), so the parameter range
//! of a path is `[0, length]`, spread over the polyline in proportion to the
//! Euclidean length of its segments.

use crate::Configuration;
use thiserror::Error;

/// Errors that can occur when building or sampling a path.
#[derive(Debug, Error, PartialEq)]
pub enum PathError {
	#[error("Path must contain at least one waypoint")]
	Empty,
	#[error("Waypoint {index} has {actual} dofs, expected {expected}")]
	DimensionMismatch {
		index: usize,
		expected: usize,
		actual: usize,
	},
	#[error("Invalid path length: {0}")]
	InvalidLength(f64),
	#[error("Parameter {param} outside of path range [0, {length}]")]
	ParameterOutOfRange { param: f64, length: f64 },
}

/// A path between two configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
	waypoints: Vec<Configuration>,
	length: f64,
}

impl Path {
	/// Creates a path, checking that waypoints share a dimension and that the
	/// length is finite and non-negative.
	pub fn new(waypoints: Vec<Configuration>, length: f64) -> Result<Self, PathError> {
		let first = waypoints.first().ok_or(PathError::Empty)?;
		let expected = first.len();
		for (index, waypoint) in waypoints.iter().enumerate() {
			if waypoint.len() != expected {
				return Err(PathError::DimensionMismatch {
					index,
					expected,
					actual: waypoint.len(),
				});
			}
		}
		if !length.is_finite() || length < 0.0 {
			return Err(PathError::InvalidLength(length));
		}
		Ok(Self { waypoints, length })
	}

	pub fn waypoints(&self) -> &[Configuration] {
		&self.waypoints
	}

	pub fn length(&self) -> f64 {
		self.length
	}

	pub fn start(&self) -> &Configuration {
		&self.waypoints[0]
	}

	pub fn end(&self) -> &Configuration {
		&self.waypoints[self.waypoints.len() - 1]
	}

	/// Appends `other`, whose first waypoint is expected to coincide with the
	/// end of `self`; that duplicate waypoint is dropped.
	pub fn append(&mut self, other: Path) -> Result<(), PathError> {
		let expected = self.start().len();
		if other.start().len() != expected {
			return Err(PathError::DimensionMismatch {
				index: self.waypoints.len(),
				expected,
				actual: other.start().len(),
			});
		}
		self.length += other.length;
		self.waypoints.extend(other.waypoints.into_iter().skip(1));
		Ok(())
	}

	/// Configuration at curvilinear parameter `param` in `[0, length]`.
	pub fn config_at_param(&self, param: f64) -> Result<Configuration, PathError> {
		if !(0.0..=self.length).contains(&param) {
			return Err(PathError::ParameterOutOfRange {
				param,
				length: self.length,
			});
		}
		if self.waypoints.len() == 1 || self.length == 0.0 {
			return Ok(self.start().clone());
		}

		let segments: Vec<f64> = self
			.waypoints
			.windows(2)
			.map(|pair| pair[0].euclidean_distance(&pair[1]).unwrap_or(0.0))
			.collect();
		let total: f64 = segments.iter().sum();

		// Degenerate polyline: spread the parameter uniformly over segments.
		let weights: Vec<f64> = if total > 0.0 {
			segments
		} else {
			vec![1.0; segments.len()]
		};
		let total: f64 = weights.iter().sum();

		let mut remaining = param / self.length * total;
		for (index, weight) in weights.iter().enumerate() {
			if remaining <= *weight || index == weights.len() - 1 {
				let t = if *weight > 0.0 {
					(remaining / weight).min(1.0)
				} else {
					0.0
				};
				return Ok(self.waypoints[index].interpolate(&self.waypoints[index + 1], t));
			}
			remaining -= weight;
		}

		Ok(self.end().clone())
	}
}
