//! Robot configuration vectors.
//!
//! A configuration holds one value per degree of freedom of a robot. The
//! car-like algorithms read the first three values as a planar pose
//! `(x, y, θ)`; any further values are treated as plain joint values.

use crate::geometry::PlanarPose;
use serde::{Deserialize, Serialize};

/// A robot configuration: one value per degree of freedom.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(pub Vec<f64>);

impl Configuration {
	/// Creates a configuration from its degree-of-freedom values.
	pub fn new(dofs: Vec<f64>) -> Self {
		Self(dofs)
	}

	/// Number of degrees of freedom.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_slice(&self) -> &[f64] {
		&self.0
	}

	/// Returns the planar pose stored in the first three dofs, if present.
	pub fn planar_pose(&self) -> Option<PlanarPose> {
		match self.0.as_slice() {
			[x, y, theta, ..] => Some(PlanarPose::new(*x, *y, *theta)),
			_ => None,
		}
	}

	/// Euclidean norm of the difference between two configurations.
	///
	/// Returns `None` when the dimensions differ.
	pub fn euclidean_distance(&self, other: &Configuration) -> Option<f64> {
		if self.len() != other.len() {
			return None;
		}
		let sum: f64 = self
			.0
			.iter()
			.zip(other.0.iter())
			.map(|(a, b)| (b - a) * (b - a))
			.sum();
		Some(sum.sqrt())
	}

	/// Linear interpolation of every dof, `t = 0` at `self` and `t = 1` at `other`.
	///
	/// Extra dofs on the longer side are ignored.
	pub fn interpolate(&self, other: &Configuration, t: f64) -> Configuration {
		Configuration(
			self.0
				.iter()
				.zip(other.0.iter())
				.map(|(a, b)| a + (b - a) * t)
				.collect(),
		)
	}

	/// Copy of `self` with the planar part replaced by `pose`.
	pub fn with_planar_pose(&self, pose: PlanarPose) -> Configuration {
		let mut dofs = self.0.clone();
		if dofs.len() >= 3 {
			dofs[0] = pose.x;
			dofs[1] = pose.y;
			dofs[2] = pose.theta;
		}
		Configuration(dofs)
	}
}

impl From<Vec<f64>> for Configuration {
	fn from(dofs: Vec<f64>) -> Self {
		Self(dofs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_euclidean_distance() {
		let a = Configuration::new(vec![0.0, 0.0, 0.0]);
		let b = Configuration::new(vec![3.0, 4.0, 0.0]);
		assert_eq!(a.euclidean_distance(&b), Some(5.0));
	}

	#[test]
	fn test_distance_dimension_mismatch() {
		let a = Configuration::new(vec![0.0, 0.0]);
		let b = Configuration::new(vec![0.0, 0.0, 0.0]);
		assert_eq!(a.euclidean_distance(&b), None);
	}

	#[test]
	fn test_planar_pose_requires_three_dofs() {
		assert!(Configuration::new(vec![1.0, 2.0]).planar_pose().is_none());

		let pose = Configuration::new(vec![1.0, 2.0, 0.5, 7.0])
			.planar_pose()
			.unwrap();
		assert_eq!((pose.x, pose.y, pose.theta), (1.0, 2.0, 0.5));
	}

	#[test]
	fn test_interpolate_midpoint() {
		let a = Configuration::new(vec![0.0, 2.0]);
		let b = Configuration::new(vec![4.0, 6.0]);
		assert_eq!(a.interpolate(&b, 0.5), Configuration::new(vec![2.0, 4.0]));
	}

	#[test]
	fn test_serde_is_a_plain_array() {
		let config = Configuration::new(vec![1.0, 2.5]);
		let json = serde_json::to_string(&config).unwrap();
		assert_eq!(json, "[1.0,2.5]");
	}
}
