//! Planar pose helpers shared by the car-like steering methods and metrics.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Below this planar distance two poses are considered co-located.
const POSITION_EPSILON: f64 = 1e-9;

/// Wraps an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
	let mut wrapped = angle % TAU;
	if wrapped <= -PI {
		wrapped += TAU;
	} else if wrapped > PI {
		wrapped -= TAU;
	}
	wrapped
}

/// Position and heading of a planar mobile base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPose {
	pub x: f64,
	pub y: f64,
	pub theta: f64,
}

impl PlanarPose {
	pub fn new(x: f64, y: f64, theta: f64) -> Self {
		Self { x, y, theta }
	}

	/// Distance between the two positions, headings ignored.
	pub fn planar_distance(&self, other: &PlanarPose) -> f64 {
		(other.x - self.x).hypot(other.y - self.y)
	}

	/// Bearing of `other` seen from `self`; falls back to `self.theta` when
	/// both poses share a position.
	pub fn bearing_to(&self, other: &PlanarPose) -> f64 {
		if self.planar_distance(other) < POSITION_EPSILON {
			self.theta
		} else {
			(other.y - self.y).atan2(other.x - self.x)
		}
	}
}

/// Turn-straight-turn manoeuvre between two planar poses.
///
/// The base turns on the spot of radius `radius` to the travel heading,
/// drives straight (forward, or backward when `reverse` is set), then turns to
/// the goal heading. The arcs are accounted for in the length but their
/// displacement is neglected; this is the approximation the built-in car-like
/// algorithms share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maneuver {
	pub first_turn: f64,
	pub travel_heading: f64,
	pub straight: f64,
	pub second_turn: f64,
	pub reverse: bool,
	pub radius: f64,
}

impl Maneuver {
	/// Plans the shortest manoeuvre; backward travel is considered only when
	/// `allow_reverse` is set.
	pub fn plan(from: &PlanarPose, to: &PlanarPose, radius: f64, allow_reverse: bool) -> Self {
		let straight = from.planar_distance(to);
		let bearing = from.bearing_to(to);

		let forward = Self::with_heading(from, to, radius, straight, bearing, false);
		if !allow_reverse {
			return forward;
		}

		let backward =
			Self::with_heading(from, to, radius, straight, normalize_angle(bearing + PI), true);
		if backward.length() < forward.length() {
			backward
		} else {
			forward
		}
	}

	fn with_heading(
		from: &PlanarPose,
		to: &PlanarPose,
		radius: f64,
		straight: f64,
		heading: f64,
		reverse: bool,
	) -> Self {
		Self {
			first_turn: normalize_angle(heading - from.theta),
			travel_heading: heading,
			straight,
			second_turn: normalize_angle(to.theta - heading),
			reverse,
			radius,
		}
	}

	/// Total length: straight travel plus both arcs.
	pub fn length(&self) -> f64 {
		self.straight + self.radius * (self.first_turn.abs() + self.second_turn.abs())
	}

	/// Key poses of the manoeuvre: start, end of first turn, end of straight
	/// segment, goal.
	pub fn key_poses(&self, from: &PlanarPose, to: &PlanarPose) -> [PlanarPose; 4] {
		[
			*from,
			PlanarPose::new(from.x, from.y, self.travel_heading),
			PlanarPose::new(to.x, to.y, self.travel_heading),
			*to,
		]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
	}

	#[test]
	fn test_normalize_angle() {
		assert_close(normalize_angle(0.0), 0.0);
		assert_close(normalize_angle(3.0 * PI), PI);
		assert_close(normalize_angle(-PI), PI);
		assert_close(normalize_angle(-PI / 2.0 - TAU), -PI / 2.0);
	}

	#[test]
	fn test_straight_ahead_is_pure_translation() {
		let from = PlanarPose::new(0.0, 0.0, 0.0);
		let to = PlanarPose::new(3.0, 0.0, 0.0);
		let maneuver = Maneuver::plan(&from, &to, 1.0, false);
		assert_close(maneuver.length(), 3.0);
		assert!(!maneuver.reverse);
	}

	#[test]
	fn test_reverse_shortens_goal_behind() {
		let from = PlanarPose::new(0.0, 0.0, 0.0);
		let to = PlanarPose::new(-2.0, 0.0, 0.0);

		let oriented = Maneuver::plan(&from, &to, 1.0, false);
		let free = Maneuver::plan(&from, &to, 1.0, true);

		assert_close(oriented.length(), 2.0 + TAU);
		assert_close(free.length(), 2.0);
		assert!(free.reverse);
	}

	#[test]
	fn test_rotation_in_place() {
		let from = PlanarPose::new(1.0, 1.0, 0.0);
		let to = PlanarPose::new(1.0, 1.0, PI / 2.0);
		let maneuver = Maneuver::plan(&from, &to, 2.0, false);
		assert_close(maneuver.length(), PI);
	}
}
