//! Car-like steering method with a bounded turning radius.
//!
//! The base turns to the travel heading, drives straight, then turns to the
//! goal heading. The non-oriented variant may drive backwards when that is
//! shorter; the oriented variant always drives forward. Dofs beyond the
//! planar pose are interpolated linearly along the manoeuvre.

use crate::{
	check_planar, SteeringError, SteeringFactoryBuilder, SteeringMethod, SteeringMethodFactory,
	SteeringRegistry,
};
use planner_types::{
	as_float, AlgorithmFactory, ConfigSchema, Configuration, Field, FieldType,
	ImplementationRegistry, Maneuver, Path, Schema, ValidationError,
};

/// Turning radius used when the configuration table omits one.
pub const DEFAULT_RADIUS: f64 = 1.0;

/// Turn-straight-turn steering method.
pub struct ReedsSheppSteeringMethod {
	radius: f64,
	oriented: bool,
}

impl ReedsSheppSteeringMethod {
	pub fn new(radius: f64, oriented: bool) -> Self {
		Self { radius, oriented }
	}

	pub fn radius(&self) -> f64 {
		self.radius
	}
}

impl SteeringMethod for ReedsSheppSteeringMethod {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn steer(&self, from: &Configuration, to: &Configuration) -> Result<Path, SteeringError> {
		check_planar(Registry::NAME, from, to)?;
		let (Some(start), Some(goal)) = (from.planar_pose(), to.planar_pose()) else {
			return Err(SteeringError::UnsupportedConfiguration(
				"missing planar pose".to_string(),
			));
		};

		let maneuver = Maneuver::plan(&start, &goal, self.radius, !self.oriented);
		let length = maneuver.length();

		// Progress of the remaining dofs at each key pose.
		let first_arc = self.radius * maneuver.first_turn.abs();
		let progress = if length > 0.0 {
			[
				0.0,
				first_arc / length,
				(first_arc + maneuver.straight) / length,
				1.0,
			]
		} else {
			[0.0, 0.0, 1.0, 1.0]
		};

		let waypoints = maneuver
			.key_poses(&start, &goal)
			.iter()
			.zip(progress)
			.map(|(pose, t)| from.interpolate(to, t).with_planar_pose(*pose))
			.collect();

		Ok(Path::new(waypoints, length)?)
	}
}

/// Factory capturing the turning radius.
pub struct ReedsSheppSteeringFactory {
	radius: f64,
}

impl ReedsSheppSteeringFactory {
	pub fn new(radius: f64) -> Self {
		Self { radius }
	}
}

impl AlgorithmFactory<dyn SteeringMethod> for ReedsSheppSteeringFactory {
	fn create(&self, oriented: bool) -> Box<dyn SteeringMethod> {
		Box::new(ReedsSheppSteeringMethod::new(self.radius, oriented))
	}
}

/// Configuration schema for the car-like steering method.
pub struct ReedsSheppSchema;

impl ReedsSheppSchema {
	/// Validates the table and returns the turning radius.
	pub fn radius(config: &toml::Value) -> Result<f64, ValidationError> {
		Self.validate(config)?;
		Ok(config
			.get("radius")
			.and_then(as_float)
			.unwrap_or(DEFAULT_RADIUS))
	}
}

impl ConfigSchema for ReedsSheppSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"radius",
				FieldType::Float {
					min: None,
					max: None,
				},
			)
			.with_validator(|value| match as_float(value) {
				Some(r) if r > 0.0 && r.is_finite() => Ok(()),
				_ => Err("turning radius must be a positive number".to_string()),
			})],
		);
		schema.validate(config)
	}
}

/// Builds the car-like steering factory from configuration.
pub fn create_factory(config: &toml::Value) -> Result<Box<SteeringMethodFactory>, SteeringError> {
	let radius = ReedsSheppSchema::radius(config)
		.map_err(|e| SteeringError::Configuration(format!("Invalid rs config: {}", e)))?;
	tracing::debug!(radius, "Configured car-like steering factory");
	Ok(Box::new(ReedsSheppSteeringFactory::new(radius)))
}

/// Registry for the car-like steering method.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "rs";
	type Factory = SteeringFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl SteeringRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f64::consts::{PI, TAU};

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
	}

	#[test]
	fn test_forward_straight() {
		let method = ReedsSheppSteeringMethod::new(1.0, true);
		let from = Configuration::new(vec![0.0, 0.0, 0.0]);
		let to = Configuration::new(vec![4.0, 0.0, 0.0]);

		let path = method.steer(&from, &to).unwrap();
		assert_close(path.length(), 4.0);
		assert_eq!(path.start(), &from);
		assert_eq!(path.end(), &to);
	}

	#[test]
	fn test_oriented_refuses_to_reverse() {
		let from = Configuration::new(vec![0.0, 0.0, 0.0]);
		let to = Configuration::new(vec![-2.0, 0.0, 0.0]);

		let oriented = ReedsSheppSteeringMethod::new(1.0, true)
			.steer(&from, &to)
			.unwrap();
		let free = ReedsSheppSteeringMethod::new(1.0, false)
			.steer(&from, &to)
			.unwrap();

		assert_close(oriented.length(), 2.0 + TAU);
		assert_close(free.length(), 2.0);
		// Reversing keeps the heading during the straight segment.
		assert_close(free.waypoints()[2].as_slice()[2], 0.0);
	}

	#[test]
	fn test_radius_scales_turns() {
		let from = Configuration::new(vec![0.0, 0.0, 0.0]);
		let to = Configuration::new(vec![0.0, 0.0, PI / 2.0]);
		let path = ReedsSheppSteeringMethod::new(3.0, true)
			.steer(&from, &to)
			.unwrap();
		assert_close(path.length(), 3.0 * PI / 2.0);
	}

	#[test]
	fn test_extra_dofs_interpolated() {
		let from = Configuration::new(vec![0.0, 0.0, 0.0, 10.0]);
		let to = Configuration::new(vec![2.0, 0.0, 0.0, 20.0]);
		let path = ReedsSheppSteeringMethod::new(1.0, true)
			.steer(&from, &to)
			.unwrap();
		assert_close(path.config_at_param(1.0).unwrap().as_slice()[3], 15.0);
	}

	#[test]
	fn test_needs_planar_pose() {
		let method = ReedsSheppSteeringMethod::new(1.0, false);
		let result = method.steer(
			&Configuration::new(vec![0.0, 0.0]),
			&Configuration::new(vec![1.0, 0.0]),
		);
		assert!(matches!(
			result,
			Err(SteeringError::UnsupportedConfiguration(_))
		));
	}

	#[test]
	fn test_factory_radius() {
		let config: toml::Value = toml::from_str("radius = 2.5").unwrap();
		assert_eq!(ReedsSheppSchema::radius(&config).unwrap(), 2.5);

		let empty: toml::Value = toml::from_str("").unwrap();
		assert_eq!(ReedsSheppSchema::radius(&empty).unwrap(), DEFAULT_RADIUS);

		let bad: toml::Value = toml::from_str("radius = -1.0").unwrap();
		assert!(matches!(
			create_factory(&bad),
			Err(SteeringError::Configuration(_))
		));
	}
}
