//! Car-like distance: the length of the turn-straight-turn manoeuvre the
//! matching steering method would drive.

use crate::{
	planar_poses, DistanceError, DistanceFactoryBuilder, DistanceFunction,
	DistanceFunctionFactory, DistanceRegistry,
};
use planner_types::{
	as_float, AlgorithmFactory, ConfigSchema, Configuration, Field, FieldType,
	ImplementationRegistry, Maneuver, Schema, ValidationError,
};

/// Turning radius used when the configuration table omits one.
pub const DEFAULT_RADIUS: f64 = 1.0;

pub struct ReedsSheppDistance {
	radius: f64,
	oriented: bool,
}

impl ReedsSheppDistance {
	pub fn new(radius: f64, oriented: bool) -> Self {
		Self { radius, oriented }
	}
}

impl DistanceFunction for ReedsSheppDistance {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn distance(&self, a: &Configuration, b: &Configuration) -> Result<f64, DistanceError> {
		let (from, to) = planar_poses(Registry::NAME, a, b)?;
		Ok(Maneuver::plan(&from, &to, self.radius, !self.oriented).length())
	}
}

pub struct ReedsSheppDistanceFactory {
	radius: f64,
}

impl AlgorithmFactory<dyn DistanceFunction> for ReedsSheppDistanceFactory {
	fn create(&self, oriented: bool) -> Box<dyn DistanceFunction> {
		Box::new(ReedsSheppDistance::new(self.radius, oriented))
	}
}

pub struct ReedsSheppDistanceSchema;

impl ConfigSchema for ReedsSheppDistanceSchema {
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

pub fn create_factory(
	config: &toml::Value,
) -> Result<Box<DistanceFunctionFactory>, DistanceError> {
	ReedsSheppDistanceSchema
		.validate(config)
		.map_err(|e| DistanceError::Configuration(format!("Invalid rs config: {}", e)))?;

	let radius = config
		.get("radius")
		.and_then(as_float)
		.unwrap_or(DEFAULT_RADIUS);
	tracing::debug!(radius, "Configured car-like distance factory");

	Ok(Box::new(ReedsSheppDistanceFactory { radius }))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "rs";
	type Factory = DistanceFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl DistanceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use std::f64::consts::TAU;

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
	}

	#[test]
	fn test_oriented_pays_for_turning_around() {
		let a = Configuration::new(vec![0.0, 0.0, 0.0]);
		let b = Configuration::new(vec![-2.0, 0.0, 0.0]);

		let oriented = ReedsSheppDistance::new(1.0, true).distance(&a, &b).unwrap();
		let free = ReedsSheppDistance::new(1.0, false).distance(&a, &b).unwrap();

		assert_close(oriented, 2.0 + TAU);
		assert_close(free, 2.0);
	}

	#[test]
	fn test_needs_planar_pose() {
		let metric = ReedsSheppDistance::new(1.0, true);
		assert!(matches!(
			metric.distance(&Configuration::new(vec![0.0]), &Configuration::new(vec![1.0])),
			Err(DistanceError::UnsupportedConfiguration(_))
		));
	}

	#[test]
	fn test_radius_from_config() {
		let config: toml::Value = toml::from_str("radius = 2").unwrap();
		let metric = create_factory(&config).unwrap().create(true);
		let d = metric
			.distance(
				&Configuration::new(vec![0.0, 0.0, 0.0]),
				&Configuration::new(vec![0.0, 0.0, TAU / 4.0]),
			)
			.unwrap();
		assert_close(d, TAU / 2.0);

		let config: toml::Value = toml::from_str("radius = 0").unwrap();
		assert!(create_factory(&config).is_err());
	}
}
