//! Weighted planar distance matching the Hermite-curve steering method.
//!
//! Sums the planar distance of the positions and the heading change scaled by
//! `angular_weight`. The non-oriented variant treats opposite headings as
//! equivalent, since the base may drive either way.

use crate::{
	planar_poses, DistanceError, DistanceFactoryBuilder, DistanceFunction,
	DistanceFunctionFactory, DistanceRegistry,
};
use planner_types::{
	as_float, normalize_angle, AlgorithmFactory, ConfigSchema, Configuration, Field, FieldType,
	ImplementationRegistry, Schema, ValidationError,
};
use std::f64::consts::PI;

pub const DEFAULT_ANGULAR_WEIGHT: f64 = 1.0;

pub struct FlicDistance {
	angular_weight: f64,
	oriented: bool,
}

impl DistanceFunction for FlicDistance {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn distance(&self, a: &Configuration, b: &Configuration) -> Result<f64, DistanceError> {
		let (from, to) = planar_poses(Registry::NAME, a, b)?;
		let mut turn = normalize_angle(to.theta - from.theta).abs();
		if !self.oriented && turn > PI / 2.0 {
			turn = PI - turn;
		}
		Ok(from.planar_distance(&to) + self.angular_weight * turn)
	}
}

pub struct FlicDistanceFactory {
	angular_weight: f64,
}

impl AlgorithmFactory<dyn DistanceFunction> for FlicDistanceFactory {
	fn create(&self, oriented: bool) -> Box<dyn DistanceFunction> {
		Box::new(FlicDistance {
			angular_weight: self.angular_weight,
			oriented,
		})
	}
}

pub struct FlicDistanceSchema;

impl ConfigSchema for FlicDistanceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"angular_weight",
				FieldType::Float {
					min: Some(0.0),
					max: None,
				},
			)],
		);
		schema.validate(config)
	}
}

pub fn create_factory(
	config: &toml::Value,
) -> Result<Box<DistanceFunctionFactory>, DistanceError> {
	FlicDistanceSchema
		.validate(config)
		.map_err(|e| DistanceError::Configuration(format!("Invalid flic config: {}", e)))?;

	let angular_weight = config
		.get("angular_weight")
		.and_then(as_float)
		.unwrap_or(DEFAULT_ANGULAR_WEIGHT);

	Ok(Box::new(FlicDistanceFactory { angular_weight }))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "flic";
	type Factory = DistanceFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl DistanceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
	}

	#[test]
	fn test_opposite_heading() {
		let a = Configuration::new(vec![0.0, 0.0, 0.0]);
		let b = Configuration::new(vec![3.0, 4.0, PI]);

		let oriented = FlicDistanceFactory { angular_weight: 1.0 }.create(true);
		let free = FlicDistanceFactory { angular_weight: 1.0 }.create(false);

		assert_close(oriented.distance(&a, &b).unwrap(), 5.0 + PI);
		assert_close(free.distance(&a, &b).unwrap(), 5.0);
	}

	#[test]
	fn test_angular_weight() {
		let config: toml::Value = toml::from_str("angular_weight = 0.5").unwrap();
		let metric = create_factory(&config).unwrap().create(true);
		let d = metric
			.distance(
				&Configuration::new(vec![0.0, 0.0, 0.0]),
				&Configuration::new(vec![0.0, 0.0, PI / 2.0]),
			)
			.unwrap();
		assert_close(d, PI / 4.0);

		let config: toml::Value = toml::from_str("angular_weight = -1.0").unwrap();
		assert!(create_factory(&config).is_err());
	}
}
