//! Planning problem state and direct-connection solving.

use crate::{Obstacle, PlannerError};
use planner_distance::implementations::linear::LinearDistanceFactory;
use planner_distance::DistanceFunction;
use planner_steering::implementations::linear::LinearSteeringMethod;
use planner_steering::SteeringMethod;
use planner_types::{AlgorithmFactory, Configuration, Path};
use std::collections::BTreeMap;

/// The robot being planned for.
#[derive(Debug, Clone, PartialEq)]
pub struct Robot {
	pub name: String,
	pub config_size: usize,
	pub current_config: Configuration,
}

/// State of one planning problem.
pub struct Planner {
	robot: Option<Robot>,
	obstacles: BTreeMap<String, Obstacle>,
	initial_config: Option<Configuration>,
	goal_configs: Vec<Configuration>,
	steering: Box<dyn SteeringMethod>,
	distance: Box<dyn DistanceFunction>,
	paths: Vec<Path>,
}

impl Default for Planner {
	fn default() -> Self {
		Self::new()
	}
}

impl Planner {
	/// Creates an empty problem using non-oriented linear steering and
	/// Euclidean distance.
	pub fn new() -> Self {
		Self {
			robot: None,
			obstacles: BTreeMap::new(),
			initial_config: None,
			goal_configs: Vec::new(),
			steering: Box::new(LinearSteeringMethod::new(false)),
			distance: LinearDistanceFactory.create(false),
			paths: Vec::new(),
		}
	}

	/// Creates the robot, replacing any previous one. Configurations and
	/// paths of the previous robot are discarded.
	pub fn create_robot(&mut self, name: &str, config_size: usize) -> Result<(), PlannerError> {
		if name.is_empty() {
			return Err(PlannerError::InvalidRobot("name cannot be empty".into()));
		}
		if config_size == 0 {
			return Err(PlannerError::InvalidRobot(
				"configuration size must be at least 1".into(),
			));
		}

		self.robot = Some(Robot {
			name: name.to_string(),
			config_size,
			current_config: Configuration::new(vec![0.0; config_size]),
		});
		self.initial_config = None;
		self.goal_configs.clear();
		self.paths.clear();
		tracing::info!(robot = %name, config_size, "Created robot");
		Ok(())
	}

	pub fn robot(&self) -> Result<&Robot, PlannerError> {
		self.robot.as_ref().ok_or(PlannerError::NoRobot)
	}

	fn check_config(&self, config: &Configuration) -> Result<(), PlannerError> {
		let robot = self.robot()?;
		if config.len() != robot.config_size {
			return Err(PlannerError::DimensionMismatch {
				expected: robot.config_size,
				actual: config.len(),
			});
		}
		Ok(())
	}

	pub fn set_current_config(&mut self, config: Configuration) -> Result<(), PlannerError> {
		self.check_config(&config)?;
		if let Some(robot) = self.robot.as_mut() {
			robot.current_config = config;
		}
		Ok(())
	}

	pub fn current_config(&self) -> Result<&Configuration, PlannerError> {
		Ok(&self.robot()?.current_config)
	}

	pub fn add_obstacle(&mut self, name: &str, obstacle: Obstacle) -> Result<(), PlannerError> {
		if name.is_empty() {
			return Err(PlannerError::InvalidObstacle("name cannot be empty".into()));
		}
		if !obstacle.shape.is_valid() {
			return Err(PlannerError::InvalidObstacle(format!(
				"{} has non-positive dimensions",
				name
			)));
		}
		if self.obstacles.contains_key(name) {
			return Err(PlannerError::ObstacleExists(name.to_string()));
		}
		self.obstacles.insert(name.to_string(), obstacle);
		tracing::debug!(obstacle = %name, "Added obstacle");
		Ok(())
	}

	pub fn remove_obstacle(&mut self, name: &str) -> Result<Obstacle, PlannerError> {
		self.obstacles
			.remove(name)
			.ok_or_else(|| PlannerError::UnknownObstacle(name.to_string()))
	}

	pub fn obstacle(&self, name: &str) -> Result<&Obstacle, PlannerError> {
		self.obstacles
			.get(name)
			.ok_or_else(|| PlannerError::UnknownObstacle(name.to_string()))
	}

	/// Obstacle names in lexicographic order.
	pub fn obstacle_names(&self) -> Vec<String> {
		self.obstacles.keys().cloned().collect()
	}

	pub fn set_initial_config(&mut self, config: Configuration) -> Result<(), PlannerError> {
		self.check_config(&config)?;
		self.initial_config = Some(config);
		Ok(())
	}

	pub fn initial_config(&self) -> Option<&Configuration> {
		self.initial_config.as_ref()
	}

	pub fn add_goal_config(&mut self, config: Configuration) -> Result<(), PlannerError> {
		self.check_config(&config)?;
		self.goal_configs.push(config);
		Ok(())
	}

	pub fn goal_configs(&self) -> &[Configuration] {
		&self.goal_configs
	}

	pub fn reset_goal_configs(&mut self) {
		self.goal_configs.clear();
	}

	pub fn set_steering_method(&mut self, steering: Box<dyn SteeringMethod>) {
		tracing::info!(
			steering = steering.name(),
			oriented = steering.is_oriented(),
			"Selected steering method"
		);
		self.steering = steering;
	}

	pub fn steering_method(&self) -> &dyn SteeringMethod {
		self.steering.as_ref()
	}

	pub fn set_distance_function(&mut self, distance: Box<dyn DistanceFunction>) {
		tracing::info!(
			distance = distance.name(),
			oriented = distance.is_oriented(),
			"Selected distance function"
		);
		self.distance = distance;
	}

	pub fn distance_function(&self) -> &dyn DistanceFunction {
		self.distance.as_ref()
	}

	/// Steers from `start` to `end` and stores the path; returns its id.
	pub fn direct_path(
		&mut self,
		start: &Configuration,
		end: &Configuration,
	) -> Result<usize, PlannerError> {
		self.check_config(start)?;
		self.check_config(end)?;
		let path = self.steering.steer(start, end)?;
		Ok(self.store(path))
	}

	/// Connects the initial configuration to the closest goal under the
	/// selected distance function; returns the id of the new path.
	pub fn solve(&mut self) -> Result<usize, PlannerError> {
		let init = self
			.initial_config
			.clone()
			.ok_or(PlannerError::NoInitialConfig)?;

		let mut best: Option<(f64, &Configuration)> = None;
		for goal in &self.goal_configs {
			let distance = self.distance.distance(&init, goal)?;
			if best.is_none_or(|(d, _)| distance < d) {
				best = Some((distance, goal));
			}
		}
		let (distance, goal) = best.ok_or(PlannerError::NoGoalConfig)?;
		let goal = goal.clone();

		let path = self.steering.steer(&init, &goal)?;
		tracing::info!(
			steering = self.steering.name(),
			distance_function = self.distance.name(),
			distance,
			length = path.length(),
			"Solved problem"
		);
		Ok(self.store(path))
	}

	fn store(&mut self, path: Path) -> usize {
		self.paths.push(path);
		self.paths.len() - 1
	}

	pub fn number_paths(&self) -> usize {
		self.paths.len()
	}

	pub fn path(&self, id: usize) -> Result<&Path, PlannerError> {
		self.paths.get(id).ok_or(PlannerError::UnknownPath(id))
	}

	pub fn path_length(&self, id: usize) -> Result<f64, PlannerError> {
		Ok(self.path(id)?.length())
	}

	pub fn config_at_param(&self, id: usize, param: f64) -> Result<Configuration, PlannerError> {
		Ok(self.path(id)?.config_at_param(param)?)
	}

	pub fn waypoints(&self, id: usize) -> Result<&[Configuration], PlannerError> {
		Ok(self.path(id)?.waypoints())
	}

	pub fn clear_paths(&mut self) {
		self.paths.clear();
	}
}
