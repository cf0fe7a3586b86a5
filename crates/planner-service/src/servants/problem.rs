//! Problem servant.
//!
//! Besides relaying configurations and paths, the problem object is where
//! callers select the steering method and the distance function. Selection
//! goes through the server's factory registries, so only registered names
//! are accepted.

use super::{failed, lock, parse, reply, unknown};
use crate::server::ServerContext;
use planner_broker::{Servant, ServantError};
use planner_types::Configuration;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const INTERFACE: &str = "Problem";

#[derive(Debug, Deserialize)]
struct Dofs {
	dofs: Configuration,
}

#[derive(Debug, Deserialize)]
struct Selection {
	name: String,
	#[serde(default)]
	oriented: bool,
}

#[derive(Debug, Deserialize)]
struct Endpoints {
	start: Configuration,
	end: Configuration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathRef {
	path_id: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathParam {
	path_id: usize,
	param: f64,
}

/// Defines and solves the planning problem.
pub struct ProblemServant {
	context: Arc<ServerContext>,
}

impl ProblemServant {
	pub fn new(context: Arc<ServerContext>) -> Self {
		Self { context }
	}

	fn select_steering_method(&self, args: Value) -> Result<Value, ServantError> {
		let args: Selection = parse(args)?;
		let method = self
			.context
			.create_steering_method(&args.name, args.oriented)
			.ok_or_else(|| {
				ServantError::Failed(format!(
					"Unknown steering method '{}'. Available: [{}]",
					args.name,
					self.context.steering_method_names().join(", ")
				))
			})?;
		lock(self.context.planner()).set_steering_method(method);
		Ok(Value::Null)
	}

	fn select_distance(&self, args: Value) -> Result<Value, ServantError> {
		let args: Selection = parse(args)?;
		let distance = self
			.context
			.create_distance_function(&args.name, args.oriented)
			.ok_or_else(|| {
				ServantError::Failed(format!(
					"Unknown distance function '{}'. Available: [{}]",
					args.name,
					self.context.distance_function_names().join(", ")
				))
			})?;
		lock(self.context.planner()).set_distance_function(distance);
		Ok(Value::Null)
	}
}

impl Servant for ProblemServant {
	fn interface(&self) -> &'static str {
		INTERFACE
	}

	fn dispatch(&mut self, operation: &str, args: Value) -> Result<Value, ServantError> {
		match operation {
			"selectSteeringMethod" => return self.select_steering_method(args),
			"selectDistance" => return self.select_distance(args),
			_ => {},
		}

		let mut planner = lock(self.context.planner());
		match operation {
			"setInitialConfig" => {
				let args: Dofs = parse(args)?;
				planner.set_initial_config(args.dofs).map_err(failed)?;
				Ok(Value::Null)
			},
			"getInitialConfig" => reply(planner.initial_config()),
			"addGoalConfig" => {
				let args: Dofs = parse(args)?;
				planner.add_goal_config(args.dofs).map_err(failed)?;
				Ok(Value::Null)
			},
			"getGoalConfigs" => reply(planner.goal_configs()),
			"resetGoalConfigs" => {
				planner.reset_goal_configs();
				Ok(Value::Null)
			},
			"directPath" => {
				let args: Endpoints = parse(args)?;
				reply(planner.direct_path(&args.start, &args.end).map_err(failed)?)
			},
			"solve" => reply(planner.solve().map_err(failed)?),
			"numberPaths" => reply(planner.number_paths()),
			"pathLength" => {
				let args: PathRef = parse(args)?;
				reply(planner.path_length(args.path_id).map_err(failed)?)
			},
			"configAtParam" => {
				let args: PathParam = parse(args)?;
				reply(planner.config_at_param(args.path_id, args.param).map_err(failed)?)
			},
			"getWaypoints" => {
				let args: PathRef = parse(args)?;
				reply(planner.waypoints(args.path_id).map_err(failed)?)
			},
			"clearPaths" => {
				planner.clear_paths();
				Ok(Value::Null)
			},
			other => Err(unknown(INTERFACE, other)),
		}
	}
}
