//! Servants publishing the planner.
//!
//! Each servant is a thin relay: it decodes the JSON arguments of an
//! operation, calls the planner under its lock and encodes the result.
//! Operation names and argument fields are camelCase.

use planner_broker::ServantError;
use planner_core::{Planner, PlannerHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{MutexGuard, PoisonError};

pub mod obstacle;
pub mod problem;
pub mod robot;

pub use obstacle::ObstacleServant;
pub use problem::ProblemServant;
pub use robot::RobotServant;

/// Decodes the arguments of an operation.
pub(crate) fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ServantError> {
	Ok(serde_json::from_value(args)?)
}

/// Encodes the result of an operation.
pub(crate) fn reply<T: Serialize>(value: T) -> Result<Value, ServantError> {
	serde_json::to_value(value).map_err(|e| ServantError::Failed(e.to_string()))
}

pub(crate) fn failed(err: impl std::fmt::Display) -> ServantError {
	ServantError::Failed(err.to_string())
}

pub(crate) fn unknown(interface: &'static str, operation: &str) -> ServantError {
	ServantError::UnknownOperation {
		interface,
		operation: operation.to_string(),
	}
}

pub(crate) fn lock(planner: &PlannerHandle) -> MutexGuard<'_, Planner> {
	planner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod testing {
	use planner_broker::{Servant, ServantError};
	use serde_json::Value;

	/// Dispatches directly, bypassing the broker.
	pub fn call(servant: &mut dyn Servant, operation: &str, args: Value) -> Result<Value, ServantError> {
		servant.dispatch(operation, args)
	}
}
