//! Servant capability.

use crate::ServantError;
use serde_json::Value;

/// An object implementation activated in an adapter.
///
/// The broker calls `dispatch` on the pumping thread only, never
/// concurrently, so implementations may hold non-reentrant state.
pub trait Servant: Send {
	/// Interface name reported in errors and diagnostics.
	fn interface(&self) -> &'static str;

	/// Handles `operation` with its JSON arguments and returns the JSON reply.
	fn dispatch(&mut self, operation: &str, args: Value) -> Result<Value, ServantError>;
}
