//! Remote-object runtime for the motion-planning server.
//!
//! This crate provides the object request broker the server publishes its
//! servants through: a root object adapter and child adapters with thread
//! policies, adapter managers that hold or release queued requests, object
//! references with request/reply semantics, a naming directory, and the
//! `work_pending`/`perform_work` pair hosts use to pump requests without
//! handing their thread to the broker.
//!
//! Requests are queued when invoked and dispatched only while the host pumps,
//! on the pumping thread, one at a time.

use thiserror::Error;

pub mod adapter;
pub mod broker;
pub mod naming;
pub mod object;
mod runtime;
pub mod servant;

pub use adapter::{LocalAdapter, ObjectAdapter, ThreadModel, ThreadPolicy};
pub use broker::{LocalBroker, ObjectBroker, ShutdownHandle, ROOT_ADAPTER};
pub use naming::{name_to_string, InMemoryNaming, NameComponent, NamingDirectory, NamingError};
pub use object::{ObjectId, ObjectRef, PendingReply};
pub use servant::Servant;

/// Errors raised by the broker and its adapters.
#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("Bad parameter: {0}")]
	BadParam(String),
	#[error("Invalid initial reference: {0}")]
	InvalidName(String),
	#[error("Adapter already exists: {0}")]
	AdapterAlreadyExists(String),
	#[error("Adapter does not exist: {0}")]
	AdapterNonExistent(String),
	#[error("Invalid policy: {0}")]
	InvalidPolicy(String),
	#[error("Object not active: {0}")]
	ObjectNotActive(String),
	#[error("Broker has been shut down")]
	ShutDown,
	#[error("Broker error: {0}")]
	Internal(String),
}

/// Errors delivered to callers of an object reference.
#[derive(Debug, Error)]
pub enum InvocationError {
	#[error("Object does not exist: {0}")]
	ObjectNotExist(String),
	#[error("Broker has been shut down")]
	ShutDown,
	#[error("Request was dropped without a reply")]
	NoReply,
	#[error(transparent)]
	Servant(#[from] ServantError),
}

/// Errors raised by a servant while handling an operation.
#[derive(Debug, Error)]
pub enum ServantError {
	#[error("Unknown operation '{operation}' on {interface}")]
	UnknownOperation {
		interface: &'static str,
		operation: String,
	},
	#[error("Invalid arguments: {0}")]
	InvalidArguments(String),
	#[error("Operation failed: {0}")]
	Failed(String),
}

impl From<serde_json::Error> for ServantError {
	fn from(err: serde_json::Error) -> Self {
		ServantError::InvalidArguments(err.to_string())
	}
}
