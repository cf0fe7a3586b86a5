//! Remote planning server.
//!
//! This crate exposes a [`Planner`](planner_core::Planner) as three remote
//! objects (robot, obstacle and problem) published through the object broker.
//! It owns the factory registries the problem object selects steering methods
//! and distance functions from, drives the broker through its startup
//! sequence, and offers the host process two ways of pumping requests: the
//! broker's blocking run loop, or one unit of work per poll.

use planner_broker::BrokerError;
use planner_config::PumpMode;
use thiserror::Error;

pub mod factory_registry;
pub mod gateway;
pub mod lifecycle;
pub mod servants;
pub mod server;

pub use factory_registry::{DuplicateFactory, FactoryRegistry};
pub use lifecycle::{LifecycleError, LifecycleStage, ServantBinding, ServerLifecycle};
pub use server::{Server, ServerContext};

/// Errors that can occur while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
	/// Another server is alive in this process.
	#[error("A server is already running in this process")]
	AlreadyRunning,
	#[error("Lifecycle error: {0}")]
	Lifecycle(#[from] LifecycleError),
	/// A configured algorithm is not part of the catalog.
	#[error("{0}")]
	UnknownImplementation(String),
	/// An algorithm rejected its configuration table.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The host asked for a pumping mode other than the one in use.
	#[error("Pump mode is {active}, cannot switch to {requested}")]
	PumpModeConflict {
		active: PumpMode,
		requested: PumpMode,
	},
	#[error("Broker error: {0}")]
	Broker(#[from] BrokerError),
}

/// Serializes tests that construct a [`Server`], since only one may exist
/// per process.
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
	static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
	LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
