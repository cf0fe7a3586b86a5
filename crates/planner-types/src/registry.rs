//! Registry trait for self-registering implementations.
//!
//! Every steering method and distance function module declares the name it is
//! registered under and the builder that turns its configuration table into
//! an algorithm factory.

/// Base trait for implementation registries.
///
/// Each implementation module provides a `Registry` struct implementing this
/// trait, so the server can discover all built-in algorithms without
/// hardcoding them.
pub trait ImplementationRegistry {
	/// The name used in configuration files and by remote callers, for example
	/// `"rs"` for `steering.implementations.rs`.
	const NAME: &'static str;

	/// The builder type this implementation provides.
	type Factory;

	/// Returns the builder for this implementation.
	fn factory() -> Self::Factory;
}
