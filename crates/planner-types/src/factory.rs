//! Algorithm factory capability.
//!
//! A factory produces a fresh polymorphic algorithm instance on demand. Any
//! parameter the algorithm needs besides the orientation flag (a turning
//! radius, a sampling resolution) is captured by the factory when it is
//! built from configuration.

/// Capability to construct algorithm instances of type `T`.
///
/// `T` is usually a trait object such as `dyn SteeringMethod`.
pub trait AlgorithmFactory<T: ?Sized>: Send + Sync {
	/// Builds a new instance. `oriented` selects the direction-sensitive
	/// variant of the algorithm where the algorithm distinguishes one.
	fn create(&self, oriented: bool) -> Box<T>;
}
