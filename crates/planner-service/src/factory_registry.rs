//! Algorithm factory registries.
//!
//! Two layers live here. The [`ImplementationCatalog`] is the process-wide,
//! read-only list of every algorithm compiled into the server, collected from
//! the algorithm crates' `get_all_implementations()`. A [`FactoryRegistry`]
//! is what a running server actually selects from: it owns one instantiated
//! factory per configured name.

use crate::ServerError;
use planner_config::AlgorithmConfig;
use planner_distance::{DistanceFactoryBuilder, DistanceFunction};
use planner_steering::{SteeringFactoryBuilder, SteeringMethod};
use planner_types::AlgorithmFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Catalog of every built-in algorithm builder, by family.
pub struct ImplementationCatalog {
	pub steering: HashMap<String, SteeringFactoryBuilder>,
	pub distance: HashMap<String, DistanceFactoryBuilder>,
}

impl ImplementationCatalog {
	/// Create a new empty catalog
	pub fn new() -> Self {
		Self {
			steering: HashMap::new(),
			distance: HashMap::new(),
		}
	}

	/// Register a steering method builder
	pub fn register_steering(&mut self, name: impl Into<String>, builder: SteeringFactoryBuilder) {
		self.steering.insert(name.into(), builder);
	}

	/// Register a distance function builder
	pub fn register_distance(&mut self, name: impl Into<String>, builder: DistanceFactoryBuilder) {
		self.distance.insert(name.into(), builder);
	}
}

impl Default for ImplementationCatalog {
	fn default() -> Self {
		Self::new()
	}
}

// Global catalog instance
static CATALOG: OnceLock<ImplementationCatalog> = OnceLock::new();

/// Get the global implementation catalog, initializing it on first use.
pub fn get_catalog() -> &'static ImplementationCatalog {
	CATALOG.get_or_init(|| {
		let mut catalog = ImplementationCatalog::new();

		for (name, builder) in planner_steering::get_all_implementations() {
			tracing::debug!("Registering steering implementation: {}", name);
			catalog.register_steering(name, builder);
		}

		for (name, builder) in planner_distance::get_all_implementations() {
			tracing::debug!("Registering distance implementation: {}", name);
			catalog.register_distance(name, builder);
		}

		catalog
	})
}

/// Returned by [`FactoryRegistry::add`] when the name is taken. The rejected
/// factory is handed back untouched.
pub struct DuplicateFactory<T: ?Sized> {
	name: String,
	factory: Box<dyn AlgorithmFactory<T>>,
}

impl<T: ?Sized> DuplicateFactory<T> {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Takes the rejected factory back.
	pub fn into_inner(self) -> Box<dyn AlgorithmFactory<T>> {
		self.factory
	}
}

impl<T: ?Sized> std::fmt::Debug for DuplicateFactory<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DuplicateFactory")
			.field("name", &self.name)
			.finish_non_exhaustive()
	}
}

impl<T: ?Sized> std::fmt::Display for DuplicateFactory<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "A factory is already registered under '{}'", self.name)
	}
}

impl<T: ?Sized> std::error::Error for DuplicateFactory<T> {}

/// Named factories of one algorithm family.
///
/// Names are unique: adding under a taken name fails and leaves the
/// registered factory in place. The registry owns its factories and destroys
/// each of them exactly once, either through [`destroy_all`](Self::destroy_all)
/// or when dropped.
pub struct FactoryRegistry<T: ?Sized> {
	family: &'static str,
	factories: HashMap<String, Box<dyn AlgorithmFactory<T>>>,
}

impl<T: ?Sized> FactoryRegistry<T> {
	/// Creates an empty registry; `family` only labels log records.
	pub fn new(family: &'static str) -> Self {
		Self {
			family,
			factories: HashMap::new(),
		}
	}

	pub fn family(&self) -> &'static str {
		self.family
	}

	pub fn has(&self, name: &str) -> bool {
		self.factories.contains_key(name)
	}

	/// Registers `factory` under `name` unless the name is taken.
	pub fn add(
		&mut self,
		name: impl Into<String>,
		factory: Box<dyn AlgorithmFactory<T>>,
	) -> Result<(), DuplicateFactory<T>> {
		let name = name.into();
		if self.has(&name) {
			tracing::warn!(family = self.family, implementation = %name, "Factory already registered");
			return Err(DuplicateFactory { name, factory });
		}
		tracing::debug!(family = self.family, implementation = %name, "Registered factory");
		self.factories.insert(name, factory);
		Ok(())
	}

	/// Builds a new instance from the factory registered under `name`, or
	/// `None` when there is no such factory.
	pub fn create(&self, name: &str, oriented: bool) -> Option<Box<T>> {
		self.factories
			.get(name)
			.map(|factory| factory.create(oriented))
	}

	/// Destroys every registered factory. Later calls find nothing to destroy.
	pub fn destroy_all(&mut self) {
		for (name, factory) in self.factories.drain() {
			tracing::debug!(family = self.family, implementation = %name, "Destroying factory");
			drop(factory);
		}
	}

	/// Registered names, sorted.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<_> = self.factories.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.factories.len()
	}

	pub fn is_empty(&self) -> bool {
		self.factories.is_empty()
	}
}

impl<T: ?Sized> Drop for FactoryRegistry<T> {
	fn drop(&mut self) {
		self.destroy_all();
	}
}

/// Macro to build a registry from the configured implementations of a family
macro_rules! build_registry {
	($catalog:expr, $config:expr, $type_name:literal) => {{
		let mut registry = FactoryRegistry::new($type_name);
		let mut entries: Vec<_> = $config.implementations.iter().collect();
		entries.sort_by(|a, b| a.0.cmp(b.0));

		for (name, table) in entries {
			let Some(builder) = $catalog.get(name.as_str()) else {
				let mut available: Vec<_> = $catalog.keys().cloned().collect();
				available.sort();
				return Err(ServerError::UnknownImplementation(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)));
			};
			let factory = builder(table).map_err(|e| {
				ServerError::Configuration(format!("{} implementation '{}': {}", $type_name, name, e))
			})?;
			registry
				.add(name.clone(), factory)
				.map_err(|e| ServerError::Configuration(e.to_string()))?;
		}
		registry
	}};
}

/// Instantiates the steering method factories listed in `config`.
pub fn build_steering_registry(
	config: &AlgorithmConfig,
) -> Result<FactoryRegistry<dyn SteeringMethod>, ServerError> {
	let catalog = get_catalog();
	Ok(build_registry!(catalog.steering, config, "steering"))
}

/// Instantiates the distance function factories listed in `config`.
pub fn build_distance_registry(
	config: &AlgorithmConfig,
) -> Result<FactoryRegistry<dyn DistanceFunction>, ServerError> {
	let catalog = get_catalog();
	Ok(build_registry!(catalog.distance, config, "distance"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use planner_config::Config;
	use planner_steering::implementations::linear::LinearSteeringFactory;
	use planner_types::Configuration;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	trait Algorithm {
		fn tag(&self) -> &'static str;
		fn oriented(&self) -> bool;
	}

	struct Tagged {
		tag: &'static str,
		oriented: bool,
	}

	impl Algorithm for Tagged {
		fn tag(&self) -> &'static str {
			self.tag
		}

		fn oriented(&self) -> bool {
			self.oriented
		}
	}

	/// Counts how many times it is dropped.
	struct TaggedFactory {
		tag: &'static str,
		drops: Arc<AtomicUsize>,
	}

	impl TaggedFactory {
		fn boxed(tag: &'static str, drops: &Arc<AtomicUsize>) -> Box<dyn AlgorithmFactory<dyn Algorithm>> {
			Box::new(Self {
				tag,
				drops: drops.clone(),
			})
		}
	}

	impl AlgorithmFactory<dyn Algorithm> for TaggedFactory {
		fn create(&self, oriented: bool) -> Box<dyn Algorithm> {
			Box::new(Tagged {
				tag: self.tag,
				oriented,
			})
		}
	}

	impl Drop for TaggedFactory {
		fn drop(&mut self) {
			self.drops.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn config(dofs: &[f64]) -> Configuration {
		Configuration::new(dofs.to_vec())
	}

	#[test]
	fn test_duplicate_name_keeps_first_factory() {
		let drops = Arc::new(AtomicUsize::new(0));
		let mut registry: FactoryRegistry<dyn Algorithm> = FactoryRegistry::new("test");

		registry.add("a", TaggedFactory::boxed("first", &drops)).unwrap();
		assert!(registry.has("a"));

		let rejected = registry
			.add("a", TaggedFactory::boxed("second", &drops))
			.unwrap_err();
		assert_eq!(rejected.name(), "a");
		assert_eq!(rejected.into_inner().create(true).tag(), "second");
		assert_eq!(drops.load(Ordering::SeqCst), 1);

		assert_eq!(registry.len(), 1);
		assert_eq!(registry.create("a", false).unwrap().tag(), "first");
	}

	#[test]
	fn test_create_unregistered_is_none() {
		let drops = Arc::new(AtomicUsize::new(0));
		let mut registry: FactoryRegistry<dyn Algorithm> = FactoryRegistry::new("test");
		registry.add("a", TaggedFactory::boxed("a", &drops)).unwrap();

		assert!(registry.create("b", true).is_none());
		assert!(registry.create("b", false).is_none());
		assert!(!registry.has("b"));
		assert_eq!(registry.names(), vec!["a".to_string()]);
		assert_eq!(drops.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_create_passes_orientation() {
		let mut registry: FactoryRegistry<dyn SteeringMethod> = FactoryRegistry::new("steering");
		registry.add("linear", Box::new(LinearSteeringFactory)).unwrap();

		let oriented = registry.create("linear", true).unwrap();
		let free = registry.create("linear", false).unwrap();
		assert!(oriented.is_oriented());
		assert!(!free.is_oriented());
		assert_eq!(oriented.name(), "linear");
	}

	#[test]
	fn test_oriented_variant_differs() {
		let registry = build_steering_registry(&Config::default().steering).unwrap();
		let from = config(&[0.0, 0.0, 0.0]);
		let behind = config(&[-1.0, 0.0, 0.0]);

		let oriented = registry.create("rs", true).unwrap();
		let free = registry.create("rs", false).unwrap();
		let forward_only = oriented.steer(&from, &behind).unwrap().length();
		let with_reverse = free.steer(&from, &behind).unwrap().length();
		assert!(with_reverse < forward_only);
	}

	#[test]
	fn test_destroy_all_once() {
		let drops = Arc::new(AtomicUsize::new(0));
		let mut registry: FactoryRegistry<dyn Algorithm> = FactoryRegistry::new("test");
		for tag in ["linear", "rs", "flic"] {
			registry.add(tag, TaggedFactory::boxed(tag, &drops)).unwrap();
		}
		registry.add("custom", TaggedFactory::boxed("custom", &drops)).unwrap();

		registry.destroy_all();
		assert_eq!(drops.load(Ordering::SeqCst), 4);
		assert!(registry.is_empty());
		assert!(registry.create("linear", true).is_none());

		registry.destroy_all();
		drop(registry);
		assert_eq!(drops.load(Ordering::SeqCst), 4);
	}

	#[test]
	fn test_drop_destroys_factories() {
		let drops = Arc::new(AtomicUsize::new(0));
		{
			let mut registry: FactoryRegistry<dyn Algorithm> = FactoryRegistry::new("test");
			registry.add("a", TaggedFactory::boxed("a", &drops)).unwrap();
			registry.add("b", TaggedFactory::boxed("b", &drops)).unwrap();
			assert!(registry.create("b", true).unwrap().oriented());
		}
		assert_eq!(drops.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_catalog_contains_builtins() {
		let catalog = get_catalog();
		for name in ["linear", "rs", "flic"] {
			assert!(catalog.steering.contains_key(name), "steering {}", name);
			assert!(catalog.distance.contains_key(name), "distance {}", name);
		}
	}

	#[test]
	fn test_build_from_default_config() {
		let config = Config::default();
		let steering = build_steering_registry(&config.steering).unwrap();
		let distance = build_distance_registry(&config.distance).unwrap();

		assert_eq!(steering.names(), vec!["flic", "linear", "rs"]);
		assert_eq!(distance.names(), vec!["flic", "linear", "rs"]);
		assert_eq!(steering.family(), "steering");
		assert!(distance.create("rs", false).is_some());
	}

	#[test]
	fn test_unknown_implementation_lists_available() {
		let mut config = Config::default().steering;
		config
			.implementations
			.insert("dubins".to_string(), toml::Value::Table(toml::map::Map::new()));

		let err = build_steering_registry(&config).err().unwrap();
		assert!(matches!(err, ServerError::UnknownImplementation(_)));
		assert_eq!(
			err.to_string(),
			"Unknown steering implementation 'dubins'. Available: [flic, linear, rs]"
		);
	}

	#[test]
	fn test_invalid_parameters_rejected() {
		let config: Config = r#"
[distance.implementations.rs]
radius = -2.0
"#
		.parse()
		.unwrap();

		let err = build_distance_registry(&config.distance).err().unwrap();
		assert!(matches!(err, ServerError::Configuration(_)));
		assert!(err.to_string().contains("distance implementation 'rs'"));
	}
}
