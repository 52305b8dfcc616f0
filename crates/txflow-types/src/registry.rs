//! Registry trait for self-registering implementations.
//!
//! Account and delivery implementations each expose a `Registry` unit struct
//! so the CLI can map configuration names to factory functions.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Name of the implementation table in the configuration file, e.g.
	/// `local` for `[account.implementations.local]` or `memory` for
	/// `[delivery.implementations.memory]`.
	const NAME: &'static str;

	/// Factory function type of the owning crate.
	type Factory;

	/// Returns the factory that builds this implementation from its table.
	fn factory() -> Self::Factory;
}
