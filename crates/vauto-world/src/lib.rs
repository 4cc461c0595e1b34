//! World collaborators for the `VAuto` plan lifecycle engine.
//!
//! The engine never touches world state directly. It resolves names through
//! a [`PrefabResolver`] and applies every mutation through one of the sink
//! traits defined here. This crate also ships an in-memory world that
//! implements all of them, used by the engine binary and by tests.
//!
//! # Modules
//!
//! - [`catalog`] -- Default prefab catalog for the bundled demo plans.
//! - [`error`] -- [`WorldError`] returned by every collaborator operation.
//! - [`memory`] -- [`InMemoryWorld`], a lock-protected world recording
//!   every mutation it applies.
//! - [`prefab`] -- Name-to-prefab resolution and the in-memory catalog.
//! - [`sinks`] -- Effect, spawn, structure, inventory, live-state and
//!   telemetry contracts.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod prefab;
pub mod sinks;

// Re-export primary types at crate root.
pub use catalog::default_catalog;
pub use error::WorldError;
pub use memory::{InMemoryWorld, WorldEvent};
pub use prefab::{PrefabCatalog, PrefabCategory, PrefabResolver};
pub use sinks::{
    EffectSink, InventorySink, LiveStateSource, LootEntry, NoopTelemetry, SpawnSink,
    StructureSink, TelemetrySink, TracingTelemetry,
};
