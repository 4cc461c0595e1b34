//! Plan lifecycle engine for VAuto automation plans.
//!
//! This crate owns everything between a submitted plan and the world sinks:
//! validation, capability gating, zone management, castle and logistics
//! execution, deferred runs, boss respawns and the conveyor sweep.
//!
//! # Modules
//!
//! - [`castle`] -- Castle building stage ([`CastleExecutor`]).
//! - [`clock`] -- [`Clock`] trait with system and manual implementations.
//! - [`config`] -- Configuration loading from `vauto-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- Pause, speed and stop controls for the background loops.
//! - [`conveyor`] -- Label-driven item movement between inventories.
//! - [`engine`] -- [`ExecutionEngine`]: plan registry, lifecycle operations
//!   and the execution log.
//! - [`gate`] -- [`Gate`] trait and the default [`PolicyGate`].
//! - [`logistics`] -- Logistics stage ([`LogisticsExecutor`]).
//! - [`runner`] -- Async loops driving the scheduler and the conveyor.
//! - [`runtime`] -- Startup wiring of every service.
//! - [`scheduler`] -- Scheduled executions and respawn schedules.
//! - [`store`] -- [`PlanStore`] trait and the JSON directory store.
//! - [`validation`] -- Structural and semantic plan checks.
//! - [`zones`] -- Zone CRUD, setup and enter/exit transitions.
//!
//! [`CastleExecutor`]: castle::CastleExecutor
//! [`Clock`]: clock::Clock
//! [`ExecutionEngine`]: engine::ExecutionEngine
//! [`Gate`]: gate::Gate
//! [`PolicyGate`]: gate::PolicyGate
//! [`LogisticsExecutor`]: logistics::LogisticsExecutor
//! [`PlanStore`]: store::PlanStore

pub mod castle;
pub mod clock;
pub mod config;
pub mod control;
pub mod conveyor;
pub mod engine;
pub mod gate;
pub mod logistics;
pub mod runner;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod validation;
pub mod zones;

// Re-export primary types at crate root.
pub use config::AutomationConfig;
pub use engine::{ExecutionEngine, PlanSummary};
pub use runtime::{Collaborators, Runtime};
pub use scheduler::{ScheduleBook, Scheduler};
pub use store::{JsonPlanStore, PlanStore, StoreError};
