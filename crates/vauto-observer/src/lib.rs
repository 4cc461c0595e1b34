//! Operator API server for the VAuto plan lifecycle engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Plan endpoints** for loading, dry runs, live runs, scheduling,
//!   respawns and unloading
//! - **Zone endpoints** for zone editing and player enter/exit transitions
//! - **Schedule and log endpoints** for pending events, respawn schedules
//!   and the execution log
//! - **Conveyor endpoints** for per-territory conveyor configuration
//! - **Operator endpoints** for loop control (pause, resume, speed,
//!   status, stop)
//!
//! # Architecture
//!
//! Handlers call straight into the shared [`Runtime`]. Engine operations
//! report failures as result records, which the handlers turn into HTTP
//! status codes; the record itself is always returned as the body. Plans
//! accepted through the API are written to the optional [`PlanStore`] so
//! they survive a restart.
//!
//! [`Runtime`]: vauto_core::Runtime
//! [`PlanStore`]: vauto_core::PlanStore

pub mod conveyor;
pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod state;
pub mod zones;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_observer, start_server};
pub use state::AppState;
