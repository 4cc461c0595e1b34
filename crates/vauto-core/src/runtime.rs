//! Startup wiring.
//!
//! Every service is constructed once here and handed its collaborators;
//! nothing reaches for a global.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use vauto_world::{
    EffectSink, InMemoryWorld, InventorySink, LiveStateSource, PrefabResolver, SpawnSink,
    StructureSink, TelemetrySink, TracingTelemetry, WorldError, default_catalog,
};

use crate::clock::Clock;
use crate::config::AutomationConfig;
use crate::control::RuntimeControl;
use crate::conveyor::{ConveyorError, ConveyorService};
use crate::engine::ExecutionEngine;
use crate::gate::Gate;
use crate::runner::{self, LoopReport};
use crate::scheduler::Scheduler;

/// The world collaborators the engine calls through.
#[derive(Clone)]
pub struct Collaborators {
    /// Name resolution.
    pub resolver: Arc<dyn PrefabResolver>,
    /// Player-facing effects.
    pub effects: Arc<dyn EffectSink>,
    /// Zone registration and spawning.
    pub spawns: Arc<dyn SpawnSink>,
    /// Structure placement.
    pub structures: Arc<dyn StructureSink>,
    /// Inventory reads and movement.
    pub inventory: Arc<dyn InventorySink>,
    /// Live combat state.
    pub live: Arc<dyn LiveStateSource>,
    /// Pattern telemetry.
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl Collaborators {
    /// Every sink backed by one in-memory world, names resolved by the
    /// default catalog and telemetry emitted as tracing events.
    pub fn in_memory(world: Arc<InMemoryWorld>) -> Result<Self, WorldError> {
        Ok(Self {
            resolver: Arc::new(default_catalog()?),
            effects: Arc::clone(&world) as Arc<dyn EffectSink>,
            spawns: Arc::clone(&world) as Arc<dyn SpawnSink>,
            structures: Arc::clone(&world) as Arc<dyn StructureSink>,
            inventory: Arc::clone(&world) as Arc<dyn InventorySink>,
            live: world as Arc<dyn LiveStateSource>,
            telemetry: Arc::new(TracingTelemetry),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// The assembled services.
#[derive(Clone)]
pub struct Runtime {
    /// Plan registry and execution pipeline.
    pub engine: Arc<ExecutionEngine>,
    /// Deferred runs and respawns.
    pub scheduler: Arc<Scheduler>,
    /// Background item movement.
    pub conveyor: Arc<ConveyorService>,
    /// Loop controls.
    pub control: Arc<RuntimeControl>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Loaded configuration.
    pub config: Arc<AutomationConfig>,
}

impl Runtime {
    /// Wire every service.
    pub fn assemble(
        collaborators: &Collaborators,
        gate: Arc<dyn Gate>,
        clock: Arc<dyn Clock>,
        config: AutomationConfig,
    ) -> Result<Self, ConveyorError> {
        let engine = Arc::new(ExecutionEngine::new(
            collaborators,
            gate,
            Arc::clone(&clock),
            &config,
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&engine),
            Arc::clone(&collaborators.live),
            Arc::clone(&clock),
        ));
        let conveyor = Arc::new(ConveyorService::new(
            Arc::clone(&collaborators.inventory),
            config.conveyor.clone(),
        )?);
        let control = Arc::new(RuntimeControl::new(config.scheduler.tick_interval_ms));
        info!(
            tick_interval_ms = config.scheduler.tick_interval_ms,
            conveyor_poll_ms = config.conveyor.poll_interval_ms,
            "Runtime assembled"
        );
        Ok(Self {
            engine,
            scheduler,
            conveyor,
            control,
            clock,
            config: Arc::new(config),
        })
    }

    /// Start the scheduler and conveyor loops on the current tokio runtime.
    pub fn spawn_loops(&self) -> (JoinHandle<LoopReport>, JoinHandle<LoopReport>) {
        let scheduler = tokio::spawn(runner::run_scheduler(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.control),
        ));
        let conveyor = tokio::spawn(runner::run_conveyor(
            Arc::clone(&self.conveyor),
            Arc::clone(&self.clock),
            Arc::clone(&self.control),
            self.config.conveyor.poll_interval_ms,
        ));
        (scheduler, conveyor)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}
