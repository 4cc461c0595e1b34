//! Engine binary for the VAuto plan lifecycle engine.
//!
//! Wires the in-memory world, the execution engine, the scheduler and
//! conveyor loops, and the operator API, then runs until interrupted or
//! stopped through the API.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `vauto-config.yaml` (or the path given as
//!    the first argument or in `VAUTO_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the world collaborators and assemble the runtime
//! 4. Open the plan directory and load every stored plan
//! 5. Start the operator API server
//! 6. Start the scheduler and conveyor loops
//! 7. Wait for Ctrl-C or an operator stop, then drain the loops

mod autoload;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vauto_core::clock::{Clock, SystemClock};
use vauto_core::config::LoggingConfig;
use vauto_core::gate::PolicyGate;
use vauto_core::{AutomationConfig, Collaborators, JsonPlanStore, PlanStore, Runtime};
use vauto_observer::{AppState, ServerConfig};
use vauto_world::InMemoryWorld;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the plan directory, or the operator
/// server cannot be set up.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so note the source later.
    let (config, config_source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(source = %config_source, "vauto-engine starting");
    info!(
        tick_interval_ms = config.scheduler.tick_interval_ms,
        conveyor_poll_ms = config.conveyor.poll_interval_ms,
        plan_dir = %config.plans.directory.display(),
        observer_enabled = config.observer.enabled,
        "Configuration loaded"
    );

    // 3. Assemble the runtime.
    let world = Arc::new(InMemoryWorld::new());
    let collaborators = Collaborators::in_memory(world)?;
    let runtime = Runtime::assemble(
        &collaborators,
        Arc::new(PolicyGate::new()),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        config,
    )?;
    let config = Arc::clone(&runtime.config);

    // 4. Open the plan store and load stored plans.
    let store = Arc::new(JsonPlanStore::open(&config.plans.directory)?);
    if config.plans.autoload {
        let report = autoload::load_stored_plans(store.as_ref(), &runtime.engine);
        info!(
            loaded = report.loaded,
            failed = report.failed,
            "Stored plans loaded"
        );
    }

    // 5. Start the operator API.
    let app_state = Arc::new(AppState::with_store(
        runtime.clone(),
        store as Arc<dyn PlanStore>,
    ));
    let observer = if config.observer.enabled {
        let server_config = ServerConfig {
            host: config.observer.host.clone(),
            port: config.observer.port,
        };
        Some(vauto_observer::spawn_observer(server_config, app_state)?)
    } else {
        info!("Operator API disabled");
        None
    };

    // 6. Start the background loops.
    let (scheduler, conveyor) = runtime.spawn_loops();

    // 7. Run until interrupted or stopped.
    let control = Arc::clone(&runtime.control);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
            }
            info!("Interrupt received, stopping");
        }
        () = control.stopped() => {
            info!("Stop requested through the operator API");
        }
    }
    control.request_stop();

    match scheduler.await {
        Ok(report) => info!(
            iterations = report.iterations,
            events_fired = report.events_fired,
            respawns_fired = report.respawns_fired,
            "Scheduler loop drained"
        ),
        Err(e) => warn!(error = %e, "Scheduler loop task failed"),
    }
    match conveyor.await {
        Ok(report) => info!(sweeps = report.sweeps, "Conveyor loop drained"),
        Err(e) => warn!(error = %e, "Conveyor loop task failed"),
    }
    if let Some(handle) = observer {
        if let Err(e) = handle.await {
            warn!(error = %e, "Operator API task failed");
        }
    }

    info!("vauto-engine shutdown complete");
    Ok(())
}

/// Resolve and load the configuration file.
///
/// A missing file is not an error; every setting has a default.
fn load_config() -> Result<(AutomationConfig, String), EngineError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("VAUTO_CONFIG").ok())
        .map_or_else(|| PathBuf::from("vauto-config.yaml"), PathBuf::from);

    if path.exists() {
        let config = AutomationConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        Ok((AutomationConfig::parse("")?, String::from("defaults")))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
