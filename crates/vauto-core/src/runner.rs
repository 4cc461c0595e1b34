//! Background loops driving the scheduler and the conveyor.
//!
//! Both loops honor the shared [`RuntimeControl`]: they wait while paused,
//! finish when a stop is requested, and sleep between ticks in a way a stop
//! interrupts immediately.

use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::control::RuntimeControl;
use crate::conveyor::ConveyorService;
use crate::scheduler::{Scheduler, TickSummary};

/// What a background loop did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// Iterations completed.
    pub iterations: u64,
    /// Scheduled executions fired.
    pub events_fired: u64,
    /// Respawns fired.
    pub respawns_fired: u64,
    /// Conveyor sweeps completed.
    pub sweeps: u64,
}

/// Run scheduler ticks until a stop is requested.
///
/// The interval is re-read from the controls before every sleep, so an
/// operator change applies from the next tick.
pub async fn run_scheduler(scheduler: Arc<Scheduler>, control: Arc<RuntimeControl>) -> LoopReport {
    let mut report = LoopReport::default();
    info!(tick_interval_ms = control.tick_interval_ms(), "Scheduler loop starting");

    loop {
        if control.is_paused() {
            info!("Scheduler loop paused, waiting for resume...");
            control.wait_if_paused().await;
            info!("Scheduler loop resumed");
        }
        if control.is_stop_requested() {
            break;
        }

        let summary = scheduler.process_scheduled_events();
        record(&mut report, &summary);
        let tick = control.record_tick();
        if summary != TickSummary::default() {
            debug!(tick, ?summary, "Scheduler tick");
        }

        if !pause_for(&control, control.tick_interval_ms()).await {
            break;
        }
    }

    info!(
        iterations = report.iterations,
        events_fired = report.events_fired,
        respawns_fired = report.respawns_fired,
        "Scheduler loop stopped"
    );
    report
}

/// Poll the conveyor every `poll_interval_ms` until a stop is requested.
pub async fn run_conveyor(
    conveyor: Arc<ConveyorService>,
    clock: Arc<dyn Clock>,
    control: Arc<RuntimeControl>,
    poll_interval_ms: u64,
) -> LoopReport {
    let mut report = LoopReport::default();
    info!(poll_interval_ms, "Conveyor loop starting");

    loop {
        if control.is_paused() {
            control.wait_if_paused().await;
        }
        if control.is_stop_requested() {
            break;
        }

        let sweeps = conveyor.poll(clock.now());
        report.iterations = report.iterations.saturating_add(1);
        report.sweeps = report
            .sweeps
            .saturating_add(u64::try_from(sweeps.len()).unwrap_or(u64::MAX));

        if !pause_for(&control, poll_interval_ms).await {
            break;
        }
    }

    info!(
        iterations = report.iterations,
        sweeps = report.sweeps,
        "Conveyor loop stopped"
    );
    report
}

fn record(report: &mut LoopReport, summary: &TickSummary) {
    report.iterations = report.iterations.saturating_add(1);
    report.events_fired = report
        .events_fired
        .saturating_add(u64::from(summary.events_fired));
    report.respawns_fired = report
        .respawns_fired
        .saturating_add(u64::from(summary.respawns_fired));
}

/// Sleep for `ms`, returning false if a stop arrived first.
async fn pause_for(control: &RuntimeControl, ms: u64) -> bool {
    tokio::select! {
        () = control.stopped() => false,
        () = tokio::time::sleep(Duration::from_millis(ms)) => !control.is_stop_requested(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{TimeZone, Utc};
    use vauto_types::{Boss, BossRespawn, CombatState, Plan, PlanId, PrefabGuid, RespawnRules, Zone};
    use vauto_world::{InMemoryWorld, InventorySink};

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{AutomationConfig, ConveyorConfig};
    use crate::engine::ExecutionEngine;
    use crate::gate::PolicyGate;
    use crate::runtime::Collaborators;

    fn make_scheduler(
        world: &Arc<InMemoryWorld>,
        clock: &Arc<ManualClock>,
    ) -> (Arc<ExecutionEngine>, Arc<Scheduler>) {
        let collaborators = Collaborators::in_memory(Arc::clone(world)).unwrap();
        let engine = Arc::new(ExecutionEngine::new(
            &collaborators,
            Arc::new(PolicyGate::new()),
            Arc::clone(clock) as Arc<dyn Clock>,
            &AutomationConfig::default(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&engine),
            Arc::clone(&collaborators.live),
            Arc::clone(clock) as Arc<dyn Clock>,
        ));
        (engine, scheduler)
    }

    fn make_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
        ))
    }

    #[tokio::test]
    async fn stopped_controls_end_the_loop_at_once() {
        let world = Arc::new(InMemoryWorld::new());
        let (_, scheduler) = make_scheduler(&world, &make_clock());
        let control = Arc::new(RuntimeControl::new(0));
        control.request_stop();

        let report = run_scheduler(scheduler, control).await;
        assert_eq!(report.iterations, 0);
    }

    #[tokio::test]
    async fn scheduler_loop_fires_due_respawns() {
        let world = Arc::new(InMemoryWorld::new());
        let clock = make_clock();
        let (engine, scheduler) = make_scheduler(&world, &clock);
        world.set_combat_state(&PlanId::new("p"), CombatState::Active);

        let mut plan = Plan::new("p");
        let mut zone = Zone::new("z1");
        zone.boss = Some(Boss {
            boss_name: String::from("Wolf"),
            boss_level: 3,
            respawn: Some(BossRespawn::interval(60)),
            reward: Vec::new(),
        });
        plan.zones.push(zone);
        plan.respawn_rules = RespawnRules {
            respawn_interval_seconds: 60,
            ..RespawnRules::default()
        };
        assert!(engine.load(plan).success);
        clock.advance(chrono::Duration::seconds(60));

        let control = Arc::new(RuntimeControl::new(10));
        let handle = tokio::spawn(run_scheduler(scheduler, Arc::clone(&control)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        control.request_stop();
        let report = handle.await.unwrap();

        assert!(report.iterations >= 1);
        assert_eq!(report.respawns_fired, 1);
        assert_eq!(engine.execution_log(Some("p")).len(), 2);
    }

    #[tokio::test]
    async fn conveyor_loop_sweeps_enabled_territories() {
        let world = Arc::new(InMemoryWorld::new());
        world.add_territory("Keep", &["Chest s1", "Forge r1"]);
        let wood = PrefabGuid(-1_593_377_811);
        world.set_stock("Chest s1", wood, 10);
        world.set_stock("Forge r1", wood, 0);

        let conveyor = Arc::new(
            ConveyorService::new(
                Arc::clone(&world) as Arc<dyn InventorySink>,
                ConveyorConfig::default(),
            )
            .unwrap(),
        );
        conveyor.enable("Keep");

        let control = Arc::new(RuntimeControl::new(1000));
        let handle = tokio::spawn(run_conveyor(
            Arc::clone(&conveyor),
            make_clock() as Arc<dyn Clock>,
            Arc::clone(&control),
            10,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        control.request_stop();
        let report = handle.await.unwrap();

        assert_eq!(report.sweeps, 1);
        assert_eq!(world.stock("Forge r1", wood).unwrap(), 9);
    }
}
