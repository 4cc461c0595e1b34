//! End-to-end plan lifecycle scenarios against the in-memory world.
//!
//! Every test assembles a full [`Runtime`] with a manual clock so schedule
//! processing is driven explicitly, tick by tick.

#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use vauto_core::clock::{Clock, ManualClock};
use vauto_core::gate::PolicyGate;
use vauto_core::scheduler::TickSummary;
use vauto_core::{AutomationConfig, Collaborators, Runtime};
use vauto_types::{
    Boss, BossRespawn, CallerId, CastleAutomation, CastleBuild, CastleRecord, CombatState,
    DropTable, ExecutionData, LogisticsAutomation, Loot, LootItem, Plan, PlanId, PlanOperation,
    Position, RepairOp, RespawnRules, RunReport, ScheduledEventStatus, StageStatus, TransferOp,
    Zone, ZoneId,
};
use vauto_world::InMemoryWorld;

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    runtime: Runtime,
    world: Arc<InMemoryWorld>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let world = Arc::new(InMemoryWorld::new());
    let collaborators = Collaborators::in_memory(Arc::clone(&world)).unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
    ));
    let runtime = Runtime::assemble(
        &collaborators,
        Arc::new(PolicyGate::new()),
        Arc::clone(&clock) as Arc<dyn Clock>,
        AutomationConfig::default(),
    )
    .unwrap();
    Harness {
        runtime,
        world,
        clock,
    }
}

fn boss_zone(id: &str) -> Zone {
    let mut zone = Zone::new(id);
    zone.boss = Some(Boss {
        boss_name: String::from("Wolf"),
        boss_level: 4,
        respawn: Some(BossRespawn::interval(60)),
        reward: Vec::new(),
    });
    zone
}

fn respawning_plan(id: &str, max_respawns: u32) -> Plan {
    let mut plan = Plan::new(id);
    plan.zones.push(boss_zone("arena"));
    plan.respawn_rules = RespawnRules {
        respawn_interval_seconds: 60,
        max_respawns,
        ..RespawnRules::default()
    };
    plan
}

fn run_report(data: Option<ExecutionData>) -> RunReport {
    match data {
        Some(ExecutionData::Run(report)) => Some(report),
        _ => None,
    }
    .unwrap()
}

// =============================================================================
// Load and run
// =============================================================================

#[test]
fn valid_plan_loads_runs_and_logs() {
    let h = harness();
    let engine = &h.runtime.engine;
    let mut plan = Plan::new("p1");
    plan.zones.push(boss_zone("z1"));

    let loaded = engine.load(plan);
    assert!(loaded.success, "{:?}", loaded.error);
    let details = loaded.validation_details.unwrap();
    assert!(details.is_valid);
    assert!(details.messages.is_empty());

    let run = engine.run("p1", CallerId(3));
    assert!(run.success, "{:?}", run.error);
    let report = run_report(run.execution_data);
    assert_eq!(report.zones.len(), 1);
    assert!(report.zones[0].success);
    assert!(report.aborted_at.is_none());

    let log = engine.execution_log(Some("p1"));
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|entry| entry.success));
}

#[test]
fn zones_abort_at_the_first_failure() {
    let h = harness();
    let engine = &h.runtime.engine;

    // Another plan claims zone "b" first.
    let mut rival = Plan::new("rival");
    rival.zones.push(Zone::new("b"));
    assert!(engine.load(rival).success);
    assert!(engine.run("rival", CallerId(1)).success);

    let mut plan = Plan::new("p");
    plan.zones.push(Zone::new("a"));
    plan.zones.push(Zone::new("b"));
    plan.zones.push(Zone::new("c"));
    plan.castle_automation = Some(CastleAutomation {
        target_castle: String::from("Keep"),
        build: vec![CastleBuild {
            prefab: String::from("Workbench"),
            position: Position::new(0.0, 0.0, 0.0),
            rotation: 0.0,
        }],
    });
    assert!(engine.load(plan).success);

    let run = engine.run("p", CallerId(1));
    assert!(!run.success);
    assert!(run.error.as_deref().unwrap().contains('b'));

    let report = run_report(run.execution_data);
    assert_eq!(report.zones.len(), 2);
    assert!(report.zones[0].success);
    assert!(!report.zones[1].success);
    assert_eq!(report.aborted_at, Some(ZoneId::new("b")));
    assert!(report.castle.is_none());
    assert_eq!(h.world.structure_count(), 0);
}

#[test]
fn castle_builds_continue_past_failures() {
    let h = harness();
    let engine = &h.runtime.engine;
    let build = |x: f64| CastleBuild {
        prefab: String::from("Workbench"),
        position: Position::new(x, 0.0, 0.0),
        rotation: 0.0,
    };
    let mut plan = Plan::new("p");
    plan.castle_automation = Some(CastleAutomation {
        target_castle: String::from("Keep"),
        build: vec![build(1.0), build(1.0), build(2.0)],
    });
    assert!(engine.load(plan).success);

    let run = engine.run("p", CallerId(1));
    assert!(!run.success);

    let castle = run_report(run.execution_data).castle.unwrap();
    assert_eq!(castle.status, StageStatus::PartiallyCompleted);
    assert_eq!(castle.failed_count(), 1);
    assert!(castle.builds[0].success);
    assert!(!castle.builds[1].success);
    assert!(castle.builds[2].success);
    assert_eq!(h.world.structure_count(), 2);
}

#[test]
fn logistics_runs_after_a_partial_castle_stage() {
    let h = harness();
    let engine = &h.runtime.engine;
    h.world.add_equipment("Keep", "anvil-1", 20);
    let build = CastleBuild {
        prefab: String::from("Workbench"),
        position: Position::new(1.0, 0.0, 0.0),
        rotation: 0.0,
    };
    let mut plan = Plan::new("p");
    plan.castle_automation = Some(CastleAutomation {
        target_castle: String::from("Keep"),
        build: vec![build.clone(), build],
    });
    plan.logistics_automation = Some(LogisticsAutomation {
        repair: vec![RepairOp {
            castle: String::from("Keep"),
            equipment_id: String::from("anvil-1"),
            repair_threshold: 50,
        }],
        ..LogisticsAutomation::default()
    });
    assert!(engine.load(plan).success);

    let run = engine.run("p", CallerId(1));
    assert!(!run.success);
    let report = run_report(run.execution_data);
    assert_eq!(
        report.castle.unwrap().status,
        StageStatus::PartiallyCompleted
    );
    let logistics = report.logistics.unwrap();
    assert_eq!(logistics.status, StageStatus::Completed);
    assert_eq!(h.world.durability("Keep", "anvil-1"), Some(100));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn self_transfers_are_rejected_ignoring_case() {
    let h = harness();
    let mut plan = Plan::new("p");
    plan.castle_automation = Some(CastleAutomation {
        target_castle: String::from("Keep"),
        build: Vec::new(),
    });
    plan.logistics_automation = Some(LogisticsAutomation {
        transfer: vec![TransferOp {
            from: String::from("Keep"),
            to: String::from("keep"),
            item: String::from("Wood"),
            amount: 10,
        }],
        ..LogisticsAutomation::default()
    });

    let result = h.runtime.engine.load(plan);
    assert!(!result.success);
    let details = result.validation_details.unwrap();
    assert!(details
        .messages
        .iter()
        .any(|m| m == "Cannot transfer items to the same location"));
    assert!(h.runtime.engine.get_plan("p").is_none());
}

#[test]
fn loot_chance_above_one_is_invalid() {
    let h = harness();
    let mut plan = Plan::new("p");
    let mut zone = Zone::new("z");
    zone.loot = Some(Loot {
        chests: Vec::new(),
        drop_tables: vec![DropTable {
            table_name: String::from("common"),
            items: vec![LootItem {
                item_name: String::from("Wood"),
                count: 1,
                chance: dec!(1.5),
            }],
        }],
    });
    plan.zones.push(zone);

    let result = h.runtime.engine.load(plan);
    assert!(!result.success);
    assert!(!result.validation_details.unwrap().is_valid);
}

#[test]
fn validation_is_repeatable() {
    let h = harness();
    let mut plan = Plan::new("p");
    plan.zones.push(boss_zone("z1"));
    plan.zones.push(Zone::new(""));

    let validator = h.runtime.engine.validator();
    let first = validator.validate(&plan);
    let second = validator.validate(&plan);
    assert!(!first.is_valid);
    assert_eq!(first, second);
}

// =============================================================================
// Zones
// =============================================================================

#[test]
fn zones_referenced_by_castles_cannot_be_deleted() {
    let h = harness();
    let engine = &h.runtime.engine;
    let mut plan = Plan::new("p");
    plan.zones.push(Zone::new("yard"));
    plan.zones.push(Zone::new("spare"));
    plan.castles.push(CastleRecord {
        name: String::from("Keep"),
        zone_id: Some(ZoneId::new("yard")),
    });
    assert!(engine.load(plan).success);

    assert!(engine.delete_zone("p", "yard").is_err());
    assert!(engine.get_zone("p", "yard").is_ok());
    assert!(engine.delete_zone("p", "spare").is_ok());
    assert_eq!(engine.list_zones("p").unwrap().zones.len(), 1);
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn past_schedules_are_refused() {
    let h = harness();
    let engine = &h.runtime.engine;
    assert!(engine.load(Plan::new("p")).success);

    let result = engine.schedule_plan("p", h.clock.now() - Duration::minutes(1), CallerId(1));
    assert!(!result.success);
    assert!(h.runtime.scheduler.active_schedules(None).is_empty());
}

#[test]
fn scheduled_runs_fire_once_when_due() {
    let h = harness();
    let engine = &h.runtime.engine;
    let mut plan = Plan::new("p");
    plan.zones.push(boss_zone("z1"));
    assert!(engine.load(plan).success);
    assert!(engine
        .schedule_plan("p", h.clock.now() + Duration::minutes(5), CallerId(9))
        .success);

    assert_eq!(h.runtime.scheduler.process_scheduled_events().events_fired, 0);
    h.clock.advance(Duration::minutes(5));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().events_fired, 1);
    assert_eq!(h.runtime.scheduler.process_scheduled_events().events_fired, 0);
    assert!(h.runtime.scheduler.active_schedules(None).is_empty());

    let runs = engine
        .execution_log(Some("p"))
        .into_iter()
        .filter(|e| e.caller == Some(CallerId(9)))
        .count();
    assert_eq!(runs, 2);
}

#[test]
fn respawns_outside_combat_are_skipped_not_consumed() {
    let h = harness();
    let plan_id = PlanId::new("p");
    assert!(h.runtime.engine.load(respawning_plan("p", 1)).success);
    let scheduler = &h.runtime.scheduler;

    h.clock.advance(Duration::seconds(60));
    let skipped = scheduler.process_scheduled_events();
    assert_eq!(skipped.respawns_skipped, 1);
    assert_eq!(skipped.respawns_fired, 0);
    let schedule = &scheduler.active_respawn_schedules(Some(&plan_id))[0];
    assert_eq!(schedule.respawn_count, 0);

    h.world.set_combat_state(&plan_id, CombatState::Active);
    let fired = scheduler.process_scheduled_events();
    assert_eq!(fired.respawns_fired, 1);
    assert_eq!(h.world.events().len(), 1);
}

#[test]
fn respawn_limit_deactivates_the_schedule() {
    let h = harness();
    let plan_id = PlanId::new("p");
    h.world.set_combat_state(&plan_id, CombatState::Active);
    assert!(h.runtime.engine.load(respawning_plan("p", 2)).success);
    let scheduler = &h.runtime.scheduler;

    for _ in 0..2 {
        h.clock.advance(Duration::seconds(60));
        assert_eq!(scheduler.process_scheduled_events().respawns_fired, 1);
    }

    h.clock.advance(Duration::seconds(60));
    let third = scheduler.process_scheduled_events();
    assert_eq!(third.respawns_fired, 0);
    assert_eq!(third.schedules_completed, 1);
    assert!(scheduler.active_respawn_schedules(Some(&plan_id)).is_empty());
    assert_eq!(h.world.events().len(), 2);
}

#[test]
fn reload_with_restart_reset_rearms_respawns() {
    let h = harness();
    let plan_id = PlanId::new("p");
    h.world.set_combat_state(&plan_id, CombatState::Active);
    let mut plan = respawning_plan("p", 1);
    plan.respawn_rules.reset_on_plan_restart = true;
    assert!(h.runtime.engine.load(plan.clone()).success);
    let scheduler = &h.runtime.scheduler;

    h.clock.advance(Duration::seconds(60));
    assert_eq!(scheduler.process_scheduled_events().respawns_fired, 1);
    h.clock.advance(Duration::seconds(60));
    scheduler.process_scheduled_events();
    assert!(scheduler.active_respawn_schedules(Some(&plan_id)).is_empty());

    assert!(h.runtime.engine.load(plan).success);
    let rearmed = scheduler.active_respawn_schedules(Some(&plan_id));
    assert_eq!(rearmed.len(), 1);
    assert_eq!(rearmed[0].respawn_count, 0);
}

#[test]
fn reload_without_rules_drops_respawns() {
    let h = harness();
    let plan_id = PlanId::new("p");
    h.world.set_combat_state(&plan_id, CombatState::Active);
    assert!(h.runtime.engine.load(respawning_plan("p", 0)).success);

    let mut plain = Plan::new("p");
    plain.zones.push(boss_zone("arena"));
    assert!(h.runtime.engine.load(plain).success);
    assert!(h.runtime.scheduler.active_respawn_schedules(Some(&plan_id)).is_empty());

    h.clock.advance(Duration::seconds(60));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().respawns_fired, 0);
    assert!(h.world.events().is_empty());
}

#[test]
fn reload_with_changed_rules_rebuilds_respawns() {
    let h = harness();
    let plan_id = PlanId::new("p");
    assert!(h.runtime.engine.load(respawning_plan("p", 0)).success);

    let mut changed = respawning_plan("p", 0);
    changed.respawn_rules.respawn_interval_seconds = 300;
    changed.respawn_rules.date_based_respawn = true;
    changed.respawn_rules.respawn_dates = vec![h.clock.now() + Duration::minutes(30)];
    assert!(h.runtime.engine.load(changed).success);

    let schedules = h.runtime.scheduler.active_respawn_schedules(Some(&plan_id));
    assert_eq!(schedules.len(), 2);
    h.world.set_combat_state(&plan_id, CombatState::Active);
    h.clock.advance(Duration::seconds(60));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().respawns_fired, 0);
    h.clock.advance(Duration::seconds(240));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().respawns_fired, 1);
}

#[test]
fn reload_with_same_rules_keeps_respawn_progress() {
    let h = harness();
    let plan_id = PlanId::new("p");
    h.world.set_combat_state(&plan_id, CombatState::Active);
    assert!(h.runtime.engine.load(respawning_plan("p", 3)).success);
    h.clock.advance(Duration::seconds(60));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().respawns_fired, 1);

    assert!(h.runtime.engine.load(respawning_plan("p", 3)).success);
    let schedules = h.runtime.scheduler.active_respawn_schedules(Some(&plan_id));
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].respawn_count, 1);
}

#[test]
fn date_respawns_fire_once_even_outside_combat() {
    let h = harness();
    let plan_id = PlanId::new("p");
    let mut plan = Plan::new("p");
    plan.zones.push(boss_zone("arena"));
    plan.respawn_rules = RespawnRules {
        date_based_respawn: true,
        respawn_dates: vec![h.clock.now() + Duration::minutes(2)],
        ..RespawnRules::default()
    };
    assert!(h.runtime.engine.load(plan).success);
    let scheduler = &h.runtime.scheduler;

    h.clock.advance(Duration::minutes(2));
    let tick = scheduler.process_scheduled_events();
    assert_eq!(tick.respawns_fired, 1);
    assert_eq!(tick.respawns_skipped, 0);
    assert_eq!(tick.schedules_completed, 1);
    assert!(scheduler.active_respawn_schedules(Some(&plan_id)).is_empty());

    h.clock.advance(Duration::minutes(2));
    assert_eq!(scheduler.process_scheduled_events(), TickSummary::default());
    assert_eq!(h.world.events().len(), 1);
}

#[test]
fn respawns_for_missing_plans_are_deactivated() {
    let h = harness();
    let scheduler = &h.runtime.scheduler;
    assert_eq!(scheduler.setup_respawn_schedules(&respawning_plan("ghost", 0)), 1);

    h.clock.advance(Duration::seconds(60));
    let tick = scheduler.process_scheduled_events();
    assert_eq!(tick.respawns_fired, 0);
    assert_eq!(tick.schedules_completed, 1);
    assert!(scheduler.active_respawn_schedules(None).is_empty());
}

#[test]
fn unloading_a_plan_stops_its_respawns() {
    let h = harness();
    let plan_id = PlanId::new("p");
    h.world.set_combat_state(&plan_id, CombatState::Active);
    assert!(h.runtime.engine.load(respawning_plan("p", 0)).success);
    assert!(h.runtime.engine.unload("p").success);

    h.clock.advance(Duration::seconds(60));
    let tick = h.runtime.scheduler.process_scheduled_events();
    assert_eq!(tick.respawns_fired, 0);
    assert!(h.runtime.scheduler.active_respawn_schedules(None).is_empty());
    assert!(h.world.events().is_empty());
}

#[test]
fn failed_scheduled_runs_are_fired_and_not_retried() {
    let h = harness();
    let engine = &h.runtime.engine;
    let plan_id = PlanId::new("p");
    let mut plan = Plan::new("p");
    plan.zones.push(boss_zone("z1"));
    assert!(engine.load(plan).success);
    let scheduled = engine.schedule_plan("p", h.clock.now() + Duration::minutes(1), CallerId(9));
    let event_id = match scheduled.execution_data {
        Some(ExecutionData::Scheduled(event)) => Some(event.event_id),
        _ => None,
    }
    .unwrap();

    h.world.set_combat_state(&plan_id, CombatState::Snapshot);
    h.clock.advance(Duration::minutes(1));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().events_fired, 1);
    h.clock.advance(Duration::minutes(1));
    assert_eq!(h.runtime.scheduler.process_scheduled_events().events_fired, 0);

    let event = engine.schedule_book().event(event_id).unwrap();
    assert_eq!(event.status, ScheduledEventStatus::Fired);
    let runs: Vec<_> = engine
        .execution_log(Some("p"))
        .into_iter()
        .filter(|e| e.operation == PlanOperation::Run)
        .collect();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].success);
}
