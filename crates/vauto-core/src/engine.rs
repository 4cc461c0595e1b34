//! The plan registry and the execution pipeline.
//!
//! [`ExecutionEngine`] owns every loaded plan and an append-only execution
//! log. Its public operations never return errors: failures come back as
//! [`ExecutionResult`] records with `success == false`.
//!
//! A live run walks three stages in order:
//!
//! 1. zones, in declaration order, aborting at the first failing zone
//! 2. castle builds, continuing past failed placements
//! 3. logistics in transfer, refill, repair, balance order, continuing past
//!    failed operations
//!
//! Castle and logistics stages only start when every zone succeeded. A
//! panic inside a stage is caught at the stage boundary and reported as a
//! failed stage.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};
use vauto_types::{
    AutomationResult, CallerId, Capability, CastleExecution, ExecutionData, ExecutionLogEntry,
    ExecutionResult, LogEntryId, LogisticsExecution, Plan, PlanId, PlanOperation, PlanPhase,
    RespawnReport, RunReport, ScheduledEvent, SimulationReport, StageKind, StageStatus,
    Visualization, Zone, ZoneExecution, ZoneFootprint,
};
use vauto_world::{LiveStateSource, TelemetrySink};

use crate::castle::CastleExecutor;
use crate::clock::Clock;
use crate::config::{AutomationConfig, ExecutionConfig};
use crate::gate::{Gate, GateContext};
use crate::logistics::LogisticsExecutor;
use crate::runtime::Collaborators;
use crate::scheduler::ScheduleBook;
use crate::validation::ValidationEngine;
use crate::zones::{TransitionReport, ZoneError, ZoneListing, ZoneManager};

/// A registry row as operators see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    /// Plan id.
    pub plan_id: PlanId,
    /// Free-form description.
    pub description: String,
    /// Current lifecycle phase.
    pub phase: PlanPhase,
    /// Whether the plan is restricted to dry runs.
    pub is_test_only: bool,
    /// Number of zones.
    pub zone_count: usize,
    /// Whether the plan builds castle structures.
    pub has_castle: bool,
    /// Whether the plan moves resources.
    pub has_logistics: bool,
    /// Active respawn schedules.
    pub respawn_schedules: usize,
}

struct ActivePlan {
    plan: Plan,
    phase: PlanPhase,
}

/// Loads, validates, runs and schedules plans.
pub struct ExecutionEngine {
    validator: ValidationEngine,
    gate: Arc<dyn Gate>,
    zones: ZoneManager,
    castle: CastleExecutor,
    logistics: LogisticsExecutor,
    live: Arc<dyn LiveStateSource>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    schedules: Arc<ScheduleBook>,
    config: ExecutionConfig,
    plans: RwLock<BTreeMap<PlanId, ActivePlan>>,
    locks: Mutex<BTreeMap<PlanId, Arc<Mutex<()>>>>,
    log: RwLock<Vec<ExecutionLogEntry>>,
}

impl ExecutionEngine {
    /// Wire an engine from its collaborators.
    pub fn new(
        collaborators: &Collaborators,
        gate: Arc<dyn Gate>,
        clock: Arc<dyn Clock>,
        config: &AutomationConfig,
    ) -> Self {
        let resolver = &collaborators.resolver;
        let validator = ValidationEngine::new(
            Arc::clone(resolver),
            Arc::clone(&gate),
            config.validation.clone(),
        );
        Self {
            zones: ZoneManager::new(
                validator.clone(),
                Arc::clone(&gate),
                Arc::clone(resolver),
                Arc::clone(&collaborators.effects),
                Arc::clone(&collaborators.spawns),
            ),
            castle: CastleExecutor::new(
                Arc::clone(&gate),
                Arc::clone(resolver),
                Arc::clone(&collaborators.structures),
            ),
            logistics: LogisticsExecutor::new(
                Arc::clone(&gate),
                Arc::clone(resolver),
                Arc::clone(&collaborators.inventory),
            ),
            validator,
            gate,
            live: Arc::clone(&collaborators.live),
            telemetry: Arc::clone(&collaborators.telemetry),
            clock,
            schedules: Arc::new(ScheduleBook::new()),
            config: config.execution.clone(),
            plans: RwLock::new(BTreeMap::new()),
            locks: Mutex::new(BTreeMap::new()),
            log: RwLock::new(Vec::new()),
        }
    }

    /// The schedule book shared with the scheduler.
    pub fn schedule_book(&self) -> Arc<ScheduleBook> {
        Arc::clone(&self.schedules)
    }

    /// The validation engine plans are checked with.
    pub const fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Validate a plan and store it, replacing any plan with the same id.
    ///
    /// An invalid plan is not stored; the result carries the validation
    /// report either way. Respawn schedules are rebuilt from the new rules,
    /// except on a reload with unchanged rules and no restart reset, where
    /// the running schedules are kept.
    pub fn load(&self, mut plan: Plan) -> ExecutionResult {
        let plan_id = plan.plan_id.clone();
        if plan_id.is_blank() {
            warn!("Rejected plan with empty id");
            return ExecutionResult::failed(plan_id, "Plan id cannot be empty");
        }

        self.refresh_live(&mut plan);
        let report = self.validator.validate(&plan);
        if !report.is_valid {
            let message = format!("Plan '{plan_id}' failed validation");
            warn!(
                plan_id = %plan_id,
                errors = report.messages.len(),
                "Plan failed validation"
            );
            self.append_log(&plan_id, PlanOperation::Load, None, false, &message);
            return ExecutionResult::failed(plan_id, message).with_validation(report);
        }

        let previous = self.plans.write().insert(
            plan_id.clone(),
            ActivePlan {
                plan: plan.clone(),
                phase: PlanPhase::Loaded,
            },
        );
        let replaced = previous.is_some();
        self.schedules.sync_respawn_schedules(
            &plan,
            previous.as_ref().map(|p| &p.plan.respawn_rules),
            self.clock.now(),
        );

        let message = format!("Plan '{plan_id}' loaded and validated successfully");
        info!(
            plan_id = %plan_id,
            replaced,
            zones = plan.zones.len(),
            warnings = report.warnings.len(),
            "Plan loaded"
        );
        self.append_log(&plan_id, PlanOperation::Load, None, true, &message);
        ExecutionResult::succeeded(plan_id, message).with_validation(report)
    }

    /// Remove a plan, cancel its pending runs and drop its respawns.
    pub fn unload(&self, plan_id: &str) -> ExecutionResult {
        let Some(active) = self.plans.write().remove(plan_id) else {
            return self.not_found(plan_id, PlanOperation::Unload, None);
        };
        let plan_id = active.plan.plan_id;
        self.schedules.remove_plan(&plan_id, self.clock.now());
        self.locks.lock().remove(&plan_id);

        let message = format!("Plan '{plan_id}' unloaded");
        info!(plan_id = %plan_id, "Plan unloaded");
        self.append_log(&plan_id, PlanOperation::Unload, None, true, &message);
        ExecutionResult::succeeded(plan_id, message)
    }

    /// A copy of a loaded plan.
    pub fn get_plan(&self, plan_id: &str) -> Option<Plan> {
        self.plans.read().get(plan_id).map(|a| a.plan.clone())
    }

    /// Lifecycle phase of a loaded plan.
    pub fn phase(&self, plan_id: &str) -> Option<PlanPhase> {
        self.plans.read().get(plan_id).map(|a| a.phase)
    }

    /// Every loaded plan, ordered by id.
    pub fn list_plans(&self) -> Vec<PlanSummary> {
        self.plans
            .read()
            .values()
            .map(|active| {
                let plan = &active.plan;
                PlanSummary {
                    plan_id: plan.plan_id.clone(),
                    description: plan.description.clone(),
                    phase: active.phase,
                    is_test_only: plan.is_test_only,
                    zone_count: plan.zones.len(),
                    has_castle: plan.castle_automation.is_some(),
                    has_logistics: plan.logistics_automation.is_some(),
                    respawn_schedules: self.schedules.active_respawns(Some(&plan.plan_id)).len(),
                }
            })
            .collect()
    }

    /// Log entries, oldest first, optionally for one plan.
    pub fn execution_log(&self, plan_id: Option<&str>) -> Vec<ExecutionLogEntry> {
        self.log
            .read()
            .iter()
            .filter(|e| plan_id.is_none_or(|p| e.plan_id.as_str() == p))
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Dry-run a plan under a read-only capability.
    ///
    /// Every step the run would take is described; nothing is applied.
    /// `visualize` defaults to the configured setting.
    pub fn test(&self, plan_id: &str, caller: CallerId, visualize: Option<bool>) -> ExecutionResult {
        let Some(mut plan) = self.get_plan(plan_id) else {
            return self.not_found(plan_id, PlanOperation::Test, Some(caller));
        };
        self.refresh_live(&mut plan);
        let visualize = visualize.unwrap_or(self.config.visualize_by_default);
        let context = GateContext::for_plan(&plan, caller);

        self.set_phase(&plan.plan_id, PlanPhase::Testing);
        let result = self
            .gate
            .execute(&context, Capability::ReadOnlyAnalytics, &mut |granted| {
                match guarded(StageKind::Zones, || self.simulate(&plan, granted, visualize)) {
                    Ok(report) => AutomationResult::ok(granted, ExecutionData::Simulation(report)),
                    Err(error) => AutomationResult::failed(granted, error, None),
                }
            });
        self.set_phase(&plan.plan_id, PlanPhase::Loaded);

        self.telemetry
            .record_system_pattern("TestExecution", plan_id, result.success);
        let outcome = if result.success {
            let message = format!("Test execution completed for plan '{}'", plan.plan_id);
            info!(plan_id = %plan.plan_id, %caller, "Test execution completed");
            attach(ExecutionResult::succeeded(plan.plan_id.clone(), message), result.data)
        } else {
            let error = result.error.unwrap_or_default();
            warn!(plan_id = %plan.plan_id, %caller, error = %error, "Test execution failed");
            attach(ExecutionResult::failed(plan.plan_id.clone(), error), result.data)
        };
        self.append_log(
            &plan.plan_id,
            PlanOperation::Test,
            Some(caller),
            outcome.success,
            &outcome.message,
        );
        outcome.as_test_run()
    }

    /// Execute a plan live.
    ///
    /// Runs of the same plan are serialized. The capability is read-only for
    /// test-only plans, in which case every stage only describes its work.
    pub fn run(&self, plan_id: &str, caller: CallerId) -> ExecutionResult {
        if self.phase(plan_id).is_none() {
            return self.not_found(plan_id, PlanOperation::Run, Some(caller));
        }
        let lock = self.plan_lock(&PlanId::from(plan_id));
        let _running = lock.lock();

        // Read after the lock so a run queued behind another sees any reload.
        let Some(mut plan) = self.get_plan(plan_id) else {
            return self.not_found(plan_id, PlanOperation::Run, Some(caller));
        };
        self.refresh_live(&mut plan);

        let context = GateContext::for_plan(&plan, caller);
        let capability = Capability::for_plan(plan.is_test_only);
        info!(plan_id = %plan.plan_id, %caller, %capability, "Plan execution started");

        self.set_phase(&plan.plan_id, PlanPhase::Running);
        let result = self.gate.execute(&context, capability, &mut |granted| {
            let report = self.execute_stages(&plan, &context, granted);
            match first_failure(&report) {
                None => AutomationResult::ok(granted, ExecutionData::Run(report)),
                Some(error) => {
                    AutomationResult::failed(granted, error, Some(ExecutionData::Run(report)))
                }
            }
        });
        self.set_phase(&plan.plan_id, PlanPhase::Loaded);

        self.telemetry
            .record_system_pattern("FullExecution", plan_id, result.success);
        let outcome = if result.success {
            let message = format!("Plan '{}' executed successfully", plan.plan_id);
            info!(plan_id = %plan.plan_id, %caller, "Plan executed");
            attach(ExecutionResult::succeeded(plan.plan_id.clone(), message), result.data)
        } else {
            let error = result.error.unwrap_or_default();
            warn!(plan_id = %plan.plan_id, %caller, error = %error, "Plan execution failed");
            attach(ExecutionResult::failed(plan.plan_id.clone(), error), result.data)
        };
        self.append_log(
            &plan.plan_id,
            PlanOperation::Run,
            Some(caller),
            outcome.success,
            &outcome.message,
        );
        outcome
    }

    /// Schedule a live run for later.
    pub fn schedule_plan(
        &self,
        plan_id: &str,
        execute_at: DateTime<Utc>,
        caller: CallerId,
    ) -> ExecutionResult {
        let Some(plan) = self.get_plan(plan_id) else {
            return self.not_found(plan_id, PlanOperation::Schedule, Some(caller));
        };
        let plan_id = plan.plan_id;
        let now = self.clock.now();
        if execute_at <= now {
            let error = "Execution time must be in the future";
            warn!(plan_id = %plan_id, %execute_at, "Schedule rejected");
            self.append_log(&plan_id, PlanOperation::Schedule, Some(caller), false, error);
            return ExecutionResult::failed(plan_id, error);
        }

        let event = ScheduledEvent::new(plan_id.clone(), execute_at, caller, now);
        self.schedules.add_event(event.clone());
        let message = format!("Plan '{plan_id}' scheduled for {execute_at}");
        info!(plan_id = %plan_id, event_id = %event.event_id, %execute_at, "Plan scheduled");
        self.append_log(&plan_id, PlanOperation::Schedule, Some(caller), true, &message);
        ExecutionResult::succeeded(plan_id, message).with_data(ExecutionData::Scheduled(event))
    }

    /// Respawn the boss of every enabled zone that has one.
    ///
    /// Each boss is attempted even if an earlier one failed. Under a
    /// read-only capability nothing spawns.
    pub fn respawn(&self, plan_id: &str, caller: CallerId) -> ExecutionResult {
        let Some(mut plan) = self.get_plan(plan_id) else {
            return self.not_found(plan_id, PlanOperation::Respawn, Some(caller));
        };
        self.refresh_live(&mut plan);
        let context = GateContext::for_plan(&plan, caller);
        let capability = Capability::for_plan(plan.is_test_only);

        let result = self.gate.execute(&context, capability, &mut |granted| {
            let mut report = RespawnReport::default();
            if granted.is_mutating() {
                for zone in plan.zones.iter().filter(|z| z.enabled && z.boss.is_some()) {
                    match guarded(StageKind::Zones, || self.zones.spawn_boss(zone)) {
                        Ok(Ok(_)) => report.respawned.push(zone.zone_id.clone()),
                        Ok(Err(e)) => report
                            .failed
                            .push(format!("Zone {}: {e}", zone.display_name())),
                        Err(e) => report.failed.push(e),
                    }
                }
            }
            if report.failed.is_empty() {
                AutomationResult::ok(granted, ExecutionData::Respawn(report))
            } else {
                let error = report.failed.join("; ");
                AutomationResult::failed(granted, error, Some(ExecutionData::Respawn(report)))
            }
        });

        self.telemetry
            .record_system_pattern("Respawn", plan_id, result.success);
        let outcome = if result.success {
            let respawned = match &result.data {
                Some(ExecutionData::Respawn(r)) => r.respawned.len(),
                _ => 0,
            };
            let message = format!("Respawned {respawned} bosses for plan '{}'", plan.plan_id);
            info!(plan_id = %plan.plan_id, %caller, respawned, "Bosses respawned");
            attach(ExecutionResult::succeeded(plan.plan_id.clone(), message), result.data)
        } else {
            let error = result.error.unwrap_or_default();
            warn!(plan_id = %plan.plan_id, %caller, error = %error, "Respawn failed");
            attach(ExecutionResult::failed(plan.plan_id.clone(), error), result.data)
        };
        self.append_log(
            &plan.plan_id,
            PlanOperation::Respawn,
            Some(caller),
            outcome.success,
            &outcome.message,
        );
        outcome
    }

    fn execute_stages(&self, plan: &Plan, context: &GateContext, granted: Capability) -> RunReport {
        let mut report = RunReport {
            capability: granted,
            zones: Vec::with_capacity(plan.zones.len()),
            aborted_at: None,
            castle: None,
            logistics: None,
        };

        for zone in &plan.zones {
            let execution = self.execute_zone(plan, zone, granted);
            let failed = !execution.success;
            report.zones.push(execution);
            if failed {
                warn!(plan_id = %plan.plan_id, zone_id = %zone.zone_id, "Zone failed, run aborted");
                report.aborted_at = Some(zone.zone_id.clone());
                return report;
            }
        }

        if let Some(castle) = &plan.castle_automation {
            let stage = guarded(StageKind::Castle, || {
                self.castle.execute(context, granted, castle)
            })
            .unwrap_or_else(|error| CastleExecution {
                target_castle: castle.target_castle.clone(),
                status: StageStatus::Failed,
                message: error,
                builds: Vec::new(),
            });
            report.castle = Some(stage);
        }

        if let Some(logistics) = &plan.logistics_automation {
            let stage = guarded(StageKind::Logistics, || {
                self.logistics.execute(context, granted, logistics)
            })
            .unwrap_or_else(|error| {
                warn!(plan_id = %plan.plan_id, error = %error, "Logistics stage failed");
                LogisticsExecution {
                    status: StageStatus::Failed,
                    operations: Vec::new(),
                }
            });
            report.logistics = Some(stage);
        }

        report
    }

    fn execute_zone(&self, plan: &Plan, zone: &Zone, granted: Capability) -> ZoneExecution {
        let gate = self.gate.check_zone_gates(zone, plan);
        if !gate.passed {
            return ZoneExecution {
                zone_id: zone.zone_id.clone(),
                success: false,
                steps: Vec::new(),
                error: Some(format!(
                    "Zone {}: {}",
                    zone.display_name(),
                    gate.messages.join("; ")
                )),
            };
        }
        guarded(StageKind::Zones, || self.zones.setup(plan, zone, granted)).unwrap_or_else(
            |error| ZoneExecution {
                zone_id: zone.zone_id.clone(),
                success: false,
                steps: Vec::new(),
                error: Some(format!("Zone {}: {error}", zone.display_name())),
            },
        )
    }

    fn simulate(&self, plan: &Plan, granted: Capability, visualize: bool) -> SimulationReport {
        let mut steps = Vec::new();
        for zone in &plan.zones {
            if zone.enabled {
                steps.extend(self.zones.simulate(zone));
            } else {
                steps.push(format!("Zone {} is disabled, skipped", zone.display_name()));
            }
        }
        if let Some(castle) = &plan.castle_automation {
            steps.extend(self.castle.simulate(castle));
        }
        if let Some(logistics) = &plan.logistics_automation {
            steps.extend(self.logistics.simulate(logistics));
        }

        let visualization = visualize.then(|| visualization(plan));
        debug!(plan_id = %plan.plan_id, steps = steps.len(), visualize, "Plan simulated");
        SimulationReport {
            capability: granted,
            steps,
            visualization,
        }
    }

    // -----------------------------------------------------------------------
    // Zones by plan id
    // -----------------------------------------------------------------------

    /// Add a zone to a loaded plan.
    pub fn create_zone(&self, plan_id: &str, zone: Zone) -> Result<(), ZoneError> {
        self.with_plan_mut(plan_id, |plan| self.zones.create(plan, zone))
    }

    /// Replace a zone of a loaded plan.
    pub fn update_zone(&self, plan_id: &str, zone_id: &str, zone: Zone) -> Result<(), ZoneError> {
        self.with_plan_mut(plan_id, |plan| self.zones.update(plan, zone_id, zone))
    }

    /// Remove a zone from a loaded plan.
    pub fn delete_zone(&self, plan_id: &str, zone_id: &str) -> Result<Zone, ZoneError> {
        self.with_plan_mut(plan_id, |plan| self.zones.delete(plan, zone_id))
    }

    /// Point a zone of a loaded plan at a saved layout.
    pub fn save_zone_schematic(
        &self,
        plan_id: &str,
        zone_id: &str,
        schematic_id: &str,
    ) -> Result<(), ZoneError> {
        self.with_plan_mut(plan_id, |plan| {
            self.zones.save_schematic(plan, zone_id, schematic_id)
        })
    }

    /// A zone of a loaded plan.
    pub fn get_zone(&self, plan_id: &str, zone_id: &str) -> Result<Zone, ZoneError> {
        let plan = self.require_plan(plan_id)?;
        self.zones.get(&plan, zone_id).cloned()
    }

    /// Every zone of a loaded plan.
    pub fn list_zones(&self, plan_id: &str) -> Result<ZoneListing, ZoneError> {
        let plan = self.require_plan(plan_id)?;
        Ok(self.zones.list(&plan))
    }

    /// Apply a zone's entry bundle to a player.
    pub fn enter_zone(
        &self,
        plan_id: &str,
        zone_id: &str,
        player: CallerId,
    ) -> Result<TransitionReport, ZoneError> {
        let mut plan = self.require_plan(plan_id)?;
        self.refresh_live(&mut plan);
        self.zones.enter(&plan, zone_id, player)
    }

    /// Apply a zone's exit bundle to a player.
    pub fn exit_zone(
        &self,
        plan_id: &str,
        zone_id: &str,
        player: CallerId,
    ) -> Result<TransitionReport, ZoneError> {
        let mut plan = self.require_plan(plan_id)?;
        self.refresh_live(&mut plan);
        self.zones.exit(&plan, zone_id, player)
    }

    fn require_plan(&self, plan_id: &str) -> Result<Plan, ZoneError> {
        self.get_plan(plan_id)
            .ok_or_else(|| ZoneError::PlanNotFound(PlanId::from(plan_id)))
    }

    fn with_plan_mut<T, F>(&self, plan_id: &str, edit: F) -> Result<T, ZoneError>
    where
        F: FnOnce(&mut Plan) -> Result<T, ZoneError>,
    {
        let mut plans = self.plans.write();
        let active = plans
            .get_mut(plan_id)
            .ok_or_else(|| ZoneError::PlanNotFound(PlanId::from(plan_id)))?;
        edit(&mut active.plan)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn refresh_live(&self, plan: &mut Plan) {
        match self.live.live_state(&plan.plan_id) {
            Ok(live) => plan.live = live,
            Err(e) => debug!(plan_id = %plan.plan_id, error = %e, "Live state refresh failed"),
        }
    }

    fn set_phase(&self, plan_id: &PlanId, phase: PlanPhase) {
        if let Some(active) = self.plans.write().get_mut(plan_id) {
            active.phase = phase;
        }
    }

    fn plan_lock(&self, plan_id: &PlanId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(plan_id.clone()).or_default())
    }

    fn not_found(
        &self,
        plan_id: &str,
        operation: PlanOperation,
        caller: Option<CallerId>,
    ) -> ExecutionResult {
        let plan_id = PlanId::from(plan_id);
        let error = format!("Plan '{plan_id}' not found");
        debug!(plan_id = %plan_id, ?operation, "Plan not found");
        self.append_log(&plan_id, operation, caller, false, &error);
        ExecutionResult::failed(plan_id, error)
    }

    fn append_log(
        &self,
        plan_id: &PlanId,
        operation: PlanOperation,
        caller: Option<CallerId>,
        success: bool,
        message: &str,
    ) {
        self.log.write().push(ExecutionLogEntry {
            entry_id: LogEntryId::new(),
            plan_id: plan_id.clone(),
            operation,
            caller,
            success,
            message: message.to_owned(),
            recorded_at: self.clock.now(),
        });
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("plans", &self.plans.read().len())
            .field("log_entries", &self.log.read().len())
            .finish_non_exhaustive()
    }
}

/// Run a stage, turning a panic into an error message.
fn guarded<T, F>(stage: StageKind, f: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("unknown panic"));
        warn!(?stage, reason = %reason, "Unexpected failure in stage");
        format!("Unexpected failure in {stage:?} stage: {reason}")
    })
}

/// The message of the first thing that went wrong in a run, if anything.
fn first_failure(report: &RunReport) -> Option<String> {
    if let Some(zone) = report.zones.iter().find(|z| !z.success) {
        return Some(
            zone.error
                .clone()
                .unwrap_or_else(|| format!("Zone {} failed", zone.zone_id)),
        );
    }
    if let Some(castle) = report
        .castle
        .as_ref()
        .filter(|c| c.status != StageStatus::Completed)
    {
        return Some(castle.message.clone());
    }
    report
        .logistics
        .as_ref()
        .filter(|l| l.status != StageStatus::Completed)
        .map(|l| match l.status {
            StageStatus::PartiallyCompleted => format!(
                "Logistics automation partially completed with {} failed operations",
                l.failed_count()
            ),
            _ => format!(
                "Logistics automation failed with {} failed operations",
                l.failed_count()
            ),
        })
}

fn attach(result: ExecutionResult, data: Option<ExecutionData>) -> ExecutionResult {
    match data {
        Some(data) => result.with_data(data),
        None => result,
    }
}

fn visualization(plan: &Plan) -> Visualization {
    let zones = plan
        .zones
        .iter()
        .filter(|z| z.enabled)
        .map(|zone| ZoneFootprint {
            zone_id: zone.zone_id.clone(),
            name: zone.display_name().to_owned(),
            center: zone.location.as_ref().map(|l| l.center),
            radius: zone.location.as_ref().map(|l| l.radius),
            has_boss: zone.boss.is_some(),
            mob_count: zone
                .mobs
                .iter()
                .map(|m| u32::try_from(m.count).unwrap_or(0))
                .fold(0_u32, u32::saturating_add),
        })
        .collect();
    let logistics_count = plan
        .logistics_automation
        .as_ref()
        .map_or(0, |l| l.operations().count());
    Visualization {
        zones,
        build_count: plan
            .castle_automation
            .as_ref()
            .map_or(0, |c| u32::try_from(c.build.len()).unwrap_or(u32::MAX)),
        logistics_count: u32::try_from(logistics_count).unwrap_or(u32::MAX),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{Duration, TimeZone};
    use vauto_types::{Boss, BossRespawn, CastleAutomation, CastleBuild, CombatState, Position};
    use vauto_world::InMemoryWorld;

    use super::*;
    use crate::clock::ManualClock;
    use crate::gate::PolicyGate;

    fn make_engine() -> (ExecutionEngine, Arc<InMemoryWorld>, Arc<ManualClock>) {
        let world = Arc::new(InMemoryWorld::new());
        let collaborators = Collaborators::in_memory(Arc::clone(&world)).unwrap();
        let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let engine = ExecutionEngine::new(
            &collaborators,
            Arc::new(PolicyGate::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            &AutomationConfig::default(),
        );
        (engine, world, clock)
    }

    fn make_boss_zone(id: &str) -> Zone {
        let mut zone = Zone::new(id);
        zone.boss = Some(Boss {
            boss_name: String::from("Wolf"),
            boss_level: 5,
            respawn: Some(BossRespawn::interval(60)),
            reward: Vec::new(),
        });
        zone
    }

    #[test]
    fn load_then_run_round_trip() {
        let (engine, world, _) = make_engine();
        let mut plan = Plan::new("p1");
        plan.zones.push(make_boss_zone("z1"));

        let loaded = engine.load(plan);
        assert!(loaded.success, "{:?}", loaded.error);
        assert_eq!(loaded.message, "Plan 'p1' loaded and validated successfully");

        let run = engine.run("p1", CallerId(7));
        assert!(run.success, "{:?}", run.error);
        assert_eq!(run.message, "Plan 'p1' executed successfully");
        assert_eq!(run.run_report().unwrap().zones.len(), 1);
        assert!(!world.events().is_empty());
        assert_eq!(engine.phase("p1"), Some(PlanPhase::Loaded));
    }

    #[test]
    fn invalid_plans_are_not_stored() {
        let (engine, _, _) = make_engine();
        let mut plan = Plan::new("bad");
        let mut zone = make_boss_zone("z1");
        if let Some(boss) = zone.boss.as_mut() {
            boss.boss_level = 0;
        }
        plan.zones.push(zone);

        let result = engine.load(plan);
        assert!(!result.success);
        assert!(result.validation_details.is_some());
        assert!(engine.get_plan("bad").is_none());
        assert!(engine.list_plans().is_empty());
    }

    #[test]
    fn empty_plan_id_is_rejected() {
        let (engine, _, _) = make_engine();
        let result = engine.load(Plan::new(""));
        assert!(!result.success);
        assert!(engine.execution_log(None).is_empty());
    }

    #[test]
    fn unknown_plans_report_not_found() {
        let (engine, _, clock) = make_engine();
        let run = engine.run("ghost", CallerId(1));
        assert_eq!(run.error.as_deref(), Some("Plan 'ghost' not found"));
        let test = engine.test("ghost", CallerId(1), None);
        assert!(!test.success);
        let scheduled = engine.schedule_plan("ghost", clock.now() + Duration::hours(1), CallerId(1));
        assert!(!scheduled.success);
        assert_eq!(engine.execution_log(Some("ghost")).len(), 3);
    }

    #[test]
    fn dry_runs_never_touch_the_world() {
        let (engine, world, _) = make_engine();
        let mut plan = Plan::new("p");
        plan.zones.push(make_boss_zone("z1"));
        plan.castle_automation = Some(CastleAutomation {
            target_castle: String::from("Keep"),
            build: vec![CastleBuild {
                prefab: String::from("Workbench"),
                position: Position::new(1.0, 0.0, 1.0),
                rotation: 90.0,
            }],
        });
        assert!(engine.load(plan).success);

        let result = engine.test("p", CallerId(1), Some(true));
        assert!(result.success);
        assert!(result.is_test_run);
        assert_eq!(result.message, "Test execution completed for plan 'p'");
        let report = match result.execution_data {
            Some(ExecutionData::Simulation(report)) => Some(report),
            _ => None,
        }
        .unwrap();
        assert!(report.steps.iter().all(|s| s.starts_with("Would")));
        let visualization = report.visualization.unwrap();
        assert_eq!(visualization.zones.len(), 1);
        assert_eq!(visualization.build_count, 1);
        assert!(world.events().is_empty());
    }

    #[test]
    fn scheduling_requires_a_future_time() {
        let (engine, _, clock) = make_engine();
        assert!(engine.load(Plan::new("p")).success);

        let past = engine.schedule_plan("p", clock.now() - Duration::seconds(1), CallerId(1));
        assert!(!past.success);
        assert_eq!(past.error.as_deref(), Some("Execution time must be in the future"));

        let now = engine.schedule_plan("p", clock.now(), CallerId(1));
        assert!(!now.success);

        let later = engine.schedule_plan("p", clock.now() + Duration::minutes(5), CallerId(1));
        assert!(later.success);
        assert_eq!(engine.schedule_book().active_events(None).len(), 1);
    }

    #[test]
    fn unload_cancels_pending_runs() {
        let (engine, _, clock) = make_engine();
        assert!(engine.load(Plan::new("p")).success);
        assert!(engine
            .schedule_plan("p", clock.now() + Duration::minutes(5), CallerId(1))
            .success);
        assert!(engine.unload("p").success);
        assert!(engine.schedule_book().active_events(None).is_empty());
        assert!(!engine.unload("p").success);
    }

    #[test]
    fn respawn_spawns_every_boss() {
        let (engine, world, _) = make_engine();
        let mut plan = Plan::new("p");
        plan.zones.push(make_boss_zone("z1"));
        plan.zones.push(make_boss_zone("z2"));
        plan.zones.push(Zone::new("plain"));
        assert!(engine.load(plan).success);

        let result = engine.respawn("p", CallerId(1));
        assert!(result.success, "{:?}", result.error);
        let report = match result.execution_data {
            Some(ExecutionData::Respawn(report)) => Some(report),
            _ => None,
        }
        .unwrap();
        assert_eq!(report.respawned.len(), 2);
        assert_eq!(world.events().len(), 2);
    }

    #[test]
    fn queued_runs_execute_the_plan_loaded_while_they_waited() {
        let (engine, _, _) = make_engine();
        let mut plan = Plan::new("p");
        plan.zones.push(make_boss_zone("old"));
        assert!(engine.load(plan).success);

        let lock = engine.plan_lock(&PlanId::new("p"));
        let guard = lock.lock();
        let report = std::thread::scope(|scope| {
            let queued = scope.spawn(|| engine.run("p", CallerId(1)));
            std::thread::sleep(std::time::Duration::from_millis(50));

            let mut reloaded = Plan::new("p");
            reloaded.zones.push(make_boss_zone("new"));
            assert!(engine.load(reloaded).success);
            drop(guard);

            queued.join().unwrap()
        });

        assert!(report.success, "{:?}", report.error);
        let run = match report.execution_data {
            Some(ExecutionData::Run(run)) => Some(run),
            _ => None,
        }
        .unwrap();
        assert_eq!(run.zones.len(), 1);
        assert_eq!(run.zones[0].zone_id.as_str(), "new");
    }

    #[test]
    fn runs_are_denied_while_restoring() {
        let (engine, world, _) = make_engine();
        let mut plan = Plan::new("p");
        plan.zones.push(make_boss_zone("z1"));
        assert!(engine.load(plan).success);
        world.set_combat_state(&PlanId::new("p"), CombatState::Restoring);

        let result = engine.run("p", CallerId(1));
        assert!(!result.success);
        assert!(world.events().is_empty());
    }

    #[test]
    fn zone_edits_go_through_the_registry() {
        let (engine, _, _) = make_engine();
        assert!(engine.load(Plan::new("p")).success);

        engine.create_zone("p", Zone::new("z1")).unwrap();
        assert_eq!(engine.list_zones("p").unwrap().message, "1 zones found");
        assert_eq!(engine.get_zone("p", "z1").unwrap().zone_id.as_str(), "z1");
        engine.save_zone_schematic("p", "z1", "arena-01").unwrap();
        assert!(engine.get_plan("p").unwrap().zones[0].schematic.as_ref().unwrap().enabled);
        engine.delete_zone("p", "z1").unwrap();

        assert_eq!(
            engine.create_zone("q", Zone::new("z1")),
            Err(ZoneError::PlanNotFound(PlanId::new("q")))
        );
    }
}
