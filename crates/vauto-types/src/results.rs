//! Validation reports and execution results.
//!
//! Every public engine operation returns one of these records instead of an
//! error. They are reports: produced once, never updated afterwards.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Capability, LogisticsKind, StageStatus};
use crate::ids::{PlanId, ZoneId};
use crate::plan::Position;
use crate::schedule::ScheduledEvent;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Itemized validation of one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneValidation {
    /// The zone validated.
    pub zone_id: ZoneId,
    /// Display name used in messages.
    pub zone_name: String,
    /// Whether the zone has no defects.
    pub is_valid: bool,
    /// Defects, in encounter order.
    pub messages: Vec<String>,
    /// Advisory notes that do not affect validity.
    pub warnings: Vec<String>,
    /// The zone asks for developer approval.
    pub requires_dev_approval: bool,
    /// The zone asks for a combat snapshot.
    pub requires_snapshot: bool,
}

/// Validation of a zone's chests and drop tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LootValidation {
    /// Whether the loot has no defects.
    pub is_valid: bool,
    /// Defects, in encounter order.
    pub messages: Vec<String>,
}

/// Validation of a zone's schematic reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SchematicValidation {
    /// Zone owning the schematic.
    pub zone_id: ZoneId,
    /// Referenced schematic id.
    pub schematic_id: String,
    /// Whether the reference has no defects.
    pub is_valid: bool,
    /// Defects.
    pub messages: Vec<String>,
    /// Advisory notes.
    pub warnings: Vec<String>,
}

/// Validation of one logistics operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OperationValidation {
    /// Operation kind.
    pub kind: LogisticsKind,
    /// Index within the kind's list.
    pub index: u32,
    /// Human-readable label naming the operation.
    pub label: String,
    /// Whether the operation has no defects.
    pub is_valid: bool,
    /// Defects, each prefixed with the label.
    pub messages: Vec<String>,
}

/// Validation of the logistics definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LogisticsValidation {
    /// Whether every operation is valid.
    pub is_valid: bool,
    /// All operation defects, in execution order.
    pub messages: Vec<String>,
    /// Per-operation detail.
    pub operations: Vec<OperationValidation>,
}

/// Validation of one structure placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BuildValidation {
    /// Index in the build list.
    pub index: u32,
    /// Prefab name.
    pub prefab: String,
    /// Whether the placement has no defects.
    pub is_valid: bool,
    /// Defects.
    pub messages: Vec<String>,
}

/// Validation of the castle automation definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CastleValidation {
    /// Targeted castle.
    pub target_castle: String,
    /// Whether the definition has no defects.
    pub is_valid: bool,
    /// All defects, in encounter order.
    pub messages: Vec<String>,
    /// Per-placement detail.
    pub builds: Vec<BuildValidation>,
}

/// Checks spanning zones, castle and logistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CrossSystemValidation {
    /// Whether every cross-reference resolves.
    pub is_valid: bool,
    /// Unresolved references.
    pub messages: Vec<String>,
    /// Advisory notes (overlapping zones and similar).
    pub warnings: Vec<String>,
}

/// Outcome of the gate's zone check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GateResult {
    /// Whether the zone may be set up.
    pub passed: bool,
    /// Failed because developer approval is missing.
    pub requires_dev_approval: bool,
    /// Failed because a snapshot cannot be taken now.
    pub requires_snapshot: bool,
    /// Reasons for failure.
    pub messages: Vec<String>,
}

impl GateResult {
    /// A passing result with no messages.
    pub const fn pass() -> Self {
        Self {
            passed: true,
            requires_dev_approval: false,
            requires_snapshot: false,
            messages: Vec::new(),
        }
    }
}

/// Gate outcome for one zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneGateCheck {
    /// The zone checked.
    pub zone_id: ZoneId,
    /// The gate's verdict.
    pub result: GateResult,
}

/// The full validation report of a plan.
///
/// `is_valid` is the conjunction of every section. The two `requires_*`
/// flags are the disjunction of every zone and gate result. `messages`
/// concatenates section messages in a fixed order: zones, schematics,
/// logistics, castle, cross-system, gates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ComprehensiveValidationResult {
    /// The plan validated.
    pub plan_id: PlanId,
    /// Whether the plan may be loaded.
    pub is_valid: bool,
    /// Some zone needs developer approval.
    pub requires_dev_approval: bool,
    /// Some zone needs a combat snapshot.
    pub requires_snapshot: bool,
    /// Every defect, in section order.
    pub messages: Vec<String>,
    /// Every advisory note, in section order.
    pub warnings: Vec<String>,
    /// Per-zone detail.
    pub zones: Vec<ZoneValidation>,
    /// Per-schematic detail.
    pub schematics: Vec<SchematicValidation>,
    /// Logistics detail, when the plan has logistics.
    pub logistics: Option<LogisticsValidation>,
    /// Castle detail, when the plan has castle automation.
    pub castle: Option<CastleValidation>,
    /// Cross-reference detail.
    pub cross_system: CrossSystemValidation,
    /// Per-zone gate verdicts.
    pub gates: Vec<ZoneGateCheck>,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Outcome of setting up one zone during a live run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneExecution {
    /// The zone.
    pub zone_id: ZoneId,
    /// Whether every setup step succeeded.
    pub success: bool,
    /// Steps applied, in order.
    pub steps: Vec<String>,
    /// The failing step, when `success` is false.
    pub error: Option<String>,
}

/// Outcome of one structure placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BuildExecution {
    /// Index in the build list.
    pub index: u32,
    /// Prefab placed.
    pub prefab: String,
    /// Whether placement succeeded.
    pub success: bool,
    /// Failure reason.
    pub error: Option<String>,
}

/// Outcome of the castle stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CastleExecution {
    /// Targeted castle.
    pub target_castle: String,
    /// Aggregate status.
    pub status: StageStatus,
    /// Summary message.
    pub message: String,
    /// Every placement attempted.
    pub builds: Vec<BuildExecution>,
}

impl CastleExecution {
    /// Number of failed placements.
    pub fn failed_count(&self) -> usize {
        self.builds.iter().filter(|b| !b.success).count()
    }
}

/// Outcome of one logistics operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OperationExecution {
    /// Operation kind.
    pub kind: LogisticsKind,
    /// Index within the kind's list.
    pub index: u32,
    /// Human-readable label.
    pub label: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// What happened, or why it failed.
    pub detail: String,
}

/// Outcome of the logistics stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LogisticsExecution {
    /// Aggregate status.
    pub status: StageStatus,
    /// Every operation attempted, in execution order.
    pub operations: Vec<OperationExecution>,
}

impl LogisticsExecution {
    /// Number of failed operations.
    pub fn failed_count(&self) -> usize {
        self.operations.iter().filter(|o| !o.success).count()
    }
}

/// Everything a live run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RunReport {
    /// Capability the gate granted.
    pub capability: Capability,
    /// Zones attempted, in declaration order.
    pub zones: Vec<ZoneExecution>,
    /// The zone that aborted the run.
    pub aborted_at: Option<ZoneId>,
    /// Castle stage, when reached and defined.
    pub castle: Option<CastleExecution>,
    /// Logistics stage, when reached and defined.
    pub logistics: Option<LogisticsExecution>,
}

/// Footprint of one zone in a visualization snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneFootprint {
    /// The zone.
    pub zone_id: ZoneId,
    /// Display name.
    pub name: String,
    /// Center, when located.
    pub center: Option<Position>,
    /// Radius, when located.
    pub radius: Option<f64>,
    /// Whether a boss would spawn.
    pub has_boss: bool,
    /// Creatures that would spawn.
    pub mob_count: u32,
}

/// Snapshot of what a dry run would produce, for rendering by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Visualization {
    /// Zone footprints.
    pub zones: Vec<ZoneFootprint>,
    /// Structures that would be placed.
    pub build_count: u32,
    /// Logistics operations that would run.
    pub logistics_count: u32,
}

/// Everything a dry run would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SimulationReport {
    /// Capability the gate granted.
    pub capability: Capability,
    /// "Would do" steps, in execution order.
    pub steps: Vec<String>,
    /// Rendering snapshot, when requested.
    pub visualization: Option<Visualization>,
}

/// Bosses spawned by a targeted respawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RespawnReport {
    /// Zones whose boss respawned.
    pub respawned: Vec<ZoneId>,
    /// Zones whose boss failed to respawn, with the reason.
    pub failed: Vec<String>,
}

/// Structured detail attached to an execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ExecutionData {
    /// A live run.
    Run(RunReport),
    /// A dry run.
    Simulation(SimulationReport),
    /// A deferred run was scheduled.
    Scheduled(ScheduledEvent),
    /// A targeted respawn.
    Respawn(RespawnReport),
}

/// What a gated closure returns, and what the gate hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AutomationResult {
    /// Whether the closure ran and succeeded.
    pub success: bool,
    /// Capability the call was made under.
    pub capability: Capability,
    /// Failure reason, including gate denials.
    pub error: Option<String>,
    /// Detail produced by the closure.
    pub data: Option<ExecutionData>,
}

impl AutomationResult {
    /// A successful result carrying `data`.
    pub const fn ok(capability: Capability, data: ExecutionData) -> Self {
        Self {
            success: true,
            capability,
            error: None,
            data: Some(data),
        }
    }

    /// A successful result with no detail attached.
    pub const fn completed(capability: Capability) -> Self {
        Self {
            success: true,
            capability,
            error: None,
            data: None,
        }
    }

    /// A failed result. `data` may carry partial detail.
    pub fn failed(
        capability: Capability,
        error: impl Into<String>,
        data: Option<ExecutionData>,
    ) -> Self {
        Self {
            success: false,
            capability,
            error: Some(error.into()),
            data,
        }
    }
}

/// Result of every public execution engine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExecutionResult {
    /// The plan operated on.
    pub plan_id: PlanId,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure reason.
    pub error: Option<String>,
    /// Summary message.
    pub message: String,
    /// Whether this was a dry run.
    pub is_test_run: bool,
    /// Validation report, for loads.
    pub validation_details: Option<ComprehensiveValidationResult>,
    /// Structured detail.
    pub execution_data: Option<ExecutionData>,
}

impl ExecutionResult {
    /// A successful result.
    pub fn succeeded(plan_id: PlanId, message: impl Into<String>) -> Self {
        Self {
            plan_id,
            success: true,
            error: None,
            message: message.into(),
            is_test_run: false,
            validation_details: None,
            execution_data: None,
        }
    }

    /// A failed result whose message repeats the error.
    pub fn failed(plan_id: PlanId, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            plan_id,
            success: false,
            message: error.clone(),
            error: Some(error),
            is_test_run: false,
            validation_details: None,
            execution_data: None,
        }
    }

    /// Attach a validation report.
    #[must_use]
    pub fn with_validation(mut self, report: ComprehensiveValidationResult) -> Self {
        self.validation_details = Some(report);
        self
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_data(mut self, data: ExecutionData) -> Self {
        self.execution_data = Some(data);
        self
    }

    /// Mark the result as a dry run.
    #[must_use]
    pub const fn as_test_run(mut self) -> Self {
        self.is_test_run = true;
        self
    }

    /// The run report, when this is the result of a live run.
    pub const fn run_report(&self) -> Option<&RunReport> {
        match &self.execution_data {
            Some(ExecutionData::Run(report)) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_results_repeat_the_error_as_message() {
        let result = ExecutionResult::failed(PlanId::new("p"), "Plan 'p' not found");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Plan 'p' not found"));
        assert_eq!(result.message, "Plan 'p' not found");
    }

    #[test]
    fn execution_data_is_tagged() {
        let data = ExecutionData::Respawn(RespawnReport::default());
        let json = serde_json::to_value(&data).unwrap_or_default();
        assert_eq!(json["kind"], "respawn");
    }

    #[test]
    fn castle_failed_count() {
        let stage = CastleExecution {
            target_castle: String::from("Keep"),
            status: StageStatus::PartiallyCompleted,
            message: String::new(),
            builds: vec![
                BuildExecution {
                    index: 0,
                    prefab: String::from("Wall"),
                    success: false,
                    error: Some(String::from("blocked")),
                },
                BuildExecution {
                    index: 1,
                    prefab: String::from("Door"),
                    success: true,
                    error: None,
                },
            ],
        };
        assert_eq!(stage.failed_count(), 1);
    }
}
