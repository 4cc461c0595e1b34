//! Shared type definitions for the `VAuto` plan lifecycle engine.
//!
//! Every crate in the workspace speaks these types: plan documents flow in
//! from authors, reports and results flow out to operators. Types flow
//! downstream to `TypeScript` via `ts-rs` for plan-authoring tools.
//!
//! # Modules
//!
//! - [`ids`] -- Plan, zone, schedule and caller identifiers
//! - [`enums`] -- Capabilities, combat states, stage and lifecycle enums
//! - [`plan`] -- The plan aggregate: zones, castle builds, logistics, respawn rules
//! - [`results`] -- Validation reports and execution results
//! - [`schedule`] -- Scheduled events, respawn schedules, execution log entries

pub mod enums;
pub mod ids;
pub mod plan;
pub mod results;
pub mod schedule;

// Re-export all public types at crate root for convenience.
pub use enums::{
    Capability, CombatState, LogisticsKind, PlanOperation, PlanPhase, ScheduledEventStatus,
    StageKind, StageStatus, VisualChannel, ZoneTransition,
};
pub use ids::{CallerId, LogEntryId, PlanId, PrefabGuid, RespawnScheduleId, ScheduledEventId, ZoneId};
pub use plan::{
    BalanceOp, Boss, BossRespawn, CastleAutomation, CastleBuild, CastleRecord, Chest, DropTable,
    GearItem, LiveState, LogisticsAutomation, LogisticsOperation, Loot, LootItem, Mob, OnEnter,
    OnExit, Permissions, Plan, Position, RefillOp, RepairOp, RespawnParseError, RespawnRules,
    RespawnTrigger, Schematic, TransferOp, TransitionEffects, UiEffects, Zone, ZoneEffects,
    ZoneEntry, ZoneLocation,
};
pub use results::{
    AutomationResult, BuildExecution, BuildValidation, CastleExecution, CastleValidation,
    ComprehensiveValidationResult, CrossSystemValidation, ExecutionData, ExecutionResult,
    GateResult, LogisticsExecution, LogisticsValidation, LootValidation, OperationExecution,
    OperationValidation, RespawnReport, RunReport, SchematicValidation, SimulationReport,
    Visualization, ZoneExecution, ZoneFootprint, ZoneGateCheck, ZoneValidation,
};
pub use schedule::{ExecutionLogEntry, RespawnCadence, RespawnSchedule, ScheduledEvent};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for plan-authoring tools.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::PlanId::export_all();
        let _ = crate::ids::ZoneId::export_all();
        let _ = crate::ids::CallerId::export_all();
        let _ = crate::ids::ScheduledEventId::export_all();
        let _ = crate::ids::RespawnScheduleId::export_all();

        // Enums
        let _ = crate::enums::Capability::export_all();
        let _ = crate::enums::CombatState::export_all();
        let _ = crate::enums::LogisticsKind::export_all();
        let _ = crate::enums::PlanPhase::export_all();
        let _ = crate::enums::StageStatus::export_all();

        // Plan documents
        let _ = crate::plan::Plan::export_all();

        // Results
        let _ = crate::results::ComprehensiveValidationResult::export_all();
        let _ = crate::results::ExecutionResult::export_all();

        // Scheduling
        let _ = crate::schedule::RespawnSchedule::export_all();
        let _ = crate::schedule::ExecutionLogEntry::export_all();
    }
}
