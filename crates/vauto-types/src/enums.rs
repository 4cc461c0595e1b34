//! Enumeration types shared across the plan lifecycle engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A named mutation-rights level requested from the gate per execution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Capability {
    /// Read-only inspection. No world mutation is permitted.
    ReadOnlyAnalytics,
    /// Produces advice only. No world mutation is permitted.
    AdvisoryOnly,
    /// Mutates the virtual combat world (zones, spawns, loot).
    PvPVirtualMutation,
    /// Sends messages to players.
    Broadcast,
    /// Writes to the automation log.
    Logging,
    /// Places structures inside a castle.
    CastleBuilding,
    /// Manages castle configuration.
    CastleManagement,
    /// Moves items between inventories.
    LogisticsTransfer,
    /// Tops up inventories to configured levels.
    LogisticsRefill,
    /// Repairs equipment.
    LogisticsRepair,
    /// Evens out stock between castles.
    LogisticsBalance,
}

impl Capability {
    /// Whether closures granted this capability may mutate world state.
    pub const fn is_mutating(self) -> bool {
        !matches!(
            self,
            Self::ReadOnlyAnalytics | Self::AdvisoryOnly | Self::Logging
        )
    }

    /// Capability for a plan execution given the plan's test-only flag.
    pub const fn for_plan(is_test_only: bool) -> Self {
        if is_test_only {
            Self::ReadOnlyAnalytics
        } else {
            Self::PvPVirtualMutation
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Live combat state
// ---------------------------------------------------------------------------

/// Combat lifecycle state of the world region a plan targets.
///
/// Refreshed from the live world before each execution. `Snapshot` and
/// `Restoring` are transitional states during which mutation is refused.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum CombatState {
    /// No combat session is running.
    #[default]
    Outside,
    /// A pre-combat snapshot is being captured.
    Snapshot,
    /// Combat is live.
    Active,
    /// Post-combat state is being restored.
    Restoring,
}

impl CombatState {
    /// Whether snapshot-guarded zones may be set up in this state.
    pub const fn allows_snapshot_zones(self) -> bool {
        matches!(self, Self::Outside | Self::Active)
    }

    /// Whether the state is a transition during which mutation is refused.
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Snapshot | Self::Restoring)
    }
}

// ---------------------------------------------------------------------------
// Logistics
// ---------------------------------------------------------------------------

/// The four kinds of logistics operation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum LogisticsKind {
    /// Move items from one location to another.
    Transfer,
    /// Keep an item between a minimum and maximum level.
    Refill,
    /// Repair a piece of equipment.
    Repair,
    /// Even out an item between two castles.
    Balance,
}

impl LogisticsKind {
    /// Capability the gate grants for this kind of operation.
    pub const fn capability(self) -> Capability {
        match self {
            Self::Transfer => Capability::LogisticsTransfer,
            Self::Refill => Capability::LogisticsRefill,
            Self::Repair => Capability::LogisticsRepair,
            Self::Balance => Capability::LogisticsBalance,
        }
    }
}

impl core::fmt::Display for LogisticsKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Plan lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a loaded plan.
///
/// A plan that is not in the registry is implicitly unloaded.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum PlanPhase {
    /// Validated and stored, idle.
    #[default]
    Loaded,
    /// A dry run is in progress.
    Testing,
    /// A live run is in progress.
    Running,
}

/// Public operation recorded in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PlanOperation {
    /// A plan was loaded.
    Load,
    /// A plan was removed from the registry.
    Unload,
    /// A dry run.
    Test,
    /// A live run.
    Run,
    /// A deferred run was scheduled.
    Schedule,
    /// A targeted boss respawn.
    Respawn,
}

/// One of the three ordered phases of a live run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StageKind {
    /// Zone setup (fail-fast).
    Zones,
    /// Castle structure placement (best-effort).
    Castle,
    /// Logistics operations (best-effort).
    Logistics,
}

/// Outcome of a best-effort stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StageStatus {
    /// Every item succeeded.
    Completed,
    /// At least one item failed and at least one succeeded.
    PartiallyCompleted,
    /// Every item failed, or the stage itself failed.
    Failed,
}

impl StageStatus {
    /// Derive the stage status from success and failure counts.
    pub const fn from_counts(succeeded: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Completed
        } else if succeeded == 0 {
            Self::Failed
        } else {
            Self::PartiallyCompleted
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Status of a one-shot scheduled event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub enum ScheduledEventStatus {
    /// Waiting for its execution time.
    #[default]
    Scheduled,
    /// Fired; the run outcome is in the execution log.
    Fired,
    /// Cancelled before firing.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Visual channel an effect name is applied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VisualChannel {
    /// Screen-space UI effect.
    Ui,
    /// Character glow.
    Glow,
    /// Map overlay.
    Map,
}

/// Direction a player crosses a zone boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ZoneTransition {
    /// Entering the zone.
    Enter,
    /// Leaving the zone.
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_capabilities_do_not_mutate() {
        assert!(!Capability::ReadOnlyAnalytics.is_mutating());
        assert!(!Capability::AdvisoryOnly.is_mutating());
        assert!(Capability::PvPVirtualMutation.is_mutating());
        assert!(Capability::LogisticsBalance.is_mutating());
    }

    #[test]
    fn test_only_plans_get_read_only_capability() {
        assert_eq!(Capability::for_plan(true), Capability::ReadOnlyAnalytics);
        assert_eq!(Capability::for_plan(false), Capability::PvPVirtualMutation);
    }

    #[test]
    fn stage_status_from_counts() {
        assert_eq!(StageStatus::from_counts(3, 0), StageStatus::Completed);
        assert_eq!(StageStatus::from_counts(0, 0), StageStatus::Completed);
        assert_eq!(StageStatus::from_counts(1, 1), StageStatus::PartiallyCompleted);
        assert_eq!(StageStatus::from_counts(0, 2), StageStatus::Failed);
    }

    #[test]
    fn combat_state_guards() {
        assert!(CombatState::Outside.allows_snapshot_zones());
        assert!(CombatState::Active.allows_snapshot_zones());
        assert!(!CombatState::Snapshot.allows_snapshot_zones());
        assert!(CombatState::Restoring.is_transitional());
    }
}
