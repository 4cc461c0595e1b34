//! Castle structure placement.
//!
//! Builds are best-effort: a failing placement is recorded and the next
//! one is attempted. The stage acquires [`Capability::CastleBuilding`] from
//! the gate once before placing anything.

use std::sync::Arc;

use tracing::{info, warn};
use vauto_types::{
    AutomationResult, BuildExecution, CastleAutomation, CastleBuild, CastleExecution, Capability,
    StageStatus,
};
use vauto_world::{PrefabCategory, PrefabResolver, StructureSink, WorldError};

use crate::gate::{Gate, GateContext};

/// Places a plan's castle structures.
pub struct CastleExecutor {
    gate: Arc<dyn Gate>,
    resolver: Arc<dyn PrefabResolver>,
    structures: Arc<dyn StructureSink>,
}

impl CastleExecutor {
    /// Create an executor.
    pub fn new(
        gate: Arc<dyn Gate>,
        resolver: Arc<dyn PrefabResolver>,
        structures: Arc<dyn StructureSink>,
    ) -> Self {
        Self {
            gate,
            resolver,
            structures,
        }
    }

    /// The placements a run would make.
    pub fn simulate(&self, castle: &CastleAutomation) -> Vec<String> {
        castle
            .build
            .iter()
            .map(|build| {
                format!(
                    "Would place {} at ({}, {}, {}) in {}",
                    build.prefab,
                    build.position.x,
                    build.position.y,
                    build.position.z,
                    castle.target_castle
                )
            })
            .collect()
    }

    /// Place every structure, continuing past failures.
    ///
    /// `granted` is the capability of the enclosing run. A read-only run
    /// records every placement as simulated.
    pub fn execute(
        &self,
        context: &GateContext,
        granted: Capability,
        castle: &CastleAutomation,
    ) -> CastleExecution {
        let target = castle.target_castle.clone();

        if !granted.is_mutating() {
            let builds = castle
                .build
                .iter()
                .enumerate()
                .map(|(index, build)| record(index, build, Ok(())))
                .collect();
            return CastleExecution {
                target_castle: target,
                status: StageStatus::Completed,
                message: format!("Castle automation simulated for {}", castle.target_castle),
                builds,
            };
        }

        let mut builds = Vec::with_capacity(castle.build.len());
        let result = self
            .gate
            .execute(context, Capability::CastleBuilding, &mut |capability| {
                builds = castle
                    .build
                    .iter()
                    .enumerate()
                    .map(|(index, build)| record(index, build, self.place(&target, build)))
                    .collect();
                AutomationResult::completed(capability)
            });

        if !result.success {
            let reason = result.error.unwrap_or_default();
            warn!(castle = %target, reason = %reason, "Castle automation denied");
            return CastleExecution {
                target_castle: target,
                status: StageStatus::Failed,
                message: format!("Castle automation denied: {reason}"),
                builds,
            };
        }

        let failed = builds.iter().filter(|b| !b.success).count();
        let succeeded = builds.len().saturating_sub(failed);
        let status = StageStatus::from_counts(succeeded, failed);
        let message = match status {
            StageStatus::Completed => {
                format!("Castle automation completed with {succeeded} structures placed")
            }
            StageStatus::PartiallyCompleted => {
                format!("Castle automation partially completed with {failed} failed builds")
            }
            StageStatus::Failed => format!("Castle automation failed with {failed} failed builds"),
        };
        info!(castle = %target, succeeded, failed, ?status, "Castle automation finished");

        CastleExecution {
            target_castle: target,
            status,
            message,
            builds,
        }
    }

    fn place(&self, castle: &str, build: &CastleBuild) -> Result<(), WorldError> {
        let prefab = self
            .resolver
            .resolve(PrefabCategory::Structure, &build.prefab)
            .ok_or_else(|| WorldError::UnknownPrefab(build.prefab.clone()))?;
        self.structures
            .place_structure(castle, prefab, build.position, build.rotation)
    }
}

impl std::fmt::Debug for CastleExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastleExecutor").finish_non_exhaustive()
    }
}

fn record(index: usize, build: &CastleBuild, outcome: Result<(), WorldError>) -> BuildExecution {
    BuildExecution {
        index: u32::try_from(index).unwrap_or(u32::MAX),
        prefab: build.prefab.clone(),
        success: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use vauto_types::{CallerId, Plan, Position};
    use vauto_world::{InMemoryWorld, default_catalog};

    use super::*;
    use crate::gate::PolicyGate;

    fn make_executor(world: &Arc<InMemoryWorld>, gate: PolicyGate) -> CastleExecutor {
        CastleExecutor::new(
            Arc::new(gate),
            Arc::new(default_catalog().unwrap()),
            Arc::clone(world) as Arc<dyn StructureSink>,
        )
    }

    fn make_build(prefab: &str, x: f64) -> CastleBuild {
        CastleBuild {
            prefab: prefab.to_owned(),
            position: Position::new(x, 0.0, 0.0),
            rotation: 0.0,
        }
    }

    fn make_context() -> GateContext {
        GateContext::for_plan(&Plan::new("p"), CallerId(1))
    }

    #[test]
    fn failures_do_not_stop_later_builds() {
        let world = Arc::new(InMemoryWorld::new());
        let executor = make_executor(&world, PolicyGate::new());
        let castle = CastleAutomation {
            target_castle: String::from("Keep"),
            build: vec![make_build("Drawbridge", 0.0), make_build("Castle Wall", 5.0)],
        };

        let stage = executor.execute(&make_context(), Capability::PvPVirtualMutation, &castle);
        assert_eq!(stage.status, StageStatus::PartiallyCompleted);
        assert_eq!(stage.builds.len(), 2);
        assert!(!stage.builds[0].success);
        assert!(stage.builds[1].success);
        assert_eq!(
            stage.message,
            "Castle automation partially completed with 1 failed builds"
        );
        assert_eq!(world.structure_count(), 1);
    }

    #[test]
    fn occupied_positions_fail_individually() {
        let world = Arc::new(InMemoryWorld::new());
        let executor = make_executor(&world, PolicyGate::new());
        let castle = CastleAutomation {
            target_castle: String::from("Keep"),
            build: vec![make_build("Workbench", 1.0), make_build("Furnace", 1.2)],
        };
        let stage = executor.execute(&make_context(), Capability::PvPVirtualMutation, &castle);
        assert_eq!(stage.failed_count(), 1);
        assert!(stage.builds[1].error.as_deref().unwrap().contains("occupied"));
    }

    #[test]
    fn read_only_runs_place_nothing() {
        let world = Arc::new(InMemoryWorld::new());
        let executor = make_executor(&world, PolicyGate::new());
        let castle = CastleAutomation {
            target_castle: String::from("Keep"),
            build: vec![make_build("Workbench", 1.0)],
        };
        let stage = executor.execute(&make_context(), Capability::ReadOnlyAnalytics, &castle);
        assert_eq!(stage.status, StageStatus::Completed);
        assert_eq!(world.structure_count(), 0);
        assert_eq!(executor.simulate(&castle).len(), 1);
    }

    #[test]
    fn strict_gate_denies_non_admin_builds() {
        let world = Arc::new(InMemoryWorld::new());
        let executor = make_executor(&world, PolicyGate::strict());
        let castle = CastleAutomation {
            target_castle: String::from("Keep"),
            build: vec![make_build("Workbench", 1.0)],
        };
        let stage = executor.execute(&make_context(), Capability::PvPVirtualMutation, &castle);
        assert_eq!(stage.status, StageStatus::Failed);
        assert!(stage.builds.is_empty());
        assert_eq!(world.structure_count(), 0);
    }
}
