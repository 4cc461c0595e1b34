//! Zone management scoped to one plan.
//!
//! CRUD operations edit the plan's zone list; they validate and gate-check
//! before committing, so a zone that would make its plan invalid is never
//! stored. Enter and exit apply a zone's effect bundle to one player
//! through the gate. Setup (used by live runs) registers a zone and spawns
//! its content, stopping at the first failing step.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use vauto_types::{
    AutomationResult, CallerId, Capability, OnEnter, OnExit, Plan, PlanId, Schematic,
    VisualChannel, Zone, ZoneExecution, ZoneId, ZoneTransition,
};
use vauto_world::{EffectSink, LootEntry, PrefabCategory, PrefabResolver, SpawnSink, WorldError};

use crate::gate::{Gate, GateContext};
use crate::validation::ValidationEngine;

/// Errors returned by zone operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZoneError {
    /// The plan is not loaded.
    #[error("Plan '{0}' not found")]
    PlanNotFound(PlanId),

    /// No zone with the id exists in the plan.
    #[error("Zone {0} not found")]
    NotFound(ZoneId),

    /// A zone with the id already exists in the plan.
    #[error("Zone {0} already exists")]
    Duplicate(ZoneId),

    /// The zone failed validation.
    #[error("Zone {zone} is invalid: {}", .messages.join("; "))]
    Invalid {
        /// The zone.
        zone: ZoneId,
        /// Validation messages.
        messages: Vec<String>,
    },

    /// The gate refused the zone or the operation.
    #[error("Zone {zone} denied: {}", .messages.join("; "))]
    Denied {
        /// The zone.
        zone: ZoneId,
        /// Gate messages.
        messages: Vec<String>,
    },

    /// A castle record points at the zone.
    #[error("Cannot delete zone {0} - it is referenced by castles")]
    Referenced(String),
}

/// Zones of a plan with a summary line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneListing {
    /// `"No zones found"` or `"{n} zones found"`.
    pub message: String,
    /// The zones, in declaration order.
    pub zones: Vec<Zone>,
}

/// What an enter or exit applied.
///
/// A failing effect is recorded in `failed` and does not stop the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    /// The zone crossed.
    pub zone_id: ZoneId,
    /// The player.
    pub player: CallerId,
    /// Effects applied, or that would apply under a read-only capability.
    pub applied: Vec<String>,
    /// Effects that failed, with the reason.
    pub failed: Vec<String>,
}

impl TransitionReport {
    /// Whether every effect applied.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Zone CRUD, player transitions and live setup.
pub struct ZoneManager {
    validator: ValidationEngine,
    gate: Arc<dyn Gate>,
    resolver: Arc<dyn PrefabResolver>,
    effects: Arc<dyn EffectSink>,
    spawns: Arc<dyn SpawnSink>,
}

impl ZoneManager {
    /// Create a manager.
    pub fn new(
        validator: ValidationEngine,
        gate: Arc<dyn Gate>,
        resolver: Arc<dyn PrefabResolver>,
        effects: Arc<dyn EffectSink>,
        spawns: Arc<dyn SpawnSink>,
    ) -> Self {
        Self {
            validator,
            gate,
            resolver,
            effects,
            spawns,
        }
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Validate, gate-check and append a new zone.
    pub fn create(&self, plan: &mut Plan, zone: Zone) -> Result<(), ZoneError> {
        if plan.zone(zone.zone_id.as_str()).is_some() {
            return Err(ZoneError::Duplicate(zone.zone_id));
        }
        self.admit(plan, &zone, None)?;
        info!(plan_id = %plan.plan_id, zone_id = %zone.zone_id, "Zone created");
        plan.zones.push(zone);
        Ok(())
    }

    /// Replace the zone stored under `zone_id`.
    ///
    /// The replacement may carry a new id as long as no other zone uses it
    /// and no castle record references the old one.
    pub fn update(&self, plan: &mut Plan, zone_id: &str, zone: Zone) -> Result<(), ZoneError> {
        let position = plan
            .zones
            .iter()
            .position(|z| z.zone_id.as_str() == zone_id)
            .ok_or_else(|| ZoneError::NotFound(ZoneId::from(zone_id)))?;
        if zone.zone_id.as_str() != zone_id {
            if plan.zone(zone.zone_id.as_str()).is_some() {
                return Err(ZoneError::Duplicate(zone.zone_id));
            }
            if referenced_by_castles(plan, zone_id) {
                warn!(plan_id = %plan.plan_id, zone_id, "Zone rename refused, referenced by castles");
                return Err(ZoneError::Referenced(referenced_name(plan, position, zone_id)));
            }
        }
        self.admit(plan, &zone, Some(position))?;
        info!(plan_id = %plan.plan_id, zone_id, "Zone updated");
        if let Some(slot) = plan.zones.get_mut(position) {
            *slot = zone;
        }
        Ok(())
    }

    /// Remove a zone unless a castle record references it.
    pub fn delete(&self, plan: &mut Plan, zone_id: &str) -> Result<Zone, ZoneError> {
        let position = plan
            .zones
            .iter()
            .position(|z| z.zone_id.as_str() == zone_id)
            .ok_or_else(|| ZoneError::NotFound(ZoneId::from(zone_id)))?;
        if referenced_by_castles(plan, zone_id) {
            warn!(plan_id = %plan.plan_id, zone_id, "Zone delete refused, referenced by castles");
            return Err(ZoneError::Referenced(referenced_name(plan, position, zone_id)));
        }
        info!(plan_id = %plan.plan_id, zone_id, "Zone deleted");
        Ok(plan.zones.remove(position))
    }

    /// Look up a zone.
    pub fn get<'a>(&self, plan: &'a Plan, zone_id: &str) -> Result<&'a Zone, ZoneError> {
        plan.zone(zone_id)
            .ok_or_else(|| ZoneError::NotFound(ZoneId::from(zone_id)))
    }

    /// Every zone with a summary message.
    pub fn list(&self, plan: &Plan) -> ZoneListing {
        let message = if plan.zones.is_empty() {
            String::from("No zones found")
        } else {
            format!("{} zones found", plan.zones.len())
        };
        ZoneListing {
            message,
            zones: plan.zones.clone(),
        }
    }

    /// Point a zone at a saved layout and enable it.
    pub fn save_schematic(
        &self,
        plan: &mut Plan,
        zone_id: &str,
        schematic_id: &str,
    ) -> Result<(), ZoneError> {
        let zone = plan
            .zones
            .iter_mut()
            .find(|z| z.zone_id.as_str() == zone_id)
            .ok_or_else(|| ZoneError::NotFound(ZoneId::from(zone_id)))?;
        if schematic_id.trim().is_empty() {
            return Err(ZoneError::Invalid {
                zone: zone.zone_id.clone(),
                messages: vec![String::from("Schematic id cannot be empty")],
            });
        }
        let schematic = zone.schematic.get_or_insert_with(Schematic::default);
        schematic.schematic_id = schematic_id.trim().to_owned();
        schematic.enabled = true;
        info!(zone_id, schematic_id, "Zone schematic saved");
        Ok(())
    }

    /// Check a zone about to replace the one at `slot`, or be appended.
    ///
    /// Besides the zone's own checks, the plan as it would be after the edit
    /// must still pass the schematic and cross-system checks, so an edit can
    /// never leave behind a plan that `load` would refuse.
    fn admit(&self, plan: &Plan, zone: &Zone, slot: Option<usize>) -> Result<(), ZoneError> {
        let invalid = |messages: Vec<String>| ZoneError::Invalid {
            zone: zone.zone_id.clone(),
            messages,
        };

        let report = self.validator.validate_zone(zone);
        if !report.is_valid {
            return Err(invalid(report.messages));
        }
        if let Some(schematic) = self
            .validator
            .validate_schematic(zone)
            .filter(|s| !s.is_valid)
        {
            return Err(invalid(schematic.messages));
        }

        let mut candidate = plan.clone();
        candidate.zones = plan
            .zones
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != slot)
            .map(|(_, z)| z.clone())
            .chain(std::iter::once(zone.clone()))
            .collect();
        let cross = self.validator.validate_cross_system(&candidate);
        if !cross.is_valid {
            return Err(invalid(cross.messages));
        }

        let gate = self.gate.check_zone_gates(zone, plan);
        if !gate.passed {
            return Err(ZoneError::Denied {
                zone: zone.zone_id.clone(),
                messages: gate.messages,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Player transitions
    // -----------------------------------------------------------------------

    /// Apply a zone's entry bundle to a player.
    pub fn enter(
        &self,
        plan: &Plan,
        zone_id: &str,
        player: CallerId,
    ) -> Result<TransitionReport, ZoneError> {
        self.transition(plan, zone_id, player, ZoneTransition::Enter)
    }

    /// Apply a zone's exit bundle to a player.
    pub fn exit(
        &self,
        plan: &Plan,
        zone_id: &str,
        player: CallerId,
    ) -> Result<TransitionReport, ZoneError> {
        self.transition(plan, zone_id, player, ZoneTransition::Exit)
    }

    fn transition(
        &self,
        plan: &Plan,
        zone_id: &str,
        player: CallerId,
        direction: ZoneTransition,
    ) -> Result<TransitionReport, ZoneError> {
        let zone = self.get(plan, zone_id)?;
        let context = GateContext::for_plan(plan, player);
        let capability = Capability::for_plan(plan.is_test_only);
        let mut report = TransitionReport {
            zone_id: zone.zone_id.clone(),
            player,
            ..TransitionReport::default()
        };

        let result = self.gate.execute(&context, capability, &mut |granted| {
            let mut effects = EffectRun {
                manager: self,
                zone,
                player,
                live: granted.is_mutating(),
                report: &mut report,
            };
            match direction {
                ZoneTransition::Enter => effects.enter(),
                ZoneTransition::Exit => effects.exit(),
            }
            AutomationResult::completed(granted)
        });

        if !result.success {
            return Err(ZoneError::Denied {
                zone: zone.zone_id.clone(),
                messages: result.error.into_iter().collect(),
            });
        }
        debug!(
            zone_id,
            %player,
            ?direction,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "Zone transition applied"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Live setup
    // -----------------------------------------------------------------------

    /// Set a zone up for a run: register it, then spawn mobs, boss, chests
    /// and drop tables. Stops at the first failing step.
    ///
    /// Under a read-only capability the steps are described, not applied.
    pub fn setup(&self, plan: &Plan, zone: &Zone, capability: Capability) -> ZoneExecution {
        let mut execution = ZoneExecution {
            zone_id: zone.zone_id.clone(),
            success: true,
            ..ZoneExecution::default()
        };

        if !zone.enabled {
            execution
                .steps
                .push(format!("Zone {} is disabled, skipped", zone.display_name()));
            return execution;
        }

        if !capability.is_mutating() {
            execution.steps = self.simulate(zone);
            return execution;
        }

        if let Err(error) = self.apply_setup(plan, zone, &mut execution.steps) {
            warn!(zone_id = %zone.zone_id, error = %error, "Zone setup failed");
            execution.success = false;
            execution.error = Some(format!("Zone {}: {error}", zone.display_name()));
        }
        execution
    }

    fn apply_setup(&self, plan: &Plan, zone: &Zone, steps: &mut Vec<String>) -> Result<(), WorldError> {
        let id = &zone.zone_id;
        self.spawns
            .register_zone(&plan.plan_id, id, zone.location.as_ref())?;
        steps.push(format!("Registered zone {}", zone.display_name()));

        for mob in &zone.mobs {
            let creature = self.resolve(PrefabCategory::Creature, &mob.mob_name)?;
            let count = positive(mob.count, &mob.mob_name)?;
            self.spawns.spawn_mobs(id, creature, count)?;
            steps.push(format!("Spawned {count} {}", mob.mob_name));
        }

        if zone.boss.is_some() {
            steps.push(self.spawn_boss(zone)?);
        }

        if let Some(loot) = &zone.loot {
            for chest in &loot.chests {
                let Some(at) = chest.position else {
                    return Err(WorldError::Rejected(String::from("chest has no position")));
                };
                let entries = self.loot_entries(&chest.loot_table)?;
                self.spawns.place_chest(id, at, &entries)?;
                steps.push(format!("Placed chest at ({}, {}, {})", at.x, at.y, at.z));
            }
            for table in &loot.drop_tables {
                let entries = self.loot_entries(&table.items)?;
                self.spawns
                    .register_drop_table(id, &table.table_name, &entries)?;
                steps.push(format!("Registered drop table {}", table.table_name));
            }
        }
        Ok(())
    }

    /// The steps a setup would apply, without applying them.
    pub fn simulate(&self, zone: &Zone) -> Vec<String> {
        let mut steps = vec![format!("Would register zone {}", zone.display_name())];
        for mob in &zone.mobs {
            steps.push(format!("Would spawn {} {}", mob.count, mob.mob_name));
        }
        if let Some(boss) = &zone.boss {
            steps.push(format!(
                "Would spawn boss {} (level {})",
                boss.boss_name, boss.boss_level
            ));
        }
        if let Some(loot) = &zone.loot {
            if !loot.chests.is_empty() {
                steps.push(format!("Would place {} chests", loot.chests.len()));
            }
            for table in &loot.drop_tables {
                steps.push(format!("Would register drop table {}", table.table_name));
            }
        }
        steps
    }

    /// Spawn a zone's boss. Returns the step description.
    pub fn spawn_boss(&self, zone: &Zone) -> Result<String, WorldError> {
        let Some(boss) = &zone.boss else {
            return Err(WorldError::Rejected(format!(
                "zone {} has no boss",
                zone.display_name()
            )));
        };
        let creature = self.resolve(PrefabCategory::Creature, &boss.boss_name)?;
        let level = positive(boss.boss_level, &boss.boss_name)?;
        self.spawns.spawn_boss(&zone.zone_id, creature, level)?;
        Ok(format!("Spawned boss {} (level {level})", boss.boss_name))
    }

    fn resolve(
        &self,
        category: PrefabCategory,
        name: &str,
    ) -> Result<vauto_types::PrefabGuid, WorldError> {
        self.resolver
            .resolve(category, name)
            .ok_or_else(|| WorldError::UnknownPrefab(name.to_owned()))
    }

    fn loot_entries(&self, items: &[vauto_types::LootItem]) -> Result<Vec<LootEntry>, WorldError> {
        items
            .iter()
            .map(|item| {
                Ok(LootEntry {
                    item: self.resolve(PrefabCategory::Item, &item.item_name)?,
                    count: positive(item.count, &item.item_name)?,
                    chance: item.chance,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ZoneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneManager").finish_non_exhaustive()
    }
}

fn positive(value: i32, what: &str) -> Result<u32, WorldError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| WorldError::Rejected(format!("{what} needs a positive count, got {value}")))
}

/// One enter or exit in progress.
struct EffectRun<'a> {
    manager: &'a ZoneManager,
    zone: &'a Zone,
    player: CallerId,
    live: bool,
    report: &'a mut TransitionReport,
}

impl EffectRun<'_> {
    fn enter(&mut self) {
        let zone = self.zone;
        if let Some(on_enter) = zone.entry.as_ref().and_then(|e| e.on_enter.as_ref()) {
            self.enter_bundle(on_enter);
        }
        if let Some(effects) = &zone.effects {
            if let Some(ui) = &effects.ui {
                self.visual(VisualChannel::Ui, &ui.enter_effect);
                if !ui.hud_message.trim().is_empty() {
                    let text = ui.hud_message.clone();
                    self.apply(format!("HUD message '{text}'"), |m, p| {
                        m.effects.send_message(p, &text)
                    });
                }
            }
            if let Some(glow) = &effects.glow {
                self.visual(VisualChannel::Glow, &glow.enter_effect);
            }
            if let Some(map) = &effects.map {
                self.visual(VisualChannel::Map, &map.enter_effect);
            }
        }
    }

    fn enter_bundle(&mut self, on_enter: &OnEnter) {
        if on_enter.give_gear {
            for gear in &on_enter.gear_list {
                let name = gear.item_name.clone();
                let count = gear.count;
                self.apply(format!("Grant {count} {name}"), |m, p| {
                    let item = m.resolve(PrefabCategory::Item, &name)?;
                    m.effects.grant_gear(p, item, positive(count, &name)?)
                });
            }
        }
        if on_enter.override_blood {
            let blood = on_enter.blood_type.clone();
            self.apply(format!("Override blood to {blood}"), |m, p| {
                let guid = m.resolve(PrefabCategory::BloodType, &blood)?;
                m.effects.override_blood(p, guid)
            });
        }
        self.visual(VisualChannel::Ui, &on_enter.ui_effect);
        self.visual(VisualChannel::Glow, &on_enter.glow_effect);
        self.visual(VisualChannel::Map, &on_enter.map_effect);
        self.message(&on_enter.message);

        let zone = self.zone;
        if on_enter.spawn_mobs {
            for mob in &zone.mobs {
                let zone_id = zone.zone_id.clone();
                let name = mob.mob_name.clone();
                let count = mob.count;
                self.apply(format!("Spawn {count} {name}"), |m, _| {
                    let creature = m.resolve(PrefabCategory::Creature, &name)?;
                    m.spawns
                        .spawn_mobs(&zone_id, creature, positive(count, &name)?)
                });
            }
        }
        if on_enter.spawn_boss && zone.boss.is_some() {
            self.apply(String::from("Spawn boss"), |m, _| {
                m.spawn_boss(zone).map(|_| ())
            });
        }
    }

    fn exit(&mut self) {
        let zone = self.zone;
        if let Some(on_exit) = zone.entry.as_ref().and_then(|e| e.on_exit.as_ref()) {
            self.exit_bundle(on_exit);
        }
        if let Some(effects) = &zone.effects {
            if let Some(ui) = &effects.ui {
                self.visual(VisualChannel::Ui, &ui.exit_effect);
            }
            if let Some(glow) = &effects.glow {
                self.visual(VisualChannel::Glow, &glow.exit_effect);
            }
            if let Some(map) = &effects.map {
                self.visual(VisualChannel::Map, &map.exit_effect);
            }
        }
    }

    fn exit_bundle(&mut self, on_exit: &OnExit) {
        if on_exit.remove_gear {
            let zone_id = self.zone.zone_id.clone();
            self.apply(String::from("Remove zone gear"), |m, p| {
                m.effects.remove_zone_gear(p, &zone_id)
            });
        }
        if on_exit.restore_blood {
            self.apply(String::from("Restore blood"), |m, p| m.effects.restore_blood(p));
        }
        self.visual(VisualChannel::Ui, &on_exit.ui_effect);
        self.visual(VisualChannel::Glow, &on_exit.glow_effect);
        self.visual(VisualChannel::Map, &on_exit.map_effect);
        self.message(&on_exit.message);
    }

    fn visual(&mut self, channel: VisualChannel, effect: &str) {
        if effect.trim().is_empty() {
            return;
        }
        let effect = effect.to_owned();
        self.apply(format!("{channel:?} effect {effect}"), |m, p| {
            m.effects.apply_visual(p, channel, &effect)
        });
    }

    fn message(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let text = text.to_owned();
        self.apply(format!("Message '{text}'"), |m, p| m.effects.send_message(p, &text));
    }

    fn apply<F>(&mut self, step: String, effect: F)
    where
        F: FnOnce(&ZoneManager, CallerId) -> Result<(), WorldError>,
    {
        if !self.live {
            self.report.applied.push(format!("Would {}", lowercase_first(&step)));
            return;
        }
        match effect(self.manager, self.player) {
            Ok(()) => self.report.applied.push(step),
            Err(e) => self.report.failed.push(format!("{step}: {e}")),
        }
    }
}

fn lowercase_first(step: &str) -> String {
    let mut chars = step.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

fn referenced_by_castles(plan: &Plan, zone_id: &str) -> bool {
    plan.castles
        .iter()
        .any(|c| c.zone_id.as_ref().is_some_and(|id| id.as_str() == zone_id))
}

fn referenced_name(plan: &Plan, position: usize, zone_id: &str) -> String {
    plan.zones
        .get(position)
        .map_or(zone_id, Zone::display_name)
        .to_owned()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use vauto_types::{
        Boss, BossRespawn, CastleRecord, GearItem, LogisticsAutomation, Mob, Permissions,
        TransferOp, ZoneEntry,
    };
    use vauto_world::{InMemoryWorld, WorldEvent, default_catalog};

    use super::*;
    use crate::config::ValidationConfig;
    use crate::gate::PolicyGate;

    fn make_manager(world: &Arc<InMemoryWorld>) -> ZoneManager {
        let resolver: Arc<dyn PrefabResolver> = Arc::new(default_catalog().unwrap());
        let gate: Arc<dyn Gate> = Arc::new(PolicyGate::new());
        let validator =
            ValidationEngine::new(Arc::clone(&resolver), Arc::clone(&gate), ValidationConfig::default());
        ZoneManager::new(
            validator,
            gate,
            resolver,
            Arc::clone(world) as Arc<dyn EffectSink>,
            Arc::clone(world) as Arc<dyn SpawnSink>,
        )
    }

    fn make_zone(id: &str) -> Zone {
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
    fn create_rejects_duplicates_and_invalid_zones() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");

        manager.create(&mut plan, make_zone("z1")).unwrap();
        assert_eq!(
            manager.create(&mut plan, make_zone("z1")),
            Err(ZoneError::Duplicate(ZoneId::from("z1")))
        );

        let mut bad = make_zone("z2");
        if let Some(boss) = bad.boss.as_mut() {
            boss.boss_level = 0;
        }
        assert!(matches!(
            manager.create(&mut plan, bad),
            Err(ZoneError::Invalid { .. })
        ));
        assert_eq!(plan.zones.len(), 1);
    }

    #[test]
    fn create_respects_zone_gates() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        let mut zone = make_zone("z1");
        zone.permissions = Permissions {
            requires_admin: true,
            ..Permissions::default()
        };
        assert!(matches!(
            manager.create(&mut plan, zone),
            Err(ZoneError::Denied { .. })
        ));
        assert!(plan.zones.is_empty());
    }

    #[test]
    fn update_handles_missing_and_renamed_zones() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        manager.create(&mut plan, make_zone("a")).unwrap();
        manager.create(&mut plan, make_zone("b")).unwrap();

        assert_eq!(
            manager.update(&mut plan, "missing", make_zone("missing")),
            Err(ZoneError::NotFound(ZoneId::from("missing")))
        );
        assert_eq!(
            manager.update(&mut plan, "a", make_zone("b")),
            Err(ZoneError::Duplicate(ZoneId::from("b")))
        );
        manager.update(&mut plan, "a", make_zone("c")).unwrap();
        assert!(plan.zone("c").is_some());
        assert!(plan.zone("a").is_none());
    }

    #[test]
    fn delete_refuses_zones_referenced_by_castles() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        let mut zone = make_zone("z1");
        zone.name = String::from("Arena");
        manager.create(&mut plan, zone).unwrap();
        plan.castles.push(CastleRecord {
            name: String::from("Keep"),
            zone_id: Some(ZoneId::from("z1")),
        });

        let error = manager.delete(&mut plan, "z1").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Cannot delete zone Arena - it is referenced by castles"
        );
        assert_eq!(plan.zones.len(), 1);

        plan.castles.clear();
        manager.delete(&mut plan, "z1").unwrap();
        assert!(plan.zones.is_empty());
    }

    #[test]
    fn update_refuses_renaming_zones_referenced_by_castles() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        let mut zone = make_zone("yard");
        zone.name = String::from("Yard");
        manager.create(&mut plan, zone).unwrap();
        plan.castles.push(CastleRecord {
            name: String::from("Keep"),
            zone_id: Some(ZoneId::from("yard")),
        });

        assert_eq!(
            manager.update(&mut plan, "yard", make_zone("elsewhere")),
            Err(ZoneError::Referenced(String::from("Yard")))
        );
        assert!(plan.zone("yard").is_some());
        assert!(plan.zone("elsewhere").is_none());

        // Same id edits stay allowed.
        let mut edited = make_zone("yard");
        edited.name = String::from("Courtyard");
        manager.update(&mut plan, "yard", edited).unwrap();
        assert_eq!(plan.zone("yard").unwrap().name, "Courtyard");
    }

    #[test]
    fn edits_that_break_the_schematic_are_refused() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        let mut zone = make_zone("a");
        zone.schematic = Some(Schematic {
            enabled: true,
            ..Schematic::default()
        });
        assert!(matches!(
            manager.create(&mut plan, zone.clone()),
            Err(ZoneError::Invalid { .. })
        ));
        assert!(plan.zones.is_empty());

        manager.create(&mut plan, make_zone("a")).unwrap();
        assert!(matches!(
            manager.update(&mut plan, "a", zone),
            Err(ZoneError::Invalid { .. })
        ));
        assert!(plan.zone("a").unwrap().schematic.is_none());
    }

    #[test]
    fn renames_that_strand_logistics_locations_are_refused() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        manager.create(&mut plan, make_zone("north")).unwrap();
        manager.create(&mut plan, make_zone("south")).unwrap();
        plan.logistics_automation = Some(LogisticsAutomation {
            transfer: vec![TransferOp {
                from: String::from("north"),
                to: String::from("south"),
                item: String::from("Wood"),
                amount: 10,
            }],
            ..LogisticsAutomation::default()
        });

        let error = manager.update(&mut plan, "north", make_zone("east")).unwrap_err();
        assert!(matches!(error, ZoneError::Invalid { .. }));
        assert!(plan.zone("north").is_some());
        assert!(plan.zone("east").is_none());
    }

    #[test]
    fn list_reports_counts() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        assert_eq!(manager.list(&plan).message, "No zones found");
        manager.create(&mut plan, make_zone("a")).unwrap();
        manager.create(&mut plan, make_zone("b")).unwrap();
        assert_eq!(manager.list(&plan).message, "2 zones found");
    }

    #[test]
    fn save_schematic_enables_it() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        manager.create(&mut plan, make_zone("a")).unwrap();
        manager.save_schematic(&mut plan, "a", "layout-001").unwrap();
        let schematic = plan.zone("a").unwrap().schematic.clone().unwrap();
        assert!(schematic.enabled);
        assert_eq!(schematic.schematic_id, "layout-001");
    }

    #[test]
    fn enter_applies_bundle_and_records_failures() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        let mut zone = make_zone("z1");
        zone.entry = Some(ZoneEntry {
            on_enter: Some(OnEnter {
                give_gear: true,
                gear_list: vec![
                    GearItem {
                        item_name: String::from("Sword of Dawn"),
                        count: 1,
                    },
                    GearItem {
                        item_name: String::from("Vampire Cloak"),
                        count: 0,
                    },
                ],
                message: String::from("Welcome"),
                ..OnEnter::default()
            }),
            on_exit: None,
        });
        plan.zones.push(zone);

        let report = manager.enter(&plan, "z1", CallerId(7)).unwrap();
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(world
            .events()
            .iter()
            .any(|e| matches!(e, WorldEvent::MessageSent { .. })));
    }

    #[test]
    fn test_only_plans_describe_effects_without_applying() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let mut plan = Plan::new("p");
        plan.is_test_only = true;
        let mut zone = make_zone("z1");
        zone.entry = Some(ZoneEntry {
            on_enter: None,
            on_exit: Some(OnExit {
                message: String::from("Bye"),
                ..OnExit::default()
            }),
        });
        plan.zones.push(zone);

        let report = manager.exit(&plan, "z1", CallerId(7)).unwrap();
        assert_eq!(report.applied, vec!["Would message 'Bye'"]);
        assert!(world.events().is_empty());
    }

    #[test]
    fn setup_stops_at_first_failing_step() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let plan = Plan::new("p");
        let mut zone = make_zone("z1");
        zone.mobs.push(Mob {
            mob_name: String::from("Unicorn"),
            count: 2,
            ..Mob::default()
        });

        let execution = manager.setup(&plan, &zone, Capability::PvPVirtualMutation);
        assert!(!execution.success);
        assert_eq!(execution.steps, vec!["Registered zone z1"]);
        assert!(execution.error.unwrap().contains("Unicorn"));
        assert!(!world
            .events()
            .iter()
            .any(|e| matches!(e, WorldEvent::BossSpawned { .. })));
    }

    #[test]
    fn setup_under_read_only_capability_is_simulated() {
        let world = Arc::new(InMemoryWorld::new());
        let manager = make_manager(&world);
        let execution = manager.setup(
            &Plan::new("p"),
            &make_zone("z1"),
            Capability::ReadOnlyAnalytics,
        );
        assert!(execution.success);
        assert_eq!(execution.steps.len(), 2);
        assert!(world.events().is_empty());
    }
}
