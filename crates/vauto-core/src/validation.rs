//! Plan validation.
//!
//! [`ValidationEngine::validate`] is a pure function of a plan snapshot and
//! the resolver's state. It never stops at the first defect: every section
//! is checked and every message collected, so authors see the whole list in
//! one pass. Sections are reported in a fixed order: zones, schematics,
//! logistics, castle, cross-system, gates.
//!
//! Warnings (overlapping zones, short schematic ids) are collected
//! separately and never affect validity.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;
use vauto_types::{
    Boss, BuildValidation, CastleAutomation, CastleValidation, ComprehensiveValidationResult,
    CrossSystemValidation, LogisticsAutomation, LogisticsOperation, LogisticsValidation, Loot,
    LootItem, LootValidation, OperationValidation, Plan, SchematicValidation, Zone,
    ZoneGateCheck, ZoneValidation,
};
use vauto_world::{PrefabCategory, PrefabResolver};

use crate::config::ValidationConfig;
use crate::gate::Gate;

/// Validates plans against the prefab catalog and the gate.
#[derive(Clone)]
pub struct ValidationEngine {
    resolver: Arc<dyn PrefabResolver>,
    gate: Arc<dyn Gate>,
    config: ValidationConfig,
}

impl ValidationEngine {
    /// Create an engine.
    pub fn new(
        resolver: Arc<dyn PrefabResolver>,
        gate: Arc<dyn Gate>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            resolver,
            gate,
            config,
        }
    }

    /// Validate a whole plan.
    pub fn validate(&self, plan: &Plan) -> ComprehensiveValidationResult {
        let mut report = ComprehensiveValidationResult {
            plan_id: plan.plan_id.clone(),
            is_valid: true,
            ..ComprehensiveValidationResult::default()
        };

        for zone in &plan.zones {
            let zone_report = self.validate_zone(zone);
            report.is_valid &= zone_report.is_valid;
            report.requires_dev_approval |= zone_report.requires_dev_approval;
            report.requires_snapshot |= zone_report.requires_snapshot;
            report.messages.extend(zone_report.messages.iter().cloned());
            report.warnings.extend(zone_report.warnings.iter().cloned());
            report.zones.push(zone_report);
        }

        for zone in &plan.zones {
            if let Some(schematic) = self.validate_schematic(zone) {
                report.is_valid &= schematic.is_valid;
                report.messages.extend(schematic.messages.iter().cloned());
                report.warnings.extend(schematic.warnings.iter().cloned());
                report.schematics.push(schematic);
            }
        }

        if let Some(logistics) = &plan.logistics_automation {
            let logistics_report = self.validate_logistics(logistics);
            report.is_valid &= logistics_report.is_valid;
            report.messages.extend(logistics_report.messages.iter().cloned());
            report.logistics = Some(logistics_report);
        }

        if let Some(castle) = &plan.castle_automation {
            let castle_report = self.validate_castle(castle);
            report.is_valid &= castle_report.is_valid;
            report.messages.extend(castle_report.messages.iter().cloned());
            report.castle = Some(castle_report);
        }

        let cross = self.validate_cross_system(plan);
        report.is_valid &= cross.is_valid;
        report.messages.extend(cross.messages.iter().cloned());
        report.warnings.extend(cross.warnings.iter().cloned());
        report.cross_system = cross;

        for zone in &plan.zones {
            let result = self.gate.check_zone_gates(zone, plan);
            if !result.passed {
                report.is_valid = false;
                report.requires_dev_approval |= result.requires_dev_approval;
                report.requires_snapshot |= result.requires_snapshot;
                report.messages.extend(result.messages.iter().cloned());
            }
            report.gates.push(ZoneGateCheck {
                zone_id: zone.zone_id.clone(),
                result,
            });
        }

        debug!(
            plan_id = %plan.plan_id,
            is_valid = report.is_valid,
            messages = report.messages.len(),
            warnings = report.warnings.len(),
            "Plan validated"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Zones
    // -----------------------------------------------------------------------

    /// Validate one zone: identity, geometry, mobs, boss, loot and entry
    /// effects.
    pub fn validate_zone(&self, zone: &Zone) -> ZoneValidation {
        let name = zone.display_name();
        let mut messages = Vec::new();

        if zone.zone_id.is_blank() {
            messages.push(String::from("Zone ID cannot be null or empty"));
        }

        if let Some(location) = &zone.location {
            if !location.radius.is_finite() || location.radius <= 0.0 {
                messages.push(format!("Zone radius must be greater than 0 in zone {name}"));
            }
            if !location.center.within(self.config.coordinate_limit) {
                messages.push(format!(
                    "Zone center is out of reasonable bounds in zone {name}"
                ));
            }
        }

        for mob in &zone.mobs {
            if mob.mob_name.trim().is_empty() {
                messages.push(format!("Mob name cannot be null or empty in zone {name}"));
                continue;
            }
            if mob.count <= 0 {
                messages.push(format!(
                    "Mob count must be greater than 0 for {} in zone {name}",
                    mob.mob_name
                ));
            }
            if !self.resolver.is_known(PrefabCategory::Creature, &mob.mob_name) {
                messages.push(format!(
                    "Mob {} does not exist in prefabs for zone {name}",
                    mob.mob_name
                ));
            }
        }

        if let Some(boss) = &zone.boss {
            messages.extend(self.validate_boss(boss));
        }

        if let Some(loot) = &zone.loot {
            messages.extend(self.validate_zone_loot(loot).messages);
        }

        if let Some(on_enter) = zone.entry.as_ref().and_then(|e| e.on_enter.as_ref()) {
            if on_enter.give_gear {
                for gear in &on_enter.gear_list {
                    if gear.count <= 0 {
                        messages.push(format!(
                            "Gear count must be greater than 0 for {} in zone {name}",
                            gear.item_name
                        ));
                    }
                    if !self.resolver.is_known(PrefabCategory::Item, &gear.item_name) {
                        messages.push(format!(
                            "Gear item '{}' does not exist in prefabs for zone {name}",
                            gear.item_name
                        ));
                    }
                }
            }
            if on_enter.override_blood
                && !self
                    .resolver
                    .is_known(PrefabCategory::BloodType, &on_enter.blood_type)
            {
                messages.push(format!(
                    "Blood type '{}' does not exist for zone {name}",
                    on_enter.blood_type
                ));
            }
        }

        ZoneValidation {
            zone_id: zone.zone_id.clone(),
            zone_name: name.to_owned(),
            is_valid: messages.is_empty(),
            messages,
            warnings: Vec::new(),
            requires_dev_approval: zone.permissions.requires_dev_approval,
            requires_snapshot: zone.permissions.requires_snapshot,
        }
    }

    /// Boss name, level, respawn trigger and reward defects.
    pub fn validate_boss(&self, boss: &Boss) -> Vec<String> {
        let mut messages = Vec::new();

        if boss.boss_name.trim().is_empty() {
            messages.push(String::from("Boss name cannot be null or empty"));
        } else if !self.resolver.is_known(PrefabCategory::Creature, &boss.boss_name) {
            messages.push(format!("Boss '{}' does not exist in prefabs", boss.boss_name));
        }

        if boss.boss_level <= 0 {
            messages.push(String::from("Boss level must be greater than 0"));
        }

        if let Some(respawn) = &boss.respawn {
            if let Err(e) = respawn.trigger() {
                messages.push(e.to_string());
            }
        }

        for reward in &boss.reward {
            self.check_loot_item(&reward_context(reward), reward, &mut messages);
        }

        messages
    }

    /// Validate a zone's chests and drop tables.
    pub fn validate_zone_loot(&self, loot: &Loot) -> LootValidation {
        let mut messages = Vec::new();

        for chest in &loot.chests {
            let Some(position) = chest.position else {
                messages.push(String::from("Chest position cannot be null"));
                continue;
            };
            if chest.loot_table.is_empty() {
                messages.push(format!(
                    "Chest at ({}, {}, {}) has no loot table",
                    position.x, position.y, position.z
                ));
                continue;
            }
            for item in &chest.loot_table {
                self.check_loot_item(&format!("for {}", item.item_name), item, &mut messages);
            }
        }

        for table in &loot.drop_tables {
            if table.table_name.trim().is_empty() {
                messages.push(String::from("Drop table name cannot be null or empty"));
                continue;
            }
            if table.items.is_empty() {
                messages.push(format!("Drop table '{}' has no items", table.table_name));
                continue;
            }
            for item in &table.items {
                let context = format!("for {} in table {}", item.item_name, table.table_name);
                self.check_loot_item(&context, item, &mut messages);
            }
        }

        LootValidation {
            is_valid: messages.is_empty(),
            messages,
        }
    }

    fn check_loot_item(&self, context: &str, item: &LootItem, messages: &mut Vec<String>) {
        if item.item_name.trim().is_empty() {
            messages.push(String::from("Loot item name cannot be null or empty"));
            return;
        }
        if !self.resolver.is_known(PrefabCategory::Item, &item.item_name) {
            messages.push(format!(
                "Loot item '{}' does not exist in prefabs",
                item.item_name
            ));
        }
        if item.count <= 0 {
            messages.push(format!("Loot item count must be greater than 0 {context}"));
        }
        if item.chance < Decimal::ZERO || item.chance > Decimal::ONE {
            messages.push(format!(
                "Loot item chance must be between 0 and 1 {context}"
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Schematics
    // -----------------------------------------------------------------------

    /// Validate a zone's schematic reference, if it has one.
    pub fn validate_schematic(&self, zone: &Zone) -> Option<SchematicValidation> {
        let schematic = zone.schematic.as_ref()?;
        let id = schematic.schematic_id.trim();
        let mut messages = Vec::new();
        let mut warnings = Vec::new();

        if schematic.enabled && id.is_empty() {
            messages.push(format!(
                "Schematic is enabled but has no schematic id in zone {}",
                zone.display_name()
            ));
        }

        if let Some(min_len) = self.config.schematic_id_min_len {
            if !id.is_empty() && id.chars().count() < min_len {
                warnings.push(format!(
                    "Zone '{}' has an unusually short schematic id: {id}",
                    zone.display_name()
                ));
            }
        }

        Some(SchematicValidation {
            zone_id: zone.zone_id.clone(),
            schematic_id: id.to_owned(),
            is_valid: messages.is_empty(),
            messages,
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Logistics
    // -----------------------------------------------------------------------

    /// Validate every logistics operation independently.
    pub fn validate_logistics(&self, logistics: &LogisticsAutomation) -> LogisticsValidation {
        let mut report = LogisticsValidation {
            is_valid: true,
            ..LogisticsValidation::default()
        };

        for (index, operation) in logistics.operations() {
            let label = operation.label(index);
            let messages: Vec<String> = self
                .operation_defects(operation)
                .into_iter()
                .map(|defect| format!("{label}: {defect}"))
                .collect();
            report.is_valid &= messages.is_empty();
            report.messages.extend(messages.iter().cloned());
            report.operations.push(OperationValidation {
                kind: operation.kind(),
                index: u32::try_from(index).unwrap_or(u32::MAX),
                label,
                is_valid: messages.is_empty(),
                messages,
            });
        }

        report
    }

    fn operation_defects(&self, operation: LogisticsOperation<'_>) -> Vec<String> {
        let mut defects = Vec::new();
        match operation {
            LogisticsOperation::Transfer(op) => {
                require(&mut defects, &op.from, "Transfer source cannot be null or empty");
                require(&mut defects, &op.to, "Transfer destination cannot be null or empty");
                self.require_item(&mut defects, &op.item, "Transfer item");
                if op.amount <= 0 {
                    defects.push(String::from("Transfer amount must be greater than 0"));
                }
                if same_location(&op.from, &op.to) {
                    defects.push(String::from("Cannot transfer items to the same location"));
                }
            }
            LogisticsOperation::Refill(op) => {
                require(&mut defects, &op.castle, "Refill castle cannot be null or empty");
                self.require_item(&mut defects, &op.item, "Refill item");
                if op.min < 0 {
                    defects.push(String::from("Refill minimum amount cannot be negative"));
                }
                if op.max <= 0 {
                    defects.push(String::from("Refill maximum amount must be greater than 0"));
                }
                if op.min > op.max {
                    defects.push(String::from(
                        "Refill minimum amount cannot be greater than maximum amount",
                    ));
                }
            }
            LogisticsOperation::Repair(op) => {
                require(&mut defects, &op.castle, "Repair castle cannot be null or empty");
                require(
                    &mut defects,
                    &op.equipment_id,
                    "Repair equipment ID cannot be null or empty",
                );
                if op.repair_threshold > 100 {
                    defects.push(String::from("Repair threshold must be between 0 and 100"));
                }
            }
            LogisticsOperation::Balance(op) => {
                require(
                    &mut defects,
                    &op.source_castle,
                    "Balance source castle cannot be null or empty",
                );
                require(
                    &mut defects,
                    &op.target_castle,
                    "Balance target castle cannot be null or empty",
                );
                self.require_item(&mut defects, &op.item, "Balance resource");
                if op.balance_ratio <= Decimal::ZERO || op.balance_ratio > Decimal::ONE {
                    defects.push(String::from("Balance ratio must be between 0 and 1"));
                }
                if op.min_transfer_amount < 0 {
                    defects.push(String::from("Balance minimum transfer cannot be negative"));
                }
                if same_location(&op.source_castle, &op.target_castle) {
                    defects.push(String::from(
                        "Cannot balance resources between the same castle",
                    ));
                }
            }
        }
        defects
    }

    fn require_item(&self, defects: &mut Vec<String>, item: &str, what: &str) {
        if item.trim().is_empty() {
            defects.push(format!("{what} cannot be null or empty"));
        } else if !self.resolver.is_known(PrefabCategory::Item, item) {
            defects.push(format!("{what} '{item}' does not exist in prefabs"));
        }
    }

    // -----------------------------------------------------------------------
    // Castle
    // -----------------------------------------------------------------------

    /// Validate the castle target and every structure placement.
    pub fn validate_castle(&self, castle: &CastleAutomation) -> CastleValidation {
        let mut report = CastleValidation {
            target_castle: castle.target_castle.clone(),
            is_valid: true,
            ..CastleValidation::default()
        };

        if castle.target_castle.trim().is_empty() {
            report.is_valid = false;
            report
                .messages
                .push(String::from("Target castle is required"));
        }

        for (index, build) in castle.build.iter().enumerate() {
            let mut messages = Vec::new();
            if build.prefab.trim().is_empty() {
                messages.push(String::from("Castle build prefab cannot be null or empty"));
            } else if !self.resolver.is_known(PrefabCategory::Structure, &build.prefab) {
                messages.push(format!(
                    "Castle build prefab '{}' does not exist",
                    build.prefab
                ));
            }
            if !build.position.within(self.config.coordinate_limit) {
                messages.push(String::from(
                    "Castle build position coordinates are out of reasonable bounds",
                ));
            }
            if !(0.0..=360.0).contains(&build.rotation) {
                messages.push(String::from(
                    "Castle build rotation must be between 0 and 360 degrees",
                ));
            }

            report.is_valid &= messages.is_empty();
            report.messages.extend(messages.iter().cloned());
            report.builds.push(BuildValidation {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                prefab: build.prefab.clone(),
                is_valid: messages.is_empty(),
                messages,
            });
        }

        report
    }

    // -----------------------------------------------------------------------
    // Cross-system
    // -----------------------------------------------------------------------

    /// Check references between zones, the castle target and logistics.
    ///
    /// Every transfer, refill and balance location must name a zone (by id
    /// or name) or the plan's target castle, ignoring case. Duplicate zone
    /// ids are defects; overlapping zones are warnings.
    pub fn validate_cross_system(&self, plan: &Plan) -> CrossSystemValidation {
        let mut messages = Vec::new();
        let mut warnings = Vec::new();

        let mut seen = BTreeSet::new();
        for zone in &plan.zones {
            if !zone.zone_id.is_blank() && !seen.insert(fold(zone.zone_id.as_str())) {
                messages.push(format!("Duplicate zone id '{}'", zone.zone_id));
            }
        }

        if let Some(logistics) = &plan.logistics_automation {
            let known = known_locations(plan);
            for (_, operation) in logistics.operations() {
                for (role, location) in operation.locations() {
                    if location.trim().is_empty() {
                        continue;
                    }
                    if !known.contains(&fold(location)) {
                        messages.push(format!(
                            "Logistics {role} '{location}' is not a valid location"
                        ));
                    }
                }
            }
        }

        if self.config.warn_on_zone_overlap {
            for (i, a) in plan.zones.iter().enumerate() {
                for b in plan.zones.iter().skip(i.saturating_add(1)) {
                    if let (Some(la), Some(lb)) = (&a.location, &b.location) {
                        if la.overlaps(lb) {
                            warnings.push(format!(
                                "Zones '{}' and '{}' overlap",
                                a.display_name(),
                                b.display_name()
                            ));
                        }
                    }
                }
            }
        }

        CrossSystemValidation {
            is_valid: messages.is_empty(),
            messages,
            warnings,
        }
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn reward_context(reward: &LootItem) -> String {
    format!("for boss reward {}", reward.item_name)
}

fn require(defects: &mut Vec<String>, value: &str, message: &str) {
    if value.trim().is_empty() {
        defects.push(message.to_owned());
    }
}

/// Location and zone ids compare trimmed and case-folded.
fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn same_location(a: &str, b: &str) -> bool {
    let a = fold(a);
    !a.is_empty() && a == fold(b)
}

fn known_locations(plan: &Plan) -> BTreeSet<String> {
    let mut known = BTreeSet::new();
    for zone in &plan.zones {
        known.insert(fold(zone.zone_id.as_str()));
        if !zone.name.trim().is_empty() {
            known.insert(fold(&zone.name));
        }
    }
    if let Some(castle) = plan.target_castle() {
        known.insert(fold(castle));
    }
    known
}
