//! Plan definitions: the root aggregate and everything it owns by value.
//!
//! Plans are authored as camelCase JSON (or YAML) documents. Every list
//! defaults to empty and every optional section to absent, so a plan that
//! only names a zone and a boss is a complete document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{CombatState, LogisticsKind};
use crate::ids::{PlanId, ZoneId};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// The root automation script: zones, castle builds, logistics and respawns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Plan {
    /// Unique key among active plans. Immutable once loaded.
    pub plan_id: PlanId,
    /// Free-form description shown to operators.
    #[serde(default)]
    pub description: String,
    /// Forces read-only execution regardless of caller intent.
    #[serde(default)]
    pub is_test_only: bool,
    /// Zone definitions, executed in declaration order.
    #[serde(default)]
    pub zones: Vec<Zone>,
    /// Structure placement targeting one castle.
    #[serde(default)]
    pub castle_automation: Option<CastleAutomation>,
    /// Item movement between castles and zones.
    #[serde(default)]
    pub logistics_automation: Option<LogisticsAutomation>,
    /// Recurring and date-based respawn rules.
    #[serde(default)]
    pub respawn_rules: RespawnRules,
    /// Castles known to the plan, some of which sit inside plan zones.
    #[serde(default)]
    pub castles: Vec<CastleRecord>,
    /// Live world state, refreshed before each execution.
    #[serde(default)]
    pub live: LiveState,
}

impl Plan {
    /// Create an empty plan with the given id.
    pub fn new(plan_id: impl Into<PlanId>) -> Self {
        Self {
            plan_id: plan_id.into(),
            ..Self::default()
        }
    }

    /// Look up a zone by id.
    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.zone_id.as_str() == zone_id)
    }

    /// Whether the plan carries no work at all.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
            && self.castle_automation.is_none()
            && self
                .logistics_automation
                .as_ref()
                .is_none_or(LogisticsAutomation::is_empty)
    }

    /// Name of the castle targeted by the castle automation, if any.
    pub fn target_castle(&self) -> Option<&str> {
        self.castle_automation
            .as_ref()
            .map(|c| c.target_castle.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Non-authoritative live state copied from the world before execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LiveState {
    /// Combat state of the region the plan targets.
    #[serde(default)]
    pub combat_state: CombatState,
    /// Whether the plan operates with administrator privileges.
    #[serde(default)]
    pub is_admin: bool,
    /// When the state was last refreshed from the world.
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// A castle known to the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CastleRecord {
    /// Castle name.
    pub name: String,
    /// Zone the castle sits in. Such zones cannot be deleted.
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// East-west axis.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North-south axis.
    pub z: f64,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Whether every axis lies within `[-limit, limit]`.
    pub fn within(&self, limit: f64) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|axis| axis.is_finite() && axis.abs() <= limit)
    }
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// A spatial region with optional spawn, loot and effect configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Zone {
    /// Key, unique within the plan.
    pub zone_id: ZoneId,
    /// Display name. Falls back to the id when empty.
    #[serde(default)]
    pub name: String,
    /// Whether the zone is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Difficulty label shown to players.
    #[serde(default)]
    pub difficulty: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Spatial center and radius.
    #[serde(default)]
    pub location: Option<ZoneLocation>,
    /// Effects applied when players cross the boundary.
    #[serde(default)]
    pub entry: Option<ZoneEntry>,
    /// Hostile creatures spawned on setup.
    #[serde(default)]
    pub mobs: Vec<Mob>,
    /// Boss encounter.
    #[serde(default)]
    pub boss: Option<Boss>,
    /// Chests and drop tables.
    #[serde(default)]
    pub loot: Option<Loot>,
    /// Saved layout reference.
    #[serde(default)]
    pub schematic: Option<Schematic>,
    /// Visual effects bound to the zone.
    #[serde(default)]
    pub effects: Option<ZoneEffects>,
    /// Approval and snapshot requirements.
    #[serde(default)]
    pub permissions: Permissions,
}

impl Zone {
    /// Create a minimal enabled zone.
    pub fn new(zone_id: impl Into<ZoneId>) -> Self {
        Self {
            zone_id: zone_id.into(),
            enabled: true,
            ..Self::default()
        }
    }

    /// Name used in messages: the display name, or the id when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.zone_id.as_str()
        } else {
            &self.name
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Center and radius of a zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneLocation {
    /// Zone center.
    pub center: Position,
    /// Zone radius in world units.
    pub radius: f64,
}

impl ZoneLocation {
    /// Whether two zone spheres intersect.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.center.distance_to(&other.center) < self.radius + other.radius
    }
}

/// Entry and exit effect bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneEntry {
    /// Applied when a player enters.
    #[serde(default)]
    pub on_enter: Option<OnEnter>,
    /// Applied when a player leaves.
    #[serde(default)]
    pub on_exit: Option<OnExit>,
}

/// Effects applied on zone entry.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OnEnter {
    /// Grant the gear list.
    #[serde(default)]
    pub give_gear: bool,
    /// Items granted when `give_gear` is set.
    #[serde(default)]
    pub gear_list: Vec<GearItem>,
    /// Override the player's blood type.
    #[serde(default)]
    pub override_blood: bool,
    /// Blood type applied when `override_blood` is set.
    #[serde(default)]
    pub blood_type: String,
    /// UI effect name.
    #[serde(default)]
    pub ui_effect: String,
    /// Glow effect name.
    #[serde(default)]
    pub glow_effect: String,
    /// Map effect name.
    #[serde(default)]
    pub map_effect: String,
    /// Chat message sent to the player.
    #[serde(default)]
    pub message: String,
    /// Spawn the zone's mobs when a player enters.
    #[serde(default)]
    pub spawn_mobs: bool,
    /// Spawn the zone's boss when a player enters.
    #[serde(default)]
    pub spawn_boss: bool,
}

/// Effects applied on zone exit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OnExit {
    /// Remove gear granted by the zone.
    #[serde(default)]
    pub remove_gear: bool,
    /// Restore the blood type the player had before entering.
    #[serde(default)]
    pub restore_blood: bool,
    /// UI effect name.
    #[serde(default)]
    pub ui_effect: String,
    /// Glow effect name.
    #[serde(default)]
    pub glow_effect: String,
    /// Map effect name.
    #[serde(default)]
    pub map_effect: String,
    /// Chat message sent to the player.
    #[serde(default)]
    pub message: String,
}

/// An item granted on entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GearItem {
    /// Item name resolved through the prefab catalog.
    pub item_name: String,
    /// Quantity.
    #[serde(default = "default_one")]
    pub count: i32,
}

const fn default_one() -> i32 {
    1
}

/// A group of hostile creatures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Mob {
    /// Creature name resolved through the prefab catalog.
    pub mob_name: String,
    /// How many to spawn.
    pub count: i32,
    /// Spawns per minute once the zone is live.
    #[serde(default)]
    pub spawn_rate: f64,
    /// Seconds before a killed mob returns.
    #[serde(default)]
    pub respawn_interval: u32,
}

/// A boss encounter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Boss {
    /// Creature name resolved through the prefab catalog.
    pub boss_name: String,
    /// Level, strictly positive.
    pub boss_level: i32,
    /// Respawn trigger.
    #[serde(default)]
    pub respawn: Option<BossRespawn>,
    /// Items dropped on defeat.
    #[serde(default)]
    pub reward: Vec<LootItem>,
}

/// Raw respawn trigger as authored: a type tag and a value string.
///
/// Kept as strings so malformed triggers surface as validation messages
/// rather than document parse failures. [`BossRespawn::trigger`] parses it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BossRespawn {
    /// `Interval` or `DateTime`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Seconds for `Interval`, an RFC 3339 timestamp for `DateTime`.
    pub value: String,
}

/// A parsed boss respawn trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnTrigger {
    /// Every `seconds` seconds.
    Interval {
        /// Interval length, strictly positive.
        seconds: u64,
    },
    /// Once at a fixed instant.
    At(DateTime<Utc>),
}

/// Why a boss respawn trigger could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RespawnParseError {
    /// The type tag is neither `Interval` nor `DateTime`.
    #[error("Invalid respawn type '{0}', expected Interval or DateTime")]
    UnknownKind(String),
    /// The interval value is not a positive whole number of seconds.
    #[error("Invalid respawn interval '{0}', expected a positive number of seconds")]
    BadInterval(String),
    /// The date value is not an RFC 3339 timestamp.
    #[error("Invalid respawn date '{0}'")]
    BadDate(String),
}

impl BossRespawn {
    /// Create an interval trigger.
    pub fn interval(seconds: u64) -> Self {
        Self {
            kind: String::from("Interval"),
            value: seconds.to_string(),
        }
    }

    /// Parse the authored strings into a trigger.
    pub fn trigger(&self) -> Result<RespawnTrigger, RespawnParseError> {
        let value = self.value.trim();
        if self.kind.eq_ignore_ascii_case("Interval") {
            match value.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Ok(RespawnTrigger::Interval { seconds }),
                _ => Err(RespawnParseError::BadInterval(self.value.clone())),
            }
        } else if self.kind.eq_ignore_ascii_case("DateTime") {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|at| RespawnTrigger::At(at.with_timezone(&Utc)))
                .ok_or_else(|| RespawnParseError::BadDate(self.value.clone()))
        } else {
            Err(RespawnParseError::UnknownKind(self.kind.clone()))
        }
    }
}

/// An item with a drop chance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LootItem {
    /// Item name resolved through the prefab catalog.
    pub item_name: String,
    /// Quantity, strictly positive.
    pub count: i32,
    /// Drop chance in `[0, 1]`.
    #[ts(as = "String")]
    pub chance: Decimal,
}

/// Chests and drop tables of a zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Loot {
    /// Placed chests.
    #[serde(default)]
    pub chests: Vec<Chest>,
    /// Named drop tables.
    #[serde(default)]
    pub drop_tables: Vec<DropTable>,
}

/// A placed chest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Chest {
    /// Where the chest is placed. Required.
    #[serde(default)]
    pub position: Option<Position>,
    /// Items the chest can contain. Must not be empty.
    #[serde(default)]
    pub loot_table: Vec<LootItem>,
}

/// A named drop table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DropTable {
    /// Table name. Required.
    #[serde(default)]
    pub table_name: String,
    /// Items in the table. Must not be empty.
    #[serde(default)]
    pub items: Vec<LootItem>,
}

/// A saved-layout reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Schematic {
    /// Whether the schematic is in use.
    #[serde(default)]
    pub enabled: bool,
    /// Layout id. Required when enabled.
    #[serde(default)]
    pub schematic_id: String,
    /// Save the zone layout when the encounter completes.
    #[serde(default)]
    pub save_on_complete: bool,
    /// Post the saved id to the automation log.
    #[serde(default)]
    pub auto_share_to_log: bool,
}

/// Visual effects bound to a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ZoneEffects {
    /// UI effects.
    #[serde(default)]
    pub ui: Option<UiEffects>,
    /// Glow effects.
    #[serde(default)]
    pub glow: Option<TransitionEffects>,
    /// Map effects.
    #[serde(default)]
    pub map: Option<TransitionEffects>,
}

/// UI effects and the HUD banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UiEffects {
    /// Effect on entry.
    #[serde(default)]
    pub enter_effect: String,
    /// Effect on exit.
    #[serde(default)]
    pub exit_effect: String,
    /// Banner shown while inside.
    #[serde(default)]
    pub hud_message: String,
}

/// A pair of enter/exit effect names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TransitionEffects {
    /// Effect on entry.
    #[serde(default)]
    pub enter_effect: String,
    /// Effect on exit.
    #[serde(default)]
    pub exit_effect: String,
}

/// Approval and snapshot requirements of a zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Permissions {
    /// Setup needs developer approval, granted to administrators.
    #[serde(default)]
    pub requires_dev_approval: bool,
    /// Only administrators may set the zone up.
    #[serde(default)]
    pub requires_admin: bool,
    /// Setup requires a combat snapshot to be possible.
    #[serde(default)]
    pub requires_snapshot: bool,
}

// ---------------------------------------------------------------------------
// Castle automation
// ---------------------------------------------------------------------------

/// Structure placement targeting one castle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CastleAutomation {
    /// Castle name. Required.
    #[serde(default)]
    pub target_castle: String,
    /// Structures to place, in order.
    #[serde(default)]
    pub build: Vec<CastleBuild>,
}

/// One structure placement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CastleBuild {
    /// Structure prefab name.
    pub prefab: String,
    /// Placement position.
    #[serde(default)]
    pub position: Position,
    /// Yaw in degrees, within `[0, 360]`.
    #[serde(default)]
    pub rotation: f64,
}

// ---------------------------------------------------------------------------
// Logistics automation
// ---------------------------------------------------------------------------

/// Four independent lists of logistics operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LogisticsAutomation {
    /// Item transfers.
    #[serde(default)]
    pub transfer: Vec<TransferOp>,
    /// Refill thresholds.
    #[serde(default)]
    pub auto_refill: Vec<RefillOp>,
    /// Equipment repairs.
    #[serde(default)]
    pub repair: Vec<RepairOp>,
    /// Stock balancing between castles.
    #[serde(default)]
    pub balance: Vec<BalanceOp>,
}

impl LogisticsAutomation {
    /// Whether all four lists are empty.
    pub fn is_empty(&self) -> bool {
        self.transfer.is_empty()
            && self.auto_refill.is_empty()
            && self.repair.is_empty()
            && self.balance.is_empty()
    }

    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.transfer
            .len()
            .saturating_add(self.auto_refill.len())
            .saturating_add(self.repair.len())
            .saturating_add(self.balance.len())
    }

    /// Every operation in execution order (Transfer, Refill, Repair,
    /// Balance), each paired with its index within its own list.
    pub fn operations(&self) -> impl Iterator<Item = (usize, LogisticsOperation<'_>)> {
        let transfers = self
            .transfer
            .iter()
            .enumerate()
            .map(|(i, op)| (i, LogisticsOperation::Transfer(op)));
        let refills = self
            .auto_refill
            .iter()
            .enumerate()
            .map(|(i, op)| (i, LogisticsOperation::Refill(op)));
        let repairs = self
            .repair
            .iter()
            .enumerate()
            .map(|(i, op)| (i, LogisticsOperation::Repair(op)));
        let balances = self
            .balance
            .iter()
            .enumerate()
            .map(|(i, op)| (i, LogisticsOperation::Balance(op)));
        transfers.chain(refills).chain(repairs).chain(balances)
    }
}

/// Move items from one location to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TransferOp {
    /// Source location (zone or castle).
    pub from: String,
    /// Destination location (zone or castle).
    pub to: String,
    /// Item name.
    pub item: String,
    /// Quantity, strictly positive.
    pub amount: i32,
}

/// Keep an item between a minimum and maximum level in a castle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RefillOp {
    /// Castle whose stock is topped up.
    pub castle: String,
    /// Item name.
    pub item: String,
    /// Level below which a refill triggers.
    pub min: i32,
    /// Level a refill tops up to.
    pub max: i32,
}

/// Repair a piece of equipment in a castle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RepairOp {
    /// Castle holding the equipment.
    pub castle: String,
    /// Equipment identifier.
    pub equipment_id: String,
    /// Durability percentage below which the repair applies.
    #[serde(default)]
    pub repair_threshold: u8,
}

/// Even out an item between two castles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BalanceOp {
    /// Castle stock is taken from.
    pub source_castle: String,
    /// Castle stock is given to.
    pub target_castle: String,
    /// Item name.
    pub item: String,
    /// Share of the surplus moved per run, in `(0, 1]`.
    #[serde(default = "default_balance_ratio")]
    #[ts(as = "String")]
    pub balance_ratio: Decimal,
    /// Smallest transfer worth performing.
    #[serde(default)]
    pub min_transfer_amount: i32,
}

fn default_balance_ratio() -> Decimal {
    Decimal::new(1, 1)
}

impl Default for BalanceOp {
    fn default() -> Self {
        Self {
            source_castle: String::new(),
            target_castle: String::new(),
            item: String::new(),
            balance_ratio: default_balance_ratio(),
            min_transfer_amount: 0,
        }
    }
}

/// A borrowed logistics operation of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogisticsOperation<'a> {
    /// An item transfer.
    Transfer(&'a TransferOp),
    /// A refill threshold.
    Refill(&'a RefillOp),
    /// An equipment repair.
    Repair(&'a RepairOp),
    /// A balancing rule.
    Balance(&'a BalanceOp),
}

impl LogisticsOperation<'_> {
    /// The operation's kind.
    pub const fn kind(&self) -> LogisticsKind {
        match self {
            Self::Transfer(_) => LogisticsKind::Transfer,
            Self::Refill(_) => LogisticsKind::Refill,
            Self::Repair(_) => LogisticsKind::Repair,
            Self::Balance(_) => LogisticsKind::Balance,
        }
    }

    /// Human-readable label, e.g. `Transfer[0] CastleA -> CastleB (Wood)`.
    pub fn label(&self, index: usize) -> String {
        match self {
            Self::Transfer(op) => {
                format!("Transfer[{index}] {} -> {} ({})", op.from, op.to, op.item)
            }
            Self::Refill(op) => format!("Refill[{index}] {} ({})", op.castle, op.item),
            Self::Repair(op) => format!("Repair[{index}] {} ({})", op.castle, op.equipment_id),
            Self::Balance(op) => format!(
                "Balance[{index}] {} <-> {} ({})",
                op.source_castle, op.target_castle, op.item
            ),
        }
    }

    /// Location strings the operation references, each with its role.
    ///
    /// Repairs are addressed by equipment id and contribute no locations.
    pub fn locations(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Transfer(op) => vec![
                ("transfer source", op.from.as_str()),
                ("transfer destination", op.to.as_str()),
            ],
            Self::Refill(op) => vec![("refill castle", op.castle.as_str())],
            Self::Repair(_) => Vec::new(),
            Self::Balance(op) => vec![
                ("balance source", op.source_castle.as_str()),
                ("balance target", op.target_castle.as_str()),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Respawn rules
// ---------------------------------------------------------------------------

/// Plan-level rules controlling recurring respawns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RespawnRules {
    /// Interval between respawns. Zero disables interval respawns.
    #[serde(default)]
    pub respawn_interval_seconds: u64,
    /// Whether `respawn_dates` is used.
    #[serde(default)]
    pub date_based_respawn: bool,
    /// Fixed instants at which a respawn fires once.
    #[serde(default)]
    pub respawn_dates: Vec<DateTime<Utc>>,
    /// Cap on interval respawns. Zero means unlimited.
    #[serde(default)]
    pub max_respawns: u32,
    /// Re-arm interval schedules when the plan is reloaded.
    #[serde(default)]
    pub reset_on_plan_restart: bool,
}

impl RespawnRules {
    /// Whether any respawn schedule would be created from these rules.
    pub fn is_configured(&self) -> bool {
        self.respawn_interval_seconds > 0
            || (self.date_based_respawn && !self.respawn_dates.is_empty())
    }
}
