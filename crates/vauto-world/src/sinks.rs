//! Contracts of the world collaborators the engine calls through.
//!
//! Each sink owns one kind of world mutation and takes primitive
//! identifiers. Failures come back as [`WorldError`] values; the engine
//! records them and carries on according to its stage policy.

use rust_decimal::Decimal;
use vauto_types::{CallerId, LiveState, PlanId, Position, PrefabGuid, VisualChannel, ZoneId, ZoneLocation};

use crate::error::WorldError;

/// One resolved loot line handed to the spawn sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootEntry {
    /// Resolved item.
    pub item: PrefabGuid,
    /// Quantity.
    pub count: u32,
    /// Drop chance in `[0, 1]`.
    pub chance: Decimal,
}

/// Player-facing effects: gear, blood, visuals and chat.
pub trait EffectSink: Send + Sync {
    /// Grant `count` of `item` to a player.
    fn grant_gear(&self, player: CallerId, item: PrefabGuid, count: u32) -> Result<(), WorldError>;

    /// Remove gear a zone granted to a player.
    fn remove_zone_gear(&self, player: CallerId, zone: &ZoneId) -> Result<(), WorldError>;

    /// Override a player's blood type.
    fn override_blood(&self, player: CallerId, blood: PrefabGuid) -> Result<(), WorldError>;

    /// Restore the blood type a player had before the last override.
    fn restore_blood(&self, player: CallerId) -> Result<(), WorldError>;

    /// Apply a named visual effect on a channel.
    fn apply_visual(
        &self,
        player: CallerId,
        channel: VisualChannel,
        effect: &str,
    ) -> Result<(), WorldError>;

    /// Send a chat message to a player.
    fn send_message(&self, player: CallerId, message: &str) -> Result<(), WorldError>;
}

/// Zone registration and entity spawning.
pub trait SpawnSink: Send + Sync {
    /// Register a zone as live for a plan.
    fn register_zone(
        &self,
        plan: &PlanId,
        zone: &ZoneId,
        location: Option<&ZoneLocation>,
    ) -> Result<(), WorldError>;

    /// Spawn `count` creatures in a zone.
    fn spawn_mobs(&self, zone: &ZoneId, creature: PrefabGuid, count: u32) -> Result<(), WorldError>;

    /// Spawn a zone's boss.
    fn spawn_boss(&self, zone: &ZoneId, creature: PrefabGuid, level: u32) -> Result<(), WorldError>;

    /// Place a loot chest.
    fn place_chest(&self, zone: &ZoneId, at: Position, loot: &[LootEntry]) -> Result<(), WorldError>;

    /// Register a named drop table.
    fn register_drop_table(
        &self,
        zone: &ZoneId,
        table: &str,
        loot: &[LootEntry],
    ) -> Result<(), WorldError>;
}

/// Castle structure placement.
pub trait StructureSink: Send + Sync {
    /// Place a structure in a castle.
    fn place_structure(
        &self,
        castle: &str,
        prefab: PrefabGuid,
        at: Position,
        rotation: f64,
    ) -> Result<(), WorldError>;
}

/// Inventory reads and item movement.
pub trait InventorySink: Send + Sync {
    /// Quantity of an item held at a location.
    fn stock(&self, location: &str, item: PrefabGuid) -> Result<u32, WorldError>;

    /// Move exactly `amount` of an item between locations.
    fn transfer(&self, from: &str, to: &str, item: PrefabGuid, amount: u32)
    -> Result<(), WorldError>;

    /// Draw up to `amount` of an item from a location's reserve storage into
    /// its working stock. Returns the quantity moved.
    fn restock(&self, location: &str, item: PrefabGuid, amount: u32) -> Result<u32, WorldError>;

    /// Repair a piece of equipment if its durability is below `threshold`
    /// percent. Returns whether a repair happened.
    fn repair(&self, castle: &str, equipment_id: &str, threshold: u8) -> Result<bool, WorldError>;

    /// Inventory labels inside a territory.
    fn inventories(&self, territory: &str) -> Result<Vec<String>, WorldError>;

    /// Items held by one inventory.
    fn contents(&self, location: &str) -> Result<Vec<(PrefabGuid, u32)>, WorldError>;
}

/// Source of the live state copied onto a plan before execution.
pub trait LiveStateSource: Send + Sync {
    /// Current live state for a plan.
    fn live_state(&self, plan: &PlanId) -> Result<LiveState, WorldError>;
}

/// Fire-and-forget sink for execution patterns.
///
/// Implementations must not block or fail the caller.
pub trait TelemetrySink: Send + Sync {
    /// Record one occurrence of a pattern.
    fn record_system_pattern(&self, category: &str, key: &str, success: bool);
}

/// Telemetry sink that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_system_pattern(&self, category: &str, key: &str, success: bool) {
        tracing::debug!(category, key, success, "System pattern recorded");
    }
}

/// Telemetry sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_system_pattern(&self, _category: &str, _key: &str, _success: bool) {}
}
