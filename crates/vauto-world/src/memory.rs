//! In-memory world implementing every collaborator contract.
//!
//! [`InMemoryWorld`] keeps inventories, reserves, equipment durability,
//! placed structures, zone ownership and live state behind one lock, and
//! appends every applied mutation to an event list. The engine binary runs
//! against it when no game host is attached, and tests use it to observe
//! exactly what a run applied.
//!
//! Location and castle names are matched case-insensitively.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use vauto_types::{
    CallerId, CombatState, LiveState, PlanId, Position, PrefabGuid, VisualChannel, ZoneId,
    ZoneLocation,
};

use crate::error::WorldError;
use crate::sinks::{EffectSink, InventorySink, LiveStateSource, LootEntry, SpawnSink, StructureSink};

/// A mutation the in-memory world applied.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Gear was granted.
    GearGranted {
        /// Receiving player.
        player: CallerId,
        /// Item granted.
        item: PrefabGuid,
        /// Quantity.
        count: u32,
    },
    /// Zone gear was removed.
    GearRemoved {
        /// Player.
        player: CallerId,
        /// Zone that granted it.
        zone: ZoneId,
    },
    /// A blood type was overridden.
    BloodOverridden {
        /// Player.
        player: CallerId,
        /// New blood type.
        blood: PrefabGuid,
    },
    /// A blood override was undone.
    BloodRestored {
        /// Player.
        player: CallerId,
    },
    /// A visual effect was applied.
    VisualApplied {
        /// Player.
        player: CallerId,
        /// Channel.
        channel: VisualChannel,
        /// Effect name.
        effect: String,
    },
    /// A chat message was sent.
    MessageSent {
        /// Player.
        player: CallerId,
        /// Text.
        message: String,
    },
    /// A zone went live.
    ZoneRegistered {
        /// Owning plan.
        plan: PlanId,
        /// Zone.
        zone: ZoneId,
    },
    /// Mobs were spawned.
    MobsSpawned {
        /// Zone.
        zone: ZoneId,
        /// Creature.
        creature: PrefabGuid,
        /// Quantity.
        count: u32,
    },
    /// A boss was spawned.
    BossSpawned {
        /// Zone.
        zone: ZoneId,
        /// Creature.
        creature: PrefabGuid,
        /// Level.
        level: u32,
    },
    /// A loot chest was placed.
    ChestPlaced {
        /// Zone.
        zone: ZoneId,
        /// Position.
        at: Position,
        /// Number of loot lines.
        lines: usize,
    },
    /// A drop table was registered.
    DropTableRegistered {
        /// Zone.
        zone: ZoneId,
        /// Table name.
        table: String,
    },
    /// A structure was placed.
    StructurePlaced {
        /// Castle.
        castle: String,
        /// Structure prefab.
        prefab: PrefabGuid,
        /// Position.
        at: Position,
    },
    /// Items moved between locations.
    ItemsMoved {
        /// Source.
        from: String,
        /// Destination.
        to: String,
        /// Item.
        item: PrefabGuid,
        /// Quantity.
        amount: u32,
    },
    /// Items moved from reserve into working stock.
    Restocked {
        /// Location.
        location: String,
        /// Item.
        item: PrefabGuid,
        /// Quantity.
        amount: u32,
    },
    /// Equipment was repaired.
    Repaired {
        /// Castle.
        castle: String,
        /// Equipment id.
        equipment: String,
    },
}

type Inventory = BTreeMap<PrefabGuid, u32>;

#[derive(Debug, Default)]
struct WorldState {
    stock: BTreeMap<String, Inventory>,
    reserves: BTreeMap<String, Inventory>,
    equipment: BTreeMap<(String, String), u8>,
    territories: BTreeMap<String, Vec<String>>,
    structures: BTreeSet<(String, i64, i64)>,
    zone_owners: BTreeMap<String, PlanId>,
    blood_overrides: BTreeSet<CallerId>,
    live: BTreeMap<PlanId, LiveState>,
    events: Vec<WorldEvent>,
}

impl WorldState {
    fn inventory_mut(&mut self, location: &str) -> Result<&mut Inventory, WorldError> {
        self.stock
            .get_mut(&normalize(location))
            .ok_or_else(|| WorldError::UnknownLocation(location.to_owned()))
    }

    fn held(&self, location: &str, item: PrefabGuid) -> Result<u32, WorldError> {
        self.stock
            .get(&normalize(location))
            .map(|inventory| inventory.get(&item).copied().unwrap_or(0))
            .ok_or_else(|| WorldError::UnknownLocation(location.to_owned()))
    }
}

/// An in-memory world.
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    state: Mutex<WorldState>,
}

impl InMemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory location (castle or container) if missing.
    pub fn add_location(&self, name: &str) {
        let mut state = self.state.lock();
        state.stock.entry(normalize(name)).or_default();
        state.reserves.entry(normalize(name)).or_default();
    }

    /// Set the working stock of an item, creating the location if needed.
    pub fn set_stock(&self, location: &str, item: PrefabGuid, quantity: u32) {
        let mut state = self.state.lock();
        state.reserves.entry(normalize(location)).or_default();
        state
            .stock
            .entry(normalize(location))
            .or_default()
            .insert(item, quantity);
    }

    /// Set the reserve storage of an item, creating the location if needed.
    pub fn set_reserve(&self, location: &str, item: PrefabGuid, quantity: u32) {
        let mut state = self.state.lock();
        state.stock.entry(normalize(location)).or_default();
        state
            .reserves
            .entry(normalize(location))
            .or_default()
            .insert(item, quantity);
    }

    /// Register a piece of equipment with its durability percentage.
    pub fn add_equipment(&self, castle: &str, equipment_id: &str, durability: u8) {
        self.state
            .lock()
            .equipment
            .insert((normalize(castle), normalize(equipment_id)), durability.min(100));
    }

    /// Register a territory and its inventories, creating them as locations.
    pub fn add_territory(&self, territory: &str, inventories: &[&str]) {
        let mut state = self.state.lock();
        for inventory in inventories {
            state.stock.entry(normalize(inventory)).or_default();
            state.reserves.entry(normalize(inventory)).or_default();
        }
        state.territories.insert(
            normalize(territory),
            inventories.iter().map(|name| (*name).to_owned()).collect(),
        );
    }

    /// Set the live state reported for a plan.
    pub fn set_live_state(&self, plan: &PlanId, live: LiveState) {
        self.state.lock().live.insert(plan.clone(), live);
    }

    /// Set only the combat state reported for a plan.
    pub fn set_combat_state(&self, plan: &PlanId, combat_state: CombatState) {
        self.state
            .lock()
            .live
            .entry(plan.clone())
            .or_default()
            .combat_state = combat_state;
    }

    /// Every mutation applied so far, in order.
    pub fn events(&self) -> Vec<WorldEvent> {
        self.state.lock().events.clone()
    }

    /// Number of placed structures.
    pub fn structure_count(&self) -> usize {
        self.state.lock().structures.len()
    }

    /// Current durability of a piece of equipment.
    pub fn durability(&self, castle: &str, equipment_id: &str) -> Option<u8> {
        self.state
            .lock()
            .equipment
            .get(&(normalize(castle), normalize(equipment_id)))
            .copied()
    }
}

impl EffectSink for InMemoryWorld {
    fn grant_gear(&self, player: CallerId, item: PrefabGuid, count: u32) -> Result<(), WorldError> {
        if count == 0 {
            return Err(WorldError::Rejected(String::from("cannot grant zero items")));
        }
        self.state
            .lock()
            .events
            .push(WorldEvent::GearGranted { player, item, count });
        Ok(())
    }

    fn remove_zone_gear(&self, player: CallerId, zone: &ZoneId) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::GearRemoved {
            player,
            zone: zone.clone(),
        });
        Ok(())
    }

    fn override_blood(&self, player: CallerId, blood: PrefabGuid) -> Result<(), WorldError> {
        let mut state = self.state.lock();
        state.blood_overrides.insert(player);
        state
            .events
            .push(WorldEvent::BloodOverridden { player, blood });
        Ok(())
    }

    fn restore_blood(&self, player: CallerId) -> Result<(), WorldError> {
        let mut state = self.state.lock();
        if !state.blood_overrides.remove(&player) {
            return Err(WorldError::Rejected(format!(
                "player {player} has no blood override to restore"
            )));
        }
        state.events.push(WorldEvent::BloodRestored { player });
        Ok(())
    }

    fn apply_visual(
        &self,
        player: CallerId,
        channel: VisualChannel,
        effect: &str,
    ) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::VisualApplied {
            player,
            channel,
            effect: effect.to_owned(),
        });
        Ok(())
    }

    fn send_message(&self, player: CallerId, message: &str) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::MessageSent {
            player,
            message: message.to_owned(),
        });
        Ok(())
    }
}

impl SpawnSink for InMemoryWorld {
    fn register_zone(
        &self,
        plan: &PlanId,
        zone: &ZoneId,
        _location: Option<&ZoneLocation>,
    ) -> Result<(), WorldError> {
        let mut state = self.state.lock();
        let key = normalize(zone.as_str());
        if let Some(owner) = state.zone_owners.get(&key) {
            if owner != plan {
                return Err(WorldError::ZoneOwned {
                    zone: zone.to_string(),
                    owner: owner.to_string(),
                });
            }
        }
        state.zone_owners.insert(key, plan.clone());
        state.events.push(WorldEvent::ZoneRegistered {
            plan: plan.clone(),
            zone: zone.clone(),
        });
        Ok(())
    }

    fn spawn_mobs(&self, zone: &ZoneId, creature: PrefabGuid, count: u32) -> Result<(), WorldError> {
        if count == 0 {
            return Err(WorldError::Rejected(String::from("cannot spawn zero mobs")));
        }
        self.state.lock().events.push(WorldEvent::MobsSpawned {
            zone: zone.clone(),
            creature,
            count,
        });
        Ok(())
    }

    fn spawn_boss(&self, zone: &ZoneId, creature: PrefabGuid, level: u32) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::BossSpawned {
            zone: zone.clone(),
            creature,
            level,
        });
        Ok(())
    }

    fn place_chest(&self, zone: &ZoneId, at: Position, loot: &[LootEntry]) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::ChestPlaced {
            zone: zone.clone(),
            at,
            lines: loot.len(),
        });
        Ok(())
    }

    fn register_drop_table(
        &self,
        zone: &ZoneId,
        table: &str,
        _loot: &[LootEntry],
    ) -> Result<(), WorldError> {
        self.state.lock().events.push(WorldEvent::DropTableRegistered {
            zone: zone.clone(),
            table: table.to_owned(),
        });
        Ok(())
    }
}

impl StructureSink for InMemoryWorld {
    #[allow(clippy::cast_possible_truncation)]
    fn place_structure(
        &self,
        castle: &str,
        prefab: PrefabGuid,
        at: Position,
        _rotation: f64,
    ) -> Result<(), WorldError> {
        let x = at.x.round() as i64;
        let z = at.z.round() as i64;
        let mut state = self.state.lock();
        if !state.structures.insert((normalize(castle), x, z)) {
            return Err(WorldError::PositionOccupied {
                castle: castle.to_owned(),
                x,
                z,
            });
        }
        state.events.push(WorldEvent::StructurePlaced {
            castle: castle.to_owned(),
            prefab,
            at,
        });
        Ok(())
    }
}

impl InventorySink for InMemoryWorld {
    fn stock(&self, location: &str, item: PrefabGuid) -> Result<u32, WorldError> {
        self.state.lock().held(location, item)
    }

    fn transfer(
        &self,
        from: &str,
        to: &str,
        item: PrefabGuid,
        amount: u32,
    ) -> Result<(), WorldError> {
        let mut state = self.state.lock();
        let available = state.held(from, item)?;
        let destination = state.held(to, item)?;
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| WorldError::InsufficientStock {
                location: from.to_owned(),
                item,
                requested: amount,
                available,
            })?;
        let credited = destination
            .checked_add(amount)
            .ok_or(WorldError::ArithmeticOverflow)?;
        state.inventory_mut(from)?.insert(item, remaining);
        state.inventory_mut(to)?.insert(item, credited);
        state.events.push(WorldEvent::ItemsMoved {
            from: from.to_owned(),
            to: to.to_owned(),
            item,
            amount,
        });
        debug!(from, to, %item, amount, "Items moved");
        Ok(())
    }

    fn restock(&self, location: &str, item: PrefabGuid, amount: u32) -> Result<u32, WorldError> {
        let mut state = self.state.lock();
        let current = state.held(location, item)?;
        let reserve = state
            .reserves
            .get_mut(&normalize(location))
            .ok_or_else(|| WorldError::UnknownLocation(location.to_owned()))?;
        let in_reserve = reserve.get(&item).copied().unwrap_or(0);
        let moved = amount.min(in_reserve);
        if moved == 0 {
            return Ok(0);
        }
        reserve.insert(item, in_reserve.saturating_sub(moved));
        let credited = current
            .checked_add(moved)
            .ok_or(WorldError::ArithmeticOverflow)?;
        state.inventory_mut(location)?.insert(item, credited);
        state.events.push(WorldEvent::Restocked {
            location: location.to_owned(),
            item,
            amount: moved,
        });
        Ok(moved)
    }

    fn repair(&self, castle: &str, equipment_id: &str, threshold: u8) -> Result<bool, WorldError> {
        let mut state = self.state.lock();
        let durability = state
            .equipment
            .get_mut(&(normalize(castle), normalize(equipment_id)))
            .ok_or_else(|| WorldError::UnknownEquipment {
                castle: castle.to_owned(),
                equipment: equipment_id.to_owned(),
            })?;
        if *durability >= threshold {
            return Ok(false);
        }
        *durability = 100;
        state.events.push(WorldEvent::Repaired {
            castle: castle.to_owned(),
            equipment: equipment_id.to_owned(),
        });
        Ok(true)
    }

    fn inventories(&self, territory: &str) -> Result<Vec<String>, WorldError> {
        self.state
            .lock()
            .territories
            .get(&normalize(territory))
            .cloned()
            .ok_or_else(|| WorldError::UnknownLocation(territory.to_owned()))
    }

    fn contents(&self, location: &str) -> Result<Vec<(PrefabGuid, u32)>, WorldError> {
        self.state
            .lock()
            .stock
            .get(&normalize(location))
            .map(|inventory| {
                inventory
                    .iter()
                    .filter(|(_, quantity)| **quantity > 0)
                    .map(|(item, quantity)| (*item, *quantity))
                    .collect()
            })
            .ok_or_else(|| WorldError::UnknownLocation(location.to_owned()))
    }
}

impl LiveStateSource for InMemoryWorld {
    fn live_state(&self, plan: &PlanId) -> Result<LiveState, WorldError> {
        let mut live = self.state.lock().live.get(plan).cloned().unwrap_or_default();
        live.refreshed_at = Some(Utc::now());
        Ok(live)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const WOOD: PrefabGuid = PrefabGuid(1);

    fn make_world() -> InMemoryWorld {
        let world = InMemoryWorld::new();
        world.set_stock("CastleA", WOOD, 50);
        world.add_location("CastleB");
        world
    }

    #[test]
    fn transfer_moves_stock_between_locations() {
        let world = make_world();
        world.transfer("castlea", "CastleB", WOOD, 20).unwrap();
        assert_eq!(world.stock("CastleA", WOOD).unwrap(), 30);
        assert_eq!(world.stock("CastleB", WOOD).unwrap(), 20);
        assert!(matches!(
            world.events().last(),
            Some(WorldEvent::ItemsMoved { amount: 20, .. })
        ));
    }

    #[test]
    fn transfer_rejects_insufficient_stock() {
        let world = make_world();
        let err = world.transfer("CastleA", "CastleB", WOOD, 51).unwrap_err();
        assert!(matches!(err, WorldError::InsufficientStock { available: 50, .. }));
        assert_eq!(world.stock("CastleA", WOOD).unwrap(), 50);
    }

    #[test]
    fn transfer_rejects_unknown_location() {
        let world = make_world();
        let err = world.transfer("CastleA", "Nowhere", WOOD, 1).unwrap_err();
        assert_eq!(err, WorldError::UnknownLocation(String::from("Nowhere")));
    }

    #[test]
    fn restock_draws_from_reserve_up_to_available() {
        let world = make_world();
        world.set_reserve("CastleA", WOOD, 5);
        assert_eq!(world.restock("CastleA", WOOD, 10).unwrap(), 5);
        assert_eq!(world.stock("CastleA", WOOD).unwrap(), 55);
        assert_eq!(world.restock("CastleA", WOOD, 10).unwrap(), 0);
    }

    #[test]
    fn repair_only_below_threshold() {
        let world = make_world();
        world.add_equipment("CastleA", "anvil-1", 30);
        assert!(!world.repair("CastleA", "anvil-1", 20).unwrap());
        assert!(world.repair("CastleA", "anvil-1", 50).unwrap());
        assert_eq!(world.durability("CastleA", "anvil-1"), Some(100));
        assert!(world.repair("CastleA", "missing", 50).is_err());
    }

    #[test]
    fn structure_positions_cannot_be_reused() {
        let world = make_world();
        let at = Position::new(10.2, 0.0, 4.9);
        world.place_structure("Keep", PrefabGuid(5), at, 0.0).unwrap();
        let err = world
            .place_structure("keep", PrefabGuid(6), Position::new(10.0, 3.0, 5.0), 90.0)
            .unwrap_err();
        assert!(matches!(err, WorldError::PositionOccupied { x: 10, z: 5, .. }));
        assert_eq!(world.structure_count(), 1);
    }

    #[test]
    fn zones_belong_to_one_plan() {
        let world = make_world();
        let zone = ZoneId::new("arena");
        world.register_zone(&PlanId::new("p1"), &zone, None).unwrap();
        world.register_zone(&PlanId::new("p1"), &zone, None).unwrap();
        let err = world
            .register_zone(&PlanId::new("p2"), &zone, None)
            .unwrap_err();
        assert!(matches!(err, WorldError::ZoneOwned { .. }));
    }

    #[test]
    fn blood_restore_requires_prior_override() {
        let world = make_world();
        assert!(world.restore_blood(CallerId(7)).is_err());
        world.override_blood(CallerId(7), PrefabGuid(3)).unwrap();
        world.restore_blood(CallerId(7)).unwrap();
    }

    #[test]
    fn live_state_defaults_to_outside() {
        let world = make_world();
        let plan = PlanId::new("p1");
        let live = world.live_state(&plan).unwrap();
        assert_eq!(live.combat_state, CombatState::Outside);
        assert!(live.refreshed_at.is_some());

        world.set_combat_state(&plan, CombatState::Active);
        assert_eq!(
            world.live_state(&plan).unwrap().combat_state,
            CombatState::Active
        );
    }

    #[test]
    fn territory_inventories_and_contents() {
        let world = make_world();
        world.add_territory("Keep", &["Keep s1", "Keep r1"]);
        world.set_stock("Keep s1", WOOD, 8);
        assert_eq!(world.inventories("keep").unwrap().len(), 2);
        assert_eq!(world.contents("Keep s1").unwrap(), vec![(WOOD, 8)]);
        assert!(world.contents("Keep r1").unwrap().is_empty());
    }
}
