//! Name-to-prefab resolution.
//!
//! Plans name items, creatures, structures and blood types symbolically.
//! [`PrefabResolver`] turns those names into stable [`PrefabGuid`]s. It is a
//! pure lookup with no lifecycle; [`PrefabCatalog`] is the in-memory
//! implementation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vauto_types::PrefabGuid;

use crate::error::WorldError;

/// Namespace a prefab name is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrefabCategory {
    /// Inventory items: gear, loot, logistics goods.
    Item,
    /// Creatures: mobs and bosses.
    Creature,
    /// Placeable castle structures.
    Structure,
    /// Blood types applied to players.
    BloodType,
}

/// Resolves symbolic names to prefab identifiers.
pub trait PrefabResolver: Send + Sync {
    /// Resolve `name` within `category`.
    fn resolve(&self, category: PrefabCategory, name: &str) -> Option<PrefabGuid>;

    /// Whether `name` resolves within `category`.
    fn is_known(&self, category: PrefabCategory, name: &str) -> bool {
        self.resolve(category, name).is_some()
    }
}

/// In-memory prefab catalog.
///
/// Lookups are case-insensitive. When no name matches exactly, a name that
/// uniquely contains the query resolves as well, so `"dawn"` finds
/// `"Sword of Dawn"` as long as nothing else contains `"dawn"`.
#[derive(Debug, Clone, Default)]
pub struct PrefabCatalog {
    /// Lowercased name to guid, per category.
    entries: BTreeMap<PrefabCategory, BTreeMap<String, PrefabGuid>>,
}

impl PrefabCatalog {
    /// Create an empty catalog.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a name. Names are unique per category, ignoring case.
    pub fn register(
        &mut self,
        category: PrefabCategory,
        name: &str,
        guid: PrefabGuid,
    ) -> Result<(), WorldError> {
        let key = normalize(name);
        if key.is_empty() {
            return Err(WorldError::UnknownPrefab(name.to_owned()));
        }
        let names = self.entries.entry(category).or_default();
        if names.contains_key(&key) {
            return Err(WorldError::DuplicatePrefab(name.to_owned()));
        }
        names.insert(key, guid);
        Ok(())
    }

    /// Number of registered names across all categories.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty)
    }

    /// Registered names in a category, in sorted order.
    pub fn names(&self, category: PrefabCategory) -> Vec<&str> {
        self.entries
            .get(&category)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl PrefabResolver for PrefabCatalog {
    fn resolve(&self, category: PrefabCategory, name: &str) -> Option<PrefabGuid> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        let names = self.entries.get(&category)?;
        if let Some(guid) = names.get(&key) {
            return Some(*guid);
        }
        let mut partial = names
            .iter()
            .filter(|(candidate, _)| candidate.contains(&key))
            .map(|(_, guid)| *guid);
        match (partial.next(), partial.next()) {
            (Some(guid), None) => Some(guid),
            _ => None,
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
