//! Automatic item movement between labelled inventories.
//!
//! Inventories inside a territory join the conveyor through their labels:
//!
//! - `s<N>` sends to every receiver of group N
//! - `r<N>` receives from every sender of group N
//! - `overflow` tops up receivers that already hold an item
//!
//! Labels match case-insensitively anywhere in the inventory name. When a
//! label carries several markers, `overflow` wins over `s<N>`, which wins
//! over `r<N>`.
//!
//! Each sweep moves overflow stock first, then sender stock. Senders always
//! keep one of each item. No single transfer moves more than the configured
//! batch size.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use vauto_types::PrefabGuid;
use vauto_world::{InventorySink, WorldError};

use crate::config::ConveyorConfig;

/// Errors returned by conveyor operations.
#[derive(Debug, thiserror::Error)]
pub enum ConveyorError {
    /// A label pattern failed to compile.
    #[error("invalid label pattern: {source}")]
    Pattern {
        /// The underlying regex error.
        #[from]
        source: regex::Error,
    },

    /// The territory has no conveyor configuration.
    #[error("Territory {0} has no conveyor configuration")]
    UnknownTerritory(String),

    /// The inventory collaborator failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}

/// What an inventory label makes of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "group", rename_all = "camelCase")]
pub enum InventoryRole {
    /// Sends to receivers of its group.
    Sender(u32),
    /// Receives from senders of its group.
    Receiver(u32),
    /// Tops up receivers holding the same items.
    Overflow,
}

/// One sender-receiver pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConveyorLink {
    /// Shared group number.
    pub group: u32,
    /// Sending inventory.
    pub sender: String,
    /// Receiving inventory.
    pub receiver: String,
}

/// One completed item movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConveyorTransfer {
    /// Source inventory.
    pub from: String,
    /// Destination inventory.
    pub to: String,
    /// Item moved.
    pub item: PrefabGuid,
    /// Quantity moved.
    pub amount: u32,
}

/// Outcome of one territory sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Territory swept.
    pub territory: String,
    /// When the sweep ran.
    pub swept_at: DateTime<Utc>,
    /// Links discovered.
    pub links: usize,
    /// Movements made, in order.
    pub transfers: Vec<ConveyorTransfer>,
    /// Movements that failed, with the reason.
    pub failures: Vec<String>,
}

impl SweepSummary {
    /// Total items moved.
    pub fn items_moved(&self) -> u64 {
        self.transfers
            .iter()
            .map(|t| u64::from(t.amount))
            .fold(0_u64, u64::saturating_add)
    }
}

/// Conveyor state of one territory as operators see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryStatus {
    /// Territory name.
    pub territory: String,
    /// Whether polls sweep it.
    pub enabled: bool,
    /// Seconds between sweeps.
    pub update_interval_secs: u64,
    /// When it was last swept.
    pub last_run: Option<DateTime<Utc>>,
    /// Outcome of the last sweep.
    pub last_sweep: Option<SweepSummary>,
}

#[derive(Debug, Clone)]
struct TerritoryConveyor {
    enabled: bool,
    update_interval_secs: u64,
    last_run: Option<DateTime<Utc>>,
    last_sweep: Option<SweepSummary>,
}

impl TerritoryConveyor {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.last_run.is_none_or(|last| {
                let elapsed = now.signed_duration_since(last).num_seconds();
                u64::try_from(elapsed.max(0)).unwrap_or(0) >= self.update_interval_secs
            })
    }
}

/// Compiled label patterns.
#[derive(Debug, Clone)]
struct LabelPatterns {
    sender: Regex,
    receiver: Regex,
    overflow: Regex,
}

impl LabelPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            sender: Regex::new(r"(?i)\bs(\d+)\b")?,
            receiver: Regex::new(r"(?i)\br(\d+)\b")?,
            overflow: Regex::new(r"(?i)overflow")?,
        })
    }

    fn classify(&self, label: &str) -> Option<InventoryRole> {
        if self.overflow.is_match(label) {
            return Some(InventoryRole::Overflow);
        }
        if let Some(group) = group_of(&self.sender, label) {
            return Some(InventoryRole::Sender(group));
        }
        group_of(&self.receiver, label).map(InventoryRole::Receiver)
    }
}

fn group_of(pattern: &Regex, label: &str) -> Option<u32> {
    pattern
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Background item movement for enabled territories.
pub struct ConveyorService {
    inventory: Arc<dyn InventorySink>,
    config: ConveyorConfig,
    patterns: LabelPatterns,
    territories: Mutex<BTreeMap<String, TerritoryConveyor>>,
}

impl ConveyorService {
    /// Create a service with no territories configured.
    pub fn new(
        inventory: Arc<dyn InventorySink>,
        config: ConveyorConfig,
    ) -> Result<Self, ConveyorError> {
        Ok(Self {
            inventory,
            config,
            patterns: LabelPatterns::new()?,
            territories: Mutex::new(BTreeMap::new()),
        })
    }

    /// Classify an inventory label.
    pub fn classify(&self, label: &str) -> Option<InventoryRole> {
        self.patterns.classify(label)
    }

    // -----------------------------------------------------------------------
    // Territory configuration
    // -----------------------------------------------------------------------

    /// Enable a territory, creating its configuration on first use.
    pub fn enable(&self, territory: &str) {
        let interval = self.config.default_update_interval_secs;
        self.territories
            .lock()
            .entry(territory.to_owned())
            .or_insert_with(|| TerritoryConveyor {
                enabled: true,
                update_interval_secs: interval,
                last_run: None,
                last_sweep: None,
            })
            .enabled = true;
        info!(territory, "Conveyor enabled");
    }

    /// Disable a territory. Returns false if it was never configured.
    pub fn disable(&self, territory: &str) -> bool {
        let found = self
            .territories
            .lock()
            .get_mut(territory)
            .map(|t| t.enabled = false)
            .is_some();
        info!(territory, found, "Conveyor disabled");
        found
    }

    /// Whether a territory is enabled.
    pub fn is_enabled(&self, territory: &str) -> bool {
        self.territories
            .lock()
            .get(territory)
            .is_some_and(|t| t.enabled)
    }

    /// Change how often a territory is swept.
    pub fn set_update_interval(&self, territory: &str, seconds: u64) -> Result<(), ConveyorError> {
        self.territories
            .lock()
            .get_mut(territory)
            .map(|t| t.update_interval_secs = seconds)
            .ok_or_else(|| ConveyorError::UnknownTerritory(territory.to_owned()))
    }

    /// Every configured territory.
    pub fn territories(&self) -> Vec<TerritoryStatus> {
        self.territories
            .lock()
            .iter()
            .map(|(name, t)| TerritoryStatus {
                territory: name.clone(),
                enabled: t.enabled,
                update_interval_secs: t.update_interval_secs,
                last_run: t.last_run,
                last_sweep: t.last_sweep.clone(),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Sweeping
    // -----------------------------------------------------------------------

    /// Links between the territory's inventories, ordered by group.
    pub fn links(&self, territory: &str) -> Result<Vec<ConveyorLink>, ConveyorError> {
        let roles = self.roles(territory)?;
        Ok(links_of(&roles))
    }

    /// Sweep every enabled territory whose interval has elapsed.
    pub fn poll(&self, now: DateTime<Utc>) -> Vec<SweepSummary> {
        let due: Vec<String> = {
            let mut territories = self.territories.lock();
            territories
                .iter_mut()
                .filter(|(_, t)| t.is_due(now))
                .map(|(name, t)| {
                    t.last_run = Some(now);
                    name.clone()
                })
                .collect()
        };

        let mut summaries = Vec::with_capacity(due.len());
        for territory in due {
            match self.sweep(&territory, now) {
                Ok(summary) => {
                    if let Some(t) = self.territories.lock().get_mut(&territory) {
                        t.last_sweep = Some(summary.clone());
                    }
                    summaries.push(summary);
                }
                Err(e) => warn!(territory = %territory, error = %e, "Conveyor sweep failed"),
            }
        }
        summaries
    }

    /// Move items for one territory now.
    pub fn sweep(&self, territory: &str, now: DateTime<Utc>) -> Result<SweepSummary, ConveyorError> {
        let roles = self.roles(territory)?;
        let links = links_of(&roles);
        let mut summary = SweepSummary {
            territory: territory.to_owned(),
            swept_at: now,
            links: links.len(),
            transfers: Vec::new(),
            failures: Vec::new(),
        };

        let receivers: Vec<&str> = roles
            .iter()
            .filter(|(_, role)| matches!(role, InventoryRole::Receiver(_)))
            .map(|(label, _)| label.as_str())
            .collect();

        for (overflow, _) in roles
            .iter()
            .filter(|(_, role)| *role == InventoryRole::Overflow)
        {
            self.drain_overflow(overflow, &receivers, &mut summary);
        }

        for link in &links {
            self.feed(link, &mut summary);
        }

        if summary.transfers.is_empty() && summary.failures.is_empty() {
            debug!(territory, links = summary.links, "Conveyor sweep idle");
        } else {
            info!(
                territory,
                links = summary.links,
                transfers = summary.transfers.len(),
                failures = summary.failures.len(),
                items = summary.items_moved(),
                "Conveyor sweep finished"
            );
        }
        Ok(summary)
    }

    fn roles(&self, territory: &str) -> Result<Vec<(String, InventoryRole)>, ConveyorError> {
        Ok(self
            .inventory
            .inventories(territory)?
            .into_iter()
            .filter_map(|label| self.patterns.classify(&label).map(|role| (label, role)))
            .collect())
    }

    fn drain_overflow(&self, overflow: &str, receivers: &[&str], summary: &mut SweepSummary) {
        let stock = match self.inventory.contents(overflow) {
            Ok(stock) => stock,
            Err(e) => {
                summary.failures.push(format!("{overflow}: {e}"));
                return;
            }
        };
        for (item, held) in stock {
            let mut remaining = held;
            for receiver in receivers {
                if remaining == 0 {
                    break;
                }
                let wants = self
                    .inventory
                    .stock(receiver, item)
                    .is_ok_and(|quantity| quantity > 0);
                if !wants {
                    continue;
                }
                let amount = remaining.min(self.config.max_batch);
                if self.move_items(overflow, receiver, item, amount, summary) {
                    remaining = remaining.saturating_sub(amount);
                }
            }
        }
    }

    fn feed(&self, link: &ConveyorLink, summary: &mut SweepSummary) {
        let stock = match self.inventory.contents(&link.sender) {
            Ok(stock) => stock,
            Err(e) => {
                summary.failures.push(format!("{}: {e}", link.sender));
                return;
            }
        };
        for (item, held) in stock {
            let amount = held.saturating_sub(1).min(self.config.max_batch);
            if amount > 0 {
                self.move_items(&link.sender, &link.receiver, item, amount, summary);
            }
        }
    }

    fn move_items(
        &self,
        from: &str,
        to: &str,
        item: PrefabGuid,
        amount: u32,
        summary: &mut SweepSummary,
    ) -> bool {
        match self.inventory.transfer(from, to, item, amount) {
            Ok(()) => {
                summary.transfers.push(ConveyorTransfer {
                    from: from.to_owned(),
                    to: to.to_owned(),
                    item,
                    amount,
                });
                true
            }
            Err(e) => {
                summary
                    .failures
                    .push(format!("{amount} of {item} from {from} to {to}: {e}"));
                false
            }
        }
    }
}

impl std::fmt::Debug for ConveyorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConveyorService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn links_of(roles: &[(String, InventoryRole)]) -> Vec<ConveyorLink> {
    let mut links = Vec::new();
    for (sender, role) in roles {
        let InventoryRole::Sender(group) = *role else {
            continue;
        };
        for (receiver, other) in roles {
            if *other == InventoryRole::Receiver(group) {
                links.push(ConveyorLink {
                    group,
                    sender: sender.clone(),
                    receiver: receiver.clone(),
                });
            }
        }
    }
    links.sort_by_key(|l| l.group);
    links
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{Duration, TimeZone};
    use vauto_world::InMemoryWorld;

    use super::*;

    const WOOD: PrefabGuid = PrefabGuid(-1_593_377_811);
    const STONE: PrefabGuid = PrefabGuid(-1_531_666_018);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap() + Duration::seconds(secs)
    }

    fn make_service(world: &Arc<InMemoryWorld>) -> ConveyorService {
        ConveyorService::new(
            Arc::clone(world) as Arc<dyn InventorySink>,
            ConveyorConfig {
                max_batch: 50,
                ..ConveyorConfig::default()
            },
        )
        .unwrap()
    }

    fn make_world() -> Arc<InMemoryWorld> {
        let world = Arc::new(InMemoryWorld::new());
        world.add_territory("Keep", &["Chest s1", "Forge r1", "Loom r2", "Overflow", "Storage"]);
        world
    }

    #[test]
    fn labels_classify_by_marker() {
        let service = make_service(&make_world());
        assert_eq!(service.classify("Chest s1"), Some(InventoryRole::Sender(1)));
        assert_eq!(service.classify("R12 furnace"), Some(InventoryRole::Receiver(12)));
        assert_eq!(service.classify("OVERFLOW s3"), Some(InventoryRole::Overflow));
        assert_eq!(service.classify("Bars12"), None);
        assert_eq!(service.classify("Storage"), None);
    }

    #[test]
    fn links_pair_matching_groups() {
        let world = make_world();
        let service = make_service(&world);
        let links = service.links("Keep").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].sender, "Chest s1");
        assert_eq!(links[0].receiver, "Forge r1");
    }

    #[test]
    fn senders_keep_one_of_each_item() {
        let world = make_world();
        world.set_stock("Chest s1", WOOD, 30);
        world.set_stock("Chest s1", STONE, 1);
        world.set_stock("Forge r1", WOOD, 0);
        let service = make_service(&world);

        let summary = service.sweep("Keep", at(0)).unwrap();
        assert_eq!(summary.transfers.len(), 1);
        assert_eq!(summary.transfers[0].amount, 29);
        assert_eq!(world.stock("Chest s1", WOOD).unwrap(), 1);
        assert_eq!(world.stock("Forge r1", WOOD).unwrap(), 29);
    }

    #[test]
    fn transfers_are_capped_by_batch_size() {
        let world = make_world();
        world.set_stock("Chest s1", WOOD, 500);
        world.set_stock("Forge r1", WOOD, 0);
        let service = make_service(&world);

        let summary = service.sweep("Keep", at(0)).unwrap();
        assert_eq!(summary.items_moved(), 50);
    }

    #[test]
    fn overflow_tops_up_receivers_holding_the_item() {
        let world = make_world();
        world.set_stock("Overflow", STONE, 20);
        world.set_stock("Forge r1", STONE, 1);
        world.set_stock("Loom r2", WOOD, 1);
        let service = make_service(&world);

        let summary = service.sweep("Keep", at(0)).unwrap();
        assert_eq!(summary.transfers.len(), 1);
        assert_eq!(summary.transfers[0].to, "Forge r1");
        assert_eq!(world.stock("Forge r1", STONE).unwrap(), 21);
        assert_eq!(world.stock("Loom r2", STONE).unwrap(), 0);
    }

    #[test]
    fn poll_respects_enablement_and_interval() {
        let world = make_world();
        world.set_stock("Chest s1", WOOD, 10);
        world.set_stock("Forge r1", WOOD, 0);
        let service = make_service(&world);

        assert!(service.poll(at(0)).is_empty());

        service.enable("Keep");
        assert_eq!(service.poll(at(0)).len(), 1);
        assert!(service.poll(at(29)).is_empty());
        assert_eq!(service.poll(at(30)).len(), 1);

        assert!(service.disable("Keep"));
        assert!(service.poll(at(120)).is_empty());
        assert!(!service.disable("Elsewhere"));

        let status = &service.territories()[0];
        assert_eq!(status.update_interval_secs, 30);
        assert_eq!(status.last_run, Some(at(30)));
    }

    #[test]
    fn unknown_territories_fail_to_sweep() {
        let world = make_world();
        let service = make_service(&world);
        assert!(service.sweep("Nowhere", at(0)).is_err());
        assert!(service.set_update_interval("Nowhere", 5).is_err());
    }
}
