//! Default prefab catalog.
//!
//! Seeds a [`PrefabCatalog`] with the items, creatures, structures and blood
//! types the bundled demo plans use. Hosts with a real prefab database
//! register their own names instead.

use vauto_types::PrefabGuid;

use crate::error::WorldError;
use crate::prefab::{PrefabCatalog, PrefabCategory};

const ITEMS: &[(&str, i32)] = &[
    ("Wood", -1_593_377_811),
    ("Stone", -1_531_666_018),
    ("Copper Ingot", -1_237_135_436),
    ("Iron Ingot", -1_750_550_553),
    ("Blood Essence", 862_477_668),
    ("Greater Blood Essence", 271_594_022),
    ("Gem Dust", 805_157_024),
    ("Plant Fibre", -1_191_395_016),
    ("Sword of Dawn", 195_858_450),
    ("Vampire Cloak", 1_063_517_722),
    ("Healing Potion", 800_879_747),
];

const CREATURES: &[(&str, i32)] = &[
    ("Wolf", -1_418_430_647),
    ("Alpha Wolf", -1_905_691_330),
    ("Bandit Thug", -301_730_941),
    ("Skeleton Warrior", 1_604_500_740),
    ("Vampire Hunter", -1_449_631_170),
    ("Frost Archer", 1_807_734_127),
];

const STRUCTURES: &[(&str, i32)] = &[
    ("Castle Wall", -1_829_251_017),
    ("Castle Door", 1_446_839_590),
    ("Workbench", 1_402_340_081),
    ("Furnace", -222_860_772),
    ("Storage Chest", 279_811_010),
    ("Sawmill", 1_028_225_116),
];

const BLOOD_TYPES: &[(&str, i32)] = &[
    ("Warrior", -1_094_467_405),
    ("Rogue", 793_735_874),
    ("Brute", 581_377_887),
    ("Scholar", -700_632_469),
    ("Creature", -77_658_840),
    ("Worker", -540_707_191),
];

/// Build the default catalog.
pub fn default_catalog() -> Result<PrefabCatalog, WorldError> {
    let mut catalog = PrefabCatalog::new();
    for (category, names) in [
        (PrefabCategory::Item, ITEMS),
        (PrefabCategory::Creature, CREATURES),
        (PrefabCategory::Structure, STRUCTURES),
        (PrefabCategory::BloodType, BLOOD_TYPES),
    ] {
        for (name, guid) in names {
            catalog.register(category, name, PrefabGuid(*guid))?;
        }
    }
    Ok(catalog)
}
