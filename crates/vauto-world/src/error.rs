//! Error types for the `vauto-world` crate.
//!
//! Every collaborator operation returns [`WorldError`] on failure. The core
//! engine records these as messages; they never cross its public boundary.

use vauto_types::PrefabGuid;

/// Errors raised by world collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A name did not resolve in the prefab catalog.
    #[error("unknown prefab: {0}")]
    UnknownPrefab(String),

    /// A prefab name was registered twice in the same category.
    #[error("duplicate prefab name: {0}")]
    DuplicatePrefab(String),

    /// An inventory or castle is not known to the world.
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    /// A piece of equipment is not known in the castle.
    #[error("unknown equipment {equipment} in {castle}")]
    UnknownEquipment {
        /// Castle searched.
        castle: String,
        /// Equipment id requested.
        equipment: String,
    },

    /// A location holds less of an item than requested.
    #[error("{location} holds {available} of {item}, {requested} requested")]
    InsufficientStock {
        /// Location drawn from.
        location: String,
        /// Item requested.
        item: PrefabGuid,
        /// Quantity requested.
        requested: u32,
        /// Quantity present.
        available: u32,
    },

    /// A structure already occupies the placement position.
    #[error("position ({x}, {z}) in {castle} is already occupied")]
    PositionOccupied {
        /// Castle built in.
        castle: String,
        /// Rounded east-west coordinate.
        x: i64,
        /// Rounded north-south coordinate.
        z: i64,
    },

    /// A zone is already registered by another plan.
    #[error("zone {zone} is already owned by plan {owner}")]
    ZoneOwned {
        /// The contested zone.
        zone: String,
        /// Plan that registered it first.
        owner: String,
    },

    /// The collaborator refused the operation.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
