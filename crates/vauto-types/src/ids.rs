//! Identifier wrappers for plans, zones, schedules and callers.
//!
//! Plans and zones are keyed by author-chosen strings, so their ids wrap a
//! [`String`]. Records the engine creates itself (scheduled events, respawn
//! schedules, log entries) use UUID v7 so they sort by creation time.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Generates a newtype wrapper around an author-chosen [`String`] key.
///
/// The wrapper serializes transparently and borrows as `str` so registries
/// keyed by it can be queried with plain string slices.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a string key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Borrow the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the key is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Case-insensitive comparison against another key or name.
            pub fn matches(&self, other: &str) -> bool {
                self.0.eq_ignore_ascii_case(other)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key! {
    /// Unique key of a plan among the active plans.
    PlanId
}

define_key! {
    /// Key of a zone, unique within its plan's zone list.
    ZoneId
}

define_id! {
    /// Identifier of a one-shot scheduled plan execution.
    ScheduledEventId
}

define_id! {
    /// Identifier of a recurring or date-based respawn schedule.
    RespawnScheduleId
}

define_id! {
    /// Identifier of an execution log entry.
    LogEntryId
}

/// Character id of whoever invoked an operation.
///
/// Zero is reserved for "no caller" and is refused by the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct CallerId(pub u64);

impl CallerId {
    /// The reserved "no caller" id.
    pub const NONE: Self = Self(0);

    /// Caller the scheduler acts as for respawns it triggers itself.
    pub const SYSTEM: Self = Self(u64::MAX);

    /// Whether this id names a real caller.
    pub const fn is_present(self) -> bool {
        self.0 != 0
    }
}

impl core::fmt::Display for CallerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier a name resolves to in the prefab catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct PrefabGuid(pub i32);

impl core::fmt::Display for PrefabGuid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn string_keys_serialize_transparently() {
        let id = PlanId::new("p1");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn string_keys_support_str_lookup() {
        let mut map = BTreeMap::new();
        map.insert(ZoneId::from("arena"), 1_u32);
        assert_eq!(map.get("arena"), Some(&1));
    }

    #[test]
    fn blank_and_case_insensitive_match() {
        assert!(PlanId::new("  ").is_blank());
        assert!(ZoneId::new("Arena").matches("arena"));
        assert!(!CallerId::NONE.is_present());
        assert!(CallerId(42).is_present());
    }

    #[test]
    fn uuid_ids_are_unique() {
        assert_ne!(ScheduledEventId::new(), ScheduledEventId::new());
    }
}
