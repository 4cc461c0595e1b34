//! Scheduler records and execution log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{PlanOperation, ScheduledEventStatus};
use crate::ids::{CallerId, LogEntryId, PlanId, RespawnScheduleId, ScheduledEventId};

/// A one-shot deferred plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ScheduledEvent {
    /// Event identifier.
    pub event_id: ScheduledEventId,
    /// Plan to run.
    pub plan_id: PlanId,
    /// When the run becomes due.
    pub execute_at: DateTime<Utc>,
    /// Caller the run is attributed to.
    pub scheduled_by: CallerId,
    /// Current status.
    pub status: ScheduledEventStatus,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// When the event fired or was cancelled.
    pub closed_at: Option<DateTime<Utc>>,
}

impl ScheduledEvent {
    /// Create a pending event.
    pub fn new(
        plan_id: PlanId,
        execute_at: DateTime<Utc>,
        scheduled_by: CallerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: ScheduledEventId::new(),
            plan_id,
            execute_at,
            scheduled_by,
            status: ScheduledEventStatus::Scheduled,
            created_at: now,
            closed_at: None,
        }
    }

    /// Whether the event is still waiting to fire.
    pub fn is_active(&self) -> bool {
        self.status == ScheduledEventStatus::Scheduled
    }

    /// Whether the event is active and its time has come.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.execute_at
    }
}

/// When a respawn schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "mode", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum RespawnCadence {
    /// Repeats every `interval_seconds`, gated on live combat.
    #[serde(rename_all = "camelCase")]
    Interval {
        /// Seconds between respawns.
        interval_seconds: u64,
        /// When the next respawn is due.
        next_respawn: DateTime<Utc>,
        /// Cap on fired respawns. Zero means unlimited.
        max_respawns: u32,
    },
    /// Fires once at a fixed instant.
    #[serde(rename_all = "camelCase")]
    Date {
        /// The instant.
        respawn_date: DateTime<Utc>,
    },
}

/// A recurring or date-based respawn of a plan's bosses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RespawnSchedule {
    /// Schedule identifier.
    pub schedule_id: RespawnScheduleId,
    /// Plan whose bosses respawn.
    pub plan_id: PlanId,
    /// Firing rule.
    pub cadence: RespawnCadence,
    /// Respawns fired so far.
    pub respawn_count: u32,
    /// Whether the schedule can still fire.
    pub is_active: bool,
}

impl RespawnSchedule {
    /// Create an active interval schedule whose first respawn is at `first`.
    pub fn interval(
        plan_id: PlanId,
        interval_seconds: u64,
        max_respawns: u32,
        first: DateTime<Utc>,
    ) -> Self {
        Self {
            schedule_id: RespawnScheduleId::new(),
            plan_id,
            cadence: RespawnCadence::Interval {
                interval_seconds,
                next_respawn: first,
                max_respawns,
            },
            respawn_count: 0,
            is_active: true,
        }
    }

    /// Create an active one-time schedule.
    pub fn on_date(plan_id: PlanId, respawn_date: DateTime<Utc>) -> Self {
        Self {
            schedule_id: RespawnScheduleId::new(),
            plan_id,
            cadence: RespawnCadence::Date { respawn_date },
            respawn_count: 0,
            is_active: true,
        }
    }

    /// Whether the schedule is active and its time has come.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && match self.cadence {
                RespawnCadence::Interval { next_respawn, .. } => now >= next_respawn,
                RespawnCadence::Date { respawn_date } => now >= respawn_date,
            }
    }

    /// Whether an interval schedule has used up its respawns.
    pub const fn is_exhausted(&self) -> bool {
        match self.cadence {
            RespawnCadence::Interval { max_respawns, .. } => {
                max_respawns > 0 && self.respawn_count >= max_respawns
            }
            RespawnCadence::Date { .. } => false,
        }
    }
}

/// One record in the append-only execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExecutionLogEntry {
    /// Entry identifier.
    pub entry_id: LogEntryId,
    /// Plan operated on.
    pub plan_id: PlanId,
    /// Operation performed.
    pub operation: PlanOperation,
    /// Caller, when the operation had one.
    pub caller: Option<CallerId>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result message.
    pub message: String,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}
