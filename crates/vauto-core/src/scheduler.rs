//! Deferred executions and recurring respawns.
//!
//! [`ScheduleBook`] holds both timelines and is shared by the execution
//! engine (which creates entries) and the [`Scheduler`] (which fires them).
//! Each timeline sits behind its own lock, so one-shot events and respawns
//! never wait on each other.
//!
//! One-shot events keep their history: a fired or cancelled event stays in
//! the book with its final status. Respawn schedules stay in the book after
//! they deactivate.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use vauto_types::{
    CallerId, CombatState, Plan, PlanId, RespawnCadence, RespawnRules, RespawnSchedule,
    RespawnScheduleId, ScheduledEvent, ScheduledEventId, ScheduledEventStatus,
};
use vauto_world::LiveStateSource;

use crate::clock::Clock;
use crate::engine::ExecutionEngine;

// ---------------------------------------------------------------------------
// Schedule book
// ---------------------------------------------------------------------------

/// Both scheduling timelines.
#[derive(Debug, Default)]
pub struct ScheduleBook {
    events: Mutex<BTreeMap<ScheduledEventId, ScheduledEvent>>,
    respawns: Mutex<BTreeMap<RespawnScheduleId, RespawnSchedule>>,
}

impl ScheduleBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a one-shot event.
    pub fn add_event(&self, event: ScheduledEvent) {
        self.events.lock().insert(event.event_id, event);
    }

    /// Look up an event, whatever its status.
    pub fn event(&self, event_id: ScheduledEventId) -> Option<ScheduledEvent> {
        self.events.lock().get(&event_id).cloned()
    }

    /// Every event, optionally filtered by plan, including history.
    pub fn events(&self, plan_id: Option<&PlanId>) -> Vec<ScheduledEvent> {
        self.events
            .lock()
            .values()
            .filter(|e| plan_id.is_none_or(|p| &e.plan_id == p))
            .cloned()
            .collect()
    }

    /// Events still waiting to fire, optionally filtered by plan.
    pub fn active_events(&self, plan_id: Option<&PlanId>) -> Vec<ScheduledEvent> {
        self.events(plan_id)
            .into_iter()
            .filter(ScheduledEvent::is_active)
            .collect()
    }

    /// Deactivate a pending event. Returns false if it is unknown or no
    /// longer pending.
    pub fn cancel_event(&self, event_id: ScheduledEventId, now: DateTime<Utc>) -> bool {
        let mut events = self.events.lock();
        match events.get_mut(&event_id) {
            Some(event) if event.is_active() => {
                event.status = ScheduledEventStatus::Cancelled;
                event.closed_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Mark every due event as fired and return them, oldest first.
    pub fn take_due_events(&self, now: DateTime<Utc>) -> Vec<ScheduledEvent> {
        let mut events = self.events.lock();
        let mut due: Vec<ScheduledEvent> = events
            .values_mut()
            .filter(|e| e.is_due(now))
            .map(|event| {
                event.status = ScheduledEventStatus::Fired;
                event.closed_at = Some(now);
                event.clone()
            })
            .collect();
        due.sort_by_key(|e| e.execute_at);
        due
    }

    /// Add a respawn schedule.
    pub fn add_respawn(&self, schedule: RespawnSchedule) {
        self.respawns.lock().insert(schedule.schedule_id, schedule);
    }

    /// Respawn schedules, optionally filtered by plan.
    pub fn respawns(&self, plan_id: Option<&PlanId>) -> Vec<RespawnSchedule> {
        self.respawns
            .lock()
            .values()
            .filter(|s| plan_id.is_none_or(|p| &s.plan_id == p))
            .cloned()
            .collect()
    }

    /// Active respawn schedules, optionally filtered by plan.
    pub fn active_respawns(&self, plan_id: Option<&PlanId>) -> Vec<RespawnSchedule> {
        self.respawns(plan_id)
            .into_iter()
            .filter(|s| s.is_active)
            .collect()
    }

    /// Active respawn schedules whose time has come.
    pub fn due_respawns(&self, now: DateTime<Utc>) -> Vec<RespawnSchedule> {
        self.respawns
            .lock()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect()
    }

    /// Apply `change` to a schedule. Returns false if it is unknown.
    pub fn update_respawn<F>(&self, schedule_id: RespawnScheduleId, change: F) -> bool
    where
        F: FnOnce(&mut RespawnSchedule),
    {
        self.respawns
            .lock()
            .get_mut(&schedule_id)
            .map(change)
            .is_some()
    }

    /// Create respawn schedules from a plan's respawn rules.
    ///
    /// An interval rule creates one schedule whose first respawn is one
    /// interval from `now`. Each future date creates a one-time schedule;
    /// dates already past are skipped. Returns the number created.
    pub fn setup_respawn_schedules(&self, plan: &Plan, now: DateTime<Utc>) -> usize {
        let created = build_respawn_schedules(plan, now);
        let count = created.len();
        let mut respawns = self.respawns.lock();
        for schedule in created {
            respawns.insert(schedule.schedule_id, schedule);
        }
        info!(plan_id = %plan.plan_id, count, "Respawn schedules created");
        count
    }

    /// Bring a plan's respawn schedules in line with the rules it was just
    /// loaded with.
    ///
    /// The plan's schedules are kept when `previous` (the rules of the plan
    /// it replaced) equals the new rules and the plan does not reset on
    /// restart. Otherwise they are dropped and rebuilt from the new rules.
    /// The check and the rebuild happen under one lock. Returns the plan's
    /// active schedule count.
    pub fn sync_respawn_schedules(
        &self,
        plan: &Plan,
        previous: Option<&RespawnRules>,
        now: DateTime<Utc>,
    ) -> usize {
        let rules = &plan.respawn_rules;
        let plan_id = &plan.plan_id;
        let mut respawns = self.respawns.lock();

        let existing = respawns.values().any(|s| &s.plan_id == plan_id);
        let keep = existing && previous == Some(rules) && !rules.reset_on_plan_restart;
        if !keep {
            respawns.retain(|_, s| &s.plan_id != plan_id);
            for schedule in build_respawn_schedules(plan, now) {
                respawns.insert(schedule.schedule_id, schedule);
            }
        }

        let active = respawns
            .values()
            .filter(|s| &s.plan_id == plan_id && s.is_active)
            .count();
        info!(plan_id = %plan_id, rebuilt = !keep, active, "Respawn schedules synced");
        active
    }

    /// Re-arm a plan's interval schedules: next respawn one interval from
    /// `now`, count zeroed, active again. Returns the number re-armed.
    pub fn reset_respawn_schedules(&self, plan_id: &PlanId, now: DateTime<Utc>) -> usize {
        let mut respawns = self.respawns.lock();
        let mut reset = 0_usize;
        for schedule in respawns.values_mut().filter(|s| &s.plan_id == plan_id) {
            if let RespawnCadence::Interval {
                interval_seconds,
                next_respawn,
                ..
            } = &mut schedule.cadence
            {
                *next_respawn = after(now, *interval_seconds);
                schedule.respawn_count = 0;
                schedule.is_active = true;
                reset = reset.saturating_add(1);
            }
        }
        info!(plan_id = %plan_id, reset, "Respawn schedules reset");
        reset
    }

    /// Cancel a plan's pending events and drop its respawn schedules.
    pub fn remove_plan(&self, plan_id: &PlanId, now: DateTime<Utc>) {
        for event in self
            .events
            .lock()
            .values_mut()
            .filter(|e| &e.plan_id == plan_id && e.is_active())
        {
            event.status = ScheduledEventStatus::Cancelled;
            event.closed_at = Some(now);
        }
        self.respawns.lock().retain(|_, s| &s.plan_id != plan_id);
    }
}

/// `now` plus `seconds`, saturating at the latest representable instant.
pub(crate) fn after(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn build_respawn_schedules(plan: &Plan, now: DateTime<Utc>) -> Vec<RespawnSchedule> {
    let rules = &plan.respawn_rules;
    let mut created = Vec::new();

    if rules.respawn_interval_seconds > 0 {
        created.push(RespawnSchedule::interval(
            plan.plan_id.clone(),
            rules.respawn_interval_seconds,
            rules.max_respawns,
            after(now, rules.respawn_interval_seconds),
        ));
    }

    if rules.date_based_respawn {
        for date in &rules.respawn_dates {
            if *date > now {
                created.push(RespawnSchedule::on_date(plan.plan_id.clone(), *date));
            } else {
                debug!(plan_id = %plan.plan_id, %date, "Skipping past respawn date");
            }
        }
    }
    created
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    /// One-shot events fired.
    pub events_fired: u32,
    /// Respawns fired.
    pub respawns_fired: u32,
    /// Interval respawns skipped because combat was not active.
    pub respawns_skipped: u32,
    /// Respawn schedules deactivated.
    pub schedules_completed: u32,
}

/// Fires due events and respawns on each tick.
pub struct Scheduler {
    engine: Arc<ExecutionEngine>,
    book: Arc<ScheduleBook>,
    live: Arc<dyn LiveStateSource>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    /// Create a scheduler over the engine's schedule book.
    pub fn new(
        engine: Arc<ExecutionEngine>,
        live: Arc<dyn LiveStateSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            book: engine.schedule_book(),
            engine,
            live,
            clock,
        }
    }

    /// Process everything due now.
    ///
    /// Due one-shot events are marked fired and then run, whatever the
    /// outcome. Due respawn schedules are handled according to their
    /// cadence:
    /// - the plan is gone: deactivate
    /// - date: respawn once and deactivate
    /// - interval with the cap reached: deactivate without respawning
    /// - interval outside active combat: skip, keep the schedule unchanged
    /// - interval otherwise: respawn, count it and move to the next interval
    pub fn process_scheduled_events(&self) -> TickSummary {
        let now = self.clock.now();
        let mut summary = TickSummary::default();

        for event in self.book.take_due_events(now) {
            info!(
                event_id = %event.event_id,
                plan_id = %event.plan_id,
                "Firing scheduled execution"
            );
            let result = self.engine.run(event.plan_id.as_str(), event.scheduled_by);
            if !result.success {
                warn!(
                    event_id = %event.event_id,
                    plan_id = %event.plan_id,
                    error = ?result.error,
                    "Scheduled execution failed"
                );
            }
            summary.events_fired = summary.events_fired.saturating_add(1);
        }

        for schedule in self.book.due_respawns(now) {
            self.process_respawn(&schedule, now, &mut summary);
        }

        if summary != TickSummary::default() {
            debug!(?summary, "Scheduler tick processed");
        }
        summary
    }

    fn process_respawn(&self, schedule: &RespawnSchedule, now: DateTime<Utc>, summary: &mut TickSummary) {
        let id = schedule.schedule_id;
        let plan_id = &schedule.plan_id;

        if self.engine.get_plan(plan_id.as_str()).is_none() {
            warn!(schedule_id = %id, plan_id = %plan_id, "Respawn plan not found, deactivating");
            self.deactivate(id, summary);
            return;
        }

        match schedule.cadence {
            RespawnCadence::Date { .. } => {
                self.fire(plan_id);
                self.book.update_respawn(id, |s| {
                    s.respawn_count = s.respawn_count.saturating_add(1);
                    s.is_active = false;
                });
                summary.respawns_fired = summary.respawns_fired.saturating_add(1);
                summary.schedules_completed = summary.schedules_completed.saturating_add(1);
            }
            RespawnCadence::Interval {
                interval_seconds, ..
            } => {
                if schedule.is_exhausted() {
                    info!(schedule_id = %id, plan_id = %plan_id, "Respawn limit reached");
                    self.deactivate(id, summary);
                    return;
                }
                if !self.combat_active(plan_id) {
                    debug!(schedule_id = %id, plan_id = %plan_id, "Combat not active, respawn skipped");
                    summary.respawns_skipped = summary.respawns_skipped.saturating_add(1);
                    return;
                }
                self.fire(plan_id);
                self.book.update_respawn(id, |s| {
                    s.respawn_count = s.respawn_count.saturating_add(1);
                    if let RespawnCadence::Interval { next_respawn, .. } = &mut s.cadence {
                        *next_respawn = after(now, interval_seconds);
                    }
                });
                summary.respawns_fired = summary.respawns_fired.saturating_add(1);
            }
        }
    }

    fn fire(&self, plan_id: &PlanId) {
        let result = self.engine.respawn(plan_id.as_str(), CallerId::SYSTEM);
        if !result.success {
            warn!(plan_id = %plan_id, error = ?result.error, "Scheduled respawn failed");
        }
    }

    fn deactivate(&self, id: RespawnScheduleId, summary: &mut TickSummary) {
        self.book.update_respawn(id, |s| s.is_active = false);
        summary.schedules_completed = summary.schedules_completed.saturating_add(1);
    }

    fn combat_active(&self, plan_id: &PlanId) -> bool {
        match self.live.live_state(plan_id) {
            Ok(live) => live.combat_state == CombatState::Active,
            Err(e) => {
                warn!(plan_id = %plan_id, error = %e, "Live state unavailable");
                false
            }
        }
    }

    /// Cancel a pending one-shot event.
    pub fn cancel_scheduled_event(&self, event_id: ScheduledEventId) -> bool {
        let cancelled = self.book.cancel_event(event_id, self.clock.now());
        info!(%event_id, cancelled, "Cancel scheduled event");
        cancelled
    }

    /// Pending one-shot events, optionally for one plan.
    pub fn active_schedules(&self, plan_id: Option<&PlanId>) -> Vec<ScheduledEvent> {
        self.book.active_events(plan_id)
    }

    /// Active respawn schedules, optionally for one plan.
    pub fn active_respawn_schedules(&self, plan_id: Option<&PlanId>) -> Vec<RespawnSchedule> {
        self.book.active_respawns(plan_id)
    }

    /// Create respawn schedules from a plan's rules.
    pub fn setup_respawn_schedules(&self, plan: &Plan) -> usize {
        self.book.setup_respawn_schedules(plan, self.clock.now())
    }

    /// Re-arm a plan's interval respawn schedules.
    pub fn reset_respawn_schedules(&self, plan_id: &PlanId) -> usize {
        self.book.reset_respawn_schedules(plan_id, self.clock.now())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("book", &self.book)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap() + Duration::seconds(secs)
    }

    fn make_event(plan: &str, secs: i64) -> ScheduledEvent {
        ScheduledEvent::new(PlanId::new(plan), at(secs), CallerId(1), at(0))
    }

    #[test]
    fn due_events_fire_once_and_keep_history() {
        let book = ScheduleBook::new();
        book.add_event(make_event("p", 10));
        book.add_event(make_event("p", 30));

        assert!(book.take_due_events(at(5)).is_empty());
        let due = book.take_due_events(at(10));
        assert_eq!(due.len(), 1);
        assert!(book.take_due_events(at(10)).is_empty());

        let history = book.events(None);
        assert_eq!(history.len(), 2);
        assert_eq!(book.active_events(None).len(), 1);
        let fired = book.event(due[0].event_id).unwrap();
        assert_eq!(fired.status, ScheduledEventStatus::Fired);
        assert_eq!(fired.closed_at, Some(at(10)));
    }

    #[test]
    fn cancelled_events_never_fire() {
        let book = ScheduleBook::new();
        let event = make_event("p", 10);
        let id = event.event_id;
        book.add_event(event);
        assert!(book.cancel_event(id, at(1)));
        assert!(!book.cancel_event(id, at(2)));
        assert!(book.take_due_events(at(60)).is_empty());
        assert_eq!(book.event(id).unwrap().status, ScheduledEventStatus::Cancelled);
    }

    #[test]
    fn setup_creates_interval_and_future_date_schedules() {
        let book = ScheduleBook::new();
        let mut plan = Plan::new("p");
        plan.respawn_rules = RespawnRules {
            respawn_interval_seconds: 60,
            date_based_respawn: true,
            respawn_dates: vec![at(-10), at(600)],
            max_respawns: 3,
            reset_on_plan_restart: false,
        };
        assert_eq!(book.setup_respawn_schedules(&plan, at(0)), 2);
        let schedules = book.active_respawns(Some(&PlanId::new("p")));
        assert_eq!(schedules.len(), 2);
        assert!(book.due_respawns(at(59)).is_empty());
        assert_eq!(book.due_respawns(at(60)).len(), 1);
    }

    #[test]
    fn reset_rearms_interval_schedules() {
        let book = ScheduleBook::new();
        let mut schedule = RespawnSchedule::interval(PlanId::new("p"), 60, 2, at(60));
        schedule.respawn_count = 2;
        schedule.is_active = false;
        book.add_respawn(schedule);

        assert_eq!(book.reset_respawn_schedules(&PlanId::new("p"), at(1000)), 1);
        let schedule = &book.respawns(None)[0];
        assert!(schedule.is_active);
        assert_eq!(schedule.respawn_count, 0);
        assert!(!schedule.is_due(at(1059)));
        assert!(schedule.is_due(at(1060)));
    }

    #[test]
    fn removing_a_plan_cancels_its_events() {
        let book = ScheduleBook::new();
        book.add_event(make_event("p", 10));
        book.add_event(make_event("q", 10));
        book.add_respawn(RespawnSchedule::interval(PlanId::new("p"), 60, 0, at(60)));
        book.remove_plan(&PlanId::new("p"), at(1));
        assert_eq!(book.active_events(None).len(), 1);
        assert!(book.respawns(None).is_empty());
    }

    fn interval_plan(interval: u64) -> Plan {
        let mut plan = Plan::new("p");
        plan.respawn_rules = RespawnRules {
            respawn_interval_seconds: interval,
            ..RespawnRules::default()
        };
        plan
    }

    #[test]
    fn sync_keeps_schedules_when_rules_are_unchanged() {
        let book = ScheduleBook::new();
        let plan = interval_plan(60);
        assert_eq!(book.sync_respawn_schedules(&plan, None, at(0)), 1);
        let first = book.respawns(None)[0].schedule_id;

        assert_eq!(
            book.sync_respawn_schedules(&plan, Some(&plan.respawn_rules), at(30)),
            1
        );
        assert_eq!(book.respawns(None)[0].schedule_id, first);
    }

    #[test]
    fn sync_rebuilds_when_rules_change_or_disappear() {
        let book = ScheduleBook::new();
        let old = interval_plan(60);
        book.sync_respawn_schedules(&old, None, at(0));

        let mut dated = interval_plan(120);
        dated.respawn_rules.date_based_respawn = true;
        dated.respawn_rules.respawn_dates = vec![at(600)];
        assert_eq!(
            book.sync_respawn_schedules(&dated, Some(&old.respawn_rules), at(10)),
            2
        );
        assert!(book.due_respawns(at(70)).is_empty());
        assert_eq!(book.due_respawns(at(130)).len(), 1);

        let cleared = Plan::new("p");
        assert_eq!(
            book.sync_respawn_schedules(&cleared, Some(&dated.respawn_rules), at(20)),
            0
        );
        assert!(book.respawns(None).is_empty());
    }

    #[test]
    fn repeated_first_loads_never_double_schedules() {
        let book = ScheduleBook::new();
        let plan = interval_plan(60);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| book.sync_respawn_schedules(&plan, None, at(0)));
            }
        });
        assert_eq!(book.respawns(None).len(), 1);
    }

    #[test]
    fn after_saturates() {
        assert_eq!(after(at(0), 60), at(60));
        assert_eq!(after(at(0), u64::MAX), DateTime::<Utc>::MAX_UTC);
    }
}
