//! Runtime control shared by the background loops and the operator API.
//!
//! Fields are atomics so the loops read them without taking a lock. Waiting
//! uses [`Notify`]; every wait re-checks its flag after registering, so a
//! signal sent between the check and the wait is never lost.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Smallest scheduler tick interval an operator may set.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Pause, speed and stop controls for the scheduler and conveyor loops.
#[derive(Debug)]
pub struct RuntimeControl {
    paused: AtomicBool,
    resume_notify: Notify,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    tick_interval_ms: AtomicU64,
    ticks: AtomicU64,
    started_at: DateTime<Utc>,
}

impl RuntimeControl {
    /// Create running controls with the given scheduler tick interval.
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            ticks: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether the loops are paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the loops after their current tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the loops and wake them.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_waiters();
    }

    /// Wait until resumed or stopped. Returns immediately if running.
    pub async fn wait_if_paused(&self) {
        loop {
            let resumed = self.resume_notify.notified();
            tokio::pin!(resumed);
            resumed.as_mut().enable();
            if !self.is_paused() || self.is_stop_requested() {
                return;
            }
            resumed.await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask every loop to finish. Paused loops are woken.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
        self.resume_notify.notify_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Wait until a stop is requested.
    pub async fn stopped(&self) {
        loop {
            let stopped = self.stop_notify.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            if self.is_stop_requested() {
                return;
            }
            stopped.await;
        }
    }

    // -----------------------------------------------------------------------
    // Tick speed
    // -----------------------------------------------------------------------

    /// Current scheduler tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the scheduler tick interval.
    ///
    /// Returns the previous interval, or `None` if `ms` is below
    /// [`MIN_TICK_INTERVAL_MS`].
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    /// Count one completed scheduler tick.
    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Scheduler ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// When the controls were created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot for the operator API.
    pub fn status(&self) -> RuntimeStatus {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        RuntimeStatus {
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            tick_interval_ms: self.tick_interval_ms(),
            ticks: self.ticks(),
            uptime_seconds: u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX),
        }
    }
}

/// JSON view of [`RuntimeControl`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// Whether the loops are paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Scheduler tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Scheduler ticks completed.
    pub ticks: u64,
    /// Seconds since start.
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn tick_interval_has_a_floor() {
        let control = RuntimeControl::new(1000);
        assert_eq!(control.set_tick_interval_ms(50), None);
        assert_eq!(control.set_tick_interval_ms(250), Some(1000));
        assert_eq!(control.tick_interval_ms(), 250);
    }

    #[test]
    fn ticks_are_counted() {
        let control = RuntimeControl::new(1000);
        assert_eq!(control.record_tick(), 1);
        assert_eq!(control.record_tick(), 2);
        assert_eq!(control.status().ticks, 2);
    }

    #[tokio::test]
    async fn stop_wakes_waiters() {
        let control = Arc::new(RuntimeControl::new(1000));
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.stopped().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.request_stop();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn stop_releases_a_paused_loop() {
        let control = Arc::new(RuntimeControl::new(1000));
        control.pause();
        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.wait_if_paused().await })
        };
        control.request_stop();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn running_controls_do_not_wait() {
        let control = RuntimeControl::new(1000);
        control.wait_if_paused().await;
        control.pause();
        control.resume();
        control.wait_if_paused().await;
        assert!(!control.is_paused());
    }
}
