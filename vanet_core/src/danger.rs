//! Proximity danger detection with a self-clearing, debounced flag.

use crate::geometry::PositionVector;
use std::time::Duration;

/// Tracks whether the vehicle is currently in proximity danger.
///
/// Arming replaces any pending clear deadline (cancel-and-reschedule, never
/// stacked): at most one clear is pending at any instant. Two guards keep a
/// stale auto-clear from wiping a freshly re-armed state:
///
/// - a generation counter, presented by spawned waiters to
///   [`try_clear`](DangerMonitor::try_clear)
/// - the deadline itself, consulted lazily by [`refresh`](DangerMonitor::refresh)
///   on every motion tick, so driven schedulers need no live timer
#[derive(Debug, Clone)]
pub struct DangerMonitor {
    danger_radius: f64,
    reset_interval: Duration,
    in_danger: bool,
    clear_deadline: Option<Duration>,
    generation: u64,
}

impl DangerMonitor {
    pub fn new(danger_radius: f64, reset_interval: Duration) -> Self {
        Self {
            danger_radius,
            reset_interval,
            in_danger: false,
            clear_deadline: None,
            generation: 0,
        }
    }

    pub fn in_danger(&self) -> bool {
        self.in_danger
    }

    /// True iff `peer` is within the danger radius of `own` (inclusive).
    pub fn is_dangerous(&self, own: &PositionVector, peer: &PositionVector) -> bool {
        own.in_range(peer, self.danger_radius)
    }

    /// Raises the danger flag and (re)schedules the clear deadline at
    /// `now + reset_interval`, cancelling any pending clear.
    ///
    /// Returns the generation a waiter must present to
    /// [`try_clear`](DangerMonitor::try_clear).
    pub fn arm(&mut self, now: Duration) -> u64 {
        self.in_danger = true;
        self.clear_deadline = Some(now + self.reset_interval);
        self.generation += 1;
        self.generation
    }

    /// Clears the flag if `generation` still identifies the latest arm.
    ///
    /// A waiter whose arm was superseded is a no-op. Returns whether the
    /// flag was cleared.
    pub fn try_clear(&mut self, generation: u64) -> bool {
        if self.in_danger && self.generation == generation {
            self.in_danger = false;
            self.clear_deadline = None;
            true
        } else {
            false
        }
    }

    /// Deadline-based clear: drops the flag once the deadline has elapsed
    /// with no intervening re-arm. Returns whether it cleared.
    pub fn refresh(&mut self, now: Duration) -> bool {
        match self.clear_deadline {
            Some(deadline) if self.in_danger && now >= deadline => {
                self.in_danger = false;
                self.clear_deadline = None;
                true
            }
            _ => false,
        }
    }
}
