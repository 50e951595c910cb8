//! Cancellable, resettable periodic fetch schedule with exponential backoff.
//!
//! The poller never performs I/O itself. The event loop asks it for a ticket
//! when a fetch is due, runs the fetch, and hands the ticket back through
//! [`Poller::complete`]. Only one ticket is outstanding at a time, and tickets
//! issued before a [`Poller::stop`] or [`Poller::reset`] are rejected on
//! completion so late results never reach a torn-down view.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_interval: Duration,
    /// Consecutive cycles the backoff keeps doubling before it levels off.
    pub retries: u32,
}

impl PollerConfig {
    pub fn new(interval: Duration, max_interval: Duration, retries: u32) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
            retries,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(8), 3)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PollerPhase {
    Stopped,
    Running,
}

/// Proof that a fetch was requested by a given poller generation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct PollTicket {
    generation: u64,
    sequence: u64,
}

#[derive(Debug, Clone)]
pub struct Poller {
    config: PollerConfig,
    phase: PollerPhase,
    current_backoff: Duration,
    unchanged_cycles: u32,
    next_due: Option<Instant>,
    in_flight: Option<PollTicket>,
    fire_after_flight: bool,
    generation: u64,
    sequence: u64,
}

impl Poller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            phase: PollerPhase::Stopped,
            current_backoff: config.interval,
            unchanged_cycles: 0,
            next_due: None,
            in_flight: None,
            fire_after_flight: false,
            generation: 0,
            sequence: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == PollerPhase::Running
    }

    #[cfg(test)]
    pub fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Next instant a fetch becomes due, if one is scheduled.
    pub fn next_due(&self) -> Option<Instant> {
        if self.in_flight.is_some() {
            return None;
        }
        self.next_due
    }

    /// Stopped → Running with the first fetch due immediately.
    pub fn start(&mut self, now: Instant) {
        if self.is_running() {
            return;
        }
        self.phase = PollerPhase::Running;
        self.current_backoff = self.config.interval;
        self.unchanged_cycles = 0;
        self.next_due = Some(now);
    }

    /// Hands out a ticket when a fetch is due and none is in flight.
    pub fn take_due(&mut self, now: Instant) -> Option<PollTicket> {
        if !self.is_running() || self.in_flight.is_some() {
            return None;
        }
        let due = self.next_due?;
        if now < due {
            return None;
        }

        self.sequence += 1;
        let ticket = PollTicket {
            generation: self.generation,
            sequence: self.sequence,
        };
        self.in_flight = Some(ticket);
        self.next_due = None;
        Some(ticket)
    }

    pub fn accepts(&self, ticket: PollTicket) -> bool {
        self.is_running() && self.in_flight == Some(ticket)
    }

    /// Records the end of a fetch, successful or not, and schedules the next
    /// one. Returns `false` for stale tickets, which change nothing.
    pub fn complete(&mut self, ticket: PollTicket, now: Instant) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.in_flight = None;

        if std::mem::take(&mut self.fire_after_flight) {
            self.next_due = Some(now);
            return true;
        }

        self.next_due = Some(now + self.current_backoff);
        if self.unchanged_cycles < self.config.retries {
            self.unchanged_cycles += 1;
            self.current_backoff = (self.current_backoff * 2).min(self.config.max_interval);
        }
        true
    }

    /// Back to the base interval with a fetch due right away. An in-flight
    /// fetch keeps its ticket; the follow-up fires as soon as it completes.
    pub fn reset(&mut self, now: Instant) {
        self.current_backoff = self.config.interval;
        self.unchanged_cycles = 0;
        if !self.is_running() {
            return;
        }
        if self.in_flight.is_some() {
            self.fire_after_flight = true;
        } else {
            self.next_due = Some(now);
        }
    }

    /// Like [`Poller::reset`] but also orphans any in-flight fetch, for when
    /// the watched target itself changed (for example a namespace switch).
    pub fn restart(&mut self, now: Instant) {
        self.stop();
        self.start(now);
    }

    pub fn stop(&mut self) {
        if self.phase == PollerPhase::Stopped && self.in_flight.is_none() {
            return;
        }
        self.phase = PollerPhase::Stopped;
        self.next_due = None;
        self.in_flight = None;
        self.fire_after_flight = false;
        self.generation += 1;
    }
}
