//! Process-wide counters for match activity.
//!
//! Counters are bumped at the call site and emitted together by
//! [`Metrics::flush`], typically once at the end of a CLI command.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    matches_run: AtomicU64,
    turns_played: AtomicU64,
    agent_timeouts: AtomicU64,
    setup_failures: AtomicU64,
    receipts_signed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            matches_run: AtomicU64::new(0),
            turns_played: AtomicU64::new(0),
            agent_timeouts: AtomicU64::new(0),
            setup_failures: AtomicU64::new(0),
            receipts_signed: AtomicU64::new(0),
        }
    }

    pub fn inc_matches_run(&self) {
        self.matches_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "matches_run", "counter incremented");
    }

    pub fn add_turns_played(&self, turns: u64) {
        self.turns_played.fetch_add(turns, Ordering::Relaxed);
        tracing::trace!(metric = "turns_played", turns, "counter incremented");
    }

    pub fn inc_agent_timeouts(&self) {
        self.agent_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "agent_timeouts", "counter incremented");
    }

    pub fn inc_setup_failures(&self) {
        self.setup_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "setup_failures", "counter incremented");
    }

    pub fn inc_receipts_signed(&self) {
        self.receipts_signed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "receipts_signed", "counter incremented");
    }

    /// Emit all counters as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            matches_run = self.matches_run(),
            turns_played = self.turns_played(),
            agent_timeouts = self.agent_timeouts(),
            setup_failures = self.setup_failures(),
            receipts_signed = self.receipts_signed(),
        );
    }

    pub fn matches_run(&self) -> u64 {
        self.matches_run.load(Ordering::Relaxed)
    }

    pub fn turns_played(&self) -> u64 {
        self.turns_played.load(Ordering::Relaxed)
    }

    pub fn agent_timeouts(&self) -> u64 {
        self.agent_timeouts.load(Ordering::Relaxed)
    }

    pub fn setup_failures(&self) -> u64 {
        self.setup_failures.load(Ordering::Relaxed)
    }

    pub fn receipts_signed(&self) -> u64 {
        self.receipts_signed.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.matches_run.store(0, Ordering::Relaxed);
        self.turns_played.store(0, Ordering::Relaxed);
        self.agent_timeouts.store(0, Ordering::Relaxed);
        self.setup_failures.store(0, Ordering::Relaxed);
        self.receipts_signed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.inc_matches_run();
        m.add_turns_played(7);
        m.add_turns_played(3);
        m.inc_agent_timeouts();
        m.inc_agent_timeouts();
        assert_eq!(m.matches_run(), 1);
        assert_eq!(m.turns_played(), 10);
        assert_eq!(m.agent_timeouts(), 2);
        assert_eq!(m.setup_failures(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_matches_run();
        m.inc_setup_failures();
        m.inc_receipts_signed();
        m.reset();
        assert_eq!(m.matches_run(), 0);
        assert_eq!(m.setup_failures(), 0);
        assert_eq!(m.receipts_signed(), 0);
    }
}
