//! Process-wide run counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::report::{RunOutcome, RunReport};

#[derive(Debug, Default)]
pub struct RunStats {
    started: AtomicU64,
    done: AtomicU64,
    written_unconfirmed: AtomicU64,
    aborted: AtomicU64,
    notifications: AtomicU64,
    transient_retries: AtomicU64,
    conflict_retries: AtomicU64,
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub started: u64,
    pub in_flight: u64,
    pub done: u64,
    pub written_unconfirmed: u64,
    pub aborted: u64,
    pub notifications: u64,
    pub transient_retries: u64,
    pub conflict_retries: u64,
}

impl RunStats {
    pub(crate) fn started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, report: &RunReport) {
        let counter = match report.outcome {
            RunOutcome::Done => &self.done,
            RunOutcome::WrittenUnconfirmed { .. } => &self.written_unconfirmed,
            RunOutcome::Aborted { .. } => &self.aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if report.notification.is_some() {
            self.notifications.fetch_add(1, Ordering::Relaxed);
        }
        self.transient_retries
            .fetch_add(report.transient_retries as u64, Ordering::Relaxed);
        self.conflict_retries
            .fetch_add(report.conflict_retries as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let done = self.done.load(Ordering::Relaxed);
        let written_unconfirmed = self.written_unconfirmed.load(Ordering::Relaxed);
        let aborted = self.aborted.load(Ordering::Relaxed);
        let started = self.started.load(Ordering::Relaxed);
        StatsSnapshot {
            started,
            in_flight: started.saturating_sub(done + written_unconfirmed + aborted),
            done,
            written_unconfirmed,
            aborted,
            notifications: self.notifications.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            conflict_retries: self.conflict_retries.load(Ordering::Relaxed),
        }
    }
}
