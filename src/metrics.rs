//! Exchange counters.
//!
//! Each coordinator owns one [`ExchangeMetrics`]; there is no process-global
//! registry. Counters are relaxed atomics read back through [`ExchangeMetrics::snapshot`].
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::exchange::ExchangeKind;

#[derive(Debug, Default)]
pub struct ExchangeMetrics {
    fetch_sent: AtomicU64,
    write_sent: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    timeouts: AtomicU64,
    late_discarded: AtomicU64,
    reply_latency_sum_ms: AtomicU64,
    reply_latency_count: AtomicU64,
}

impl ExchangeMetrics {
    pub fn inc_sent(&self, kind: ExchangeKind) {
        match kind {
            ExchangeKind::Fetch => self.fetch_sent.fetch_add(1, Ordering::Relaxed),
            ExchangeKind::Write => self.write_sent.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// A reply claimed its pending slot.
    pub fn observe_reply(&self, sent_at: Instant) {
        let ms = sent_at.elapsed().as_millis() as u64;
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.reply_latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.reply_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_late_discarded(&self) {
        self.late_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        let sum = self.reply_latency_sum_ms.load(Ordering::Relaxed);
        let count = self.reply_latency_count.load(Ordering::Relaxed);
        Snapshot {
            fetch_sent: self.fetch_sent.load(Ordering::Relaxed),
            write_sent: self.write_sent.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            late_discarded: self.late_discarded.load(Ordering::Relaxed),
            reply_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    pub fetch_sent: u64,
    pub write_sent: u64,
    pub completed: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub late_discarded: u64,
    pub reply_latency_avg_ms: Option<u64>,
}
