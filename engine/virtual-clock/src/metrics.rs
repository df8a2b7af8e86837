//! Metrics collection for VirtualClock

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use virtual_time::VirtualTime;

/// Counters describing how the clock has been driven
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockMetrics {
    /// Drawing frame boundaries entered
    pub drawing_rendezvous: u64,

    /// Non-drawing boundaries forced by deferred delay
    pub synthetic_rendezvous: u64,

    /// Forced advances triggered by call-kind limits
    pub forced_advances: u64,

    /// Non-owner threads promoted to frame owner
    pub non_owner_promotions: u64,

    /// Total delay requested through `add_delay` in nanoseconds
    pub total_delay_ns: u64,

    /// Total time spent sleeping to pace frames in nanoseconds
    pub total_pacing_sleep_ns: u64,

    /// Increment applied at the last frame boundary in nanoseconds
    pub last_increment_ns: u64,
}

/// Lock-free counters updated from the clock's entry points
#[derive(Default)]
pub struct MetricsCollector {
    drawing_rendezvous: AtomicU64,
    synthetic_rendezvous: AtomicU64,
    forced_advances: AtomicU64,
    non_owner_promotions: AtomicU64,
    total_delay_ns: AtomicU64,
    total_pacing_sleep_ns: AtomicU64,
    last_increment_ns: AtomicU64,
}

fn as_ns(time: VirtualTime) -> u64 {
    time.as_nanos().clamp(0, u64::MAX as i128) as u64
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entered frame boundary
    pub fn record_rendezvous(&self, drawing: bool, increment: VirtualTime) {
        if drawing {
            self.drawing_rendezvous.fetch_add(1, Ordering::Relaxed);
        } else {
            self.synthetic_rendezvous.fetch_add(1, Ordering::Relaxed);
        }
        self.last_increment_ns.store(as_ns(increment), Ordering::Relaxed);
    }

    pub fn record_forced_advance(&self) {
        self.forced_advances.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.non_owner_promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delay(&self, delay: VirtualTime) {
        self.total_delay_ns.fetch_add(as_ns(delay), Ordering::Relaxed);
    }

    pub fn record_pacing_sleep(&self, slept: VirtualTime) {
        self.total_pacing_sleep_ns.fetch_add(as_ns(slept), Ordering::Relaxed);
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> ClockMetrics {
        ClockMetrics {
            drawing_rendezvous: self.drawing_rendezvous.load(Ordering::Relaxed),
            synthetic_rendezvous: self.synthetic_rendezvous.load(Ordering::Relaxed),
            forced_advances: self.forced_advances.load(Ordering::Relaxed),
            non_owner_promotions: self.non_owner_promotions.load(Ordering::Relaxed),
            total_delay_ns: self.total_delay_ns.load(Ordering::Relaxed),
            total_pacing_sleep_ns: self.total_pacing_sleep_ns.load(Ordering::Relaxed),
            last_increment_ns: self.last_increment_ns.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.drawing_rendezvous.store(0, Ordering::Relaxed);
        self.synthetic_rendezvous.store(0, Ordering::Relaxed);
        self.forced_advances.store(0, Ordering::Relaxed);
        self.non_owner_promotions.store(0, Ordering::Relaxed);
        self.total_delay_ns.store(0, Ordering::Relaxed);
        self.total_pacing_sleep_ns.store(0, Ordering::Relaxed);
        self.last_increment_ns.store(0, Ordering::Relaxed);
    }
}
