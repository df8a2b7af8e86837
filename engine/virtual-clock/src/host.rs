//! Access to the host's real clocks

use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use virtual_time::VirtualTime;

/// Real-time services of the host.
///
/// The clock only touches real time through this trait: pass-through
/// queries, frame pacing, and the fallback timer.
pub trait HostClock: Send + Sync {
    /// Wall-clock time since the Unix epoch
    fn realtime(&self) -> VirtualTime;

    /// Monotonic time since an arbitrary origin
    fn monotonic(&self) -> VirtualTime;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: VirtualTime);

    /// Give up the rest of the time slice
    fn yield_now(&self);
}

/// The operating system's clocks
pub struct SystemHostClock {
    origin: Instant,
}

impl SystemHostClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemHostClock {
    fn realtime(&self) -> VirtualTime {
        let now = Utc::now();
        VirtualTime::new(now.timestamp(), now.timestamp_subsec_nanos())
    }

    fn monotonic(&self) -> VirtualTime {
        VirtualTime::from(self.origin.elapsed())
    }

    fn sleep(&self, duration: VirtualTime) {
        std::thread::sleep(duration.to_std());
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// A host clock that only moves when told to.
///
/// Sleeping advances both clocks by the requested amount instead of
/// blocking, which makes pacing observable in tests and offline replays.
pub struct ManualHostClock {
    inner: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    realtime: VirtualTime,
    monotonic: VirtualTime,
    slept: VirtualTime,
    sleeps: u64,
    yields: u64,
}

impl ManualHostClock {
    pub fn new(realtime: VirtualTime) -> Self {
        Self { inner: Mutex::new(ManualState { realtime, ..Default::default() }) }
    }

    /// Move both clocks forward without counting it as sleep.
    pub fn advance(&self, by: VirtualTime) {
        let mut state = self.inner.lock();
        state.realtime += by;
        state.monotonic += by;
    }

    /// Step the wall clock without moving monotonic time.
    pub fn set_realtime(&self, realtime: VirtualTime) {
        self.inner.lock().realtime = realtime;
    }

    /// Total time spent in `sleep`
    pub fn total_slept(&self) -> VirtualTime {
        self.inner.lock().slept
    }

    pub fn sleep_count(&self) -> u64 {
        self.inner.lock().sleeps
    }

    pub fn yield_count(&self) -> u64 {
        self.inner.lock().yields
    }
}

impl Default for ManualHostClock {
    fn default() -> Self {
        Self::new(VirtualTime::ZERO)
    }
}

impl HostClock for ManualHostClock {
    fn realtime(&self) -> VirtualTime {
        self.inner.lock().realtime
    }

    fn monotonic(&self) -> VirtualTime {
        self.inner.lock().monotonic
    }

    fn sleep(&self, duration: VirtualTime) {
        let duration = duration.max_zero();
        let mut state = self.inner.lock();
        state.realtime += duration;
        state.monotonic += duration;
        state.slept += duration;
        state.sleeps += 1;
    }

    fn yield_now(&self) {
        self.inner.lock().yields += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let host = SystemHostClock::new();
        let a = host.monotonic();
        let b = host.monotonic();
        assert!(b >= a);
        assert!(host.realtime().secs() > 1_500_000_000);
    }

    #[test]
    fn test_manual_clock_sleep_advances() {
        let host = ManualHostClock::new(VirtualTime::from_secs(100));
        host.sleep(VirtualTime::from_millis(5));
        host.advance(VirtualTime::from_millis(1));
        assert_eq!(host.realtime(), VirtualTime::from_secs(100) + VirtualTime::from_millis(6));
        assert_eq!(host.monotonic(), VirtualTime::from_millis(6));
        assert_eq!(host.total_slept(), VirtualTime::from_millis(5));
        assert_eq!(host.sleep_count(), 1);
    }
}
