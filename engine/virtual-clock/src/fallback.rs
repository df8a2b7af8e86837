//! Real-time timer used when deterministic timing is disabled

use std::sync::Arc;

use parking_lot::Mutex;
use virtual_time::VirtualTime;

use crate::host::HostClock;

/// Timer the clock hands every call to when the framerate is 0.
pub trait FallbackTimer: Send + Sync {
    /// Re-anchor on a clock restart.
    fn initialize(&self);
    fn get_ticks(&self) -> VirtualTime;
    fn add_delay(&self, delay: VirtualTime);
    fn enter_frame_boundary(&self);
    fn exit_frame_boundary(&self);
}

/// Reports real elapsed time and really sleeps on delays.
pub struct NonDeterministicTimer {
    host: Arc<dyn HostClock>,
    // (realtime, monotonic) captured at initialization
    origin: Mutex<(VirtualTime, VirtualTime)>,
}

impl NonDeterministicTimer {
    pub fn new(host: Arc<dyn HostClock>) -> Self {
        let origin = (host.realtime(), host.monotonic());
        Self { host, origin: Mutex::new(origin) }
    }
}

impl FallbackTimer for NonDeterministicTimer {
    fn initialize(&self) {
        *self.origin.lock() = (self.host.realtime(), self.host.monotonic());
    }

    fn get_ticks(&self) -> VirtualTime {
        let (real_origin, mono_origin) = *self.origin.lock();
        real_origin + (self.host.monotonic() - mono_origin)
    }

    fn add_delay(&self, delay: VirtualTime) {
        self.host.sleep(delay);
    }

    fn enter_frame_boundary(&self) {
        tracing::trace!("Non-deterministic frame boundary entered");
    }

    fn exit_frame_boundary(&self) {
        tracing::trace!("Non-deterministic frame boundary exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHostClock;

    #[test]
    fn test_ticks_follow_host_time() {
        let host = Arc::new(ManualHostClock::new(VirtualTime::from_secs(1000)));
        let timer = NonDeterministicTimer::new(host.clone());
        assert_eq!(timer.get_ticks(), VirtualTime::from_secs(1000));

        timer.add_delay(VirtualTime::from_millis(20));
        assert_eq!(timer.get_ticks(), VirtualTime::from_secs(1000) + VirtualTime::from_millis(20));
        assert_eq!(host.total_slept(), VirtualTime::from_millis(20));
    }

    #[test]
    fn test_initialize_picks_up_wall_clock_steps() {
        let host = Arc::new(ManualHostClock::new(VirtualTime::from_secs(1000)));
        let timer = NonDeterministicTimer::new(host.clone());
        host.advance(VirtualTime::from_secs(5));
        host.set_realtime(VirtualTime::from_secs(2000));
        assert_eq!(timer.get_ticks(), VirtualTime::from_secs(1005));

        timer.initialize();
        assert_eq!(timer.get_ticks(), VirtualTime::from_secs(2000));
    }
}
