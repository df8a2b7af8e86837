// VirtualTime - normalized time arithmetic shared by the clock, the mixer and the scheduler

mod time;

pub use time::{VirtualTime, NANOS_PER_SEC};

/// Index of a rendezvous since the clock was initialized
pub type FrameIndex = u64;
