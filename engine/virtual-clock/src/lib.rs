//! # VirtualClock
//!
//! The deterministic time source that every time query and sleep of the
//! hosted process is routed through.
//!
//! Virtual time only advances at frame boundaries (by exactly one frame
//! increment derived from the configured framerate), through delays the
//! process asks for, or through forced advances when a thread busy-waits on
//! the clock. Real time is used only to pace frames, never to decide what
//! value a query returns.

pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod hook;
pub mod host;
pub mod kinds;
pub mod metrics;



pub use clock::{ClockState, FrameTiming, VirtualClock};
pub use config::ClockConfig;
pub use error::{ClockError, Result};
pub use fallback::{FallbackTimer, NonDeterministicTimer};
pub use hook::{HookError, RendezvousHook};
pub use host::{HostClock, ManualHostClock, SystemHostClock};
pub use kinds::{CallerRole, TimeCallKind};
pub use metrics::{ClockMetrics, MetricsCollector};

/// Re-export commonly used types
pub use virtual_time::VirtualTime;

/// Current version of the VirtualClock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default framerate in frames per second
pub const DEFAULT_FRAMERATE: u32 = 60;

/// Default number of tracked calls of one kind allowed per frame
pub const DEFAULT_CALL_KIND_LIMIT: u32 = 100;

/// Default tracked calls from non-owner threads before promotion
pub const DEFAULT_NON_OWNER_CALL_THRESHOLD: u32 = 4000;

/// Default forced advance (1ms)
pub const DEFAULT_FORCED_ADVANCE_QUANTUM_NS: u64 = 1_000_000;

/// Default bound on deferred delay, in frame increments
pub const DEFAULT_MAX_DEFERRED_FRAMES: u32 = 6;
