//! Seam through which the clock asks for a synthetic rendezvous

/// Error produced by a rendezvous hook
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs a full non-drawing frame boundary on behalf of the clock.
///
/// The clock calls this from `add_delay` when deferred delay outgrows its
/// bound. The clock holds no lock of its own while the hook runs.
pub trait RendezvousHook: Send + Sync {
    fn synthetic_rendezvous(&self) -> Result<(), HookError>;
}
