//! Call kinds and caller roles

use serde::{Deserialize, Serialize};

/// The time query a call came through.
///
/// Every kind but `Untracked` is counted per frame to detect busy-waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeCallKind {
    Time,
    GetTimeOfDay,
    Clock,
    ClockGetTime,
    GetTicks,
    PerformanceCounter,
    Untracked,
}

impl TimeCallKind {
    /// Number of tracked kinds
    pub const TRACKED: usize = 6;

    pub const ALL_TRACKED: [TimeCallKind; Self::TRACKED] = [
        TimeCallKind::Time,
        TimeCallKind::GetTimeOfDay,
        TimeCallKind::Clock,
        TimeCallKind::ClockGetTime,
        TimeCallKind::GetTicks,
        TimeCallKind::PerformanceCounter,
    ];

    /// Counter slot for tracked kinds
    #[inline]
    pub fn index(self) -> Option<usize> {
        match self {
            TimeCallKind::Untracked => None,
            kind => Some(kind as usize),
        }
    }

    #[inline]
    pub fn is_tracked(self) -> bool {
        self != TimeCallKind::Untracked
    }
}

/// Who is calling into the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallerRole {
    /// Code running outside the virtual environment; sees real time
    Native,
    /// The virtualization layer itself; never tracked
    Internal,
    /// The thread that runs frame boundaries
    FrameOwner,
    /// Any other thread of the hosted process
    Worker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_indices_are_dense() {
        for (i, kind) in TimeCallKind::ALL_TRACKED.iter().enumerate() {
            assert_eq!(kind.index(), Some(i));
            assert!(kind.is_tracked());
        }
        assert_eq!(TimeCallKind::Untracked.index(), None);
    }
}
