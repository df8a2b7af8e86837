//! Normalized virtual time value

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const NANOS_PER_SEC: u32 = 1_000_000_000;
const NANOS_PER_SEC_I128: i128 = NANOS_PER_SEC as i128;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// A point or span on the virtual timeline.
///
/// The value is always kept normalized: `nanos` lies in `[0, 1e9)` and the
/// sign lives entirely in `secs`. A negative value such as -0.25s is stored as
/// `(secs: -1, nanos: 750_000_000)`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTime", into = "RawTime")]
pub struct VirtualTime {
    secs: i64,
    nanos: u32,
}

/// Wire shape for serde; normalization is re-checked on the way in.
#[derive(Serialize, Deserialize)]
struct RawTime {
    secs: i64,
    nanos: u32,
}

impl TryFrom<RawTime> for VirtualTime {
    type Error = String;

    fn try_from(raw: RawTime) -> Result<Self, Self::Error> {
        if raw.nanos >= NANOS_PER_SEC {
            return Err(format!("nanos out of range: {}", raw.nanos));
        }
        Ok(Self { secs: raw.secs, nanos: raw.nanos })
    }
}

impl From<VirtualTime> for RawTime {
    fn from(t: VirtualTime) -> Self {
        Self { secs: t.secs, nanos: t.nanos }
    }
}

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime { secs: 0, nanos: 0 };

    /// Build a value from possibly unnormalized parts, carrying whole seconds
    /// out of `nanos`.
    pub const fn new(secs: i64, nanos: u32) -> Self {
        Self { secs: secs + (nanos / NANOS_PER_SEC) as i64, nanos: nanos % NANOS_PER_SEC }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self::new((millis / 1000) as i64, (millis % 1000) as u32 * NANOS_PER_MILLI)
    }

    /// Build a value from a signed nanosecond count.
    pub fn from_nanos(nanos: i128) -> Self {
        Self {
            secs: nanos.div_euclid(NANOS_PER_SEC_I128) as i64,
            nanos: nanos.rem_euclid(NANOS_PER_SEC_I128) as u32,
        }
    }

    #[inline]
    pub const fn secs(&self) -> i64 {
        self.secs
    }

    #[inline]
    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    #[inline]
    pub fn as_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC_I128 + self.nanos as i128
    }

    /// Whole milliseconds, truncated toward negative infinity.
    #[inline]
    pub fn as_millis(&self) -> i64 {
        self.secs * 1000 + (self.nanos / NANOS_PER_MILLI) as i64
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.secs == 0 && self.nanos == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.secs < 0
    }

    pub fn checked_add(self, rhs: VirtualTime) -> Option<VirtualTime> {
        let mut secs = self.secs.checked_add(rhs.secs)?;
        let mut nanos = self.nanos + rhs.nanos;
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = secs.checked_add(1)?;
        }
        Some(VirtualTime { secs, nanos })
    }

    pub fn checked_sub(self, rhs: VirtualTime) -> Option<VirtualTime> {
        let mut secs = self.secs.checked_sub(rhs.secs)?;
        let nanos = if self.nanos >= rhs.nanos {
            self.nanos - rhs.nanos
        } else {
            secs = secs.checked_sub(1)?;
            self.nanos + NANOS_PER_SEC - rhs.nanos
        };
        Some(VirtualTime { secs, nanos })
    }

    /// `self - rhs`, floored at zero.
    pub fn saturating_sub(self, rhs: VirtualTime) -> VirtualTime {
        if self <= rhs {
            VirtualTime::ZERO
        } else {
            self - rhs
        }
    }

    /// Clamp negative values to zero.
    pub fn max_zero(self) -> VirtualTime {
        if self.is_negative() {
            VirtualTime::ZERO
        } else {
            self
        }
    }

    /// Convert to a std duration; negative values become zero.
    pub fn to_std(self) -> Duration {
        if self.is_negative() {
            Duration::ZERO
        } else {
            Duration::new(self.secs as u64, self.nanos)
        }
    }
}

impl From<Duration> for VirtualTime {
    fn from(d: Duration) -> Self {
        Self { secs: d.as_secs() as i64, nanos: d.subsec_nanos() }
    }
}

impl Add for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: VirtualTime) -> VirtualTime {
        self.checked_add(rhs).expect("overflow when adding virtual times")
    }
}

impl AddAssign for VirtualTime {
    fn add_assign(&mut self, rhs: VirtualTime) {
        *self = *self + rhs;
    }
}

impl Sub for VirtualTime {
    type Output = VirtualTime;

    fn sub(self, rhs: VirtualTime) -> VirtualTime {
        self.checked_sub(rhs).expect("overflow when subtracting virtual times")
    }
}

impl SubAssign for VirtualTime {
    fn sub_assign(&mut self, rhs: VirtualTime) {
        *self = *self - rhs;
    }
}

impl Mul<u32> for VirtualTime {
    type Output = VirtualTime;

    fn mul(self, rhs: u32) -> VirtualTime {
        VirtualTime::from_nanos(self.as_nanos() * rhs as i128)
    }
}

impl fmt::Debug for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.secs, self.nanos)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
