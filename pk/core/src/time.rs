//! Time management types: tick counts, kernel clock instants and tick rates

use core::fmt;

/// Relative duration in kernel clock ticks.
///
/// Sixteen bits, matching the width of the kernel's tick counter.
pub type Ticks = u16;

/// Value of the kernel tick counter at some point in time.
///
/// The counter wraps; comparisons use wrapping arithmetic so that a
/// drift-free periodic loop (`next += period; sleep(next - now)`) keeps
/// working across the wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tick(u16);

impl Tick {
    /// Counter value right after setup
    pub const ZERO: Self = Self(0);

    /// Furthest distance ahead that still compares as later; anything beyond
    /// wraps round to the past half of the counter
    pub const HORIZON: Ticks = u16::MAX / 2 - 1;

    /// Create a tick value from a raw counter
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Get the raw counter value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Advance the counter by one tick, wrapping
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// The instant `ticks` after this one
    pub const fn plus(self, ticks: Ticks) -> Self {
        Self(self.0.wrapping_add(ticks))
    }

    /// Ticks elapsed since `earlier`
    pub const fn elapsed_since(self, earlier: Tick) -> Ticks {
        self.0.wrapping_sub(earlier.0)
    }

    /// Ticks from `self` until `later`, or zero when `later` has passed
    pub fn until(self, later: Tick) -> Ticks {
        if later.is_after(self) {
            later.0.wrapping_sub(self.0)
        } else {
            0
        }
    }

    /// Check if this tick is strictly after another one (handles wraparound)
    pub fn is_after(self, other: Tick) -> bool {
        let diff = self.0.wrapping_sub(other.0);
        diff != 0 && diff <= Self::HORIZON
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}

/// Supported kernel clock frequencies.
///
/// Only powers of two are offered so that a 32 kHz watch crystal or a
/// prescaled system clock can drive the tick exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickRate {
    Hz1,
    Hz2,
    Hz4,
    Hz8,
    Hz16,
    Hz32,
    Hz64,
    Hz128,
    Hz256,
    Hz512,
    #[default]
    Hz1024,
}

impl TickRate {
    /// Number of kernel ticks per second
    pub const fn ticks_per_second(self) -> Ticks {
        match self {
            Self::Hz1 => 1,
            Self::Hz2 => 2,
            Self::Hz4 => 4,
            Self::Hz8 => 8,
            Self::Hz16 => 16,
            Self::Hz32 => 32,
            Self::Hz64 => 64,
            Self::Hz128 => 128,
            Self::Hz256 => 256,
            Self::Hz512 => 512,
            Self::Hz1024 => 1024,
        }
    }

    /// Tick count for a whole number of seconds, saturating at the counter width
    pub const fn secs(self, secs: u16) -> Ticks {
        let ticks = secs as u32 * self.ticks_per_second() as u32;
        if ticks > u16::MAX as u32 {
            u16::MAX
        } else {
            ticks as u16
        }
    }

    /// Tick count for a duration in milliseconds, rounded up so sleeps are never short
    pub const fn millis(self, millis: u32) -> Ticks {
        let ticks = (millis as u64 * self.ticks_per_second() as u64).div_ceil(1000);
        if ticks > u16::MAX as u64 {
            u16::MAX
        } else {
            ticks as u16
        }
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.ticks_per_second())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickRate {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}Hz", self.ticks_per_second());
    }
}

/// Macro to create tick counts from a rate and a duration
#[macro_export]
macro_rules! ticks {
    ($rate:expr, $value:literal s) => {
        $rate.secs($value)
    };
    ($rate:expr, $value:literal ms) => {
        $rate.millis($value)
    };
}
