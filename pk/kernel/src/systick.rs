//! SysTick reload arithmetic, kept free of register access so it can be
//! checked on the host.

use pk_core::{PkError, PkResult, TickRate};

/// Largest value the 24-bit SysTick reload register holds
pub const MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Reload value that makes a counter clocked at `clock_hz` wrap at `rate`.
///
/// The counter wraps after `reload + 1` cycles. Rates the register cannot
/// express, either too slow for 24 bits or faster than the clock, fail
/// with [`PkError::UnsupportedTickRate`].
pub const fn reload_for(clock_hz: u32, rate: TickRate) -> PkResult<u32> {
    let cycles = clock_hz / rate.ticks_per_second() as u32;
    if cycles < 2 || cycles - 1 > MAX_RELOAD {
        return Err(PkError::UnsupportedTickRate);
    }
    Ok(cycles - 1)
}
