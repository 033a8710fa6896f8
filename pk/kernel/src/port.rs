//! Hardware port interface.
//!
//! A port supplies everything target specific: the tick source, sleep
//! control and the context-switch hook. All methods take `&self`; ports keep
//! their own state in atomics or cells because they are shared between
//! thread and interrupt context.

use pk_core::{PkResult, ThreadId, TickRate};

/// CPU sleep depth selected by the idle handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Core halted, peripherals and clocks running
    Idle,
    /// Deepest mode that still wakes on the tick source
    PowerSave,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SleepMode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SleepMode::Idle => defmt::write!(fmt, "Idle"),
            SleepMode::PowerSave => defmt::write!(fmt, "PowerSave"),
        }
    }
}

pub trait Port {
    /// Configure clocks and power reduction, start the periodic tick at
    /// `rate` and enable interrupts.
    ///
    /// A port that cannot produce `rate` returns
    /// [`PkError::UnsupportedTickRate`](pk_core::PkError::UnsupportedTickRate)
    /// before touching the hardware.
    fn setup(&self, rate: TickRate) -> PkResult<()>;

    /// True when no peripheral needs the clocks that power-save stops
    fn peripherals_idle(&self) -> bool {
        true
    }

    /// Arm the sleep instruction. Called inside the kernel's critical section.
    fn arm_sleep(&self, mode: SleepMode);

    /// Cancel a previous `arm_sleep`; called on every interrupt exit
    fn disarm_sleep(&self);

    /// Execute the sleep instruction if still armed, then return
    fn wait_for_interrupt(&self);

    /// Hook run when the dispatcher hands the CPU to another thread
    fn switch_context(&self, _from: Option<ThreadId>, _to: ThreadId) {}
}
