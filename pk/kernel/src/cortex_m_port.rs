//! Cortex-M port: SysTick drives the kernel tick, WFI is the sleep instruction.
//!
//! The application forwards the SysTick exception to the kernel:
//!
//! ```ignore
//! #[exception]
//! fn SysTick() {
//!     KERNEL.run_isr(|k| k.tick());
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m::peripheral::syst::SystClkSource;
use pk_core::{PkResult, TickRate};

use crate::port::{Port, SleepMode};
use crate::systick;

pub struct CortexMPort {
    core_clock_hz: u32,
    deep_sleep: bool,
    armed: AtomicBool,
}

impl CortexMPort {
    pub const fn new(core_clock_hz: u32) -> Self {
        Self {
            core_clock_hz,
            deep_sleep: false,
            armed: AtomicBool::new(false),
        }
    }

    /// Use SLEEPDEEP for power-save. Only valid when the tick source keeps
    /// running in deep sleep.
    pub const fn with_deep_sleep(mut self, enabled: bool) -> Self {
        self.deep_sleep = enabled;
        self
    }
}

impl Port for CortexMPort {
    fn setup(&self, rate: TickRate) -> PkResult<()> {
        let reload = systick::reload_for(self.core_clock_hz, rate)?;

        // SAFETY: runs once from `Kernel::setup`, before interrupts are enabled
        let mut core = unsafe { cortex_m::Peripherals::steal() };
        core.SYST.set_clock_source(SystClkSource::Core);
        core.SYST.set_reload(reload);
        core.SYST.clear_current();
        core.SYST.enable_interrupt();
        core.SYST.enable_counter();

        // SAFETY: kernel state is initialised; handlers may run from here on
        unsafe { cortex_m::interrupt::enable() };
        Ok(())
    }

    fn arm_sleep(&self, mode: SleepMode) {
        // SAFETY: SCR is only written here, inside the kernel critical section
        let mut core = unsafe { cortex_m::Peripherals::steal() };
        if mode == SleepMode::PowerSave && self.deep_sleep {
            core.SCB.set_sleepdeep();
        } else {
            core.SCB.clear_sleepdeep();
        }
        self.armed.store(true, Ordering::Release);
    }

    fn disarm_sleep(&self) {
        self.armed.store(false, Ordering::Release);
    }

    fn wait_for_interrupt(&self) {
        // WFI with PRIMASK set still wakes on a pending interrupt, which then
        // runs as soon as the critical section ends.
        cortex_m::interrupt::free(|_| {
            if self.armed.load(Ordering::Acquire) {
                self.armed.store(false, Ordering::Release);
                cortex_m::asm::wfi();
            }
        });
    }
}
