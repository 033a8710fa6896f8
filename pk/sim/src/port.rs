//! Host port: records what the kernel asks of the hardware.

use std::cell::Cell;

use pk_kernel::{PkResult, Port, SleepMode, ThreadId, TickRate};

/// Counters collected by [`SimPort`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
    /// Dispatcher hand-overs between different threads
    pub switches: u64,
    /// Sleeps entered in power-save mode
    pub power_save_sleeps: u64,
    /// Sleeps entered in idle mode
    pub idle_sleeps: u64,
    /// Sleeps skipped because an interrupt disarmed them first
    pub cancelled_sleeps: u64,
}

/// Port for running the kernel on a development host.
///
/// There is no real timer: the [`Simulator`](crate::Simulator) decides when
/// a tick interrupt happens. Sleeping returns immediately and is only counted.
#[derive(Debug, Default)]
pub struct SimPort {
    tick_rate: Cell<Option<TickRate>>,
    peripherals_busy: Cell<bool>,
    armed: Cell<Option<SleepMode>>,
    last_switch: Cell<Option<ThreadId>>,
    stats: Cell<SimStats>,
}

impl SimPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rate passed to `setup`, `None` before the kernel was set up
    pub fn tick_rate(&self) -> Option<TickRate> {
        self.tick_rate.get()
    }

    /// Pretend a peripheral needs its clock, ruling out power-save
    pub fn set_peripherals_busy(&self, busy: bool) {
        self.peripherals_busy.set(busy);
    }

    pub fn armed(&self) -> Option<SleepMode> {
        self.armed.get()
    }

    /// Thread most recently switched to
    pub fn last_switch(&self) -> Option<ThreadId> {
        self.last_switch.get()
    }

    pub fn stats(&self) -> SimStats {
        self.stats.get()
    }

    fn update(&self, f: impl FnOnce(&mut SimStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl Port for SimPort {
    fn setup(&self, rate: TickRate) -> PkResult<()> {
        log::debug!("sim port: tick at {}", rate);
        self.tick_rate.set(Some(rate));
        Ok(())
    }

    fn peripherals_idle(&self) -> bool {
        !self.peripherals_busy.get()
    }

    fn arm_sleep(&self, mode: SleepMode) {
        self.armed.set(Some(mode));
    }

    fn disarm_sleep(&self) {
        self.armed.set(None);
    }

    fn wait_for_interrupt(&self) {
        match self.armed.take() {
            Some(SleepMode::PowerSave) => self.update(|s| s.power_save_sleeps += 1),
            Some(SleepMode::Idle) => self.update(|s| s.idle_sleeps += 1),
            None => self.update(|s| s.cancelled_sleeps += 1),
        }
    }

    fn switch_context(&self, from: Option<ThreadId>, to: ThreadId) {
        log::trace!("sim port: switch {:?} -> {}", from, to);
        self.last_switch.set(Some(to));
        self.update(|s| s.switches += 1);
    }
}
