//! Recording port used by the unit tests

use core::cell::{Cell, RefCell};

use pk_core::{PkResult, ThreadId, TickRate};

use crate::port::{Port, SleepMode};

#[derive(Default)]
pub(crate) struct TestPort {
    pub(crate) rate: Cell<Option<TickRate>>,
    pub(crate) busy: Cell<bool>,
    pub(crate) armed: Cell<Option<SleepMode>>,
    pub(crate) last_mode: Cell<Option<SleepMode>>,
    pub(crate) sleeps: Cell<u32>,
    pub(crate) switches: RefCell<Vec<(Option<ThreadId>, ThreadId)>>,
}

impl Port for TestPort {
    fn setup(&self, rate: TickRate) -> PkResult<()> {
        self.rate.set(Some(rate));
        Ok(())
    }

    fn peripherals_idle(&self) -> bool {
        !self.busy.get()
    }

    fn arm_sleep(&self, mode: SleepMode) {
        self.armed.set(Some(mode));
        self.last_mode.set(Some(mode));
    }

    fn disarm_sleep(&self) {
        self.armed.set(None);
    }

    fn wait_for_interrupt(&self) {
        if self.armed.take().is_some() {
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    fn switch_context(&self, from: Option<ThreadId>, to: ThreadId) {
        self.switches.borrow_mut().push((from, to));
    }
}
