//! Kernel front end: registration, thread operations, interrupt trampoline,
//! dispatcher and idle handling.

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex as CsMutex;
use heapless::Vec;
use pk_core::{PkError, PkResult, SemaphoreId, ThreadId, Tick, Ticks};

use crate::config::KernelConfig;
use crate::interrupt;
use crate::port::{Port, SleepMode};
use crate::sched::{Dispatch, SchedStatus, Scheduler};
use crate::semaphore::{Mutex, SemaphoreInfo, SemaphoreOps};
use crate::thread::{ThreadConfig, ThreadInfo, ThreadState, ThreadTable};

/// What a dispatcher iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// The given thread ran one step
    Stepped(ThreadId),
    /// Nothing was runnable; the idle handler ran
    Idle,
}

/// The PK kernel.
///
/// `THREADS` and `SEMAPHORES` size the fixed arenas. A kernel is normally a
/// `static`, built with the `const fn` [`Kernel::new`], and shared by the
/// dispatcher and the interrupt handlers.
pub struct Kernel<P: Port, const THREADS: usize, const SEMAPHORES: usize> {
    port: P,
    config: KernelConfig,
    sched: CsMutex<RefCell<Scheduler<THREADS, SEMAPHORES>>>,
}

impl<P: Port, const THREADS: usize, const SEMAPHORES: usize> Kernel<P, THREADS, SEMAPHORES> {
    pub const fn new(port: P, config: KernelConfig) -> Self {
        let quota = config.time_slice_quota;
        let trace = config.trace;
        Self {
            port,
            config,
            sched: CsMutex::new(RefCell::new(Scheduler::new(quota, trace))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Scheduler<THREADS, SEMAPHORES>) -> R) -> R {
        interrupt::free(|cs| f(&mut self.sched.borrow_ref_mut(cs)))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    // ---- registration -------------------------------------------------

    /// Register a thread. Threads with a non-zero run count are runnable
    /// right away; the highest priority one runs first once the dispatcher
    /// starts.
    pub fn spawn(&self, config: ThreadConfig) -> PkResult<ThreadId> {
        self.with(|s| s.spawn(&config))
    }

    pub fn semaphore(&self, name: &'static str, count: u16) -> PkResult<SemaphoreId> {
        self.with(|s| s.add_semaphore(name, count))
    }

    pub fn mutex(&self, name: &'static str) -> PkResult<Mutex> {
        Mutex::new(self, name)
    }

    /// Bring up the hardware: clocks, power reduction, the periodic tick and
    /// global interrupts. Must run once, before the dispatcher.
    pub fn setup(&self) -> PkResult<()> {
        if self.with(|s| s.started()) {
            return Err(PkError::AlreadyStarted);
        }
        self.port.setup(self.config.tick_rate)?;
        self.with(|s| s.start())?;
        log::debug!(
            "kernel {} started, tick {} quota {}",
            self.config.name,
            self.config.tick_rate,
            self.config.time_slice_quota
        );
        Ok(())
    }

    // ---- thread operations --------------------------------------------

    /// Decrement the caller's run count; at zero the caller leaves the run
    /// queue until resumed.
    pub fn suspend_self(&self) -> nb::Result<(), PkError> {
        self.with(|s| s.suspend_self())
    }

    /// Increment a thread's run count; at one it rejoins the run queue.
    /// Callable from interrupt handlers.
    pub fn resume(&self, thread: ThreadId) -> PkResult<()> {
        self.with(|s| s.resume(thread))
    }

    /// Take the caller off the run queue for `ticks` ticks. Zero returns
    /// immediately.
    pub fn sleep(&self, ticks: Ticks) -> nb::Result<(), PkError> {
        self.with(|s| s.sleep(ticks))
    }

    /// Sleep until the tick counter reaches `deadline`; returns at once if
    /// it already has.
    ///
    /// The counter wraps, so a deadline more than [`Tick::HORIZON`] ticks
    /// ahead of [`now`](Self::now) reads as already passed and the call
    /// returns `Ok` without sleeping. Use [`sleep`](Self::sleep) for longer
    /// delays.
    pub fn sleep_until(&self, deadline: Tick) -> nb::Result<(), PkError> {
        self.with(|s| {
            let ticks = s.now().until(deadline);
            s.sleep(ticks)
        })
    }

    pub fn acquire(&self, sem: SemaphoreId) -> nb::Result<(), PkError> {
        self.with(|s| s.acquire(sem))
    }

    pub fn try_acquire(&self, sem: SemaphoreId) -> bool {
        self.with(|s| s.try_acquire(sem))
    }

    /// Callable from interrupt handlers.
    pub fn release(&self, sem: SemaphoreId) -> PkResult<()> {
        self.with(|s| s.release(sem))
    }

    // ---- time ---------------------------------------------------------

    /// Current value of the tick counter
    pub fn now(&self) -> Tick {
        self.with(|s| s.now())
    }

    /// Timer interrupt body: advance time, wake due sleepers and charge the
    /// running thread's quota. Call it through [`Kernel::run_isr`].
    pub fn tick(&self) {
        self.with(|s| s.tick())
    }

    // ---- interrupts ---------------------------------------------------

    /// Run an interrupt handler body.
    ///
    /// The scheduler is locked while `body` runs, so threads it readies do
    /// not displace the running thread until the handler exits. On exit the
    /// pending switch is flagged for the dispatcher and any armed sleep is
    /// cancelled.
    pub fn run_isr<R>(&self, body: impl FnOnce(&Self) -> R) -> R {
        let status = self.with(|s| s.lock());
        let result = body(self);
        self.with(|s| {
            s.unlock(status);
            s.reschedule();
        });
        self.port.disarm_sleep();
        result
    }

    /// Lock the scheduler for a hand-written interrupt handler
    pub fn isr_lock(&self) -> SchedStatus {
        self.with(|s| s.lock())
    }

    /// Undo [`Kernel::isr_lock`]; nested locks restore in reverse order
    pub fn isr_unlock(&self, status: SchedStatus) {
        self.with(|s| {
            s.unlock(status);
            s.reschedule();
        });
    }

    pub fn is_scheduler_locked(&self) -> bool {
        self.with(|s| s.is_locked())
    }

    /// True when a thread other than the current one heads the run queue
    pub fn switch_pending(&self) -> bool {
        self.with(|s| s.switch_pending())
    }

    // ---- power --------------------------------------------------------

    /// Keep the CPU out of power-save (for example while a UART is
    /// transmitting). Returns the previous setting.
    pub fn sleep_prevent(&self, prevent: bool) -> bool {
        self.with(|s| s.set_sleep_prevent(prevent))
    }

    /// Idle handler: run the idle hook, then sleep until the next interrupt
    /// if the run queue is still empty.
    pub fn idle(&self) {
        if let Some(callback) = self.config.idle_callback {
            callback();
        }

        let armed = self.with(|s| {
            if !s.run_queue_empty() {
                return false;
            }
            let mode = if !s.sleep_prevented() && self.port.peripherals_idle() {
                SleepMode::PowerSave
            } else {
                SleepMode::Idle
            };
            self.port.arm_sleep(mode);
            true
        });

        // An interrupt between arming and here disarms; the sleep is then a no-op
        if armed {
            self.port.wait_for_interrupt();
        }
    }

    // ---- dispatcher ---------------------------------------------------

    /// Make the run-queue head the current thread. Returns `None` when
    /// nothing is runnable.
    pub fn dispatch(&self) -> Option<ThreadId> {
        match self.with(|s| s.dispatch()) {
            Dispatch::Continue(id) => Some(id),
            Dispatch::Switch { from, to } => {
                self.port.switch_context(from, to);
                Some(to)
            }
            Dispatch::Idle => None,
        }
    }

    /// One dispatcher iteration: step the highest-priority runnable thread,
    /// or idle.
    pub fn run_once<T>(&self, threads: &mut T) -> PkResult<Activity>
    where
        T: ThreadTable<Self> + ?Sized,
    {
        if !self.with(|s| s.started()) {
            return Err(PkError::NotStarted);
        }
        match self.dispatch() {
            Some(id) => {
                threads.step(id, self)?;
                Ok(Activity::Stepped(id))
            }
            None => {
                self.idle();
                Ok(Activity::Idle)
            }
        }
    }

    /// Run the dispatcher forever. Returns only on a configuration error.
    pub fn run<T>(&self, threads: &mut T) -> Result<Infallible, PkError>
    where
        T: ThreadTable<Self> + ?Sized,
    {
        loop {
            if let Err(error) = self.run_once(threads) {
                log::error!("kernel {} stopped: {}", self.config.name, error);
                return Err(error);
            }
        }
    }

    // ---- introspection ------------------------------------------------

    /// Thread last handed the CPU
    pub fn current(&self) -> Option<ThreadId> {
        self.with(|s| s.current())
    }

    pub fn thread_count(&self) -> usize {
        self.with(|s| s.thread_count())
    }

    pub fn thread_state(&self, thread: ThreadId) -> PkResult<ThreadState> {
        self.with(|s| s.thread_state(thread))
    }

    pub fn thread_info(&self, thread: ThreadId) -> PkResult<ThreadInfo> {
        self.with(|s| s.thread_info(thread))
    }

    pub fn semaphore_info(&self, sem: SemaphoreId) -> PkResult<SemaphoreInfo> {
        self.with(|s| s.semaphore_info(sem))
    }

    /// Threads blocked on `sem`, best first
    pub fn waiters(&self, sem: SemaphoreId) -> PkResult<Vec<ThreadId, THREADS>> {
        self.with(|s| s.waiters(sem))
    }

    /// Runnable threads in dispatch order
    pub fn run_queue(&self) -> Vec<ThreadId, THREADS> {
        self.with(|s| s.run_queue())
    }

    /// Sleeping threads in wake order, with ticks left until each wakes
    pub fn sleep_queue(&self) -> Vec<(ThreadId, Ticks), THREADS> {
        self.with(|s| s.sleep_queue())
    }
}

impl<P: Port, const THREADS: usize, const SEMAPHORES: usize> SemaphoreOps
    for Kernel<P, THREADS, SEMAPHORES>
{
    fn semaphore(&self, name: &'static str, count: u16) -> PkResult<SemaphoreId> {
        Kernel::semaphore(self, name, count)
    }

    fn acquire(&self, sem: SemaphoreId) -> nb::Result<(), PkError> {
        Kernel::acquire(self, sem)
    }

    fn try_acquire(&self, sem: SemaphoreId) -> bool {
        Kernel::try_acquire(self, sem)
    }

    fn release(&self, sem: SemaphoreId) -> PkResult<()> {
        Kernel::release(self, sem)
    }
}
