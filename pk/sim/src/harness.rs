//! Deterministic virtual-time driver.
//!
//! Time advances in two ways: after every `steps_per_tick` thread steps, and
//! whenever the dispatcher finds nothing to run (the CPU would sleep until
//! the next tick interrupt anyway).

use pk_kernel::{
    Activity, Kernel, KernelConfig, PkError, PkResult, ThreadBody, ThreadConfig, ThreadId,
    ThreadTable, Tick, Ticks,
};
use thiserror::Error;

use crate::port::{SimPort, SimStats};

/// Kernel type driven by the simulator
pub type SimKernel<const THREADS: usize, const SEMAPHORES: usize> = Kernel<SimPort, THREADS, SEMAPHORES>;

/// Steps allowed in [`Simulator::settle`] before giving up
pub const SETTLE_LIMIT: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("kernel error: {0}")]
    Kernel(#[from] PkError),
    #[error("{0} was registered outside the simulator")]
    ThreadOutOfOrder(ThreadId),
    #[error("interrupt period must be at least one tick")]
    InvalidPeriod,
    #[error("no idle point reached after {0} steps")]
    Stalled(u64),
}

struct Bodies<'a, K> {
    bodies: Vec<Box<dyn ThreadBody<K> + 'a>>,
}

impl<'a, K> ThreadTable<K> for Bodies<'a, K> {
    fn step(&mut self, id: ThreadId, kernel: &K) -> PkResult<()> {
        let body = self.bodies.get_mut(id.index()).ok_or(PkError::MissingThreadBody)?;
        (**body).step(kernel);
        Ok(())
    }
}

struct PeriodicIsr<'a, K> {
    period: Ticks,
    remaining: Ticks,
    handler: Box<dyn FnMut(&K) + 'a>,
}

/// Owns a kernel, its thread bodies and the simulated interrupt sources.
pub struct Simulator<'a, const THREADS: usize, const SEMAPHORES: usize> {
    kernel: SimKernel<THREADS, SEMAPHORES>,
    bodies: Bodies<'a, SimKernel<THREADS, SEMAPHORES>>,
    interrupts: Vec<PeriodicIsr<'a, SimKernel<THREADS, SEMAPHORES>>>,
    steps_per_tick: u32,
    steps_since_tick: u32,
    elapsed: u64,
    steps: u64,
}

impl<'a, const THREADS: usize, const SEMAPHORES: usize> Simulator<'a, THREADS, SEMAPHORES> {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            kernel: Kernel::new(SimPort::new(), config),
            bodies: Bodies { bodies: Vec::new() },
            interrupts: Vec::new(),
            steps_per_tick: 1,
            steps_since_tick: 0,
            elapsed: 0,
            steps: 0,
        }
    }

    /// Number of thread steps that make up one tick period (at least one)
    pub fn with_steps_per_tick(mut self, steps: u32) -> Self {
        self.steps_per_tick = steps.max(1);
        self
    }

    pub fn kernel(&self) -> &SimKernel<THREADS, SEMAPHORES> {
        &self.kernel
    }

    pub fn port(&self) -> &SimPort {
        self.kernel.port()
    }

    pub fn stats(&self) -> SimStats {
        self.kernel.port().stats()
    }

    /// Ticks fired since the simulator was created
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed
    }

    /// Dispatcher iterations run so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn now(&self) -> Tick {
        self.kernel.now()
    }

    /// Register a thread together with its body
    pub fn spawn<B>(&mut self, config: ThreadConfig, body: B) -> Result<ThreadId, SimError>
    where
        B: ThreadBody<SimKernel<THREADS, SEMAPHORES>> + 'a,
    {
        let id = self.kernel.spawn(config)?;
        if id.index() != self.bodies.bodies.len() {
            return Err(SimError::ThreadOutOfOrder(id));
        }
        self.bodies.bodies.push(Box::new(body));
        Ok(id)
    }

    /// Fire `handler` as an interrupt every `period` ticks, right after the
    /// tick interrupt
    pub fn every<F>(&mut self, period: Ticks, handler: F) -> Result<(), SimError>
    where
        F: FnMut(&SimKernel<THREADS, SEMAPHORES>) + 'a,
    {
        if period == 0 {
            return Err(SimError::InvalidPeriod);
        }
        self.interrupts.push(PeriodicIsr {
            period,
            remaining: period,
            handler: Box::new(handler),
        });
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), SimError> {
        self.kernel.setup()?;
        Ok(())
    }

    /// Raise a one-off interrupt now
    pub fn interrupt<R>(&self, body: impl FnOnce(&SimKernel<THREADS, SEMAPHORES>) -> R) -> R {
        self.kernel.run_isr(body)
    }

    /// One dispatcher iteration, followed by a tick when the period is over
    /// or the CPU went idle
    pub fn step(&mut self) -> Result<Activity, SimError> {
        let activity = self.kernel.run_once(&mut self.bodies)?;
        self.steps += 1;
        match activity {
            Activity::Stepped(_) => {
                self.steps_since_tick += 1;
                if self.steps_since_tick >= self.steps_per_tick {
                    self.fire_tick();
                }
            }
            Activity::Idle => self.fire_tick(),
        }
        Ok(activity)
    }

    /// Run until `ticks` more ticks have fired
    pub fn run_for(&mut self, ticks: u64) -> Result<(), SimError> {
        let target = self.elapsed + ticks;
        while self.elapsed < target {
            self.step()?;
        }
        Ok(())
    }

    /// Let every runnable thread run, without advancing time, until the
    /// dispatcher has nothing left to do
    pub fn settle(&mut self) -> Result<(), SimError> {
        for _ in 0..SETTLE_LIMIT {
            let activity = self.kernel.run_once(&mut self.bodies)?;
            self.steps += 1;
            if activity == Activity::Idle {
                return Ok(());
            }
        }
        Err(SimError::Stalled(SETTLE_LIMIT))
    }

    fn fire_tick(&mut self) {
        self.steps_since_tick = 0;
        self.kernel.run_isr(|k| k.tick());
        self.elapsed += 1;

        for isr in &mut self.interrupts {
            isr.remaining -= 1;
            if isr.remaining == 0 {
                isr.remaining = isr.period;
                self.kernel.run_isr(|k| (isr.handler)(k));
            }
        }
    }
}
