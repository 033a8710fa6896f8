#![cfg_attr(not(test), no_std)]

//! PK - Preemptive Multithreading Microkernel
//!
//! A small priority-based kernel for microcontrollers with a few kilobytes
//! of RAM. Threads are registered once and live forever; the kernel never
//! allocates.
//!
//! Key features:
//! - Priority-ordered run queue with round-robin time slicing among equals
//! - Counting semaphores with direct hand-off to the best waiter
//! - Mutexes and bounded message queues built on semaphores
//! - Delta-encoded sleep queue driven by a periodic tick
//! - Interrupt trampoline that defers rescheduling to handler exit
//! - Idle handling with power-save versus idle selection
//!
//! # Threads
//!
//! A thread body is a step function ([`ThreadBody`]). The dispatcher
//! ([`Kernel::run`]) repeatedly steps the head of the run queue. A blocking
//! call ([`Kernel::acquire`], [`Kernel::sleep`], [`Kernel::suspend_self`])
//! returns [`nb::Error::WouldBlock`] after taking the thread off the run
//! queue; the body should return from its step and issue the same call again
//! once it is dispatched. The repeated call then completes immediately,
//! consuming the wake the kernel recorded for it.
//!
//! ```ignore
//! static KERNEL: Kernel<MyPort, 2, 1> = Kernel::new(MyPort::new(), KernelConfig::DEFAULT);
//!
//! #[exception]
//! fn SysTick() {
//!     KERNEL.run_isr(|k| k.tick());
//! }
//! ```

pub mod config;
pub mod interrupt;
pub mod kernel;
pub mod port;
pub mod queue;
pub mod semaphore;
pub mod systick;
pub mod thread;
pub mod trace;

mod list;
mod sched;
mod sleep;

#[cfg(all(feature = "cortex-m", target_arch = "arm"))]
pub mod cortex_m_port;

pub use config::{KernelConfig, KernelConfigBuilder, DEFAULT_TIME_SLICE_QUOTA};
pub use interrupt::InterruptGuard;
pub use kernel::{Activity, Kernel};
pub use pk_core::*;
pub use port::{Port, SleepMode};
pub use queue::BoundedQueue;
pub use sched::SchedStatus;
pub use semaphore::{Mutex, SemaphoreInfo, SemaphoreOps};
pub use thread::{ThreadBody, ThreadConfig, ThreadInfo, ThreadState, ThreadTable};
pub use trace::TraceHook;

#[cfg(test)]
mod test_port;
