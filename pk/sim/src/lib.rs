//! Host-side simulator for the pk kernel.
//!
//! The kernel itself is target independent; this crate supplies a [`SimPort`]
//! that records what would have happened on the hardware and a
//! [`Simulator`] that drives threads and interrupts in virtual time. Runs are
//! fully deterministic, which makes it the place for scenario tests,
//! demos and benchmarks.
//!
//! ```
//! use pk_sim::{SimKernel, Simulator};
//! use pk_sim::pk_kernel::{priority, KernelConfig, ThreadConfig};
//!
//! let mut sim: Simulator<'_, 2, 1> = Simulator::new(KernelConfig::DEFAULT);
//! sim.spawn(ThreadConfig::new("idle-ish", priority!(1)), |k: &SimKernel<2, 1>| {
//!     let _ = k.suspend_self();
//! })
//! .unwrap();
//! sim.start().unwrap();
//! sim.run_for(10).unwrap();
//! assert_eq!(sim.elapsed_ticks(), 10);
//! ```

mod harness;
mod port;

pub use harness::{SimError, SimKernel, Simulator, SETTLE_LIMIT};
pub use port::{SimPort, SimStats};

pub use pk_kernel;
