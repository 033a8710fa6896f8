#![no_std]
#![forbid(unsafe_code)]

//! # PK Core
//!
//! Core types shared by the PK microkernel and its ports: priorities,
//! thread and semaphore handles, tick arithmetic and the kernel error type.
//! Nothing in this crate allocates or touches hardware.

use core::fmt;

pub mod ids;
pub mod priorities;
pub mod time;

pub use ids::*;
pub use priorities::*;
pub use time::*;

/// PK kernel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the kernel
pub type PkResult<T> = Result<T, PkError>;

/// Error types for kernel operations
///
/// Each variant is a precondition checked at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkError {
    /// Priority above [`Priority::HIGHEST`]
    InvalidPriority,
    /// Thread arena is full
    TooManyThreads,
    /// Semaphore arena is full
    TooManySemaphores,
    /// Handle does not name a registered thread
    UnknownThread,
    /// Handle does not name a registered semaphore
    UnknownSemaphore,
    /// Suspend/resume imbalance exceeded the run counter range
    RunCountOverflow,
    /// Release would overflow the semaphore count
    SemaphoreOverflow,
    /// Blocking call made while an interrupt handler holds the scheduler lock
    BlockingInIsr,
    /// Blocking call made with no thread running
    NoCurrentThread,
    /// A blocking call was issued while a wake grant from a different call is pending
    UnclaimedWake,
    /// Thread body table does not cover every registered thread
    MissingThreadBody,
    /// `setup()` was called more than once
    AlreadyStarted,
    /// Threads were dispatched before `setup()`
    NotStarted,
    /// The port cannot generate the configured tick rate
    UnsupportedTickRate,
}

impl fmt::Display for PkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkError::InvalidPriority => write!(f, "Priority exceeds the highest supported level"),
            PkError::TooManyThreads => write!(f, "Thread arena is full"),
            PkError::TooManySemaphores => write!(f, "Semaphore arena is full"),
            PkError::UnknownThread => write!(f, "Unknown thread handle"),
            PkError::UnknownSemaphore => write!(f, "Unknown semaphore handle"),
            PkError::RunCountOverflow => write!(f, "Thread run count overflow"),
            PkError::SemaphoreOverflow => write!(f, "Semaphore count overflow"),
            PkError::BlockingInIsr => write!(f, "Blocking call inside an interrupt handler"),
            PkError::NoCurrentThread => write!(f, "Blocking call without a current thread"),
            PkError::UnclaimedWake => write!(f, "Pending wake grant belongs to another call"),
            PkError::MissingThreadBody => write!(f, "No body registered for a thread"),
            PkError::AlreadyStarted => write!(f, "Kernel already set up"),
            PkError::NotStarted => write!(f, "Kernel not set up"),
            PkError::UnsupportedTickRate => write!(f, "Tick rate not reachable from the port clock"),
        }
    }
}

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for PkError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PkError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PkError::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            PkError::TooManyThreads => defmt::write!(fmt, "TooManyThreads"),
            PkError::TooManySemaphores => defmt::write!(fmt, "TooManySemaphores"),
            PkError::UnknownThread => defmt::write!(fmt, "UnknownThread"),
            PkError::UnknownSemaphore => defmt::write!(fmt, "UnknownSemaphore"),
            PkError::RunCountOverflow => defmt::write!(fmt, "RunCountOverflow"),
            PkError::SemaphoreOverflow => defmt::write!(fmt, "SemaphoreOverflow"),
            PkError::BlockingInIsr => defmt::write!(fmt, "BlockingInIsr"),
            PkError::NoCurrentThread => defmt::write!(fmt, "NoCurrentThread"),
            PkError::UnclaimedWake => defmt::write!(fmt, "UnclaimedWake"),
            PkError::MissingThreadBody => defmt::write!(fmt, "MissingThreadBody"),
            PkError::AlreadyStarted => defmt::write!(fmt, "AlreadyStarted"),
            PkError::NotStarted => defmt::write!(fmt, "NotStarted"),
            PkError::UnsupportedTickRate => defmt::write!(fmt, "UnsupportedTickRate"),
        }
    }
}
