//! Stable handles into the kernel's fixed-size arenas

use core::fmt;

/// Thread identifier: index of the thread record in the kernel arena.
///
/// Handles are handed out in registration order and stay valid forever,
/// since threads are never destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u8);

impl ThreadId {
    /// Arena slot of this thread
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThreadId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Thread({})", self.0);
    }
}

/// Semaphore identifier: index of the semaphore record in the kernel arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemaphoreId(pub u8);

impl SemaphoreId {
    /// Arena slot of this semaphore
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SemaphoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semaphore({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SemaphoreId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Semaphore({})", self.0);
    }
}
