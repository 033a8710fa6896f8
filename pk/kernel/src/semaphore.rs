//! Counting semaphores and the mutex built on them

use pk_core::{PkError, PkResult, SemaphoreId};

use crate::list::PrioList;

pub(crate) struct SemaphoreRecord {
    pub(crate) name: &'static str,
    pub(crate) count: u16,
    pub(crate) waiters: PrioList,
}

impl SemaphoreRecord {
    pub(crate) const fn new(name: &'static str, count: u16) -> Self {
        Self {
            name,
            count,
            waiters: PrioList::new(),
        }
    }
}

/// Snapshot of a semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreInfo {
    pub id: SemaphoreId,
    pub name: &'static str,
    pub count: u16,
    pub waiters: usize,
}

/// Semaphore operations offered by a kernel.
///
/// [`Mutex`] and [`BoundedQueue`](crate::BoundedQueue) are written against
/// this trait so they work with any kernel instance.
pub trait SemaphoreOps {
    /// Register a semaphore with an initial count
    fn semaphore(&self, name: &'static str, count: u16) -> PkResult<SemaphoreId>;

    /// P operation: take one unit or block until one is handed over
    fn acquire(&self, sem: SemaphoreId) -> nb::Result<(), PkError>;

    /// Take one unit if available, never blocks
    fn try_acquire(&self, sem: SemaphoreId) -> bool;

    /// V operation: hand the unit to the best waiter or bump the count
    fn release(&self, sem: SemaphoreId) -> PkResult<()>;
}

/// Mutual exclusion lock: a semaphore with an initial count of one.
///
/// Not recursive; entering twice from the same thread deadlocks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutex {
    sem: SemaphoreId,
}

impl Mutex {
    pub fn new<K: SemaphoreOps + ?Sized>(kernel: &K, name: &'static str) -> PkResult<Self> {
        Ok(Self {
            sem: kernel.semaphore(name, 1)?,
        })
    }

    pub fn enter<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> nb::Result<(), PkError> {
        kernel.acquire(self.sem)
    }

    pub fn try_enter<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> bool {
        kernel.try_acquire(self.sem)
    }

    pub fn exit<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> PkResult<()> {
        kernel.release(self.sem)
    }

    /// Underlying semaphore
    pub fn semaphore(&self) -> SemaphoreId {
        self.sem
    }
}
