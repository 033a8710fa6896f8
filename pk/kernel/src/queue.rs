//! Bounded message queue built from two counting semaphores.
//!
//! The `put` semaphore counts free slots and the `get` semaphore counts
//! filled ones, so the ring itself never needs to check for full or empty.

use core::cell::RefCell;

use critical_section::Mutex as CsMutex;
use pk_core::{PkError, PkResult, SemaphoreId};

use crate::semaphore::SemaphoreOps;

struct Ring<T, const N: usize> {
    slots: [T; N],
    first: u8,
    last: u8,
}

impl<T: Copy, const N: usize> Ring<T, N> {
    const MASK: u8 = (N - 1) as u8;

    fn push(&mut self, value: T) {
        self.slots[(self.last & Self::MASK) as usize] = value;
        self.last = self.last.wrapping_add(1);
    }

    fn pop(&mut self) -> T {
        let value = self.slots[(self.first & Self::MASK) as usize];
        self.first = self.first.wrapping_add(1);
        value
    }

    fn len(&self) -> usize {
        self.last.wrapping_sub(self.first) as usize
    }
}

/// FIFO of `N` elements shared between threads and interrupt handlers.
///
/// `N` must be a power of two no larger than 128. Blocking `put` and `get`
/// follow the kernel's `nb` convention: on `WouldBlock`, return from the
/// thread step and call again with the same arguments once dispatched.
pub struct BoundedQueue<T: Copy, const N: usize> {
    name: &'static str,
    ring: CsMutex<RefCell<Ring<T, N>>>,
    put: SemaphoreId,
    get: SemaphoreId,
}

impl<T: Copy + Default, const N: usize> BoundedQueue<T, N> {
    const CAPACITY_OK: () = assert!(
        N.is_power_of_two() && N <= 128,
        "queue capacity must be a power of two no larger than 128"
    );

    /// Create a queue, registering its two semaphores with `kernel`.
    ///
    /// Both semaphores are registered under `name`; tell them apart with
    /// [`slots`](Self::slots) and [`items`](Self::items), or name them
    /// separately with [`with_names`](Self::with_names).
    pub fn new<K: SemaphoreOps + ?Sized>(kernel: &K, name: &'static str) -> PkResult<Self> {
        Self::with_names(kernel, name, name, name)
    }

    /// Create a queue whose free-slot and filled-slot semaphores carry their
    /// own names in semaphore snapshots and traces
    pub fn with_names<K: SemaphoreOps + ?Sized>(
        kernel: &K,
        name: &'static str,
        slots_name: &'static str,
        items_name: &'static str,
    ) -> PkResult<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        let put = kernel.semaphore(slots_name, N as u16)?;
        let get = kernel.semaphore(items_name, 0)?;
        log::debug!("queue {} holds {} elements", name, N);
        Ok(Self {
            name,
            ring: CsMutex::new(RefCell::new(Ring {
                slots: [T::default(); N],
                first: 0,
                last: 0,
            })),
            put,
            get,
        })
    }
}

impl<T: Copy, const N: usize> BoundedQueue<T, N> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Semaphore counting free slots; writers wait here
    pub fn slots(&self) -> SemaphoreId {
        self.put
    }

    /// Semaphore counting filled slots; readers wait here
    pub fn items(&self) -> SemaphoreId {
        self.get
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `value`, blocking while the queue is full
    pub fn put<K: SemaphoreOps + ?Sized>(&self, kernel: &K, value: T) -> nb::Result<(), PkError> {
        kernel.acquire(self.put)?;
        self.store(kernel, value).map_err(nb::Error::Other)
    }

    /// Append `value` if there is room; hands the value back otherwise.
    /// Safe to call from interrupt handlers.
    pub fn try_put<K: SemaphoreOps + ?Sized>(&self, kernel: &K, value: T) -> Result<(), T> {
        if !kernel.try_acquire(self.put) {
            return Err(value);
        }
        self.store(kernel, value).map_err(|_| value)
    }

    /// Remove the oldest element, blocking while the queue is empty
    pub fn get<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> nb::Result<T, PkError> {
        kernel.acquire(self.get)?;
        self.take(kernel).map_err(nb::Error::Other)
    }

    /// Remove the oldest element if any. Safe to call from interrupt handlers.
    pub fn try_get<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> Option<T> {
        if !kernel.try_acquire(self.get) {
            return None;
        }
        self.take(kernel).ok()
    }

    fn store<K: SemaphoreOps + ?Sized>(&self, kernel: &K, value: T) -> PkResult<()> {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).push(value));
        kernel.release(self.get)
    }

    fn take<K: SemaphoreOps + ?Sized>(&self, kernel: &K) -> PkResult<T> {
        let value = critical_section::with(|cs| self.ring.borrow_ref_mut(cs).pop());
        kernel.release(self.put)?;
        Ok(value)
    }
}
