//! Scoped interrupt masking.
//!
//! [`InterruptGuard`] masks interrupts on creation and restores the state
//! that was in effect before it, not unconditionally "enabled", when it is
//! dropped. That makes nested guards and early returns safe.

use core::marker::PhantomData;

use critical_section::{CriticalSection, RestoreState};

/// RAII critical section
pub struct InterruptGuard {
    state: RestoreState,
    _not_send: PhantomData<*mut ()>,
}

impl InterruptGuard {
    /// Mask interrupts until the guard is dropped.
    ///
    /// # Safety
    ///
    /// Guards must be dropped in the reverse order of their creation and
    /// must not be leaked with `mem::forget`.
    pub unsafe fn new() -> Self {
        Self {
            state: critical_section::acquire(),
            _not_send: PhantomData,
        }
    }

    /// Token proving interrupts are masked for the guard's lifetime
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: the token cannot outlive the guard that masks interrupts
        unsafe { CriticalSection::new() }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        // SAFETY: `state` came from the matching `acquire` in `new`
        unsafe { critical_section::release(self.state) }
    }
}

/// Run `f` with interrupts masked
pub fn free<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
    // SAFETY: the guard lives exactly as long as this call
    let guard = unsafe { InterruptGuard::new() };
    f(guard.token())
}
