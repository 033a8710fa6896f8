//! Thread records, registration parameters and body traits

use pk_core::{PkError, PkResult, Priority, SemaphoreId, ThreadId, Ticks};

/// Stack reservation used when none is given; enough for a leaf thread on
/// small 8-bit parts.
pub const DEFAULT_STACK_SIZE: usize = 80;

/// Registration parameters for a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadConfig {
    pub name: &'static str,
    /// Stack reservation in bytes, reported for diagnostics
    pub stack_size: usize,
    pub priority: Priority,
    /// Initial run count; zero registers the thread suspended
    pub run_count: u8,
}

impl ThreadConfig {
    pub const fn new(name: &'static str, priority: Priority) -> Self {
        Self {
            name,
            stack_size: DEFAULT_STACK_SIZE,
            priority,
            run_count: 1,
        }
    }

    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub const fn with_run_count(mut self, run_count: u8) -> Self {
        self.run_count = run_count;
        self
    }

    /// Shorthand for a thread that starts suspended
    pub const fn suspended(self) -> Self {
        self.with_run_count(0)
    }
}

/// Which kernel list currently owns a thread's link field.
///
/// A thread is in at most one list at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Detached,
    Run,
    Sleep,
    Wait(SemaphoreId),
}

/// Why a thread was put back on the run queue after blocking.
///
/// Recorded on wake and consumed by the repeated blocking call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Handoff(SemaphoreId),
    Timer,
    Resumed,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ThreadRecord {
    pub(crate) name: &'static str,
    pub(crate) stack_size: usize,
    pub(crate) priority: Priority,
    pub(crate) run_count: i8,
    /// Remaining quota while runnable, delta to predecessor while sleeping
    pub(crate) ticks: Ticks,
    pub(crate) link: Link,
    pub(crate) next: Option<ThreadId>,
    pub(crate) wake: Option<Wake>,
    /// Set while the thread is parked in `suspend_self`
    pub(crate) parked: bool,
}

impl ThreadRecord {
    pub(crate) fn new(config: &ThreadConfig, quota: Ticks) -> PkResult<Self> {
        if !config.priority.is_valid() {
            return Err(PkError::InvalidPriority);
        }
        let run_count = i8::try_from(config.run_count).map_err(|_| PkError::RunCountOverflow)?;
        Ok(Self {
            name: config.name,
            stack_size: config.stack_size,
            priority: config.priority,
            run_count,
            ticks: quota,
            link: Link::Detached,
            next: None,
            wake: None,
            parked: false,
        })
    }
}

/// Scheduling state of a thread as seen from outside the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Last dispatched and still runnable; stays so until the next dispatch
    /// even if a higher priority thread was readied meanwhile
    Running,
    /// Waiting in the run queue
    Runnable,
    /// In the sleep queue
    Sleeping,
    /// Waiting on a semaphore
    Blocked(SemaphoreId),
    /// In no queue: run count dropped to zero
    Suspended,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThreadState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ThreadState::Running => defmt::write!(fmt, "Running"),
            ThreadState::Runnable => defmt::write!(fmt, "Runnable"),
            ThreadState::Sleeping => defmt::write!(fmt, "Sleeping"),
            ThreadState::Blocked(sem) => defmt::write!(fmt, "Blocked({})", sem),
            ThreadState::Suspended => defmt::write!(fmt, "Suspended"),
        }
    }
}

/// Snapshot of a thread record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: &'static str,
    pub stack_size: usize,
    pub priority: Priority,
    pub run_count: i8,
    pub state: ThreadState,
}

/// Body of a kernel thread.
///
/// `step` runs the thread until it either blocks (a kernel call returned
/// `WouldBlock`) or reaches a natural yield point. The dispatcher calls it
/// again whenever the thread is at the head of the run queue.
pub trait ThreadBody<K: ?Sized> {
    fn step(&mut self, kernel: &K);
}

impl<K: ?Sized, F> ThreadBody<K> for F
where
    F: FnMut(&K),
{
    fn step(&mut self, kernel: &K) {
        self(kernel)
    }
}

/// Lookup from thread identifier to thread body, used by the dispatcher.
pub trait ThreadTable<K: ?Sized> {
    fn step(&mut self, id: ThreadId, kernel: &K) -> PkResult<()>;
}

impl<'a, K: ?Sized> ThreadTable<K> for [&'a mut dyn ThreadBody<K>] {
    fn step(&mut self, id: ThreadId, kernel: &K) -> PkResult<()> {
        let body = self.get_mut(id.index()).ok_or(PkError::MissingThreadBody)?;
        body.step(kernel);
        Ok(())
    }
}

impl<'a, K: ?Sized, const N: usize> ThreadTable<K> for [&'a mut dyn ThreadBody<K>; N] {
    fn step(&mut self, id: ThreadId, kernel: &K) -> PkResult<()> {
        self.as_mut_slice().step(id, kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_core::priority;

    #[test]
    fn record_rejects_invalid_priority() {
        let config = ThreadConfig::new("bad", Priority::new_unchecked(251));
        assert_eq!(ThreadRecord::new(&config, 4).err(), Some(PkError::InvalidPriority));
    }

    #[test]
    fn record_rejects_oversized_run_count() {
        let config = ThreadConfig::new("big", priority!(1)).with_run_count(200);
        assert_eq!(ThreadRecord::new(&config, 4).err(), Some(PkError::RunCountOverflow));
    }

    #[test]
    fn fresh_record_is_detached_with_full_quota() {
        let config = ThreadConfig::new("t", priority!(3)).with_stack_size(128);
        let record = ThreadRecord::new(&config, 4).expect("valid config");
        assert_eq!(record.link, Link::Detached);
        assert_eq!(record.ticks, 4);
        assert_eq!(record.stack_size, 128);
        assert_eq!(record.run_count, 1);
    }

    #[test]
    fn table_reports_missing_body() {
        let mut calls = 0u32;
        let mut body = |_: &()| calls += 1;
        let mut table: [&mut dyn ThreadBody<()>; 1] = [&mut body];

        assert!(table.step(ThreadId(0), &()).is_ok());
        assert_eq!(table.step(ThreadId(1), &()), Err(PkError::MissingThreadBody));
        drop(table);
        assert_eq!(calls, 1);
    }
}
