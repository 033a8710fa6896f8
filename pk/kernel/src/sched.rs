//! Scheduler state and the algorithms operating on it.
//!
//! Everything here runs with the kernel's critical section held; the
//! [`Kernel`](crate::Kernel) front end takes the lock and calls in.

use heapless::Vec;
use pk_core::{PkError, PkResult, SemaphoreId, ThreadId, Tick, Ticks};

use crate::list::PrioList;
use crate::semaphore::{SemaphoreInfo, SemaphoreRecord};
use crate::sleep::SleepList;
use crate::thread::{Link, ThreadConfig, ThreadInfo, ThreadRecord, ThreadState, Wake};
use crate::trace::{self, records, TraceHook, NO_THREAD};

/// Result of taking the scheduler lock; hand it back to unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedStatus {
    /// Lock taken; carries the nesting depth to restore
    Locked(u8),
    /// Nothing to restore
    Unlocked,
}

impl SchedStatus {
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

/// Outcome of a dispatch decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Continue(ThreadId),
    Switch { from: Option<ThreadId>, to: ThreadId },
    Idle,
}

/// How a blocking call should proceed
enum Caller {
    Fresh(ThreadId),
    Granted,
}

pub(crate) struct Scheduler<const THREADS: usize, const SEMAPHORES: usize> {
    threads: Vec<ThreadRecord, THREADS>,
    semaphores: Vec<SemaphoreRecord, SEMAPHORES>,
    run_queue: PrioList,
    sleep_queue: SleepList,
    current: Option<ThreadId>,
    lock_depth: u8,
    switch_pending: bool,
    idle: bool,
    now: Tick,
    quota: Ticks,
    sleep_prevent: bool,
    started: bool,
    trace: Option<TraceHook>,
}

impl<const THREADS: usize, const SEMAPHORES: usize> Scheduler<THREADS, SEMAPHORES> {
    pub(crate) const fn new(quota: Ticks, trace: Option<TraceHook>) -> Self {
        Self {
            threads: Vec::new(),
            semaphores: Vec::new(),
            run_queue: PrioList::new(),
            sleep_queue: SleepList::new(),
            current: None,
            lock_depth: 0,
            switch_pending: false,
            idle: false,
            now: Tick::ZERO,
            quota,
            sleep_prevent: false,
            started: false,
            trace,
        }
    }

    fn emit(&self, record: u8, payload: &[u8]) {
        trace::emit(self.trace, record, payload);
    }

    // ---- registration -------------------------------------------------

    pub(crate) fn spawn(&mut self, config: &ThreadConfig) -> PkResult<ThreadId> {
        let record = ThreadRecord::new(config, self.quota)?;
        if self.threads.len() >= NO_THREAD as usize {
            return Err(PkError::TooManyThreads);
        }
        let id = ThreadId(self.threads.len() as u8);
        self.threads.push(record).map_err(|_| PkError::TooManyThreads)?;

        if record.run_count > 0 {
            self.run_queue.enqueue(&mut self.threads, id, Link::Run);
            self.reschedule();
        }
        self.emit(records::thread::SPAWN, &[id.0, config.priority.raw()]);
        log::debug!(
            "spawned thread {} as {} at {}, run count {}",
            config.name,
            id,
            config.priority,
            config.run_count
        );
        Ok(id)
    }

    pub(crate) fn add_semaphore(&mut self, name: &'static str, count: u16) -> PkResult<SemaphoreId> {
        let id = u8::try_from(self.semaphores.len())
            .map(SemaphoreId)
            .map_err(|_| PkError::TooManySemaphores)?;
        self.semaphores
            .push(SemaphoreRecord::new(name, count))
            .map_err(|_| PkError::TooManySemaphores)?;
        log::debug!("registered semaphore {} as {} with count {}", name, id, count);
        Ok(id)
    }

    pub(crate) fn start(&mut self) -> PkResult<()> {
        if self.started {
            return Err(PkError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    pub(crate) fn started(&self) -> bool {
        self.started
    }

    // ---- run queue ----------------------------------------------------

    /// Put a thread on the run queue with a fresh quota
    fn make_ready(&mut self, id: ThreadId, wake: Option<Wake>) {
        let record = &mut self.threads[id.index()];
        record.ticks = self.quota;
        record.wake = wake;
        self.run_queue.enqueue(&mut self.threads, id, Link::Run);
        self.reschedule();
    }

    /// Flag a pending switch when the head differs from the running thread.
    /// Suppressed while the scheduler is locked.
    pub(crate) fn reschedule(&mut self) -> bool {
        if self.lock_depth == 0 {
            if let Some(head) = self.run_queue.head() {
                if self.current != Some(head) {
                    self.switch_pending = true;
                }
            }
        }
        self.switch_pending
    }

    pub(crate) fn dispatch(&mut self) -> Dispatch {
        self.switch_pending = false;

        if self.lock_depth > 0 {
            if let Some(current) = self.current {
                if self.threads[current.index()].link == Link::Run {
                    return Dispatch::Continue(current);
                }
            }
        }

        match self.run_queue.head() {
            Some(head) if self.current == Some(head) => {
                self.idle = false;
                Dispatch::Continue(head)
            }
            Some(head) => {
                self.idle = false;
                let from = self.current.replace(head);
                self.emit(records::sched::NEXT, &[head.0, from.map_or(NO_THREAD, |f| f.0)]);
                log::trace!("switch {:?} -> {}", from, head);
                Dispatch::Switch { from, to: head }
            }
            None => {
                if !self.idle {
                    self.idle = true;
                    self.emit(records::sched::IDLE, &[self.current.map_or(NO_THREAD, |c| c.0)]);
                }
                Dispatch::Idle
            }
        }
    }

    pub(crate) fn run_queue_empty(&self) -> bool {
        self.run_queue.is_empty()
    }

    // ---- scheduler lock -----------------------------------------------

    pub(crate) fn lock(&mut self) -> SchedStatus {
        let previous = self.lock_depth;
        match previous.checked_add(1) {
            Some(depth) => {
                self.lock_depth = depth;
                self.emit(records::sched::LOCK, &[depth]);
                SchedStatus::Locked(previous)
            }
            None => SchedStatus::Unlocked,
        }
    }

    pub(crate) fn unlock(&mut self, status: SchedStatus) {
        if let SchedStatus::Locked(previous) = status {
            if self.lock_depth > previous {
                self.lock_depth = previous;
                self.emit(records::sched::UNLOCK, &[previous]);
            }
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    // ---- blocking calls -----------------------------------------------

    /// Common prologue of every blocking call: validate the context and
    /// consume a wake grant matching `expected`.
    fn blocking_caller(&mut self, expected: Wake) -> nb::Result<Caller, PkError> {
        if self.lock_depth > 0 {
            return Err(nb::Error::Other(PkError::BlockingInIsr));
        }
        let id = self.current.ok_or(nb::Error::Other(PkError::NoCurrentThread))?;
        let record = &mut self.threads[id.index()];
        match record.wake {
            Some(wake) if wake == expected => {
                record.wake = None;
                return Ok(Caller::Granted);
            }
            Some(_) => return Err(nb::Error::Other(PkError::UnclaimedWake)),
            None => {}
        }
        // Still waiting from an earlier call
        if record.link != Link::Run {
            return Err(nb::Error::WouldBlock);
        }
        Ok(Caller::Fresh(id))
    }

    pub(crate) fn suspend_self(&mut self) -> nb::Result<(), PkError> {
        let id = match self.blocking_caller(Wake::Resumed)? {
            Caller::Granted => return Ok(()),
            Caller::Fresh(id) => id,
        };
        let record = &mut self.threads[id.index()];
        record.run_count = record
            .run_count
            .checked_sub(1)
            .ok_or(nb::Error::Other(PkError::RunCountOverflow))?;
        if record.run_count > 0 {
            return Ok(());
        }
        record.parked = true;
        self.run_queue.remove(&mut self.threads, id);
        self.emit(records::thread::SUSPEND, &[id.0]);
        log::trace!("{} suspended", id);
        Err(nb::Error::WouldBlock)
    }

    pub(crate) fn resume(&mut self, id: ThreadId) -> PkResult<()> {
        let record = self.threads.get_mut(id.index()).ok_or(PkError::UnknownThread)?;
        record.run_count = record.run_count.checked_add(1).ok_or(PkError::RunCountOverflow)?;
        let run_count = record.run_count;
        let wake_up = run_count == 1 && record.link == Link::Detached;
        let grant = if core::mem::take(&mut record.parked) && wake_up {
            Some(Wake::Resumed)
        } else {
            None
        };

        self.emit(records::thread::RESUME, &[id.0, run_count as u8]);
        if wake_up {
            self.make_ready(id, grant);
            log::trace!("{} resumed", id);
        }
        Ok(())
    }

    pub(crate) fn acquire(&mut self, sem: SemaphoreId) -> nb::Result<(), PkError> {
        if sem.index() >= self.semaphores.len() {
            return Err(nb::Error::Other(PkError::UnknownSemaphore));
        }
        let id = match self.blocking_caller(Wake::Handoff(sem))? {
            Caller::Granted => return Ok(()),
            Caller::Fresh(id) => id,
        };

        let record = &mut self.semaphores[sem.index()];
        if record.count > 0 {
            record.count -= 1;
            return Ok(());
        }

        self.run_queue.remove(&mut self.threads, id);
        self.semaphores[sem.index()]
            .waiters
            .enqueue(&mut self.threads, id, Link::Wait(sem));
        self.emit(records::sem::BLOCK, &[sem.0, id.0]);
        log::trace!("{} blocked on {}", id, sem);
        Err(nb::Error::WouldBlock)
    }

    pub(crate) fn try_acquire(&mut self, sem: SemaphoreId) -> bool {
        match self.semaphores.get_mut(sem.index()) {
            Some(record) if record.count > 0 => {
                record.count -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn release(&mut self, sem: SemaphoreId) -> PkResult<()> {
        let record = self.semaphores.get_mut(sem.index()).ok_or(PkError::UnknownSemaphore)?;
        let waiter = if record.count == 0 {
            record.waiters.dequeue_head(&mut self.threads)
        } else {
            None
        };

        match waiter {
            Some(id) => {
                self.emit(records::sem::HANDOFF, &[sem.0, id.0]);
                log::trace!("{} handed to {}", sem, id);
                self.make_ready(id, Some(Wake::Handoff(sem)));
            }
            None => {
                let record = &mut self.semaphores[sem.index()];
                record.count = record.count.checked_add(1).ok_or(PkError::SemaphoreOverflow)?;
            }
        }
        Ok(())
    }

    pub(crate) fn sleep(&mut self, ticks: Ticks) -> nb::Result<(), PkError> {
        let id = match self.blocking_caller(Wake::Timer)? {
            Caller::Granted => return Ok(()),
            Caller::Fresh(id) => id,
        };
        if ticks == 0 {
            return Ok(());
        }

        self.run_queue.remove(&mut self.threads, id);
        self.sleep_queue.insert(&mut self.threads, id, ticks);
        let [lo, hi] = ticks.to_le_bytes();
        self.emit(records::thread::SLEEP, &[id.0, lo, hi]);
        Err(nb::Error::WouldBlock)
    }

    // ---- time ---------------------------------------------------------

    pub(crate) fn tick(&mut self) {
        self.now.increment();

        if !self.sleep_queue.is_empty() {
            self.sleep_queue.advance(&mut self.threads);
            while let Some(id) = self.sleep_queue.pop_expired(&mut self.threads) {
                self.emit(records::thread::WAKE, &[id.0]);
                self.make_ready(id, Some(Wake::Timer));
            }
        }

        if let Some(head) = self.run_queue.head() {
            let record = &mut self.threads[head.index()];
            record.ticks = record.ticks.saturating_sub(1);
            if record.ticks == 0 {
                record.ticks = self.quota;
                self.run_queue.dequeue_head(&mut self.threads);
                self.run_queue.enqueue(&mut self.threads, head, Link::Run);
                self.emit(records::thread::TIMESLICE, &[head.0]);
                self.reschedule();
            }
        }
    }

    pub(crate) fn now(&self) -> Tick {
        self.now
    }

    // ---- power --------------------------------------------------------

    pub(crate) fn set_sleep_prevent(&mut self, prevent: bool) -> bool {
        core::mem::replace(&mut self.sleep_prevent, prevent)
    }

    pub(crate) fn sleep_prevented(&self) -> bool {
        self.sleep_prevent
    }

    // ---- introspection ------------------------------------------------

    pub(crate) fn current(&self) -> Option<ThreadId> {
        self.current
    }

    pub(crate) fn switch_pending(&self) -> bool {
        self.switch_pending
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn thread_state(&self, id: ThreadId) -> PkResult<ThreadState> {
        let record = self.threads.get(id.index()).ok_or(PkError::UnknownThread)?;
        Ok(match record.link {
            Link::Run if self.current == Some(id) && !self.idle => ThreadState::Running,
            Link::Run => ThreadState::Runnable,
            Link::Sleep => ThreadState::Sleeping,
            Link::Wait(sem) => ThreadState::Blocked(sem),
            Link::Detached => ThreadState::Suspended,
        })
    }

    pub(crate) fn thread_info(&self, id: ThreadId) -> PkResult<ThreadInfo> {
        let state = self.thread_state(id)?;
        let record = &self.threads[id.index()];
        Ok(ThreadInfo {
            id,
            name: record.name,
            stack_size: record.stack_size,
            priority: record.priority,
            run_count: record.run_count,
            state,
        })
    }

    pub(crate) fn semaphore_info(&self, sem: SemaphoreId) -> PkResult<SemaphoreInfo> {
        let record = self.semaphores.get(sem.index()).ok_or(PkError::UnknownSemaphore)?;
        Ok(SemaphoreInfo {
            id: sem,
            name: record.name,
            count: record.count,
            waiters: record.waiters.iter(&self.threads).count(),
        })
    }

    pub(crate) fn waiters(&self, sem: SemaphoreId) -> PkResult<Vec<ThreadId, THREADS>> {
        let record = self.semaphores.get(sem.index()).ok_or(PkError::UnknownSemaphore)?;
        Ok(record.waiters.iter(&self.threads).collect())
    }

    pub(crate) fn run_queue(&self) -> Vec<ThreadId, THREADS> {
        self.run_queue.iter(&self.threads).collect()
    }

    pub(crate) fn sleep_queue(&self) -> Vec<(ThreadId, Ticks), THREADS> {
        self.sleep_queue.iter(&self.threads).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    type Sched = Scheduler<4, 2>;

    thread_local! {
        static RECORDS: RefCell<std::vec::Vec<(u8, std::vec::Vec<u8>)>> = RefCell::new(std::vec::Vec::new());
    }

    fn record_hook(id: u8, payload: &[u8], _timestamp: bool) {
        RECORDS.with(|r| r.borrow_mut().push((id, payload.to_vec())));
    }

    fn thread(name: &'static str, prio: u8) -> ThreadConfig {
        ThreadConfig::new(name, pk_core::Priority::new_unchecked(prio))
    }

    fn ids(queue: &[ThreadId]) -> std::vec::Vec<u8> {
        queue.iter().map(|id| id.0).collect()
    }

    #[test]
    fn spawn_orders_run_queue_and_skips_suspended() {
        let mut sched = Sched::new(4, None);
        let low = sched.spawn(&thread("low", 1)).unwrap();
        let high = sched.spawn(&thread("high", 5)).unwrap();
        let parked = sched.spawn(&thread("parked", 9).suspended()).unwrap();

        assert_eq!(ids(&sched.run_queue()), vec![high.0, low.0]);
        assert_eq!(sched.thread_state(parked), Ok(ThreadState::Suspended));
    }

    #[test]
    fn arena_capacity_is_enforced() {
        let mut sched = Scheduler::<1, 1>::new(4, None);
        sched.spawn(&thread("a", 0)).unwrap();
        assert_eq!(sched.spawn(&thread("b", 0)), Err(PkError::TooManyThreads));
        sched.add_semaphore("s", 0).unwrap();
        assert_eq!(sched.add_semaphore("t", 0), Err(PkError::TooManySemaphores));
    }

    #[test]
    fn dispatch_switches_to_head_once() {
        let mut sched = Sched::new(4, None);
        let a = sched.spawn(&thread("a", 2)).unwrap();
        assert!(sched.switch_pending());

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: None, to: a });
        assert_eq!(sched.dispatch(), Dispatch::Continue(a));
        assert_eq!(sched.thread_state(a), Ok(ThreadState::Running));
    }

    #[test]
    fn release_hands_off_directly_to_waiter() {
        let mut sched = Sched::new(4, None);
        let taker = sched.spawn(&thread("taker", 3)).unwrap();
        let other = sched.spawn(&thread("other", 1)).unwrap();
        let sem = sched.add_semaphore("sem", 0).unwrap();

        sched.dispatch();
        assert_eq!(sched.acquire(sem), Err(nb::Error::WouldBlock));
        assert_eq!(sched.thread_state(taker), Ok(ThreadState::Blocked(sem)));

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(taker), to: other });
        sched.release(sem).unwrap();

        // The unit went to the waiter; nobody else can steal it
        assert_eq!(sched.semaphore_info(sem).unwrap().count, 0);
        assert!(!sched.try_acquire(sem));
        assert!(sched.switch_pending());

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(other), to: taker });
        assert_eq!(sched.acquire(sem), Ok(()));
        assert_eq!(sched.semaphore_info(sem).unwrap().count, 0);
    }

    #[test]
    fn initial_count_admits_that_many_acquires() {
        let mut sched = Sched::new(4, None);
        let taker = sched.spawn(&thread("taker", 3)).unwrap();
        let other = sched.spawn(&thread("other", 1)).unwrap();
        let sem = sched.add_semaphore("sem", 3).unwrap();
        sched.dispatch();

        for _ in 0..3 {
            assert_eq!(sched.acquire(sem), Ok(()));
        }
        assert_eq!(sched.semaphore_info(sem).unwrap().count, 0);
        assert_eq!(sched.acquire(sem), Err(nb::Error::WouldBlock));
        assert_eq!(sched.thread_state(taker), Ok(ThreadState::Blocked(sem)));

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(taker), to: other });
        sched.release(sem).unwrap();
        assert_eq!(sched.semaphore_info(sem).unwrap().count, 0);
        assert_eq!(sched.thread_state(taker), Ok(ThreadState::Runnable));
    }

    #[test]
    fn release_without_waiters_counts_up_to_limit() {
        let mut sched = Sched::new(4, None);
        let sem = sched.add_semaphore("sem", u16::MAX - 1).unwrap();
        assert_eq!(sched.release(sem), Ok(()));
        assert_eq!(sched.release(sem), Err(PkError::SemaphoreOverflow));
        assert_eq!(sched.semaphore_info(sem).unwrap().count, u16::MAX);
        assert_eq!(sched.release(SemaphoreId(7)), Err(PkError::UnknownSemaphore));
    }

    #[test]
    fn waiters_are_served_by_priority() {
        let mut sched = Sched::new(4, None);
        let sem = sched.add_semaphore("sem", 0).unwrap();
        let a = sched.spawn(&thread("a", 1)).unwrap();
        let b = sched.spawn(&thread("b", 4)).unwrap();
        let c = sched.spawn(&thread("c", 2)).unwrap();
        let releaser = sched.spawn(&thread("r", 0)).unwrap();

        for _ in 0..3 {
            sched.dispatch();
            assert_eq!(sched.acquire(sem), Err(nb::Error::WouldBlock));
        }
        assert_eq!(ids(&sched.waiters(sem).unwrap()), vec![b.0, c.0, a.0]);

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(a), to: releaser });
        sched.release(sem).unwrap();
        assert_eq!(sched.thread_state(b), Ok(ThreadState::Runnable));
        assert_eq!(ids(&sched.waiters(sem).unwrap()), vec![c.0, a.0]);
    }

    #[test]
    fn suspend_and_resume_count() {
        let mut sched = Sched::new(4, None);
        let worker = sched.spawn(&thread("worker", 1)).unwrap();
        sched.dispatch();

        sched.resume(worker).unwrap();
        assert_eq!(sched.suspend_self(), Ok(()));
        assert_eq!(sched.suspend_self(), Err(nb::Error::WouldBlock));
        assert_eq!(sched.thread_state(worker), Ok(ThreadState::Suspended));

        // A second attempt while parked changes nothing
        assert_eq!(sched.suspend_self(), Err(nb::Error::WouldBlock));
        assert_eq!(sched.thread_info(worker).unwrap().run_count, 0);

        sched.resume(worker).unwrap();
        sched.dispatch();
        assert_eq!(sched.suspend_self(), Ok(()));
        assert_eq!(sched.thread_info(worker).unwrap().run_count, 1);
    }

    #[test]
    fn first_resume_of_suspended_thread_grants_nothing() {
        let mut sched = Sched::new(4, None);
        let late = sched.spawn(&thread("late", 1).suspended()).unwrap();
        sched.resume(late).unwrap();
        sched.dispatch();

        assert_eq!(sched.suspend_self(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn resume_rejects_unknown_and_overflow() {
        let mut sched = Sched::new(4, None);
        let t = sched.spawn(&thread("t", 1).with_run_count(127)).unwrap();
        assert_eq!(sched.resume(t), Err(PkError::RunCountOverflow));
        assert_eq!(sched.resume(ThreadId(3)), Err(PkError::UnknownThread));
    }

    #[test]
    fn quota_expiry_rotates_equal_priorities() {
        let mut sched = Sched::new(2, None);
        let a = sched.spawn(&thread("a", 0)).unwrap();
        let b = sched.spawn(&thread("b", 0)).unwrap();
        sched.dispatch();

        sched.tick();
        assert_eq!(ids(&sched.run_queue()), vec![a.0, b.0]);
        sched.tick();
        assert_eq!(ids(&sched.run_queue()), vec![b.0, a.0]);
        assert!(sched.switch_pending());
        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(a), to: b });
    }

    #[test]
    fn sleep_wakes_after_delay_with_timer_grant() {
        let mut sched = Sched::new(4, None);
        let sleeper = sched.spawn(&thread("sleeper", 2)).unwrap();
        sched.dispatch();

        assert_eq!(sched.sleep(0), Ok(()));
        assert_eq!(sched.sleep(3), Err(nb::Error::WouldBlock));
        assert_eq!(sched.sleep_queue().as_slice(), &[(sleeper, 3)]);
        assert_eq!(sched.dispatch(), Dispatch::Idle);

        sched.tick();
        sched.tick();
        assert_eq!(sched.thread_state(sleeper), Ok(ThreadState::Sleeping));
        sched.tick();
        assert_eq!(sched.now(), Tick::new(3));
        assert_eq!(sched.thread_state(sleeper), Ok(ThreadState::Runnable));

        assert_eq!(sched.dispatch(), Dispatch::Continue(sleeper));
        assert_eq!(sched.sleep(3), Ok(()));
        assert_eq!(sched.thread_state(sleeper), Ok(ThreadState::Running));
    }

    #[test]
    fn mismatched_grant_is_reported() {
        let mut sched = Sched::new(4, None);
        sched.spawn(&thread("t", 2)).unwrap();
        let sem = sched.add_semaphore("sem", 1).unwrap();
        sched.dispatch();

        assert_eq!(sched.sleep(1), Err(nb::Error::WouldBlock));
        sched.tick();
        sched.dispatch();
        assert_eq!(sched.acquire(sem), Err(nb::Error::Other(PkError::UnclaimedWake)));
        assert_eq!(sched.sleep(1), Ok(()));
        assert_eq!(sched.acquire(sem), Ok(()));
    }

    #[test]
    fn blocking_needs_thread_context() {
        let mut sched = Sched::new(4, None);
        let sem = sched.add_semaphore("sem", 0).unwrap();
        assert_eq!(sched.acquire(sem), Err(nb::Error::Other(PkError::NoCurrentThread)));

        sched.spawn(&thread("t", 0)).unwrap();
        sched.dispatch();
        let status = sched.lock();
        assert_eq!(sched.sleep(5), Err(nb::Error::Other(PkError::BlockingInIsr)));
        sched.unlock(status);
        assert_eq!(sched.acquire(SemaphoreId(9)), Err(nb::Error::Other(PkError::UnknownSemaphore)));
    }

    #[test]
    fn lock_defers_reschedule_until_unlock() {
        let mut sched = Sched::new(4, None);
        let low = sched.spawn(&thread("low", 1)).unwrap();
        let high = sched.spawn(&thread("high", 7).suspended()).unwrap();
        sched.dispatch();

        let outer = sched.lock();
        let inner = sched.lock();
        sched.resume(high).unwrap();
        assert!(!sched.switch_pending());
        sched.unlock(inner);
        assert!(sched.is_locked());
        assert_eq!(sched.dispatch(), Dispatch::Continue(low));
        sched.unlock(outer);

        assert!(sched.reschedule());
        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(low), to: high });
    }

    #[test]
    fn preempted_thread_keeps_running_until_dispatch() {
        let mut sched = Sched::new(4, None);
        let low = sched.spawn(&thread("low", 1)).unwrap();
        let high = sched.spawn(&thread("high", 7).suspended()).unwrap();
        sched.dispatch();

        let status = sched.lock();
        sched.resume(high).unwrap();
        sched.unlock(status);
        assert!(sched.reschedule());
        assert_eq!(sched.thread_state(low), Ok(ThreadState::Running));
        assert_eq!(sched.thread_state(high), Ok(ThreadState::Runnable));

        assert_eq!(sched.dispatch(), Dispatch::Switch { from: Some(low), to: high });
        assert_eq!(sched.thread_state(low), Ok(ThreadState::Runnable));
        assert_eq!(sched.thread_state(high), Ok(ThreadState::Running));
    }

    #[test]
    fn trace_hook_sees_scheduling_records() {
        RECORDS.with(|r| r.borrow_mut().clear());
        let mut sched = Sched::new(4, Some(record_hook));
        let a = sched.spawn(&thread("a", 1)).unwrap();
        sched.dispatch();
        let status = sched.lock();
        sched.unlock(status);
        assert_eq!(sched.sleep(2), Err(nb::Error::WouldBlock));
        sched.dispatch();
        sched.dispatch();

        let seen = RECORDS.with(|r| r.borrow().clone());
        assert_eq!(
            seen,
            vec![
                (records::thread::SPAWN, vec![a.0, 1]),
                (records::sched::NEXT, vec![a.0, NO_THREAD]),
                (records::sched::LOCK, vec![1]),
                (records::sched::UNLOCK, vec![0]),
                (records::thread::SLEEP, vec![a.0, 2, 0]),
                (records::sched::IDLE, vec![a.0]),
            ]
        );
    }

    #[test]
    fn sleep_prevent_returns_previous() {
        let mut sched = Sched::new(4, None);
        assert!(!sched.set_sleep_prevent(true));
        assert!(sched.set_sleep_prevent(false));
        assert!(!sched.sleep_prevented());
    }

    #[test]
    fn start_only_once() {
        let mut sched = Sched::new(4, None);
        assert_eq!(sched.start(), Ok(()));
        assert_eq!(sched.start(), Err(PkError::AlreadyStarted));
        assert!(sched.started());
    }
}
