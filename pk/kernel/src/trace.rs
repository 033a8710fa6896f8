//! Scheduler trace records.
//!
//! The kernel reports scheduling activity through an optional
//! [`TraceHook`]. Record identifiers keep the numbering used by the QS
//! software tracing protocol so existing host tools can decode them.
//!
//! The hook runs inside the kernel's critical section and must not call
//! back into the kernel.

/// Receiver for trace records: `(record id, payload, timestamp requested)`
pub type TraceHook = fn(record: u8, payload: &[u8], timestamp: bool);

/// Payload byte used when a record has no thread to name
pub const NO_THREAD: u8 = 0xFF;

pub mod records {
    /// Scheduler related record identifiers.
    pub mod sched {
        /// Scheduler lock record (`QS_SCHED_LOCK`): `[depth]`.
        pub const LOCK: u8 = 50;
        /// Scheduler unlock record (`QS_SCHED_UNLOCK`): `[depth]`.
        pub const UNLOCK: u8 = 51;
        /// Scheduler next record (`QS_SCHED_NEXT`): `[to, from]`.
        pub const NEXT: u8 = 52;
        /// Scheduler idle record (`QS_SCHED_IDLE`): `[last]`.
        pub const IDLE: u8 = 53;
    }

    /// Thread lifecycle record identifiers.
    pub mod thread {
        /// Thread registered: `[id, priority]`.
        pub const SPAWN: u8 = 60;
        /// Thread suspended itself: `[id]`.
        pub const SUSPEND: u8 = 61;
        /// Thread resumed: `[id, run count]`.
        pub const RESUME: u8 = 62;
        /// Thread went to sleep: `[id, ticks lo, ticks hi]`.
        pub const SLEEP: u8 = 63;
        /// Sleep expired: `[id]`.
        pub const WAKE: u8 = 64;
        /// Time slice exhausted, thread requeued: `[id]`.
        pub const TIMESLICE: u8 = 65;
    }

    /// Semaphore record identifiers.
    pub mod sem {
        /// Thread blocked on a semaphore: `[sem, id]`.
        pub const BLOCK: u8 = 70;
        /// Release handed the semaphore to a waiter: `[sem, id]`.
        pub const HANDOFF: u8 = 71;
    }
}

/// Forward a record to the hook, if any
pub(crate) fn emit(hook: Option<TraceHook>, record: u8, payload: &[u8]) {
    if let Some(hook) = hook {
        hook(record, payload, true);
    }
}
