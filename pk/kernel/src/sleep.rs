//! Delta-encoded sleep queue.
//!
//! Each sleeper stores the number of ticks between its predecessor's wake
//! time and its own, so a tick only ever touches the head.

use pk_core::{ThreadId, Ticks};

use crate::thread::{Link, ThreadRecord};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SleepList {
    head: Option<ThreadId>,
}

impl SleepList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Queue `id` to wake `delay` ticks from now. Ties wake in insertion order.
    pub(crate) fn insert(&mut self, threads: &mut [ThreadRecord], id: ThreadId, delay: Ticks) {
        debug_assert!(delay > 0);
        debug_assert_eq!(threads[id.index()].link, Link::Detached);

        let mut remaining = delay;
        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            let delta = threads[c.index()].ticks;
            if delta > remaining {
                break;
            }
            remaining -= delta;
            prev = Some(c);
            cursor = threads[c.index()].next;
        }

        if let Some(c) = cursor {
            threads[c.index()].ticks -= remaining;
        }

        let record = &mut threads[id.index()];
        record.ticks = remaining;
        record.next = cursor;
        record.link = Link::Sleep;
        match prev {
            Some(p) => threads[p.index()].next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Account for one elapsed tick
    pub(crate) fn advance(&mut self, threads: &mut [ThreadRecord]) {
        if let Some(head) = self.head {
            let record = &mut threads[head.index()];
            record.ticks = record.ticks.saturating_sub(1);
        }
    }

    /// Unlink the head if its delay has run out
    pub(crate) fn pop_expired(&mut self, threads: &mut [ThreadRecord]) -> Option<ThreadId> {
        let head = self.head?;
        let record = &mut threads[head.index()];
        if record.ticks != 0 {
            return None;
        }
        self.head = record.next.take();
        record.link = Link::Detached;
        Some(head)
    }

    /// Sleepers in wake order with their remaining delay in absolute ticks
    pub(crate) fn iter<'a>(&self, threads: &'a [ThreadRecord]) -> impl Iterator<Item = (ThreadId, Ticks)> + 'a {
        let mut total: Ticks = 0;
        core::iter::successors(self.head, move |id| threads[id.index()].next).map(move |id| {
            total = total.wrapping_add(threads[id.index()].ticks);
            (id, total)
        })
    }
}
