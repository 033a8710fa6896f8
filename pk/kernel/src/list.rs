//! Priority-ordered singly linked thread lists.
//!
//! Links are threaded through the thread arena, so a list is just its
//! head. Used for the run queue and for semaphore wait queues.

use pk_core::ThreadId;

use crate::thread::{Link, ThreadRecord};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrioList {
    head: Option<ThreadId>,
}

impl PrioList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    pub(crate) fn head(&self) -> Option<ThreadId> {
        self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert behind every entry of greater or equal priority, so a newcomer
    /// queues after its peers.
    pub(crate) fn enqueue(&mut self, threads: &mut [ThreadRecord], id: ThreadId, owner: Link) {
        debug_assert_eq!(threads[id.index()].link, Link::Detached);

        let priority = threads[id.index()].priority;
        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if threads[c.index()].priority < priority {
                break;
            }
            prev = Some(c);
            cursor = threads[c.index()].next;
        }

        let record = &mut threads[id.index()];
        record.next = cursor;
        record.link = owner;
        match prev {
            Some(p) => threads[p.index()].next = Some(id),
            None => self.head = Some(id),
        }
    }

    pub(crate) fn dequeue_head(&mut self, threads: &mut [ThreadRecord]) -> Option<ThreadId> {
        let head = self.head?;
        let record = &mut threads[head.index()];
        self.head = record.next.take();
        record.link = Link::Detached;
        Some(head)
    }

    /// Unlink `id` wherever it sits; returns whether it was found
    pub(crate) fn remove(&mut self, threads: &mut [ThreadRecord], id: ThreadId) -> bool {
        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(c) = cursor {
            if c == id {
                let next = threads[c.index()].next.take();
                threads[c.index()].link = Link::Detached;
                match prev {
                    Some(p) => threads[p.index()].next = next,
                    None => self.head = next,
                }
                return true;
            }
            prev = Some(c);
            cursor = threads[c.index()].next;
        }
        false
    }

    pub(crate) fn iter<'a>(&self, threads: &'a [ThreadRecord]) -> impl Iterator<Item = ThreadId> + 'a {
        core::iter::successors(self.head, move |id| threads[id.index()].next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadConfig;
    use pk_core::Priority;

    fn arena(priorities: &[u8]) -> Vec<ThreadRecord> {
        priorities
            .iter()
            .map(|&p| {
                let config = ThreadConfig::new("t", Priority::new_unchecked(p));
                ThreadRecord::new(&config, 4).expect("valid thread")
            })
            .collect()
    }

    fn order(list: &PrioList, threads: &[ThreadRecord]) -> Vec<u8> {
        list.iter(threads).map(|id| id.0).collect()
    }

    #[test]
    fn higher_priority_goes_first() {
        let mut threads = arena(&[1, 5, 3]);
        let mut list = PrioList::new();
        for id in 0..3 {
            list.enqueue(&mut threads, ThreadId(id), Link::Run);
        }
        assert_eq!(order(&list, &threads), vec![1, 2, 0]);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut threads = arena(&[2, 2, 2, 7]);
        let mut list = PrioList::new();
        for id in 0..4 {
            list.enqueue(&mut threads, ThreadId(id), Link::Run);
        }
        assert_eq!(order(&list, &threads), vec![3, 0, 1, 2]);

        let head = list.dequeue_head(&mut threads);
        assert_eq!(head, Some(ThreadId(3)));
        assert_eq!(threads[3].link, Link::Detached);
        assert_eq!(threads[3].next, None);
    }

    #[test]
    fn requeued_head_moves_behind_peers() {
        let mut threads = arena(&[0, 0]);
        let mut list = PrioList::new();
        list.enqueue(&mut threads, ThreadId(0), Link::Run);
        list.enqueue(&mut threads, ThreadId(1), Link::Run);

        let head = list.dequeue_head(&mut threads).expect("non-empty");
        list.enqueue(&mut threads, head, Link::Run);
        assert_eq!(order(&list, &threads), vec![1, 0]);
    }

    #[test]
    fn remove_from_middle_and_tail() {
        let mut threads = arena(&[3, 2, 1]);
        let mut list = PrioList::new();
        for id in 0..3 {
            list.enqueue(&mut threads, ThreadId(id), Link::Run);
        }

        assert!(list.remove(&mut threads, ThreadId(1)));
        assert_eq!(order(&list, &threads), vec![0, 2]);
        assert!(list.remove(&mut threads, ThreadId(2)));
        assert_eq!(order(&list, &threads), vec![0]);
        assert!(!list.remove(&mut threads, ThreadId(2)));
        assert!(list.remove(&mut threads, ThreadId(0)));
        assert!(list.is_empty());
    }
}
