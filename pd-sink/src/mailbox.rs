//! Fixed-capacity single-producer/single-consumer mailboxes (spec.md
//! section 5's "shared resources").
//!
//! Built on `heapless::spsc::Queue`, matching `heapless`'s role in the
//! teacher crate. Every mailbox in this crate shares [`PDB_MSG_POOL_SIZE`]
//! as its capacity, per spec.md section 5.
//!
//! Components here are cooperative, not preemptive: exactly one `run_*`
//! function executes at a time and every suspension point is an explicit
//! `await`, so a single `RefCell` is enough to share the queue without
//! atomics.

use core::cell::RefCell;

use heapless::spsc::Queue;

use crate::events::EventFlags;

/// Shared capacity for every mailbox in this crate.
pub const PDB_MSG_POOL_SIZE: usize = 4;

/// Bit set on a mailbox's [`EventFlags`] whenever an item is pushed.
pub const EVT_ITEM_AVAILABLE: u32 = 1;

/// A fixed-capacity queue plus the event bit its consumer waits on.
pub struct Mailbox<T, const N: usize> {
    queue: RefCell<Queue<T, N>>,
    events: EventFlags,
}

impl<T, const N: usize> Default for Mailbox<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Mailbox<T, N> {
    /// An empty mailbox.
    pub const fn new() -> Self {
        Self {
            queue: RefCell::new(Queue::new()),
            events: EventFlags::new(),
        }
    }

    /// Push an item, signaling the consumer. Returns the item back if the
    /// mailbox is full (the caller decides whether to drop or retry).
    pub fn try_send(&self, item: T) -> Result<(), T> {
        let result = self.queue.borrow_mut().enqueue(item);
        if result.is_ok() {
            self.events.set(EVT_ITEM_AVAILABLE);
        }
        result
    }

    /// Pop an item without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.queue.borrow_mut().dequeue()
    }

    /// Suspend until an item is available, then pop and return it.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.try_recv() {
                return item;
            }
            self.events.wait(EVT_ITEM_AVAILABLE).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_send_then_try_recv_round_trips() {
        let mailbox: Mailbox<u8, 4> = Mailbox::new();
        mailbox.try_send(7).unwrap();
        assert_eq!(mailbox.try_recv(), Some(7));
        assert_eq!(mailbox.try_recv(), None);
    }

    #[test]
    fn full_mailbox_returns_item_to_caller() {
        let mailbox: Mailbox<u8, 2> = Mailbox::new();
        mailbox.try_send(1).unwrap();
        mailbox.try_send(2).unwrap();
        assert_eq!(mailbox.try_send(3), Err(3));
    }

    #[tokio::test]
    async fn recv_resolves_once_an_item_is_pushed() {
        let mailbox: Mailbox<u8, 4> = Mailbox::new();
        mailbox.try_send(42).unwrap();
        assert_eq!(mailbox.recv().await, 42);
    }
}
