//! Event-flag word used by every component to implement spec.md's
//! `WAIT`/`WAIT_TIMEOUT`/`YIELD` suspension primitives.
//!
//! Grounded on `usbpd::protocol_layer`'s use of `embassy_futures::select`
//! to race a message-available wait against a timer, generalized into a
//! standalone, reusable `AtomicU32` bitmask rather than being inlined into
//! one combined protocol-layer future.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;

use crate::timers::{Timer, TimerType};

/// A set of pending event bits, set from ISR-equivalent contexts (the INT_N
/// poller, a mailbox push) and consumed by the owning component's
/// `update_state`.
///
/// Every bit set between two `wait` calls is preserved (no lost wakeups):
/// `set` only ORs bits in, `take` only clears the bits the caller read.
#[derive(Default)]
pub struct EventFlags(AtomicU32);

impl EventFlags {
    /// An empty flag set.
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// OR `bits` into the pending set. Safe to call from any context.
    pub fn set(&self, bits: u32) {
        self.0.fetch_or(bits, Ordering::AcqRel);
    }

    /// Atomically read and clear every bit in `mask`, returning the bits of
    /// `mask` that were set. Never blocks.
    pub fn take(&self, mask: u32) -> u32 {
        self.0.fetch_and(!mask, Ordering::AcqRel) & mask
    }

    /// `true` if any bit in `mask` is presently pending, without consuming it.
    pub fn peek(&self, mask: u32) -> bool {
        self.0.load(Ordering::Acquire) & mask != 0
    }

    /// `WAIT(events, mask)`: suspend until at least one bit in `mask` is
    /// pending, then consume and return exactly the bits of `mask` that fired.
    pub async fn wait(&self, mask: u32) -> u32 {
        loop {
            let bits = self.take(mask);
            if bits != 0 {
                return bits;
            }
            yield_now().await;
        }
    }

    /// `WAIT_TIMEOUT(events, mask, deadline)`: as [`EventFlags::wait`], but
    /// also resolves with `None` if `timer` elapses first.
    pub async fn wait_timeout<T: Timer>(&self, mask: u32, timer: &T, deadline: TimerType) -> Option<u32> {
        match select(self.wait(mask), timer.after(deadline)).await {
            Either::First(bits) => Some(bits),
            Either::Second(()) => None,
        }
    }
}
