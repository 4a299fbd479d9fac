//! PRL_Rx (spec.md section 4.2): drains received frames from the PHY,
//! decodes them, discards protocol-level duplicates, and forwards the rest
//! to the Policy Engine's inbound mailbox.
//!
//! Grounded on `usbpd::protocol_layer`'s receive path: the teacher crate
//! folds duplicate detection into its combined protocol layer; here it is
//! PRL_Rx's own responsibility, per spec.md's explicit component split.

use core::cell::RefCell;

use pd_sink_traits::Phy;

use crate::events::EventFlags;
use crate::mailbox::Mailbox;
use crate::message::header::{ControlMessageType, MessageType};
use crate::message::pdo::Kind;
use crate::message::PdMsg;
use crate::protocol::PrlTx;
use crate::{trace, warn};

/// Set by the INT_N poller once a frame (and its auto-GoodCRC, if any) has
/// landed in the PHY's receive FIFO.
pub const EVT_MESSAGE_AVAILABLE: u32 = 1 << 0;
/// Set by the INT_N poller (or PRL_HR) when a Hard Reset ordering set arrives.
pub const EVT_HARD_RESET: u32 = 1 << 1;

/// PRL_Rx's state: just the last accepted message ID per spec.md's
/// duplicate-detection invariant (a message is a duplicate iff its ID
/// equals the last one accepted, not iff it has ever been seen).
pub struct PrlRx {
    /// Event bits PRL_Rx suspends on; set by the INT_N poller.
    pub events: EventFlags,
    last_accepted_id: RefCell<Option<u8>>,
}

impl Default for PrlRx {
    fn default() -> Self {
        Self::new()
    }
}

impl PrlRx {
    /// A fresh PRL_Rx with no message IDs observed yet.
    pub const fn new() -> Self {
        Self {
            events: EventFlags::new(),
            last_accepted_id: RefCell::new(None),
        }
    }

    /// Forget the last accepted message ID (spec.md: reset on Hard Reset/Soft Reset).
    pub fn reset_message_id_tracking(&self) {
        *self.last_accepted_id.borrow_mut() = None;
    }

    /// Run forever: wait for a frame or a reset, decode and forward it.
    ///
    /// `request_target_kind` is passed straight to [`PdMsg::from_bytes`];
    /// this crate never receives a `Request` in product use, so
    /// `Kind::FixedSupply` is the conventional choice.
    ///
    /// `prl_tx` is PRL_Rx's own Soft_Reset handling, not the Policy Engine's:
    /// a received Soft_Reset clears both directions' MessageID state before
    /// the PE ever sees it, matching `PRLRxReset` in the original.
    pub async fn run<P: Phy>(&self, phy: &RefCell<P>, out: &Mailbox<PdMsg, 4>, prl_tx: &PrlTx, request_target_kind: Kind) -> ! {
        loop {
            let bits = self.events.wait(EVT_MESSAGE_AVAILABLE | EVT_HARD_RESET).await;

            if bits & EVT_HARD_RESET != 0 {
                self.reset_message_id_tracking();
                continue;
            }

            let mut buf = [0u8; 32];
            let len = match phy.borrow_mut().read_message(&mut buf) {
                Ok(len) => len,
                Err(e) => {
                    warn!("PRL_Rx: PHY read error {:?}", e);
                    continue;
                }
            };

            let msg = match PdMsg::from_bytes(&buf[..len], request_target_kind) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("PRL_Rx: malformed message {:?}", e);
                    continue;
                }
            };

            // A Soft_Reset resyncs both counters to 0 before anything else
            // happens, so the Soft_Reset itself (always ID 0) is never
            // mistaken for a duplicate of whatever ID 0 meant last session.
            if msg.header.message_type() == MessageType::Control(ControlMessageType::SoftReset) {
                self.reset_message_id_tracking();
                prl_tx.reset();
            }

            let id = msg.header.message_id();
            let mut last = self.last_accepted_id.borrow_mut();
            if *last == Some(id) {
                trace!("PRL_Rx: dropping duplicate message id {}", id);
                continue;
            }
            *last = Some(id);
            drop(last);

            // A full inbound mailbox means the Policy Engine has fallen
            // behind; the frame is dropped rather than blocking PRL_Rx,
            // matching the bounded-mailbox model of spec.md section 5.
            if out.try_send(msg).is_err() {
                warn!("PRL_Rx: inbound mailbox full, dropping message id {}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_last_accepted_id() {
        let prl_rx = PrlRx::new();
        assert_eq!(*prl_rx.last_accepted_id.borrow(), None);
    }

    #[test]
    fn reset_clears_tracked_message_id() {
        let prl_rx = PrlRx::new();
        *prl_rx.last_accepted_id.borrow_mut() = Some(3);
        prl_rx.reset_message_id_tracking();
        assert_eq!(*prl_rx.last_accepted_id.borrow(), None);
    }
}
