//! PRL_Tx (spec.md section 4.3): turns a [`PdMsg`] the Policy Engine wants
//! sent into PHY transmissions, handling retries and the PD3.0 collision
//! avoidance rule.
//!
//! Grounded on `usbpd::protocol_layer`'s `transmit`/`transmit_retransmit`
//! methods: skip software retry and GoodCRC bookkeeping entirely when the
//! PHY advertises `HAS_AUTO_RETRY`/`HAS_AUTO_GOOD_CRC`, and fall back to a
//! counted software loop otherwise.

use core::cell::RefCell;

use pd_sink_traits::{Phy, TccLevel};

use crate::counters::{Counter, CounterType};
use crate::error::PrlError;
use crate::events::EventFlags;
use crate::message::header::SpecificationRevision;
use crate::message::PdMsg;
use crate::timers::{Timer, TimerType};
use crate::{debug, trace, warn};

/// Set by the INT_N poller once the PHY reports the pending transmission
/// completed (GoodCRC observed or, without `HAS_AUTO_GOOD_CRC`, simply sent).
pub const EVT_TX_DONE: u32 = 1 << 0;
/// Set by the INT_N poller once the PHY's own retry budget is exhausted.
pub const EVT_RETRY_FAIL: u32 = 1 << 1;
/// Set by the INT_N poller (or PRL_HR) when a Hard Reset preempts transmission.
pub const EVT_HARD_RESET: u32 = 1 << 2;

const MAX_COLLISION_WAIT_ITERATIONS: u8 = 8;

/// PRL_Tx's state.
///
/// Owns `tx_messageid_counter` (spec.md section 3): the Policy Engine hands
/// over a fully-built message and PRL_Tx alone stamps its `MessageID`, the
/// same division of labor `usbpd::protocol_layer::ProtocolLayer::transmit`
/// uses (the PE builds payloads, the protocol layer owns wire framing).
pub struct PrlTx {
    /// Event bits PRL_Tx suspends on; set by the INT_N poller.
    pub events: EventFlags,
    retry_counter: RefCell<Counter>,
    message_id_counter: RefCell<Counter>,
}

impl Default for PrlTx {
    fn default() -> Self {
        Self::new()
    }
}

impl PrlTx {
    /// A fresh PRL_Tx with no events pending and both counters at zero.
    pub const fn new() -> Self {
        Self {
            events: EventFlags::new(),
            retry_counter: RefCell::new(Counter::new(CounterType::Retry)),
            message_id_counter: RefCell::new(Counter::new(CounterType::MessageId)),
        }
    }

    /// Zero `tx_messageid_counter` (spec.md: reset on soft/hard reset and on
    /// PRL_Tx's own reset entry).
    pub fn reset(&self) {
        self.message_id_counter.borrow_mut().reset();
        self.retry_counter.borrow_mut().reset();
    }

    /// The message ID that would be stamped onto the next transmission.
    pub fn next_message_id(&self) -> u8 {
        self.message_id_counter.borrow().value()
    }

    /// Stamp `msg`'s header with the current `tx_messageid_counter`, encode
    /// and send it, and wait for completion (or failure) before returning.
    ///
    /// On PD3.0, blocks (bounded) until `get_typec_current` reports
    /// `SinkTxOk`, per the sink-side collision avoidance rule. The counter
    /// advances by exactly one on every completed send: success,
    /// transmission error, or retry exhaustion — never on a Hard Reset,
    /// which resets it to zero instead via [`PrlTx::reset`].
    pub async fn transmit<P: Phy, T: Timer>(
        &self,
        phy: &RefCell<P>,
        timer: &T,
        mut msg: PdMsg,
        spec_revision: SpecificationRevision,
    ) -> Result<(), PrlError> {
        self.retry_counter.borrow_mut().reset();

        if spec_revision.is_pd3() {
            self.wait_for_collision_avoidance(phy).await;
        }

        let id = self.message_id_counter.borrow().value();
        msg.header = msg.header.with_message_id(id);

        let mut buf = [0u8; 32];
        let len = msg.to_bytes(&mut buf).map_err(PrlError::Parse)?;

        loop {
            trace!("PRL_Tx: sending message id {}", msg.header.message_id());
            phy.borrow_mut().send_message(&buf[..len])?;

            let mask = EVT_TX_DONE | EVT_RETRY_FAIL | EVT_HARD_RESET;
            let bits = match self.events.wait_timeout(mask, timer, TimerType::SenderResponse).await {
                Some(bits) => bits,
                None => {
                    self.message_id_counter.borrow_mut().increment();
                    return Err(PrlError::SenderResponseTimeout);
                }
            };

            if bits & EVT_HARD_RESET != 0 {
                return Err(PrlError::HardReset);
            }
            if bits & EVT_TX_DONE != 0 {
                debug!("PRL_Tx: message id {} acknowledged", msg.header.message_id());
                self.message_id_counter.borrow_mut().increment();
                return Ok(());
            }

            // EVT_RETRY_FAIL: the PHY's own retry budget (if it has one) was
            // exhausted without a GoodCRC. If the PHY does not auto-retry,
            // PRL_Tx owns the retry loop itself up to nRetryCount.
            if P::HAS_AUTO_RETRY {
                self.message_id_counter.borrow_mut().increment();
                return Err(PrlError::RetriesExhausted);
            }

            let mut retry_counter = self.retry_counter.borrow_mut();
            if retry_counter.is_exhausted() {
                warn!("PRL_Tx: retries exhausted for message id {}", msg.header.message_id());
                drop(retry_counter);
                self.message_id_counter.borrow_mut().increment();
                return Err(PrlError::RetriesExhausted);
            }
            retry_counter.increment();
        }
    }

    async fn wait_for_collision_avoidance<P: Phy>(&self, phy: &RefCell<P>) {
        for _ in 0..MAX_COLLISION_WAIT_ITERATIONS {
            if phy.borrow().get_typec_current() != TccLevel::SinkTxNg {
                return;
            }
            embassy_futures::yield_now().await;
        }
        warn!("PRL_Tx: proceeding without confirmed SinkTxOk after bounded wait");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_prl_tx_starts_at_message_id_zero() {
        let prl_tx = PrlTx::new();
        assert_eq!(prl_tx.next_message_id(), 0);
    }

    #[test]
    fn reset_returns_message_id_counter_to_zero() {
        let prl_tx = PrlTx::new();
        prl_tx.message_id_counter.borrow_mut().increment();
        prl_tx.message_id_counter.borrow_mut().increment();
        prl_tx.reset();
        assert_eq!(prl_tx.next_message_id(), 0);
    }
}
