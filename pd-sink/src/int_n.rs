//! The INT_N poller (spec.md section 4.1): a pure, non-async event fan-out.
//!
//! Unlike the other three components, the INT_N poller never suspends — it
//! is meant to be called from whatever tight loop or genuine hardware
//! interrupt the host already has, exactly once per invocation, and it
//! returns immediately if `INT_N` is not asserted.

use core::cell::RefCell;

use pd_sink_traits::Phy;

use crate::events::EventFlags;
use crate::protocol::{prl_hr, prl_rx, prl_tx, PrlHr, PrlRx, PrlTx};
use crate::sink::pe;

/// Poll the PHY's `INT_N` line once, fanning out any latched status bits to
/// the relevant component's [`crate::events::EventFlags`].
///
/// Returns `true` if `INT_N` was asserted (and therefore `get_status` was
/// read and cleared), `false` if there was nothing to do.
pub fn poll<P: Phy>(phy: &RefCell<P>, prl_rx: &PrlRx, prl_tx: &PrlTx, prl_hr: &PrlHr, pe_events: &EventFlags) -> bool {
    if !phy.borrow().intn_asserted() {
        return false;
    }

    let status = phy.borrow_mut().get_status();

    if status.i_gcrcsent {
        prl_rx.events.set(prl_rx::EVT_MESSAGE_AVAILABLE);
    }
    if status.i_txsent {
        prl_tx.events.set(prl_tx::EVT_TX_DONE);
    }
    if status.i_retryfail {
        prl_tx.events.set(prl_tx::EVT_RETRY_FAIL);
    }
    if status.i_hardrst {
        prl_hr.events.set(prl_hr::EVT_HARD_RESET_RECEIVED);
    }
    if status.i_hardsent {
        prl_hr.events.set(prl_hr::EVT_HARD_RESET_SENT);
    }
    if status.i_ocp_temp && status.ovrtemp {
        pe_events.set(pe::EVT_OVERTEMP);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::DummyPhy;

    #[test]
    fn poll_is_a_no_op_when_intn_is_not_asserted() {
        let phy = RefCell::new(DummyPhy::new());
        let prl_rx = PrlRx::new();
        let prl_tx = PrlTx::new();
        let prl_hr = PrlHr::new();
        let pe_events = EventFlags::new();

        assert!(!poll(&phy, &prl_rx, &prl_tx, &prl_hr, &pe_events));
        assert!(!prl_rx.events.peek(prl_rx::EVT_MESSAGE_AVAILABLE));
    }

    #[test]
    fn poll_fans_out_message_available() {
        let phy = RefCell::new(DummyPhy::new());
        phy.borrow_mut().latch_message_received(&[]);
        let prl_rx = PrlRx::new();
        let prl_tx = PrlTx::new();
        let prl_hr = PrlHr::new();
        let pe_events = EventFlags::new();

        assert!(poll(&phy, &prl_rx, &prl_tx, &prl_hr, &pe_events));
        assert!(prl_rx.events.peek(prl_rx::EVT_MESSAGE_AVAILABLE));
    }
}
