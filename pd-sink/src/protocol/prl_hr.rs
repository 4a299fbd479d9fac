//! PRL_HR (spec.md section 4.4): drives Hard Reset signaling, in either
//! direction, and resets the rest of the protocol layer once it completes.
//!
//! Grounded on `usbpd::protocol_layer`'s hard-reset handling, split out
//! into its own component per spec.md's explicit PRL_Rx/PRL_Tx/PRL_HR
//! separation (the teacher keeps this inline in `ProtocolLayer`).

use core::cell::RefCell;

use pd_sink_traits::Phy;

use crate::events::EventFlags;
use crate::mailbox::Mailbox;
use crate::protocol::{prl_rx, prl_tx, PrlRx, PrlTx};
use crate::timers::{Timer, TimerType};
use crate::{debug, trace, warn};

/// Set by the INT_N poller when the port partner's Hard Reset ordering set
/// is observed on the line.
pub const EVT_HARD_RESET_RECEIVED: u32 = 1 << 0;
/// Set by the Policy Engine to request that this port originate a Hard Reset.
pub const EVT_HARD_RESET_REQUESTED: u32 = 1 << 1;
/// Set by the INT_N poller once hard-reset signaling this port originated
/// has finished transmitting.
pub const EVT_HARD_RESET_SENT: u32 = 1 << 2;

/// PRL_HR's state.
#[derive(Default)]
pub struct PrlHr {
    /// Event bits PRL_HR suspends on.
    pub events: EventFlags,
}

impl PrlHr {
    /// A fresh PRL_HR.
    pub const fn new() -> Self {
        Self { events: EventFlags::new() }
    }

    /// Run forever: wait for either direction of Hard Reset, drive the PHY
    /// if this port originated it, then reset PRL_Rx/PRL_Tx and notify the
    /// Policy Engine that the reset completed.
    pub async fn run<P: Phy, T: Timer>(
        &self,
        phy: &RefCell<P>,
        timer: &T,
        prl_rx: &PrlRx,
        prl_tx: &PrlTx,
        completed: &Mailbox<(), 4>,
    ) -> ! {
        loop {
            let bits = self
                .events
                .wait(EVT_HARD_RESET_RECEIVED | EVT_HARD_RESET_REQUESTED)
                .await;

            if bits & EVT_HARD_RESET_REQUESTED != 0 {
                debug!("PRL_HR: originating hard reset");
                if let Err(e) = phy.borrow_mut().send_hardrst() {
                    warn!("PRL_HR: PHY rejected hard reset request: {:?}", e);
                } else if self.events.wait_timeout(EVT_HARD_RESET_SENT, timer, TimerType::HardResetComplete).await.is_none() {
                    warn!("PRL_HR: timed out waiting for hard reset signaling to complete");
                }
            } else {
                trace!("PRL_HR: hard reset received from port partner");
            }

            prl_rx.events.set(prl_rx::EVT_HARD_RESET);
            prl_tx.events.set(prl_tx::EVT_HARD_RESET);
            prl_rx.reset_message_id_tracking();
            prl_tx.reset();

            if completed.try_send(()).is_err() {
                warn!("PRL_HR: Policy Engine mailbox full, completion notice dropped");
            }
        }
    }
}
