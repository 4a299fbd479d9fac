//! Error taxonomy (spec.md section 7).
//!
//! Grounded on `usbpd::protocol_layer`'s `ProtocolError`/`RxError`/`TxError`
//! split: failures are data the caller matches on to decide the next state
//! transition, never a `panic!`. `PrlError` is what PRL_Rx/PRL_Tx/PRL_HR
//! return; `PeError` adds the one outcome only the Policy Engine produces.

use pd_sink_traits::PhyError;

use crate::message::ParseError;

/// Errors surfaced by the protocol layer (PRL_Rx / PRL_Tx / PRL_HR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrlError {
    /// The PHY reported an error while sending or receiving.
    #[error("PHY error: {0:?}")]
    Phy(PhyError),
    /// A received frame did not parse as a well-formed message.
    #[error("malformed message: {0:?}")]
    Parse(ParseError),
    /// PRL_Tx exhausted its retry budget without a GoodCRC.
    #[error("transmit retries exhausted")]
    RetriesExhausted,
    /// PRL_Tx did not see a GoodCRC, retry-exhaustion signal, or hard reset
    /// before `tSenderResponse` elapsed.
    #[error("sender response timeout")]
    SenderResponseTimeout,
    /// A Hard Reset ordering set was observed (by the PHY or by request)
    /// while another operation was in flight.
    #[error("hard reset in progress")]
    HardReset,
}

impl From<PhyError> for PrlError {
    fn from(value: PhyError) -> Self {
        Self::Phy(value)
    }
}

/// Errors surfaced by the Policy Engine's `run_pe` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeError {
    /// A lower-layer protocol error occurred and was not locally recoverable
    /// by issuing a Soft Reset or Hard Reset.
    #[error(transparent)]
    Prl(#[from] PrlError),
    /// The port partner did not respond to repeated Hard Resets within
    /// `nHardResetCount` attempts; the session is unrecoverable without
    /// external intervention (cable reseat, VBus cycle).
    #[error("source unresponsive after exhausting hard reset retries")]
    SourceUnresponsive,
}
