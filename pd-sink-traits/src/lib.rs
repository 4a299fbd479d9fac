//! Traits through which the sink-side state machines of `pd-sink` talk to a
//! FUSB302B-class USB-PD PHY transceiver.
//!
//! This crate defines nothing but the seam: register-level access, BMC
//! framing, GoodCRC auto-generation, and automatic retry all live in the PHY
//! driver that implements [`Phy`]. None of that is implemented here.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

/// Errors that the PHY can report back to the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyError {
    /// A hard reset was observed (signaled or received) while the operation was in flight.
    HardReset,
    /// The caller's buffer was too small to hold the received frame.
    BufferTooSmall,
}

/// Legacy Type-C current advertisement, read back from the Rp termination.
///
/// `SinkTxOk`/`SinkTxNg` are PD3.0-only indications used for sink-side
/// collision avoidance: a sink may only start an AMS while `SinkTxOk` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TccLevel {
    /// Default USB current (900 mA / 500 mA).
    Default,
    /// 1.5 A advertisement.
    Current1A5,
    /// 3.0 A advertisement.
    Current3A0,
    /// PD3.0: sink is permitted to start an AMS.
    SinkTxOk,
    /// PD3.0: sink must not start an AMS.
    SinkTxNg,
}

/// Interrupt and status bits, fetched in one atomic read by [`Phy::get_status`].
///
/// Field names mirror the event names used by the INT_N poller rather than
/// any particular transceiver's register layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// GoodCRC was sent in response to a received message; a message is ready in the RX FIFO.
    pub i_gcrcsent: bool,
    /// The message handed to `send_message` was sent and acknowledged.
    pub i_txsent: bool,
    /// Transmission exhausted the hardware's retry budget without a GoodCRC.
    pub i_retryfail: bool,
    /// A hard reset ordering set was received from the port partner.
    pub i_hardrst: bool,
    /// Hard reset signaling requested via `send_hardrst` has completed.
    pub i_hardsent: bool,
    /// Over-current or over-temperature condition latched by the PHY.
    pub i_ocp_temp: bool,
    /// Over-temperature condition is presently active.
    pub ovrtemp: bool,
}

/// The PHY adapter contract.
///
/// Every method is a direct, non-blocking register operation: the driver
/// either performs it immediately or reports failure. Waiting for completion
/// is the caller's job, driven by [`Phy::intn_asserted`] and [`Phy::get_status`].
pub trait Phy {
    /// Idempotent soft reset of the transceiver (FIFO and state machine, not the line).
    fn reset(&mut self);

    /// Hand a fully encoded SOP message to the PHY for transmission.
    ///
    /// The PHY performs CRC, BMC encoding and (if it advertises
    /// [`Phy::HAS_AUTO_RETRY`]) retries on its own; completion is reported
    /// through `I_TXSENT` / `I_RETRYFAIL` interrupt bits, not this call's
    /// return value.
    fn send_message(&mut self, data: &[u8]) -> Result<(), PhyError>;

    /// Emit hard-reset signaling on the line.
    fn send_hardrst(&mut self) -> Result<(), PhyError>;

    /// Copy the most recently received frame into `buffer`, returning its length.
    fn read_message(&mut self, buffer: &mut [u8]) -> Result<usize, PhyError>;

    /// Atomically fetch and clear the latched interrupt/status bits.
    fn get_status(&mut self) -> Status;

    /// Read back the current Type-C current advertisement.
    fn get_typec_current(&self) -> TccLevel;

    /// Level of the INT_N pin.
    fn intn_asserted(&self) -> bool;

    /// If `true`, the PHY auto-generates GoodCRC on receive; the protocol
    /// layer never has to construct one.
    const HAS_AUTO_GOOD_CRC: bool = true;

    /// If `true`, the PHY retries transmission in hardware until GoodCRC
    /// arrives or its retry budget is exhausted.
    const HAS_AUTO_RETRY: bool = true;
}
