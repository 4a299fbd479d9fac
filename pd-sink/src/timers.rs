//! Named protocol timers (spec.md section 5) and the [`Timer`] trait used to
//! wait on them.
//!
//! Mirrors `usbpd`'s `timers.rs`: a `TimerType` enum fixes the duration for
//! each named timer, and host code supplies a concrete [`Timer`]
//! implementation (a real tick source on target, a scripted one in tests).

/// Every timer named by the spec, carrying its fixed duration in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerType {
    /// `tSenderResponse`: time PRL_Tx waits for GoodCRC after a transmit request.
    SenderResponse,
    /// `tReceiverResponse`: time PE waits for a reply to a message it originated.
    SenderResponseTimeout,
    /// `tPSTransition`: time PE waits between `Accept` and `PS_RDY` during a transition.
    PsTransition,
    /// `tSinkWaitCap`: time the sink waits in `WaitCap` for `Source_Capabilities`.
    SinkWaitCap,
    /// `tSinkRequest`: minimum spacing between successive `Request` messages.
    SinkRequest,
    /// `tPPSRequest`: periodic re-request interval while on a PPS contract.
    PpsRequest,
    /// `tHardResetComplete`: time PRL_HR waits for the PHY to finish hard-reset signaling.
    HardResetComplete,
    /// `tPSHardReset`: time PE waits, after hard reset, before expecting `VBus` to settle.
    PsHardReset,
    /// `tNoResponse`: total time the PE waits for the source to come back to life.
    NoResponse,
    /// Debounce applied before declaring the source unresponsive.
    SourceUnresponsiveDebounce,
    /// `tChunkingNotSupported`: time `ChunkReceived` waits for a Hard Reset
    /// before concluding chunking is unsupported and replying accordingly.
    ChunkSenderResponse,
    /// `tBistContMode`: maximum time the sink may remain in a BIST continuous test.
    BistContMode,
}

impl TimerType {
    /// This timer's fixed duration, in milliseconds.
    pub const fn millis(self) -> u64 {
        match self {
            Self::SenderResponse => 26,
            Self::SenderResponseTimeout => 30,
            Self::PsTransition => 500,
            Self::SinkWaitCap => 620,
            Self::SinkRequest => 100,
            Self::PpsRequest => 10_000,
            Self::HardResetComplete => 5,
            Self::PsHardReset => 35,
            Self::NoResponse => 5_000,
            Self::SourceUnresponsiveDebounce => 300,
            Self::ChunkSenderResponse => 45,
            Self::BistContMode => 60_000,
        }
    }
}

/// A source of timeout futures, one per named [`TimerType`].
///
/// Implemented once per host (a real tick counter on target, [`crate::dummy::DummyTimer`]
/// in tests) and shared by every component that needs `WAIT_TIMEOUT`.
pub trait Timer {
    /// A future that resolves once `timer` has elapsed, starting now.
    ///
    /// Must be cancel-safe: dropping the returned future before it resolves
    /// must not leave the timer running against a stale deadline.
    fn after(&self, timer: TimerType) -> impl core::future::Future<Output = ()>;
}
