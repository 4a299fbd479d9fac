//! USB Power Delivery sink-side stack.
//!
//! Four cooperative state machines share one session: the INT_N poller
//! ([`int_n`]), the protocol layer ([`protocol`], split into PRL_Rx, PRL_Tx
//! and PRL_HR as spec.md requires) and the Policy Engine ([`sink`]). Each is
//! driven by its own `run_*` entry point; hosting firmware polls them in
//! whatever scheduling loop it already runs its other tasks in, exactly as
//! `usbpd::sink::Sink::run` is polled by its caller.
#![cfg_attr(not(any(test, feature = "dummy")), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod counters;
#[cfg(any(test, feature = "dummy"))]
pub mod dummy;
pub mod error;
pub mod events;
pub mod int_n;
pub mod mailbox;
pub mod message;
pub mod protocol;
pub mod sink;
pub mod timers;

pub use config::PdConfig;
pub use error::{PeError, PrlError};
pub use message::PdMsg;

/// The port's power role. This crate only implements the sink role; the
/// field exists because it is carried in every message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    /// Consumes power (the only role this crate drives).
    Sink,
    /// Provides power. Never entered; see spec.md's dual-role Non-goal.
    Source,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        if value {
            Self::Source
        } else {
            Self::Sink
        }
    }
}

impl From<PowerRole> for bool {
    fn from(value: PowerRole) -> Self {
        matches!(value, PowerRole::Source)
    }
}

/// The port's USB data role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRole {
    /// Upstream-facing port (device side). This crate always reports UFP.
    Ufp,
    /// Downstream-facing port (host side). Never entered; see Non-goals.
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        if value {
            Self::Dfp
        } else {
            Self::Ufp
        }
    }
}

impl From<DataRole> for bool {
    fn from(value: DataRole) -> Self {
        matches!(value, DataRole::Dfp)
    }
}

/// Dual `defmt`/`log` logging macros, resolving to whichever backend feature
/// is enabled (or to nothing, on target builds with neither).
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "defmt")]
            defmt::trace!($($arg)*);
            #[cfg(all(feature = "log", not(feature = "defmt")))]
            log::trace!($($arg)*);
            #[cfg(not(any(feature = "defmt", feature = "log")))]
            let _ = ($($arg)*,);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "defmt")]
            defmt::debug!($($arg)*);
            #[cfg(all(feature = "log", not(feature = "defmt")))]
            log::debug!($($arg)*);
            #[cfg(not(any(feature = "defmt", feature = "log")))]
            let _ = ($($arg)*,);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "defmt")]
            defmt::warn!($($arg)*);
            #[cfg(all(feature = "log", not(feature = "defmt")))]
            log::warn!($($arg)*);
            #[cfg(not(any(feature = "defmt", feature = "log")))]
            let _ = ($($arg)*,);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "defmt")]
            defmt::error!($($arg)*);
            #[cfg(all(feature = "log", not(feature = "defmt")))]
            log::error!($($arg)*);
            #[cfg(not(any(feature = "defmt", feature = "log")))]
            let _ = ($($arg)*,);
        }
    };
}
