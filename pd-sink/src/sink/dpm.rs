//! The Device Policy Manager seam (spec.md section 6): the product-specific
//! policy layer above the Policy Engine.
//!
//! Modeled on `usbpd::sink::device_policy_manager::DevicePolicyManager`:
//! every hook is an `async fn` with a default no-op body, so a concrete DPM
//! overrides only the callbacks it cares about. The Policy Engine never
//! makes a power decision itself; it always asks the DPM.

use pd_sink_traits::TccLevel;

use crate::message::pdo::SourceCapabilities;
use crate::message::rdo::PowerSource;
use crate::message::sink_capabilities::SinkCapabilities;

/// Outcome of [`DevicePolicyManager::evaluate_capability`]: which object to
/// request, and with what current, or that none are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Evaluation {
    /// Request this object.
    Request(PowerSource),
    /// None of the advertised PDOs are acceptable; request object 1
    /// (`Vsafe5V`) with the Capability Mismatch bit set.
    CapabilityMismatch,
}

/// Notifications the Policy Engine raises that a DPM may act on but is not
/// required to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A new explicit contract was entered (first negotiation or renegotiation).
    ContractEstablished,
    /// The source rejected the sink's request; the previous contract, if
    /// any, remains in effect.
    RequestRejected,
    /// The source sent `Wait` in reply to the sink's request.
    RequestWaited,
    /// A Hard Reset occurred (either direction) and negotiation is restarting.
    HardReset,
    /// The source never responded; the port is giving up (spec.md's
    /// `SourceUnresponsive` terminal state).
    SourceUnresponsive,
}

/// Hooks the Policy Engine calls out to while negotiating and holding a contract.
pub trait DevicePolicyManager {
    /// Called once the Policy Engine enters `Startup`, before anything else.
    fn pd_start(&mut self) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Choose which object (if any) to request from a newly received
    /// `Source_Capabilities`.
    fn evaluate_capability(&mut self, capabilities: &SourceCapabilities) -> impl core::future::Future<Output = Evaluation>;

    /// The sink's own capabilities, sent in reply to `Get_Sink_Cap`.
    fn get_sink_capability(&mut self) -> impl core::future::Future<Output = SinkCapabilities>;

    /// `true` if the sink's requests should set the Giveback flag (accepting
    /// a lower minimum current if the source is power-constrained).
    fn giveback_enabled(&mut self) -> impl core::future::Future<Output = bool> {
        async { false }
    }

    /// Drive the sink's output to the default (unconfigured, Vsafe5V) power level.
    fn transition_default(&mut self) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Drive the sink's output to a lower (GotoMin) power level.
    fn transition_min(&mut self) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Drive the sink's output to a safe standby level during a transition.
    fn transition_standby(&mut self) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Drive the sink's output to the level described by `accepted`, called
    /// once `PS_RDY` confirms the source has switched.
    fn transition_requested(&mut self, accepted: PowerSource) -> impl core::future::Future<Output = ()>;

    /// Drive the sink's Type-C current advertisement.
    fn transition_typec(&mut self, level: TccLevel) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Classify a legacy Type-C current advertisement into a DPM-defined
    /// bucket. `SourceUnresponsive` compares two consecutive samples and
    /// only calls [`DevicePolicyManager::transition_typec`] once they agree;
    /// the default of `None` means this DPM does not classify current at
    /// all, so `SourceUnresponsive` never calls `transition_typec`.
    fn evaluate_typec_current(&mut self, level: TccLevel) -> impl core::future::Future<Output = Option<i8>> {
        let _ = level;
        async { None }
    }

    /// The source replied `Not_Supported` to a message the sink originated.
    fn not_supported_received(&mut self) -> impl core::future::Future<Output = ()> {
        async {}
    }

    /// Informational upcall for state changes a DPM may want to log or act on.
    fn inform(&mut self, event: Event) -> impl core::future::Future<Output = ()> {
        let _ = event;
        async {}
    }
}
