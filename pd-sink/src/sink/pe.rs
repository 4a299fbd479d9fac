//! The Policy Engine (spec.md section 4.5): the single state machine that
//! owns contract negotiation, reset recovery, and every DPM upcall.
//!
//! Grounded on `usbpd::sink::policy_engine::Sink`: same per-state shape (one
//! `update_state`-equivalent step per state, errors routed back into state
//! transitions rather than propagated), generalized from that file's
//! `(State, ProtocolError)` match table into explicit per-state error
//! handling now that `PrlTx::transmit` is a plain `async fn` rather than a
//! message the protocol layer's own loop reacts to.

use core::cell::RefCell;

use embassy_futures::select::{select, select3, select4, Either, Either3, Either4};
use pd_sink_traits::Phy;
use uom::si::u32::ElectricCurrent;

use crate::config::PdConfig;
use crate::counters::{Counter, CounterType};
use crate::error::PrlError;
use crate::events::EventFlags;
use crate::mailbox::Mailbox;
use crate::message::header::{ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision};
use crate::message::rdo::{FixedVariableSupply, PowerSource};
use crate::message::{Data, PdMsg, Payload};
use crate::protocol::{prl_hr, PrlHr, PrlRx, PrlTx};
use crate::sink::dpm::{DevicePolicyManager, Evaluation, Event};
use crate::timers::{Timer, TimerType};
use crate::warn;

/// Set by the INT_N poller when the PHY reports an over-temperature condition.
pub const EVT_OVERTEMP: u32 = 1 << 0;
/// Set by host code to request a fresh `Get_Source_Cap` round trip.
pub const EVT_GET_SOURCE_CAP: u32 = 1 << 1;
/// Set by host code to ask the Policy Engine to re-evaluate the cached
/// `Source_Capabilities` against the DPM, e.g. after a power budget change.
pub const EVT_NEW_POWER: u32 = 1 << 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    Startup,
    Discovery,
    WaitCap,
    EvalCap,
    SelectCap(PowerSource),
    TransitionSink(PowerSource),
    Ready,
    GetSourceCap,
    GiveSinkCap,
    SendNotSupported,
    SendSoftReset,
    HardReset,
    TransitionDefault,
    SoftReset,
    ChunkReceived,
    NotSupportedReceived,
    SourceUnresponsive,
}

/// The Policy Engine. Generic over the [`DevicePolicyManager`] a product
/// supplies; the Policy Engine never makes a power decision on its own.
pub struct Pe<DPM: DevicePolicyManager> {
    dpm: DPM,
    hdr_template: Header,
    spec_revision: SpecificationRevision,
    sink_operational_current: ElectricCurrent,
    state: State,
    /// Event bits this Policy Engine suspends on in `Ready`; set by the
    /// INT_N poller (`EVT_OVERTEMP`) or by host code (`EVT_GET_SOURCE_CAP`,
    /// `EVT_NEW_POWER`).
    pub events: EventFlags,
    explicit_contract: bool,
    min_power: bool,
    hard_reset_counter: Counter,
    last_pps: u8,
    pps_armed: bool,
    source_capabilities: Option<crate::message::pdo::SourceCapabilities>,
    last_request: Option<PowerSource>,
    old_tcc_match: Option<i8>,
}

impl<DPM: DevicePolicyManager> Pe<DPM> {
    /// Build a fresh Policy Engine, starting in `Startup`.
    pub fn new(dpm: DPM, config: &PdConfig) -> Self {
        Self {
            dpm,
            hdr_template: config.header_template(),
            spec_revision: config.spec_revision,
            sink_operational_current: config.sink_operational_current,
            state: State::Startup,
            events: EventFlags::new(),
            explicit_contract: false,
            min_power: false,
            hard_reset_counter: Counter::new(CounterType::HardReset),
            last_pps: 8,
            pps_armed: false,
            source_capabilities: None,
            last_request: None,
            old_tcc_match: None,
        }
    }

    /// `true` once an explicit contract is in effect.
    pub fn has_explicit_contract(&self) -> bool {
        self.explicit_contract
    }

    /// Number of Hard Resets attempted since the last successful
    /// negotiation. Exposed for tests; the Policy Engine itself only ever
    /// compares this against [`CounterType::HardReset`]'s ceiling.
    pub fn hard_reset_attempts(&self) -> u8 {
        self.hard_reset_counter.value()
    }

    /// Ask the Policy Engine to request a fresh `Source_Capabilities` the
    /// next time it reaches `Ready` (spec.md's `GET_SOURCE_CAP` event).
    pub fn request_source_capabilities(&self) {
        self.events.set(EVT_GET_SOURCE_CAP);
    }

    /// Ask the Policy Engine to re-evaluate the cached capabilities against
    /// the DPM without a fresh `Source_Capabilities` round trip (spec.md's
    /// `NEW_POWER` event, e.g. after a DPM-side power budget change).
    pub fn request_new_power(&self) {
        self.events.set(EVT_NEW_POWER);
    }

    /// Run forever, driving one state transition per call to the shared
    /// resources: the PHY, the named timers, PRL_Rx's inbound mailbox,
    /// PRL_Tx's transmit entry point, and PRL_HR's request/completion pair.
    #[allow(clippy::too_many_arguments)]
    pub async fn run<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        prl_rx: &PrlRx,
        prl_tx: &PrlTx,
        prl_hr: &PrlHr,
        hard_reset_done: &Mailbox<(), 4>,
    ) -> ! {
        loop {
            self.step(phy, timer, inbox, prl_rx, prl_tx, prl_hr, hard_reset_done).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn step<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        prl_rx: &PrlRx,
        prl_tx: &PrlTx,
        prl_hr: &PrlHr,
        hard_reset_done: &Mailbox<(), 4>,
    ) {
        match self.state {
            State::Startup => self.do_startup().await,
            State::Discovery => self.state = State::WaitCap,
            State::WaitCap => self.do_wait_cap(timer, inbox, hard_reset_done).await,
            State::EvalCap => self.do_eval_cap().await,
            State::SelectCap(rdo) => self.do_select_cap(phy, timer, inbox, hard_reset_done, prl_tx, rdo).await,
            State::TransitionSink(rdo) => self.do_transition_sink(timer, inbox, hard_reset_done, rdo).await,
            State::Ready => self.do_ready(phy, timer, inbox, hard_reset_done).await,
            State::GetSourceCap => self.do_get_source_cap(phy, timer, hard_reset_done, prl_tx).await,
            State::GiveSinkCap => self.do_give_sink_cap(phy, timer, hard_reset_done, prl_tx).await,
            State::SendNotSupported => self.do_send_not_supported(phy, timer, hard_reset_done, prl_tx).await,
            State::SendSoftReset => self.do_send_soft_reset(phy, timer, inbox, hard_reset_done, prl_rx, prl_tx).await,
            State::HardReset => self.do_hard_reset(prl_hr, hard_reset_done).await,
            State::TransitionDefault => self.do_transition_default().await,
            State::SoftReset => self.do_soft_reset(phy, timer, hard_reset_done, prl_rx, prl_tx).await,
            State::ChunkReceived => self.do_chunk_received(timer, hard_reset_done).await,
            State::NotSupportedReceived => self.do_not_supported_received().await,
            State::SourceUnresponsive => self.do_source_unresponsive(phy, timer).await,
        }
    }

    async fn do_startup(&mut self) {
        self.explicit_contract = false;
        self.dpm.pd_start().await;
        self.state = State::Discovery;
    }

    /// If this port started at the deprecated 1.0 revision, adopt whatever
    /// higher revision the source's `Source_Capabilities` header carries.
    fn maybe_upgrade_spec_revision(&mut self, peer_header: Header) {
        if self.spec_revision != SpecificationRevision::R1_0 {
            return;
        }
        self.spec_revision = match peer_header.spec_revision() {
            Ok(SpecificationRevision::R3_X) => SpecificationRevision::R3_X,
            _ => SpecificationRevision::R2_0,
        };
        self.hdr_template = self.hdr_template.with_spec_revision(self.spec_revision);
    }

    async fn do_wait_cap<T: Timer>(&mut self, timer: &T, inbox: &Mailbox<PdMsg, 4>, hard_reset_done: &Mailbox<(), 4>) {
        match select4(
            inbox.recv(),
            hard_reset_done.recv(),
            self.events.wait(EVT_OVERTEMP),
            timer.after(TimerType::SinkWaitCap),
        )
        .await
        {
            Either4::First(msg) => self.handle_wait_cap_message(msg),
            Either4::Second(()) => self.state = State::TransitionDefault,
            Either4::Third(_) => self.state = State::HardReset,
            Either4::Fourth(()) => self.state = State::HardReset,
        }
    }

    fn handle_wait_cap_message(&mut self, msg: PdMsg) {
        if let Payload::Data(Data::SourceCapabilities(caps)) = &msg.payload {
            if !caps.objects().is_empty() {
                self.maybe_upgrade_spec_revision(msg.header);
                self.source_capabilities = Some(caps.clone());
                self.state = State::EvalCap;
                return;
            }
        }
        self.state = if matches!(msg.header.message_type(), MessageType::Control(ControlMessageType::SoftReset)) {
            State::SoftReset
        } else {
            State::HardReset
        };
    }

    async fn do_eval_cap(&mut self) {
        let caps = match &self.source_capabilities {
            Some(caps) => caps.clone(),
            None => {
                self.state = State::GetSourceCap;
                return;
            }
        };

        let rdo = match self.dpm.evaluate_capability(&caps).await {
            Evaluation::Request(rdo) => rdo,
            Evaluation::CapabilityMismatch => PowerSource::FixedVariableSupply(
                FixedVariableSupply::new(1, self.sink_operational_current, true).with_capability_mismatch(true),
            ),
        };

        self.last_request = Some(rdo);
        self.state = State::SelectCap(rdo);
    }

    async fn do_select_cap<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        hard_reset_done: &Mailbox<(), 4>,
        prl_tx: &PrlTx,
        rdo: PowerSource,
    ) {
        let msg = PdMsg::request(self.hdr_template, Counter::new(CounterType::MessageId), rdo);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            Ok(()) => {}
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
                return;
            }
            Err(e) => {
                warn!("PE: Request transmit failed: {:?}", e);
                self.state = State::HardReset;
                return;
            }
        }

        // Armed on every request, accepted or not: a rejected PPS request
        // still means the sink wants to keep pinging the source for it.
        self.pps_armed = self.spec_revision.is_pd3() && matches!(rdo, PowerSource::Pps(_));

        match select3(inbox.recv(), hard_reset_done.recv(), timer.after(TimerType::SenderResponseTimeout)).await {
            Either3::First(reply) => self.handle_select_cap_reply(reply, rdo).await,
            Either3::Second(()) => self.state = State::TransitionDefault,
            Either3::Third(()) => self.state = State::HardReset,
        }
    }

    async fn handle_select_cap_reply(&mut self, reply: PdMsg, rdo: PowerSource) {
        match reply.header.message_type() {
            MessageType::Control(ControlMessageType::Accept) => {
                // Same PPS object re-requested: skip the standby transition,
                // the output is already sitting at (close to) this level.
                if rdo.object_position() != self.last_pps {
                    self.dpm.transition_standby().await;
                }
                self.min_power = false;
                self.state = State::TransitionSink(rdo);
            }
            MessageType::Control(ControlMessageType::SoftReset) => self.state = State::SoftReset,
            MessageType::Control(ControlMessageType::Reject) | MessageType::Control(ControlMessageType::Wait) => {
                let waited = matches!(reply.header.message_type(), MessageType::Control(ControlMessageType::Wait));
                self.dpm.inform(if waited { Event::RequestWaited } else { Event::RequestRejected }).await;
                if !self.explicit_contract {
                    self.state = State::WaitCap;
                } else {
                    self.min_power = waited;
                    self.state = State::Ready;
                }
            }
            _ => self.state = State::SendSoftReset,
        }
    }

    async fn do_transition_sink<T: Timer>(
        &mut self,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        hard_reset_done: &Mailbox<(), 4>,
        rdo: PowerSource,
    ) {
        match select3(inbox.recv(), hard_reset_done.recv(), timer.after(TimerType::PsTransition)).await {
            Either3::First(msg) if matches!(msg.header.message_type(), MessageType::Control(ControlMessageType::PsRdy)) => {
                self.explicit_contract = true;
                // A successful renegotiation forgives past hard resets: per
                // spec.md's Open Question on `hard_reset_counter`, it never
                // decrements mid-negotiation but is forgiven once a contract
                // is actually reached.
                self.hard_reset_counter.reset();
                // Record what PPS object (if any) is now actually active, so
                // a later re-request of the same object skips the standby
                // transition. Updated here rather than in `do_eval_cap`
                // because the periodic PPS keep-alive re-enters `SelectCap`
                // directly, without a fresh capability evaluation.
                self.last_pps = match rdo {
                    PowerSource::Pps(pps) => pps.object_position(),
                    _ => 8,
                };
                self.dpm.inform(Event::ContractEstablished).await;
                if !self.min_power {
                    self.dpm.transition_requested(rdo).await;
                }
                self.state = State::Ready;
            }
            Either3::First(_) => {
                self.dpm.transition_default().await;
                self.state = State::HardReset;
            }
            Either3::Second(()) => self.state = State::TransitionDefault,
            Either3::Third(()) => {
                self.dpm.transition_default().await;
                self.state = State::HardReset;
            }
        }
    }

    async fn do_ready<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        hard_reset_done: &Mailbox<(), 4>,
    ) {
        // Non-blocking precheck approximating spec.md's fixed-priority
        // dispatch order (RESET > OVERTEMP > GET_SOURCE_CAP > NEW_POWER >
        // ... > MSG_RX) without a single combined wake primitive: a bit
        // pending here is serviced before the blocking select below ever
        // looks at an incoming message.
        if hard_reset_done.try_recv().is_some() {
            self.state = State::TransitionDefault;
            return;
        }
        if self.events.take(EVT_OVERTEMP) != 0 {
            self.state = State::HardReset;
            return;
        }
        if self.events.take(EVT_GET_SOURCE_CAP) != 0 {
            self.state = State::GetSourceCap;
            return;
        }
        if self.events.take(EVT_NEW_POWER) != 0 {
            self.state = State::EvalCap;
            return;
        }

        let retry_timer = async {
            if self.min_power {
                timer.after(TimerType::SinkRequest).await;
            } else if self.pps_armed {
                timer.after(TimerType::PpsRequest).await;
            } else {
                core::future::pending::<()>().await;
            }
        };

        match select4(
            inbox.recv(),
            hard_reset_done.recv(),
            self.events.wait(EVT_OVERTEMP | EVT_GET_SOURCE_CAP | EVT_NEW_POWER),
            retry_timer,
        )
        .await
        {
            Either4::First(msg) => self.dispatch_ready_message(msg).await,
            Either4::Second(()) => self.state = State::TransitionDefault,
            Either4::Third(bits) => {
                self.state = if bits & EVT_OVERTEMP != 0 {
                    State::HardReset
                } else if bits & EVT_GET_SOURCE_CAP != 0 {
                    State::GetSourceCap
                } else {
                    State::EvalCap
                };
            }
            Either4::Fourth(()) => {
                // Resend the same request the DPM already picked; a timed
                // retry does not re-involve the DPM.
                self.state = match self.last_request {
                    Some(rdo) => State::SelectCap(rdo),
                    None => State::GetSourceCap,
                };
            }
        }
    }

    async fn dispatch_ready_message(&mut self, msg: PdMsg) {
        match &msg.payload {
            Payload::Control => match msg.header.message_type() {
                MessageType::Control(ControlMessageType::Ping) => {}
                MessageType::Control(
                    ControlMessageType::GetSourceCap
                    | ControlMessageType::DrSwap
                    | ControlMessageType::PrSwap
                    | ControlMessageType::VconnSwap,
                ) => {
                    self.state = State::SendNotSupported;
                }
                MessageType::Control(ControlMessageType::GotoMin) => {
                    if self.dpm.giveback_enabled().await {
                        self.dpm.transition_min().await;
                        self.min_power = true;
                        self.state = match self.last_request {
                            Some(rdo) => State::TransitionSink(rdo),
                            None => State::SendNotSupported,
                        };
                    } else {
                        self.state = State::SendNotSupported;
                    }
                }
                MessageType::Control(ControlMessageType::GetSinkCap) => self.state = State::GiveSinkCap,
                MessageType::Control(ControlMessageType::SoftReset) => self.state = State::SoftReset,
                MessageType::Control(ControlMessageType::NotSupported) if self.spec_revision.is_pd3() => {
                    self.state = State::NotSupportedReceived;
                }
                _ => self.state = State::SendSoftReset,
            },
            Payload::Data(Data::SourceCapabilities(caps)) => {
                self.source_capabilities = Some(caps.clone());
                self.state = State::EvalCap;
            }
            Payload::Data(Data::Unsupported(DataMessageType::VendorDefined)) => {}
            Payload::Data(_) => self.state = State::SendNotSupported,
            Payload::Extended(ext) if self.spec_revision.is_pd3() => {
                self.state = if ext.is_oversized() { State::ChunkReceived } else { State::SendSoftReset };
            }
            Payload::Extended(_) => self.state = State::SendSoftReset,
        }
    }

    async fn do_get_source_cap<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        hard_reset_done: &Mailbox<(), 4>,
        prl_tx: &PrlTx,
    ) {
        let msg = PdMsg::control(self.hdr_template, Counter::new(CounterType::MessageId), ControlMessageType::GetSourceCap);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            // Having asked for a fresh Source_Capabilities, wait for it the
            // same way the initial negotiation does.
            Ok(()) => self.state = State::WaitCap,
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
            }
            Err(_) => self.state = State::HardReset,
        }
    }

    async fn do_give_sink_cap<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        hard_reset_done: &Mailbox<(), 4>,
        prl_tx: &PrlTx,
    ) {
        let caps = self.dpm.get_sink_capability().await;
        let msg = PdMsg::sink_capabilities(self.hdr_template, Counter::new(CounterType::MessageId), caps);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            Ok(()) => self.state = State::Ready,
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
            }
            Err(_) => self.state = State::HardReset,
        }
    }

    async fn do_send_not_supported<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        hard_reset_done: &Mailbox<(), 4>,
        prl_tx: &PrlTx,
    ) {
        let message_type = if self.spec_revision.is_pd3() {
            ControlMessageType::NotSupported
        } else {
            ControlMessageType::Reject
        };
        let msg = PdMsg::control(self.hdr_template, Counter::new(CounterType::MessageId), message_type);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            Ok(()) => self.state = State::Ready,
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
            }
            Err(_) => self.state = State::SendSoftReset,
        }
    }

    async fn do_send_soft_reset<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        inbox: &Mailbox<PdMsg, 4>,
        hard_reset_done: &Mailbox<(), 4>,
        prl_rx: &PrlRx,
        prl_tx: &PrlTx,
    ) {
        // A Soft_Reset re-synchronizes MessageIDs: the counter must be back
        // at 0 before this Soft_Reset itself goes out, matching
        // `PRLTxReset` zeroing `_tx_messageidcounter` before transmission.
        prl_tx.reset();
        prl_rx.reset_message_id_tracking();
        let msg = PdMsg::control(self.hdr_template, Counter::new(CounterType::MessageId), ControlMessageType::SoftReset);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            Ok(()) => {}
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
                return;
            }
            Err(_) => {
                self.state = State::HardReset;
                return;
            }
        }

        match select3(inbox.recv(), hard_reset_done.recv(), timer.after(TimerType::SenderResponseTimeout)).await {
            Either3::First(reply) => {
                self.state = match reply.header.message_type() {
                    MessageType::Control(ControlMessageType::Accept) => State::WaitCap,
                    MessageType::Control(ControlMessageType::SoftReset) => State::SoftReset,
                    _ => State::HardReset,
                };
            }
            Either3::Second(()) => self.state = State::TransitionDefault,
            Either3::Third(()) => self.state = State::HardReset,
        }
    }

    async fn do_hard_reset(&mut self, prl_hr: &PrlHr, hard_reset_done: &Mailbox<(), 4>) {
        if self.hard_reset_counter.value() > CounterType::HardReset.max_value() {
            self.dpm.inform(Event::SourceUnresponsive).await;
            self.state = State::SourceUnresponsive;
            return;
        }

        prl_hr.events.set(prl_hr::EVT_HARD_RESET_REQUESTED);
        hard_reset_done.recv().await;
        self.hard_reset_counter.increment();
        self.state = State::TransitionDefault;
    }

    async fn do_transition_default(&mut self) {
        self.explicit_contract = false;
        self.dpm.transition_default().await;
        self.dpm.inform(Event::HardReset).await;
        self.state = State::Startup;
    }

    async fn do_soft_reset<P: Phy, T: Timer>(
        &mut self,
        phy: &RefCell<P>,
        timer: &T,
        hard_reset_done: &Mailbox<(), 4>,
        prl_rx: &PrlRx,
        prl_tx: &PrlTx,
    ) {
        // PRL_Rx self-resets on receiving a Soft_Reset (`PRLRxReset` in the
        // original), and the Accept that follows must carry MessageID 0, so
        // both counters are cleared before it is built and sent.
        prl_tx.reset();
        prl_rx.reset_message_id_tracking();
        let msg = PdMsg::control(self.hdr_template, Counter::new(CounterType::MessageId), ControlMessageType::Accept);
        match prl_tx.transmit(phy, timer, msg, self.spec_revision).await {
            Ok(()) => self.state = State::WaitCap,
            Err(PrlError::HardReset) => {
                hard_reset_done.recv().await;
                self.state = State::TransitionDefault;
            }
            Err(_) => self.state = State::HardReset,
        }
    }

    async fn do_chunk_received<T: Timer>(&mut self, timer: &T, hard_reset_done: &Mailbox<(), 4>) {
        match select(hard_reset_done.recv(), timer.after(TimerType::ChunkSenderResponse)).await {
            Either::First(()) => self.state = State::TransitionDefault,
            Either::Second(()) => self.state = State::SendNotSupported,
        }
    }

    async fn do_not_supported_received(&mut self) {
        self.dpm.not_supported_received().await;
        self.state = State::Ready;
    }

    async fn do_source_unresponsive<P: Phy, T: Timer>(&mut self, phy: &RefCell<P>, timer: &T) {
        let current = phy.borrow().get_typec_current();
        if let Some(sample) = self.dpm.evaluate_typec_current(current).await {
            if self.old_tcc_match == Some(sample) {
                self.dpm.transition_typec(current).await;
            }
            self.old_tcc_match = Some(sample);
        }
        timer.after(TimerType::SourceUnresponsiveDebounce).await;
    }
}
