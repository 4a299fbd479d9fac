//! Test-only stand-ins for [`Phy`], [`Timer`] and [`DevicePolicyManager`].
//!
//! Grounded on `usbpd::dummy`: a scripted driver/timer pair lets tests drive
//! each state machine without real hardware or wall-clock time. Unlike the
//! teacher's `Driver`, [`Phy`] is synchronous, so `DummyPhy` just queues
//! frames and status bits for the next poll rather than awaiting anything.

use std::collections::VecDeque;
use std::future::pending;
use std::vec::Vec;

use pd_sink_traits::{Phy, PhyError, Status, TccLevel};
use uom::si::electric_current::ampere;
use uom::si::electric_potential::volt;
use uom::si::u32::{ElectricCurrent, ElectricPotential};

use crate::message::pdo::SourceCapabilities;
use crate::message::rdo::{FixedVariableSupply, PowerSource};
use crate::message::sink_capabilities::SinkCapabilities;
use crate::sink::dpm::{DevicePolicyManager, Evaluation, Event};
use crate::timers::{Timer, TimerType};

/// A scripted PHY: queued frames to "receive" and a capture log of frames
/// handed to [`Phy::send_message`].
pub struct DummyPhy {
    rx_queue: VecDeque<heapless::Vec<u8, 32>>,
    tx_log: Vec<heapless::Vec<u8, 32>>,
    pending_status: Status,
    intn: bool,
    typec_current: TccLevel,
    hardrst_sent: bool,
    next_send_error: Option<PhyError>,
}

impl Default for DummyPhy {
    fn default() -> Self {
        Self {
            rx_queue: VecDeque::new(),
            tx_log: Vec::new(),
            pending_status: Status::default(),
            intn: false,
            typec_current: TccLevel::SinkTxOk,
            hardrst_sent: false,
            next_send_error: None,
        }
    }
}

impl DummyPhy {
    /// A fresh PHY with nothing latched and `SinkTxOk` advertised (so PD3.0
    /// collision avoidance never blocks a test unless it asks for that).
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `data` as the next frame `read_message` returns, and latch
    /// `I_GCRCSENT`/`INT_N` as a real PHY would on receiving it.
    pub fn latch_message_received(&mut self, data: &[u8]) {
        let mut frame = heapless::Vec::new();
        let _ = frame.extend_from_slice(data);
        self.rx_queue.push_back(frame);
        self.pending_status.i_gcrcsent = true;
        self.intn = true;
    }

    /// Latch `I_TXSENT`: the pending transmission completed.
    pub fn latch_tx_sent(&mut self) {
        self.pending_status.i_txsent = true;
        self.intn = true;
    }

    /// Latch `I_RETRYFAIL`: the PHY's own retry budget was exhausted.
    pub fn latch_retry_fail(&mut self) {
        self.pending_status.i_retryfail = true;
        self.intn = true;
    }

    /// Latch a Hard Reset ordering set received from the port partner.
    pub fn latch_hard_reset_received(&mut self) {
        self.pending_status.i_hardrst = true;
        self.intn = true;
    }

    /// Latch completion of hard-reset signaling requested via `send_hardrst`.
    pub fn latch_hard_reset_sent(&mut self) {
        self.pending_status.i_hardsent = true;
        self.intn = true;
    }

    /// Latch an over-current/over-temperature condition.
    pub fn latch_overtemp(&mut self) {
        self.pending_status.i_ocp_temp = true;
        self.pending_status.ovrtemp = true;
        self.intn = true;
    }

    /// Drive the advertised Type-C current.
    pub fn set_typec_current(&mut self, level: TccLevel) {
        self.typec_current = level;
    }

    /// `true` once `send_hardrst` has been called at least once.
    pub fn hard_reset_was_sent(&self) -> bool {
        self.hardrst_sent
    }

    /// Every frame handed to `send_message`, oldest first.
    pub fn transmitted_frames(&self) -> &[heapless::Vec<u8, 32>] {
        &self.tx_log
    }

    /// Make the next `send_message` call fail with `error`.
    pub fn fail_next_send(&mut self, error: PhyError) {
        self.next_send_error = Some(error);
    }
}

impl Phy for DummyPhy {
    fn reset(&mut self) {
        self.rx_queue.clear();
    }

    fn send_message(&mut self, data: &[u8]) -> Result<(), PhyError> {
        if let Some(err) = self.next_send_error.take() {
            return Err(err);
        }
        let mut frame = heapless::Vec::new();
        let _ = frame.extend_from_slice(data);
        self.tx_log.push(frame);
        Ok(())
    }

    fn send_hardrst(&mut self) -> Result<(), PhyError> {
        self.hardrst_sent = true;
        Ok(())
    }

    fn read_message(&mut self, buffer: &mut [u8]) -> Result<usize, PhyError> {
        let frame = self.rx_queue.pop_front().ok_or(PhyError::BufferTooSmall)?;
        if buffer.len() < frame.len() {
            return Err(PhyError::BufferTooSmall);
        }
        buffer[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn get_status(&mut self) -> Status {
        self.intn = false;
        core::mem::take(&mut self.pending_status)
    }

    fn get_typec_current(&self) -> TccLevel {
        self.typec_current
    }

    fn intn_asserted(&self) -> bool {
        self.intn
    }
}

/// A scripted timer: every [`TimerType`] pends forever unless armed, so a
/// test only races the timeout it is actually exercising.
#[derive(Default)]
pub struct DummyTimer {
    armed: core::cell::RefCell<Vec<TimerType>>,
}

impl DummyTimer {
    /// A timer with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `after(timer)` call for this [`TimerType`] resolve
    /// immediately instead of pending forever.
    pub fn arm(&self, timer: TimerType) {
        self.armed.borrow_mut().push(timer);
    }
}

impl Timer for DummyTimer {
    async fn after(&self, timer: TimerType) {
        let position = self.armed.borrow().iter().position(|&t| t == timer);
        match position {
            Some(index) => {
                self.armed.borrow_mut().remove(index);
            }
            None => pending::<()>().await,
        }
    }
}

/// A minimal [`DevicePolicyManager`] that records every upcall it receives,
/// for asserting call order and counts in scenario tests.
pub struct DummyDpm {
    /// If set, the next `evaluate_capability` call returns this instead of
    /// picking the highest fixed supply within 20 V.
    pub queued_request: Option<PowerSource>,
    /// Returned by `get_sink_capability`.
    pub sink_capability: SinkCapabilities,
    /// Returned by `giveback_enabled`.
    pub giveback: bool,
    /// Consumed in order by `evaluate_typec_current`; `None` once drained.
    pub typec_samples: VecDeque<Option<i8>>,
    /// Number of `pd_start` calls.
    pub pd_start_calls: u32,
    /// Number of `transition_default` calls.
    pub transition_default_calls: u32,
    /// Number of `transition_min` calls.
    pub transition_min_calls: u32,
    /// Number of `transition_standby` calls.
    pub transition_standby_calls: u32,
    /// Every `accepted` passed to `transition_requested`, in call order.
    pub transition_requested_calls: Vec<PowerSource>,
    /// Every level passed to `transition_typec`, in call order.
    pub transition_typec_calls: Vec<TccLevel>,
    /// Number of `not_supported_received` calls.
    pub not_supported_received_calls: u32,
    /// Every event passed to `inform`, in call order.
    pub informed_events: Vec<Event>,
}

impl Default for DummyDpm {
    fn default() -> Self {
        Self {
            queued_request: None,
            sink_capability: SinkCapabilities::single_fixed(ElectricCurrent::new::<ampere>(3)),
            giveback: false,
            typec_samples: VecDeque::new(),
            pd_start_calls: 0,
            transition_default_calls: 0,
            transition_min_calls: 0,
            transition_standby_calls: 0,
            transition_requested_calls: Vec::new(),
            transition_typec_calls: Vec::new(),
            not_supported_received_calls: 0,
            informed_events: Vec::new(),
        }
    }
}

impl DummyDpm {
    /// A fresh DPM with the default 3 A `Sink_Capabilities` and no scripted request.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DevicePolicyManager for DummyDpm {
    async fn pd_start(&mut self) {
        self.pd_start_calls += 1;
    }

    async fn evaluate_capability(&mut self, capabilities: &SourceCapabilities) -> Evaluation {
        if let Some(request) = self.queued_request.take() {
            return Evaluation::Request(request);
        }
        match capabilities.highest_fixed_within(ElectricPotential::new::<volt>(20)) {
            Some((index, _)) => Evaluation::Request(PowerSource::FixedVariableSupply(FixedVariableSupply::new(
                (index + 1) as u8,
                ElectricCurrent::new::<ampere>(1),
                true,
            ))),
            None => Evaluation::CapabilityMismatch,
        }
    }

    async fn get_sink_capability(&mut self) -> SinkCapabilities {
        self.sink_capability.clone()
    }

    async fn giveback_enabled(&mut self) -> bool {
        self.giveback
    }

    async fn transition_default(&mut self) {
        self.transition_default_calls += 1;
    }

    async fn transition_min(&mut self) {
        self.transition_min_calls += 1;
    }

    async fn transition_standby(&mut self) {
        self.transition_standby_calls += 1;
    }

    async fn transition_requested(&mut self, accepted: PowerSource) {
        self.transition_requested_calls.push(accepted);
    }

    async fn transition_typec(&mut self, level: TccLevel) {
        self.transition_typec_calls.push(level);
    }

    async fn evaluate_typec_current(&mut self, _level: TccLevel) -> Option<i8> {
        self.typec_samples.pop_front().unwrap_or(None)
    }

    async fn not_supported_received(&mut self) {
        self.not_supported_received_calls += 1;
    }

    async fn inform(&mut self, event: Event) {
        self.informed_events.push(event);
    }
}
