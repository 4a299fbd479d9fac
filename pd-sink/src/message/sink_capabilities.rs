//! The sink's own advertised capabilities, sent in reply to `Get_Sink_Cap`.
//!
//! Grounded on `usbpd::protocol_layer::message::data::sink_capabilities`;
//! the sink-side fixed-supply PDO layout differs from the source-side one
//! in [`crate::message::pdo`] (fast role swap bits instead of dual-role bits).

use proc_bitfield::bitfield;
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;
use uom::si::u32::{ElectricCurrent, ElectricPotential};

/// Fast role swap current a sink is willing to draw immediately after a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FastRoleSwapCurrent {
    /// Fast role swap not supported.
    NotSupported,
    /// 900 mA default USB current.
    Default,
    /// 1.5 A.
    Current1A5,
    /// 3.0 A.
    Current3A0,
}

impl From<u8> for FastRoleSwapCurrent {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::NotSupported,
            0b01 => Self::Default,
            0b10 => Self::Current1A5,
            _ => Self::Current3A0,
        }
    }
}

impl From<FastRoleSwapCurrent> for u8 {
    fn from(value: FastRoleSwapCurrent) -> Self {
        match value {
            FastRoleSwapCurrent::NotSupported => 0b00,
            FastRoleSwapCurrent::Default => 0b01,
            FastRoleSwapCurrent::Current1A5 => 0b10,
            FastRoleSwapCurrent::Current3A0 => 0b11,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A fixed-voltage sink PDO.
    pub struct SinkFixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        pub kind_raw: u8 @ 30..=31,
        pub dual_role_power: bool @ 29,
        pub higher_capability: bool @ 28,
        pub unconstrained_power: bool @ 27,
        pub usb_comms_capable: bool @ 26,
        pub dual_role_data: bool @ 25,
        pub fast_role_swap_current: u8 [get FastRoleSwapCurrent, set FastRoleSwapCurrent] @ 23..=24,
        /// 50 mV units.
        pub raw_voltage: u16 @ 10..=19,
        /// 10 mA units.
        pub raw_operational_current: u16 @ 0..=9,
    }
}

impl SinkFixedSupply {
    /// Construct the sink's `Vsafe5V` fixed-supply entry, used as object 1.
    pub fn vsafe_5v(operational_current: ElectricCurrent) -> Self {
        Self(0)
            .with_raw_voltage(100)
            .with_raw_operational_current((operational_current.get::<milliampere>() / 10) as u16)
    }

    /// The requested voltage.
    pub fn voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_voltage() as u32 * 50)
    }

    /// The requested operational current.
    pub fn operational_current(self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(self.raw_operational_current() as u32 * 10)
    }
}

/// The sink's `Sink_Capabilities` message body, sent in reply to `Get_Sink_Cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkCapabilities {
    objects: heapless::Vec<SinkFixedSupply, 7>,
}

impl SinkCapabilities {
    /// Build a `Sink_Capabilities` body holding a single `Vsafe5V` entry,
    /// the minimum contract any USB-PD sink must advertise.
    pub fn single_fixed(operational_current: ElectricCurrent) -> Self {
        let mut objects = heapless::Vec::new();
        let _ = objects.push(SinkFixedSupply::vsafe_5v(operational_current));
        Self { objects }
    }

    /// Build from already-decoded fixed-supply PDOs (used when parsing a
    /// received `Sink_Capabilities`, which this crate only does in tests).
    pub fn from_objects(objects: heapless::Vec<SinkFixedSupply, 7>) -> Self {
        Self { objects }
    }

    /// The decoded fixed-supply sink PDOs.
    pub fn objects(&self) -> &[SinkFixedSupply] {
        &self.objects
    }

    /// Encode to raw 32-bit data objects.
    pub fn to_raw(&self, out: &mut heapless::Vec<u32, 7>) {
        for pdo in &self.objects {
            let _ = out.push(pdo.0);
        }
    }
}
