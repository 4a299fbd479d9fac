//! Request Data Objects: the sink's `Request` message body.
//!
//! Grounded on `usbpd::protocol_layer::message::request`; this crate builds
//! only the two variants the Policy Engine ever emits (`Select_Cap`/giveback
//! against a fixed or variable supply, and a periodic PPS request) — Battery
//! requests are parsed for completeness of the wire format but the sink
//! state machine never originates one.

use proc_bitfield::bitfield;
use uom::si::electric_current::milliampere;
use uom::si::power::milliwatt;
use uom::si::u32::{ElectricCurrent, Power};

use crate::message::pdo::Kind;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A request against a fixed-supply or variable-supply PDO.
    pub struct FixedVariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// 1-based index into the source's `Source_Capabilities` objects.
        pub object_position: u8 @ 28..=31,
        pub giveback_flag: bool @ 27,
        pub capability_mismatch: bool @ 26,
        pub usb_comms_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        pub unchunked_extended_messages_supported: bool @ 23,
        /// 10 mA units. Minimum acceptable current when `giveback_flag` is set.
        pub raw_min_operating_current: u16 @ 10..=19,
        /// 10 mA units.
        pub raw_operating_current: u16 @ 0..=9,
    }
}

impl FixedVariableSupply {
    /// Build a request for `object_position` (1-based) drawing `operating_current`.
    pub fn new(object_position: u8, operating_current: ElectricCurrent, no_usb_suspend: bool) -> Self {
        Self(0)
            .with_object_position(object_position)
            .with_no_usb_suspend(no_usb_suspend)
            .with_usb_comms_capable(false)
            .with_raw_operating_current((operating_current.get::<milliampere>() / 10) as u16)
            .with_raw_min_operating_current((operating_current.get::<milliampere>() / 10) as u16)
    }

    /// The requested operating current.
    pub fn operating_current(self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(self.raw_operating_current() as u32 * 10)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A request against a battery PDO.
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        pub object_position: u8 @ 28..=31,
        pub giveback_flag: bool @ 27,
        pub capability_mismatch: bool @ 26,
        pub usb_comms_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        pub unchunked_extended_messages_supported: bool @ 23,
        /// 250 mW units. Minimum acceptable power when `giveback_flag` is set.
        pub raw_min_operating_power: u16 @ 10..=19,
        /// 250 mW units.
        pub raw_operating_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The requested operating power.
    pub fn operating_power(self) -> Power {
        Power::new::<milliwatt>(self.raw_operating_power() as u32 * 250)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A request against an SPR PPS Augmented PDO.
    pub struct Pps(pub u32): Debug, FromStorage, IntoStorage {
        pub object_position: u8 @ 28..=31,
        pub capability_mismatch: bool @ 26,
        pub usb_comms_capable: bool @ 25,
        pub no_usb_suspend: bool @ 24,
        /// 20 mV units.
        pub raw_output_voltage: u16 @ 9..=19,
        /// 50 mA units.
        pub raw_operating_current: u8 @ 0..=6,
    }
}

impl Pps {
    /// Build a PPS request for `object_position` (1-based) at the given voltage/current.
    pub fn new(object_position: u8, output_voltage: uom::si::u32::ElectricPotential, operating_current: ElectricCurrent) -> Self {
        use uom::si::electric_potential::millivolt;
        Self(0)
            .with_object_position(object_position)
            .with_no_usb_suspend(true)
            .with_raw_output_voltage((output_voltage.get::<millivolt>() / 20) as u16)
            .with_raw_operating_current((operating_current.get::<milliampere>() / 50) as u8)
    }
}

/// A decoded `Request` message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSource {
    /// A request against a fixed or variable supply.
    FixedVariableSupply(FixedVariableSupply),
    /// A request against a battery.
    Battery(Battery),
    /// A request against an SPR PPS Augmented PDO.
    Pps(Pps),
}

impl PowerSource {
    /// Decode a raw `Request` data object, given the [`Kind`] of the PDO it targets.
    pub fn parse(raw: u32, target_kind: Kind) -> Self {
        match target_kind {
            Kind::Battery => Self::Battery(Battery(raw)),
            Kind::Augmented => Self::Pps(Pps(raw)),
            Kind::FixedSupply | Kind::VariableSupply => Self::FixedVariableSupply(FixedVariableSupply(raw)),
        }
    }

    /// Encode back to the raw 32-bit representation.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::FixedVariableSupply(rdo) => rdo.0,
            Self::Battery(rdo) => rdo.0,
            Self::Pps(rdo) => rdo.0,
        }
    }

    /// The 1-based object position this request targets.
    pub fn object_position(self) -> u8 {
        match self {
            Self::FixedVariableSupply(rdo) => rdo.object_position(),
            Self::Battery(rdo) => rdo.object_position(),
            Self::Pps(rdo) => rdo.object_position(),
        }
    }
}
