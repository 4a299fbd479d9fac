//! Power Data Objects, as carried in a `Source_Capabilities` message.
//!
//! Bitfield layouts grounded on `usbpd`'s
//! `protocol_layer::message::data::source_capabilities`; unit accessors use
//! `uom` exactly as the teacher crate does, so callers compare currents and
//! voltages instead of raw LSB counts.

use proc_bitfield::bitfield;
use uom::si::electric_current::milliampere;
use uom::si::electric_potential::millivolt;
use uom::si::power::milliwatt;
use uom::si::u32::{ElectricCurrent, ElectricPotential, Power};

use crate::message::ParseError;

/// The kind of Power Data Object a raw 32-bit object encodes, per its top 2 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kind {
    /// A fixed-voltage supply.
    FixedSupply,
    /// A battery supply, described by power rather than current.
    Battery,
    /// A variable (non-regulated, current-limited) supply.
    VariableSupply,
    /// An Augmented PDO: SPR Programmable Power Supply (PPS) in this scope.
    Augmented,
}

impl From<u8> for Kind {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::FixedSupply,
            0b01 => Self::Battery,
            0b10 => Self::VariableSupply,
            _ => Self::Augmented,
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A fixed-supply source PDO (`Kind::FixedSupply`).
    pub struct FixedSupply(pub u32): Debug, FromStorage, IntoStorage {
        /// Top two bits, always `0b00` for this variant.
        pub kind_raw: u8 @ 30..=31,
        /// Source supports USB dual-role data.
        pub dual_role_power: bool @ 29,
        /// Source is USB suspend supported.
        pub usb_suspend_supported: bool @ 28,
        /// Source is unconstrained power (mains-connected, not battery).
        pub unconstrained_power: bool @ 27,
        /// Source supports USB communications over this connection.
        pub usb_comms_capable: bool @ 26,
        /// Source supports dual-role data.
        pub dual_role_data: bool @ 25,
        /// PD3.0: source supports unchunked extended messages. Never acted on, only carried.
        pub unchunked_extended_messages_supported: bool @ 24,
        /// 50 mV units.
        pub raw_voltage: u16 @ 10..=19,
        /// 10 mA units.
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl FixedSupply {
    /// The advertised voltage.
    pub fn voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_voltage() as u32 * 50)
    }

    /// The advertised maximum current.
    pub fn max_current(self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(self.raw_max_current() as u32 * 10)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A battery source PDO (`Kind::Battery`).
    pub struct Battery(pub u32): Debug, FromStorage, IntoStorage {
        pub kind_raw: u8 @ 30..=31,
        /// 50 mV units.
        pub raw_max_voltage: u16 @ 20..=29,
        /// 50 mV units.
        pub raw_min_voltage: u16 @ 10..=19,
        /// 250 mW units.
        pub raw_max_power: u16 @ 0..=9,
    }
}

impl Battery {
    /// The maximum voltage the battery can present.
    pub fn max_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_max_voltage() as u32 * 50)
    }

    /// The minimum voltage the battery can present.
    pub fn min_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_min_voltage() as u32 * 50)
    }

    /// The maximum power the battery can supply.
    pub fn max_power(self) -> Power {
        Power::new::<milliwatt>(self.raw_max_power() as u32 * 250)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// A variable-supply source PDO (`Kind::VariableSupply`).
    pub struct VariableSupply(pub u32): Debug, FromStorage, IntoStorage {
        pub kind_raw: u8 @ 30..=31,
        /// 50 mV units.
        pub raw_max_voltage: u16 @ 20..=29,
        /// 50 mV units.
        pub raw_min_voltage: u16 @ 10..=19,
        /// 10 mA units.
        pub raw_max_current: u16 @ 0..=9,
    }
}

impl VariableSupply {
    /// The maximum voltage this supply can present.
    pub fn max_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_max_voltage() as u32 * 50)
    }

    /// The minimum voltage this supply can present.
    pub fn min_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_min_voltage() as u32 * 50)
    }

    /// The maximum current this supply can source.
    pub fn max_current(self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(self.raw_max_current() as u32 * 10)
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// An SPR Programmable Power Supply PDO, the only Augmented PDO subtype in scope.
    pub struct Pps(pub u32): Debug, FromStorage, IntoStorage {
        pub kind_raw: u8 @ 30..=31,
        /// Augmented PDO subtype, `0b00` for SPR PPS.
        pub apdo_kind: u8 @ 28..=29,
        /// PPS supports power limiting below its nominal current.
        pub pps_power_limited: bool @ 27,
        /// 100 mV units.
        pub raw_max_voltage: u8 @ 17..=24,
        /// 100 mV units.
        pub raw_min_voltage: u8 @ 8..=15,
        /// 50 mA units.
        pub raw_max_current: u8 @ 0..=6,
    }
}

impl Pps {
    /// The maximum voltage this PPS supply can present.
    pub fn max_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_max_voltage() as u32 * 100)
    }

    /// The minimum voltage this PPS supply can present.
    pub fn min_voltage(self) -> ElectricPotential {
        ElectricPotential::new::<millivolt>(self.raw_min_voltage() as u32 * 100)
    }

    /// The maximum current this PPS supply can source.
    pub fn max_current(self) -> ElectricCurrent {
        ElectricCurrent::new::<milliampere>(self.raw_max_current() as u32 * 50)
    }
}

/// A single decoded Power Data Object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerDataObject {
    /// A fixed-voltage supply.
    FixedSupply(FixedSupply),
    /// A battery supply.
    Battery(Battery),
    /// A variable supply.
    VariableSupply(VariableSupply),
    /// An SPR PPS Augmented PDO.
    Pps(Pps),
    /// An Augmented PDO subtype outside this crate's scope (EPR AVS, etc.).
    UnsupportedAugmented(u32),
}

impl PowerDataObject {
    /// Decode a single 32-bit raw data object into its PDO variant.
    pub fn parse(raw: u32) -> Self {
        match Kind::from((raw >> 30) as u8) {
            Kind::FixedSupply => Self::FixedSupply(FixedSupply(raw)),
            Kind::Battery => Self::Battery(Battery(raw)),
            Kind::VariableSupply => Self::VariableSupply(VariableSupply(raw)),
            Kind::Augmented => {
                if (raw >> 28) & 0b11 == 0b00 {
                    Self::Pps(Pps(raw))
                } else {
                    Self::UnsupportedAugmented(raw)
                }
            }
        }
    }

    /// Encode back to the raw 32-bit representation.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::FixedSupply(pdo) => pdo.0,
            Self::Battery(pdo) => pdo.0,
            Self::VariableSupply(pdo) => pdo.0,
            Self::Pps(pdo) => pdo.0,
            Self::UnsupportedAugmented(raw) => raw,
        }
    }
}

/// A decoded `Source_Capabilities` message body: up to seven PDOs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceCapabilities {
    objects: heapless::Vec<PowerDataObject, 7>,
}

impl SourceCapabilities {
    /// Parse `Source_Capabilities` data objects out of their raw wire words.
    pub fn parse(raw: &[u32]) -> Result<Self, ParseError> {
        let mut objects = heapless::Vec::new();
        for &word in raw {
            objects
                .push(PowerDataObject::parse(word))
                .map_err(|_| ParseError::TooManyObjects)?;
        }
        Ok(Self { objects })
    }

    /// The decoded PDOs, in the order the source advertised them (object
    /// position 1 -- the Vsafe5V fixed supply -- is always `objects()[0]`).
    pub fn objects(&self) -> &[PowerDataObject] {
        &self.objects
    }

    /// The index (0-based) and fixed-supply PDO of the highest advertised
    /// fixed voltage that does not exceed `max_voltage`.
    pub fn highest_fixed_within(&self, max_voltage: ElectricPotential) -> Option<(usize, FixedSupply)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, pdo)| match pdo {
                PowerDataObject::FixedSupply(fixed) if fixed.voltage() <= max_voltage => Some((i, *fixed)),
                _ => None,
            })
            .max_by_key(|(_, fixed)| fixed.raw_voltage())
    }

    /// The 1-based object position of the first PPS APDO, or `8` (one past
    /// the maximum legal SPR object count) if this capability set carries
    /// none, per spec.md's `pps_index` invariant.
    pub fn pps_index(&self) -> u8 {
        self.objects
            .iter()
            .position(|pdo| matches!(pdo, PowerDataObject::Pps(_)))
            .map(|i| (i + 1) as u8)
            .unwrap_or(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uom::si::electric_potential::volt;

    #[test]
    fn fixed_supply_decodes_5v_3a() {
        // 5V = 100 * 50mV, 3A = 300 * 10mA.
        let raw = FixedSupply(0).with_raw_voltage(100).with_raw_max_current(300);
        let pdo = PowerDataObject::parse(raw.0);
        match pdo {
            PowerDataObject::FixedSupply(fixed) => {
                assert_eq!(fixed.voltage(), ElectricPotential::new::<volt>(5));
                assert_eq!(fixed.max_current(), ElectricCurrent::new::<milliampere>(3000));
            }
            other => panic!("expected FixedSupply, got {other:?}"),
        }
    }

    #[test]
    fn source_capabilities_picks_highest_fixed_within_budget() {
        let vsafe5v = FixedSupply(0).with_raw_voltage(100).with_raw_max_current(300).0;
        let v9 = FixedSupply(0).with_raw_voltage(180).with_raw_max_current(300).0;
        let v20 = FixedSupply(0).with_raw_voltage(400).with_raw_max_current(250).0;
        let caps = SourceCapabilities::parse(&[vsafe5v, v9, v20]).unwrap();

        let (index, fixed) = caps.highest_fixed_within(ElectricPotential::new::<volt>(12)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(fixed.voltage(), ElectricPotential::new::<volt>(9));
    }

    #[test]
    fn too_many_objects_is_rejected() {
        let raw = [0u32; 8];
        assert!(matches!(SourceCapabilities::parse(&raw), Err(ParseError::TooManyObjects)));
    }

    #[test]
    fn pps_index_finds_first_augmented_object() {
        let vsafe5v = FixedSupply(0).with_raw_voltage(100).with_raw_max_current(300).0;
        let v9 = FixedSupply(0).with_raw_voltage(180).with_raw_max_current(300).0;
        let pps = Pps(0)
            .with_kind_raw(0b11)
            .with_apdo_kind(0)
            .with_raw_min_voltage(66)
            .with_raw_max_voltage(110)
            .with_raw_max_current(100)
            .0;
        let caps = SourceCapabilities::parse(&[vsafe5v, v9, pps]).unwrap();
        assert_eq!(caps.pps_index(), 3);
    }

    #[test]
    fn pps_index_is_eight_when_absent() {
        let vsafe5v = FixedSupply(0).with_raw_voltage(100).with_raw_max_current(300).0;
        let caps = SourceCapabilities::parse(&[vsafe5v]).unwrap();
        assert_eq!(caps.pps_index(), 8);
    }
}
