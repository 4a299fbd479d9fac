//! The session-wide configuration aggregate (spec.md section 9).
//!
//! Every component reads its fixed parameters from a single `PdConfig`
//! instead of carrying its own constants, so the host assembles one struct
//! at session start instead of wiring each component up separately.

use uom::si::u32::ElectricCurrent;

use crate::message::header::{self, SpecificationRevision};
use crate::{DataRole, PowerRole};

/// Fixed parameters for one sink session, shared read-only by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdConfig {
    /// Highest specification revision this port will advertise in its headers.
    pub spec_revision: SpecificationRevision,
    /// Maximum voltage this sink will request (a `Source_Capabilities` fixed
    /// supply above this is never selected).
    pub max_voltage: uom::si::u32::ElectricPotential,
    /// Operational current this sink advertises in its own `Sink_Capabilities`.
    pub sink_operational_current: ElectricCurrent,
    /// Fixed power role and data role carried in every header this port sends.
    pub power_role: PowerRole,
    /// Fixed data role carried in every header this port sends.
    pub data_role: DataRole,
}

impl PdConfig {
    /// Build the header template every outgoing message starts from.
    pub fn header_template(&self) -> header::Header {
        header::Header::new_template(self.data_role, self.power_role, self.spec_revision)
    }
}

impl Default for PdConfig {
    fn default() -> Self {
        use uom::si::electric_current::ampere;
        use uom::si::electric_potential::volt;
        Self {
            spec_revision: SpecificationRevision::R3_X,
            max_voltage: uom::si::u32::ElectricPotential::new::<volt>(20),
            sink_operational_current: ElectricCurrent::new::<ampere>(3),
            power_role: PowerRole::Sink,
            data_role: DataRole::Ufp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_template_carries_configured_roles() {
        let config = PdConfig::default();
        let template = config.header_template();
        assert_eq!(template.port_power_role(), PowerRole::Sink);
        assert_eq!(template.port_data_role(), DataRole::Ufp);
    }
}
