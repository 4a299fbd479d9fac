//! The sink-side policy layer: the Policy Engine (spec.md section 4.5) and
//! the [`dpm`] seam it calls out to.

pub mod dpm;
pub mod pe;

pub use dpm::DevicePolicyManager;
pub use pe::Pe;
