//! The protocol layer: PRL_Rx, PRL_Tx and PRL_HR (spec.md sections 4.2–4.4),
//! kept as three separate components rather than folded into one, per
//! spec.md's explicit component split.

pub mod prl_hr;
pub mod prl_rx;
pub mod prl_tx;

pub use prl_hr::PrlHr;
pub use prl_rx::PrlRx;
pub use prl_tx::PrlTx;
