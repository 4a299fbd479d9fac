//! Mod-N counters used throughout the protocol and policy layers.
//!
//! Mirrors `usbpd::counters`: every counter the spec names (message ID,
//! hard reset, retry, capabilities-received, discover-identity, busy) is the
//! same small saturating/wrapping-with-limit primitive, distinguished only
//! by its [`CounterType`]'s modulus and maximum.

/// Identifies which named counter a [`Counter`] is, fixing its wrap modulus
/// and its "exhausted" ceiling (Table 6.70 of the PD spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterType {
    /// Rolling per-originator message ID, wraps mod 8.
    MessageId,
    /// Number of Hard Resets sent without reaching an explicit contract.
    HardReset,
    /// Number of retries attempted for the message presently in flight.
    Retry,
    /// Number of consecutive `Source_Capabilities` received without a contract.
    Caps,
    /// Number of `Busy` responses received in a row for the present request.
    Busy,
    /// Number of `Discover_Identity` attempts made.
    DiscoverIdentity,
}

impl CounterType {
    /// The value at which the counter wraps back to zero.
    pub const fn modulus(self) -> u8 {
        match self {
            Self::MessageId => 8,
            // The remaining counters never wrap in normal operation; they
            // are compared against `max_value` and reset explicitly instead.
            Self::HardReset | Self::Retry | Self::Caps | Self::Busy | Self::DiscoverIdentity => u8::MAX,
        }
    }

    /// The value beyond which the counter is considered exhausted
    /// (`N_HARD_RESET_COUNT`, `N_RETRY_COUNT`, `N_CAPS_COUNT`, `N_BUSY_COUNT`, `N_DISCOVER_IDENTITY_COUNT`).
    pub const fn max_value(self) -> u8 {
        match self {
            Self::MessageId => 7,
            Self::HardReset => 2,
            Self::Retry => 2,
            Self::Caps => 50,
            Self::Busy => 5,
            Self::DiscoverIdentity => 20,
        }
    }
}

/// A counter of a particular [`CounterType`], starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counter {
    kind: CounterType,
    value: u8,
}

impl Counter {
    /// Create a new counter of `kind`, initialized to zero.
    pub const fn new(kind: CounterType) -> Self {
        Self { kind, value: 0 }
    }

    /// Create a counter already holding `value` (used when re-deriving a
    /// header's message ID counter from a received message, for example).
    pub const fn new_from_value(kind: CounterType, value: u8) -> Self {
        Self { kind, value }
    }

    /// The counter's current value.
    pub const fn value(self) -> u8 {
        self.value
    }

    /// Increment, wrapping at the counter's modulus.
    pub fn increment(&mut self) {
        self.value = (self.value + 1) % self.kind.modulus();
    }

    /// Reset to zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// `true` once the counter has reached its type's exhaustion ceiling.
    pub fn is_exhausted(self) -> bool {
        self.value >= self.kind.max_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_wraps_mod_8() {
        let mut counter = Counter::new(CounterType::MessageId);
        for _ in 0..8 {
            counter.increment();
        }
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn hard_reset_counter_is_exhausted_past_n_hard_reset_count() {
        let mut counter = Counter::new(CounterType::HardReset);
        assert!(!counter.is_exhausted());
        counter.increment();
        counter.increment();
        assert!(counter.is_exhausted());
    }

    #[test]
    fn reset_returns_counter_to_zero() {
        let mut counter = Counter::new(CounterType::Retry);
        counter.increment();
        counter.reset();
        assert_eq!(counter.value(), 0);
        assert!(!counter.is_exhausted());
    }
}
