//! # Time units
//!
//! Input clocks and bus rates are frequencies, watchdog timeouts are durations.

pub use fugit::{ExtU32, RateExtU32};

/// Hertz
pub type Hertz = fugit::HertzU32;

/// KiloHertz, mostly used for CAN and I2C bit rates.
pub type KiloHertz = fugit::KilohertzU32;

/// MegaHertz
pub type MegaHertz = fugit::MegahertzU32;

/// Milliseconds
pub type Milliseconds = fugit::MillisDurationU32;

/// Microseconds, the resolution of the watchdog timeout calculation.
pub type Microseconds = fugit::MicrosDurationU32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(KiloHertz::from_raw(500).to_Hz(), 500_000);
        assert_eq!(MegaHertz::from_raw(100).to_Hz(), 100_000_000);
        assert_eq!(Milliseconds::from_ticks(250).to_micros(), 250_000);
        assert_eq!(Microseconds::from_ticks(1_500).to_millis(), 1);
    }
}
