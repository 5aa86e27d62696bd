//! # System watchdog timer (SWDT) driver
//!
//! The watchdog is a 24-bit down counter. On a restart, the upper 12 bits are loaded with the
//! counter restart value and the lower 12 bits with `0xFFF`. When the counter reaches zero, the
//! watchdog asserts its reset and/or interrupt outputs, depending on the mode configuration.
//!
//! ## Examples
//!
//! ```ignore
//! let mut wdt = Watchdog::new(periphs.swdt, swdt_config(0).unwrap());
//! wdt.set_timeout(Microseconds::from_ticks(500_000))?;
//! wdt.configure_outputs(true, None);
//! wdt.start();
//! loop {
//!     wdt.restart();
//! }
//! ```
use arbitrary_int::u12;
use zynq_bsp::swdt::{
    CONTROL_KEY, ClockPrescaler, Control, MODE_KEY, MmioSwdt, PulseLength, RESTART_KEY,
};

use crate::{
    config::SwdtConfig,
    time::{Hertz, Microseconds},
};

/// Counter values covered by one unit of the counter restart value.
const COUNTS_PER_CRV: u64 = 1 << 12;
const MAX_CRV_UNITS: u64 = 1 << 12;

const PRESCALERS: [ClockPrescaler; 4] = [
    ClockPrescaler::Div8,
    ClockPrescaler::Div64,
    ClockPrescaler::Div512,
    ClockPrescaler::Div4096,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTimeout {
    #[error("timeout is zero")]
    Zero,
    #[error("timeout exceeds the counter range for the input clock")]
    TooLong,
}

/// Calculate the control register value for a timeout.
///
/// The smallest prescaler which can represent the timeout is selected for the best resolution.
/// The resulting timeout is the requested timeout rounded up to the next counter step.
pub fn calculate_control(
    input_clock: Hertz,
    timeout: Microseconds,
) -> Result<Control, InvalidTimeout> {
    if timeout.ticks() == 0 {
        return Err(InvalidTimeout::Zero);
    }
    let input_ticks = (input_clock.raw() as u64 * timeout.ticks() as u64).div_ceil(1_000_000);
    for prescaler in PRESCALERS {
        let units = input_ticks.div_ceil(prescaler.divisor() as u64 * COUNTS_PER_CRV);
        if units <= MAX_CRV_UNITS {
            let crv = units.saturating_sub(1) as u16;
            return Ok(Control::new_with_raw_value(0)
                .with_ckey(u12::new(CONTROL_KEY))
                .with_crv(u12::new(crv))
                .with_prescaler(prescaler));
        }
    }
    Err(InvalidTimeout::TooLong)
}

/// Timeout configured by a control register value.
pub fn timeout_from_control(input_clock: Hertz, control: Control) -> Microseconds {
    let counts = (control.crv().value() as u64 + 1) * COUNTS_PER_CRV;
    let input_ticks = counts * control.prescaler().divisor() as u64;
    Microseconds::from_ticks((input_ticks * 1_000_000 / input_clock.raw() as u64) as u32)
}

pub struct Watchdog {
    regs: MmioSwdt<'static>,
    input_clock: Hertz,
}

impl Watchdog {
    /// Create the driver. The watchdog configuration is left untouched.
    pub fn new(regs: MmioSwdt<'static>, config: &SwdtConfig) -> Self {
        Self {
            regs,
            input_clock: config.input_clock,
        }
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioSwdt<'static> {
        &mut self.regs
    }

    #[inline]
    pub fn input_clock(&self) -> Hertz {
        self.input_clock
    }

    /// Program the counter restart value and prescaler for the given timeout. The new value is
    /// used on the next restart.
    pub fn set_timeout(&mut self, timeout: Microseconds) -> Result<(), InvalidTimeout> {
        let control = calculate_control(self.input_clock, timeout)?;
        log::debug!(
            "SWDT timeout {} us: CRV {} with prescaler {:?}",
            timeout.ticks(),
            control.crv().value(),
            control.prescaler()
        );
        self.regs.write_control(control);
        Ok(())
    }

    /// Currently configured timeout.
    pub fn timeout(&mut self) -> Microseconds {
        timeout_from_control(self.input_clock, self.regs.read_control())
    }

    // The key reads as zero, so every mode update must re-insert it.
    fn modify_mode(&mut self, f: impl FnOnce(zynq_bsp::swdt::Mode) -> zynq_bsp::swdt::Mode) {
        self.regs
            .modify_mode(|mode| f(mode).with_zkey(u12::new(MODE_KEY)));
    }

    /// Enable the reset output and optionally the interrupt output with the given pulse length.
    pub fn configure_outputs(&mut self, reset: bool, irq: Option<PulseLength>) {
        self.modify_mode(|mode| {
            let mode = mode.with_reset_enable(reset).with_irq_enable(irq.is_some());
            match irq {
                Some(len) => mode.with_irq_length(len),
                None => mode,
            }
        });
    }

    /// Enable the watchdog and load the counter.
    pub fn start(&mut self) {
        self.modify_mode(|mode| mode.with_enable(true));
        self.restart();
    }

    #[inline]
    pub fn stop(&mut self) {
        self.modify_mode(|mode| mode.with_enable(false));
    }

    #[inline]
    pub fn is_enabled(&mut self) -> bool {
        self.regs.read_mode().enable()
    }

    /// Reload the counter. Needs to be called periodically while the watchdog is enabled.
    #[inline]
    pub fn restart(&mut self) {
        self.regs.write_restart(RESTART_KEY);
    }

    /// The counter reached zero.
    #[inline]
    pub fn is_timeout_expired(&self) -> bool {
        self.regs.read_status().zero()
    }
}
