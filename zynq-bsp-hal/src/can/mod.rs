//! # PS CAN controller driver
//!
//! ## Examples
//!
//! ```ignore
//! let config = zynq_bsp_hal::config::can_config(0).unwrap();
//! let mut can = Can::new_with_bitrate(periphs.can_0, config, Hertz::from_raw(500_000))?;
//! can.enter_mode(Mode::Normal)?;
//! can.send_blocking(&Frame::new(StandardId::new(0x123).unwrap(), &[1, 2]).unwrap())?;
//! ```
use arbitrary_int::{u2, u3, u4};
use zynq_bsp::can::{
    BaudRatePrescaler, BitTiming, ErrorStatus, Identifier, Interrupts, MmioCan, ModeSelect,
    SoftwareReset, Status, TimestampControl, Watermarks,
};

use crate::time::Hertz;

pub mod frame;

pub use frame::*;

/// Number of polling iterations after which a blocking call gives up.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;
/// Nominal sample point in eighths of a bit time.
const SAMPLE_POINT_EIGHTHS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanId {
    Can0 = 0,
    Can1 = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Config,
    Normal,
    Loopback,
    Sleep,
    /// Listen-only mode.
    Snoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterIndex {
    Filter0 = 0,
    Filter1 = 1,
    Filter2 = 2,
    Filter3 = 3,
}

impl FilterIndex {
    #[inline]
    pub const fn mask(&self) -> u8 {
        1 << (*self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CanError {
    #[error("timeout waiting for the controller")]
    Timeout,
    #[error("TX FIFO full")]
    TxFifoFull,
    #[error("high priority TX buffer full")]
    TxBufferFull,
    #[error("RX FIFO empty")]
    RxFifoEmpty,
    #[error("controller not in configuration mode")]
    NotInConfigMode,
    #[error("acceptance filter is enabled")]
    FilterEnabled,
    #[error("acceptance filter registers busy")]
    FilterBusy,
    #[error("bit timing value out of range")]
    InvalidBitTiming,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "bit rate {} Hz not attainable with reference clock {} Hz",
    .bitrate.raw(),
    .ref_clock.raw()
)]
pub struct BitRateNotAttainable {
    pub ref_clock: Hertz,
    pub bitrate: Hertz,
}

/// Bit timing in time quanta. All values are the actual values, not the register encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTimingConfig {
    /// Reference clock divider, 1 to 256.
    pub prescaler: u16,
    /// Time segment 1 (propagation and phase segment 1), 1 to 16.
    pub ts1: u8,
    /// Time segment 2, 1 to 8.
    pub ts2: u8,
    /// Synchronization jump width, 1 to 4.
    pub sjw: u8,
}

impl BitTimingConfig {
    /// Number of time quanta per bit, including the synchronization segment.
    #[inline]
    pub const fn time_quanta(&self) -> u32 {
        1 + self.ts1 as u32 + self.ts2 as u32
    }

    /// Checks all values against the ranges of the bit timing registers. The synchronization
    /// jump width may not exceed time segment 2.
    pub const fn is_valid(&self) -> bool {
        self.prescaler >= 1
            && self.prescaler <= 256
            && self.ts1 >= 1
            && self.ts1 <= 16
            && self.ts2 >= 1
            && self.ts2 <= 8
            && self.sjw >= 1
            && self.sjw <= 4
            && self.sjw <= self.ts2
    }
}

/// Calculate the bit timing for a bit rate. Bit times with more time quanta are preferred and
/// the sample point is placed as close as possible to 87.5 %.
pub fn calculate_bit_timing(
    ref_clock: Hertz,
    bitrate: Hertz,
) -> Result<BitTimingConfig, BitRateNotAttainable> {
    let not_attainable = BitRateNotAttainable { ref_clock, bitrate };
    if bitrate.raw() == 0 {
        return Err(not_attainable);
    }
    for tq in (8..=25).rev() {
        let quanta_clock = bitrate.raw() as u64 * tq as u64;
        if ref_clock.raw() as u64 % quanta_clock != 0 {
            continue;
        }
        let prescaler = ref_clock.raw() as u64 / quanta_clock;
        if prescaler == 0 || prescaler > 256 {
            continue;
        }
        let ts1 = core::cmp::min(tq * SAMPLE_POINT_EIGHTHS / 8 - 1, 16);
        let ts2 = tq - 1 - ts1;
        if !(1..=8).contains(&ts2) {
            continue;
        }
        return Ok(BitTimingConfig {
            prescaler: prescaler as u16,
            ts1: ts1 as u8,
            ts2: ts2 as u8,
            sjw: core::cmp::min(ts2, 4) as u8,
        });
    }
    Err(not_attainable)
}

/// Callbacks invoked by [Can::handle_interrupt].
pub trait CanHandlers {
    /// A frame was transmitted successfully.
    fn on_send(&mut self) {}
    /// At least one frame is waiting in the RX FIFO.
    fn on_receive(&mut self) {}
    /// A bus error was detected. The error status register was already cleared.
    fn on_error(&mut self, _status: ErrorStatus) {}
    /// Other events: overflow, underflow, full or empty buffers, watermarks, sleep, wake-up,
    /// bus-off and lost arbitration.
    fn on_event(&mut self, _events: Interrupts) {}
}

/// Generic interrupt handler for the given CAN peripheral.
///
/// The user has to call this in the interrupt handler responsible for the CAN interrupt.
pub fn on_interrupt(id: CanId, handlers: &mut impl CanHandlers) {
    let mut can = unsafe { Can::steal(id) };
    can.handle_interrupt(handlers);
}

/// PS CAN driver.
pub struct Can {
    regs: MmioCan<'static>,
    poll_limit: u32,
}

impl Can {
    /// Reset the controller. The controller is in configuration mode after the reset.
    pub fn new(regs: MmioCan<'static>) -> Self {
        let mut can = Self {
            regs,
            poll_limit: DEFAULT_POLL_LIMIT,
        };
        can.reset();
        can
    }

    /// Create the driver from a configuration table entry and apply a bit rate.
    pub fn new_with_bitrate(
        regs: MmioCan<'static>,
        config: &crate::config::CanConfig,
        bitrate: Hertz,
    ) -> Result<Self, BitRateNotAttainable> {
        let timing = calculate_bit_timing(config.ref_clock, bitrate)?;
        let mut can = Self::new(regs);
        // Configuration mode is guaranteed after the reset.
        can.write_bit_timing(&timing);
        log::debug!(
            "CAN {}: {} Hz with {} time quanta per bit",
            config.device_id,
            bitrate.raw(),
            timing.time_quanta()
        );
        Ok(can)
    }

    /// Create a driver without resetting the peripheral.
    ///
    /// # Safety
    ///
    /// Circumvents ownership of the register block. Mainly intended for interrupt handlers.
    pub unsafe fn steal(id: CanId) -> Self {
        let regs = unsafe {
            match id {
                CanId::Can0 => zynq_bsp::can::Can::new_mmio_fixed_0(),
                CanId::Can1 => zynq_bsp::can::Can::new_mmio_fixed_1(),
            }
        };
        Self::new_unchecked(regs)
    }

    /// Create a driver for a register block without resetting the peripheral.
    pub fn new_unchecked(regs: MmioCan<'static>) -> Self {
        Self {
            regs,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioCan<'static> {
        &mut self.regs
    }

    #[inline]
    pub fn set_poll_limit(&mut self, limit: u32) {
        self.poll_limit = limit;
    }

    /// Software reset. All registers return to their reset values.
    #[inline]
    pub fn reset(&mut self) {
        self.regs
            .write_srr(SoftwareReset::new_with_raw_value(0).with_reset(true));
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.regs.read_sr()
    }

    /// Current operation mode.
    pub fn mode(&self) -> Mode {
        let sr = self.regs.read_sr();
        if sr.config() {
            Mode::Config
        } else if sr.sleep() {
            Mode::Sleep
        } else if sr.normal() {
            Mode::Normal
        } else if sr.snoop() {
            Mode::Snoop
        } else {
            Mode::Loopback
        }
    }

    fn wait_for_config_mode(&mut self) -> Result<(), CanError> {
        for _ in 0..self.poll_limit {
            if self.regs.read_sr().config() {
                return Ok(());
            }
        }
        Err(CanError::Timeout)
    }

    /// Switch the operation mode.
    ///
    /// Transitions between normal and sleep mode happen directly, all other transitions pass
    /// through the configuration mode. This does not wait until the new mode is active, which
    /// can be checked with [Self::mode].
    pub fn enter_mode(&mut self, mode: Mode) -> Result<(), CanError> {
        let current = self.mode();
        match (current, mode) {
            (Mode::Normal, Mode::Sleep) => {
                self.regs
                    .write_msr(ModeSelect::new_with_raw_value(0).with_sleep(true));
                return Ok(());
            }
            (Mode::Sleep, Mode::Normal) => {
                self.regs.write_msr(ModeSelect::new_with_raw_value(0));
                return Ok(());
            }
            _ => (),
        }
        self.regs.write_srr(SoftwareReset::new_with_raw_value(0));
        self.wait_for_config_mode()?;
        let msr = ModeSelect::new_with_raw_value(0);
        let msr = match mode {
            Mode::Config => return Ok(()),
            Mode::Normal => msr,
            Mode::Loopback => msr.with_loopback(true),
            Mode::Sleep => msr.with_sleep(true),
            Mode::Snoop => msr.with_snoop(true),
        };
        self.regs.write_msr(msr);
        self.regs
            .write_srr(SoftwareReset::new_with_raw_value(0).with_enable(true));
        Ok(())
    }

    fn write_bit_timing(&mut self, timing: &BitTimingConfig) {
        self.regs.write_brpr(
            BaudRatePrescaler::new_with_raw_value(0).with_prescaler((timing.prescaler - 1) as u8),
        );
        self.regs.write_btr(
            BitTiming::new_with_raw_value(0)
                .with_sjw(u2::new(timing.sjw - 1))
                .with_ts2(u3::new(timing.ts2 - 1))
                .with_ts1(u4::new(timing.ts1 - 1)),
        );
    }

    /// Program the baud rate prescaler and bit timing registers. Only possible in configuration
    /// mode.
    pub fn set_bit_timing(&mut self, timing: BitTimingConfig) -> Result<(), CanError> {
        if !timing.is_valid() {
            return Err(CanError::InvalidBitTiming);
        }
        if !self.regs.read_sr().config() {
            return Err(CanError::NotInConfigMode);
        }
        self.write_bit_timing(&timing);
        Ok(())
    }

    /// Current bit timing.
    pub fn bit_timing(&mut self) -> BitTimingConfig {
        let btr = self.regs.read_btr();
        BitTimingConfig {
            prescaler: self.regs.read_brpr().prescaler() as u16 + 1,
            ts1: btr.ts1().value() + 1,
            ts2: btr.ts2().value() + 1,
            sjw: btr.sjw().value() + 1,
        }
    }

    fn write_message(&mut self, high_priority: bool, frame: &Frame) {
        let (id, dlc, data_1, data_2) = frame.to_words();
        let mut buf = if high_priority {
            self.regs.tx_high_priority()
        } else {
            self.regs.tx_fifo()
        };
        buf.write_id(id);
        buf.write_dlc(dlc);
        buf.write_data_1(data_1);
        // Writing the second data word starts the transmission.
        buf.write_data_2(data_2);
    }

    /// Queue a frame if the TX FIFO has room.
    pub fn try_send(&mut self, frame: &Frame) -> Result<(), CanError> {
        if self.regs.read_sr().tx_fifo_full() {
            return Err(CanError::TxFifoFull);
        }
        self.write_message(false, frame);
        Ok(())
    }

    /// Queue a frame, waiting for room in the TX FIFO. Does not wait for the transmission.
    pub fn send_blocking(&mut self, frame: &Frame) -> Result<(), CanError> {
        for _ in 0..self.poll_limit {
            match self.try_send(frame) {
                Err(CanError::TxFifoFull) => continue,
                result => return result,
            }
        }
        Err(CanError::Timeout)
    }

    /// Place a frame in the high priority TX buffer, which is sent before any frame in the TX
    /// FIFO.
    pub fn send_high_priority(&mut self, frame: &Frame) -> Result<(), CanError> {
        if self.regs.read_sr().tx_buf_full() {
            return Err(CanError::TxBufferFull);
        }
        self.write_message(true, frame);
        Ok(())
    }

    #[inline]
    pub fn is_rx_empty(&self) -> bool {
        !self.regs.read_isr().rx_not_empty()
    }

    /// Read one frame from the RX FIFO if available.
    pub fn try_recv(&mut self) -> Result<Frame, CanError> {
        if self.is_rx_empty() {
            return Err(CanError::RxFifoEmpty);
        }
        let mut buf = self.regs.rx_fifo();
        let id = buf.read_id();
        let dlc = buf.read_dlc();
        let data_1 = buf.read_data_1();
        let data_2 = buf.read_data_2();
        // Re-evaluates the RX FIFO empty condition.
        self.regs
            .write_icr(Interrupts::new_with_raw_value(0).with_rx_not_empty(true));
        Ok(Frame::from_words(id, dlc, data_1, data_2))
    }

    /// Wait for a frame in the RX FIFO.
    pub fn recv_blocking(&mut self) -> Result<Frame, CanError> {
        for _ in 0..self.poll_limit {
            match self.try_recv() {
                Err(CanError::RxFifoEmpty) => continue,
                result => return result,
            }
        }
        Err(CanError::Timeout)
    }

    /// Enable the given acceptance filters. Other filters keep their state.
    pub fn enable_filters(&mut self, filters: &[FilterIndex]) {
        let mask = filters.iter().fold(0, |acc, f| acc | f.mask());
        self.regs.modify_afr(|afr| {
            afr.with_enabled(u4::new((afr.enabled().value() | mask) & 0xF))
        });
    }

    /// Disable the given acceptance filters. If all filters are disabled, every received frame
    /// is stored in the RX FIFO.
    pub fn disable_filters(&mut self, filters: &[FilterIndex]) {
        let mask = filters.iter().fold(0, |acc, f| acc | f.mask());
        self.regs
            .modify_afr(|afr| afr.with_enabled(u4::new(afr.enabled().value() & !mask & 0xF)));
    }

    /// Bit mask of the enabled filters.
    #[inline]
    pub fn enabled_filters(&mut self) -> u8 {
        self.regs.read_afr().enabled().value()
    }

    /// Set the mask and ID of a disabled acceptance filter. Both values use the identifier
    /// register layout, see [Id::identifier].
    pub fn set_filter(
        &mut self,
        filter: FilterIndex,
        mask: Identifier,
        id: Identifier,
    ) -> Result<(), CanError> {
        if self.enabled_filters() & filter.mask() != 0 {
            return Err(CanError::FilterEnabled);
        }
        if self.regs.read_sr().acceptance_filter_busy() {
            return Err(CanError::FilterBusy);
        }
        let mut regs = self.filter_regs(filter);
        regs.write_mask(mask.raw_value());
        regs.write_id(id.raw_value());
        Ok(())
    }

    /// Mask and ID of an acceptance filter.
    pub fn filter(&mut self, filter: FilterIndex) -> (Identifier, Identifier) {
        let mut regs = self.filter_regs(filter);
        (
            Identifier::new_with_raw_value(regs.read_mask()),
            Identifier::new_with_raw_value(regs.read_id()),
        )
    }

    fn filter_regs(&mut self, filter: FilterIndex) -> zynq_bsp::can::MmioAcceptanceFilter<'_> {
        match filter {
            FilterIndex::Filter0 => self.regs.filter_0(),
            FilterIndex::Filter1 => self.regs.filter_1(),
            FilterIndex::Filter2 => self.regs.filter_2(),
            FilterIndex::Filter3 => self.regs.filter_3(),
        }
    }

    /// Receive and transmit error counters.
    #[inline]
    pub fn bus_error_counters(&self) -> (u8, u8) {
        let ecr = self.regs.read_ecr();
        (ecr.rx_errors(), ecr.tx_errors())
    }

    /// Read and clear the bus error status.
    pub fn bus_error_status(&mut self) -> ErrorStatus {
        let esr = self.regs.read_esr();
        self.regs.write_esr(esr);
        esr
    }

    #[inline]
    pub fn interrupt_status(&self) -> Interrupts {
        self.regs.read_isr()
    }

    #[inline]
    pub fn enable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs
            .modify_ier(|ier| Interrupts::new_with_raw_value(ier.raw_value() | interrupts.raw_value()));
    }

    #[inline]
    pub fn disable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs.modify_ier(|ier| {
            Interrupts::new_with_raw_value(ier.raw_value() & !interrupts.raw_value())
        });
    }

    #[inline]
    pub fn clear_interrupts(&mut self, interrupts: Interrupts) {
        self.regs.write_icr(interrupts);
    }

    /// Reset the receive timestamp counter.
    #[inline]
    pub fn clear_timestamp(&mut self) {
        self.regs
            .write_tcr(TimestampControl::new_with_raw_value(0).with_clear(true));
    }

    /// Set the RX FIFO full and TX FIFO empty watermark levels.
    #[inline]
    pub fn set_watermarks(&mut self, rx_full: u8, tx_empty: u8) {
        self.regs.write_wir(
            Watermarks::new_with_raw_value(0)
                .with_rx_full(rx_full)
                .with_tx_empty(tx_empty),
        );
    }

    /// Dispatch all pending and enabled interrupts to the handlers and clear them.
    pub fn handle_interrupt(&mut self, handlers: &mut impl CanHandlers) {
        let pending = self.regs.read_isr().raw_value() & self.regs.read_ier().raw_value();
        let pending = Interrupts::new_with_raw_value(pending);
        if pending.error() {
            let status = self.bus_error_status();
            handlers.on_error(status);
        }
        let events = Interrupts::new_with_raw_value(pending.raw_value() & EVENT_MASK.raw_value());
        if events.raw_value() != 0 {
            handlers.on_event(events);
        }
        if pending.rx_ok() || pending.rx_not_empty() {
            handlers.on_receive();
        }
        if pending.tx_ok() {
            handlers.on_send();
        }
        self.regs.write_icr(pending);
    }
}

/// Interrupts reported through [CanHandlers::on_event].
pub const EVENT_MASK: Interrupts = Interrupts::new_with_raw_value(0)
    .with_wake_up(true)
    .with_sleep(true)
    .with_bus_off(true)
    .with_rx_overflow(true)
    .with_rx_underflow(true)
    .with_tx_buf_full(true)
    .with_tx_fifo_full(true)
    .with_tx_fifo_empty(true)
    .with_tx_fifo_watermark_empty(true)
    .with_rx_fifo_watermark_full(true)
    .with_arbitration_lost(true);

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::boxed::Box;

    const SRR: usize = 0x00 / 4;
    const MSR: usize = 0x04 / 4;
    const BRPR: usize = 0x08 / 4;
    const BTR: usize = 0x0C / 4;
    const ESR: usize = 0x14 / 4;
    const SR: usize = 0x18 / 4;
    const ISR: usize = 0x1C / 4;
    const IER: usize = 0x20 / 4;
    const ICR: usize = 0x24 / 4;
    const TX_FIFO_ID: usize = 0x30 / 4;
    const TX_FIFO_DW2: usize = 0x3C / 4;
    const TX_HP_ID: usize = 0x40 / 4;
    const RX_FIFO_ID: usize = 0x50 / 4;
    const AFR: usize = 0x60 / 4;
    const AFMR_2: usize = 0x74 / 4;
    const AFIR_2: usize = 0x78 / 4;

    #[repr(C, align(8))]
    struct RegMem([u32; 0x21]);

    fn ram_backed_can() -> (Can, *mut RegMem) {
        let mem = Box::leak(Box::new(RegMem([0; 0x21])));
        let ptr = mem as *mut RegMem;
        let regs = unsafe { zynq_bsp::can::Can::new_mmio(ptr as *mut zynq_bsp::can::Can) };
        let mut can = Can::new(regs);
        can.set_poll_limit(10);
        (can, ptr)
    }

    fn reg(mem: *mut RegMem, idx: usize) -> u32 {
        unsafe { (*mem).0[idx] }
    }

    fn set_reg(mem: *mut RegMem, idx: usize, val: u32) {
        unsafe { (*mem).0[idx] = val }
    }

    #[test]
    fn test_bit_timing_calculation() {
        let timing =
            calculate_bit_timing(Hertz::from_raw(24_000_000), Hertz::from_raw(1_000_000)).unwrap();
        assert_eq!(
            timing,
            BitTimingConfig {
                prescaler: 1,
                ts1: 16,
                ts2: 7,
                sjw: 4
            }
        );
        let timing =
            calculate_bit_timing(Hertz::from_raw(24_000_000), Hertz::from_raw(125_000)).unwrap();
        assert_eq!(timing.prescaler, 8);
        assert_eq!(timing.time_quanta(), 24);

        let timing =
            calculate_bit_timing(Hertz::from_raw(8_000_000), Hertz::from_raw(500_000)).unwrap();
        // 16 time quanta with the sample point at 87.5 %.
        assert_eq!(timing.prescaler, 1);
        assert_eq!(timing.ts1, 13);
        assert_eq!(timing.ts2, 2);

        assert!(
            calculate_bit_timing(Hertz::from_raw(24_000_000), Hertz::from_raw(5_000_000)).is_err()
        );
        assert!(calculate_bit_timing(Hertz::from_raw(24_000_000), Hertz::from_raw(0)).is_err());
    }

    #[test]
    fn test_reset_on_creation() {
        let (_can, mem) = ram_backed_can();
        assert_eq!(reg(mem, SRR), 0b1);
    }

    #[test]
    fn test_set_bit_timing() {
        let (mut can, mem) = ram_backed_can();
        let timing =
            calculate_bit_timing(Hertz::from_raw(24_000_000), Hertz::from_raw(125_000)).unwrap();
        assert_eq!(can.set_bit_timing(timing), Err(CanError::NotInConfigMode));
        set_reg(mem, SR, 0b1);
        can.set_bit_timing(timing).unwrap();
        assert_eq!(reg(mem, BRPR), 7);
        assert_eq!(reg(mem, BTR), (3 << 7) | (6 << 4) | 15);
        assert_eq!(can.bit_timing(), timing);
    }

    #[test]
    fn test_bit_timing_ranges() {
        let (mut can, mem) = ram_backed_can();
        set_reg(mem, SR, 0b1);
        let valid = BitTimingConfig {
            prescaler: 256,
            ts1: 16,
            ts2: 8,
            sjw: 4,
        };
        can.set_bit_timing(valid).unwrap();
        assert_eq!(reg(mem, BRPR), 255);
        let invalid = [
            BitTimingConfig {
                prescaler: 0,
                ..valid
            },
            BitTimingConfig {
                prescaler: 257,
                ..valid
            },
            BitTimingConfig { ts1: 0, ..valid },
            BitTimingConfig { ts1: 17, ..valid },
            BitTimingConfig { ts2: 0, ..valid },
            BitTimingConfig { ts2: 9, ..valid },
            BitTimingConfig { sjw: 0, ..valid },
            BitTimingConfig { sjw: 5, ..valid },
            BitTimingConfig {
                ts2: 2,
                sjw: 3,
                ..valid
            },
        ];
        for timing in invalid {
            assert!(!timing.is_valid());
            assert_eq!(can.set_bit_timing(timing), Err(CanError::InvalidBitTiming));
        }
        // Registers keep the last valid timing.
        assert_eq!(reg(mem, BRPR), 255);
        assert_eq!(can.bit_timing(), valid);
    }

    #[test]
    fn test_bitrate_from_config() {
        let mem = Box::leak(Box::new(RegMem([0; 0x21])));
        let regs = unsafe { zynq_bsp::can::Can::new_mmio(mem as *mut RegMem as *mut _) };
        let config = crate::config::can_config(1).unwrap();
        let mut can = Can::new_with_bitrate(regs, config, Hertz::from_raw(250_000)).unwrap();
        assert_eq!(can.bit_timing().prescaler, 4);
        let mem = Box::leak(Box::new(RegMem([0; 0x21])));
        let regs = unsafe { zynq_bsp::can::Can::new_mmio(mem as *mut RegMem as *mut _) };
        assert!(Can::new_with_bitrate(regs, config, Hertz::from_raw(5_000_000)).is_err());
    }

    #[test]
    fn test_modes() {
        let (mut can, mem) = ram_backed_can();
        assert_eq!(can.enter_mode(Mode::Loopback), Err(CanError::Timeout));
        set_reg(mem, SR, 0b1);
        assert_eq!(can.mode(), Mode::Config);
        can.enter_mode(Mode::Loopback).unwrap();
        assert_eq!(reg(mem, MSR), 0b010);
        assert_eq!(reg(mem, SRR), 0b10);
        can.enter_mode(Mode::Snoop).unwrap();
        assert_eq!(reg(mem, MSR), 0b100);

        // Normal mode to sleep mode does not pass through the configuration mode.
        set_reg(mem, SR, 1 << 3);
        set_reg(mem, SRR, 0b10);
        assert_eq!(can.mode(), Mode::Normal);
        can.enter_mode(Mode::Sleep).unwrap();
        assert_eq!(reg(mem, MSR), 0b001);
        assert_eq!(reg(mem, SRR), 0b10);
    }

    #[test]
    fn test_send() {
        let (mut can, mem) = ram_backed_can();
        let frame = Frame::new(StandardId::new(0x321).unwrap(), &[9, 8, 7, 6, 5]).unwrap();
        can.send_blocking(&frame).unwrap();
        assert_eq!(reg(mem, TX_FIFO_ID), 0x321 << 21);
        assert_eq!(reg(mem, TX_FIFO_DW2), 0x0500_0000);

        set_reg(mem, SR, 1 << 10);
        assert_eq!(can.try_send(&frame), Err(CanError::TxFifoFull));
        assert_eq!(can.send_blocking(&frame), Err(CanError::Timeout));

        can.send_high_priority(&frame).unwrap();
        assert_eq!(reg(mem, TX_HP_ID), 0x321 << 21);
        set_reg(mem, SR, 1 << 9);
        assert_eq!(can.send_high_priority(&frame), Err(CanError::TxBufferFull));
    }

    #[test]
    fn test_recv() {
        let (mut can, mem) = ram_backed_can();
        assert_eq!(can.try_recv(), Err(CanError::RxFifoEmpty));
        assert_eq!(can.recv_blocking(), Err(CanError::Timeout));
        set_reg(mem, ISR, 1 << 7);
        set_reg(mem, RX_FIFO_ID, 0x100 << 21);
        set_reg(mem, RX_FIFO_ID + 1, 2 << 28);
        set_reg(mem, RX_FIFO_ID + 2, 0xCAFE_0000);
        let frame = can.recv_blocking().unwrap();
        assert_eq!(frame.id(), Id::Standard(StandardId::new(0x100).unwrap()));
        assert_eq!(frame.data(), &[0xCA, 0xFE]);
        assert_eq!(reg(mem, ICR), 1 << 7);
    }

    #[test]
    fn test_acceptance_filters() {
        let (mut can, mem) = ram_backed_can();
        can.enable_filters(&[FilterIndex::Filter0, FilterIndex::Filter2]);
        assert_eq!(reg(mem, AFR), 0b0101);
        let mask = Identifier::new_with_raw_value(0xFFE0_0000);
        let id = Id::Standard(StandardId::new(0x42).unwrap()).identifier(false);
        assert_eq!(
            can.set_filter(FilterIndex::Filter2, mask, id),
            Err(CanError::FilterEnabled)
        );
        can.disable_filters(&[FilterIndex::Filter2]);
        assert_eq!(can.enabled_filters(), 0b0001);
        set_reg(mem, SR, 1 << 11);
        assert_eq!(
            can.set_filter(FilterIndex::Filter2, mask, id),
            Err(CanError::FilterBusy)
        );
        set_reg(mem, SR, 0);
        can.set_filter(FilterIndex::Filter2, mask, id).unwrap();
        assert_eq!(reg(mem, AFMR_2), 0xFFE0_0000);
        assert_eq!(reg(mem, AFIR_2), 0x42 << 21);
        let (read_mask, read_id) = can.filter(FilterIndex::Filter2);
        assert_eq!(read_mask.raw_value(), mask.raw_value());
        assert_eq!(read_id.raw_value(), id.raw_value());
    }

    #[test]
    fn test_timestamp_and_watermarks() {
        let (mut can, mem) = ram_backed_can();
        can.clear_timestamp();
        assert_eq!(reg(mem, 0x28 / 4), 1);
        can.set_watermarks(0x10, 0x08);
        assert_eq!(reg(mem, 0x2C / 4), (0x08 << 8) | 0x10);
    }

    #[test]
    fn test_bus_errors() {
        let (mut can, mem) = ram_backed_can();
        set_reg(mem, 0x10 / 4, (3 << 8) | 7);
        assert_eq!(can.bus_error_counters(), (3, 7));
        set_reg(mem, ESR, 0b10001);
        let status = can.bus_error_status();
        assert!(status.ack_error());
        assert!(status.crc_error());
        assert!(!status.bit_error());
    }

    #[derive(Default)]
    struct Counter {
        sent: u32,
        received: u32,
        errors: u32,
        events: u32,
    }

    impl CanHandlers for Counter {
        fn on_send(&mut self) {
            self.sent += 1;
        }
        fn on_receive(&mut self) {
            self.received += 1;
        }
        fn on_error(&mut self, status: ErrorStatus) {
            assert!(status.form_error());
            self.errors += 1;
        }
        fn on_event(&mut self, events: Interrupts) {
            assert!(events.rx_overflow());
            assert!(!events.tx_ok());
            self.events += 1;
        }
    }

    #[test]
    fn test_interrupt_dispatch() {
        let (mut can, mem) = ram_backed_can();
        let pending = Interrupts::new_with_raw_value(0)
            .with_tx_ok(true)
            .with_rx_ok(true)
            .with_error(true)
            .with_rx_overflow(true);
        can.enable_interrupts(Interrupts::new_with_raw_value(0).with_tx_ok(true));
        can.enable_interrupts(pending);
        can.disable_interrupts(Interrupts::new_with_raw_value(0).with_rx_ok(true));
        assert_eq!(
            reg(mem, IER),
            pending.raw_value() & !Interrupts::new_with_raw_value(0).with_rx_ok(true).raw_value()
        );
        set_reg(mem, ISR, pending.raw_value());
        set_reg(mem, ESR, 0b10);
        let mut counter = Counter::default();
        can.handle_interrupt(&mut counter);
        assert_eq!(counter.sent, 1);
        // RX OK is not enabled.
        assert_eq!(counter.received, 0);
        assert_eq!(counter.errors, 1);
        assert_eq!(counter.events, 1);
        assert_eq!(reg(mem, ICR), reg(mem, IER));
    }

    #[derive(Default)]
    struct EventLog {
        events: Option<Interrupts>,
        received: u32,
    }

    impl CanHandlers for EventLog {
        fn on_receive(&mut self) {
            self.received += 1;
        }
        fn on_event(&mut self, events: Interrupts) {
            self.events = Some(events);
        }
    }

    #[test]
    fn test_interrupt_without_reset() {
        let mem = Box::leak(Box::new(RegMem([0; 0x21])));
        let ptr = mem as *mut RegMem;
        set_reg(ptr, SRR, 0b10);
        let pending = Interrupts::new_with_raw_value(0)
            .with_tx_fifo_empty(true)
            .with_tx_fifo_watermark_empty(true)
            .with_rx_fifo_watermark_full(true)
            .with_rx_not_empty(true);
        set_reg(ptr, IER, Interrupts::ALL.raw_value());
        set_reg(ptr, ISR, pending.raw_value());
        // Same construction as the one used by the free interrupt handler.
        let regs = unsafe { zynq_bsp::can::Can::new_mmio(ptr as *mut zynq_bsp::can::Can) };
        let mut can = Can::new_unchecked(regs);
        assert_eq!(reg(ptr, SRR), 0b10);
        let mut log = EventLog::default();
        can.handle_interrupt(&mut log);
        let events = log.events.unwrap();
        assert!(events.tx_fifo_empty());
        assert!(events.tx_fifo_watermark_empty());
        assert!(events.rx_fifo_watermark_full());
        assert!(!events.rx_not_empty());
        assert_eq!(log.received, 1);
        assert_eq!(reg(ptr, ICR), pending.raw_value());
    }
}
