//! # AXI I3C controller driver
//!
//! Controller (primary) mode driver for the AXI I3C IP core. Transfers are started by writing a
//! [Command] word into the command FIFO. The payload is exchanged through the write and read
//! FIFOs and every command completes with one word in the response FIFO.
//!
//! Typical bring-up of a bus:
//!
//! ```ignore
//! let config = zynq_bsp_hal::config::i3c_config(0).unwrap();
//! let regs = unsafe { zynq_bsp::i3c::I3c::new_mmio_at(config.base_addr) };
//! let mut i3c = I3c::new(regs, config);
//! i3c.bus_init()?;
//! let targets = i3c.dynamic_address_assignment(&[0x08, 0x09])?;
//! ```
//!
//! The driver also implements the [embedded_hal::i2c::I2c] trait for legacy I2C targets on the
//! same bus.
use arbitrary_int::{u4, u7, u12, u18};
use embedded_hal::i2c::NoAcknowledgeSource;
use zynq_bsp::i3c::{
    BROADCAST_ADDRESS, Command, CommandType, Control, Interrupts, MmioI3c, Reset, Response,
    Timing,
};

use crate::{config::I3cConfig, time::Hertz};

pub mod asynch;
pub mod ccc;

pub use asynch::*;

/// Maximum number of targets which can be assigned a dynamic address.
pub const MAX_TARGETS: usize = 108;
/// Maximum payload length of a single transfer, limited by the command byte count field.
pub const MAX_TRANSFER_LEN: usize = 4095;
/// Number of bytes returned by each target during the ENTDAA procedure.
pub const DAA_RESPONSE_LEN: usize = 9;
/// Address used by targets to request a hot-join.
pub const HOT_JOIN_ADDRESS: u8 = 0x02;
/// Default SCL frequency for I3C SDR transfers.
pub const DEFAULT_SCL_FREQUENCY: Hertz = Hertz::from_raw(12_500_000);
/// Minimum SCL low period of open-drain transfers in nanoseconds.
pub const OPEN_DRAIN_LOW_MIN_NS: u32 = 200;
/// Number of polling iterations without progress after which a blocking call gives up.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;
/// Largest value of the 18 bit timing registers.
const TIMING_CYCLES_MAX: u32 = (1 << 18) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum I3cError {
    #[error("CRC error")]
    Crc,
    #[error("parity error")]
    Parity,
    #[error("frame error")]
    Frame,
    #[error("broadcast address header not acknowledged")]
    AddressHeaderNack,
    #[error("target address not acknowledged")]
    AddressNack,
    #[error("FIFO overflow or underflow")]
    Overflow,
    #[error("transfer aborted")]
    Aborted,
    #[error("legacy I2C target did not acknowledge written data")]
    I2cWriteNack,
    #[error("timeout waiting for the controller")]
    Timeout,
    #[error("transfer exceeds the maximum of 4095 bytes")]
    TransferTooLarge,
    #[error("invalid or reserved target address {0:#04x}")]
    InvalidAddress(u8),
    #[error("feature not enabled in the hardware configuration")]
    Unsupported,
    #[error("unknown response error code {0}")]
    Unknown(u8),
}

impl I3cError {
    /// Translate the error code field of a [Response] word.
    pub fn from_error_code(code: u4) -> Option<Self> {
        Some(match code.value() {
            0 => return None,
            1 => I3cError::Crc,
            2 => I3cError::Parity,
            3 => I3cError::Frame,
            4 => I3cError::AddressHeaderNack,
            5 => I3cError::AddressNack,
            6 => I3cError::Overflow,
            7 => I3cError::Aborted,
            8 => I3cError::I2cWriteNack,
            other => I3cError::Unknown(other),
        })
    }

    #[inline]
    pub fn is_nack(&self) -> bool {
        matches!(
            self,
            I3cError::AddressHeaderNack | I3cError::AddressNack | I3cError::I2cWriteNack
        )
    }
}

impl embedded_hal::i2c::Error for I3cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            I3cError::AddressHeaderNack | I3cError::AddressNack => {
                embedded_hal::i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            I3cError::I2cWriteNack => {
                embedded_hal::i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            I3cError::Overflow => embedded_hal::i2c::ErrorKind::Overrun,
            I3cError::Frame => embedded_hal::i2c::ErrorKind::Bus,
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

/// Convert a response word into the transfer result. The [Ok] value is the byte count field.
#[inline]
pub fn response_result(resp: Response) -> Result<usize, I3cError> {
    match I3cError::from_error_code(resp.error_code()) {
        Some(err) => Err(err),
        None => Ok(resp.byte_count().value() as usize),
    }
}

/// Odd parity bit for a 7-bit address: set if the address has an even number of ones.
#[inline]
pub const fn odd_parity(addr: u8) -> u8 {
    (addr.count_ones() % 2 == 0) as u8
}

/// Address byte sent during the ENTDAA procedure: the dynamic address followed by its odd
/// parity bit.
#[inline]
pub const fn daa_address_byte(addr: u8) -> u8 {
    (addr << 1) | odd_parity(addr)
}

/// Addresses which must never be assigned as dynamic addresses. These are the broadcast address
/// and all addresses with a single bit error relative to it.
pub const fn is_reserved_address(addr: u8) -> bool {
    matches!(
        addr,
        0x00..=0x07 | 0x3E | 0x5E | 0x6E | 0x76 | 0x7A | 0x7C | 0x7E | 0x7F
    )
}

#[inline]
fn check_dynamic_address(addr: u8) -> Result<(), I3cError> {
    if addr > 0x7F || is_reserved_address(addr) {
        return Err(I3cError::InvalidAddress(addr));
    }
    Ok(())
}

#[inline]
fn check_target_address(addr: u8) -> Result<(), I3cError> {
    if addr > 0x7F {
        return Err(I3cError::InvalidAddress(addr));
    }
    Ok(())
}

/// Pack up to four bytes into one FIFO word. The first byte lands in the most significant byte.
#[inline]
pub fn pack_word(bytes: &[u8]) -> u32 {
    let mut word = [0; 4];
    word[..bytes.len()].copy_from_slice(bytes);
    u32::from_be_bytes(word)
}

/// Unpack up to four bytes from one FIFO word, starting with the most significant byte.
#[inline]
pub fn unpack_word(word: u32, out: &mut [u8]) {
    let len = out.len();
    out.copy_from_slice(&word.to_be_bytes()[..len]);
}

/// Information gathered about a target during dynamic address assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub dynamic_addr: u8,
    /// 48-bit provisioned ID.
    pub id: u64,
    /// Bus characteristics register.
    pub bcr: u8,
    /// Device characteristics register.
    pub dcr: u8,
}

impl TargetInfo {
    /// Parse the ENTDAA response of a target.
    pub fn from_daa_response(dynamic_addr: u8, resp: &[u8; DAA_RESPONSE_LEN]) -> Self {
        let mut id = [0; 8];
        id[2..].copy_from_slice(&resp[0..6]);
        Self {
            dynamic_addr,
            id: u64::from_be_bytes(id),
            bcr: resp[6],
            dcr: resp[7],
        }
    }

    /// The target is able to raise in-band interrupts.
    #[inline]
    pub fn ibi_capable(&self) -> bool {
        (self.bcr >> 1) & 1 == 1
    }

    /// In-band interrupts of this target carry at least one payload byte.
    #[inline]
    pub fn ibi_payload(&self) -> bool {
        (self.bcr >> 2) & 1 == 1
    }
}

/// In-band interrupt or hot-join request received from a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IbiEvent {
    pub target_addr: u8,
    /// Number of payload bytes received.
    pub len: usize,
}

impl IbiEvent {
    #[inline]
    pub fn is_hot_join(&self) -> bool {
        self.target_addr == HOT_JOIN_ADDRESS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidSclFrequency {
    #[error("SCL frequency too high for the input clock")]
    TooHigh,
    #[error("SCL frequency too low for the timing registers")]
    TooLow,
}

/// Bus timing in input clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SclTiming {
    pub high: u32,
    pub low: u32,
    pub sda_hold: u32,
    pub bus_idle: u32,
    pub tsu_start: u32,
    pub thd_start: u32,
    pub tsu_stop: u32,
    pub od_high: u32,
    pub od_low: u32,
}

impl SclTiming {
    pub fn calculate(input_clock: Hertz, scl: Hertz) -> Result<Self, InvalidSclFrequency> {
        if scl.raw() == 0 {
            return Err(InvalidSclFrequency::TooLow);
        }
        let period = input_clock.raw().div_ceil(scl.raw());
        if period < 4 {
            return Err(InvalidSclFrequency::TooHigh);
        }
        let high = period / 2;
        let low = period - high;
        let od_low_min = (input_clock.raw() as u64 * OPEN_DRAIN_LOW_MIN_NS as u64)
            .div_ceil(1_000_000_000) as u32;
        let od_low = core::cmp::max(low, od_low_min);
        if core::cmp::max(period, od_low) > TIMING_CYCLES_MAX {
            return Err(InvalidSclFrequency::TooLow);
        }
        Ok(Self {
            high,
            low,
            // 40 % of the low period.
            sda_hold: core::cmp::max(low * 4 / 10, 1),
            bus_idle: period,
            tsu_start: high,
            thd_start: high,
            tsu_stop: high,
            od_high: high,
            od_low,
        })
    }
}

#[inline]
fn timing(cycles: u32) -> Timing {
    Timing::new_with_raw_value(0).with_cycles(u18::new(cycles))
}

/// Feeds a byte stream into the write FIFO one word at a time.
pub(crate) struct WordPacker<I> {
    bytes: I,
    remaining: usize,
}

impl<I: Iterator<Item = u8>> WordPacker<I> {
    pub(crate) fn new(bytes: I, len: usize) -> Self {
        Self {
            bytes,
            remaining: len,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    pub(crate) fn next_word(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let mut chunk = [0; 4];
        let len = core::cmp::min(4, self.remaining);
        for byte in chunk.iter_mut().take(len) {
            *byte = self.bytes.next().unwrap_or(0);
        }
        self.remaining -= len;
        Some(pack_word(&chunk[..len]))
    }
}

/// Describes one private or broadcast transfer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transfer {
    pub cmd_type: CommandType,
    pub target_addr: u8,
    pub len: usize,
    pub read: bool,
    pub stop: bool,
}

/// AXI I3C controller driver.
pub struct I3c {
    regs: MmioI3c<'static>,
    config: &'static I3cConfig,
    targets: heapless::Vec<TargetInfo, MAX_TARGETS>,
    tid: u8,
    poll_limit: u32,
}

impl I3c {
    /// Reset the controller, configure the default SCL timing and enable the controller.
    pub fn new(regs: MmioI3c<'static>, config: &'static I3cConfig) -> Self {
        let mut i3c = Self {
            regs,
            config,
            targets: heapless::Vec::new(),
            tid: 0,
            poll_limit: DEFAULT_POLL_LIMIT,
        };
        i3c.reset();
        // The default frequency is valid for every sensible AXI clock.
        if let Err(e) = i3c.set_scl_clock(DEFAULT_SCL_FREQUENCY) {
            log::warn!(
                "I3C {}: default SCL frequency not attainable: {}",
                config.device_id,
                e
            );
        }
        i3c.regs
            .write_cr(Control::new_with_raw_value(0).with_enable(true));
        i3c
    }

    /// Soft reset of the core, including all FIFOs. All interrupts are disabled and cleared.
    pub fn reset(&mut self) {
        self.regs
            .write_reset(Reset::new_with_raw_value(0).with_soft(true));
        self.regs.write_reset(Reset::new_with_raw_value(0));
        self.reset_fifos();
        self.regs.write_ier_rising(Interrupts::new_with_raw_value(0));
        self.regs
            .write_ier_falling(Interrupts::new_with_raw_value(0));
        self.regs.write_isr(Interrupts::ALL);
    }

    #[inline]
    pub fn reset_fifos(&mut self) {
        self.regs.write_reset(Reset::ALL_FIFOS);
        self.regs.write_reset(Reset::new_with_raw_value(0));
    }

    #[inline]
    pub fn config(&self) -> &'static I3cConfig {
        self.config
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioI3c<'static> {
        &mut self.regs
    }

    /// Targets which were assigned a dynamic address.
    #[inline]
    pub fn targets(&self) -> &[TargetInfo] {
        &self.targets
    }

    /// Maximum number of polling iterations without progress before a blocking call returns
    /// [I3cError::Timeout].
    #[inline]
    pub fn set_poll_limit(&mut self, limit: u32) {
        self.poll_limit = limit;
    }

    /// Configure the push-pull and open-drain timing for the given SCL frequency.
    pub fn set_scl_clock(&mut self, scl: Hertz) -> Result<SclTiming, InvalidSclFrequency> {
        let t = SclTiming::calculate(self.config.input_clock, scl)?;
        self.regs.write_scl_high_time(timing(t.high));
        self.regs.write_scl_low_time(timing(t.low));
        self.regs.write_sda_hold_time(timing(t.sda_hold));
        self.regs.write_bus_idle(timing(t.bus_idle));
        self.regs.write_tsu_start(timing(t.tsu_start));
        self.regs.write_thd_start(timing(t.thd_start));
        self.regs.write_tsu_stop(timing(t.tsu_stop));
        self.regs.write_od_scl_high_time(timing(t.od_high));
        self.regs.write_od_scl_low_time(timing(t.od_low));
        Ok(t)
    }

    #[inline]
    pub fn enable(&mut self) {
        self.regs.modify_cr(|mut cr| {
            cr.set_enable(true);
            cr
        });
    }

    #[inline]
    pub fn disable(&mut self) {
        self.regs.modify_cr(|mut cr| {
            cr.set_enable(false);
            cr
        });
    }

    /// Abort the ongoing transfer and flush all FIFOs.
    pub fn abort(&mut self) {
        self.regs.modify_cr(|mut cr| {
            cr.set_abort(true);
            cr
        });
        self.reset_fifos();
        self.regs.modify_cr(|mut cr| {
            cr.set_abort(false);
            cr
        });
    }

    /// Release a bus stall after an error.
    pub fn resume(&mut self) {
        self.regs.modify_cr(|mut cr| {
            cr.set_resume(true);
            cr
        });
        self.regs.modify_cr(|mut cr| {
            cr.set_resume(false);
            cr
        });
    }

    /// Accept in-band interrupts from targets.
    pub fn enable_ibi(&mut self) -> Result<(), I3cError> {
        if !self.config.ibi_capable {
            return Err(I3cError::Unsupported);
        }
        self.regs.modify_cr(|mut cr| {
            cr.set_ibi_enable(true);
            cr
        });
        self.enable_events(ccc::Events::new_with_raw_value(0).with_interrupt(true))
    }

    /// Accept hot-join requests from targets.
    pub fn enable_hot_join(&mut self) -> Result<(), I3cError> {
        if !self.config.hj_capable {
            return Err(I3cError::Unsupported);
        }
        self.regs.modify_cr(|mut cr| {
            cr.set_hot_join_enable(true);
            cr
        });
        self.enable_events(ccc::Events::new_with_raw_value(0).with_hot_join(true))
    }

    pub(crate) fn next_tid(&mut self) -> u4 {
        let tid = self.tid;
        self.tid = (self.tid + 1) & 0xF;
        u4::new(tid)
    }

    pub(crate) fn command(&mut self, transfer: &Transfer) -> Command {
        Command::new_with_raw_value(0)
            .with_tid(self.next_tid())
            .with_byte_count(u12::new(transfer.len as u16))
            .with_target_addr(u7::new(transfer.target_addr))
            .with_read(transfer.read)
            .with_no_repeated_start(transfer.stop)
            .with_cmd_type(transfer.cmd_type.raw())
    }

    /// Wait until the response FIFO holds a word while feeding the write FIFO.
    fn write_and_wait<I: Iterator<Item = u8>>(
        &mut self,
        packer: &mut WordPacker<I>,
    ) -> Result<Response, I3cError> {
        let mut polls = 0;
        loop {
            let mut progress = false;
            while !packer.is_empty() && !self.regs.read_sr().wr_fifo_full() {
                if let Some(word) = packer.next_word() {
                    self.regs.write_wr_fifo(word);
                    progress = true;
                }
            }
            if !self.regs.read_sr().resp_fifo_empty() {
                return Ok(self.regs.read_resp_fifo());
            }
            polls = if progress { 0 } else { polls + 1 };
            if polls >= self.poll_limit {
                return Err(I3cError::Timeout);
            }
        }
    }

    /// Pass all words currently held by the read FIFO to the closure.
    fn drain_rd_words(regs: &mut MmioI3c<'static>, mut on_word: impl FnMut(u32)) -> bool {
        let words = regs.read_fifo_level_1().rd_fifo_count();
        for _ in 0..words {
            on_word(regs.read_rd_fifo());
        }
        words > 0
    }

    /// Drain all words currently held by the read FIFO into the buffer.
    pub(crate) fn drain_rd_fifo(
        regs: &mut MmioI3c<'static>,
        buf: &mut [u8],
        progress: &mut usize,
    ) -> bool {
        Self::drain_rd_words(regs, |word| {
            if *progress < buf.len() {
                let len = core::cmp::min(4, buf.len() - *progress);
                unpack_word(word, &mut buf[*progress..*progress + len]);
                *progress += len;
            }
        })
    }

    /// Wait until the response FIFO holds a word while draining the read FIFO.
    fn read_and_wait(&mut self, mut on_word: impl FnMut(u32)) -> Result<Response, I3cError> {
        let mut polls = 0;
        loop {
            let drained = Self::drain_rd_words(&mut self.regs, &mut on_word);
            if !self.regs.read_sr().resp_fifo_empty() {
                // Data which arrived together with the response.
                Self::drain_rd_words(&mut self.regs, &mut on_word);
                return Ok(self.regs.read_resp_fifo());
            }
            polls = if drained { 0 } else { polls + 1 };
            if polls >= self.poll_limit {
                return Err(I3cError::Timeout);
            }
        }
    }

    /// Read and discard a number of words from the read FIFO.
    fn discard_rd_words(&mut self, mut words: usize) -> Result<(), I3cError> {
        let mut polls = 0;
        while words > 0 {
            let available = self.regs.read_fifo_level_1().rd_fifo_count() as usize;
            if available == 0 {
                polls += 1;
                if polls >= self.poll_limit {
                    return Err(I3cError::Timeout);
                }
                continue;
            }
            polls = 0;
            for _ in 0..core::cmp::min(available, words) {
                self.regs.read_rd_fifo();
                words -= 1;
            }
        }
        Ok(())
    }

    pub(crate) fn write_transfer<I: Iterator<Item = u8>>(
        &mut self,
        transfer: Transfer,
        bytes: I,
    ) -> Result<(), I3cError> {
        check_target_address(transfer.target_addr)?;
        if transfer.len > MAX_TRANSFER_LEN {
            return Err(I3cError::TransferTooLarge);
        }
        let mut packer = WordPacker::new(bytes, transfer.len);
        // Pre-fill the write FIFO so the controller does not starve after the command.
        let mut free_words = self.config.rw_fifo_depth;
        while free_words > 0 && !packer.is_empty() && !self.regs.read_sr().wr_fifo_full() {
            if let Some(word) = packer.next_word() {
                self.regs.write_wr_fifo(word);
                free_words -= 1;
            }
        }
        let cmd = self.command(&transfer);
        self.regs.write_cmd_fifo(cmd);
        let resp = self.write_and_wait(&mut packer)?;
        response_result(resp).map(|_| ())
    }

    pub(crate) fn read_transfer(
        &mut self,
        transfer: Transfer,
        buf: &mut [u8],
    ) -> Result<usize, I3cError> {
        check_target_address(transfer.target_addr)?;
        if transfer.len > MAX_TRANSFER_LEN {
            return Err(I3cError::TransferTooLarge);
        }
        let cmd = self.command(&transfer);
        self.regs.write_cmd_fifo(cmd);
        let buf = &mut buf[..transfer.len];
        let mut received = 0;
        let resp = self.read_and_wait(|word| {
            if received < buf.len() {
                let len = core::cmp::min(4, buf.len() - received);
                unpack_word(word, &mut buf[received..received + len]);
                received += len;
            }
        })?;
        response_result(resp)?;
        Ok(received)
    }

    /// Legacy I2C read which fills several buffers in one transfer.
    fn i2c_read_merged(
        &mut self,
        addr: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
        len: usize,
        stop: bool,
    ) -> Result<(), I3cError> {
        check_target_address(addr)?;
        if len > MAX_TRANSFER_LEN {
            return Err(I3cError::TransferTooLarge);
        }
        let cmd = self.command(&Transfer {
            cmd_type: CommandType::LegacyI2c,
            target_addr: addr,
            len,
            read: true,
            stop,
        });
        self.regs.write_cmd_fifo(cmd);
        let mut bufs = operations.iter_mut().filter_map(|op| match op {
            embedded_hal::i2c::Operation::Read(buf) => Some(&mut **buf),
            embedded_hal::i2c::Operation::Write(_) => None,
        });
        let mut current = bufs.next();
        let mut offset = 0;
        let resp = self.read_and_wait(|word| {
            for byte in word.to_be_bytes() {
                while let Some(buf) = current.as_deref_mut() {
                    if offset < buf.len() {
                        buf[offset] = byte;
                        offset += 1;
                        break;
                    }
                    current = bufs.next();
                    offset = 0;
                }
            }
        })?;
        response_result(resp).map(|_| ())
    }

    /// Private SDR write to a target.
    ///
    /// With `stop` set to false, the transfer ends with a repeated start instead of a STOP
    /// condition.
    pub fn write_blocking(&mut self, target: u8, data: &[u8], stop: bool) -> Result<(), I3cError> {
        self.write_transfer(
            Transfer {
                cmd_type: CommandType::I3cSdr,
                target_addr: target,
                len: data.len(),
                read: false,
                stop,
            },
            data.iter().copied(),
        )
    }

    /// Private SDR read from a target. Returns the number of received bytes, which may be
    /// smaller than the buffer if the target ended the transfer early.
    pub fn read_blocking(
        &mut self,
        target: u8,
        buf: &mut [u8],
        stop: bool,
    ) -> Result<usize, I3cError> {
        self.read_transfer(
            Transfer {
                cmd_type: CommandType::I3cSdr,
                target_addr: target,
                len: buf.len(),
                read: true,
                stop,
            },
            buf,
        )
    }

    /// Legacy I2C write.
    pub fn i2c_write_blocking(
        &mut self,
        addr: u8,
        data: &[u8],
        stop: bool,
    ) -> Result<(), I3cError> {
        self.write_transfer(
            Transfer {
                cmd_type: CommandType::LegacyI2c,
                target_addr: addr,
                len: data.len(),
                read: false,
                stop,
            },
            data.iter().copied(),
        )
    }

    /// Legacy I2C read.
    pub fn i2c_read_blocking(
        &mut self,
        addr: u8,
        buf: &mut [u8],
        stop: bool,
    ) -> Result<usize, I3cError> {
        self.read_transfer(
            Transfer {
                cmd_type: CommandType::LegacyI2c,
                target_addr: addr,
                len: buf.len(),
                read: true,
                stop,
            },
            buf,
        )
    }

    /// Run the dynamic address assignment procedure.
    ///
    /// The addresses are handed out in order. Every target which takes part returns its
    /// provisioned ID, BCR and DCR. The procedure ends early without an error if no target is
    /// left to acknowledge the broadcast address. Returns the targets assigned during this call.
    pub fn dynamic_address_assignment(
        &mut self,
        addresses: &[u8],
    ) -> Result<&[TargetInfo], I3cError> {
        for &addr in addresses {
            check_dynamic_address(addr)?;
        }
        let first_new = self.targets.len();
        let max_targets = core::cmp::min(self.config.device_count as usize, MAX_TARGETS);
        let available = max_targets.saturating_sub(first_new);
        if addresses.len() > available {
            log::warn!(
                "I3C {}: only {} of {} dynamic addresses can be assigned",
                self.config.device_id,
                available,
                addresses.len()
            );
        }
        let addresses = &addresses[..core::cmp::min(addresses.len(), available)];
        if addresses.is_empty() {
            return Ok(&[]);
        }
        match self.send_ccc_broadcast_with_stop(ccc::ENTDAA, &[], false) {
            Ok(()) => (),
            Err(e) if e.is_nack() => {
                // No target on the bus requests an address.
                self.reset_fifos();
                return Ok(&[]);
            }
            Err(e) => return Err(e),
        }
        for (idx, &addr) in addresses.iter().enumerate() {
            if self.daa_assign_next(addr, idx + 1 == addresses.len())?.is_none() {
                break;
            }
        }
        Ok(&self.targets[first_new..])
    }

    /// Hand out one dynamic address after the ENTDAA broadcast. Returns [None] if no target
    /// acknowledged the broadcast address.
    pub(crate) fn daa_assign_next(
        &mut self,
        addr: u8,
        stop: bool,
    ) -> Result<Option<TargetInfo>, I3cError> {
        self.regs.write_wr_fifo(pack_word(&[daa_address_byte(addr)]));
        let mut resp = [0; DAA_RESPONSE_LEN];
        let result = self.read_transfer(
            Transfer {
                cmd_type: CommandType::I3cSdr,
                target_addr: BROADCAST_ADDRESS,
                len: DAA_RESPONSE_LEN,
                read: true,
                stop,
            },
            &mut resp,
        );
        match result {
            Ok(_) => (),
            Err(e) if e.is_nack() => {
                // No target left which wants an address.
                self.reset_fifos();
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        let target = TargetInfo::from_daa_response(addr, &resp);
        log::debug!(
            "I3C {}: assigned {:#04x} to PID {:#014x}",
            self.config.device_id,
            addr,
            target.id
        );
        self.regs.write_target_addr_bcr(
            zynq_bsp::i3c::TargetAddrBcr::new_with_raw_value(0)
                .with_addr(u7::new(addr))
                .with_bcr(target.bcr),
        );
        // Capacity is checked before the procedure starts.
        let _ = self.targets.push(target);
        Ok(Some(target))
    }

    /// Wait for an in-band interrupt or hot-join request and read its payload into the buffer.
    ///
    /// The whole payload is always removed from the read FIFO. Bytes which do not fit into the
    /// buffer are discarded, the returned [IbiEvent::len] is the length of the full payload.
    pub fn ibi_recv_blocking(&mut self, buf: &mut [u8]) -> Result<IbiEvent, I3cError> {
        let mut polls = 0;
        while self.regs.read_sr().ibi_resp_fifo_empty() {
            polls += 1;
            if polls >= self.poll_limit {
                return Err(I3cError::Timeout);
            }
        }
        let resp = self.regs.read_ibi_resp_fifo();
        let words = (resp.byte_count().value() as usize).div_ceil(4);
        let len = match response_result(resp) {
            Ok(len) => len,
            Err(e) => {
                // The response error takes precedence over a drain timeout.
                let _ = self.discard_rd_words(words);
                return Err(e);
            }
        };
        let copy_words = core::cmp::min(words, buf.len().div_ceil(4));
        let mut progress = 0;
        polls = 0;
        let mut read_words = 0;
        while read_words < copy_words {
            if self.regs.read_fifo_level_1().rd_fifo_count() == 0 {
                polls += 1;
                if polls >= self.poll_limit {
                    return Err(I3cError::Timeout);
                }
                continue;
            }
            polls = 0;
            let word = self.regs.read_rd_fifo();
            let copy_len = core::cmp::min(4, buf.len() - progress);
            unpack_word(word, &mut buf[progress..progress + copy_len]);
            progress += copy_len;
            read_words += 1;
        }
        self.discard_rd_words(words - copy_words)?;
        Ok(IbiEvent {
            target_addr: resp.target_addr().value(),
            len,
        })
    }
}

impl embedded_hal::i2c::ErrorType for I3c {
    type Error = I3cError;
}

impl embedded_hal::i2c::I2c for I3c {
    /// Adjacent operations of the same direction are merged into one transfer. A repeated
    /// start is only generated when the direction changes.
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        use embedded_hal::i2c::Operation;

        let mut start = 0;
        while start < operations.len() {
            let read = matches!(operations[start], Operation::Read(_));
            let end = start
                + operations[start..]
                    .iter()
                    .take_while(|op| matches!(op, Operation::Read(_)) == read)
                    .count();
            let stop = end == operations.len();
            let run = &mut operations[start..end];
            let len: usize = run
                .iter()
                .map(|op| match op {
                    Operation::Read(buf) => buf.len(),
                    Operation::Write(buf) => buf.len(),
                })
                .sum();
            if read {
                self.i2c_read_merged(address, run, len, stop)?;
            } else {
                let bytes = run.iter().flat_map(|op| match op {
                    Operation::Write(buf) => buf.iter().copied(),
                    Operation::Read(_) => (&[] as &[u8]).iter().copied(),
                });
                self.write_transfer(
                    Transfer {
                        cmd_type: CommandType::LegacyI2c,
                        target_addr: address,
                        len,
                        read: false,
                        stop,
                    },
                    bytes,
                )?;
            }
            start = end;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use super::*;
    use std::boxed::Box;
    use zynq_bsp::i3c::I3c as I3cRegs;

    pub(crate) const CMD_FIFO: usize = 0x20 / 4;
    pub(crate) const WR_FIFO: usize = 0x24 / 4;
    pub(crate) const RD_FIFO: usize = 0x28 / 4;
    pub(crate) const RESP_FIFO: usize = 0x2C / 4;
    pub(crate) const SR: usize = 0x10 / 4;
    pub(crate) const CR: usize = 0x08 / 4;
    pub(crate) const FIFO_LEVEL_1: usize = 0x34 / 4;
    pub(crate) const IBI_RESP_FIFO: usize = 0x5C / 4;
    pub(crate) const TARGET_ADDR_BCR: usize = 0x60 / 4;

    pub(crate) static TEST_CONFIG: I3cConfig = I3cConfig {
        device_id: 0,
        base_addr: 0,
        input_clock: Hertz::from_raw(100_000_000),
        rw_fifo_depth: 16,
        wr_threshold: 12,
        device_count: 2,
        ibi_capable: true,
        hj_capable: false,
    };

    /// Bus with more targets than a controller can address.
    static CROWDED_BUS_CONFIG: I3cConfig = I3cConfig {
        device_id: 0,
        base_addr: 0,
        input_clock: Hertz::from_raw(100_000_000),
        rw_fifo_depth: 16,
        wr_threshold: 12,
        device_count: 120,
        ibi_capable: true,
        hj_capable: false,
    };

    #[repr(C, align(8))]
    pub(crate) struct RegMem(pub [u32; 0x19]);

    /// RAM-backed register block. Every FIFO is modelled by a single word.
    pub(crate) fn ram_backed_i3c() -> (I3c, *mut RegMem) {
        ram_backed_i3c_with_config(&TEST_CONFIG)
    }

    fn ram_backed_i3c_with_config(config: &'static I3cConfig) -> (I3c, *mut RegMem) {
        let mem = Box::leak(Box::new(RegMem([0; 0x19])));
        let ptr = mem as *mut RegMem;
        let regs = unsafe { I3cRegs::new_mmio(ptr as *mut I3cRegs) };
        let mut i3c = I3c::new(regs, config);
        i3c.set_poll_limit(100);
        (i3c, ptr)
    }

    pub(crate) fn reg(mem: *mut RegMem, idx: usize) -> u32 {
        unsafe { (*mem).0[idx] }
    }

    pub(crate) fn set_reg(mem: *mut RegMem, idx: usize, val: u32) {
        unsafe { (*mem).0[idx] = val }
    }

    #[test]
    fn test_odd_parity() {
        // 0x08 has one bit set, the parity bit makes the total count odd without help.
        assert_eq!(odd_parity(0x08), 0);
        assert_eq!(odd_parity(0x09), 1);
        assert_eq!(odd_parity(0x00), 1);
        assert_eq!(odd_parity(0x7F), 0);
        assert_eq!(daa_address_byte(0x08), 0x10);
        assert_eq!(daa_address_byte(0x09), 0x13);
        for addr in 0..=0x7Fu8 {
            assert_eq!(daa_address_byte(addr).count_ones() % 2, 1);
        }
    }

    #[test]
    fn test_reserved_addresses() {
        assert!(is_reserved_address(0x7E));
        assert!(is_reserved_address(0x3E));
        assert!(is_reserved_address(0x03));
        assert!(!is_reserved_address(0x08));
        assert!(!is_reserved_address(0x50));
        assert_eq!(check_dynamic_address(0x80), Err(I3cError::InvalidAddress(0x80)));
        assert_eq!(check_dynamic_address(0x7A), Err(I3cError::InvalidAddress(0x7A)));
    }

    #[test]
    fn test_word_packing() {
        assert_eq!(pack_word(&[0x11, 0x22, 0x33, 0x44]), 0x1122_3344);
        assert_eq!(pack_word(&[0xAB]), 0xAB00_0000);
        assert_eq!(pack_word(&[0x01, 0x02, 0x03]), 0x0102_0300);
        let mut out = [0; 2];
        unpack_word(0xDEAD_BEEF, &mut out);
        assert_eq!(out, [0xDE, 0xAD]);

        let data = [1, 2, 3, 4, 5, 6];
        let mut packer = WordPacker::new(data.iter().copied(), data.len());
        assert_eq!(packer.next_word(), Some(0x0102_0304));
        assert_eq!(packer.next_word(), Some(0x0506_0000));
        assert_eq!(packer.next_word(), None);
        assert!(packer.is_empty());
    }

    #[test]
    fn test_command_word_layout() {
        let (mut i3c, _) = ram_backed_i3c();
        let cmd = i3c.command(&Transfer {
            cmd_type: CommandType::I3cSdr,
            target_addr: 0x7E,
            len: 9,
            read: true,
            stop: true,
        });
        assert_eq!(cmd.raw_value(), (9 << 16) | (0x7E << 9) | (1 << 8) | (1 << 4) | 1);
        let cmd = i3c.command(&Transfer {
            cmd_type: CommandType::LegacyI2c,
            target_addr: 0x50,
            len: 4095,
            read: false,
            stop: false,
        });
        assert_eq!(cmd.tid().value(), 1);
        assert_eq!(cmd.raw_value(), (1 << 28) | (4095 << 16) | (0x50 << 9));
    }

    #[test]
    fn test_response_decoding() {
        let ok = Response::new_with_raw_value((3 << 28) | (7 << 16));
        assert_eq!(response_result(ok), Ok(7));
        let nack = Response::new_with_raw_value(5 << 5);
        assert_eq!(response_result(nack), Err(I3cError::AddressNack));
        let hdr_nack = Response::new_with_raw_value(4 << 5);
        assert_eq!(response_result(hdr_nack), Err(I3cError::AddressHeaderNack));
        let unknown = Response::new_with_raw_value(12 << 5);
        assert_eq!(response_result(unknown), Err(I3cError::Unknown(12)));
        let ibi = Response::new_with_raw_value((2 << 16) | (0x09 << 9));
        assert_eq!(ibi.target_addr().value(), 0x09);
    }

    #[test]
    fn test_scl_timing() {
        let t = SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(12_500_000))
            .unwrap();
        assert_eq!(t.high, 4);
        assert_eq!(t.low, 4);
        assert_eq!(t.sda_hold, 1);
        assert_eq!(t.bus_idle, 8);
        assert_eq!(t.od_high, 4);
        assert_eq!(t.od_low, 20);

        let t = SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(400_000))
            .unwrap();
        assert_eq!(t.high, 125);
        assert_eq!(t.low, 125);
        assert_eq!(t.sda_hold, 50);
        assert_eq!(t.od_low, 125);

        assert!(matches!(
            SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(50_000_000)),
            Err(InvalidSclFrequency::TooHigh)
        ));
        assert!(matches!(
            SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(100)),
            Err(InvalidSclFrequency::TooLow)
        ));
        // Largest period which fits into the 18 bit timing registers.
        let t = SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(382)).unwrap();
        assert_eq!(t.bus_idle, 261_781);
        assert!(matches!(
            SclTiming::calculate(Hertz::from_raw(100_000_000), Hertz::from_raw(381)),
            Err(InvalidSclFrequency::TooLow)
        ));
    }

    #[test]
    fn test_daa_response_parsing() {
        let resp = [0x04, 0x6A, 0x00, 0x00, 0x12, 0x34, 0x27, 0xC4, 0x13];
        let info = TargetInfo::from_daa_response(0x09, &resp);
        assert_eq!(info.id, 0x046A_0000_1234);
        assert_eq!(info.bcr, 0x27);
        assert_eq!(info.dcr, 0xC4);
        assert!(info.ibi_capable());
        assert!(info.ibi_payload());
    }

    #[test]
    fn test_new_enables_controller() {
        let (_i3c, mem) = ram_backed_i3c();
        assert_eq!(reg(mem, CR) & 0b1, 1);
        // SCL high time register.
        assert_eq!(reg(mem, 0x38 / 4), 4);
    }

    #[test]
    fn test_write_blocking() {
        let (mut i3c, mem) = ram_backed_i3c();
        i3c.write_blocking(0x09, &[1, 2, 3, 4, 5], true).unwrap();
        assert_eq!(reg(mem, WR_FIFO), 0x0500_0000);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.byte_count().value(), 5);
        assert_eq!(cmd.target_addr().value(), 0x09);
        assert!(!cmd.read());
        assert!(cmd.no_repeated_start());
    }

    #[test]
    fn test_write_error_response() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, RESP_FIFO, 5 << 5);
        assert_eq!(
            i3c.write_blocking(0x09, &[1], true),
            Err(I3cError::AddressNack)
        );
    }

    #[test]
    fn test_transfer_limits() {
        let (mut i3c, _) = ram_backed_i3c();
        let big = [0; MAX_TRANSFER_LEN + 1];
        assert_eq!(
            i3c.write_blocking(0x09, &big, true),
            Err(I3cError::TransferTooLarge)
        );
        assert_eq!(
            i3c.write_blocking(0x80, &[0], true),
            Err(I3cError::InvalidAddress(0x80))
        );
    }

    #[test]
    fn test_read_blocking() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0xA1B2_C3D4);
        set_reg(mem, RESP_FIFO, 3 << 16);
        let mut buf = [0; 3];
        assert_eq!(i3c.read_blocking(0x0A, &mut buf, true), Ok(3));
        assert_eq!(buf, [0xA1, 0xB2, 0xC3]);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert!(cmd.read());
        assert_eq!(cmd.byte_count().value(), 3);
    }

    #[test]
    fn test_timeout() {
        let (mut i3c, mem) = ram_backed_i3c();
        // Response FIFO empty.
        set_reg(mem, SR, 1 << 4);
        assert_eq!(i3c.write_blocking(0x09, &[1], true), Err(I3cError::Timeout));
    }

    #[test]
    fn test_dynamic_address_assignment() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x0102_0304);
        let targets = i3c.dynamic_address_assignment(&[0x08, 0x09]).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].dynamic_addr, 0x09);
        // Every RAM-backed FIFO read returns the same word.
        assert_eq!(targets[0].id, 0x0102_0304_0102);
        assert_eq!(targets[0].bcr, 0x03);
        assert_eq!(targets[0].dcr, 0x04);
        assert_eq!(reg(mem, WR_FIFO), 0x1300_0000);
        assert_eq!(reg(mem, TARGET_ADDR_BCR), (0x03 << 8) | 0x09);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.target_addr().value(), BROADCAST_ADDRESS);
        assert_eq!(cmd.byte_count().value(), 9);
        assert!(cmd.no_repeated_start());
        assert_eq!(i3c.targets().len(), 2);
    }

    #[test]
    fn test_dynamic_address_assignment_nack() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, RESP_FIFO, 4 << 5);
        // The ENTDAA broadcast itself is not acknowledged.
        assert_eq!(i3c.dynamic_address_assignment(&[0x08]), Ok(&[][..]));
        assert!(i3c.targets().is_empty());
        set_reg(mem, RESP_FIFO, 1 << 5);
        assert_eq!(
            i3c.dynamic_address_assignment(&[0x08]),
            Err(I3cError::Crc)
        );
    }

    #[test]
    fn test_dynamic_address_assignment_partial() {
        let (mut i3c, mem) = ram_backed_i3c_with_config(&CROWDED_BUS_CONFIG);
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x0102_0304);
        i3c.send_ccc_broadcast_with_stop(ccc::ENTDAA, &[], false).unwrap();
        let first = i3c.daa_assign_next(0x08, false).unwrap().unwrap();
        assert_eq!(first.dynamic_addr, 0x08);
        // The second target slot stays empty.
        set_reg(mem, RESP_FIFO, 5 << 5);
        assert_eq!(i3c.daa_assign_next(0x09, true), Ok(None));
        assert_eq!(i3c.targets(), &[first]);
        assert_eq!(reg(mem, TARGET_ADDR_BCR), (0x03 << 8) | 0x08);
    }

    #[test]
    fn test_dynamic_address_assignment_appends() {
        let (mut i3c, mem) = ram_backed_i3c_with_config(&CROWDED_BUS_CONFIG);
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x0102_0304);
        assert_eq!(i3c.dynamic_address_assignment(&[0x08]).unwrap().len(), 1);
        let added = i3c.dynamic_address_assignment(&[0x09, 0x0A]).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].dynamic_addr, 0x09);
        assert_eq!(added[1].dynamic_addr, 0x0A);
        let addrs: std::vec::Vec<u8> = i3c.targets().iter().map(|t| t.dynamic_addr).collect();
        assert_eq!(addrs, [0x08, 0x09, 0x0A]);
    }

    #[test]
    fn test_dynamic_address_assignment_limits() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        // The configuration expects two targets.
        let added = i3c
            .dynamic_address_assignment(&[0x08, 0x09, 0x0A])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(i3c.dynamic_address_assignment(&[0x0B]), Ok(&[][..]));

        let (mut i3c, mem) = ram_backed_i3c_with_config(&CROWDED_BUS_CONFIG);
        set_reg(mem, FIFO_LEVEL_1, 1);
        let addresses: std::vec::Vec<u8> = (0x08..=0x7D)
            .filter(|addr| !is_reserved_address(*addr))
            .collect();
        assert!(addresses.len() > MAX_TARGETS);
        let added = i3c.dynamic_address_assignment(&addresses).unwrap();
        assert_eq!(added.len(), MAX_TARGETS);
        assert_eq!(added[MAX_TARGETS - 1].dynamic_addr, addresses[MAX_TARGETS - 1]);
        assert_eq!(i3c.targets().len(), MAX_TARGETS);
        assert_eq!(i3c.dynamic_address_assignment(&[0x7D]), Ok(&[][..]));
    }

    #[test]
    fn test_dynamic_address_assignment_invalid() {
        let (mut i3c, _) = ram_backed_i3c();
        assert_eq!(
            i3c.dynamic_address_assignment(&[0x08, 0x7E]),
            Err(I3cError::InvalidAddress(0x7E))
        );
    }

    #[test]
    fn test_ibi_recv() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, IBI_RESP_FIFO, (2 << 16) | (0x09 << 9));
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x5AA5_0000);
        let mut buf = [0; 4];
        let event = i3c.ibi_recv_blocking(&mut buf).unwrap();
        assert_eq!(event, IbiEvent { target_addr: 0x09, len: 2 });
        assert_eq!(&buf[..2], &[0x5A, 0xA5]);
        assert!(!event.is_hot_join());
    }

    #[test]
    fn test_ibi_payload_larger_than_buffer() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, IBI_RESP_FIFO, (6 << 16) | (0x09 << 9));
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x0102_0304);
        let mut buf = [0; 2];
        let event = i3c.ibi_recv_blocking(&mut buf).unwrap();
        assert_eq!(event, IbiEvent { target_addr: 0x09, len: 6 });
        assert_eq!(buf, [0x01, 0x02]);

        // The following private read is not affected.
        set_reg(mem, RESP_FIFO, 3 << 16);
        let mut buf = [0; 3];
        assert_eq!(i3c.read_blocking(0x0A, &mut buf, true), Ok(3));
        assert_eq!(buf, [0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_ibi_error_drains_payload() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, IBI_RESP_FIFO, (4 << 16) | (7 << 5));
        set_reg(mem, FIFO_LEVEL_1, 1);
        assert_eq!(i3c.ibi_recv_blocking(&mut [0; 4]), Err(I3cError::Aborted));
        // A payload which never arrives does not hide the response error.
        set_reg(mem, FIFO_LEVEL_1, 0);
        assert_eq!(i3c.ibi_recv_blocking(&mut [0; 4]), Err(I3cError::Aborted));
    }

    #[test]
    fn test_hot_join_unsupported() {
        let (mut i3c, _) = ram_backed_i3c();
        assert_eq!(i3c.enable_hot_join(), Err(I3cError::Unsupported));
        assert!(i3c.enable_ibi().is_ok());
    }

    #[test]
    fn test_i2c_transaction() {
        use embedded_hal::i2c::I2c as _;
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0x7700_0000);
        let mut buf = [0; 1];
        i3c.write_read(0x50, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0x77]);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.cmd_type(), CommandType::LegacyI2c.raw());
        assert!(cmd.read());
        assert!(cmd.no_repeated_start());
    }

    #[test]
    fn test_i2c_transaction_merges_operations() {
        use embedded_hal::i2c::{I2c as _, Operation};
        let (mut i3c, mem) = ram_backed_i3c();
        i3c.transaction(0x50, &mut [Operation::Write(&[1]), Operation::Write(&[2])])
            .unwrap();
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        // One command with transaction ID 0.
        assert_eq!(cmd.tid().value(), 0);
        assert_eq!(cmd.byte_count().value(), 2);
        assert!(!cmd.read());
        assert!(cmd.no_repeated_start());
        assert_eq!(reg(mem, WR_FIFO), 0x0102_0000);

        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0xA1B2_C3D4);
        let mut first = [0; 1];
        let mut second = [0; 2];
        i3c.transaction(
            0x50,
            &mut [
                Operation::Write(&[0x10]),
                Operation::Read(&mut first),
                Operation::Read(&mut second),
            ],
        )
        .unwrap();
        assert_eq!(first, [0xA1]);
        assert_eq!(second, [0xB2, 0xC3]);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        // Write and merged read.
        assert_eq!(cmd.tid().value(), 2);
        assert_eq!(cmd.byte_count().value(), 3);
        assert!(cmd.read());
        assert!(cmd.no_repeated_start());
    }
}
