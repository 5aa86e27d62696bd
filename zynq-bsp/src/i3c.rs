//! # AXI I3C controller register module.
//!
//! The AXI I3C IP core is instantiated inside the programmable logic, so there is no fixed base
//! address. The base address is provided by the configuration table generated for the hardware
//! design.
//!
//! The controller is driven through four FIFOs:
//!
//! - The command FIFO, which accepts one [Command] word per transfer.
//! - The write FIFO and read FIFO, which carry the transfer payload packed into 32-bit words
//!   in big-endian order.
//! - The response FIFO, which returns one [Response] word per completed command.
use arbitrary_int::{u4, u7, u12, u18};
use static_assertions::const_assert_eq;

/// The 7-bit broadcast address `0x7E` which addresses all I3C targets at once.
pub const BROADCAST_ADDRESS: u8 = 0x7E;

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Reset {
    #[bit(4, rw)]
    resp_fifo: bool,
    #[bit(3, rw)]
    rd_fifo: bool,
    #[bit(2, rw)]
    wr_fifo: bool,
    #[bit(1, rw)]
    cmd_fifo: bool,
    /// Resets the whole core including all FIFOs.
    #[bit(0, rw)]
    soft: bool,
}

impl Reset {
    /// Mask which resets all FIFOs without resetting the core.
    pub const ALL_FIFOS: Self = Self::new_with_raw_value(0b11110);
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Control {
    /// Accept hot-join requests from targets.
    #[bit(4, rw)]
    hot_join_enable: bool,
    /// Accept in-band interrupts from targets.
    #[bit(3, rw)]
    ibi_enable: bool,
    /// Resume after the controller stalled the bus due to an error.
    #[bit(2, rw)]
    resume: bool,
    /// Abort the ongoing transfer at the next possible point.
    #[bit(1, rw)]
    abort: bool,
    #[bit(0, rw)]
    enable: bool,
}

/// Address of the controller itself. Only relevant when a secondary controller takes over.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DeviceAddress {
    #[bits(0..=6, rw)]
    addr: u7,
}

#[bitbybit::bitfield(u32, debug)]
pub struct Status {
    #[bit(9, r)]
    ibi_resp_fifo_empty: bool,
    #[bit(8, r)]
    rd_fifo_empty: bool,
    #[bit(7, r)]
    rd_fifo_full: bool,
    #[bit(6, r)]
    wr_fifo_empty: bool,
    #[bit(5, r)]
    wr_fifo_full: bool,
    #[bit(4, r)]
    resp_fifo_empty: bool,
    #[bit(3, r)]
    resp_fifo_full: bool,
    #[bit(2, r)]
    cmd_fifo_full: bool,
    /// The controller holds SCL low after an error and waits for [Control::resume].
    #[bit(1, r)]
    clock_stall: bool,
    #[bit(0, r)]
    bus_busy: bool,
}

/// Interrupt status and interrupt enable layout.
///
/// The status register is write-one-to-clear. There are two enable registers: one which
/// triggers on the rising edge of a condition and one which triggers on the falling edge. The
/// write FIFO refill interrupt uses the falling edge of [Self::wr_fifo_almost_full].
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Interrupts {
    #[bit(6, rw)]
    ibi_resp_not_empty: bool,
    #[bit(5, rw)]
    resp_not_empty: bool,
    #[bit(4, rw)]
    cmd_fifo_not_full: bool,
    #[bit(3, rw)]
    hot_join: bool,
    #[bit(2, rw)]
    ibi: bool,
    #[bit(1, rw)]
    rd_fifo_almost_full: bool,
    #[bit(0, rw)]
    wr_fifo_almost_full: bool,
}

impl Interrupts {
    pub const ALL: Self = Self::new_with_raw_value(0x7F);
}

/// Command type field of a [Command] word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    /// Legacy I2C transfer, open-drain with I2C timing.
    LegacyI2c = 0b0000,
    /// I3C single data rate transfer, also used for CCCs.
    I3cSdr = 0b0001,
}

impl CommandType {
    #[inline]
    pub const fn raw(self) -> u4 {
        u4::new(self as u8)
    }
}

/// Word written into the command FIFO. One word starts one transfer.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Command {
    /// Transaction ID echoed in the matching [Response].
    #[bits(28..=31, rw)]
    tid: u4,
    #[bits(16..=27, rw)]
    byte_count: u12,
    #[bits(9..=15, rw)]
    target_addr: u7,
    /// 1: read transfer, 0: write transfer.
    #[bit(8, rw)]
    read: bool,
    /// Parity error check.
    #[bit(5, rw)]
    pec: bool,
    /// Terminate the transfer with a STOP condition instead of a repeated start.
    #[bit(4, rw)]
    no_repeated_start: bool,
    #[bits(0..=3, rw)]
    cmd_type: u4,
}

/// Word read from the response FIFO or the IBI response FIFO.
#[bitbybit::bitfield(u32, debug)]
pub struct Response {
    #[bits(28..=31, r)]
    tid: u4,
    /// Remaining byte count for writes, received byte count for reads and IBIs.
    #[bits(16..=27, r)]
    byte_count: u12,
    /// Address of the target which raised an IBI. Only valid for IBI responses.
    #[bits(9..=15, r)]
    target_addr: u7,
    #[bits(5..=8, r)]
    error_code: u4,
}

/// Fill level of the command and write FIFOs, in free words.
#[bitbybit::bitfield(u32, debug)]
pub struct FifoLevel {
    #[bits(16..=31, r)]
    cmd_fifo_free: u16,
    #[bits(0..=15, r)]
    wr_fifo_free: u16,
}

/// Fill level of the response and read FIFOs, in occupied words.
#[bitbybit::bitfield(u32, debug)]
pub struct FifoLevel1 {
    #[bits(16..=31, r)]
    resp_fifo_count: u16,
    #[bits(0..=15, r)]
    rd_fifo_count: u16,
}

/// Timing register value in input clock cycles.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Timing {
    #[bits(0..=17, rw)]
    cycles: u18,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct TargetAddrBcr {
    #[bits(8..=15, rw)]
    bcr: u8,
    #[bits(0..=6, rw)]
    addr: u7,
}

/// AXI I3C register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct I3c {
    #[mmio(PureRead)]
    version: u32,
    reset: Reset,
    cr: Control,
    address: DeviceAddress,
    #[mmio(PureRead)]
    sr: Status,
    #[mmio(PureRead, Write, Modify)]
    isr: Interrupts,
    /// Rising edge interrupt enable.
    ier_rising: Interrupts,
    /// Falling edge interrupt enable.
    ier_falling: Interrupts,
    #[mmio(Write)]
    cmd_fifo: Command,
    #[mmio(Write)]
    wr_fifo: u32,
    #[mmio(Read)]
    rd_fifo: u32,
    #[mmio(Read)]
    resp_fifo: Response,
    #[mmio(PureRead)]
    fifo_level: FifoLevel,
    #[mmio(PureRead)]
    fifo_level_1: FifoLevel1,
    scl_high_time: Timing,
    scl_low_time: Timing,
    sda_hold_time: Timing,
    bus_idle: Timing,
    tsu_start: Timing,
    thd_start: Timing,
    tsu_stop: Timing,
    od_scl_high_time: Timing,
    od_scl_low_time: Timing,
    #[mmio(Read)]
    ibi_resp_fifo: Response,
    target_addr_bcr: TargetAddrBcr,
}

const_assert_eq!(core::mem::size_of::<I3c>(), 0x64);
