//! # PS-XADC interface register module.
//!
//! The processing system accesses the XADC system monitor through a command FIFO and a read
//! data FIFO. Each FIFO entry is a dynamic reconfiguration port (DRP) command word, see
//! [DrpCommand].
use arbitrary_int::{u4, u5, u7, u10};

pub const XADC_BASE_ADDR: usize = 0xF800_7100;

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Config {
    #[bit(31, rw)]
    enable: bool,
    /// Command FIFO level threshold for the interrupt.
    #[bits(20..=23, rw)]
    cmd_fifo_threshold: u4,
    /// Data FIFO level threshold for the interrupt.
    #[bits(16..=19, rw)]
    data_fifo_threshold: u4,
    #[bit(13, rw)]
    write_edge: bool,
    #[bit(12, rw)]
    read_edge: bool,
    /// DRP clock divider, 0b00 means PCAP clock / 4.
    #[bits(8..=9, rw)]
    tck_rate: arbitrary_int::u2,
    /// Idle gap between successive commands in clock cycles.
    #[bits(0..=4, rw)]
    idle_gap: u5,
}

/// Interrupt status and interrupt mask layout.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Interrupts {
    #[bit(9, rw)]
    cmd_fifo_below_threshold: bool,
    #[bit(8, rw)]
    data_fifo_above_threshold: bool,
    #[bit(7, rw)]
    over_temperature: bool,
    #[bits(0..=6, rw)]
    alarms: u7,
}

#[bitbybit::bitfield(u32, debug)]
pub struct MiscStatus {
    #[bits(16..=19, r)]
    cmd_fifo_level: u4,
    #[bits(12..=15, r)]
    data_fifo_level: u4,
    #[bit(11, r)]
    cmd_fifo_full: bool,
    #[bit(10, r)]
    cmd_fifo_empty: bool,
    #[bit(9, r)]
    data_fifo_full: bool,
    #[bit(8, r)]
    data_fifo_empty: bool,
    #[bit(7, r)]
    over_temperature: bool,
    #[bits(0..=6, r)]
    alarms: u7,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct MiscControl {
    /// Resets the communication channel between PS and XADC, including both FIFOs.
    #[bit(4, rw)]
    reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrpOpcode {
    NoOp = 0b0000,
    Read = 0b0001,
    Write = 0b0010,
}

impl DrpOpcode {
    #[inline]
    pub const fn raw(self) -> u4 {
        u4::new(self as u8)
    }
}

/// DRP command word written to the command FIFO. The read FIFO returns words with the same
/// layout where only the data field is relevant.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DrpCommand {
    #[bits(26..=29, rw)]
    opcode: u4,
    #[bits(16..=25, rw)]
    addr: u10,
    #[bits(0..=15, rw)]
    data: u16,
}

/// XADC DRP register addresses.
pub mod drp {
    pub const TEMPERATURE: u16 = 0x00;
    pub const VCCINT: u16 = 0x01;
    pub const VCCAUX: u16 = 0x02;
    pub const VP_VN: u16 = 0x03;
    pub const VREFP: u16 = 0x04;
    pub const VREFN: u16 = 0x05;
    pub const VCCBRAM: u16 = 0x06;
    pub const VCCPINT: u16 = 0x0D;
    pub const VCCPAUX: u16 = 0x0E;
    pub const VCCO_DDR: u16 = 0x0F;
    /// First auxiliary channel VAUXP[0]/VAUXN[0]. Channels 0x10 to 0x1F are auxiliary inputs.
    pub const AUX_00: u16 = 0x10;
    pub const MAX_TEMPERATURE: u16 = 0x20;
    pub const MAX_VCCINT: u16 = 0x21;
    pub const MAX_VCCAUX: u16 = 0x22;
    pub const MAX_VCCBRAM: u16 = 0x23;
    pub const MIN_TEMPERATURE: u16 = 0x24;
    pub const MIN_VCCINT: u16 = 0x25;
    pub const MIN_VCCAUX: u16 = 0x26;
    pub const MIN_VCCBRAM: u16 = 0x27;
    pub const FLAG: u16 = 0x3F;
    pub const CONFIG_0: u16 = 0x40;
    pub const CONFIG_1: u16 = 0x41;
    pub const CONFIG_2: u16 = 0x42;
    /// First alarm threshold register. Thresholds occupy 0x50 to 0x5F.
    pub const ALARM_THRESHOLD_BASE: u16 = 0x50;
}

/// XADC configuration register 1, accessed through the DRP.
#[bitbybit::bitfield(u16, default = 0x0, debug)]
pub struct DrpConfig1 {
    #[bits(12..=15, rw)]
    sequencer_mode: u4,
    /// Disable bits for alarms 3 to 6.
    #[bits(8..=11, rw)]
    alarm_disable_high: u4,
    #[bits(4..=7, rw)]
    calibration_enable: u4,
    /// Disable bits for alarms 0 to 2.
    #[bits(1..=3, rw)]
    alarm_disable_low: arbitrary_int::u3,
    #[bit(0, rw)]
    over_temperature_disable: bool,
}

/// XADC register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct XAdc {
    config: Config,
    #[mmio(PureRead, Write, Modify)]
    interrupt_status: Interrupts,
    interrupt_mask: Interrupts,
    #[mmio(PureRead)]
    misc_status: MiscStatus,
    #[mmio(Write)]
    command_fifo: DrpCommand,
    #[mmio(Read)]
    data_fifo: DrpCommand,
    misc_control: MiscControl,
}

impl XAdc {
    /// Create a new XADC MMIO instance at address [XADC_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioXAdc<'static> {
        unsafe { XAdc::new_mmio_at(XADC_BASE_ADDR) }
    }
}

static_assertions::const_assert_eq!(core::mem::size_of::<XAdc>(), 0x1C);
