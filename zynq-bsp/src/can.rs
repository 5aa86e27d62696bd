//! # PS CAN controller register module.
//!
//! Based on the CAN controller chapter of the Zynq-7000 TRM.
use arbitrary_int::{u2, u3, u4, u11, u18};
use static_assertions::const_assert_eq;

pub const CAN_0_BASE_ADDR: usize = 0xE000_8000;
pub const CAN_1_BASE_ADDR: usize = 0xE000_9000;

/// Software Reset Register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct SoftwareReset {
    /// CAN enable. The controller leaves configuration mode when this bit is set.
    #[bit(1, rw)]
    enable: bool,
    /// Self-clearing software reset.
    #[bit(0, rw)]
    reset: bool,
}

/// Mode Select Register. Only writable in configuration mode.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ModeSelect {
    #[bit(2, rw)]
    snoop: bool,
    #[bit(1, rw)]
    loopback: bool,
    #[bit(0, rw)]
    sleep: bool,
}

/// Baud Rate Prescaler Register. The CAN clock is divided by this value + 1.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct BaudRatePrescaler {
    #[bits(0..=7, rw)]
    prescaler: u8,
}

/// Bit Timing Register. All values are the actual value minus one.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct BitTiming {
    #[bits(7..=8, rw)]
    sjw: u2,
    #[bits(4..=6, rw)]
    ts2: u3,
    #[bits(0..=3, rw)]
    ts1: u4,
}

/// Error Counter Register.
#[bitbybit::bitfield(u32, debug)]
pub struct ErrorCounter {
    #[bits(8..=15, r)]
    rx_errors: u8,
    #[bits(0..=7, r)]
    tx_errors: u8,
}

/// Error Status Register. Write-one-to-clear.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct ErrorStatus {
    #[bit(4, rw)]
    ack_error: bool,
    #[bit(3, rw)]
    bit_error: bool,
    #[bit(2, rw)]
    stuff_error: bool,
    #[bit(1, rw)]
    form_error: bool,
    #[bit(0, rw)]
    crc_error: bool,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorState {
    ConfigMode = 0b00,
    ErrorActive = 0b01,
    ErrorPassive = 0b10,
    BusOff = 0b11,
}

/// Status Register.
#[bitbybit::bitfield(u32, debug)]
pub struct Status {
    #[bit(12, r)]
    snoop: bool,
    /// The acceptance filter mask and ID registers can not be written.
    #[bit(11, r)]
    acceptance_filter_busy: bool,
    #[bit(10, r)]
    tx_fifo_full: bool,
    /// High priority transmit buffer full.
    #[bit(9, r)]
    tx_buf_full: bool,
    #[bits(7..=8, r)]
    error_state: ErrorState,
    #[bit(6, r)]
    error_warning: bool,
    #[bit(5, r)]
    bus_busy: bool,
    #[bit(4, r)]
    bus_idle: bool,
    #[bit(3, r)]
    normal: bool,
    #[bit(2, r)]
    sleep: bool,
    #[bit(1, r)]
    loopback: bool,
    #[bit(0, r)]
    config: bool,
}

/// Layout shared by the interrupt status, enable and clear registers.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Interrupts {
    #[bit(14, rw)]
    tx_fifo_empty: bool,
    #[bit(13, rw)]
    tx_fifo_watermark_empty: bool,
    #[bit(12, rw)]
    rx_fifo_watermark_full: bool,
    #[bit(11, rw)]
    wake_up: bool,
    #[bit(10, rw)]
    sleep: bool,
    #[bit(9, rw)]
    bus_off: bool,
    #[bit(8, rw)]
    error: bool,
    #[bit(7, rw)]
    rx_not_empty: bool,
    #[bit(6, rw)]
    rx_overflow: bool,
    #[bit(5, rw)]
    rx_underflow: bool,
    #[bit(4, rw)]
    rx_ok: bool,
    #[bit(3, rw)]
    tx_buf_full: bool,
    #[bit(2, rw)]
    tx_fifo_full: bool,
    #[bit(1, rw)]
    tx_ok: bool,
    #[bit(0, rw)]
    arbitration_lost: bool,
}

impl Interrupts {
    pub const ALL: Self = Self::new_with_raw_value(0x7FFF);
}

/// Timestamp Control Register.
#[bitbybit::bitfield(u32, default = 0x0)]
pub struct TimestampControl {
    #[bit(0, w)]
    clear: bool,
}

/// Watermark Interrupt Register.
#[bitbybit::bitfield(u32, default = 0x3F3F, debug)]
pub struct Watermarks {
    #[bits(8..=15, rw)]
    tx_empty: u8,
    #[bits(0..=7, rw)]
    rx_full: u8,
}

/// Identifier word of a message.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Identifier {
    /// Standard identifier, or the upper part of an extended identifier.
    #[bits(21..=31, rw)]
    id_high: u11,
    /// Substitute remote request for extended frames, RTR for standard frames.
    #[bit(20, rw)]
    srr_rtr: bool,
    #[bit(19, rw)]
    ide: bool,
    /// Lower 18 bits of an extended identifier.
    #[bits(1..=18, rw)]
    id_low: u18,
    /// Remote transmission request for extended frames.
    #[bit(0, rw)]
    rtr: bool,
}

/// Data length code word of a message.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DataLength {
    #[bits(28..=31, rw)]
    dlc: u4,
    /// Receive timestamp, only valid for received messages.
    #[bits(0..=15, r)]
    timestamp: u16,
}

/// One message slot: identifier, data length code and two data words.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct MessageBuffer {
    id: Identifier,
    dlc: DataLength,
    data_1: u32,
    data_2: u32,
}

/// Acceptance filter mask and ID pair.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct AcceptanceFilter {
    mask: u32,
    id: u32,
}

/// Acceptance filter enable register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct AcceptanceFilterEnable {
    #[bits(0..=3, rw)]
    enabled: u4,
}

/// PS CAN register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Can {
    srr: SoftwareReset,
    msr: ModeSelect,
    brpr: BaudRatePrescaler,
    btr: BitTiming,
    #[mmio(PureRead)]
    ecr: ErrorCounter,
    #[mmio(PureRead, Write, Modify)]
    esr: ErrorStatus,
    #[mmio(PureRead)]
    sr: Status,
    #[mmio(PureRead)]
    isr: Interrupts,
    ier: Interrupts,
    #[mmio(Write)]
    icr: Interrupts,
    #[mmio(Write)]
    tcr: TimestampControl,
    wir: Watermarks,
    #[mmio(Inner)]
    tx_fifo: MessageBuffer,
    #[mmio(Inner)]
    tx_high_priority: MessageBuffer,
    #[mmio(Inner)]
    rx_fifo: MessageBuffer,
    afr: AcceptanceFilterEnable,
    #[mmio(Inner)]
    filter_0: AcceptanceFilter,
    #[mmio(Inner)]
    filter_1: AcceptanceFilter,
    #[mmio(Inner)]
    filter_2: AcceptanceFilter,
    #[mmio(Inner)]
    filter_3: AcceptanceFilter,
}

const_assert_eq!(core::mem::size_of::<Can>(), 0x84);

impl Can {
    /// Create a new CAN MMIO instance for CAN0 at address [CAN_0_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed_0() -> MmioCan<'static> {
        unsafe { Self::new_mmio_at(CAN_0_BASE_ADDR) }
    }

    /// Create a new CAN MMIO instance for CAN1 at address [CAN_1_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed_1() -> MmioCan<'static> {
        unsafe { Self::new_mmio_at(CAN_1_BASE_ADDR) }
    }
}
