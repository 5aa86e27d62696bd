//! # System watchdog timer (SWDT) register module.
//!
//! All writes to the mode and control registers must contain a key value, otherwise the write
//! is ignored by the hardware.
use arbitrary_int::u12;

pub const SWDT_BASE_ADDR: usize = 0xF800_5000;

/// Key which must be written to the [Mode::zkey] field.
pub const MODE_KEY: u16 = 0xABC;
/// Key which must be written to the [Control::ckey] field.
pub const CONTROL_KEY: u16 = 0x248;
/// Value which must be written to the restart register to reload the counter.
pub const RESTART_KEY: u32 = 0x1999;

/// Length of the interrupt request output pulse in watchdog clock cycles.
#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum PulseLength {
    Cycles4 = 0b00,
    Cycles8 = 0b01,
    Cycles16 = 0b10,
    Cycles32 = 0b11,
}

/// Zero mode register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Mode {
    /// Zero access key, must be [MODE_KEY] for a write to be accepted. Reads as 0.
    #[bits(12..=23, rw)]
    zkey: u12,
    /// Interrupt request output pulse length.
    #[bits(7..=8, rw)]
    irq_length: PulseLength,
    #[bit(2, rw)]
    irq_enable: bool,
    #[bit(1, rw)]
    reset_enable: bool,
    #[bit(0, rw)]
    enable: bool,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum ClockPrescaler {
    Div8 = 0b00,
    Div64 = 0b01,
    Div512 = 0b10,
    Div4096 = 0b11,
}

impl ClockPrescaler {
    pub const fn divisor(&self) -> u32 {
        match self {
            ClockPrescaler::Div8 => 8,
            ClockPrescaler::Div64 => 64,
            ClockPrescaler::Div512 => 512,
            ClockPrescaler::Div4096 => 4096,
        }
    }
}

/// Counter control register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct Control {
    /// Counter access key, must be [CONTROL_KEY] for a write to be accepted. Reads as 0.
    #[bits(14..=25, rw)]
    ckey: u12,
    /// Counter restart value. The upper 12 bits of the 24-bit down counter are reloaded with
    /// this value, the lower 12 bits with 0xFFF.
    #[bits(2..=13, rw)]
    crv: u12,
    #[bits(0..=1, rw)]
    prescaler: ClockPrescaler,
}

#[bitbybit::bitfield(u32, debug)]
pub struct Status {
    /// The counter reached zero.
    #[bit(0, r)]
    zero: bool,
}

/// System watchdog register block.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Swdt {
    mode: Mode,
    control: Control,
    #[mmio(Write)]
    restart: u32,
    #[mmio(PureRead)]
    status: Status,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Swdt>(), 0x10);

impl Swdt {
    /// Create a new SWDT MMIO instance at address [SWDT_BASE_ADDR].
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioSwdt<'static> {
        unsafe { Self::new_mmio_at(SWDT_BASE_ADDR) }
    }
}
