//! # SCUGIC (Snoop Control Unit Generic Interrupt Controller) register module.
//!
//! The Zynq7000 APU integrates an ARM PL390 (GICv1) interrupt controller. The CPU interface and
//! the distributor are located inside the private MPCore register space.
use arbitrary_int::{u3, u4, u10};
use static_assertions::const_assert_eq;

pub const MPCORE_BASE_ADDR: usize = 0xF8F0_0000;
pub const GICC_BASE_ADDR: usize = MPCORE_BASE_ADDR + 0x100;
pub const GICD_BASE_ADDR: usize = MPCORE_BASE_ADDR + 0x1000;

/// Number of interrupt inputs handled by the distributor.
pub const NUM_OF_INTERRUPTS: usize = 96;
/// First Shared Peripheral Interrupt (SPI) ID.
pub const SPI_INT_ID_START: usize = 32;

/// Distributor Control Register
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct DistributorControlRegister {
    #[bit(1, rw)]
    enable_non_secure: bool,
    #[bit(0, rw)]
    enable_secure: bool,
}

/// Read only register. This register only returns fixed constants.
#[bitbybit::bitfield(u32, debug)]
pub struct TypeRegister {
    #[bits(11..=15, r)]
    lspi: arbitrary_int::u5,
    #[bit(10, r)]
    security_extension: bool,
    #[bits(5..=7, r)]
    cpu_number: u3,
    #[bits(0..=4, r)]
    it_lines_number: arbitrary_int::u5,
}

impl TypeRegister {
    /// Encoding: 0b001 means that the Cortex-A9 MPCore has 2 processors.
    pub const CPU_NUMBER_BITS: u8 = 0b001;
    /// The distributor provides 96 interrupts.
    pub const IT_LINES_NUMBER: u8 = 0x2;
    pub const NUM_OF_CPUS: usize = 2;
}

/// Target list filter of the software generated interrupt register.
#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum TargetListFilter {
    /// Forward the interrupt to the CPUs in the CPU target list.
    CpuTargetList = 0b00,
    /// Forward the interrupt to all CPUs except the requesting one.
    AllOtherCpus = 0b01,
    /// Forward the interrupt only to the requesting CPU.
    RequestingCpu = 0b10,
    Reserved = 0b11,
}

/// Software Generated Interrupt Register.
#[bitbybit::bitfield(u32, default = 0x0)]
pub struct SoftwareGeneratedInterrupt {
    #[bits(24..=25, w)]
    target_list_filter: TargetListFilter,
    #[bits(16..=23, w)]
    cpu_target_list: u8,
    /// Only relevant for the secure state.
    #[bit(15, w)]
    satt: bool,
    #[bits(0..=3, w)]
    sgi_id: u4,
}

/// GIC Distributor registers.
///
/// All banked register arrays are indexed by interrupt ID. [Self::iser] and similar registers
/// use one bit per interrupt, [Self::ipr] and [Self::iptr] one byte per interrupt and
/// [Self::icfr] two bits per interrupt.
#[derive(derive_mmio::Mmio)]
#[repr(C, align(8))]
pub struct GicDistributor {
    /// Distributor Control Register
    pub dcr: DistributorControlRegister,
    /// Interrupt Controller Type Register
    #[mmio(PureRead)]
    pub ictr: TypeRegister,
    /// Distributor Implementer Identification Register
    #[mmio(PureRead)]
    pub iidr: u32,
    _reserved_0: [u32; 0x1D],
    /// Interrupt security registers
    pub isr: [u32; 3],
    _reserved_1: [u32; 0x1D],
    /// Interrupt Set-Enable Registers
    pub iser: [u32; 0x3],
    _reserved_3: [u32; 0x1D],
    /// Interrupt Clear-Enable Registers
    pub icer: [u32; 0x3],
    _reserved_4: [u32; 0x1D],
    /// Interrupt Set-Pending Registers
    pub ispr: [u32; 0x3],
    _reserved_5: [u32; 0x1D],
    /// Interrupt Clear-Pending Registers
    pub icpr: [u32; 0x3],
    _reserved_6: [u32; 0x1D],
    /// Active Bit Registers
    pub abr: [u32; 0x3],
    _reserved_10: [u32; 0x3D],
    /// Interrupt Priority Registers
    pub ipr: [u32; 0x18],
    _reserved_11: [u32; 0xE8],
    /// Interrupt Processor Targets Registers. The SGI and PPI entries are read-only.
    pub iptr: [u32; 0x18],
    _reserved_12: [u32; 0xE8],
    /// Interrupt Configuration Registers. Index 0 covers the SGIs, index 1 the PPIs.
    pub icfr: [u32; 0x6],
    _reserved_13: [u32; 0x3A],
    pub ppi_status: u32,
    pub spi_status_0: u32,
    pub spi_status_1: u32,
    _reserved_14: [u32; 0x7D],
    /// Software Generated Interrupt Register.
    #[mmio(Write)]
    pub sgir: SoftwareGeneratedInterrupt,
    _reserved_15: [u32; 0x33],
    pub pidr_4: u32,
    pub pidr_5: u32,
    pub pidr_6: u32,
    pub pidr_7: u32,
    pub pidr_0: u32,
    pub pidr_1: u32,
    pub pidr_2: u32,
    pub pidr_3: u32,
    pub cidr: [u32; 4],
}

const_assert_eq!(core::mem::size_of::<GicDistributor>(), 0x1000);

impl GicDistributor {
    /// Create a new Global Interrupt Controller Distributor MMIO instance at the fixed address of
    /// the processing system.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioGicDistributor<'static> {
        unsafe { Self::new_mmio_at(GICD_BASE_ADDR) }
    }
}

/// CPU interface control register.
#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct InterfaceControl {
    #[bit(4, rw)]
    sbpr: bool,
    #[bit(3, rw)]
    fiq_en: bool,
    #[bit(2, rw)]
    ack_ctrl: bool,
    #[bit(1, rw)]
    enable_non_secure: bool,
    #[bit(0, rw)]
    enable_secure: bool,
}

/// Priority Mask Register
#[bitbybit::bitfield(u32, debug)]
pub struct PriorityRegister {
    #[bits(0..=7, rw)]
    priority: u8,
}

/// Interrupt acknowledge register.
#[bitbybit::bitfield(u32, debug)]
pub struct InterruptSignalRegister {
    #[bits(10..=12, rw)]
    cpu_id: u3,
    #[bits(0..=9, rw)]
    ack_int_id: u10,
}

/// GIC CPU interface registers.
#[derive(derive_mmio::Mmio)]
#[repr(C, align(8))]
pub struct GicCpuInterface {
    /// CPU Interface Control Register (ICR).
    pub icr: InterfaceControl,
    /// Interrupt Priority Mask Register.
    pub pmr: PriorityRegister,
    /// Binary Point Register.
    pub bpr: u32,
    /// Interrupt Acknowledge Register.
    pub iar: InterruptSignalRegister,
    /// End of Interrupt Register.
    pub eoir: InterruptSignalRegister,
    /// Running Priority Register.
    pub rpr: PriorityRegister,
    /// Highest Pending Interrupt Register.
    pub hpir: InterruptSignalRegister,
    /// Aliased Binary Point Register
    pub abpr: u32,
    _reserved_0: [u32; 0x37],
    /// CPU Interface Identification Register.
    #[mmio(PureRead)]
    pub iidr: u32,
}

const_assert_eq!(core::mem::size_of::<GicCpuInterface>(), 0x100);

impl GicCpuInterface {
    /// Create a new Global Interrupt Controller CPU MMIO instance at the fixed address of the
    /// processing system.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    #[inline]
    pub const unsafe fn new_mmio_fixed() -> MmioGicCpuInterface<'static> {
        unsafe { Self::new_mmio_at(GICC_BASE_ADDR) }
    }
}

/// Two bit trigger configuration of a single interrupt inside the ICFR registers.
#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
pub enum TriggerBits {
    Reserved0 = 0b00,
    /// Active-high level sensitive.
    Level = 0b01,
    /// Read-only encoding of software generated interrupts.
    Sgi = 0b10,
    /// Rising edge sensitive.
    RisingEdge = 0b11,
}
