//! # Generic Interrupt Controller (SCUGIC) module
//!
//! The primary interface to configure the interrupt controller is the [GicConfigurator]. Interrupt
//! handlers are registered per interrupt ID with [GicConfigurator::connect] and are invoked by
//! [GicInterruptHelper::dispatch], which should be called from the IRQ exception handler.
//!
//! ```ignore
//! static I3C_IRQ: fn(&InterruptInfo) = |_| zynq_bsp_hal::i3c::asynch::on_interrupt(0);
//!
//! gic.connect(SpiInterrupt::Pl0.into(), &I3C_IRQ);
//! gic.enable_interrupt(SpiInterrupt::Pl0.into());
//!
//! // Inside the IRQ exception handler:
//! GicInterruptHelper::new().dispatch();
//! ```
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use arbitrary_int::{u4, u10};
use critical_section::Mutex;
use zynq_bsp::gic::{
    DistributorControlRegister, GicCpuInterface, InterfaceControl, InterruptSignalRegister,
    MmioGicCpuInterface, MmioGicDistributor, NUM_OF_INTERRUPTS, PriorityRegister,
    SPI_INT_ID_START, SoftwareGeneratedInterrupt, TargetListFilter, TriggerBits,
};

/// Spurious interrupt ID.
pub const SPURIOUS_INTERRUPT_ID: u32 = 1023;

pub const HIGHEST_PRIORITY: u8 = 0;
/// Lowest priority value. Only the upper five bits of a priority are implemented, so valid
/// priorities are multiples of 8.
pub const LOWEST_PRIORITY: u8 = 0xF8;
/// Mask for the implemented priority bits.
pub const PRIORITY_MASK: u8 = 0xF8;
/// Default priority written for every interrupt during the distributor initialization.
pub const DEFAULT_PRIORITY: u8 = 0xA0;
/// Priority mask programmed during the CPU interface initialization.
pub const DEFAULT_CPU_PRIORITY_MASK: u8 = 0xF0;

/// These fixed values must be programmed according to the Zynq7000 TRM p.236.
/// Configures #32 to #47.
pub const ICFR_2_FIXED_VALUE: u32 = 0b01010101010111010101010001011111;
/// These fixed values must be programmed according to the Zynq7000 TRM p.236.
/// This configures `PL[2:0]` to high-level sensitivity.
/// Configures #48 to #63.
pub const ICFR_3_FIXED_VALUE: u32 = 0b01010101010101011101010101010101;
/// These fixed values must be programmed according to the Zynq7000 TRM p.236.
/// This configures `PL[7:3]` to high-level sensitivity.
/// Configures #64 to #79.
pub const ICFR_4_FIXED_VALUE: u32 = 0b01110101010101010101010101010101;
/// These fixed values must be programmed according to the Zynq7000 TRM p.236.
/// This configures `PL[15:8]` to high-level sensitivity.
/// Configures #80 to #95.
pub const ICFR_5_FIXED_VALUE: u32 = 0b00000011010101010101010101010101;

/// Helper value to target all interrupts which can be targetted to CPU 0
pub const TARGETS_ALL_CPU_0_IPTR_VAL: u32 = 0x01010101;
/// Helper value to target all interrupts which can be targetted to CPU 1
pub const TARGETS_ALL_CPU_1_IPTR_VAL: u32 = 0x02020202;

pub const ACTIVATE_ALL_SGIS_MASK_ISER: u32 = 0x0000_FFFF;
pub const ACTIVATE_ALL_PPIS_MASK_ISER: u32 = 0xF800_0000;

/// Interrupt sensitivity of a configurable interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Active-high level sensitive.
    Level = 0b01,
    /// Rising edge sensitive.
    Edge = 0b11,
}

impl From<Sensitivity> for TriggerBits {
    fn from(value: Sensitivity) -> Self {
        match value {
            Sensitivity::Level => TriggerBits::Level,
            Sensitivity::Edge => TriggerBits::RisingEdge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCpu {
    None = 0b00,
    Cpu0 = 0b01,
    Cpu1 = 0b10,
    Both = 0b11,
}

/// Private Peripheral Interrupt (PPI) which are private to the CPU.
#[derive(Debug, Eq, PartialEq, Clone, Copy, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum PpiInterrupt {
    GlobalTimer = 27,
    // Interrupt signal from the PL. CPU0: `IRQF2P[18]` and CPU1: `IRQF2P[19]`
    NFiq = 28,
    CpuPrivateTimer = 29,
    /// AWDT0 and AWDT1 for each CPU.
    Awdt = 30,
    // Interrupt signal from the PL. CPU0: `IRQF2P[16]` and CPU1: `IRQF2P[17]`
    NIrq = 31,
}

/// Shared Peripheral Interrupt IDs.
#[derive(Debug, Eq, PartialEq, Clone, Copy, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum SpiInterrupt {
    Cpu0 = 32,
    Cpu1 = 33,
    L2Cache = 34,
    Ocm = 35,
    _Reserved0 = 36,
    Pmu0 = 37,
    Pmu1 = 38,
    Xadc = 39,
    DevC = 40,
    Swdt = 41,
    Ttc00 = 42,
    Ttc01 = 43,
    Ttc02 = 44,
    DmacAbort = 45,
    Dmac0 = 46,
    Dmac1 = 47,
    Dmac2 = 48,
    Dmac3 = 49,
    Smc = 50,
    Qspi = 51,
    Gpio = 52,
    Usb0 = 53,
    Eth0 = 54,
    Eth0Wakeup = 55,
    Sdio0 = 56,
    I2c0 = 57,
    Spi0 = 58,
    Uart0 = 59,
    Can0 = 60,
    Pl0 = 61,
    Pl1 = 62,
    Pl2 = 63,
    Pl3 = 64,
    Pl4 = 65,
    Pl5 = 66,
    Pl6 = 67,
    Pl7 = 68,
    Ttc10 = 69,
    Ttc11 = 70,
    Ttc12 = 71,
    Dmac4 = 72,
    Dmac5 = 73,
    Dmac6 = 74,
    Dmac7 = 75,
    Usb1 = 76,
    Eth1 = 77,
    Eth1Wakeup = 78,
    Sdio1 = 79,
    I2c1 = 80,
    Spi1 = 81,
    Uart1 = 82,
    Can1 = 83,
    Pl8 = 84,
    Pl9 = 85,
    Pl10 = 86,
    Pl11 = 87,
    Pl12 = 88,
    Pl13 = 89,
    Pl14 = 90,
    Pl15 = 91,
    ScuParity = 92,
}

/// Raw interrupt ID in the range `[0, 96)`.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct InterruptId(u8);

impl InterruptId {
    pub const fn new(id: usize) -> Result<Self, InvalidInterruptId> {
        if id >= NUM_OF_INTERRUPTS {
            return Err(InvalidInterruptId(id));
        }
        Ok(Self(id as u8))
    }

    #[inline]
    pub const fn raw(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_spi(&self) -> bool {
        self.0 as usize >= SPI_INT_ID_START
    }
}

impl From<SpiInterrupt> for InterruptId {
    fn from(value: SpiInterrupt) -> Self {
        Self(value as u8)
    }
}

impl From<PpiInterrupt> for InterruptId {
    fn from(value: PpiInterrupt) -> Self {
        Self(value as u8)
    }
}

/// Interrupt ID wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Sgi(usize),
    Ppi(PpiInterrupt),
    Spi(SpiInterrupt),
    /// Detects an invalid interrupt ID.
    Invalid(usize),
    /// Spurious interrupt (ID# 1023).
    Spurious,
}

impl Interrupt {
    pub fn from_raw_id(int_id: u32) -> Self {
        match int_id {
            0..=15 => Interrupt::Sgi(int_id as usize),
            27..=31 => PpiInterrupt::try_from(int_id as u8)
                .map(Interrupt::Ppi)
                .unwrap_or(Interrupt::Invalid(int_id as usize)),
            32..=92 => SpiInterrupt::try_from(int_id as u8)
                .map(Interrupt::Spi)
                .unwrap_or(Interrupt::Invalid(int_id as usize)),
            SPURIOUS_INTERRUPT_ID => Interrupt::Spurious,
            _ => Interrupt::Invalid(int_id as usize),
        }
    }

    /// Interrupt ID usable to index the distributor registers. Returns [None] for spurious and
    /// invalid interrupts.
    pub fn id(&self) -> Option<InterruptId> {
        match self {
            Interrupt::Sgi(id) => Some(InterruptId(*id as u8)),
            Interrupt::Ppi(ppi) => Some((*ppi).into()),
            Interrupt::Spi(spi) => Some((*spi).into()),
            Interrupt::Invalid(_) | Interrupt::Spurious => None,
        }
    }
}

#[derive(Debug)]
pub struct InterruptInfo {
    raw_reg: InterruptSignalRegister,
    interrupt: Interrupt,
    cpu_id: u8,
}

impl InterruptInfo {
    pub fn raw_reg(&self) -> InterruptSignalRegister {
        self.raw_reg
    }

    pub fn cpu_id(&self) -> u8 {
        self.cpu_id
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt
    }
}

/// Interrupt handler which can be connected to an interrupt ID.
///
/// The handler is called from the IRQ exception context with the acknowledged interrupt.
pub trait InterruptHandler: Sync {
    fn on_interrupt(&self, info: &InterruptInfo);
}

impl<F: Fn(&InterruptInfo) + Sync> InterruptHandler for F {
    fn on_interrupt(&self, info: &InterruptInfo) {
        self(info)
    }
}

type HandlerRef = &'static dyn InterruptHandler;

static HANDLERS: Mutex<RefCell<[Option<HandlerRef>; NUM_OF_INTERRUPTS]>> =
    Mutex::new(RefCell::new([None; NUM_OF_INTERRUPTS]));
static UNHANDLED_INTERRUPTS: AtomicU32 = AtomicU32::new(0);
static SPURIOUS_INTERRUPTS: AtomicU32 = AtomicU32::new(0);

/// Number of interrupts which were dispatched without a connected handler.
pub fn unhandled_interrupts() -> u32 {
    UNHANDLED_INTERRUPTS.load(Ordering::Relaxed)
}

/// Number of spurious interrupts seen by [GicInterruptHelper::dispatch].
pub fn spurious_interrupts() -> u32 {
    SPURIOUS_INTERRUPTS.load(Ordering::Relaxed)
}

fn handler_for(id: InterruptId) -> Option<HandlerRef> {
    critical_section::with(|cs| HANDLERS.borrow(cs).borrow()[id.raw()])
}

#[derive(Debug, thiserror::Error)]
#[error("invalid interrupt ID {0}, valid range is [0, 96)")]
pub struct InvalidInterruptId(pub usize);

#[derive(Debug, thiserror::Error)]
#[error("Invalid PL interrupt ID {0}")]
pub struct InvalidPlInterruptId(pub usize);

/// Invalid Software Generated Interrupt (SGI) ID.
#[derive(Debug, thiserror::Error)]
#[error("Invalid SGI interrupt ID {0}")]
pub struct InvalidSgiInterruptId(pub usize);

#[derive(Debug, thiserror::Error)]
pub enum GicError {
    #[error("interrupt ID {0} is not a shared peripheral interrupt")]
    NotASharedPeripheralInterrupt(usize),
    #[error("invalid CPU ID {0}")]
    InvalidCpuId(u8),
}

/// Higher-level GIC controller for the Zynq7000 SoC.
///
/// The flow of using this controller is as follows:
///
/// 1. Create the controller using [Self::new_with_init]. This performs the distributor
///    initialization (unless the distributor was already enabled by another core) and the CPU
///    interface initialization.
/// 2. Connect interrupt handlers with [Self::connect] and configure priorities and trigger
///    types with [Self::set_priority_trigger_type]. SPI targets can be changed with
///    [Self::map_to_cpu] and [Self::unmap_from_cpu].
/// 3. Enable the required interrupts with [Self::enable_interrupt] or one of the helper methods.
/// 4. Enable interrupts for the Cortex-A core by calling [Self::enable_interrupts].
pub struct GicConfigurator {
    pub gicc: MmioGicCpuInterface<'static>,
    pub gicd: MmioGicDistributor<'static>,
}

impl GicConfigurator {
    /// Create a new GIC controller instance and calls [Self::initialize].
    #[inline]
    pub fn new_with_init(
        gicc: MmioGicCpuInterface<'static>,
        gicd: MmioGicDistributor<'static>,
    ) -> Self {
        let mut gic = GicConfigurator { gicc, gicd };
        gic.initialize();
        gic
    }

    /// Create a new GIC controller instance for the register blocks of a configuration table
    /// entry and call [Self::initialize].
    ///
    /// # Safety
    ///
    /// The base addresses of the entry must point to the GIC register blocks. This circumvents
    /// ownership checks.
    pub unsafe fn new_with_config(config: &crate::config::GicConfig) -> Self {
        let gicc = unsafe { GicCpuInterface::new_mmio_at(config.cpu_base_addr) };
        let gicd = unsafe { zynq_bsp::gic::GicDistributor::new_mmio_at(config.dist_base_addr) };
        Self::new_with_init(gicc, gicd)
    }

    /// Create a new GIC controller instance without performing any initialization routines.
    ///
    /// # Safety
    ///
    /// This creates the GIC without performing any of the initialization routines necessary
    /// for proper operation. It also circumvents ownership checks. It is mainly intended to be
    /// used inside the interrupt handler.
    #[inline]
    pub unsafe fn steal() -> Self {
        GicConfigurator {
            gicc: unsafe { GicCpuInterface::new_mmio_fixed() },
            gicd: unsafe { zynq_bsp::gic::GicDistributor::new_mmio_fixed() },
        }
    }

    /// Initializes the distributor if it is not already enabled, and then the CPU interface.
    ///
    /// The distributor initialization disables the distributor, programs the fixed SPI
    /// sensitivities mandated by the TRM, assigns the default priority to every interrupt,
    /// targets all SPIs to CPU 0, disables every interrupt and finally enables the distributor
    /// again. A distributor which is already enabled was set up by another core and is left
    /// untouched.
    pub fn initialize(&mut self) {
        if !self.is_distributor_enabled() {
            self.initialize_distributor();
        }
        self.initialize_cpu_interface();
    }

    #[inline]
    pub fn is_distributor_enabled(&mut self) -> bool {
        self.gicd.read_dcr().enable_secure()
    }

    fn initialize_distributor(&mut self) {
        self.gicd.write_dcr(DistributorControlRegister::new_with_raw_value(0));
        // Unwraps okay, all indices are valid.
        self.gicd.write_icfr(2, ICFR_2_FIXED_VALUE).unwrap();
        self.gicd.write_icfr(3, ICFR_3_FIXED_VALUE).unwrap();
        self.gicd.write_icfr(4, ICFR_4_FIXED_VALUE).unwrap();
        self.gicd.write_icfr(5, ICFR_5_FIXED_VALUE).unwrap();
        let default_prio = u32::from_ne_bytes([DEFAULT_PRIORITY; 4]);
        for i in 0..NUM_OF_INTERRUPTS / 4 {
            self.gicd.write_ipr(i, default_prio).unwrap();
        }
        self.set_all_spi_interrupt_targets_cpu0();
        for i in 0..NUM_OF_INTERRUPTS / 32 {
            self.gicd.write_icer(i, 0xFFFF_FFFF).unwrap();
        }
        self.gicd.write_dcr(
            DistributorControlRegister::builder()
                .with_enable_non_secure(true)
                .with_enable_secure(true)
                .build(),
        );
        log::debug!("GIC distributor initialized");
    }

    fn initialize_cpu_interface(&mut self) {
        self.set_priority_mask(DEFAULT_CPU_PRIORITY_MASK);
        self.gicc.write_icr(
            InterfaceControl::builder()
                .with_sbpr(false)
                .with_fiq_en(false)
                .with_ack_ctrl(true)
                .with_enable_non_secure(true)
                .with_enable_secure(true)
                .build(),
        );
    }

    /// Set the priority mask for the CPU.
    ///
    /// Only interrupts with a higher priority than the mask will be accepted.
    /// A lower numerical number means a higher priority. This means that the reset value 0x0
    /// will mask all interrupts to the CPU while 0xff will unmask all interrupts.
    pub fn set_priority_mask(&mut self, mask: u8) {
        self.gicc
            .write_pmr(PriorityRegister::new_with_raw_value(mask as u32));
    }

    /// Set the priority and the trigger type of an interrupt.
    ///
    /// The lower three bits of the priority are not implemented and are masked. The trigger type
    /// of SGIs and PPIs is read-only and the write is ignored by the hardware.
    pub fn set_priority_trigger_type(
        &mut self,
        id: InterruptId,
        priority: u8,
        trigger: Sensitivity,
    ) {
        let id = id.raw();
        let prio_shift = (id % 4) * 8;
        let priority = (priority & PRIORITY_MASK) as u32;
        // Unwraps okay, the interrupt ID was validated.
        self.gicd
            .modify_ipr(id / 4, |v| (v & !(0xFF << prio_shift)) | (priority << prio_shift))
            .unwrap();
        let cfg_shift = (id % 16) * 2;
        let trigger = TriggerBits::from(trigger) as u32;
        self.gicd
            .modify_icfr(id / 16, |v| (v & !(0b11 << cfg_shift)) | (trigger << cfg_shift))
            .unwrap();
    }

    /// Read the priority and the raw trigger type of an interrupt.
    pub fn priority_trigger_type(&mut self, id: InterruptId) -> (u8, TriggerBits) {
        let id = id.raw();
        // Unwraps okay, the interrupt ID was validated.
        let ipr = self.gicd.read_ipr(id / 4).unwrap();
        let priority = (ipr >> ((id % 4) * 8)) as u8;
        let icfr = self.gicd.read_icfr(id / 16).unwrap();
        let trigger = ((icfr >> ((id % 16) * 2)) & 0b11) as u8;
        (
            priority,
            TriggerBits::new_with_raw_value(arbitrary_int::u2::new(trigger)),
        )
    }

    /// Set the sensitivity of a the Programmable Logic SPI interrupts.
    ///
    /// These are the only interrupt IDs which are configurable for SPI. They are set
    /// to high-level sensitivity by default by the [Self::initialize] function. You can
    /// use this method to override certain sensitivies.
    #[inline]
    pub fn set_pl_interrupt_sensitivity(
        &mut self,
        pl_int_id: usize,
        sensitivity: Sensitivity,
    ) -> Result<(), InvalidPlInterruptId> {
        let spi = match pl_int_id {
            0..=7 => SpiInterrupt::Pl0 as usize + pl_int_id,
            8..=15 => SpiInterrupt::Pl8 as usize + (pl_int_id - 8),
            _ => return Err(InvalidPlInterruptId(pl_int_id)),
        };
        let pos = (spi % 16) * 2;
        let mask = 0b11 << pos;
        // Unwrap okay, PL interrupts are always inside the ICFR range.
        self.gicd
            .modify_icfr(spi / 16, |v| (v & !mask) | ((sensitivity as u32) << pos))
            .unwrap();
        Ok(())
    }

    /// Set the CPU target for a SPI interrupt.
    ///
    /// See [Self::set_all_spi_interrupt_targets_cpu0] for a utility method to handle all
    /// interrupts with one core.
    #[inline]
    pub fn set_spi_interrupt_cpu_target(&mut self, spi_int: SpiInterrupt, target: TargetCpu) {
        let id = spi_int as usize;
        let shift = (id % 4) * 8;
        // Unwrap okay, calculated index is always valid.
        self.gicd
            .modify_iptr(id / 4, |v| (v & !(0xFF << shift)) | ((target as u32) << shift))
            .unwrap();
    }

    /// Utility function to set all SPI interrupt targets to CPU0.
    ///
    /// This is useful if only CPU0 is active in a system, or if CPU0 handles most interrupts in
    /// the system.
    #[inline]
    pub fn set_all_spi_interrupt_targets_cpu0(&mut self) {
        for i in SPI_INT_ID_START / 4..NUM_OF_INTERRUPTS / 4 {
            self.gicd
                .write_iptr(i, TARGETS_ALL_CPU_0_IPTR_VAL)
                .unwrap();
        }
    }

    /// Add a CPU to the target list of a SPI.
    pub fn map_to_cpu(&mut self, cpu_id: u8, id: InterruptId) -> Result<(), GicError> {
        let cpu_mask = Self::cpu_mask(cpu_id)?;
        if !id.is_spi() {
            return Err(GicError::NotASharedPeripheralInterrupt(id.raw()));
        }
        let shift = (id.raw() % 4) * 8;
        self.gicd
            .modify_iptr(id.raw() / 4, |v| v | (cpu_mask << shift))
            .unwrap();
        Ok(())
    }

    /// Remove a CPU from the target list of a SPI.
    pub fn unmap_from_cpu(&mut self, cpu_id: u8, id: InterruptId) -> Result<(), GicError> {
        let cpu_mask = Self::cpu_mask(cpu_id)?;
        if !id.is_spi() {
            return Err(GicError::NotASharedPeripheralInterrupt(id.raw()));
        }
        let shift = (id.raw() % 4) * 8;
        self.gicd
            .modify_iptr(id.raw() / 4, |v| v & !(cpu_mask << shift))
            .unwrap();
        Ok(())
    }

    /// Remove a CPU from the target list of all SPIs.
    pub fn unmap_all_from_cpu(&mut self, cpu_id: u8) -> Result<(), GicError> {
        let cpu_mask = Self::cpu_mask(cpu_id)?;
        let mask = u32::from_ne_bytes([cpu_mask as u8; 4]);
        for i in SPI_INT_ID_START / 4..NUM_OF_INTERRUPTS / 4 {
            self.gicd.modify_iptr(i, |v| v & !mask).unwrap();
        }
        Ok(())
    }

    fn cpu_mask(cpu_id: u8) -> Result<u32, GicError> {
        if cpu_id as usize >= zynq_bsp::gic::TypeRegister::NUM_OF_CPUS {
            return Err(GicError::InvalidCpuId(cpu_id));
        }
        Ok(1 << cpu_id)
    }

    /// Trigger a software generated interrupt.
    ///
    /// `cpu_target_list` is a bit mask of the CPUs which should receive the interrupt.
    pub fn software_interrupt(
        &mut self,
        sgi_id: usize,
        cpu_target_list: u8,
    ) -> Result<(), InvalidSgiInterruptId> {
        if sgi_id >= 16 {
            return Err(InvalidSgiInterruptId(sgi_id));
        }
        self.gicd.write_sgir(
            SoftwareGeneratedInterrupt::builder()
                .with_target_list_filter(TargetListFilter::CpuTargetList)
                .with_cpu_target_list(cpu_target_list)
                .with_satt(false)
                .with_sgi_id(u4::new(sgi_id as u8))
                .build(),
        );
        Ok(())
    }

    /// Enable the forwarding of an interrupt to the CPU interfaces.
    #[inline]
    pub fn enable_interrupt(&mut self, id: InterruptId) {
        // Unwrap okay, the interrupt ID was validated.
        self.gicd
            .write_iser(id.raw() / 32, 1 << (id.raw() % 32))
            .unwrap();
    }

    /// Disable the forwarding of an interrupt to the CPU interfaces.
    #[inline]
    pub fn disable_interrupt(&mut self, id: InterruptId) {
        self.gicd
            .write_icer(id.raw() / 32, 1 << (id.raw() % 32))
            .unwrap();
    }

    #[inline]
    pub fn is_interrupt_enabled(&mut self, id: InterruptId) -> bool {
        (self.gicd.read_iser(id.raw() / 32).unwrap() >> (id.raw() % 32)) & 1 == 1
    }

    #[inline]
    pub fn enable_sgi_interrupt(&mut self, int_id: usize) -> Result<(), InvalidSgiInterruptId> {
        if int_id >= 16 {
            return Err(InvalidSgiInterruptId(int_id));
        }
        unsafe { self.gicd.write_iser_unchecked(0, 1 << int_id) };
        Ok(())
    }

    #[inline]
    pub fn enable_all_sgi_interrupts(&mut self) {
        // Unwrap okay, index is valid.
        self.gicd
            .modify_iser(0, |v| v | ACTIVATE_ALL_SGIS_MASK_ISER)
            .unwrap();
    }

    #[inline]
    pub fn enable_ppi_interrupt(&mut self, ppi_int: PpiInterrupt) {
        self.enable_interrupt(ppi_int.into());
    }

    #[inline]
    pub fn enable_all_ppi_interrupts(&mut self) {
        self.gicd
            .modify_iser(0, |v| v | ACTIVATE_ALL_PPIS_MASK_ISER)
            .unwrap();
    }

    #[inline]
    pub fn enable_spi_interrupt(&mut self, spi_int: SpiInterrupt) {
        self.enable_interrupt(spi_int.into());
    }

    #[inline]
    pub fn enable_all_spi_interrupts(&mut self) {
        self.gicd.write_iser(1, 0xFFFF_FFFF).unwrap();
        self.gicd.write_iser(2, 0xFFFF_FFFF).unwrap();
    }

    /// Enables all interrupts by calling [Self::enable_all_sgi_interrupts],
    /// [Self::enable_all_ppi_interrupts] and [Self::enable_all_spi_interrupts].
    pub fn enable_all_interrupts(&mut self) {
        self.enable_all_sgi_interrupts();
        self.enable_all_ppi_interrupts();
        self.enable_all_spi_interrupts();
    }

    /// Register an interrupt handler for the given interrupt ID and return the previously
    /// registered handler.
    ///
    /// This does not enable the interrupt.
    pub fn connect(
        &mut self,
        id: InterruptId,
        handler: &'static dyn InterruptHandler,
    ) -> Option<&'static dyn InterruptHandler> {
        critical_section::with(|cs| HANDLERS.borrow(cs).borrow_mut()[id.raw()].replace(handler))
    }

    /// Disable the interrupt and remove its handler.
    pub fn disconnect(&mut self, id: InterruptId) -> Option<&'static dyn InterruptHandler> {
        self.disable_interrupt(id);
        critical_section::with(|cs| HANDLERS.borrow(cs).borrow_mut()[id.raw()].take())
    }

    /// Remove the calling CPU from all SPI targets.
    ///
    /// If no other CPU is targeted by any SPI, all interrupts are disabled and the distributor is
    /// disabled as well. Returns whether the distributor was disabled.
    pub fn stop(&mut self, cpu_id: u8) -> Result<bool, GicError> {
        let cpu_mask = Self::cpu_mask(cpu_id)?;
        if !self.is_distributor_enabled() {
            return Ok(false);
        }
        let local_mask = u32::from_ne_bytes([cpu_mask as u8; 4]);
        let mut disable_distributor = true;
        for i in SPI_INT_ID_START / 4..NUM_OF_INTERRUPTS / 4 {
            let targets = self.gicd.read_iptr(i).unwrap();
            if targets != local_mask && targets != 0 {
                disable_distributor = false;
            }
            self.gicd.write_iptr(i, targets & !local_mask).unwrap();
        }
        if disable_distributor {
            for i in 0..NUM_OF_INTERRUPTS / 32 {
                self.gicd.write_icer(i, 0xFFFF_FFFF).unwrap();
            }
            self.gicd
                .write_dcr(DistributorControlRegister::new_with_raw_value(0));
            log::debug!("GIC distributor disabled by CPU {cpu_id}");
        }
        Ok(disable_distributor)
    }

    /// Enable the regular interrupt exception for the Cortex-A core.
    ///
    /// # Safety
    ///
    /// Do not call this in a critical section.
    #[cfg(target_arch = "arm")]
    pub unsafe fn enable_interrupts(&self) {
        unsafe {
            cortex_ar::interrupt::enable();
        }
    }

    /// Disable the regular interrupt exception for the Cortex-A core.
    #[cfg(target_arch = "arm")]
    pub fn disable_interrupts(&self) {
        cortex_ar::interrupt::disable();
    }
}

/// Helper structure which should only be used inside the interrupt handler once the GIC has
/// been configured with the [GicConfigurator].
pub struct GicInterruptHelper(MmioGicCpuInterface<'static>);

impl GicInterruptHelper {
    /// Create the interrupt helper with the fixed GICC MMIO instance.
    pub const fn new() -> Self {
        GicInterruptHelper(unsafe { GicCpuInterface::new_mmio_fixed() })
    }

    /// Create the interrupt helper from a GICC MMIO instance.
    pub const fn new_with_regs(gicc: MmioGicCpuInterface<'static>) -> Self {
        GicInterruptHelper(gicc)
    }

    /// Acknowledges an interrupt by reading the IAR register and returning the interrupt context
    /// information structure.
    ///
    /// This should be called at the start of an interrupt handler.
    pub fn acknowledge_interrupt(&mut self) -> InterruptInfo {
        let iar = self.0.read_iar();
        InterruptInfo {
            interrupt: Interrupt::from_raw_id(iar.ack_int_id().value() as u32),
            cpu_id: iar.cpu_id().value(),
            raw_reg: iar,
        }
    }

    /// Acknowledges the end of an interrupt by writing the EOIR register of the GICC.
    ///
    /// This should be called at the end of an interrupt handler.
    pub fn end_of_interrupt(&mut self, irq_info: InterruptInfo) {
        self.0.write_eoir(irq_info.raw_reg())
    }

    /// Acknowledge the pending interrupt, call the connected handler and signal the end of the
    /// interrupt.
    ///
    /// Spurious interrupts are counted and not signalled back to the GIC. Interrupts without a
    /// connected handler are counted as unhandled.
    pub fn dispatch(&mut self) -> Interrupt {
        let info = self.acknowledge_interrupt();
        let interrupt = info.interrupt();
        if interrupt == Interrupt::Spurious {
            SPURIOUS_INTERRUPTS.fetch_add(1, Ordering::Relaxed);
            return interrupt;
        }
        match interrupt.id().and_then(handler_for) {
            Some(handler) => handler.on_interrupt(&info),
            None => {
                UNHANDLED_INTERRUPTS.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.end_of_interrupt(info);
        interrupt
    }
}

impl Default for GicInterruptHelper {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the raw IAR/EOIR value for the given interrupt ID and source CPU.
#[inline]
pub fn interrupt_signal(int_id: u16, cpu_id: u8) -> InterruptSignalRegister {
    InterruptSignalRegister::new_with_raw_value(0)
        .with_cpu_id(arbitrary_int::u3::new(cpu_id & 0b111))
        .with_ack_int_id(u10::new(int_id & 0x3FF))
}
