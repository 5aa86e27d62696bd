//! # Device configuration tables
//!
//! Every driver is constructed from one entry of a static configuration table. The entries
//! describe the hardware design: base addresses, input clocks and the optional features which
//! were enabled when the IP core was instantiated. The tables in this module describe the
//! default Zynq7000 design with both PS CAN controllers, the system watchdog, the PS-XADC
//! interface and one AXI I3C controller inside the programmable logic.
//!
//! Applications with a different hardware design can declare their own tables and use the
//! generic [lookup] function.
use crate::time::Hertz;

/// Common interface of all configuration table entries.
pub trait DeviceConfig: 'static {
    fn device_id(&self) -> u16;
}

/// Look up the table entry for the given device ID.
pub fn lookup<C: DeviceConfig>(table: &'static [C], device_id: u16) -> Option<&'static C> {
    table.iter().find(|cfg| cfg.device_id() == device_id)
}

macro_rules! device_config_impl {
    ($($Config:ident),+) => {
        $(
            impl DeviceConfig for $Config {
                #[inline]
                fn device_id(&self) -> u16 {
                    self.device_id
                }
            }
        )+
    };
}

/// AXI I3C controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I3cConfig {
    pub device_id: u16,
    pub base_addr: usize,
    /// AXI clock which drives the controller logic and all timing registers.
    pub input_clock: Hertz,
    /// Depth of the write and read FIFOs in 32-bit words.
    pub rw_fifo_depth: u16,
    /// Write FIFO programmable full threshold in 32-bit words.
    pub wr_threshold: u16,
    /// Number of targets expected on the bus.
    pub device_count: u8,
    pub ibi_capable: bool,
    pub hj_capable: bool,
}

/// SCUGIC configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GicConfig {
    pub device_id: u16,
    pub cpu_base_addr: usize,
    pub dist_base_addr: usize,
}

/// PS CAN controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanConfig {
    pub device_id: u16,
    pub base_addr: usize,
    /// CAN reference clock.
    pub ref_clock: Hertz,
}

/// System watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwdtConfig {
    pub device_id: u16,
    pub base_addr: usize,
    /// Watchdog counter clock, which is the CPU 1x clock by default.
    pub input_clock: Hertz,
}

/// PS-XADC interface configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XadcConfig {
    pub device_id: u16,
    pub base_addr: usize,
}

device_config_impl!(I3cConfig, GicConfig, CanConfig, SwdtConfig, XadcConfig);

/// Base address of the AXI I3C controller in the default hardware design.
pub const I3C_0_BASE_ADDR: usize = 0x4380_0000;

pub static I3C_CONFIG_TABLE: [I3cConfig; 1] = [I3cConfig {
    device_id: 0,
    base_addr: I3C_0_BASE_ADDR,
    input_clock: Hertz::from_raw(100_000_000),
    rw_fifo_depth: 16,
    wr_threshold: 12,
    device_count: 2,
    ibi_capable: true,
    hj_capable: true,
}];

pub static GIC_CONFIG_TABLE: [GicConfig; 1] = [GicConfig {
    device_id: 0,
    cpu_base_addr: zynq_bsp::gic::GICC_BASE_ADDR,
    dist_base_addr: zynq_bsp::gic::GICD_BASE_ADDR,
}];

pub static CAN_CONFIG_TABLE: [CanConfig; 2] = [
    CanConfig {
        device_id: 0,
        base_addr: zynq_bsp::can::CAN_0_BASE_ADDR,
        ref_clock: Hertz::from_raw(24_000_000),
    },
    CanConfig {
        device_id: 1,
        base_addr: zynq_bsp::can::CAN_1_BASE_ADDR,
        ref_clock: Hertz::from_raw(24_000_000),
    },
];

pub static SWDT_CONFIG_TABLE: [SwdtConfig; 1] = [SwdtConfig {
    device_id: 0,
    base_addr: zynq_bsp::swdt::SWDT_BASE_ADDR,
    input_clock: Hertz::from_raw(111_111_115),
}];

pub static XADC_CONFIG_TABLE: [XadcConfig; 1] = [XadcConfig {
    device_id: 0,
    base_addr: zynq_bsp::xadc::XADC_BASE_ADDR,
}];

#[inline]
pub fn i3c_config(device_id: u16) -> Option<&'static I3cConfig> {
    lookup(&I3C_CONFIG_TABLE, device_id)
}

#[inline]
pub fn gic_config(device_id: u16) -> Option<&'static GicConfig> {
    lookup(&GIC_CONFIG_TABLE, device_id)
}

#[inline]
pub fn can_config(device_id: u16) -> Option<&'static CanConfig> {
    lookup(&CAN_CONFIG_TABLE, device_id)
}

#[inline]
pub fn swdt_config(device_id: u16) -> Option<&'static SwdtConfig> {
    lookup(&SWDT_CONFIG_TABLE, device_id)
}

#[inline]
pub fn xadc_config(device_id: u16) -> Option<&'static XadcConfig> {
    lookup(&XADC_CONFIG_TABLE, device_id)
}
