//! # Register access layer for Zynq7000 board support
//!
//! This crate describes the register blocks of the processing system peripherals used by the
//! board support drivers, and of the AXI I3C controller which lives inside the programmable
//! logic. Register blocks are described with [derive_mmio] and their fields with [bitbybit].
//!
//! The high-level drivers are part of the `zynq-bsp-hal` crate.
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

use core::sync::atomic::{AtomicBool, Ordering};

pub mod can;
pub mod gic;
pub mod i3c;
pub mod swdt;
pub mod xadc;

static PERIPHERALS_TAKEN: AtomicBool = AtomicBool::new(false);

/// Processing system peripherals with a fixed base address.
///
/// The AXI I3C controller is not part of this structure because its base address depends on the
/// hardware design. Use [i3c::I3c::new_mmio_at] with the address from the configuration table.
pub struct Peripherals {
    pub gicc: gic::MmioGicCpuInterface<'static>,
    pub gicd: gic::MmioGicDistributor<'static>,
    pub can_0: can::MmioCan<'static>,
    pub can_1: can::MmioCan<'static>,
    pub swdt: swdt::MmioSwdt<'static>,
    pub xadc: xadc::MmioXAdc<'static>,
}

impl Peripherals {
    /// Returns all peripherals exactly once.
    pub fn take() -> Option<Self> {
        if PERIPHERALS_TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(unsafe { Self::steal() })
    }

    /// Unchecked version of [Self::take].
    ///
    /// # Safety
    ///
    /// Each of the returned peripherals must be used at most once.
    pub unsafe fn steal() -> Self {
        unsafe {
            Self {
                gicc: gic::GicCpuInterface::new_mmio_fixed(),
                gicd: gic::GicDistributor::new_mmio_fixed(),
                can_0: can::Can::new_mmio_fixed_0(),
                can_1: can::Can::new_mmio_fixed_1(),
                swdt: swdt::Swdt::new_mmio_fixed(),
                xadc: xadc::XAdc::new_mmio_fixed(),
            }
        }
    }
}
