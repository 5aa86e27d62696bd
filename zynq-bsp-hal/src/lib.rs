//! # Peripheral drivers for Zynq7000 board support
//!
//! High-level drivers on top of the [register access crate](zynq_bsp):
//!
//! - [gic]: SCUGIC interrupt controller with a handler table.
//! - [i3c]: AXI I3C controller with dynamic address assignment, common command codes, in-band
//!   interrupts and an interrupt driven async API.
//! - [can]: PS CAN controller.
//! - [swdt]: System watchdog.
//! - [xadc]: PS-XADC system monitor.
//!
//! Every driver is created from a register block and an entry of the static [config] tables.
//! The [embedded-hal](https://github.com/rust-embedded/embedded-hal) I2C trait is implemented for
//! legacy I2C transfers over the I3C controller.
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

pub use zynq_bsp as pac;

pub mod can;
pub mod config;
pub mod gic;
pub mod i3c;
pub mod log;
pub mod swdt;
pub mod time;
pub mod xadc;
