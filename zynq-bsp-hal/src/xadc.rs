//! # PS-XADC system monitor driver
//!
//! The processing system talks to the XADC through a command FIFO and a data FIFO. Every command
//! written to the command FIFO shifts one word into the data FIFO, and the result of a read
//! command only arrives with the next command. Register reads therefore send a no-op command
//! after the read command.
use arbitrary_int::{u4, u5, u10};
use zynq_bsp::xadc::{
    Config, DrpCommand, DrpConfig1, DrpOpcode, Interrupts, MiscControl, MmioXAdc, drp,
};

/// Number of polling iterations after which a blocking call gives up.
pub const DEFAULT_POLL_LIMIT: u32 = 10_000;
/// Idle gap between commands in PCAP clock cycles.
const DEFAULT_IDLE_GAP: u8 = 20;

const TEMPERATURE_SCALE: f32 = 503.975;
const TEMPERATURE_OFFSET: f32 = 273.15;
/// Full scale of the supply sensors in volts.
const SUPPLY_FULL_SCALE: f32 = 3.0;
const ADC_FULL_SCALE: f32 = 65536.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum XadcError {
    #[error("timeout waiting for the data FIFO")]
    Timeout,
    #[error("invalid sequencer mode {0:#x}")]
    InvalidSequencerMode(u8),
}

/// Conversion result channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    VccInt,
    VccAux,
    /// Dedicated analog input.
    VpVn,
    VrefP,
    VrefN,
    VccBram,
    VccPint,
    VccPaux,
    VccoDdr,
    /// Auxiliary analog input 0 to 15.
    Aux(u4),
}

impl Channel {
    /// DRP address of the conversion result.
    pub const fn drp_addr(&self) -> u16 {
        match self {
            Channel::Temperature => drp::TEMPERATURE,
            Channel::VccInt => drp::VCCINT,
            Channel::VccAux => drp::VCCAUX,
            Channel::VpVn => drp::VP_VN,
            Channel::VrefP => drp::VREFP,
            Channel::VrefN => drp::VREFN,
            Channel::VccBram => drp::VCCBRAM,
            Channel::VccPint => drp::VCCPINT,
            Channel::VccPaux => drp::VCCPAUX,
            Channel::VccoDdr => drp::VCCO_DDR,
            Channel::Aux(idx) => drp::AUX_00 + idx.value() as u16,
        }
    }
}

/// Supply voltages measured by the on-chip sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supply {
    VccInt,
    VccAux,
    VccBram,
    VccPint,
    VccPaux,
    VccoDdr,
}

impl From<Supply> for Channel {
    fn from(value: Supply) -> Self {
        match value {
            Supply::VccInt => Channel::VccInt,
            Supply::VccAux => Channel::VccAux,
            Supply::VccBram => Channel::VccBram,
            Supply::VccPint => Channel::VccPint,
            Supply::VccPaux => Channel::VccPaux,
            Supply::VccoDdr => Channel::VccoDdr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum SequencerMode {
    /// Default mode, the sequencer monitors the on-chip sensors only.
    Safe = 0,
    OnePass = 1,
    Continuous = 2,
    SingleChannel = 3,
    Simultaneous = 4,
    Independent = 8,
}

/// Alarm threshold registers, offset from [drp::ALARM_THRESHOLD_BASE].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlarmThreshold {
    TemperatureUpper = 0x0,
    VccIntUpper = 0x1,
    VccAuxUpper = 0x2,
    OverTemperatureSet = 0x3,
    TemperatureLower = 0x4,
    VccIntLower = 0x5,
    VccAuxLower = 0x6,
    OverTemperatureReset = 0x7,
    VccBramUpper = 0x8,
    VccPintUpper = 0x9,
    VccPauxUpper = 0xA,
    VccoDdrUpper = 0xB,
    VccBramLower = 0xC,
    VccPintLower = 0xD,
    VccPauxLower = 0xE,
    VccoDdrLower = 0xF,
}

impl AlarmThreshold {
    #[inline]
    pub const fn drp_addr(&self) -> u16 {
        drp::ALARM_THRESHOLD_BASE + *self as u16
    }
}

/// Alarm outputs of the XADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmStatus {
    pub over_temperature: bool,
    /// Alarm 0 to 6, one bit each.
    pub alarms: u8,
}

/// Convert a raw temperature sensor code to degrees Celsius.
#[inline]
pub fn raw_to_temperature(raw: u16) -> f32 {
    (raw as f32 * TEMPERATURE_SCALE / ADC_FULL_SCALE) - TEMPERATURE_OFFSET
}

/// Convert a temperature in degrees Celsius to the raw sensor code, for example to program
/// alarm thresholds.
#[inline]
pub fn temperature_to_raw(celsius: f32) -> u16 {
    let raw = (celsius + TEMPERATURE_OFFSET) * ADC_FULL_SCALE / TEMPERATURE_SCALE;
    raw.clamp(0.0, u16::MAX as f32) as u16
}

/// Convert a raw supply sensor code to volts.
#[inline]
pub fn raw_to_voltage(raw: u16) -> f32 {
    raw as f32 * SUPPLY_FULL_SCALE / ADC_FULL_SCALE
}

#[inline]
pub fn voltage_to_raw(volts: f32) -> u16 {
    let raw = volts * ADC_FULL_SCALE / SUPPLY_FULL_SCALE;
    raw.clamp(0.0, u16::MAX as f32) as u16
}

pub struct Xadc {
    regs: MmioXAdc<'static>,
    poll_limit: u32,
}

impl Xadc {
    /// Enable the PS-XADC interface and reset the FIFOs.
    pub fn new(regs: MmioXAdc<'static>) -> Self {
        let mut xadc = Self {
            regs,
            poll_limit: DEFAULT_POLL_LIMIT,
        };
        xadc.regs.write_config(
            Config::new_with_raw_value(0)
                .with_enable(true)
                .with_write_edge(true)
                .with_read_edge(true)
                .with_idle_gap(u5::new(DEFAULT_IDLE_GAP)),
        );
        xadc.reset();
        xadc
    }

    #[inline]
    pub fn regs(&mut self) -> &mut MmioXAdc<'static> {
        &mut self.regs
    }

    #[inline]
    pub fn set_poll_limit(&mut self, limit: u32) {
        self.poll_limit = limit;
    }

    /// Reset the communication channel to the XADC, which flushes both FIFOs.
    pub fn reset(&mut self) {
        self.regs
            .write_misc_control(MiscControl::new_with_raw_value(0).with_reset(true));
        self.regs.write_misc_control(MiscControl::new_with_raw_value(0));
    }

    /// Send one command and return the data word it shifted out of the XADC.
    fn transfer(&mut self, opcode: DrpOpcode, addr: u16, data: u16) -> Result<u16, XadcError> {
        self.regs.write_command_fifo(
            DrpCommand::new_with_raw_value(0)
                .with_opcode(opcode.raw())
                .with_addr(u10::new(addr & 0x3FF))
                .with_data(data),
        );
        for _ in 0..self.poll_limit {
            if !self.regs.read_misc_status().data_fifo_empty() {
                return Ok(self.regs.read_data_fifo().data());
            }
        }
        Err(XadcError::Timeout)
    }

    /// Read a DRP register.
    pub fn read_drp(&mut self, addr: u16) -> Result<u16, XadcError> {
        self.transfer(DrpOpcode::Read, addr, 0)?;
        self.transfer(DrpOpcode::NoOp, 0, 0)
    }

    /// Write a DRP register.
    pub fn write_drp(&mut self, addr: u16, data: u16) -> Result<(), XadcError> {
        self.transfer(DrpOpcode::Write, addr, data)?;
        Ok(())
    }

    /// Latest raw conversion result of a channel. The 12-bit result is MSB aligned.
    #[inline]
    pub fn adc_data(&mut self, channel: Channel) -> Result<u16, XadcError> {
        self.read_drp(channel.drp_addr())
    }

    /// On-chip temperature in degrees Celsius.
    pub fn temperature_celsius(&mut self) -> Result<f32, XadcError> {
        Ok(raw_to_temperature(self.adc_data(Channel::Temperature)?))
    }

    /// Supply voltage in volts.
    pub fn supply_voltage(&mut self, supply: Supply) -> Result<f32, XadcError> {
        Ok(raw_to_voltage(self.adc_data(supply.into())?))
    }

    pub fn sequencer_mode(&mut self) -> Result<SequencerMode, XadcError> {
        let cfg = DrpConfig1::new_with_raw_value(self.read_drp(drp::CONFIG_1)?);
        let raw = cfg.sequencer_mode().value();
        SequencerMode::try_from(raw).map_err(|_| XadcError::InvalidSequencerMode(raw))
    }

    pub fn set_sequencer_mode(&mut self, mode: SequencerMode) -> Result<(), XadcError> {
        let cfg = DrpConfig1::new_with_raw_value(self.read_drp(drp::CONFIG_1)?)
            .with_sequencer_mode(u4::new(mode as u8));
        self.write_drp(drp::CONFIG_1, cfg.raw_value())
    }

    #[inline]
    pub fn set_alarm_threshold(
        &mut self,
        threshold: AlarmThreshold,
        raw: u16,
    ) -> Result<(), XadcError> {
        self.write_drp(threshold.drp_addr(), raw)
    }

    #[inline]
    pub fn alarm_threshold(&mut self, threshold: AlarmThreshold) -> Result<u16, XadcError> {
        self.read_drp(threshold.drp_addr())
    }

    /// Current state of the alarm outputs.
    pub fn alarm_status(&self) -> AlarmStatus {
        let status = self.regs.read_misc_status();
        AlarmStatus {
            over_temperature: status.over_temperature(),
            alarms: status.alarms().value(),
        }
    }

    /// Unmask the given interrupts.
    pub fn enable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs.modify_interrupt_mask(|mask| {
            Interrupts::new_with_raw_value(mask.raw_value() & !interrupts.raw_value())
        });
    }

    /// Mask the given interrupts.
    pub fn disable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs.modify_interrupt_mask(|mask| {
            Interrupts::new_with_raw_value(mask.raw_value() | interrupts.raw_value())
        });
    }

    #[inline]
    pub fn interrupt_status(&self) -> Interrupts {
        self.regs.read_interrupt_status()
    }

    #[inline]
    pub fn clear_interrupts(&mut self, interrupts: Interrupts) {
        self.regs.write_interrupt_status(interrupts);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use approx::abs_diff_eq;
    use std::boxed::Box;

    const CONFIG: usize = 0;
    const INT_MASK: usize = 2;
    const MISC_STATUS: usize = 3;
    const CMD_FIFO: usize = 4;
    const DATA_FIFO: usize = 5;
    const MISC_CONTROL: usize = 6;

    #[repr(C, align(8))]
    struct RegMem([u32; 7]);

    fn ram_backed_xadc() -> (Xadc, *mut RegMem) {
        let mem = Box::leak(Box::new(RegMem([0; 7])));
        let ptr = mem as *mut RegMem;
        let regs = unsafe { zynq_bsp::xadc::XAdc::new_mmio(ptr as *mut zynq_bsp::xadc::XAdc) };
        let mut xadc = Xadc::new(regs);
        xadc.set_poll_limit(10);
        (xadc, ptr)
    }

    fn reg(mem: *mut RegMem, idx: usize) -> u32 {
        unsafe { (*mem).0[idx] }
    }

    fn set_reg(mem: *mut RegMem, idx: usize, val: u32) {
        unsafe { (*mem).0[idx] = val }
    }

    #[test]
    fn test_conversions() {
        // 0x9A50 is roughly 30.6 degrees.
        assert!(abs_diff_eq!(
            raw_to_temperature(0x9A50),
            30.64,
            epsilon = 0.01
        ));
        assert!(abs_diff_eq!(raw_to_temperature(0), -273.15, epsilon = 0.01));
        assert!(abs_diff_eq!(raw_to_voltage(0x5555), 1.0, epsilon = 0.001));
        assert!(abs_diff_eq!(
            raw_to_temperature(temperature_to_raw(85.0)),
            85.0,
            epsilon = 0.01
        ));
        assert_eq!(voltage_to_raw(1.5), 0x8000);
        assert_eq!(voltage_to_raw(4.0), u16::MAX);
        assert_eq!(temperature_to_raw(-300.0), 0);
    }

    #[test]
    fn test_channel_addresses() {
        assert_eq!(Channel::VccPint.drp_addr(), 0x0D);
        assert_eq!(Channel::Aux(u4::new(15)).drp_addr(), 0x1F);
        assert_eq!(Channel::from(Supply::VccoDdr).drp_addr(), 0x0F);
        assert_eq!(AlarmThreshold::TemperatureUpper.drp_addr(), 0x50);
        assert_eq!(AlarmThreshold::VccoDdrLower.drp_addr(), 0x5F);
    }

    #[test]
    fn test_init() {
        let (_xadc, mem) = ram_backed_xadc();
        assert_eq!(reg(mem, CONFIG), (1 << 31) | (1 << 13) | (1 << 12) | 20);
        assert_eq!(reg(mem, MISC_CONTROL), 0);
    }

    #[test]
    fn test_read_drp() {
        let (mut xadc, mem) = ram_backed_xadc();
        set_reg(mem, DATA_FIFO, 0x9A50);
        assert!(abs_diff_eq!(
            xadc.temperature_celsius().unwrap(),
            30.64,
            epsilon = 0.01
        ));
        // The no-op command is written last.
        assert_eq!(reg(mem, CMD_FIFO), 0);

        set_reg(mem, DATA_FIFO, 0x5555);
        assert!(abs_diff_eq!(
            xadc.supply_voltage(Supply::VccInt).unwrap(),
            1.0,
            epsilon = 0.001
        ));

        set_reg(mem, MISC_STATUS, 1 << 8);
        assert_eq!(xadc.adc_data(Channel::VpVn), Err(XadcError::Timeout));
    }

    #[test]
    fn test_write_drp() {
        let (mut xadc, mem) = ram_backed_xadc();
        xadc.set_alarm_threshold(AlarmThreshold::VccIntUpper, 0x5999)
            .unwrap();
        let cmd = DrpCommand::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.opcode().value(), DrpOpcode::Write as u8);
        assert_eq!(cmd.addr().value(), 0x51);
        assert_eq!(cmd.data(), 0x5999);
    }

    #[test]
    fn test_sequencer_mode() {
        let (mut xadc, mem) = ram_backed_xadc();
        set_reg(mem, DATA_FIFO, 0x0F0F);
        xadc.set_sequencer_mode(SequencerMode::Continuous).unwrap();
        let cmd = DrpCommand::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.addr().value(), drp::CONFIG_1);
        assert_eq!(cmd.data(), 0x2F0F);

        set_reg(mem, DATA_FIFO, 0x8000);
        assert_eq!(xadc.sequencer_mode(), Ok(SequencerMode::Independent));
        set_reg(mem, DATA_FIFO, 0x5000);
        assert_eq!(
            xadc.sequencer_mode(),
            Err(XadcError::InvalidSequencerMode(5))
        );
    }

    #[test]
    fn test_alarms_and_interrupts() {
        let (mut xadc, mem) = ram_backed_xadc();
        set_reg(mem, MISC_STATUS, (1 << 7) | 0b101);
        assert_eq!(
            xadc.alarm_status(),
            AlarmStatus {
                over_temperature: true,
                alarms: 0b101
            }
        );
        set_reg(mem, INT_MASK, 0x3FF);
        xadc.enable_interrupts(Interrupts::new_with_raw_value(0).with_over_temperature(true));
        assert_eq!(reg(mem, INT_MASK), 0x37F);
        xadc.disable_interrupts(Interrupts::new_with_raw_value(0x80));
        assert_eq!(reg(mem, INT_MASK), 0x3FF);
    }
}
