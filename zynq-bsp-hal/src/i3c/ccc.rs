//! Common Command Codes (CCC).
//!
//! Broadcast CCCs are written to the broadcast address `0x7E` with the command code as the first
//! payload byte. Direct CCCs send the command code as a broadcast followed by a repeated start
//! and a private transfer to the target.
use zynq_bsp::i3c::{BROADCAST_ADDRESS, CommandType};

use super::{I3c, I3cError, TargetInfo, Transfer};

pub const ENEC: u8 = 0x00;
pub const DISEC: u8 = 0x01;
pub const RSTDAA: u8 = 0x06;
pub const ENTDAA: u8 = 0x07;
pub const SETMWL: u8 = 0x09;
pub const SETMRL: u8 = 0x0A;

pub const ENEC_DIRECT: u8 = 0x80;
pub const DISEC_DIRECT: u8 = 0x81;
pub const SETMWL_DIRECT: u8 = 0x89;
pub const SETMRL_DIRECT: u8 = 0x8A;
pub const GETMWL: u8 = 0x8B;
pub const GETMRL: u8 = 0x8C;
pub const GETPID: u8 = 0x8D;
pub const GETBCR: u8 = 0x8E;
pub const GETDCR: u8 = 0x8F;
pub const GETSTATUS: u8 = 0x90;

/// Direct CCC codes have the most significant bit set.
#[inline]
pub const fn is_direct(ccc: u8) -> bool {
    ccc & 0x80 != 0
}

/// Target event mask used by ENEC and DISEC.
#[bitbybit::bitfield(u8, default = 0x0, debug)]
pub struct Events {
    #[bit(3, rw)]
    hot_join: bool,
    /// Controller role request.
    #[bit(1, rw)]
    controller_role: bool,
    /// In-band interrupt.
    #[bit(0, rw)]
    interrupt: bool,
}

impl Events {
    pub const ALL: Self = Self::new_with_raw_value(0b1011);
}

impl I3c {
    pub(crate) fn send_ccc_broadcast_with_stop(
        &mut self,
        ccc: u8,
        payload: &[u8],
        stop: bool,
    ) -> Result<(), I3cError> {
        self.write_transfer(
            Transfer {
                cmd_type: CommandType::I3cSdr,
                target_addr: BROADCAST_ADDRESS,
                len: payload.len() + 1,
                read: false,
                stop,
            },
            core::iter::once(ccc).chain(payload.iter().copied()),
        )
    }

    /// Send a broadcast CCC with an optional payload.
    pub fn send_ccc_broadcast(&mut self, ccc: u8, payload: &[u8]) -> Result<(), I3cError> {
        self.send_ccc_broadcast_with_stop(ccc, payload, true)
    }

    /// Send a direct CCC which writes the payload to the target.
    pub fn send_ccc_direct_set(
        &mut self,
        ccc: u8,
        target: u8,
        payload: &[u8],
    ) -> Result<(), I3cError> {
        self.send_ccc_broadcast_with_stop(ccc, &[], false)?;
        self.write_blocking(target, payload, true)
    }

    /// Send a direct CCC which reads data from the target. Returns the number of received bytes.
    pub fn send_ccc_direct_get(
        &mut self,
        ccc: u8,
        target: u8,
        buf: &mut [u8],
    ) -> Result<usize, I3cError> {
        self.send_ccc_broadcast_with_stop(ccc, &[], false)?;
        self.read_blocking(target, buf, true)
    }

    /// Reset all dynamic addresses on the bus with RSTDAA and disable all target events.
    pub fn bus_init(&mut self) -> Result<(), I3cError> {
        self.reset_dynamic_addresses()?;
        self.disable_events(Events::ALL)
    }

    /// Broadcast RSTDAA and forget all assigned targets.
    pub fn reset_dynamic_addresses(&mut self) -> Result<(), I3cError> {
        self.send_ccc_broadcast(RSTDAA, &[])?;
        self.targets.clear();
        Ok(())
    }

    #[inline]
    pub fn enable_events(&mut self, events: Events) -> Result<(), I3cError> {
        self.send_ccc_broadcast(ENEC, &[events.raw_value()])
    }

    #[inline]
    pub fn disable_events(&mut self, events: Events) -> Result<(), I3cError> {
        self.send_ccc_broadcast(DISEC, &[events.raw_value()])
    }

    #[inline]
    pub fn enable_target_events(&mut self, target: u8, events: Events) -> Result<(), I3cError> {
        self.send_ccc_direct_set(ENEC_DIRECT, target, &[events.raw_value()])
    }

    #[inline]
    pub fn disable_target_events(&mut self, target: u8, events: Events) -> Result<(), I3cError> {
        self.send_ccc_direct_set(DISEC_DIRECT, target, &[events.raw_value()])
    }

    /// Read the 48-bit provisioned ID of a target.
    pub fn get_pid(&mut self, target: u8) -> Result<u64, I3cError> {
        let mut pid = [0; 6];
        self.send_ccc_direct_get(GETPID, target, &mut pid)?;
        let mut raw = [0; 8];
        raw[2..].copy_from_slice(&pid);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn get_bcr(&mut self, target: u8) -> Result<u8, I3cError> {
        let mut bcr = [0; 1];
        self.send_ccc_direct_get(GETBCR, target, &mut bcr)?;
        Ok(bcr[0])
    }

    pub fn get_dcr(&mut self, target: u8) -> Result<u8, I3cError> {
        let mut dcr = [0; 1];
        self.send_ccc_direct_get(GETDCR, target, &mut dcr)?;
        Ok(dcr[0])
    }

    /// Read the device status word of a target.
    pub fn get_status(&mut self, target: u8) -> Result<u16, I3cError> {
        let mut status = [0; 2];
        self.send_ccc_direct_get(GETSTATUS, target, &mut status)?;
        Ok(u16::from_be_bytes(status))
    }

    /// Set the maximum write length of a target.
    pub fn set_mwl(&mut self, target: u8, len: u16) -> Result<(), I3cError> {
        self.send_ccc_direct_set(SETMWL_DIRECT, target, &len.to_be_bytes())
    }

    /// Set the maximum read length of a target.
    pub fn set_mrl(&mut self, target: u8, len: u16) -> Result<(), I3cError> {
        self.send_ccc_direct_set(SETMRL_DIRECT, target, &len.to_be_bytes())
    }

    /// Set the maximum write length of all targets.
    pub fn set_mwl_all(&mut self, len: u16) -> Result<(), I3cError> {
        self.send_ccc_broadcast(SETMWL, &len.to_be_bytes())
    }

    /// Set the maximum read length of all targets.
    pub fn set_mrl_all(&mut self, len: u16) -> Result<(), I3cError> {
        self.send_ccc_broadcast(SETMRL, &len.to_be_bytes())
    }

    pub fn get_mwl(&mut self, target: u8) -> Result<u16, I3cError> {
        let mut mwl = [0; 2];
        self.send_ccc_direct_get(GETMWL, target, &mut mwl)?;
        Ok(u16::from_be_bytes(mwl))
    }

    pub fn get_mrl(&mut self, target: u8) -> Result<u16, I3cError> {
        let mut mrl = [0; 2];
        self.send_ccc_direct_get(GETMRL, target, &mut mrl)?;
        Ok(u16::from_be_bytes(mrl))
    }

    /// Look up the information gathered for a dynamic address.
    pub fn target(&self, dynamic_addr: u8) -> Option<&TargetInfo> {
        self.targets.iter().find(|t| t.dynamic_addr == dynamic_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i3c::tests::{
        CMD_FIFO, FIFO_LEVEL_1, RD_FIFO, WR_FIFO, ram_backed_i3c, reg, set_reg,
    };
    use zynq_bsp::i3c::Command;

    #[test]
    fn test_direct_flag() {
        assert!(is_direct(GETPID));
        assert!(is_direct(ENEC_DIRECT));
        assert!(!is_direct(ENTDAA));
        assert!(!is_direct(SETMWL));
    }

    #[test]
    fn test_events() {
        assert_eq!(Events::ALL.raw_value(), 0x0B);
        assert_eq!(
            Events::new_with_raw_value(0).with_hot_join(true).raw_value(),
            0x08
        );
    }

    #[test]
    fn test_broadcast() {
        let (mut i3c, mem) = ram_backed_i3c();
        i3c.send_ccc_broadcast(DISEC, &[0x0B]).unwrap();
        assert_eq!(reg(mem, WR_FIFO), 0x010B_0000);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.target_addr().value(), BROADCAST_ADDRESS);
        assert_eq!(cmd.byte_count().value(), 2);
        assert!(!cmd.read());
        assert!(cmd.no_repeated_start());
    }

    #[test]
    fn test_direct_set() {
        let (mut i3c, mem) = ram_backed_i3c();
        i3c.set_mwl(0x09, 0x0100).unwrap();
        // Last word written is the payload of the private transfer.
        assert_eq!(reg(mem, WR_FIFO), 0x0100_0000);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.target_addr().value(), 0x09);
        assert_eq!(cmd.byte_count().value(), 2);
        assert!(cmd.no_repeated_start());
    }

    #[test]
    fn test_direct_get() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        set_reg(mem, RD_FIFO, 0xC600_0000);
        assert_eq!(i3c.get_bcr(0x0A).unwrap(), 0xC6);
        let cmd = Command::new_with_raw_value(reg(mem, CMD_FIFO));
        assert_eq!(cmd.target_addr().value(), 0x0A);
        assert!(cmd.read());
        assert_eq!(cmd.byte_count().value(), 1);

        set_reg(mem, RD_FIFO, 0x1122_3344);
        // Two words are drained per read on the RAM-backed block.
        assert_eq!(i3c.get_pid(0x0A).unwrap(), 0x1122_3344_1122);
    }

    #[test]
    fn test_bus_init_clears_targets() {
        let (mut i3c, mem) = ram_backed_i3c();
        set_reg(mem, FIFO_LEVEL_1, 1);
        i3c.dynamic_address_assignment(&[0x08]).unwrap();
        assert!(i3c.target(0x08).is_some());
        i3c.bus_init().unwrap();
        assert!(i3c.targets().is_empty());
        // DISEC for all events is the last broadcast.
        assert_eq!(reg(mem, WR_FIFO), 0x010B_0000);
    }
}
