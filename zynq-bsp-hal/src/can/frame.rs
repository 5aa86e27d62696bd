//! CAN frame model and its mapping to the message buffer words.
use arbitrary_int::{u4, u11, u18};
use zynq_bsp::can::{DataLength, Identifier};

/// Maximum payload length of a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// 11-bit standard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StandardId(u16);

impl StandardId {
    pub const MAX: u16 = 0x7FF;

    pub const fn new(raw: u16) -> Option<Self> {
        if raw > Self::MAX {
            return None;
        }
        Some(Self(raw))
    }

    #[inline]
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

/// 29-bit extended identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExtendedId(u32);

impl ExtendedId {
    pub const MAX: u32 = 0x1FFF_FFFF;

    pub const fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX {
            return None;
        }
        Some(Self(raw))
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id {
    Standard(StandardId),
    Extended(ExtendedId),
}

impl From<StandardId> for Id {
    fn from(value: StandardId) -> Self {
        Id::Standard(value)
    }
}

impl From<ExtendedId> for Id {
    fn from(value: ExtendedId) -> Self {
        Id::Extended(value)
    }
}

impl Id {
    /// Identifier register word for this ID.
    pub fn identifier(&self, rtr: bool) -> Identifier {
        match self {
            Id::Standard(id) => Identifier::new_with_raw_value(0)
                .with_id_high(u11::new(id.raw()))
                .with_srr_rtr(rtr),
            // The substitute remote request bit is always recessive for extended frames.
            Id::Extended(id) => Identifier::new_with_raw_value(0)
                .with_id_high(u11::new((id.raw() >> 18) as u16))
                .with_srr_rtr(true)
                .with_ide(true)
                .with_id_low(u18::new(id.raw() & 0x3FFFF))
                .with_rtr(rtr),
        }
    }

    /// Decode an identifier register word. Returns the ID and the RTR flag.
    pub fn from_identifier(word: Identifier) -> (Self, bool) {
        if word.ide() {
            let raw = ((word.id_high().value() as u32) << 18) | word.id_low().value();
            (Id::Extended(ExtendedId(raw)), word.rtr())
        } else {
            (
                Id::Standard(StandardId(word.id_high().value())),
                word.srr_rtr(),
            )
        }
    }
}

/// Classic CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    id: Id,
    rtr: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
    timestamp: u16,
}

impl Frame {
    /// Data frame. Returns [None] if the payload exceeds eight bytes.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        let mut buf = [0; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            rtr: false,
            dlc: data.len() as u8,
            data: buf,
            timestamp: 0,
        })
    }

    /// Remote frame requesting `dlc` bytes.
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }
        Some(Self {
            id: id.into(),
            rtr: true,
            dlc: dlc as u8,
            data: [0; MAX_DATA_LEN],
            timestamp: 0,
        })
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    #[inline]
    pub fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    #[inline]
    pub fn dlc(&self) -> usize {
        self.dlc as usize
    }

    /// Payload of the frame. Empty for remote frames.
    #[inline]
    pub fn data(&self) -> &[u8] {
        if self.rtr {
            return &[];
        }
        &self.data[..self.dlc as usize]
    }

    /// Receive timestamp. Zero for frames which were not received.
    #[inline]
    pub fn timestamp(&self) -> u16 {
        self.timestamp
    }

    /// Message buffer words: identifier, data length code and the two data words.
    pub fn to_words(&self) -> (Identifier, DataLength, u32, u32) {
        (
            self.id.identifier(self.rtr),
            DataLength::new_with_raw_value(0).with_dlc(u4::new(self.dlc)),
            u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]),
            u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]),
        )
    }

    /// Build a frame from received message buffer words. Data length codes above eight are
    /// clamped to eight.
    pub fn from_words(id: Identifier, dlc: DataLength, data_1: u32, data_2: u32) -> Self {
        let (id, rtr) = Id::from_identifier(id);
        let mut data = [0; MAX_DATA_LEN];
        data[..4].copy_from_slice(&data_1.to_be_bytes());
        data[4..].copy_from_slice(&data_2.to_be_bytes());
        Self {
            id,
            rtr,
            dlc: core::cmp::min(dlc.dlc().value(), MAX_DATA_LEN as u8),
            data,
            timestamp: dlc.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ranges() {
        assert!(StandardId::new(0x7FF).is_some());
        assert!(StandardId::new(0x800).is_none());
        assert!(ExtendedId::new(0x1FFF_FFFF).is_some());
        assert!(ExtendedId::new(0x2000_0000).is_none());
    }

    #[test]
    fn test_standard_frame_words() {
        let frame = Frame::new(StandardId::new(0x123).unwrap(), &[1, 2, 3, 4, 5]).unwrap();
        let (id, dlc, d1, d2) = frame.to_words();
        assert_eq!(id.raw_value(), 0x123 << 21);
        assert_eq!(dlc.raw_value(), 5 << 28);
        assert_eq!(d1, 0x0102_0304);
        assert_eq!(d2, 0x0500_0000);
    }

    #[test]
    fn test_extended_frame_words() {
        let ext = ExtendedId::new(0x1ABC_DEF1).unwrap();
        let frame = Frame::new_remote(ext, 2).unwrap();
        let (id, _, _, _) = frame.to_words();
        let expected = ((0x1ABC_DEF1u32 >> 18) << 21)
            | (1 << 20)
            | (1 << 19)
            | ((0x1ABC_DEF1 & 0x3FFFF) << 1)
            | 1;
        assert_eq!(id.raw_value(), expected);
        assert_eq!(Id::from_identifier(id), (Id::Extended(ext), true));
    }

    #[test]
    fn test_received_frame() {
        let id = Id::Standard(StandardId::new(0x55).unwrap()).identifier(false);
        let frame = Frame::from_words(
            id,
            DataLength::new_with_raw_value((3 << 28) | 0x1234),
            0xAABB_CCDD,
            0,
        );
        assert_eq!(frame.data(), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(frame.timestamp(), 0x1234);
        assert!(!frame.is_remote_frame());

        // DLC values above 8 still mean eight bytes.
        let frame = Frame::from_words(id, DataLength::new_with_raw_value(0xF << 28), 0, 0);
        assert_eq!(frame.dlc(), 8);
    }

    #[test]
    fn test_invalid_lengths() {
        let id = StandardId::new(1).unwrap();
        assert!(Frame::new(id, &[0; 9]).is_none());
        assert!(Frame::new_remote(id, 9).is_none());
        assert!(Frame::new_remote(id, 4).unwrap().data().is_empty());
    }
}
