use crate::error::{NmgrError, Result};
use crate::group::Group;
use crate::op::Op;
use crate::sequence::SequenceNumber;

/// Fixed header size: 1 (op) + 1 (flags) + 2 (len) + 2 (group) + 1 (seq) + 1 (id) = 8
pub const HEADER_LEN: usize = 8;

/// Largest payload the 16-bit length field can declare.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Decoded frame header. Multi-byte fields are big-endian on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub op: Op,
    pub flags: u8,
    pub len: u16,
    pub group: Group,
    pub sequence: SequenceNumber,
    pub id: u8,
}

impl Header {
    /// Parse the header from the start of `data`. Bytes past the header are ignored.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(NmgrError::FrameTooShort {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        Ok(Self {
            op: Op::from_byte(data[0])?,
            flags: data[1],
            len: u16::from_be_bytes([data[2], data[3]]),
            group: Group::from_be_bytes([data[4], data[5]]),
            sequence: SequenceNumber::new(data[6]),
            id: data[7],
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let len = self.len.to_be_bytes();
        let group = self.group.to_be_bytes();
        [
            self.op.to_byte(),
            self.flags,
            len[0],
            len[1],
            group[0],
            group[1],
            self.sequence.value(),
            self.id,
        ]
    }

    /// Total wire size of the frame this header introduces.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.len as usize
    }
}
