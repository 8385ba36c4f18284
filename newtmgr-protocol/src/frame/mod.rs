pub mod header;

pub use header::{HEADER_LEN, Header, MAX_PAYLOAD_LEN};

use crate::error::{NmgrError, Result};
use crate::group::Group;
use crate::op::Op;
use crate::sequence::SequenceNumber;

/// One request or response frame: header fields plus owned payload.
///
/// The length field is not stored; it is derived from `payload` on encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub op: Op,
    pub flags: u8,
    pub group: Group,
    pub sequence: SequenceNumber,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Build a request envelope. The sequence number is assigned at send time.
    pub fn request(op: Op, group: Group, id: u8, payload: Vec<u8>) -> Self {
        Self {
            op,
            flags: 0,
            group,
            sequence: SequenceNumber::new(0),
            id,
            payload,
        }
    }

    /// Build the response envelope a device would send back for this request.
    pub fn response_to(&self, payload: Vec<u8>) -> Self {
        Self {
            op: self.op.response(),
            flags: self.flags,
            group: self.group,
            sequence: self.sequence,
            id: self.id,
            payload,
        }
    }

    pub fn header(&self) -> Result<Header> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(NmgrError::PayloadTooLarge(self.payload.len()));
        }
        Ok(Header {
            op: self.op,
            flags: self.flags,
            len: self.payload.len() as u16,
            group: self.group,
            sequence: self.sequence,
            id: self.id,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(
            self.op,
            self.flags,
            self.group,
            self.id,
            self.sequence,
            &self.payload,
        )
    }
}

/// Write a frame.
pub fn encode(
    op: Op,
    flags: u8,
    group: Group,
    id: u8,
    sequence: SequenceNumber,
    payload: &[u8],
) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(NmgrError::PayloadTooLarge(payload.len()));
    }
    let header = Header {
        op,
        flags,
        len: payload.len() as u16,
        group,
        sequence,
        id,
    };

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(payload);
    debug_assert_eq!(frame.len(), header.frame_len());
    Ok(frame)
}

/// Parse one frame from the beginning of a buffer.
///
/// Returns `(envelope, bytes_consumed)`; anything after the frame is left for
/// the caller. A declared length longer than the buffer is `TruncatedFrame`.
pub fn decode(data: &[u8]) -> Result<(Envelope, usize)> {
    let header = Header::parse(data)?;
    let total_len = header.frame_len();

    if data.len() < total_len {
        return Err(NmgrError::TruncatedFrame {
            expected: total_len,
            actual: data.len(),
        });
    }

    let envelope = Envelope {
        op: header.op,
        flags: header.flags,
        group: header.group,
        sequence: header.sequence,
        id: header.id,
        payload: data[HEADER_LEN..total_len].to_vec(),
    };
    Ok((envelope, total_len))
}
