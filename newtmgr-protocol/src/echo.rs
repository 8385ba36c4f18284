use crate::error::{NmgrError, Result};
use crate::group::{Group, default_id};
use crate::message::Message;
use crate::op::Op;

/// Echo request: the device sends `message` straight back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Echo {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoResponse {
    pub message: String,
}

impl Echo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl EchoResponse {
    /// Payload bytes as the device would send them.
    pub fn encode(&self) -> Vec<u8> {
        self.message.as_bytes().to_vec()
    }
}

impl Message for Echo {
    const OP: Op = Op::Write;
    const GROUP: Group = Group::DEFAULT;
    const ID: u8 = default_id::ECHO;

    type Response = EchoResponse;

    fn encode_request(&self) -> Vec<u8> {
        self.message.as_bytes().to_vec()
    }

    fn decode_response(payload: &[u8]) -> Result<EchoResponse> {
        let message = std::str::from_utf8(payload)
            .map_err(|e| NmgrError::InvalidPayload(format!("echo is not valid UTF-8: {e}")))?;
        Ok(EchoResponse {
            message: message.to_owned(),
        })
    }
}
