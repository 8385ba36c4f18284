use crate::error::{NmgrError, Result};

/// Operation kind carried in the first header byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    ReadRsp,
    Write,
    WriteRsp,
}

impl Op {
    /// Parse from the header op byte.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Read),
            1 => Ok(Self::ReadRsp),
            2 => Ok(Self::Write),
            3 => Ok(Self::WriteRsp),
            _ => Err(NmgrError::InvalidOp(b)),
        }
    }

    /// Serialize to the header op byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::ReadRsp => 1,
            Self::Write => 2,
            Self::WriteRsp => 3,
        }
    }

    pub fn is_response(self) -> bool {
        matches!(self, Self::ReadRsp | Self::WriteRsp)
    }

    /// The op a device answers this request op with.
    ///
    /// Response ops map to themselves.
    pub fn response(self) -> Self {
        match self {
            Self::Read | Self::ReadRsp => Self::ReadRsp,
            Self::Write | Self::WriteRsp => Self::WriteRsp,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ReadRsp => "read-rsp",
            Self::Write => "write",
            Self::WriteRsp => "write-rsp",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
