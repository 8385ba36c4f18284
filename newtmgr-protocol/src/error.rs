#[derive(Debug, thiserror::Error)]
pub enum NmgrError {
    #[error("frame too short: expected {expected}, actual {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("truncated frame: header declares {expected} bytes, {actual} available")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("invalid op: {0}")]
    InvalidOp(u8),

    #[error("payload too large: {0} bytes (max 65535)")]
    PayloadTooLarge(usize),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, NmgrError>;
