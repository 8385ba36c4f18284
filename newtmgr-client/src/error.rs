use std::time::Duration;

use newtmgr_rs_protocol::{NmgrError, SequenceNumber};

/// Errors that can occur during newtmgr client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport could not be opened.
    #[error("cannot connect to {endpoint}: {reason}")]
    Connect {
        /// Connection string of the endpoint.
        endpoint: String,
        /// Why the open failed.
        reason: String,
    },

    /// Writing a request to the channel failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading from the channel failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The peer closed the channel (read returned 0 bytes).
    #[error("disconnected")]
    Disconnected,

    /// No matching response arrived before the deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The channel ended in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Frame length declared by the header.
        expected: usize,
        /// Bytes received before the channel ended.
        actual: usize,
    },

    /// Received bytes do not parse as a frame header; stream alignment is lost.
    #[error("protocol desync: {0}")]
    ProtocolDesync(#[source] NmgrError),

    /// A sequence number was registered while still outstanding.
    #[error("sequence number {0} reused while outstanding")]
    SequenceReuse(SequenceNumber),

    /// Every sequence number is outstanding.
    #[error("no free sequence number")]
    SequenceExhausted,

    /// Profile field could not be parsed (e.g. unknown channel kind).
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// No connection profile with this name.
    #[error("connection profile not found: {0}")]
    ProfileNotFound(String),

    /// Request encoding or response payload decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] NmgrError),
}

/// Convenience alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;
