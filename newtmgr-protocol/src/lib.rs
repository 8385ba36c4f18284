//! Newtmgr management protocol: wire header, frame codec, and message types.
//!
//! This crate is I/O-free. It is shared by the async client and by anything
//! that needs to speak the device side of the protocol (tests, simulators).

pub mod echo;
pub mod error;
pub mod frame;
pub mod group;
pub mod message;
pub mod op;
pub mod sequence;

pub use echo::{Echo, EchoResponse};
pub use error::{NmgrError, Result};
pub use frame::{Envelope, HEADER_LEN, Header};
pub use group::Group;
pub use message::Message;
pub use op::Op;
pub use sequence::SequenceNumber;
