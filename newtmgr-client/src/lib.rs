//! Async newtmgr client for managing Mynewt devices.
//!
//! Open a [`Transport`] for a [`ConnProfile`], bind a [`CmdRunner`] to it, and
//! run request/response exchanges built from `newtmgr-rs-protocol` messages.

pub mod config;
pub mod correlator;
pub mod error;
pub mod profile;
pub mod runner;
pub mod transport;

#[cfg(test)]
mod mock;

pub use config::ClientConfig;
pub use correlator::{Correlator, Pending};
pub use error::{ClientError, Result};
pub use profile::{ConnProfile, ConnType, MemoryProfileStore, ProfileStore};
pub use runner::CmdRunner;
pub use transport::{TcpTransport, Transport, UdpTransport};
