//! Byte-channel abstraction the runner is written against.

pub mod tcp;
pub mod udp;

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::profile::{ConnProfile, ConnType};

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// An open byte channel to a device.
///
/// `read` returns whatever bytes are available (at least one); frame
/// boundaries are not preserved. Writes are whole: one call sends the full
/// buffer or fails.
#[async_trait]
pub trait Transport: Send {
    /// Endpoint this transport is connected to, for logs and errors.
    fn name(&self) -> &str;

    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for inbound bytes.
    ///
    /// Returns [`ClientError::Timeout`] when nothing arrives and
    /// [`ClientError::Disconnected`] when the peer closed the channel.
    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read(timeout).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Open the transport selected by the profile's connection type.
pub async fn open(profile: &ConnProfile, config: &ClientConfig) -> Result<Box<dyn Transport>> {
    info!(
        profile = %profile.name,
        conn_type = %profile.conn_type,
        endpoint = %profile.conn_string,
        "opening transport"
    );
    match profile.conn_type {
        ConnType::Tcp => {
            let transport =
                TcpTransport::connect(&profile.conn_string, config.connect_timeout).await?;
            Ok(Box::new(transport))
        }
        ConnType::Udp => {
            let transport =
                UdpTransport::connect(&profile.conn_string, config.connect_timeout).await?;
            Ok(Box::new(transport))
        }
        ConnType::Serial => Err(ClientError::Connect {
            endpoint: profile.conn_string.clone(),
            reason: "serial transport is not available in this build".into(),
        }),
    }
}
