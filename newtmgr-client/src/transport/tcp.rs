use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};
use crate::transport::Transport;

const READ_CHUNK: usize = 2048;

/// Newtmgr over a TCP byte stream.
pub struct TcpTransport {
    addr: String,
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TcpTransport {
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        debug!(addr, "TCP connecting");
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Connect {
                endpoint: addr.to_owned(),
                reason: format!("timeout after {connect_timeout:?}"),
            })?
            .map_err(|e| ClientError::Connect {
                endpoint: addr.to_owned(),
                reason: e.to_string(),
            })?;

        stream.set_nodelay(true).ok();
        Ok(Self::from_stream(addr, stream))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(addr: &str, stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            addr: addr.to_owned(),
            reader: read_half,
            writer: BufWriter::new(write_half),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &str {
        &self.addr
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "tcp write");
        self.writer.write_all(data).await.map_err(ClientError::Write)?;
        self.writer.flush().await.map_err(ClientError::Write)?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = tokio::time::timeout(timeout, self.reader.read(&mut buf))
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
            .map_err(ClientError::Read)?;
        if n == 0 {
            return Err(ClientError::Disconnected);
        }
        buf.truncate(n);
        trace!(len = n, "tcp read");
        Ok(buf)
    }

    async fn close(&mut self) -> Result<()> {
        debug!(addr = %self.addr, "TCP closing");
        if let Err(e) = self.writer.shutdown().await {
            warn!(error = %e, "TCP shutdown failed");
            return Err(ClientError::Write(e));
        }
        Ok(())
    }
}
