use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::transport::Transport;

/// Largest datagram accepted: a full header plus a maximum-length payload.
const MAX_DATAGRAM: usize = newtmgr_rs_protocol::HEADER_LEN + u16::MAX as usize;

/// Newtmgr over a connected UDP socket, one frame per datagram.
pub struct UdpTransport {
    addr: String,
    socket: UdpSocket,
    recv_buf: Box<[u8]>,
}

impl UdpTransport {
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        debug!(addr, "UDP connecting");
        let connect_err = |reason: String| ClientError::Connect {
            endpoint: addr.to_owned(),
            reason,
        };

        let peer = tokio::time::timeout(connect_timeout, tokio::net::lookup_host(addr))
            .await
            .map_err(|_| connect_err(format!("timeout after {connect_timeout:?}")))?
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("address resolved to nothing".into()))?;

        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        Ok(Self {
            addr: addr.to_owned(),
            socket,
            recv_buf: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.addr
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let n = self.socket.send(data).await.map_err(ClientError::Write)?;
        if n != data.len() {
            return Err(ClientError::Write(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {n} of {} bytes", data.len()),
            )));
        }
        trace!(len = n, "udp send");
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let n = tokio::time::timeout(timeout, self.socket.recv(&mut self.recv_buf))
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
            .map_err(ClientError::Read)?;
        trace!(len = n, "udp recv");
        Ok(self.recv_buf[..n].to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        // Connectionless; nothing to tear down beyond dropping the socket.
        debug!(addr = %self.addr, "UDP closing");
        Ok(())
    }
}
