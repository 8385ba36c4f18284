use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use newtmgr_rs_protocol::frame;

use crate::error::{ClientError, Result};
use crate::transport::Transport;

/// Produces inbound chunks in reaction to each write.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Scripted in-memory transport.
///
/// Reads pop queued chunks; with nothing queued a read sleeps for its full
/// timeout and fails with `Timeout` (or reports `Disconnected` once
/// `close_when_drained` is set).
pub struct MockTransport {
    inbound: VecDeque<Vec<u8>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    responder: Option<Responder>,
    close_when_drained: bool,
    fail_writes: bool,
    stall_writes: bool,
}

impl MockTransport {
    /// A device that never answers.
    pub fn silent() -> Self {
        Self {
            inbound: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            responder: None,
            close_when_drained: false,
            fail_writes: false,
            stall_writes: false,
        }
    }

    pub fn with_responder(
        responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::silent()
        }
    }

    /// A device that answers every request with its own payload.
    pub fn echo_device() -> Self {
        Self::with_responder(|data| {
            let (request, _) = frame::decode(data).unwrap();
            let response = request.response_to(request.payload.clone());
            vec![response.encode().unwrap()]
        })
    }

    pub fn close_when_drained(mut self) -> Self {
        self.close_when_drained = true;
        self
    }

    pub fn fail_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Writes never complete, like a peer that stopped draining its socket.
    pub fn stall_writes(mut self) -> Self {
        self.stall_writes = true;
        self
    }

    /// Shared handle to every buffer written so far.
    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.written)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(ClientError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        if self.stall_writes {
            std::future::pending::<()>().await;
        }
        self.written.lock().unwrap().push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            self.inbound.extend(responder(data));
        }
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if let Some(chunk) = self.inbound.pop_front() {
            return Ok(chunk);
        }
        if self.close_when_drained {
            return Err(ClientError::Disconnected);
        }
        tokio::time::sleep(timeout).await;
        Err(ClientError::Timeout(timeout))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
