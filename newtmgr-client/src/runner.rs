use std::time::Duration;

use newtmgr_rs_protocol::frame::{self, HEADER_LEN, Header};
use newtmgr_rs_protocol::{Envelope, Group, Message, NmgrError, Op, SequenceNumber};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::correlator::{Correlator, Pending};
use crate::error::{ClientError, Result};
use crate::profile::{ConnProfile, ProfileStore};
use crate::transport::{self, Transport};

/// Runs newtmgr request/response exchanges over one transport.
///
/// One exchange at a time: [`execute`](Self::execute) borrows the runner
/// mutably, sends exactly one request, and waits for the response carrying
/// the same sequence number. Frames for other sequence numbers (strays, late
/// answers to timed-out requests) are dropped. Nothing is retried.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> newtmgr_rs_client::Result<()> {
/// use newtmgr_rs_client::{ClientConfig, CmdRunner, ConnProfile, ConnType};
/// use newtmgr_rs_protocol::Echo;
///
/// let profile = ConnProfile::new("dev", ConnType::Tcp, "192.168.1.20:1337");
/// let mut runner = CmdRunner::connect(&profile, ClientConfig::default()).await?;
/// let rsp = runner.run(&Echo::new("ping")).await?;
/// println!("{}", rsp.message);
/// runner.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct CmdRunner<T> {
    transport: T,
    correlator: Correlator,
    rx_buf: Vec<u8>,
    config: ClientConfig,
}

impl CmdRunner<Box<dyn Transport>> {
    /// Open the transport described by `profile` and bind a runner to it.
    pub async fn connect(profile: &ConnProfile, config: ClientConfig) -> Result<Self> {
        let transport = transport::open(profile, &config).await?;
        info!(profile = %profile.name, "connected");
        Ok(Self::with_config(transport, config))
    }

    /// Resolve `name` in `store`, then [`connect`](Self::connect).
    pub async fn connect_named(
        store: &impl ProfileStore,
        name: &str,
        config: ClientConfig,
    ) -> Result<Self> {
        let profile = store.resolve(name)?;
        Self::connect(&profile, config).await
    }
}

impl<T: Transport> CmdRunner<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            correlator: Correlator::new(),
            rx_buf: Vec::new(),
            config,
        }
    }

    // -- Accessors --

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Release the transport without closing it.
    pub fn into_inner(self) -> T {
        self.transport
    }

    pub async fn close(&mut self) -> Result<()> {
        info!(endpoint = self.transport.name(), "closing");
        self.rx_buf.clear();
        self.transport.close().await
    }

    // -- Exchanges --

    /// Send `msg` and decode its typed response, waiting up to
    /// [`ClientConfig::response_timeout`].
    pub async fn run<M: Message>(&mut self, msg: &M) -> Result<M::Response> {
        let payload = msg.encode_request();
        let timeout = self.config.response_timeout;
        let response = self
            .execute(M::OP, M::GROUP, M::ID, &payload, timeout)
            .await?;
        Ok(M::decode_response(&response)?)
    }

    /// Send one request and return the payload of its response.
    ///
    /// The sequence number is released when the exchange ends, whether it
    /// succeeds, fails, or the returned future is dropped, so a timed-out or
    /// cancelled number can be handed out again. After
    /// [`ClientError::ProtocolDesync`] buffered bytes are dropped; whether to
    /// reconnect is up to the caller.
    pub async fn execute(
        &mut self,
        op: Op,
        group: Group,
        id: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let sequence = self.correlator.next_sequence()?;
        let pending = self.correlator.register(sequence)?;
        let mut in_flight = InFlight {
            runner: self,
            sequence,
        };

        let request = frame::encode(op, 0, group, id, sequence, payload)?;
        debug!(%op, %group, id, %sequence, len = payload.len(), "sending request");
        in_flight.runner.exchange(&request, pending, timeout).await
    }

    async fn exchange(
        &mut self,
        request: &[u8],
        mut pending: Pending,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let sequence = pending.sequence();
        match tokio::time::timeout_at(deadline, self.transport.write(request)).await {
            Ok(written) => written?,
            Err(_) => {
                warn!(%sequence, ?timeout, "request write stalled past deadline");
                return Err(ClientError::Timeout(timeout));
            }
        }

        loop {
            while let Some(envelope) = self.next_buffered_frame()? {
                self.dispatch(envelope);
                if let Some(response) = pending.try_take() {
                    debug!(%sequence, len = response.payload.len(), "response received");
                    return Ok(response.payload);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(%sequence, ?timeout, "no response before deadline");
                return Err(ClientError::Timeout(timeout));
            }

            match self.transport.read(remaining).await {
                Ok(bytes) => {
                    trace!(len = bytes.len(), buffered = self.rx_buf.len(), "bytes received");
                    self.rx_buf.extend_from_slice(&bytes);
                }
                Err(ClientError::Timeout(_)) => {
                    warn!(%sequence, ?timeout, "no response before deadline");
                    return Err(ClientError::Timeout(timeout));
                }
                Err(ClientError::Disconnected) if !self.rx_buf.is_empty() => {
                    return Err(self.truncated());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pop one complete frame off the receive buffer.
    ///
    /// `Ok(None)` means more bytes are needed. A header that does not parse
    /// clears the buffer and yields `ProtocolDesync`.
    fn next_buffered_frame(&mut self) -> Result<Option<Envelope>> {
        match frame::decode(&self.rx_buf) {
            Ok((envelope, consumed)) => {
                self.rx_buf.drain(..consumed);
                Ok(Some(envelope))
            }
            Err(NmgrError::FrameTooShort { .. } | NmgrError::TruncatedFrame { .. }) => Ok(None),
            Err(e) => {
                warn!(
                    error = %e,
                    buffered = self.rx_buf.len(),
                    "undecodable frame, dropping buffer"
                );
                self.rx_buf.clear();
                Err(ClientError::ProtocolDesync(e))
            }
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        if !envelope.op.is_response() {
            debug!(op = %envelope.op, sequence = %envelope.sequence, "ignoring non-response frame");
            return;
        }
        let sequence = envelope.sequence;
        if !self.correlator.resolve(envelope) {
            debug!(%sequence, "discarding response with no pending request");
        }
    }

    /// Build the error for a channel that ended mid-frame, dropping the partial bytes.
    fn truncated(&mut self) -> ClientError {
        let actual = self.rx_buf.len();
        let expected = Header::parse(&self.rx_buf)
            .map(|h| h.frame_len())
            .unwrap_or(HEADER_LEN);
        warn!(expected, actual, "channel closed mid-frame");
        self.rx_buf.clear();
        ClientError::TruncatedFrame { expected, actual }
    }
}

/// Holds a registered sequence number for the life of one exchange.
///
/// Dropping it releases the number, including when the `execute` future is
/// cancelled mid-exchange. Releasing an already-resolved number is a no-op.
struct InFlight<'a, T> {
    runner: &'a mut CmdRunner<T>,
    sequence: SequenceNumber,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.runner.correlator.release(self.sequence) {
            trace!(sequence = %self.sequence, "sequence released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use newtmgr_rs_protocol::{Echo, EchoResponse};

    fn echo_rsp(seq: u8, text: &str) -> Vec<u8> {
        frame::encode(
            Op::WriteRsp,
            0,
            Group::DEFAULT,
            0,
            SequenceNumber::new(seq),
            text.as_bytes(),
        )
        .unwrap()
    }

    fn request_seq(data: &[u8]) -> u8 {
        frame::decode(data).unwrap().0.sequence.value()
    }

    // -- Happy path --

    #[tokio::test]
    async fn echo_ping() {
        let transport = MockTransport::echo_device();
        let written = transport.written();
        let mut runner = CmdRunner::new(transport);

        let rsp: EchoResponse = runner.run(&Echo::new("ping")).await.unwrap();
        assert_eq!(rsp.message, "ping");

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(
            written[0],
            [0x02, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, b'p', b'i', b'n', b'g']
        );
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test]
    async fn execute_returns_raw_payload() {
        let mut runner = CmdRunner::new(MockTransport::echo_device());
        let payload = runner
            .execute(Op::Read, Group::STATS, 0, b"\x01\x02", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(payload, [0x01, 0x02]);
    }

    #[tokio::test]
    async fn sequence_advances_per_exchange() {
        let transport = MockTransport::echo_device();
        let written = transport.written();
        let mut runner = CmdRunner::new(transport);

        for text in ["a", "b", "c"] {
            assert_eq!(runner.run(&Echo::new(text)).await.unwrap().message, text);
        }

        let seqs: Vec<u8> = written.lock().unwrap().iter().map(|w| request_seq(w)).collect();
        assert_eq!(seqs, [0, 1, 2]);
    }

    // -- Correlation --

    #[tokio::test]
    async fn stray_frame_is_ignored() {
        let transport = MockTransport::with_responder(|data| {
            let seq = request_seq(data);
            vec![
                echo_rsp(seq.wrapping_add(100), "stray"),
                echo_rsp(seq, "ping"),
            ]
        });
        let mut runner = CmdRunner::new(transport);

        let rsp = runner.run(&Echo::new("ping")).await.unwrap();
        assert_eq!(rsp.message, "ping");
    }

    #[tokio::test]
    async fn stray_and_match_in_one_chunk() {
        let transport = MockTransport::with_responder(|data| {
            let seq = request_seq(data);
            let mut chunk = echo_rsp(seq.wrapping_add(1), "stray");
            chunk.extend(echo_rsp(seq, "pong"));
            vec![chunk]
        });
        let mut runner = CmdRunner::new(transport);

        assert_eq!(runner.run(&Echo::new("x")).await.unwrap().message, "pong");
    }

    #[tokio::test]
    async fn request_op_with_matching_sequence_is_ignored() {
        // A looped-back copy of the request must not satisfy the exchange
        let transport = MockTransport::with_responder(|data| {
            let seq = request_seq(data);
            vec![data.to_vec(), echo_rsp(seq, "real")]
        });
        let mut runner = CmdRunner::new(transport);

        assert_eq!(runner.run(&Echo::new("loop")).await.unwrap().message, "real");
    }

    #[tokio::test]
    async fn partial_delivery_is_reassembled() {
        let transport = MockTransport::with_responder(|data| {
            let frame = echo_rsp(request_seq(data), "fragmented");
            vec![frame[..3].to_vec(), frame[3..10].to_vec(), frame[10..].to_vec()]
        });
        let mut runner = CmdRunner::new(transport);

        let rsp = runner.run(&Echo::new("fragmented")).await.unwrap();
        assert_eq!(rsp.message, "fragmented");
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_discarded_on_next_exchange() {
        let mut calls = 0;
        let transport = MockTransport::with_responder(move |data| {
            calls += 1;
            if calls == 1 {
                // First request goes unanswered
                return Vec::new();
            }
            let seq = request_seq(data);
            vec![echo_rsp(seq.wrapping_sub(1), "late"), echo_rsp(seq, "fresh")]
        });
        let mut runner = CmdRunner::new(transport);

        let err = runner
            .execute(Op::Write, Group::DEFAULT, 0, b"first", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        let payload = runner
            .execute(Op::Write, Group::DEFAULT, 0, b"second", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(payload, b"fresh");
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    // -- Timeouts --

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out() {
        let mut runner = CmdRunner::new(MockTransport::silent());
        let timeout = Duration::from_millis(500);

        let start = Instant::now();
        let err = runner
            .execute(Op::Write, Group::DEFAULT, 0, b"ping", timeout)
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ClientError::Timeout(d) if d == timeout));
        assert!(elapsed >= timeout, "returned early: {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_millis(50), "returned late: {elapsed:?}");

        // Sequence 0 is free again
        assert!(!runner.correlator().is_pending(SequenceNumber::new(0)));
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stray_frames_do_not_extend_deadline() {
        let transport = MockTransport::with_responder(|data| {
            let seq = request_seq(data);
            vec![echo_rsp(seq.wrapping_add(5), "noise")]
        });
        let mut runner = CmdRunner::new(transport);
        let timeout = Duration::from_millis(200);

        let start = Instant::now();
        let err = runner
            .execute(Op::Write, Group::DEFAULT, 0, b"x", timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert!(start.elapsed() < timeout + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out() {
        let mut runner = CmdRunner::new(MockTransport::silent().stall_writes());
        let timeout = Duration::from_millis(500);

        let start = Instant::now();
        let err = tokio::time::timeout(
            Duration::from_secs(60),
            runner.execute(Op::Write, Group::DEFAULT, 0, b"ping", timeout),
        )
        .await
        .expect("execute must return on its own deadline")
        .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ClientError::Timeout(d) if d == timeout));
        assert!(elapsed < timeout + Duration::from_millis(50), "returned late: {elapsed:?}");
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_execute_releases_sequence() {
        let mut runner = CmdRunner::new(MockTransport::silent());

        for _ in 0..3 {
            let cancelled = tokio::time::timeout(
                Duration::from_millis(10),
                runner.execute(Op::Write, Group::DEFAULT, 0, b"ping", Duration::from_secs(5)),
            )
            .await;
            assert!(cancelled.is_err());
        }
        assert_eq!(runner.correlator().outstanding(), 0);

        // Numbers keep advancing after cancellation and none are leaked
        for _ in 0..SequenceNumber::SPACE {
            let _ = tokio::time::timeout(
                Duration::from_millis(1),
                runner.execute(Op::Write, Group::DEFAULT, 0, b"", Duration::from_secs(5)),
            )
            .await;
        }
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_uses_configured_timeout() {
        let config = ClientConfig {
            response_timeout: Duration::from_millis(250),
            ..ClientConfig::default()
        };
        let mut runner = CmdRunner::with_config(MockTransport::silent(), config);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(250)));
    }

    // -- Failures --

    #[tokio::test]
    async fn undecodable_header_is_desync() {
        let transport = MockTransport::with_responder(|_| vec![vec![0xFF; 12]]);
        let mut runner = CmdRunner::new(transport);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolDesync(NmgrError::InvalidOp(0xFF))
        ));
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test]
    async fn desync_drops_buffer() {
        let mut calls = 0;
        let transport = MockTransport::with_responder(move |data| {
            calls += 1;
            if calls == 1 {
                vec![vec![0x42; 20]]
            } else {
                vec![echo_rsp(request_seq(data), "recovered")]
            }
        });
        let mut runner = CmdRunner::new(transport);

        assert!(matches!(
            runner.run(&Echo::new("a")).await.unwrap_err(),
            ClientError::ProtocolDesync(_)
        ));
        // Garbage is gone; the next exchange reads clean frames
        assert_eq!(runner.run(&Echo::new("b")).await.unwrap().message, "recovered");
    }

    #[tokio::test]
    async fn eof_mid_frame_is_truncated() {
        let transport = MockTransport::with_responder(|data| {
            let frame = echo_rsp(request_seq(data), "ping");
            vec![frame[..10].to_vec()]
        })
        .close_when_drained();
        let mut runner = CmdRunner::new(transport);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TruncatedFrame {
                expected: 12,
                actual: 10
            }
        ));
    }

    #[tokio::test]
    async fn eof_mid_header_is_truncated() {
        let transport = MockTransport::with_responder(|_| vec![vec![0x03, 0x00, 0x00]])
            .close_when_drained();
        let mut runner = CmdRunner::new(transport);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TruncatedFrame {
                expected: HEADER_LEN,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn eof_between_frames_is_disconnected() {
        let transport = MockTransport::silent().close_when_drained();
        let mut runner = CmdRunner::new(transport);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(err, ClientError::Disconnected));
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test]
    async fn write_failure_releases_sequence() {
        let mut runner = CmdRunner::new(MockTransport::silent().fail_writes());

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(err, ClientError::Write(_)));
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test]
    async fn bad_response_payload_is_protocol_error() {
        let transport = MockTransport::with_responder(|data| {
            let (req, _) = frame::decode(data).unwrap();
            vec![req.response_to(vec![0xC3, 0x28]).encode().unwrap()]
        });
        let mut runner = CmdRunner::new(transport);

        let err = runner.run(&Echo::new("ping")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(NmgrError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_send() {
        let transport = MockTransport::echo_device();
        let written = transport.written();
        let mut runner = CmdRunner::new(transport);

        let payload = vec![0u8; frame::MAX_PAYLOAD_LEN + 1];
        let err = runner
            .execute(Op::Write, Group::IMAGE, 1, &payload, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(NmgrError::PayloadTooLarge(_))));
        assert!(written.lock().unwrap().is_empty());
        assert_eq!(runner.correlator().outstanding(), 0);
    }

    #[tokio::test]
    async fn connect_named_unknown_profile() {
        let store = crate::profile::MemoryProfileStore::new();
        let result = CmdRunner::connect_named(&store, "missing", ClientConfig::default()).await;
        assert!(matches!(result, Err(ClientError::ProfileNotFound(name)) if name == "missing"));
    }
}
