use std::collections::HashMap;

use newtmgr_rs_protocol::{Envelope, SequenceNumber};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{ClientError, Result};

/// Matches inbound response envelopes to outstanding requests on one connection.
///
/// Each connection owns its own correlator, so sequence numbers never leak
/// between connections. Several requests may be pending at once; a number is
/// handed out again only after its pending entry is resolved or released.
#[derive(Debug)]
pub struct Correlator {
    next: SequenceNumber,
    pending: HashMap<SequenceNumber, oneshot::Sender<Envelope>>,
}

/// Receiving side of one registered request.
#[derive(Debug)]
pub struct Pending {
    sequence: SequenceNumber,
    rx: oneshot::Receiver<Envelope>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::starting_at(SequenceNumber::new(0))
    }

    /// Start numbering at `first` instead of 0.
    pub fn starting_at(first: SequenceNumber) -> Self {
        Self {
            next: first,
            pending: HashMap::new(),
        }
    }

    /// Hand out the next free sequence number.
    ///
    /// Numbers increase by one and wrap 255 -> 0; numbers still pending are
    /// skipped. Fails with [`ClientError::SequenceExhausted`] when all 256
    /// are pending.
    pub fn next_sequence(&mut self) -> Result<SequenceNumber> {
        for _ in 0..SequenceNumber::SPACE {
            let candidate = self.next;
            self.next = candidate.next();
            if !self.pending.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ClientError::SequenceExhausted)
    }

    /// Register a request awaiting the response carrying `sequence`.
    ///
    /// Registering a number that is already pending is a caller bug and
    /// fails with [`ClientError::SequenceReuse`].
    pub fn register(&mut self, sequence: SequenceNumber) -> Result<Pending> {
        if self.pending.contains_key(&sequence) {
            return Err(ClientError::SequenceReuse(sequence));
        }
        let (tx, rx) = oneshot::channel();
        self.pending.insert(sequence, tx);
        Ok(Pending { sequence, rx })
    }

    /// Deliver `response` to the request pending on its sequence number.
    ///
    /// Returns `false`, leaving every pending request untouched, when no
    /// request is waiting on that number.
    pub fn resolve(&mut self, response: Envelope) -> bool {
        let sequence = response.sequence;
        match self.pending.remove(&sequence) {
            Some(tx) => {
                // A dropped Pending just means the waiter gave up.
                if tx.send(response).is_err() {
                    trace!(%sequence, "waiter dropped before response");
                }
                true
            }
            None => false,
        }
    }

    /// Forget the request pending on `sequence`, freeing the number.
    ///
    /// Returns whether a request was pending.
    pub fn release(&mut self, sequence: SequenceNumber) -> bool {
        self.pending.remove(&sequence).is_some()
    }

    pub fn is_pending(&self, sequence: SequenceNumber) -> bool {
        self.pending.contains_key(&sequence)
    }

    /// Number of requests currently pending.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Pending {
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Take the response if it has been resolved.
    pub fn try_take(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Wait for the response. Returns `None` if the request was released.
    pub async fn recv(self) -> Option<Envelope> {
        self.rx.await.ok()
    }
}
