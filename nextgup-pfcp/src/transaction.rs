//! Request/response correlation over one PFCP socket
//!
//! Every outbound request takes the next free 24-bit sequence number and
//! parks a oneshot sender under it. The association's receive task hands
//! responses back through [`Transactor::deliver`]. The slot is removed on
//! delivery, on timeout and on send failure alike.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nextgup_common::logging::{log_pfcp_message, Direction};
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{PfcpError, Result};
use crate::message::{Message, MAX_SEQUENCE};

/// Default wait for a correlated response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Sequence allocator and pending-request table for one connected socket.
pub(crate) struct Transactor {
    socket: Arc<UdpSocket>,
    pending: Mutex<HashMap<u32, oneshot::Sender<Message>>>,
    next_sequence: AtomicU32,
    response_timeout: Duration,
    closed: AtomicBool,
}

impl Transactor {
    pub(crate) fn new(socket: Arc<UdpSocket>, response_timeout: Duration) -> Self {
        Self {
            socket,
            pending: Mutex::new(HashMap::new()),
            next_sequence: AtomicU32::new(0),
            response_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Sends `request` and waits for the response carrying its sequence.
    ///
    /// A response of the wrong type is returned inside
    /// [`PfcpError::UnexpectedResponse`].
    pub(crate) async fn send(&self, mut request: Message) -> Result<Message> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PfcpError::AssociationClosed);
        }

        let (tx, rx) = oneshot::channel();
        request.sequence = self.register(tx).await;
        let sequence = request.sequence;

        let result = self.transmit_and_wait(&request, rx).await;
        self.pending.lock().await.remove(&sequence);

        let response = result?;
        let expected = request.message_type.response_code();
        if response.message_type as u8 != expected {
            return Err(PfcpError::UnexpectedResponse {
                expected,
                actual: response.message_type as u8,
                message: Box::new(response),
            });
        }
        Ok(response)
    }

    async fn transmit_and_wait(
        &self,
        request: &Message,
        rx: oneshot::Receiver<Message>,
    ) -> Result<Message> {
        let data = request.encode()?;
        self.socket.send(&data).await?;
        log_pfcp_message(Direction::Tx, request.message_type.name(), &data);

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(PfcpError::AssociationClosed),
            Err(_) => {
                warn!(
                    "{} (seq={}) timed out after {:?}",
                    request.message_type, request.sequence, self.response_timeout
                );
                Err(PfcpError::Timeout)
            }
        }
    }

    /// Takes the next sequence number not currently in flight and parks `tx` under it.
    async fn register(&self, tx: oneshot::Sender<Message>) -> u32 {
        let mut pending = self.pending.lock().await;
        loop {
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed) & MAX_SEQUENCE;
            if !pending.contains_key(&sequence) {
                pending.insert(sequence, tx);
                return sequence;
            }
        }
    }

    /// Sends a message that expects no answer, such as a response to a peer request.
    pub(crate) async fn reply(&self, message: &Message) -> Result<()> {
        let data = message.encode()?;
        self.socket.send(&data).await?;
        log_pfcp_message(Direction::Tx, message.message_type.name(), &data);
        Ok(())
    }

    /// Hands `response` to the request waiting on its sequence.
    ///
    /// Returns false when nothing is waiting; the message is dropped.
    pub(crate) async fn deliver(&self, response: Message) -> bool {
        let slot = self.pending.lock().await.remove(&response.sequence);
        match slot {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                debug!(
                    "No pending request for {} (seq={})",
                    response.message_type, response.sequence
                );
                false
            }
        }
    }

    /// Refuses new requests and fails every waiting one.
    pub(crate) async fn shut_down(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.lock().await.clear();
    }

    /// Number of requests awaiting a response
    pub(crate) async fn in_flight(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    #[cfg(test)]
    fn set_next_sequence(&self, sequence: u32) {
        self.next_sequence.store(sequence, Ordering::Relaxed);
    }
}
