//! Mock PFCP peer for integration testing
//!
//! A plain UDP socket that decodes what the association sends and lets the
//! test decide, message by message, what to answer. Nothing is answered
//! automatically, so tests can delay, reorder or drop responses.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use nextgup_pfcp::ie::{types, Cause, FSeid, IeEncode, RawIe};
use nextgup_pfcp::{Association, Message, MessageType, PfcpConfig};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::test_utils::{TestResult, DEFAULT_TEST_TIMEOUT};

/// First SEID the mock hands out for established sessions
pub const FIRST_PEER_SEID: u64 = 0x1000;

/// A message received by the mock peer
#[derive(Debug, Clone)]
pub struct Received {
    /// Decoded message
    pub message: Message,
    /// Sender address
    pub from: SocketAddr,
}

/// Scripted PFCP peer bound to a loopback port
pub struct MockPeer {
    socket: UdpSocket,
    /// peer SEID -> control-plane SEID, learned from establishment requests
    sessions: Mutex<HashMap<u64, u64>>,
    next_seid: Mutex<u64>,
}

impl MockPeer {
    /// Binds a peer on `127.0.0.1` with an ephemeral port.
    pub async fn bind() -> TestResult<Self> {
        Ok(Self {
            socket: UdpSocket::bind("127.0.0.1:0").await?,
            sessions: Mutex::new(HashMap::new()),
            next_seid: Mutex::new(FIRST_PEER_SEID),
        })
    }

    /// Peer socket address
    pub fn addr(&self) -> TestResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Association configuration pointing at this peer
    pub fn config(&self) -> TestResult<PfcpConfig> {
        let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        Ok(PfcpConfig::new(local, self.addr()?))
    }

    /// Waits for the next decodable message.
    pub async fn recv(&self) -> TestResult<Received> {
        let mut buf = vec![0u8; 65535];
        let (n, from) = timeout(DEFAULT_TEST_TIMEOUT, self.socket.recv_from(&mut buf)).await??;
        let message = Message::decode(&buf[..n])?;
        debug!("Mock peer received {} (seq={})", message.message_type, message.sequence);
        Ok(Received { message, from })
    }

    /// Waits for the next message and checks its type.
    pub async fn expect(&self, message_type: MessageType) -> TestResult<Received> {
        let received = self.recv().await?;
        if received.message.message_type != message_type {
            return Err(format!(
                "expected {}, got {}",
                message_type, received.message.message_type
            )
            .into());
        }
        Ok(received)
    }

    /// Whether nothing arrives for `quiet`.
    pub async fn is_silent_for(&self, quiet: Duration) -> bool {
        let mut buf = vec![0u8; 65535];
        timeout(quiet, self.socket.recv_from(&mut buf)).await.is_err()
    }

    /// Sends an encoded message to `to`.
    pub async fn send(&self, message: &Message, to: SocketAddr) -> TestResult {
        let data = message.encode()?;
        self.send_raw(&data, to).await
    }

    /// Sends raw bytes to `to`.
    pub async fn send_raw(&self, data: &[u8], to: SocketAddr) -> TestResult {
        self.socket.send_to(data, to).await?;
        Ok(())
    }

    /// Answers `request` with its response type, `cause` and `extra` IEs.
    pub async fn respond(&self, request: &Received, cause: Cause, extra: &[RawIe]) -> TestResult {
        let response = self.response(request, cause, extra).await?;
        self.send(&response, request.from).await
    }

    /// Builds the response to `request` without sending it.
    ///
    /// Session responses are addressed to the control-plane SEID the peer
    /// learned at establishment.
    pub async fn response(&self, request: &Received, cause: Cause, extra: &[RawIe]) -> TestResult<Message> {
        let code = request.message.message_type.response_code();
        let response_type =
            MessageType::from_u8(code).ok_or_else(|| format!("no response type {code}"))?;
        let mut response = Message::response_to(&request.message, response_type);
        if request.message.message_type.is_session_message() {
            let peer_seid = request.message.seid.unwrap_or(0);
            response.seid = Some(self.sessions.lock().await.get(&peer_seid).copied().unwrap_or(0));
        }
        response.push(&cause)?;
        response.ies.extend_from_slice(extra);
        Ok(response)
    }

    /// Accepts a Session Establishment Request, assigning the next peer SEID.
    ///
    /// Returns the assigned SEID and the control-plane SEID from the request.
    pub async fn accept_establishment(&self, request: &Received, extra: &[RawIe]) -> TestResult<(u64, u64)> {
        let cp = request
            .message
            .decode_first::<FSeid>(types::F_SEID)?
            .ok_or("establishment request without F-SEID")?;
        let peer_seid = {
            let mut next = self.next_seid.lock().await;
            let seid = *next;
            *next += 1;
            seid
        };
        self.sessions.lock().await.insert(peer_seid, cp.seid);

        let mut response = Message::response_to(&request.message, MessageType::SessionEstablishmentResponse);
        response.seid = Some(cp.seid);
        response.push(&Cause::RequestAccepted)?;
        response.push(&FSeid::new(peer_seid, IpAddr::V4(Ipv4Addr::LOCALHOST)))?;
        response.ies.extend_from_slice(extra);
        self.send(&response, request.from).await?;
        Ok((peer_seid, cp.seid))
    }
}

/// Encodes `ie` as a standalone [`RawIe`] for use in scripted responses.
pub fn raw<T: IeEncode + ?Sized>(ie: &T) -> TestResult<RawIe> {
    let mut message = Message::new(MessageType::HeartbeatResponse);
    message.push(ie)?;
    message.ies.pop().ok_or_else(|| "IE encoded to nothing".into())
}

/// Opens an association against `peer`, accepting its setup request.
pub async fn open_association(peer: &MockPeer, config: PfcpConfig) -> TestResult<Association> {
    let open = tokio::spawn(Association::open(config));
    let setup = peer.expect(MessageType::AssociationSetupRequest).await?;
    peer.respond(&setup, Cause::RequestAccepted, &[]).await?;
    Ok(timeout(DEFAULT_TEST_TIMEOUT, open).await???)
}
