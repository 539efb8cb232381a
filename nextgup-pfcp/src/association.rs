//! PFCP association with one user-plane peer
//!
//! [`Association::open`] connects a UDP socket to the peer, starts the
//! receive task, performs Association Setup and then starts the heartbeat
//! task. Both tasks hold a `watch` receiver; [`Association::close`] signals
//! them and joins them after the teardown messages have been sent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use nextgup_common::logging::{log_pfcp_message, Direction};
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{PfcpError, Result};
use crate::ie::{types, NodeId, RawIe, RecoveryTimeStamp};
use crate::message::{Message, MessageType, PFCP_PORT};
use crate::session::{self, SessionManager, SessionRegistry};
use crate::transaction::{Transactor, DEFAULT_RESPONSE_TIMEOUT};

/// Default interval between Heartbeat Requests
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

const MAX_DATAGRAM_SIZE: usize = 65535;

/// Association configuration
#[derive(Debug, Clone)]
pub struct PfcpConfig {
    /// Local PFCP socket address
    pub local_addr: SocketAddr,
    /// Peer PFCP address
    pub remote_addr: SocketAddr,
    /// Wait for each correlated response
    pub response_timeout: Duration,
    /// Heartbeat period
    pub heartbeat_interval: Duration,
}

impl Default for PfcpConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), PFCP_PORT),
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), PFCP_PORT),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl PfcpConfig {
    /// Configuration between `local_addr` and `remote_addr` with default timers
    pub fn new(local_addr: SocketAddr, remote_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            remote_addr,
            ..Self::default()
        }
    }

    /// Set the response timeout
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// State shared between the association handle, its tasks and every
/// [`SessionManager`].
pub(crate) struct Shared {
    pub(crate) transactor: Transactor,
    pub(crate) sessions: RwLock<SessionRegistry>,
    pub(crate) node_id: NodeId,
    pub(crate) local_addr: SocketAddr,
    pub(crate) recovery: RecoveryTimeStamp,
}

/// An established PFCP association.
///
/// Dropping the handle without closing it stops nothing; call
/// [`Association::close`] to release the peer and the socket.
pub struct Association {
    shared: Arc<Shared>,
    remote_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Association {
    /// Connects to the peer and performs Association Setup.
    ///
    /// A rejected or unanswered setup stops the receive task and releases
    /// the socket before the error is returned.
    pub async fn open(config: PfcpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.local_addr).await?;
        socket.connect(config.remote_addr).await?;
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(Shared {
            transactor: Transactor::new(Arc::new(socket), config.response_timeout),
            sessions: RwLock::new(SessionRegistry::default()),
            node_id: NodeId::from(local_addr.ip()),
            local_addr,
            recovery: RecoveryTimeStamp::now(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receiver = tokio::spawn(receive_loop(shared.clone(), shutdown_rx.clone()));

        let association = Self {
            shared,
            remote_addr: config.remote_addr,
            shutdown_tx,
            tasks: Mutex::new(vec![receiver]),
        };

        if let Err(e) = association.setup().await {
            error!("Association setup with {} failed: {}", config.remote_addr, e);
            association.stop_tasks().await;
            return Err(e);
        }

        let heartbeat = tokio::spawn(heartbeat_loop(
            association.shared.clone(),
            config.heartbeat_interval,
            shutdown_rx,
        ));
        association.tasks.lock().await.push(heartbeat);

        info!(
            "PFCP association {} -> {} established",
            local_addr, config.remote_addr
        );
        Ok(association)
    }

    async fn setup(&self) -> Result<()> {
        let mut request = Message::new(MessageType::AssociationSetupRequest);
        request.push(&self.shared.node_id)?;
        request.push(&self.shared.recovery)?;
        request.ies.push(RawIe::new(types::CP_FUNCTION_FEATURES, vec![0x00]));

        let response = self.shared.transactor.send(request).await?;
        response.ensure_accepted()
    }

    /// Session lifecycle operations over this association
    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.shared.clone())
    }

    /// Local socket address
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Peer address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Node ID advertised to the peer
    pub fn node_id(&self) -> &NodeId {
        &self.shared.node_id
    }

    /// Recovery Time Stamp fixed when the association was opened
    pub fn recovery_time_stamp(&self) -> RecoveryTimeStamp {
        self.shared.recovery
    }

    /// Sends an arbitrary request and waits for its correlated response.
    pub async fn request(&self, message: Message) -> Result<Message> {
        self.shared.transactor.send(message).await
    }

    /// Number of requests awaiting a response
    pub async fn pending_requests(&self) -> usize {
        self.shared.transactor.in_flight().await
    }

    /// Deletes every session, releases the association and stops all tasks.
    ///
    /// Teardown sends are best-effort: failures are logged and the socket is
    /// released regardless.
    pub async fn close(self) {
        let sessions = self.shared.sessions.write().await.drain();
        for info in sessions {
            let request = Message::with_seid(MessageType::SessionDeletionRequest, info.peer_seid);
            match self.shared.transactor.send(request).await {
                Ok(response) => {
                    if let Err(e) = response.ensure_accepted() {
                        warn!(
                            "Session {} deletion on close: {}",
                            session::format_context_id(info.id),
                            e
                        );
                    }
                }
                Err(e) => warn!(
                    "Session {} deletion on close failed: {}",
                    session::format_context_id(info.id),
                    e
                ),
            }
        }

        let mut release = Message::new(MessageType::AssociationReleaseRequest);
        let released = match release.push(&self.shared.node_id) {
            Ok(()) => self.shared.transactor.send(release).await,
            Err(e) => Err(e),
        };
        if let Err(e) = released.and_then(|response| response.ensure_accepted()) {
            warn!("Association Release with {} failed: {}", self.remote_addr, e);
        }

        self.stop_tasks().await;
        info!("PFCP association with {} closed", self.remote_addr);
    }

    async fn stop_tasks(&self) {
        self.shared.transactor.shut_down().await;
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                warn!("PFCP task ended abnormally: {}", e);
            }
        }
    }
}

impl Shared {
    /// Handles one inbound datagram. Errors concern this datagram only.
    async fn handle_datagram(&self, data: &[u8]) -> Result<()> {
        let message = Message::decode(data)?;
        if !message.message_type.is_accepted_inbound() {
            return Err(PfcpError::InvalidMessageType(message.message_type as u8));
        }
        log_pfcp_message(Direction::Rx, message.message_type.name(), data);

        match message.message_type {
            MessageType::HeartbeatRequest => {
                let mut response = Message::response_to(&message, MessageType::HeartbeatResponse);
                response.push(&self.recovery)?;
                self.transactor.reply(&response).await
            }
            MessageType::NodeReportRequest => {
                info!("Node Report Request (seq={}) accepted", message.sequence);
                Ok(())
            }
            MessageType::SessionReportRequest => session::handle_report(self, &message).await,
            _ => {
                self.transactor.deliver(message).await;
                Ok(())
            }
        }
    }

    async fn send_heartbeat(&self) -> Result<()> {
        let mut request = Message::new(MessageType::HeartbeatRequest);
        request.push(&self.recovery)?;
        let response = self.transactor.send(request).await?;
        if let Some(ie) = response.find(types::RECOVERY_TIME_STAMP) {
            let peer: RecoveryTimeStamp = ie.decode()?;
            debug!("Heartbeat answered, peer recovery {}", peer.0);
        }
        Ok(())
    }
}

async fn receive_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = shared.transactor.socket().recv(&mut buf) => match result {
                Ok(n) => {
                    if let Err(e) = shared.handle_datagram(&buf[..n]).await {
                        warn!("Dropped PFCP datagram: {}", e);
                    }
                }
                Err(e) => {
                    error!("PFCP socket read failed, receive task stopping: {}", e);
                    break;
                }
            },
        }
    }
    // nothing can answer pending requests any more
    shared.transactor.shut_down().await;
    debug!("PFCP receive task stopped");
}

async fn heartbeat_loop(shared: Arc<Shared>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if let Err(e) = shared.send_heartbeat().await {
                    warn!("Heartbeat failed, heartbeat task stopping: {}", e);
                    break;
                }
            }
        }
    }
    debug!("PFCP heartbeat task stopped");
}
