//! GTP-U tunnel engine
//!
//! A [`Handler`] owns one UDP socket and a registry of tunnels. Each tunnel
//! binds a locally allocated TEID to a remote peer and a [`Device`]. Packets
//! read from the device are encapsulated as T-PDUs towards the peer; T-PDUs
//! received for the TEID are decapsulated and written to the device.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use nextgup_common::logging::{log_gtp_message, Direction};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::codec::{GtpError, GtpHeader, GtpMessageType, MAX_QFI};
use crate::device::{Device, DeviceOpener, TunOpener};

/// GTP-U default port
pub const GTP_U_PORT: u16 = 2152;

/// Default interval between keepalive Echo Requests
pub const DEFAULT_ECHO_INTERVAL: Duration = Duration::from_secs(60);

/// Largest datagram or device packet handled
const MAX_PACKET_SIZE: usize = 65535;

/// Stored in place of a QFI when none is assigned
const QFI_UNSET: u8 = 0xff;

/// Tunnel engine errors
#[derive(Debug, Error)]
pub enum TunnelError {
    /// No tunnel with this TEID
    #[error("unknown TEID {0:#010x}")]
    UnknownTunnel(u32),
    /// T-PDU arrived from an address other than the tunnel's peer
    #[error("invalid peer for TEID {teid:#010x}: expected {expected}, got {actual}")]
    PeerMismatch {
        /// Tunnel identifier
        teid: u32,
        /// Registered peer IP
        expected: IpAddr,
        /// Sender IP
        actual: IpAddr,
    },
    /// Device could not be opened
    #[error("failed to open device {name}: {source}")]
    DeviceOpen {
        /// Requested device name
        name: String,
        /// Underlying failure
        source: std::io::Error,
    },
    /// Socket or device I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed GTP-U header
    #[error("GTP codec error: {0}")]
    Codec(#[from] GtpError),
}

/// Tunnel engine configuration
#[derive(Debug, Clone)]
pub struct GtpConfig {
    /// Local GTP-U socket address
    pub local_addr: SocketAddr,
    /// Keepalive interval
    pub echo_interval: Duration,
}

impl Default for GtpConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), GTP_U_PORT),
            echo_interval: DEFAULT_ECHO_INTERVAL,
        }
    }
}

impl GtpConfig {
    /// Configuration listening on `local_addr` with default timers
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            ..Self::default()
        }
    }

    /// Set the keepalive interval
    pub fn with_echo_interval(mut self, interval: Duration) -> Self {
        self.echo_interval = interval;
        self
    }
}

/// Snapshot of one bound tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInfo {
    /// Local TEID
    pub teid: u32,
    /// Peer address T-PDUs are sent to
    pub remote: SocketAddr,
    /// Device name given to `bind`
    pub device_name: String,
    /// QoS flow identifier stamped on uplink frames
    pub qfi: Option<u8>,
}

struct Tunnel {
    remote: SocketAddr,
    device_name: String,
    device: Arc<dyn Device>,
    qfi: Arc<AtomicU8>,
    stop_tx: watch::Sender<bool>,
    pump: JoinHandle<()>,
}

impl Tunnel {
    fn qfi(&self) -> Option<u8> {
        decode_qfi(self.qfi.load(Ordering::Relaxed))
    }

    /// Closes the device and waits for the pump to exit.
    async fn shut_down(self, teid: u32) {
        self.device.close();
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.pump.await {
            warn!("Uplink pump for TEID {:#010x} ended abnormally: {}", teid, e);
        }
    }
}

fn decode_qfi(raw: u8) -> Option<u8> {
    (raw <= MAX_QFI).then_some(raw)
}

/// TEID-keyed tunnel table
#[derive(Default)]
struct TunnelRegistry {
    tunnels: HashMap<u32, Tunnel>,
}

impl TunnelRegistry {
    fn allocate_teid(&self, next: impl FnMut() -> u32) -> u32 {
        allocate_unique(next, |teid| self.tunnels.contains_key(&teid))
    }
}

/// Draws identifiers from `next` until one is not `in_use`.
fn allocate_unique(mut next: impl FnMut() -> u32, in_use: impl Fn(u32) -> bool) -> u32 {
    loop {
        let id = next();
        if !in_use(id) {
            return id;
        }
    }
}

struct Shared {
    socket: Arc<UdpSocket>,
    tunnels: RwLock<TunnelRegistry>,
    echo_sequence: AtomicU16,
}

/// GTP-U tunnel engine
///
/// Created by [`Handler::start`]; torn down by [`Handler::close`]. Dropping a
/// handler without closing it stops its background tasks but does not wait
/// for them.
pub struct Handler {
    shared: Arc<Shared>,
    opener: Arc<dyn DeviceOpener>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Handler {
    /// Starts an engine attaching to TUN devices.
    pub async fn start(config: GtpConfig) -> Result<Self, TunnelError> {
        Self::start_with_opener(config, Arc::new(TunOpener)).await
    }

    /// Starts an engine using `opener` to attach devices.
    ///
    /// Binds the socket, then spawns the receive task and the keepalive task.
    pub async fn start_with_opener(
        config: GtpConfig,
        opener: Arc<dyn DeviceOpener>,
    ) -> Result<Self, TunnelError> {
        let socket = Arc::new(UdpSocket::bind(config.local_addr).await?);
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(Shared {
            socket,
            tunnels: RwLock::new(TunnelRegistry::default()),
            echo_sequence: AtomicU16::new(rand::random()),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let receiver = tokio::spawn(receive_loop(shared.clone(), shutdown_rx.clone()));
        let keepalive = tokio::spawn(keepalive_loop(
            shared.clone(),
            config.echo_interval,
            shutdown_rx,
        ));

        info!("GTP-U handler listening on {}", local_addr);

        Ok(Self {
            shared,
            opener,
            local_addr,
            shutdown_tx,
            tasks: Mutex::new(vec![receiver, keepalive]),
        })
    }

    /// Local socket address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Opens `device_name` and binds it to a new TEID towards `remote`.
    ///
    /// Nothing is registered if the device cannot be opened.
    pub async fn bind(&self, remote: SocketAddr, device_name: &str) -> Result<u32, TunnelError> {
        let device = self
            .opener
            .open(device_name)
            .await
            .map_err(|source| TunnelError::DeviceOpen {
                name: device_name.to_string(),
                source,
            })?;

        let mut registry = self.shared.tunnels.write().await;
        let teid = registry.allocate_teid(rand::random);

        let qfi = Arc::new(AtomicU8::new(QFI_UNSET));
        let (stop_tx, stop_rx) = watch::channel(false);
        let pump = tokio::spawn(uplink_pump(UplinkPump {
            teid,
            remote,
            device: device.clone(),
            socket: self.shared.socket.clone(),
            qfi: qfi.clone(),
            stop_rx,
        }));

        registry.tunnels.insert(
            teid,
            Tunnel {
                remote,
                device_name: device_name.to_string(),
                device,
                qfi,
                stop_tx,
                pump,
            },
        );

        info!("Bound TEID {:#010x} to {} via {}", teid, device_name, remote);
        Ok(teid)
    }

    /// Removes the tunnel, closes its device and joins its pump.
    pub async fn unbind(&self, teid: u32) -> Result<(), TunnelError> {
        let tunnel = self
            .shared
            .tunnels
            .write()
            .await
            .tunnels
            .remove(&teid)
            .ok_or(TunnelError::UnknownTunnel(teid))?;

        tunnel.shut_down(teid).await;
        info!("Unbound TEID {:#010x}", teid);
        Ok(())
    }

    /// Sets the QoS flow stamped on future uplink frames.
    ///
    /// Values above 63 clear the assignment.
    pub async fn set_flow_id(&self, teid: u32, flow: u8) -> Result<(), TunnelError> {
        let registry = self.shared.tunnels.read().await;
        let tunnel = registry
            .tunnels
            .get(&teid)
            .ok_or(TunnelError::UnknownTunnel(teid))?;

        let raw = if flow > MAX_QFI { QFI_UNSET } else { flow };
        tunnel.qfi.store(raw, Ordering::Relaxed);
        debug!("TEID {:#010x} flow set to {:?}", teid, decode_qfi(raw));
        Ok(())
    }

    /// Snapshot of the bound tunnels
    pub async fn tunnels(&self) -> Vec<TunnelInfo> {
        let registry = self.shared.tunnels.read().await;
        let mut tunnels: Vec<_> = registry
            .tunnels
            .iter()
            .map(|(teid, t)| TunnelInfo {
                teid: *teid,
                remote: t.remote,
                device_name: t.device_name.clone(),
                qfi: t.qfi(),
            })
            .collect();
        tunnels.sort_by_key(|t| t.teid);
        tunnels
    }

    /// Closes every device, stops all tasks and releases the socket.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(true);

        let drained: Vec<_> = self.shared.tunnels.write().await.tunnels.drain().collect();
        for (teid, tunnel) in drained {
            tunnel.shut_down(teid).await;
        }

        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                warn!("GTP-U task ended abnormally: {}", e);
            }
        }

        info!("GTP-U handler on {} closed", self.local_addr);
    }
}

impl Shared {
    /// Handles one inbound datagram. Errors concern this datagram only.
    async fn handle_datagram(&self, data: &[u8], src: SocketAddr) -> Result<(), TunnelError> {
        let header = GtpHeader::decode(data)?;
        log_gtp_message(Direction::Rx, header.message_type.name(), data);

        match header.message_type {
            GtpMessageType::EchoRequest => {
                let seq = header.sequence_number.unwrap_or(0);
                let response = GtpHeader::echo_response(seq).encode()?;
                self.socket.send_to(&response, src).await?;
                log_gtp_message(Direction::Tx, "Echo Response", &response);
                debug!("Sent Echo Response to {}", src);
                Ok(())
            }
            GtpMessageType::EchoResponse
            | GtpMessageType::ErrorIndication
            | GtpMessageType::SupportedExtHeadersNotification
            | GtpMessageType::EndMarker => {
                debug!("Ignoring {} from {}", header.message_type.name(), src);
                Ok(())
            }
            GtpMessageType::TPdu => self.handle_t_pdu(header, src).await,
        }
    }

    async fn handle_t_pdu(&self, header: GtpHeader, src: SocketAddr) -> Result<(), TunnelError> {
        let device = {
            let registry = self.tunnels.read().await;
            let tunnel = registry
                .tunnels
                .get(&header.teid)
                .ok_or(TunnelError::UnknownTunnel(header.teid))?;
            if tunnel.remote.ip() != src.ip() {
                return Err(TunnelError::PeerMismatch {
                    teid: header.teid,
                    expected: tunnel.remote.ip(),
                    actual: src.ip(),
                });
            }
            tunnel.device.clone()
        };

        device.send(&header.payload).await?;
        Ok(())
    }

    /// Sends one Echo Request per distinct peer IP.
    async fn send_echo_requests(&self) {
        let peers: Vec<SocketAddr> = {
            let registry = self.tunnels.read().await;
            let mut seen = HashSet::new();
            registry
                .tunnels
                .values()
                .map(|t| t.remote)
                .filter(|remote| seen.insert(remote.ip()))
                .collect()
        };

        for peer in peers {
            let seq = self.echo_sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            let request = match GtpHeader::echo_request(seq).encode() {
                Ok(request) => request,
                Err(e) => {
                    warn!("Failed to encode Echo Request: {}", e);
                    continue;
                }
            };
            match self.socket.send_to(&request, peer).await {
                Ok(_) => log_gtp_message(Direction::Tx, "Echo Request", &request),
                Err(e) => warn!("Failed to send Echo Request to {}: {}", peer, e),
            }
        }
    }
}

async fn receive_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = shared.socket.recv_from(&mut buf) => match result {
                Ok((n, src)) => {
                    if let Err(e) = shared.handle_datagram(&buf[..n], src).await {
                        warn!("Dropped GTP-U datagram from {}: {}", src, e);
                    }
                }
                Err(e) => {
                    error!("GTP-U socket read failed, receive task stopping: {}", e);
                    break;
                }
            },
        }
    }
    debug!("GTP-U receive task stopped");
}

async fn keepalive_loop(shared: Arc<Shared>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => shared.send_echo_requests().await,
        }
    }
    debug!("GTP-U keepalive task stopped");
}

struct UplinkPump {
    teid: u32,
    remote: SocketAddr,
    device: Arc<dyn Device>,
    socket: Arc<UdpSocket>,
    qfi: Arc<AtomicU8>,
    stop_rx: watch::Receiver<bool>,
}

/// Encapsulates every packet read from the device towards the peer.
async fn uplink_pump(mut pump: UplinkPump) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        let n = tokio::select! {
            _ = pump.stop_rx.changed() => break,
            result = pump.device.recv(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!("Device read failed for TEID {:#010x}: {}", pump.teid, e);
                    break;
                }
            },
        };

        let mut header = GtpHeader::t_pdu(pump.teid, Bytes::copy_from_slice(&buf[..n]));
        if let Some(qfi) = decode_qfi(pump.qfi.load(Ordering::Relaxed)) {
            header = header.with_qfi(qfi);
        }
        let frame = match header.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping uplink packet for TEID {:#010x}: {}", pump.teid, e);
                continue;
            }
        };

        match pump.socket.send_to(&frame, pump.remote).await {
            Ok(_) => log_gtp_message(Direction::Tx, "T-PDU", &frame),
            Err(e) => warn!("Failed to send T-PDU to {}: {}", pump.remote, e),
        }
    }
    debug!("Uplink pump for TEID {:#010x} stopped", pump.teid);
}
