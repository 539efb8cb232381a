//! Virtual network devices bridged by the tunnel engine.
//!
//! The engine only needs to read packets from, write packets to, and close a
//! device. [`TunOpener`] attaches to Linux TUN interfaces through `tun-rs`.
//! Channel-backed devices for tests live in `memory`, behind the `test-util`
//! feature.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};
use tun_rs::AsyncDevice;

/// A packet device bound to one tunnel.
#[async_trait]
pub trait Device: Send + Sync {
    /// Reads one packet into `buf`. `Ok(0)` means the device has been closed.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one packet.
    async fn send(&self, packet: &[u8]) -> io::Result<usize>;

    /// Closes the device. Pending and future `recv` calls return `Ok(0)`.
    fn close(&self);
}

/// Opens (or attaches to) a named device.
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    /// Opens the device called `name`.
    async fn open(&self, name: &str) -> io::Result<Arc<dyn Device>>;
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "device closed")
}

/// Resolves once `closed` holds `true` or its sender is gone.
pub(crate) async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// Linux TUN interface in L3 mode.
pub struct TunDevice {
    name: String,
    device: AsyncDevice,
    closed: watch::Sender<bool>,
}

impl TunDevice {
    /// Attaches to the TUN interface `name`, creating it if needed.
    pub fn open(name: &str) -> io::Result<Self> {
        let mut config = tun_rs::Configuration::default();
        config.name(name);
        config.layer(tun_rs::Layer::L3);
        config.up();

        let device = tun_rs::create_as_async(&config)
            .map_err(|e| io::Error::other(format!("failed to open TUN device {name}: {e}")))?;
        let (closed, _) = watch::channel(false);

        info!(name = %name, "TUN device attached");

        Ok(Self {
            name: name.to_string(),
            device,
            closed,
        })
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Device for TunDevice {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(0);
        }
        tokio::select! {
            result = self.device.recv(buf) => result,
            _ = wait_closed(closed) => Ok(0),
        }
    }

    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        if *self.closed.borrow() {
            return Err(closed_error());
        }
        self.device.send(packet).await
    }

    fn close(&self) {
        self.closed.send_replace(true);
        debug!(name = %self.name, "TUN device closed");
    }
}

/// Opens Linux TUN devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct TunOpener;

#[async_trait]
impl DeviceOpener for TunOpener {
    async fn open(&self, name: &str) -> io::Result<Arc<dyn Device>> {
        Ok(Arc::new(TunDevice::open(name)?))
    }
}
