//! Channel-backed devices for tests and simulations

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::device::{closed_error, wait_closed, Device, DeviceOpener};

/// Channel-backed device. Packets injected through its [`MemoryPort`] are
/// read by the engine; packets the engine writes show up on the port.
pub struct MemoryDevice {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: watch::Sender<bool>,
}

/// Host side of a [`MemoryDevice`].
pub struct MemoryPort {
    inject: mpsc::UnboundedSender<Vec<u8>>,
    written: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Receiver<bool>,
}

impl MemoryDevice {
    /// Creates a device and its host-side port.
    pub fn pair() -> (Arc<Self>, Arc<MemoryPort>) {
        let (inject, inbound) = mpsc::unbounded_channel();
        let (outbound, written) = mpsc::unbounded_channel();
        let (closed, closed_rx) = watch::channel(false);
        let device = Arc::new(Self {
            inbound: Mutex::new(inbound),
            outbound,
            closed,
        });
        let port = Arc::new(MemoryPort {
            inject,
            written: Mutex::new(written),
            closed: closed_rx,
        });
        (device, port)
    }
}

#[async_trait]
impl Device for MemoryDevice {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(0);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            packet = inbound.recv() => match packet {
                Some(packet) => {
                    let n = packet.len().min(buf.len());
                    buf[..n].copy_from_slice(&packet[..n]);
                    Ok(n)
                }
                None => Ok(0),
            },
            _ = wait_closed(closed) => Ok(0),
        }
    }

    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        if *self.closed.borrow() {
            return Err(closed_error());
        }
        self.outbound
            .send(packet.to_vec())
            .map_err(|_| closed_error())?;
        Ok(packet.len())
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

impl MemoryPort {
    /// Queues a packet for the engine to read, as if the host sent it.
    pub fn inject(&self, packet: impl Into<Vec<u8>>) -> bool {
        self.inject.send(packet.into()).is_ok()
    }

    /// Waits for the next packet the engine wrote to the device.
    pub async fn next_written(&self) -> Option<Vec<u8>> {
        self.written.lock().await.recv().await
    }

    /// Returns a written packet if one is already queued.
    pub async fn try_next_written(&self) -> Option<Vec<u8>> {
        self.written.lock().await.try_recv().ok()
    }

    /// Whether the engine closed the device
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Hands out [`MemoryDevice`]s by name and keeps their ports reachable.
#[derive(Default)]
pub struct MemoryOpener {
    ports: Mutex<HashMap<String, Arc<MemoryPort>>>,
    refused: Mutex<Vec<String>>,
}

impl MemoryOpener {
    /// Creates an opener with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `open(name)` fail.
    pub async fn refuse(&self, name: &str) {
        self.refused.lock().await.push(name.to_string());
    }

    /// Host side of the most recently opened device called `name`.
    pub async fn port(&self, name: &str) -> Option<Arc<MemoryPort>> {
        self.ports.lock().await.get(name).cloned()
    }
}

#[async_trait]
impl DeviceOpener for MemoryOpener {
    async fn open(&self, name: &str) -> io::Result<Arc<dyn Device>> {
        if self.refused.lock().await.iter().any(|n| n == name) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("device {name} refused"),
            ));
        }
        let (device, port) = MemoryDevice::pair();
        self.ports.lock().await.insert(name.to_string(), port);
        Ok(device)
    }
}
