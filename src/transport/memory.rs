//! Memory Transport
//!
//! An in-process datagram network. Every context registers a port on a
//! shared [`MemoryNetwork`]; datagrams travel over crossbeam channels. The
//! network can drop a fixed share of datagrams to exercise resends.
//!
//! All contexts live on `127.0.0.1`; only the port of a target is used for
//! routing.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use super::endpoint::Endpoint;
use super::link::Link;
use super::{Transport, TransportContext, TransportLimits};
use crate::error::{HostError, Result};

/// First port handed out for ephemeral binds
const EPHEMERAL_BASE: u16 = 49152;

type Frame = (Vec<u8>, SocketAddr);

/// Shared routing table of an in-process network
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

#[derive(Default)]
struct NetworkInner {
    ports: Mutex<HashMap<u16, Sender<Frame>>>,

    /// Drop every Nth datagram (0 = lossless)
    drop_every: AtomicU64,

    /// Datagrams routed so far
    routed: AtomicU64,
}

impl MemoryNetwork {
    /// Create a lossless network
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every `n`th datagram routed from now on (0 disables loss)
    pub fn set_drop_every(&self, n: u64) {
        self.inner.drop_every.store(n, Ordering::Relaxed);
    }

    /// Number of datagrams routed, dropped ones included
    pub fn routed(&self) -> u64 {
        self.inner.routed.load(Ordering::Relaxed)
    }

    fn register(&self, port: u16) -> io::Result<(u16, Receiver<Frame>)> {
        let mut ports = self.inner.ports.lock();

        let port = if port == 0 {
            (EPHEMERAL_BASE..=u16::MAX)
                .find(|p| !ports.contains_key(p))
                .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no free ports"))?
        } else if ports.contains_key(&port) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("port {} already bound", port),
            ));
        } else {
            port
        };

        let (tx, rx) = channel::unbounded();
        ports.insert(port, tx);
        Ok((port, rx))
    }

    fn unregister(&self, port: u16) {
        self.inner.ports.lock().remove(&port);
    }

    fn route(&self, datagram: &[u8], from: SocketAddr, target: SocketAddr) {
        let count = self.inner.routed.fetch_add(1, Ordering::Relaxed) + 1;
        let drop_every = self.inner.drop_every.load(Ordering::Relaxed);
        if drop_every > 0 && count % drop_every == 0 {
            tracing::trace!("memory network dropped datagram {} -> {}", from, target);
            return;
        }

        let ports = self.inner.ports.lock();
        if let Some(tx) = ports.get(&target.port()) {
            let _ = tx.send((datagram.to_vec(), from));
        }
    }
}

/// Transport whose contexts live on a [`MemoryNetwork`]
#[derive(Clone)]
pub struct MemoryTransport {
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn new(network: &MemoryNetwork) -> Self {
        Self {
            network: network.clone(),
        }
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn create_context(
        &self,
        address: Option<SocketAddr>,
        limits: &TransportLimits,
    ) -> Result<Box<dyn TransportContext>> {
        let port = address.map(|a| a.port()).unwrap_or(0);
        let link = MemoryLink::bind(&self.network, port)
            .map_err(|e| HostError::Transport(format!("failed to bind memory port: {}", e)))?;
        Ok(Box::new(Endpoint::new(link, limits.clone())))
    }

    fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr> {
        if host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
        }
        host.parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, port))
            .map_err(|_| HostError::Resolve(format!("{}: memory network has no DNS", host)))
    }
}

/// One bound port on a memory network
pub struct MemoryLink {
    network: MemoryNetwork,
    local: SocketAddr,
    rx: Receiver<Frame>,
}

impl MemoryLink {
    /// Register a port (0 picks a free ephemeral one)
    pub fn bind(network: &MemoryNetwork, port: u16) -> io::Result<Self> {
        let (port, rx) = network.register(port)?;
        Ok(Self {
            network: network.clone(),
            local: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            rx,
        })
    }
}

impl Link for MemoryLink {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()> {
        self.network.route(datagram, self.local, target);
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        let frame = match timeout {
            None => match self.rx.try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(None),
            },
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Ok(None)
                }
            },
        };

        let (datagram, from) = frame;
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some((len, from)))
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.network.unregister(self.local.port());
    }
}
