//! UDP Transport
//!
//! Endpoints over `std::net::UdpSocket`.
//!
//! A socket bound to the IPv6 wildcard also serves IPv4 peers: outgoing IPv4
//! targets are sent as IPv4-mapped addresses and incoming mapped addresses
//! are reported in their canonical IPv4 form.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV6, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::endpoint::Endpoint;
use super::link::Link;
use super::{Transport, TransportContext, TransportLimits};
use crate::error::{HostError, Result};

/// Transport over real UDP sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl UdpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for UdpTransport {
    fn create_context(
        &self,
        address: Option<SocketAddr>,
        limits: &TransportLimits,
    ) -> Result<Box<dyn TransportContext>> {
        let link = UdpLink::bind(address)
            .map_err(|e| HostError::Transport(format!("failed to bind UDP socket: {}", e)))?;
        Ok(Box::new(Endpoint::new(link, limits.clone())))
    }

    fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        (host, port)
            .to_socket_addrs()
            .map_err(|e| HostError::Resolve(format!("{}: {}", host, e)))?
            .next()
            .ok_or_else(|| HostError::Resolve(format!("{}: no addresses found", host)))
    }
}

/// A UDP socket as a datagram link
pub struct UdpLink {
    socket: UdpSocket,

    /// Socket family; IPv4 targets are mapped when true
    ipv6: bool,

    /// Blocking mode currently set on the socket
    nonblocking: bool,
}

impl UdpLink {
    /// Bind a socket
    ///
    /// `None` binds an ephemeral IPv4 port. The IPv6 wildcard falls back to
    /// the IPv4 wildcard when the platform has no IPv6 support.
    pub fn bind(address: Option<SocketAddr>) -> io::Result<Self> {
        let socket = match address {
            None => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
            Some(addr) if addr.is_ipv6() && addr.ip().is_unspecified() => {
                match UdpSocket::bind(addr) {
                    Ok(socket) => socket,
                    Err(e) if e.kind() == io::ErrorKind::AddrInUse => return Err(e),
                    Err(e) => {
                        tracing::debug!("IPv6 wildcard bind failed ({}), using IPv4", e);
                        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, addr.port()))?
                    }
                }
            }
            Some(addr) => UdpSocket::bind(addr)?,
        };

        let ipv6 = socket.local_addr()?.is_ipv6();
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            ipv6,
            nonblocking: true,
        })
    }

    fn set_mode(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match timeout {
            None => {
                if !self.nonblocking {
                    self.socket.set_nonblocking(true)?;
                    self.nonblocking = true;
                }
            }
            Some(timeout) => {
                if self.nonblocking {
                    self.socket.set_nonblocking(false)?;
                    self.nonblocking = false;
                }
                // A zero read timeout is rejected by the OS
                let timeout = timeout.max(Duration::from_millis(1));
                self.socket.set_read_timeout(Some(timeout))?;
            }
        }
        Ok(())
    }

    fn map_target(&self, target: SocketAddr) -> SocketAddr {
        match (self.ipv6, target) {
            (true, SocketAddr::V4(v4)) => {
                SocketAddr::V6(SocketAddrV6::new(v4.ip().to_ipv6_mapped(), v4.port(), 0, 0))
            }
            (false, SocketAddr::V6(v6)) => match v6.ip().to_ipv4_mapped() {
                Some(v4) => SocketAddr::new(IpAddr::V4(v4), v6.port()),
                None => target,
            },
            _ => target,
        }
    }
}

impl Link for UdpLink {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()> {
        let target = self.map_target(target);
        self.socket.send_to(datagram, target)?;
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        self.set_mode(timeout)?;

        match self.socket.recv_from(buf) {
            Ok((len, from)) => {
                let from = SocketAddr::new(from.ip().to_canonical(), from.port());
                Ok(Some((len, from)))
            }
            Err(e) => match e.kind() {
                io::ErrorKind::WouldBlock
                | io::ErrorKind::TimedOut
                | io::ErrorKind::Interrupted
                // ICMP port-unreachable from an earlier send surfaces here
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset => Ok(None),
                _ => Err(e),
            },
        }
    }
}
