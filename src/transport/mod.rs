//! Transport Module
//!
//! The service the host drives from its worker thread: contexts bound to a
//! local address, a table of peer slots, packets and typed events.
//!
//! ## Contract
//! - `Transport::create_context` binds a context (destroyed on drop)
//! - `TransportContext::service` blocks up to a timeout for one event
//! - `TransportContext::check_events` hands out already-queued events only
//! - `send` / `broadcast` queue packets; `flush` and `service` put them on the wire
//!
//! ## Bundled Implementations
//! Both share one endpoint (handshake, sequencing, ack/resend, timeouts)
//! over a different datagram [`Link`](link::Link):
//! - [`UdpTransport`] - real UDP sockets
//! - [`MemoryTransport`] - in-process network for tests and simulations

pub(crate) mod codec;
mod endpoint;
pub mod link;
mod memory;
mod udp;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use udp::UdpTransport;

use std::fmt;
use std::net::SocketAddr;
use std::ops::BitOr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{HostError, Result};

/// Largest payload a single packet may carry
pub const MAX_PACKET_SIZE: usize = 60_000;

// =============================================================================
// Packets
// =============================================================================

/// Delivery flags attached to a packet
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// Unreliable, sequenced (stale packets are dropped by the receiver)
    pub const NONE: Self = Self(0);

    /// Acknowledged, resent until delivered, delivered in order
    pub const RELIABLE: Self = Self(0b01);

    /// Unreliable, delivered in whatever order it arrives
    pub const UNSEQUENCED: Self = Self(0b10);

    const ALL: u8 = 0b11;

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Rebuild flags from raw bits, rejecting unknown bits
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(Self(bits))
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_reliable(self) -> bool {
        self.contains(Self::RELIABLE)
    }

    pub fn is_unsequenced(self) -> bool {
        self.contains(Self::UNSEQUENCED)
    }
}

impl BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_reliable(), self.is_unsequenced()) {
            (false, false) => write!(f, "PacketFlags(SEQUENCED)"),
            (true, false) => write!(f, "PacketFlags(RELIABLE)"),
            (false, true) => write!(f, "PacketFlags(UNSEQUENCED)"),
            (true, true) => write!(f, "PacketFlags(RELIABLE | UNSEQUENCED)"),
        }
    }
}

/// A payload ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Bytes,
    flags: PacketFlags,
}

impl Packet {
    /// Build a packet, failing if the payload exceeds [`MAX_PACKET_SIZE`]
    pub fn new(data: impl Into<Bytes>, flags: PacketFlags) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_PACKET_SIZE {
            return Err(HostError::Packet(format!(
                "payload of {} bytes exceeds limit of {}",
                data.len(),
                MAX_PACKET_SIZE
            )));
        }
        Ok(Self { data, flags })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_data(self) -> Bytes {
        self.data
    }
}

// =============================================================================
// Peers and Events
// =============================================================================

/// Identity of one connection: slot index plus the slot's generation
///
/// The generation changes every time a slot is reset, so a stale `PeerSlot`
/// never matches the connection that later reuses the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerSlot {
    pub index: usize,
    pub generation: u32,
}

/// Connection state of a peer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Slot is free
    Disconnected,
    /// Handshake sent, waiting for the remote to answer
    Connecting,
    /// Handshake complete
    Connected,
}

/// Snapshot of a peer slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub slot: PeerSlot,
    pub state: PeerState,
    pub address: Option<SocketAddr>,
    pub round_trip_time: Duration,
    pub channel_count: usize,
}

/// Event produced by a transport context
#[derive(Debug)]
pub enum TransportEvent {
    /// A connection completed its handshake
    Connect { peer: PeerSlot, data: u32 },

    /// A packet arrived on a channel
    Receive {
        peer: PeerSlot,
        channel: u8,
        packet: Packet,
    },

    /// A connection ended (remote request, local request or timeout)
    Disconnect { peer: PeerSlot, data: u32 },
}

impl TransportEvent {
    pub fn peer(&self) -> PeerSlot {
        match self {
            TransportEvent::Connect { peer, .. }
            | TransportEvent::Receive { peer, .. }
            | TransportEvent::Disconnect { peer, .. } => *peer,
        }
    }
}

// =============================================================================
// Transport Traits
// =============================================================================

/// Capacity and bandwidth settings for a new context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLimits {
    pub max_peers: usize,
    pub max_channels: usize,
    /// Incoming bytes/second advertised to remotes (0 = unlimited)
    pub bandwidth_in: u32,
    /// Outgoing bytes/second cap (0 = unlimited)
    pub bandwidth_out: u32,
}

/// Factory for transport contexts plus address resolution
pub trait Transport: Send + Sync {
    /// Create a context on `address`, or on an ephemeral address when `None`
    fn create_context(
        &self,
        address: Option<SocketAddr>,
        limits: &TransportLimits,
    ) -> Result<Box<dyn TransportContext>>;

    /// Resolve a host string to a socket address
    fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr>;
}

/// A bound transport instance owning a peer table
///
/// Dropping the context destroys it without notifying remotes.
pub trait TransportContext: Send {
    /// Address the context is bound to
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Number of slots in the peer table
    fn peer_capacity(&self) -> usize;

    /// Snapshot of a slot, `None` when the index is out of range
    fn peer_info(&self, index: usize) -> Option<PeerInfo>;

    /// Start a connection attempt, returning the allocated slot
    fn connect(&mut self, address: SocketAddr, data: u32) -> Result<PeerSlot>;

    /// Queue a packet for one peer
    fn send(&mut self, peer: PeerSlot, channel: u8, packet: Packet) -> Result<()>;

    /// Queue a packet for every connected peer
    fn broadcast(&mut self, channel: u8, packet: Packet);

    /// Notify the remote, free the slot and report a local disconnect event
    fn disconnect(&mut self, peer: PeerSlot, data: u32) -> Result<()>;

    /// Notify the remote and free the slot without a local event
    fn disconnect_now(&mut self, peer: PeerSlot, data: u32) -> Result<()>;

    /// Free the slot silently
    fn reset_peer(&mut self, peer: PeerSlot) -> Result<()>;

    /// Send queued traffic and wait up to `timeout` for one event
    fn service(&mut self, timeout: Duration) -> Result<Option<TransportEvent>>;

    /// Return an already-queued event without touching the network
    fn check_events(&mut self) -> Option<TransportEvent>;

    /// Put all queued outgoing traffic on the wire
    fn flush(&mut self);
}
