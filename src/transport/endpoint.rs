//! Endpoint
//!
//! The connection table and packet handling shared by the bundled
//! transports, generic over the datagram [`Link`].
//!
//! ## Connection Lifecycle
//! ```text
//!  connect()                      CONNECT
//! ┌──────────────┐  ───────────────────────────▶  ┌──────────────┐
//! │  Connecting  │                                │  Connected   │ (event)
//! └──────┬───────┘  ◀───────────────────────────  └──────────────┘
//!        │                      CONNECT_ACK
//!        ▼
//! ┌──────────────┐
//! │  Connected   │ (event)
//! └──────────────┘
//! ```
//!
//! ## Delivery
//! - Reliable: acked, resent, delivered in order per channel
//! - Sequenced: anything older than the newest delivered is dropped
//! - Unsequenced: delivered as it arrives
//!
//! Outgoing datagrams are queued and written on `service` / `flush`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::mem;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::codec::{self, Datagram, MAX_OVERHEAD};
use super::link::Link;
use super::{
    Packet, PacketFlags, PeerInfo, PeerSlot, PeerState, TransportContext, TransportEvent,
    TransportLimits, MAX_PACKET_SIZE,
};
use crate::error::{HostError, Result};

// =============================================================================
// Timing Constants
// =============================================================================

const CONNECT_RETRY: Duration = Duration::from_millis(250);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PING_INTERVAL: Duration = Duration::from_millis(500);
const PEER_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_RESEND_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_RESENDS: u32 = 16;

/// Longest single wait inside `service` before housekeeping runs again
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(10);

const BANDWIDTH_WINDOW: Duration = Duration::from_secs(1);

/// Datagrams read per non-blocking drain
const RECEIVE_BURST: usize = 256;

// =============================================================================
// Connection State
// =============================================================================

#[derive(Default)]
struct ChannelState {
    next_reliable_out: u32,
    /// Sequenced numbering starts at 1 so 0 means "nothing delivered yet"
    next_sequenced_out: u32,
    next_reliable_in: u32,
    last_sequenced_in: u32,
    /// Reliable payloads that arrived ahead of `next_reliable_in`
    held: BTreeMap<u32, Bytes>,
}

struct PendingReliable {
    channel: u8,
    sequence: u32,
    datagram: Vec<u8>,
    sent_at: Instant,
    resends: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traffic {
    Control,
    Reliable { channel: u8, sequence: u32 },
    Unreliable,
}

struct Outgoing {
    target: SocketAddr,
    /// Connection charged for the datagram; `None` is never throttled
    slot: Option<PeerSlot>,
    traffic: Traffic,
    datagram: Vec<u8>,
}

impl Outgoing {
    /// A reliable datagram of `slot` still waiting for bandwidth
    fn holds(&self, slot: PeerSlot, channel: u8, sequence: u32) -> bool {
        self.slot == Some(slot) && self.traffic == Traffic::Reliable { channel, sequence }
    }
}

struct Connection {
    generation: u32,
    state: PeerState,
    address: Option<SocketAddr>,
    channel_count: usize,
    connect_data: u32,
    remote_bandwidth_in: u32,
    channels: Vec<ChannelState>,
    pending: Vec<PendingReliable>,
    /// Packets sent while the handshake is still running
    backlog: Vec<(u8, Packet)>,
    started: Instant,
    last_attempt: Instant,
    last_recv: Instant,
    last_send: Instant,
    rtt: Duration,
    window_start: Instant,
    window_bytes: usize,
}

impl Connection {
    fn idle(generation: u32, now: Instant) -> Self {
        Self {
            generation,
            state: PeerState::Disconnected,
            address: None,
            channel_count: 0,
            connect_data: 0,
            remote_bandwidth_in: 0,
            channels: Vec::new(),
            pending: Vec::new(),
            backlog: Vec::new(),
            started: now,
            last_attempt: now,
            last_recv: now,
            last_send: now,
            rtt: Duration::ZERO,
            window_start: now,
            window_bytes: 0,
        }
    }

    fn slot(&self, index: usize) -> PeerSlot {
        PeerSlot {
            index,
            generation: self.generation,
        }
    }

    fn open(&mut self, address: SocketAddr, state: PeerState, channel_count: usize, now: Instant) {
        self.state = state;
        self.address = Some(address);
        self.channel_count = channel_count;
        self.channels = (0..channel_count).map(|_| ChannelState::default()).collect();
        self.started = now;
        self.last_attempt = now;
        self.last_recv = now;
        self.window_start = now;
    }

    fn resend_timeout(&self) -> Duration {
        (self.rtt * 2).max(MIN_RESEND_TIMEOUT)
    }

    fn record_rtt(&mut self, sample: Duration) {
        self.rtt = if self.rtt.is_zero() {
            sample
        } else {
            (self.rtt * 7 + sample) / 8
        };
    }

    /// Charge `len` bytes against the per-second budget
    ///
    /// The budget is the smaller non-zero of the local outgoing cap and the
    /// remote's advertised incoming cap. One datagram always fits an empty
    /// window.
    fn admit(&mut self, len: usize, now: Instant, local_out: u32) -> bool {
        let budget = match (local_out, self.remote_bandwidth_in) {
            (0, 0) => return true,
            (0, remote) => remote,
            (local, 0) => local,
            (local, remote) => local.min(remote),
        } as usize;

        if now.saturating_duration_since(self.window_start) >= BANDWIDTH_WINDOW {
            self.window_start = now;
            self.window_bytes = 0;
        }

        if self.window_bytes > 0 && self.window_bytes + len > budget {
            return false;
        }

        self.window_bytes += len;
        true
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// A bound transport context
pub(crate) struct Endpoint<L: Link> {
    link: L,
    limits: TransportLimits,
    peers: Vec<Connection>,
    by_address: HashMap<SocketAddr, usize>,
    events: VecDeque<TransportEvent>,
    outbox: VecDeque<Outgoing>,
    recv_buf: Vec<u8>,
}

impl<L: Link> Endpoint<L> {
    pub fn new(link: L, limits: TransportLimits) -> Self {
        let now = Instant::now();
        let peers = (0..limits.max_peers).map(|_| Connection::idle(0, now)).collect();

        Self {
            link,
            limits,
            peers,
            by_address: HashMap::new(),
            events: VecDeque::new(),
            outbox: VecDeque::new(),
            recv_buf: vec![0u8; MAX_PACKET_SIZE + MAX_OVERHEAD],
        }
    }

    fn validate(&self, peer: PeerSlot) -> Result<usize> {
        match self.peers.get(peer.index) {
            Some(conn) if conn.generation == peer.generation => Ok(peer.index),
            _ => Err(HostError::StalePeer { slot: peer.index }),
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.peers
            .iter()
            .position(|conn| conn.state == PeerState::Disconnected)
    }

    fn local_channels(&self) -> u8 {
        self.limits.max_channels.min(u8::MAX as usize) as u8
    }

    fn queue(
        &mut self,
        slot: Option<usize>,
        target: SocketAddr,
        traffic: Traffic,
        datagram: Vec<u8>,
        now: Instant,
    ) {
        let slot = slot.map(|index| {
            let conn = &mut self.peers[index];
            conn.last_send = now;
            conn.slot(index)
        });
        self.outbox.push_back(Outgoing {
            target,
            slot,
            traffic,
            datagram,
        });
    }

    /// Free a slot; the new generation invalidates outstanding handles
    ///
    /// Datagrams the connection still had queued are discarded.
    fn reset(&mut self, index: usize) {
        let conn = &mut self.peers[index];
        if let Some(address) = conn.address {
            self.by_address.remove(&address);
        }
        *conn = Connection::idle(conn.generation.wrapping_add(1), Instant::now());
        self.outbox
            .retain(|out| out.slot.map_or(true, |slot| slot.index != index));
    }

    /// End a connection and report it
    fn drop_peer(&mut self, index: usize, data: u32) {
        let peer = self.peers[index].slot(index);
        self.reset(index);
        self.events.push_back(TransportEvent::Disconnect { peer, data });
    }

    /// Queue a DISCONNECT for the remote; false if the slot held no connection
    fn notify_disconnect(&mut self, index: usize, data: u32) -> bool {
        let conn = &self.peers[index];
        let target = match (conn.state, conn.address) {
            (PeerState::Disconnected, _) | (_, None) => return false,
            (_, Some(target)) => target,
        };

        let datagram = codec::encode(&Datagram::Disconnect { data });
        self.queue(None, target, Traffic::Control, datagram, Instant::now());
        true
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    fn send_data(&mut self, index: usize, channel: u8, packet: Packet) -> Result<()> {
        let now = Instant::now();
        let conn = &mut self.peers[index];

        let target = conn.address.ok_or_else(|| {
            HostError::Transport(format!("peer slot {} has no address", index))
        })?;

        if channel as usize >= conn.channel_count {
            return Err(HostError::InvalidChannel {
                channel,
                limit: conn.channel_count,
            });
        }

        let flags = packet.flags();
        let state = &mut conn.channels[channel as usize];
        let sequence = if flags.is_reliable() {
            let sequence = state.next_reliable_out;
            state.next_reliable_out = sequence.wrapping_add(1);
            sequence
        } else if flags.is_unsequenced() {
            0
        } else {
            state.next_sequenced_out = state.next_sequenced_out.wrapping_add(1);
            state.next_sequenced_out
        };

        let datagram = codec::encode(&Datagram::Data {
            channel,
            flags,
            sequence,
            payload: packet.into_data(),
        });

        let traffic = if flags.is_reliable() {
            conn.pending.push(PendingReliable {
                channel,
                sequence,
                datagram: datagram.clone(),
                sent_at: now,
                resends: 0,
            });
            Traffic::Reliable { channel, sequence }
        } else {
            Traffic::Unreliable
        };

        self.queue(Some(index), target, traffic, datagram, now);
        Ok(())
    }

    fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }

        let now = Instant::now();
        let local_out = self.limits.bandwidth_out;
        let mut deferred = VecDeque::new();

        while let Some(out) = self.outbox.pop_front() {
            if let Some(slot) = out.slot {
                let conn = &mut self.peers[slot.index];
                if conn.generation != slot.generation {
                    tracing::trace!("discarding datagram of a closed connection in slot {}", slot.index);
                    continue;
                }

                if out.traffic != Traffic::Control
                    && !conn.admit(out.datagram.len(), now, local_out)
                {
                    if out.traffic == Traffic::Unreliable {
                        tracing::trace!("bandwidth cap dropped datagram to {}", out.target);
                    } else {
                        deferred.push_back(out);
                    }
                    continue;
                }

                // Resend timers run from the actual transmission
                if let Traffic::Reliable { channel, sequence } = out.traffic {
                    if let Some(pending) = conn
                        .pending
                        .iter_mut()
                        .find(|p| p.channel == channel && p.sequence == sequence)
                    {
                        pending.sent_at = now;
                    }
                }
            }

            if let Err(e) = self.link.send_to(&out.datagram, out.target) {
                tracing::debug!("send to {} failed: {}", out.target, e);
            }
        }

        self.outbox = deferred;
    }

    // -------------------------------------------------------------------------
    // Receiving
    // -------------------------------------------------------------------------

    fn receive_ready(&mut self) -> Result<()> {
        for _ in 0..RECEIVE_BURST {
            match self.link.recv_from(&mut self.recv_buf, None)? {
                Some((len, from)) => self.receive(len, from),
                None => break,
            }
        }
        Ok(())
    }

    fn receive(&mut self, len: usize, from: SocketAddr) {
        let datagram = match codec::decode(&self.recv_buf[..len]) {
            Ok(datagram) => datagram,
            Err(e) => {
                tracing::trace!("dropping datagram from {}: {}", from, e);
                return;
            }
        };

        let now = Instant::now();

        if let Datagram::Connect {
            channels,
            bandwidth_in,
            data,
        } = datagram
        {
            self.accept(from, channels, bandwidth_in, data, now);
            return;
        }

        let Some(&index) = self.by_address.get(&from) else {
            tracing::trace!("datagram from unknown address {}", from);
            return;
        };
        self.peers[index].last_recv = now;

        match datagram {
            Datagram::ConnectAck {
                channels,
                bandwidth_in,
            } => self.complete_handshake(index, channels, bandwidth_in, now),
            Datagram::Disconnect { data } => {
                tracing::debug!("peer {} in slot {} disconnected", from, index);
                self.drop_peer(index, data);
            }
            Datagram::Data {
                channel,
                flags,
                sequence,
                payload,
            } => self.deliver(index, channel, flags, sequence, payload, now),
            Datagram::Ack { channel, sequence } => self.acknowledge(index, channel, sequence, now),
            Datagram::Ping | Datagram::Connect { .. } => {}
        }
    }

    fn accept(&mut self, from: SocketAddr, channels: u8, bandwidth_in: u32, data: u32, now: Instant) {
        if let Some(&index) = self.by_address.get(&from) {
            let conn = &mut self.peers[index];
            conn.last_recv = now;
            // Retransmitted CONNECT: our ack was lost
            if conn.state == PeerState::Connected {
                let ack = codec::encode(&Datagram::ConnectAck {
                    channels: conn.channel_count as u8,
                    bandwidth_in: self.limits.bandwidth_in,
                });
                self.queue(Some(index), from, Traffic::Control, ack, now);
            }
            return;
        }

        let Some(index) = self.free_slot() else {
            tracing::debug!("refusing connection from {}: peer table full", from);
            let refusal = codec::encode(&Datagram::Disconnect { data: 0 });
            self.queue(None, from, Traffic::Control, refusal, now);
            return;
        };

        let channel_count = (channels as usize).min(self.limits.max_channels).max(1);
        let conn = &mut self.peers[index];
        conn.open(from, PeerState::Connected, channel_count, now);
        conn.connect_data = data;
        conn.remote_bandwidth_in = bandwidth_in;
        let peer = conn.slot(index);
        self.by_address.insert(from, index);

        let ack = codec::encode(&Datagram::ConnectAck {
            channels: channel_count as u8,
            bandwidth_in: self.limits.bandwidth_in,
        });
        self.queue(Some(index), from, Traffic::Control, ack, now);

        tracing::debug!("accepted {} into slot {}", from, index);
        self.events.push_back(TransportEvent::Connect { peer, data });
    }

    fn complete_handshake(&mut self, index: usize, channels: u8, bandwidth_in: u32, now: Instant) {
        let conn = &mut self.peers[index];
        if conn.state != PeerState::Connecting {
            return;
        }

        let channel_count = (channels as usize).min(conn.channel_count).max(1);
        conn.channel_count = channel_count;
        conn.channels.truncate(channel_count);
        conn.state = PeerState::Connected;
        conn.remote_bandwidth_in = bandwidth_in;
        conn.record_rtt(now.saturating_duration_since(conn.last_attempt));

        let peer = conn.slot(index);
        let data = conn.connect_data;
        let backlog = mem::take(&mut conn.backlog);

        tracing::debug!("connection in slot {} established", index);
        self.events.push_back(TransportEvent::Connect { peer, data });

        for (channel, packet) in backlog {
            if let Err(e) = self.send_data(index, channel, packet) {
                tracing::debug!("dropping held packet for slot {}: {}", index, e);
            }
        }
    }

    fn deliver(
        &mut self,
        index: usize,
        channel: u8,
        flags: PacketFlags,
        sequence: u32,
        payload: Bytes,
        now: Instant,
    ) {
        let conn = &mut self.peers[index];
        let Some(address) = conn.address else { return };
        if conn.state != PeerState::Connected || channel as usize >= conn.channel_count {
            tracing::trace!("discarding data on channel {} from slot {}", channel, index);
            return;
        }

        let peer = conn.slot(index);
        let state = &mut conn.channels[channel as usize];

        if flags.is_reliable() {
            let mut ready = Vec::new();
            if sequence == state.next_reliable_in {
                ready.push(payload);
                state.next_reliable_in = state.next_reliable_in.wrapping_add(1);
                while let Some(next) = state.held.remove(&state.next_reliable_in) {
                    ready.push(next);
                    state.next_reliable_in = state.next_reliable_in.wrapping_add(1);
                }
            } else if sequence > state.next_reliable_in {
                state.held.entry(sequence).or_insert(payload);
            }

            // Duplicates are acked too; the first ack may have been lost
            let ack = codec::encode(&Datagram::Ack { channel, sequence });
            self.queue(Some(index), address, Traffic::Control, ack, now);

            for payload in ready {
                self.push_receive(peer, channel, flags, payload);
            }
        } else if flags.is_unsequenced() {
            self.push_receive(peer, channel, flags, payload);
        } else if sequence > state.last_sequenced_in {
            state.last_sequenced_in = sequence;
            self.push_receive(peer, channel, flags, payload);
        } else {
            tracing::trace!("stale sequenced packet {} on channel {}", sequence, channel);
        }
    }

    fn push_receive(&mut self, peer: PeerSlot, channel: u8, flags: PacketFlags, payload: Bytes) {
        match Packet::new(payload, flags) {
            Ok(packet) => self.events.push_back(TransportEvent::Receive {
                peer,
                channel,
                packet,
            }),
            Err(e) => tracing::trace!("discarding inbound packet: {}", e),
        }
    }

    fn acknowledge(&mut self, index: usize, channel: u8, sequence: u32, now: Instant) {
        let conn = &mut self.peers[index];
        let found = conn
            .pending
            .iter()
            .position(|p| p.channel == channel && p.sequence == sequence);

        if let Some(position) = found {
            let pending = conn.pending.remove(position);
            // Only first transmissions give an unambiguous sample
            if pending.resends == 0 {
                conn.record_rtt(now.saturating_duration_since(pending.sent_at));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Housekeeping
    // -------------------------------------------------------------------------

    fn update(&mut self, now: Instant) {
        for index in 0..self.peers.len() {
            match self.peers[index].state {
                PeerState::Disconnected => {}
                PeerState::Connecting => self.update_connecting(index, now),
                PeerState::Connected => self.update_connected(index, now),
            }
        }
    }

    fn update_connecting(&mut self, index: usize, now: Instant) {
        let conn = &mut self.peers[index];
        let Some(target) = conn.address else { return };

        if now.saturating_duration_since(conn.started) >= CONNECT_TIMEOUT {
            tracing::debug!("connection attempt to {} timed out", target);
            self.drop_peer(index, 0);
            return;
        }

        if now.saturating_duration_since(conn.last_attempt) >= CONNECT_RETRY {
            conn.last_attempt = now;
            let data = conn.connect_data;
            let datagram = codec::encode(&Datagram::Connect {
                channels: self.local_channels(),
                bandwidth_in: self.limits.bandwidth_in,
                data,
            });
            self.queue(Some(index), target, Traffic::Control, datagram, now);
        }
    }

    fn update_connected(&mut self, index: usize, now: Instant) {
        let conn = &mut self.peers[index];
        let Some(target) = conn.address else { return };

        if now.saturating_duration_since(conn.last_recv) >= PEER_TIMEOUT {
            tracing::debug!("peer {} in slot {} timed out", target, index);
            self.drop_peer(index, 0);
            return;
        }

        let timeout = conn.resend_timeout();
        let slot = conn.slot(index);
        let mut resends = Vec::new();
        let mut exhausted = false;

        for pending in conn.pending.iter_mut() {
            if now.saturating_duration_since(pending.sent_at) < timeout {
                continue;
            }
            // A copy is still deferred by the bandwidth cap
            if self
                .outbox
                .iter()
                .any(|out| out.holds(slot, pending.channel, pending.sequence))
            {
                continue;
            }
            if pending.resends >= MAX_RESENDS {
                exhausted = true;
                break;
            }
            pending.resends += 1;
            pending.sent_at = now;
            resends.push((pending.channel, pending.sequence, pending.datagram.clone()));
        }

        if exhausted {
            tracing::debug!("peer {} stopped acknowledging reliable packets", target);
            self.drop_peer(index, 0);
            return;
        }

        let ping_due =
            resends.is_empty() && now.saturating_duration_since(conn.last_send) >= PING_INTERVAL;

        for (channel, sequence, datagram) in resends {
            let traffic = Traffic::Reliable { channel, sequence };
            self.queue(Some(index), target, traffic, datagram, now);
        }

        if ping_due {
            let ping = codec::encode(&Datagram::Ping);
            self.queue(Some(index), target, Traffic::Control, ping, now);
        }
    }
}

impl<L: Link> TransportContext for Endpoint<L> {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.link.local_addr()?)
    }

    fn peer_capacity(&self) -> usize {
        self.peers.len()
    }

    fn peer_info(&self, index: usize) -> Option<PeerInfo> {
        self.peers.get(index).map(|conn| PeerInfo {
            slot: conn.slot(index),
            state: conn.state,
            address: conn.address,
            round_trip_time: conn.rtt,
            channel_count: conn.channel_count,
        })
    }

    fn connect(&mut self, address: SocketAddr, data: u32) -> Result<PeerSlot> {
        if self.by_address.contains_key(&address) {
            return Err(HostError::Transport(format!(
                "a connection to {} already exists",
                address
            )));
        }

        let index = self
            .free_slot()
            .ok_or_else(|| HostError::Transport("no free peer slots".to_string()))?;

        let now = Instant::now();
        let channels = self.local_channels();
        let conn = &mut self.peers[index];
        conn.open(address, PeerState::Connecting, channels as usize, now);
        conn.connect_data = data;
        let peer = conn.slot(index);
        self.by_address.insert(address, index);

        let datagram = codec::encode(&Datagram::Connect {
            channels,
            bandwidth_in: self.limits.bandwidth_in,
            data,
        });
        self.queue(Some(index), address, Traffic::Control, datagram, now);

        tracing::debug!("connecting to {} from slot {}", address, index);
        Ok(peer)
    }

    fn send(&mut self, peer: PeerSlot, channel: u8, packet: Packet) -> Result<()> {
        let index = self.validate(peer)?;
        match self.peers[index].state {
            PeerState::Connected => self.send_data(index, channel, packet),
            PeerState::Connecting => {
                self.peers[index].backlog.push((channel, packet));
                Ok(())
            }
            PeerState::Disconnected => Err(HostError::Transport(format!(
                "peer slot {} is not connected",
                index
            ))),
        }
    }

    fn broadcast(&mut self, channel: u8, packet: Packet) {
        let targets: Vec<usize> = self
            .peers
            .iter()
            .enumerate()
            .filter(|(_, conn)| {
                conn.state == PeerState::Connected && (channel as usize) < conn.channel_count
            })
            .map(|(index, _)| index)
            .collect();

        for index in targets {
            if let Err(e) = self.send_data(index, channel, packet.clone()) {
                tracing::debug!("broadcast to slot {} failed: {}", index, e);
            }
        }
    }

    fn disconnect(&mut self, peer: PeerSlot, data: u32) -> Result<()> {
        let index = self.validate(peer)?;
        if self.notify_disconnect(index, data) {
            self.drop_peer(index, data);
        }
        Ok(())
    }

    fn disconnect_now(&mut self, peer: PeerSlot, data: u32) -> Result<()> {
        let index = self.validate(peer)?;
        if self.notify_disconnect(index, data) {
            self.reset(index);
            self.flush_outbox();
        }
        Ok(())
    }

    fn reset_peer(&mut self, peer: PeerSlot) -> Result<()> {
        let index = self.validate(peer)?;
        self.reset(index);
        Ok(())
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<TransportEvent>> {
        let deadline = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            self.update(now);
            self.flush_outbox();

            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }

            if now >= deadline {
                self.receive_ready()?;
                self.flush_outbox();
                return Ok(self.events.pop_front());
            }

            let wait = (deadline - now).min(HOUSEKEEPING_INTERVAL);
            if let Some((len, from)) = self.link.recv_from(&mut self.recv_buf, Some(wait))? {
                self.receive(len, from);
            }
        }
    }

    fn check_events(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn flush(&mut self) {
        self.flush_outbox();
    }
}
