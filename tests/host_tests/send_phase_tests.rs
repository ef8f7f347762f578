//! Tests for the worker loop against a recording transport
//!
//! These tests verify:
//! - Outbound messages reach the transport in FIFO order
//! - Delivery modes map onto transport flags
//! - Transport events are translated and queued in order
//! - Send and service failures do not stop the worker
//! - unbind flushes and destroys the context

#[path = "../common/mod.rs"]
mod common;

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use nethost::{
    DeliveryMode, EventKind, Host, HostConfig, HostError, Packet, PacketFlags, PeerInfo, PeerSlot,
    PeerState, Result, Transport, TransportContext, TransportEvent, TransportLimits,
};

use common::*;

// =============================================================================
// Recording Transport
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    target: Option<usize>,
    channel: u8,
    payload: Vec<u8>,
    flags: PacketFlags,
}

enum Scripted {
    Event(TransportEvent),
    Error,
}

#[derive(Default)]
struct Recording {
    sent: Vec<Sent>,
    script: VecDeque<Scripted>,
    flushes: usize,
    contexts_dropped: usize,
    /// Slots whose sends fail
    failing: Vec<usize>,
}

#[derive(Clone, Default)]
struct RecordingTransport {
    recording: Arc<Mutex<Recording>>,
}

struct RecordingContext {
    recording: Arc<Mutex<Recording>>,
}

const CAPACITY: usize = 4;

impl Transport for RecordingTransport {
    fn create_context(
        &self,
        _address: Option<SocketAddr>,
        _limits: &TransportLimits,
    ) -> Result<Box<dyn TransportContext>> {
        Ok(Box::new(RecordingContext {
            recording: Arc::clone(&self.recording),
        }))
    }

    fn resolve(&self, _host: &str, port: u16) -> Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }
}

impl TransportContext for RecordingContext {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, 1)))
    }

    fn peer_capacity(&self) -> usize {
        CAPACITY
    }

    fn peer_info(&self, index: usize) -> Option<PeerInfo> {
        (index < CAPACITY).then(|| PeerInfo {
            slot: PeerSlot {
                index,
                generation: 0,
            },
            state: PeerState::Connected,
            address: None,
            round_trip_time: Duration::ZERO,
            channel_count: 8,
        })
    }

    fn connect(&mut self, _address: SocketAddr, _data: u32) -> Result<PeerSlot> {
        Ok(PeerSlot {
            index: 0,
            generation: 0,
        })
    }

    fn send(&mut self, peer: PeerSlot, channel: u8, packet: Packet) -> Result<()> {
        let mut recording = self.recording.lock();
        if recording.failing.contains(&peer.index) {
            return Err(HostError::StalePeer { slot: peer.index });
        }
        recording.sent.push(Sent {
            target: Some(peer.index),
            channel,
            payload: packet.data().to_vec(),
            flags: packet.flags(),
        });
        Ok(())
    }

    fn broadcast(&mut self, channel: u8, packet: Packet) {
        self.recording.lock().sent.push(Sent {
            target: None,
            channel,
            payload: packet.data().to_vec(),
            flags: packet.flags(),
        });
    }

    fn disconnect(&mut self, _peer: PeerSlot, _data: u32) -> Result<()> {
        Ok(())
    }

    fn disconnect_now(&mut self, _peer: PeerSlot, _data: u32) -> Result<()> {
        Ok(())
    }

    fn reset_peer(&mut self, _peer: PeerSlot) -> Result<()> {
        Ok(())
    }

    fn service(&mut self, timeout: Duration) -> Result<Option<TransportEvent>> {
        let next = self.recording.lock().script.pop_front();
        match next {
            Some(Scripted::Event(event)) => Ok(Some(event)),
            Some(Scripted::Error) => Err(HostError::Transport("scripted failure".to_string())),
            None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn check_events(&mut self) -> Option<TransportEvent> {
        let mut recording = self.recording.lock();
        match recording.script.front() {
            Some(Scripted::Event(_)) => match recording.script.pop_front() {
                Some(Scripted::Event(event)) => Some(event),
                _ => None,
            },
            _ => None,
        }
    }

    fn flush(&mut self) {
        self.recording.lock().flushes += 1;
    }
}

impl Drop for RecordingContext {
    fn drop(&mut self) {
        self.recording.lock().contexts_dropped += 1;
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn recording_host() -> (Host, RecordingTransport) {
    init();
    let transport = RecordingTransport::default();
    let config = HostConfig::builder().max_channels(4).build();
    let host = Host::with_transport(config, transport.clone());
    host.bind(None).unwrap();
    (host, transport)
}

fn wait_for_sent(transport: &RecordingTransport, count: usize) -> Vec<Sent> {
    let deadline = Instant::now() + PATIENCE;
    loop {
        let sent = transport.recording.lock().sent.clone();
        if sent.len() >= count || Instant::now() >= deadline {
            return sent;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn slot(index: usize) -> PeerSlot {
    PeerSlot {
        index,
        generation: 0,
    }
}

fn script(transport: &RecordingTransport, items: Vec<Scripted>) {
    transport.recording.lock().script.extend(items);
}

// =============================================================================
// Send Phase Tests
// =============================================================================

#[test]
fn test_outbound_messages_keep_fifo_order() {
    let (host, transport) = recording_host();
    let peer = host.get_peer(2).unwrap();

    for i in 0u8..20 {
        if i % 2 == 0 {
            host.broadcast(vec![i], 0, DeliveryMode::Reliable).unwrap();
        } else {
            host.send_to(&peer, vec![i], 1, DeliveryMode::Reliable).unwrap();
        }
    }

    let sent = wait_for_sent(&transport, 20);
    let payloads: Vec<u8> = sent.iter().map(|s| s.payload[0]).collect();
    assert_eq!(payloads, (0u8..20).collect::<Vec<_>>());

    for s in &sent {
        if s.payload[0] % 2 == 0 {
            assert_eq!((s.target, s.channel), (None, 0));
        } else {
            assert_eq!((s.target, s.channel), (Some(2), 1));
        }
    }
}

#[test]
fn test_delivery_modes_map_to_flags() {
    let (host, transport) = recording_host();

    host.broadcast(&b"u"[..], 0, DeliveryMode::Unsequenced).unwrap();
    host.broadcast(&b"r"[..], 0, DeliveryMode::Reliable).unwrap();
    host.broadcast(&b"s"[..], 0, DeliveryMode::Sequenced).unwrap();

    let sent = wait_for_sent(&transport, 3);
    let flags: Vec<PacketFlags> = sent.iter().map(|s| s.flags).collect();
    assert_eq!(
        flags,
        vec![PacketFlags::UNSEQUENCED, PacketFlags::RELIABLE, PacketFlags::NONE]
    );
}

#[test]
fn test_failed_send_does_not_block_later_messages() {
    let (host, transport) = recording_host();
    transport.recording.lock().failing.push(1);

    let failing = host.get_peer(1).unwrap();
    let working = host.get_peer(3).unwrap();
    host.send_to(&failing, &b"lost"[..], 0, DeliveryMode::Reliable).unwrap();
    host.send_to(&working, &b"kept"[..], 0, DeliveryMode::Reliable).unwrap();

    let sent = wait_for_sent(&transport, 1);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload, b"kept");
}

// =============================================================================
// Poll Phase Tests
// =============================================================================

#[test]
fn test_events_are_translated_in_order() {
    let (host, transport) = recording_host();

    let packet = |bytes: &'static [u8]| Packet::new(bytes, PacketFlags::RELIABLE).unwrap();
    script(
        &transport,
        vec![
            Scripted::Event(TransportEvent::Connect {
                peer: slot(1),
                data: 11,
            }),
            Scripted::Event(TransportEvent::Receive {
                peer: slot(1),
                channel: 3,
                packet: packet(b"one"),
            }),
            Scripted::Event(TransportEvent::Receive {
                peer: slot(1),
                channel: 3,
                packet: packet(b"two"),
            }),
            Scripted::Event(TransportEvent::Disconnect {
                peer: slot(1),
                data: 22,
            }),
        ],
    );

    let mut events = Vec::new();
    let deadline = Instant::now() + PATIENCE;
    while events.len() < 4 && Instant::now() < deadline {
        match host.pop_event() {
            Some(event) => events.push(event),
            None => thread::sleep(Duration::from_millis(1)),
        }
    }

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Connect,
            EventKind::Receive,
            EventKind::Receive,
            EventKind::Disconnect
        ]
    );
    assert_eq!(events[0].data(), Some(11));
    assert_eq!(events[1].payload(), b"one");
    assert_eq!(events[2].payload(), b"two");
    assert_eq!(events[2].channel_id(), Some(3));
    assert_eq!(events[3].data(), Some(22));
    assert!(events.iter().all(|e| e.peer().id() == 1));
    assert!(events.windows(2).all(|w| w[0].time() <= w[1].time()));
}

#[test]
fn test_service_error_does_not_stop_worker() {
    let (host, transport) = recording_host();
    script(
        &transport,
        vec![
            Scripted::Error,
            Scripted::Event(TransportEvent::Connect {
                peer: slot(0),
                data: 1,
            }),
        ],
    );

    let event = wait_for_kind(&host, EventKind::Connect);
    assert_eq!(event.data(), Some(1));
    assert!(host.is_bound());
}

// =============================================================================
// Unbind Tests
// =============================================================================

#[test]
fn test_unbind_flushes_and_destroys_context() {
    let (host, transport) = recording_host();

    host.unbind();

    let recording = transport.recording.lock();
    assert_eq!(recording.flushes, 1);
    assert_eq!(recording.contexts_dropped, 1);
}

#[test]
fn test_messages_after_unbind_are_rejected() {
    let (host, transport) = recording_host();
    host.unbind();

    let result = host.broadcast(&b"late"[..], 0, DeliveryMode::Reliable);
    assert!(matches!(result, Err(HostError::NotBound)));
    assert!(transport.recording.lock().sent.is_empty());
}
