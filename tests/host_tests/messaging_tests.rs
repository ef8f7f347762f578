//! Tests for messaging between hosts
//!
//! These tests verify:
//! - Connection handshake events on both sides
//! - Reliable delivery on a chosen channel, in order, under loss
//! - Broadcast and serde-encoded payloads
//! - Disconnect flavours and stale peer handles
//!
//! All hosts run on an in-process memory network.

#[path = "../common/mod.rs"]
mod common;

use std::thread;
use std::time::Duration;

use nethost::transport::MAX_PACKET_SIZE;
use nethost::{
    runtime, DeliveryMode, EventKind, HostConfig, HostError, MemoryNetwork, PeerState,
};
use serde::{Deserialize, Serialize};

use common::*;

fn channels(count: usize) -> HostConfig {
    HostConfig::builder().max_channels(count).build()
}

// =============================================================================
// Connection Tests
// =============================================================================

#[test]
fn test_connect_produces_events_on_both_hosts() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());

    let before = runtime::ticks_msec();
    let to_server = client.connect(&address_of(&server), 1234).unwrap();

    let on_client = wait_for_kind(&client, EventKind::Connect);
    let on_server = wait_for_kind(&server, EventKind::Connect);

    assert_eq!(on_client.peer().id(), to_server.id());
    assert_eq!(on_client.data(), Some(1234));
    assert_eq!(on_server.data(), Some(1234));
    assert!(on_client.time() >= before);
    assert!(on_server.time() >= before);

    let info = to_server.info().unwrap();
    assert_eq!(info.state, PeerState::Connected);
    assert_eq!(info.address, Some(server.local_addr().unwrap()));

    let client_addr = client.local_addr().unwrap();
    assert_eq!(on_server.peer().address().unwrap(), Some(client_addr));
}

#[test]
fn test_channel_count_is_negotiated_down() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, channels(2));
    let client = bound_memory_host(&network, channels(4));

    let (to_server, to_client) = connect_pair(&client, &server, 0);
    assert_eq!(to_server.info().unwrap().channel_count, 2);
    assert_eq!(to_client.info().unwrap().channel_count, 2);
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[test]
fn test_reliable_send_on_channel_two() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, channels(3));
    let client = bound_memory_host(&network, channels(3));
    let (to_server, _) = connect_pair(&client, &server, 0);

    let payload = b"0123456789".to_vec();
    client
        .send_to(&to_server, payload.clone(), 2, DeliveryMode::Reliable)
        .unwrap();

    let received = collect_receives(&server, 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].channel_id(), Some(2));
    assert_eq!(received[0].payload(), payload.as_slice());

    // Exactly one
    assert!(wait_for(&server, Duration::from_millis(200), |e| e.kind() == EventKind::Receive).is_none());
}

#[test]
fn test_send_before_handshake_is_delivered() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());

    let to_server = client.connect(&address_of(&server), 0).unwrap();
    to_server.send(&b"early"[..], 0, DeliveryMode::Reliable).unwrap();

    let received = collect_receives(&server, 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload(), b"early");
}

#[test]
fn test_reliable_order_survives_loss() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    network.set_drop_every(3);
    for i in 0u32..40 {
        to_server
            .send(i.to_be_bytes().to_vec(), 0, DeliveryMode::Reliable)
            .unwrap();
    }

    let received = collect_receives(&server, 40);
    let order: Vec<u32> = received
        .iter()
        .map(|e| u32::from_be_bytes(e.payload().try_into().unwrap()))
        .collect();
    assert_eq!(order, (0..40).collect::<Vec<_>>());
}

#[test]
fn test_broadcast_reaches_every_peer() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let first = bound_memory_host(&network, HostConfig::default());
    let second = bound_memory_host(&network, HostConfig::default());
    connect_pair(&first, &server, 0);
    connect_pair(&second, &server, 0);

    server
        .broadcast(&b"to all"[..], 0, DeliveryMode::Reliable)
        .unwrap();

    for client in [&first, &second] {
        let received = collect_receives(client, 1);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload(), b"to all");
    }
}

#[test]
fn test_channel_beyond_config_is_rejected() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, channels(2));
    let (to_server, _) = connect_pair(&client, &server, 0);

    let result = to_server.send(&b"bad channel"[..], 7, DeliveryMode::Reliable);
    assert!(matches!(
        result,
        Err(HostError::InvalidChannel { channel: 7, limit: 2 })
    ));

    let result = client.send_to(&to_server, &b"bad channel"[..], 2, DeliveryMode::Reliable);
    assert!(matches!(
        result,
        Err(HostError::InvalidChannel { channel: 2, limit: 2 })
    ));

    let result = server.broadcast(&b"bad channel"[..], 1, DeliveryMode::Reliable);
    assert!(matches!(
        result,
        Err(HostError::InvalidChannel { channel: 1, limit: 1 })
    ));
}

#[test]
fn test_oversized_and_misrouted_messages_are_dropped() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, channels(2));
    let client = bound_memory_host(&network, channels(4));
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server
        .send(vec![0u8; MAX_PACKET_SIZE + 1], 0, DeliveryMode::Reliable)
        .unwrap();
    // Within the client's config, beyond the negotiated count
    to_server.send(&b"bad channel"[..], 3, DeliveryMode::Reliable).unwrap();
    to_server.send(&b"fine"[..], 0, DeliveryMode::Reliable).unwrap();

    let received = collect_receives(&server, 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload(), b"fine");
}

// =============================================================================
// Serialized Payload Tests
// =============================================================================

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct PlayerState {
    id: u32,
    name: String,
    position: (f32, f32),
}

#[test]
fn test_broadcast_var_round_trip() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    connect_pair(&client, &server, 0);

    let state = PlayerState {
        id: 7,
        name: "ada".to_string(),
        position: (1.5, -2.0),
    };
    server
        .broadcast_var(&state, 0, DeliveryMode::Reliable)
        .unwrap();

    let received = collect_receives(&client, 1);
    assert_eq!(received[0].decode::<PlayerState>().unwrap(), state);
}

#[test]
fn test_send_var_round_trip() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server
        .send_var(&vec![1u64, 2, 3], 0, DeliveryMode::Reliable)
        .unwrap();

    let received = collect_receives(&server, 1);
    assert_eq!(received[0].decode::<Vec<u64>>().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_empty_encoding_is_rejected() {
    init();
    let network = MemoryNetwork::new();
    let host = bound_memory_host(&network, HostConfig::default());

    let result = host.broadcast_var(&(), 0, DeliveryMode::Reliable);
    assert!(matches!(result, Err(HostError::Encode(_))));
}

// =============================================================================
// Peer Handle Tests
// =============================================================================

#[test]
fn test_send_to_foreign_peer() {
    init();
    let network = MemoryNetwork::new();
    let a = bound_memory_host(&network, HostConfig::default());
    let b = bound_memory_host(&network, HostConfig::default());

    let peer_of_b = b.get_peer(0).unwrap();
    let result = a.send_to(&peer_of_b, &b"x"[..], 0, DeliveryMode::Reliable);
    assert!(matches!(result, Err(HostError::ForeignPeer)));
}

#[test]
fn test_disconnect_makes_handle_stale() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server.disconnect(99).unwrap();

    let local = wait_for_kind(&client, EventKind::Disconnect);
    assert_eq!(local.data(), Some(99));
    let remote = wait_for_kind(&server, EventKind::Disconnect);
    assert_eq!(remote.data(), Some(99));

    assert!(matches!(to_server.info(), Err(HostError::StalePeer { .. })));
    assert!(matches!(to_server.disconnect(0), Err(HostError::StalePeer { .. })));

    // A fresh handle for the same slot sees the reset connection
    let fresh = client.get_peer(to_server.id()).unwrap();
    assert_ne!(fresh.generation(), to_server.generation());
    assert_eq!(fresh.state().unwrap(), PeerState::Disconnected);
}

#[test]
fn test_disconnect_now_skips_local_event() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server.disconnect_now(5).unwrap();

    let remote = wait_for_kind(&server, EventKind::Disconnect);
    assert_eq!(remote.data(), Some(5));
    assert!(wait_for(&client, Duration::from_millis(100), |e| e.kind() == EventKind::Disconnect).is_none());
}

#[test]
fn test_reset_is_silent() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server.reset().unwrap();
    thread::sleep(Duration::from_millis(100));

    assert!(wait_for(&client, Duration::from_millis(50), |_| true).is_none());
    assert!(wait_for(&server, Duration::from_millis(50), |e| e.kind() == EventKind::Disconnect).is_none());
    assert!(matches!(to_server.state(), Err(HostError::StalePeer { .. })));
}

#[test]
fn test_event_payloads_are_independent_copies() {
    init();
    let network = MemoryNetwork::new();
    let server = bound_memory_host(&network, HostConfig::default());
    let client = bound_memory_host(&network, HostConfig::default());
    let (to_server, _) = connect_pair(&client, &server, 0);

    to_server.send(&b"first"[..], 0, DeliveryMode::Reliable).unwrap();
    to_server.send(&b"second"[..], 0, DeliveryMode::Reliable).unwrap();

    let received = collect_receives(&server, 2);
    let first = received[0].clone().into_payload();
    drop(received[1].clone());

    assert_eq!(&first[..], b"first");
    assert_eq!(received[1].payload(), b"second");
}
