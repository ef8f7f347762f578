//! Tests for hosts over real UDP sockets
//!
//! These tests verify:
//! - Ephemeral and wildcard binds
//! - Connection handshake over loopback
//! - Reliable delivery on a chosen channel
//! - Remote disconnect notification

#[path = "../common/mod.rs"]
mod common;

use nethost::{runtime, Address, DeliveryMode, EventKind, Host, HostConfig};

use common::*;

fn loopback_host(config: HostConfig) -> Host {
    init();
    let host = Host::new(config);
    host.bind(Some(Address::new("127.0.0.1", 0))).unwrap();
    host
}

fn loopback_address(host: &Host) -> Address {
    Address::new("127.0.0.1", host.local_addr().unwrap().port())
}

// =============================================================================
// Binding Tests
// =============================================================================

#[test]
fn test_bind_ephemeral() {
    init();
    let host = Host::new(HostConfig::default());

    host.bind(None).unwrap();
    assert_ne!(host.local_addr().unwrap().port(), 0);
}

#[test]
fn test_bind_wildcard_accepts_loopback_peers() {
    init();
    let server = Host::new(HostConfig::default());
    server.bind(Some(Address::any(0))).unwrap();
    let client = loopback_host(HostConfig::default());

    client.connect(&loopback_address(&server), 0).unwrap();

    wait_for_kind(&client, EventKind::Connect);
    wait_for_kind(&server, EventKind::Connect);
}

// =============================================================================
// Messaging Tests
// =============================================================================

#[test]
fn test_connect_over_loopback() {
    let server = loopback_host(HostConfig::default());
    let client = loopback_host(HostConfig::default());

    let before = runtime::ticks_msec();
    let to_server = client.connect(&loopback_address(&server), 42).unwrap();

    let on_client = wait_for_kind(&client, EventKind::Connect);
    let on_server = wait_for_kind(&server, EventKind::Connect);

    assert_eq!(on_client.peer(), &to_server);
    assert_eq!(on_server.data(), Some(42));
    assert!(on_client.time() >= before);
    assert!(on_server.time() >= before);
    assert_eq!(
        on_server.peer().address().unwrap(),
        Some(client.local_addr().unwrap())
    );
}

#[test]
fn test_reliable_ten_bytes_on_channel_two() {
    let config = HostConfig::builder().max_channels(3).build();
    let server = loopback_host(config.clone());
    let client = loopback_host(config);

    let to_server = client.connect(&loopback_address(&server), 0).unwrap();
    wait_for_kind(&client, EventKind::Connect);
    wait_for_kind(&server, EventKind::Connect);

    client
        .send_to(&to_server, &b"abcdefghij"[..], 2, DeliveryMode::Reliable)
        .unwrap();

    let received = collect_receives(&server, 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].channel_id(), Some(2));
    assert_eq!(received[0].payload(), b"abcdefghij");
}

#[test]
fn test_remote_sees_disconnect() {
    let server = loopback_host(HostConfig::default());
    let client = loopback_host(HostConfig::default());

    let to_server = client.connect(&loopback_address(&server), 0).unwrap();
    wait_for_kind(&client, EventKind::Connect);
    wait_for_kind(&server, EventKind::Connect);

    to_server.disconnect(3).unwrap();

    let event = wait_for_kind(&server, EventKind::Disconnect);
    assert_eq!(event.data(), Some(3));
}
