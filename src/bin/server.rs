//! nethost Echo Server
//!
//! Binds a host and echoes every received payload back to its sender on the
//! same channel.

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use nethost::{runtime, Address, DeliveryMode, EventKind, Host, HostConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Interval between event drains
const FRAME: Duration = Duration::from_millis(16);

/// nethost echo server
#[derive(Parser, Debug)]
#[command(name = "nethost-server")]
#[command(about = "Echo server over a reliable-UDP host")]
#[command(version)]
struct Args {
    /// Listen address (host:port, or :port for every interface)
    #[arg(short, long, default_value = ":7777")]
    listen: String,

    /// Peer table capacity
    #[arg(short, long, default_value = "32")]
    max_peers: usize,

    /// Channels per connection
    #[arg(short, long, default_value = "2")]
    channels: usize,

    /// Worker poll wait in milliseconds
    #[arg(short, long, default_value = "1")]
    event_wait_ms: u64,

    /// Stop after this many seconds (0 runs until killed)
    #[arg(short, long, default_value = "0")]
    duration_secs: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nethost=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("nethost server v{}", nethost::VERSION);

    if let Err(e) = runtime::initialize() {
        tracing::error!("Failed to initialize network runtime: {}", e);
        std::process::exit(1);
    }

    let listen: Address = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid listen address: {}", e);
            std::process::exit(1);
        }
    };

    // Build config from args
    let config = HostConfig::builder()
        .max_peers(args.max_peers)
        .max_channels(args.channels)
        .event_wait_ms(args.event_wait_ms)
        .build();

    let host = Host::new(config);
    if let Err(e) = host.bind(Some(listen)) {
        tracing::error!("Failed to bind: {}", e);
        std::process::exit(1);
    }

    let deadline = (args.duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(args.duration_secs));

    while deadline.map_or(true, |d| Instant::now() < d) {
        while let Some(event) = host.pop_event() {
            let peer = event.peer();
            match event.kind() {
                EventKind::Connect => {
                    tracing::info!("Peer {} connected ({:?})", peer.id(), peer.address());
                }
                EventKind::Disconnect => {
                    tracing::info!("Peer {} disconnected", peer.id());
                }
                EventKind::Receive => {
                    let channel = event.channel_id().unwrap_or(0);
                    let payload = event.payload().to_vec();
                    if let Err(e) = host.send_to(peer, payload, channel, DeliveryMode::Reliable) {
                        tracing::warn!("Echo to peer {} failed: {}", peer.id(), e);
                    }
                }
            }
        }
        thread::sleep(FRAME);
    }

    host.unbind();
    runtime::deinitialize();
    tracing::info!("Server stopped");
}
