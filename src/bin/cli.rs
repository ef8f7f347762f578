//! nethost CLI Client
//!
//! Connects to a host, sends a message a number of times and prints every
//! event that comes back.

use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use nethost::{runtime, Address, DeliveryMode, EventKind, Host, HostConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// nethost CLI
#[derive(Parser, Debug)]
#[command(name = "nethost-cli")]
#[command(about = "Send messages to a nethost server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7777")]
    server: String,

    /// Message to send
    #[arg(default_value = "ping")]
    message: String,

    /// Number of times to send the message
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// Channel to send on
    #[arg(short, long, default_value = "0")]
    channel: u8,

    /// Delivery mode
    #[arg(short, long, value_enum, default_value_t = Mode::Reliable)]
    mode: Mode,

    /// Give up after this many seconds
    #[arg(short, long, default_value = "5")]
    timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Reliable,
    Sequenced,
    Unsequenced,
}

impl From<Mode> for DeliveryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Reliable => DeliveryMode::Reliable,
            Mode::Sequenced => DeliveryMode::Sequenced,
            Mode::Unsequenced => DeliveryMode::Unsequenced,
        }
    }
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,nethost=info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> nethost::Result<()> {
    runtime::initialize()?;

    let server: Address = args.server.parse()?;
    let channels = args.channel as usize + 1;
    let host = Host::new(HostConfig::builder().max_peers(1).max_channels(channels).build());
    host.bind(None)?;

    let peer = host.connect(&server, 0)?;
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let mut sent = false;
    let mut replies = 0;

    while Instant::now() < deadline {
        while let Some(event) = host.pop_event() {
            match event.kind() {
                EventKind::Connect => {
                    println!("connected to {}", server);
                    for _ in 0..args.count {
                        peer.send(args.message.clone().into_bytes(), args.channel, args.mode.into())?;
                    }
                    sent = true;
                }
                EventKind::Receive => {
                    replies += 1;
                    println!(
                        "[{}ms] channel {}: {}",
                        event.time(),
                        event.channel_id().unwrap_or(0),
                        String::from_utf8_lossy(event.payload())
                    );
                }
                EventKind::Disconnect => {
                    println!("disconnected (data {})", event.data().unwrap_or(0));
                    return Ok(());
                }
            }
        }

        if sent && replies >= args.count {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    if !sent {
        println!("no connection to {} within {}s", server, args.timeout_secs);
    }

    if peer.disconnect_now(0).is_err() {
        tracing::debug!("connection already gone");
    }
    host.unbind();
    Ok(())
}
