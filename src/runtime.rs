//! Process-wide Runtime
//!
//! One-time network initialization and the monotonic millisecond clock used
//! to timestamp events.
//!
//! The surrounding application calls [`initialize`] once at startup and
//! [`deinitialize`] once at shutdown. A failed initialization is fatal: no
//! host can bind without it.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::{HostError, Result};

static EPOCH: OnceLock<Instant> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the network runtime
///
/// Starts the event clock and verifies the process can open datagram
/// sockets. Calling it again while initialized is a no-op.
pub fn initialize() -> Result<()> {
    if INITIALIZED.load(Ordering::Acquire) {
        return Ok(());
    }

    EPOCH.get_or_init(Instant::now);

    UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|e| HostError::Init(format!("datagram sockets unavailable: {}", e)))?;

    INITIALIZED.store(true, Ordering::Release);
    tracing::debug!("Network runtime initialized");
    Ok(())
}

/// Tear down the network runtime
///
/// Hosts that are still bound keep running; new binds fail until
/// [`initialize`] is called again.
pub fn deinitialize() {
    if INITIALIZED.swap(false, Ordering::AcqRel) {
        tracing::debug!("Network runtime deinitialized");
    }
}

/// Whether [`initialize`] has succeeded and not been undone
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Milliseconds elapsed on the monotonic event clock
pub fn ticks_msec() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}
