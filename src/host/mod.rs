//! Host Module
//!
//! A network host that services its transport on a dedicated worker thread.
//!
//! ## Responsibilities
//! - Bind / unbind a transport context and start / stop the worker
//! - Queue outbound messages for the worker to send
//! - Hand inbound events to the consumer in arrival order
//! - Resolve peer slots into [`PeerHandle`]s
//!
//! ## Context Access
//!
//! The transport context is shared by the worker and every consumer call
//! that needs it directly. Access goes through two mutexes:
//!
//! ```text
//!   acquire():  lock(access) ─▶ lock(context) ─▶ unlock(access)
//!   release:    drop the context guard
//! ```
//!
//! A waiter queued on `access` gets the context before the holder can take it
//! back, so the worker cannot starve consumer calls by re-locking in a loop.

mod peer;
mod worker;

pub use peer::PeerHandle;

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::address::Address;
use crate::config::{self, HostConfig};
use crate::error::{HostError, Result};
use crate::event::Event;
use crate::message::{self, DeliveryMode, Message, Target};
use crate::queue::Queue;
use crate::runtime;
use crate::transport::{Transport, TransportContext, UdpTransport};

/// Guard over the (possibly absent) transport context
pub(crate) type ContextGuard<'a> = MutexGuard<'a, Option<Box<dyn TransportContext>>>;

// =============================================================================
// Shared State
// =============================================================================

/// State shared by the host, its worker and its peer handles
pub(crate) struct Shared {
    /// Creates contexts and resolves addresses
    transport: Box<dyn Transport>,

    // -------------------------------------------------------------------------
    // Context Access
    // -------------------------------------------------------------------------
    /// Taken first, released as soon as `context` is held
    access: Mutex<()>,

    /// Present exactly while the worker runs
    context: Mutex<Option<Box<dyn TransportContext>>>,

    // -------------------------------------------------------------------------
    // Worker Control
    // -------------------------------------------------------------------------
    /// Cleared by `unbind`; the worker checks it once per iteration
    running: AtomicBool,

    /// Consumer-side view of whether the host is bound
    bound: AtomicBool,

    /// Incremented by every `bind`; handles and messages carry the value
    /// they were made under
    binding: AtomicU64,

    /// `max_channels` of the current binding
    channel_limit: AtomicUsize,

    // -------------------------------------------------------------------------
    // Queues
    // -------------------------------------------------------------------------
    outbound: Queue<Message>,
    inbound: Queue<Event>,
}

impl Shared {
    /// Exclusive access to the context; released when the guard drops
    pub(crate) fn acquire(&self) -> ContextGuard<'_> {
        let access = self.access.lock();
        let context = self.context.lock();
        drop(access);
        context
    }

    /// Run `f` against the bound context
    pub(crate) fn with_context<R>(
        &self,
        f: impl FnOnce(&mut dyn TransportContext) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.acquire();
        match guard.as_mut() {
            Some(context) => f(context.as_mut()),
            None => Err(HostError::NotBound),
        }
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    pub(crate) fn binding(&self) -> u64 {
        self.binding.load(Ordering::Acquire)
    }

    /// Check a message against the current binding and queue it
    pub(crate) fn enqueue(&self, message: Message) -> Result<()> {
        if !self.is_bound() {
            return Err(HostError::NotBound);
        }

        let limit = self.channel_limit.load(Ordering::Acquire);
        if message.channel() as usize >= limit {
            return Err(HostError::InvalidChannel {
                channel: message.channel(),
                limit,
            });
        }

        if let Target::Peer { slot, binding } = message.target() {
            if binding != self.binding() {
                return Err(HostError::StalePeer { slot: slot.index });
            }
        }

        self.outbound.push(message);
        Ok(())
    }
}

// =============================================================================
// Host
// =============================================================================

/// Consumer-side state guarded as a unit by bind / unbind / setters
struct Lifecycle {
    config: HostConfig,
    worker: Option<JoinHandle<()>>,
}

/// A network host with a background worker thread
///
/// ## Threading
///
/// Every method takes `&self` and may be called from any thread. Sends are
/// queued and transmitted on the worker's next iteration; events are queued
/// by the worker and popped by the consumer.
///
/// ## Example
/// ```no_run
/// use nethost::{runtime, Address, DeliveryMode, Host, HostConfig};
///
/// runtime::initialize()?;
/// let host = Host::new(HostConfig::default());
/// host.bind(Some(Address::any(7777)))?;
/// host.broadcast(&b"hello"[..], 0, DeliveryMode::Reliable)?;
/// while let Some(event) = host.pop_event() {
///     println!("{:?} from peer {}", event.kind(), event.peer().id());
/// }
/// # Ok::<(), nethost::HostError>(())
/// ```
pub struct Host {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl Host {
    /// Create an unbound host over UDP
    pub fn new(config: HostConfig) -> Self {
        Self::with_transport(config, UdpTransport::new())
    }

    /// Create an unbound host over a custom transport
    pub fn with_transport(config: HostConfig, transport: impl Transport + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport: Box::new(transport),
                access: Mutex::new(()),
                context: Mutex::new(None),
                running: AtomicBool::new(false),
                bound: AtomicBool::new(false),
                binding: AtomicU64::new(0),
                channel_limit: AtomicUsize::new(0),
                outbound: Queue::new(),
                inbound: Queue::new(),
            }),
            lifecycle: Mutex::new(Lifecycle {
                config,
                worker: None,
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind a transport context and start the worker
    ///
    /// - `None` binds an ephemeral local address
    /// - An address with an empty host binds the IPv6 wildcard
    /// - Anything else is resolved by the transport
    pub fn bind(&self, address: Option<Address>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.worker.is_some() {
            return Err(HostError::AlreadyBound);
        }
        if !runtime::is_initialized() {
            return Err(HostError::NotInitialized);
        }
        lifecycle.config.validate()?;

        // Step 1: Resolve the local address
        let local = match address {
            None => None,
            Some(addr) if addr.is_any() => {
                Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), addr.port()))
            }
            Some(addr) => Some(self.shared.transport.resolve(addr.host(), addr.port())?),
        };

        // Step 2: Create the context
        let context = self
            .shared
            .transport
            .create_context(local, &lifecycle.config.limits())?;
        let bound_addr = context.local_addr().ok();
        {
            let mut guard = self.shared.acquire();
            self.shared.binding.fetch_add(1, Ordering::AcqRel);
            self.shared
                .channel_limit
                .store(lifecycle.config.max_channels, Ordering::Release);
            *guard = Some(context);
        }

        // Step 3: Start from empty queues
        self.shared.outbound.clear();
        self.shared.inbound.clear();

        // Step 4: Start the worker
        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let wait = lifecycle.config.event_wait();
        let spawned = thread::Builder::new()
            .name(lifecycle.config.thread_name.clone())
            .spawn(move || worker::run(shared, wait));

        match spawned {
            Ok(handle) => lifecycle.worker = Some(handle),
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.acquire().take();
                return Err(HostError::Io(e));
            }
        }

        self.shared.bound.store(true, Ordering::Release);
        match bound_addr {
            Some(addr) => tracing::info!("Host bound on {}", addr),
            None => tracing::info!("Host bound"),
        }
        Ok(())
    }

    /// Stop the worker, flush and destroy the context, clear both queues
    ///
    /// Does nothing when the host is not bound.
    pub fn unbind(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(worker) = lifecycle.worker.take() else {
            return;
        };

        self.shared.bound.store(false, Ordering::Release);
        self.shared.running.store(false, Ordering::Release);
        if worker.join().is_err() {
            tracing::error!("Host worker thread panicked");
        }

        if let Some(mut context) = self.shared.acquire().take() {
            context.flush();
        }

        let dropped = self.shared.outbound.clear();
        if dropped > 0 {
            tracing::debug!("Discarded {} unsent messages", dropped);
        }
        self.shared.inbound.clear();

        tracing::info!("Host unbound");
    }

    pub fn is_bound(&self) -> bool {
        self.shared.is_bound()
    }

    /// Address the bound context receives on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.shared.with_context(|context| context.local_addr())
    }

    /// A copy of the current configuration
    pub fn config(&self) -> HostConfig {
        self.lifecycle.lock().config.clone()
    }

    // =========================================================================
    // Peers
    // =========================================================================

    /// Start connecting to a remote host
    ///
    /// The returned handle refers to the allocated slot; the connection is
    /// established once a connect event for it arrives.
    pub fn connect(&self, address: &Address, data: u32) -> Result<PeerHandle> {
        if !self.is_bound() {
            return Err(HostError::NotBound);
        }

        let remote = self.shared.transport.resolve(address.host(), address.port())?;
        let (slot, binding) = self
            .shared
            .with_context(|context| Ok((context.connect(remote, data)?, self.shared.binding())))?;

        tracing::debug!("Connecting to {} in slot {}", remote, slot.index);
        Ok(PeerHandle::new(Arc::downgrade(&self.shared), slot, binding))
    }

    /// Handle to peer slot `id`, if bound and within capacity
    pub fn get_peer(&self, id: usize) -> Option<PeerHandle> {
        let guard = self.shared.acquire();
        let context = guard.as_ref()?;
        if id >= context.peer_capacity() {
            return None;
        }
        let info = context.peer_info(id)?;
        Some(PeerHandle::new(
            Arc::downgrade(&self.shared),
            info.slot,
            self.shared.binding(),
        ))
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Queue a payload for every connected peer
    ///
    /// `channel` must be below the configured `max_channels`.
    pub fn broadcast(&self, payload: impl Into<Bytes>, channel: u8, mode: DeliveryMode) -> Result<()> {
        self.shared.enqueue(Message::broadcast(payload, channel, mode))
    }

    /// Queue a bincode-encoded value for every connected peer
    pub fn broadcast_var<T: Serialize + ?Sized>(
        &self,
        value: &T,
        channel: u8,
        mode: DeliveryMode,
    ) -> Result<()> {
        if !self.is_bound() {
            return Err(HostError::NotBound);
        }
        let bytes = message::encode_value(value)?;
        self.broadcast(bytes, channel, mode)
    }

    /// Queue a payload for one peer
    ///
    /// Fails with `StalePeer` when `peer` was made before the latest `bind`.
    pub fn send_to(
        &self,
        peer: &PeerHandle,
        payload: impl Into<Bytes>,
        channel: u8,
        mode: DeliveryMode,
    ) -> Result<()> {
        if !peer.belongs_to(&self.shared) {
            return Err(HostError::ForeignPeer);
        }
        self.shared
            .enqueue(Message::to_peer(peer, payload, channel, mode))
    }

    /// Queue a bincode-encoded value for one peer
    pub fn send_var<T: Serialize + ?Sized>(
        &self,
        peer: &PeerHandle,
        value: &T,
        channel: u8,
        mode: DeliveryMode,
    ) -> Result<()> {
        if !self.is_bound() {
            return Err(HostError::NotBound);
        }
        let bytes = message::encode_value(value)?;
        self.send_to(peer, bytes, channel, mode)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn is_event_available(&self) -> bool {
        !self.shared.inbound.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.shared.inbound.len()
    }

    /// Oldest queued event, if any
    pub fn pop_event(&self) -> Option<Event> {
        self.shared.inbound.pop()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    fn configure(&self, apply: impl FnOnce(&mut HostConfig) -> Result<()>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.worker.is_some() {
            return Err(HostError::AlreadyBound);
        }
        apply(&mut lifecycle.config)
    }

    /// Set the worker's poll wait in milliseconds
    #[deprecated(note = "the poll wait is an internal detail and may stop being configurable")]
    pub fn set_event_wait(&self, ms: u64) -> Result<()> {
        self.configure(|settings| {
            settings.event_wait_ms = ms;
            Ok(())
        })
    }

    pub fn set_max_peers(&self, count: usize) -> Result<()> {
        self.configure(|settings| {
            config::validate_peers(count)?;
            settings.max_peers = count;
            Ok(())
        })
    }

    pub fn set_max_channels(&self, count: usize) -> Result<()> {
        self.configure(|settings| {
            config::validate_channels(count)?;
            settings.max_channels = count;
            Ok(())
        })
    }

    /// Incoming bandwidth cap in bytes/second (0 = unlimited)
    pub fn set_max_bandwidth_in(&self, bytes: u32) -> Result<()> {
        self.configure(|settings| {
            settings.bandwidth_in = bytes;
            Ok(())
        })
    }

    /// Outgoing bandwidth cap in bytes/second (0 = unlimited)
    pub fn set_max_bandwidth_out(&self, bytes: u32) -> Result<()> {
        self.configure(|settings| {
            settings.bandwidth_out = bytes;
            Ok(())
        })
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("bound", &self.is_bound())
            .field("outbound", &self.shared.outbound.len())
            .field("inbound", &self.shared.inbound.len())
            .finish()
    }
}
