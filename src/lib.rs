//! # nethost
//!
//! A network host that runs its transport on a background thread:
//! - Thread-safe outbound message and inbound event queues
//! - Peer handles that go stale instead of dangling
//! - Reliable, sequenced and unsequenced delivery over UDP
//! - An in-process memory transport for tests and simulations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Consumer threads (Host API)                 │
//! │        broadcast / send_to         pop_event / get_peer      │
//! └───────────┬─────────────────────────────▲───────────────────┘
//!             │                             │
//!             ▼                             │
//!   ┌──────────────────┐          ┌──────────────────┐
//!   │ Queue<Message>   │          │  Queue<Event>    │
//!   └────────┬─────────┘          └────────▲─────────┘
//!            │                             │
//! ┌──────────▼─────────────────────────────┴────────────────────┐
//! │                      Worker thread                           │
//! │          send phase ─▶ poll phase (service + drain)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  acquire(): access mutex ─▶ context mutex
//!                       ▼
//!               ┌────────────────┐
//!               │   Transport    │
//!               │   context      │
//!               └───────┬────────┘
//!                       │
//!              ┌────────┴────────┐
//!              ▼                 ▼
//!        ┌──────────┐     ┌──────────────┐
//!        │   UDP    │     │   Memory     │
//!        └──────────┘     └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod runtime;

pub mod address;
pub mod queue;
pub mod message;
pub mod event;
pub mod transport;
pub mod host;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use address::Address;
pub use config::{HostConfig, HostConfigBuilder};
pub use error::{HostError, Result};
pub use event::{Event, EventKind};
pub use host::{Host, PeerHandle};
pub use message::{DeliveryMode, Message, Target};
pub use queue::Queue;
pub use transport::{
    MemoryNetwork, MemoryTransport, Packet, PacketFlags, PeerInfo, PeerSlot, PeerState,
    Transport, TransportContext, TransportEvent, TransportLimits, UdpTransport,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of nethost
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
