//! Outbound Messages
//!
//! A [`Message`] is what the consumer enqueues for the worker thread to send.
//! It carries its own copy of the payload, so the caller may reuse or drop
//! the original buffer immediately.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{HostError, Result};
use crate::host::PeerHandle;
use crate::transport::{PacketFlags, PeerSlot};

/// How a message is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Unreliable, delivered in arrival order
    #[default]
    Unsequenced,

    /// Acknowledged and delivered in order
    Reliable,

    /// Unreliable, stale packets dropped by the receiver
    Sequenced,
}

impl DeliveryMode {
    /// Transport flags for this mode
    pub fn flags(self) -> PacketFlags {
        match self {
            DeliveryMode::Unsequenced => PacketFlags::UNSEQUENCED,
            DeliveryMode::Reliable => PacketFlags::RELIABLE,
            DeliveryMode::Sequenced => PacketFlags::NONE,
        }
    }
}

/// Who a message goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every connected peer
    Broadcast,

    /// One peer slot, as it was when the message was built
    ///
    /// `binding` counts the host's binds; a message built against an earlier
    /// binding is never sent to whoever holds the slot now.
    Peer { slot: PeerSlot, binding: u64 },
}

/// A payload waiting in the outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    target: Target,
    channel: u8,
    mode: DeliveryMode,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>, target: Target, channel: u8, mode: DeliveryMode) -> Self {
        Self {
            payload: payload.into(),
            target,
            channel,
            mode,
        }
    }

    /// A message for every connected peer
    pub fn broadcast(payload: impl Into<Bytes>, channel: u8, mode: DeliveryMode) -> Self {
        Self::new(payload, Target::Broadcast, channel, mode)
    }

    /// A message for the connection behind `peer`
    pub fn to_peer(
        peer: &PeerHandle,
        payload: impl Into<Bytes>,
        channel: u8,
        mode: DeliveryMode,
    ) -> Self {
        let target = Target::Peer {
            slot: peer.slot(),
            binding: peer.binding(),
        };
        Self::new(payload, target, channel, mode)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub(crate) fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Serialize a value for `broadcast_var` / `send_var`
///
/// An empty encoding is rejected; there would be nothing to deliver.
pub(crate) fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(value).map_err(|e| HostError::Encode(e.to_string()))?;
    if bytes.is_empty() {
        return Err(HostError::Encode("value encodes to zero bytes".to_string()));
    }
    Ok(bytes)
}
