//! Peer Handles
//!
//! A [`PeerHandle`] names one connection: a slot in the owning host's peer
//! table, the slot's generation when the handle was made, and the binding
//! (bind count) of the host at that time. It holds the host weakly. Once the
//! slot is disconnected or reused, or the host is unbound, re-bound or
//! dropped, operations fail instead of touching someone else's connection.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use super::Shared;
use crate::error::{HostError, Result};
use crate::message::{self, DeliveryMode, Message};
use crate::transport::{PeerInfo, PeerSlot, PeerState, TransportContext};

/// Weak reference to one connection slot of a host
#[derive(Clone)]
pub struct PeerHandle {
    host: Weak<Shared>,
    slot: PeerSlot,
    binding: u64,
}

impl PeerHandle {
    pub(crate) fn new(host: Weak<Shared>, slot: PeerSlot, binding: u64) -> Self {
        Self {
            host,
            slot,
            binding,
        }
    }

    /// A handle attached to no host
    #[cfg(test)]
    pub(crate) fn detached(slot: PeerSlot) -> Self {
        Self::new(Weak::new(), slot, 0)
    }

    /// Slot index in the host's peer table
    pub fn id(&self) -> usize {
        self.slot.index
    }

    /// Connection generation the handle was made for
    pub fn generation(&self) -> u32 {
        self.slot.generation
    }

    pub(crate) fn slot(&self) -> PeerSlot {
        self.slot
    }

    pub(crate) fn binding(&self) -> u64 {
        self.binding
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        std::ptr::eq(self.host.as_ptr(), Arc::as_ptr(shared))
    }

    fn shared(&self) -> Result<Arc<Shared>> {
        self.host.upgrade().ok_or(HostError::NotBound)
    }

    fn stale(&self) -> HostError {
        HostError::StalePeer {
            slot: self.slot.index,
        }
    }

    /// Run `f` against the context if this handle's connection is still live
    fn with_live<R>(&self, f: impl FnOnce(&mut dyn TransportContext, PeerInfo) -> Result<R>) -> Result<R> {
        let shared = self.shared()?;
        shared.with_context(|context| {
            // Slot generations restart with every new context
            if shared.binding() != self.binding {
                return Err(self.stale());
            }
            let info = context
                .peer_info(self.slot.index)
                .filter(|info| info.slot.generation == self.slot.generation)
                .ok_or_else(|| self.stale())?;
            f(context, info)
        })
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current state of the connection
    pub fn info(&self) -> Result<PeerInfo> {
        self.with_live(|_, info| Ok(info))
    }

    pub fn address(&self) -> Result<Option<SocketAddr>> {
        Ok(self.info()?.address)
    }

    pub fn state(&self) -> Result<PeerState> {
        Ok(self.info()?.state)
    }

    /// Smoothed round-trip time (zero until the first sample)
    pub fn round_trip_time(&self) -> Result<Duration> {
        Ok(self.info()?.round_trip_time)
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Queue a payload for this peer
    pub fn send(&self, payload: impl Into<Bytes>, channel: u8, mode: DeliveryMode) -> Result<()> {
        self.shared()?
            .enqueue(Message::to_peer(self, payload, channel, mode))
    }

    /// Queue a bincode-encoded value for this peer
    pub fn send_var<T: Serialize + ?Sized>(
        &self,
        value: &T,
        channel: u8,
        mode: DeliveryMode,
    ) -> Result<()> {
        let shared = self.shared()?;
        if !shared.is_bound() {
            return Err(HostError::NotBound);
        }
        let bytes = message::encode_value(value)?;
        shared.enqueue(Message::to_peer(self, bytes, channel, mode))
    }

    // =========================================================================
    // Disconnecting
    // =========================================================================

    /// Gracefully disconnect; a disconnect event follows on this host
    pub fn disconnect(&self, data: u32) -> Result<()> {
        self.with_live(|context, _| context.disconnect(self.slot, data))
    }

    /// Notify the remote and free the slot without a local event
    pub fn disconnect_now(&self, data: u32) -> Result<()> {
        self.with_live(|context, _| context.disconnect_now(self.slot, data))
    }

    /// Free the slot silently; the remote is not told
    pub fn reset(&self) -> Result<()> {
        self.with_live(|context, _| context.reset_peer(self.slot))
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.binding == other.binding
            && Weak::ptr_eq(&self.host, &other.host)
    }
}

impl Eq for PeerHandle {}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.slot.index)
            .field("generation", &self.slot.generation)
            .field("binding", &self.binding)
            .finish()
    }
}
