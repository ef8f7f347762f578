//! Inbound Events
//!
//! The worker thread translates every transport event into an [`Event`]
//! before queueing it. Receive payloads are copied out of the transport
//! packet, so an event never borrows transport memory.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{HostError, Result};
use crate::host::PeerHandle;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    Receive,
    Disconnect,
}

/// A network event waiting in the inbound queue
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventKind,
    time: u64,
    peer: PeerHandle,
    channel: u8,
    data: u32,
    payload: Bytes,
}

impl Event {
    pub(crate) fn connect(time: u64, peer: PeerHandle, data: u32) -> Self {
        Self {
            kind: EventKind::Connect,
            time,
            peer,
            channel: 0,
            data,
            payload: Bytes::new(),
        }
    }

    pub(crate) fn receive(time: u64, peer: PeerHandle, channel: u8, payload: Bytes) -> Self {
        Self {
            kind: EventKind::Receive,
            time,
            peer,
            channel,
            data: 0,
            payload,
        }
    }

    pub(crate) fn disconnect(time: u64, peer: PeerHandle, data: u32) -> Self {
        Self {
            kind: EventKind::Disconnect,
            time,
            peer,
            channel: 0,
            data,
            payload: Bytes::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Milliseconds on the runtime clock when the event was translated
    pub fn time(&self) -> u64 {
        self.time
    }

    /// The peer the event came from
    pub fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    /// Channel of a receive event
    pub fn channel_id(&self) -> Option<u8> {
        match self.kind {
            EventKind::Receive => Some(self.channel),
            _ => None,
        }
    }

    /// User data of a connect or disconnect event
    pub fn data(&self) -> Option<u32> {
        match self.kind {
            EventKind::Receive => None,
            _ => Some(self.data),
        }
    }

    /// Received bytes (empty for connect and disconnect)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Decode a payload sent with `broadcast_var` / `send_var`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        if self.kind != EventKind::Receive {
            return Err(HostError::Decode(format!(
                "{:?} event carries no payload",
                self.kind
            )));
        }
        bincode::deserialize(&self.payload).map_err(|e| HostError::Decode(e.to_string()))
    }
}
