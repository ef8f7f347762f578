//! Worker Loop
//!
//! The body of a host's background thread.
//!
//! ## Iteration
//! ```text
//!   ┌──────────────┐    ┌─────────────────────┐    ┌─────────────────────────┐
//!   │  acquire()   │──▶ │ send: drain outbound│──▶ │ poll: service + check   │
//!   └──────────────┘    └─────────────────────┘    └────────────┬────────────┘
//!          ▲                                                    │
//!          └──────────── release, loop while running ───────────┘
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::{PeerHandle, Shared};
use crate::event::Event;
use crate::message::{Message, Target};
use crate::runtime;
use crate::transport::{Packet, TransportContext, TransportEvent};

/// Service the context until `running` is cleared
pub(super) fn run(shared: Arc<Shared>, wait: Duration) {
    let binding = shared.binding();
    tracing::debug!("Worker started (binding {}, poll wait {:?})", binding, wait);

    while shared.running.load(Ordering::Acquire) {
        let mut guard = shared.acquire();
        let Some(context) = guard.as_mut() else {
            break;
        };

        send_messages(&shared, context.as_mut(), binding);
        poll_events(&shared, context.as_mut(), wait, binding);
    }

    tracing::debug!("Worker stopped");
}

/// Hand every queued message to the transport
fn send_messages(shared: &Shared, context: &mut dyn TransportContext, binding: u64) {
    while let Some(message) = shared.outbound.pop() {
        send_message(context, message, binding);
    }
}

fn send_message(context: &mut dyn TransportContext, message: Message, binding: u64) {
    let target = message.target();
    let channel = message.channel();
    let flags = message.mode().flags();

    let packet = match Packet::new(message.into_payload(), flags) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!("Dropping message: {}", e);
            return;
        }
    };

    match target {
        Target::Broadcast => context.broadcast(channel, packet),
        Target::Peer {
            slot,
            binding: made_under,
        } => {
            if made_under != binding {
                tracing::debug!("Dropping message for peer {} of an earlier binding", slot.index);
                return;
            }
            if let Err(e) = context.send(slot, channel, packet) {
                tracing::debug!("Dropping message for peer {}: {}", slot.index, e);
            }
        }
    }
}

/// Wait up to `wait` for one event, then drain whatever else is ready
fn poll_events(
    shared: &Arc<Shared>,
    context: &mut dyn TransportContext,
    wait: Duration,
    binding: u64,
) {
    match context.service(wait) {
        Ok(Some(event)) => shared.inbound.push(translate(shared, event, binding)),
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Transport service failed: {}", e);
            return;
        }
    }

    while let Some(event) = context.check_events() {
        shared.inbound.push(translate(shared, event, binding));
    }
}

/// Convert a transport event, copying any payload out of the packet
fn translate(shared: &Arc<Shared>, event: TransportEvent, binding: u64) -> Event {
    let time = runtime::ticks_msec();
    let peer = PeerHandle::new(Arc::downgrade(shared), event.peer(), binding);

    let event = match event {
        TransportEvent::Connect { data, .. } => Event::connect(time, peer, data),
        TransportEvent::Receive {
            channel, packet, ..
        } => {
            let payload = Bytes::copy_from_slice(packet.data());
            drop(packet);
            Event::receive(time, peer, channel, payload)
        }
        TransportEvent::Disconnect { data, .. } => Event::disconnect(time, peer, data),
    };

    tracing::trace!(
        "{:?} event from peer {} at {}ms",
        event.kind(),
        event.peer().id(),
        time
    );
    event
}
