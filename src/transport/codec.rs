//! Datagram codec
//!
//! Encoding and decoding of the endpoint's wire format.
//!
//! ## Datagram Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────────┐
//! │Magic (2) │ CRC (4)  │ Kind (1) │       Body                  │
//! └──────────┴──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! The CRC32 covers every byte after the CRC field.
//!
//! ### Body by Kind
//! - 0x01 CONNECT:     channels (1) + bandwidth_in (4) + data (4)
//! - 0x02 CONNECT_ACK: channels (1) + bandwidth_in (4)
//! - 0x03 DISCONNECT:  data (4)
//! - 0x04 DATA:        channel (1) + flags (1) + sequence (4) + payload
//! - 0x05 ACK:         channel (1) + sequence (4)
//! - 0x06 PING:        empty

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::PacketFlags;
use crate::error::{HostError, Result};

/// Identifies our datagrams among stray traffic
pub const MAGIC: u16 = 0x4E48;

/// Magic (2) + CRC (4) + Kind (1)
pub const HEADER_SIZE: usize = 7;

/// Header plus the largest fixed body (DATA)
pub const MAX_OVERHEAD: usize = HEADER_SIZE + 6;

const KIND_CONNECT: u8 = 0x01;
const KIND_CONNECT_ACK: u8 = 0x02;
const KIND_DISCONNECT: u8 = 0x03;
const KIND_DATA: u8 = 0x04;
const KIND_ACK: u8 = 0x05;
const KIND_PING: u8 = 0x06;

/// One datagram exchanged between endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Connect {
        channels: u8,
        bandwidth_in: u32,
        data: u32,
    },
    ConnectAck {
        channels: u8,
        bandwidth_in: u32,
    },
    Disconnect {
        data: u32,
    },
    Data {
        channel: u8,
        flags: PacketFlags,
        sequence: u32,
        payload: Bytes,
    },
    Ack {
        channel: u8,
        sequence: u32,
    },
    Ping,
}

/// Encode a datagram to bytes
pub fn encode(datagram: &Datagram) -> Vec<u8> {
    let mut body = BytesMut::with_capacity(MAX_OVERHEAD);

    match datagram {
        Datagram::Connect {
            channels,
            bandwidth_in,
            data,
        } => {
            body.put_u8(KIND_CONNECT);
            body.put_u8(*channels);
            body.put_u32(*bandwidth_in);
            body.put_u32(*data);
        }
        Datagram::ConnectAck {
            channels,
            bandwidth_in,
        } => {
            body.put_u8(KIND_CONNECT_ACK);
            body.put_u8(*channels);
            body.put_u32(*bandwidth_in);
        }
        Datagram::Disconnect { data } => {
            body.put_u8(KIND_DISCONNECT);
            body.put_u32(*data);
        }
        Datagram::Data {
            channel,
            flags,
            sequence,
            payload,
        } => {
            body.reserve(payload.len());
            body.put_u8(KIND_DATA);
            body.put_u8(*channel);
            body.put_u8(flags.bits());
            body.put_u32(*sequence);
            body.put_slice(payload);
        }
        Datagram::Ack { channel, sequence } => {
            body.put_u8(KIND_ACK);
            body.put_u8(*channel);
            body.put_u32(*sequence);
        }
        Datagram::Ping => body.put_u8(KIND_PING),
    }

    let mut message = Vec::with_capacity(6 + body.len());
    message.put_u16(MAGIC);
    message.put_u32(crc32fast::hash(&body));
    message.put_slice(&body);
    message
}

/// Decode a datagram, copying any payload out of `bytes`
pub fn decode(bytes: &[u8]) -> Result<Datagram> {
    if bytes.len() < HEADER_SIZE {
        return Err(HostError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = bytes;
    let magic = buf.get_u16();
    if magic != MAGIC {
        return Err(HostError::Protocol(format!("Bad magic: 0x{:04x}", magic)));
    }

    let expected_crc = buf.get_u32();
    let actual_crc = crc32fast::hash(buf);
    if expected_crc != actual_crc {
        return Err(HostError::Protocol(format!(
            "CRC mismatch: expected 0x{:08x}, got 0x{:08x}",
            expected_crc, actual_crc
        )));
    }

    let kind = buf.get_u8();
    match kind {
        KIND_CONNECT => {
            need(buf, 9, "CONNECT")?;
            Ok(Datagram::Connect {
                channels: buf.get_u8(),
                bandwidth_in: buf.get_u32(),
                data: buf.get_u32(),
            })
        }
        KIND_CONNECT_ACK => {
            need(buf, 5, "CONNECT_ACK")?;
            Ok(Datagram::ConnectAck {
                channels: buf.get_u8(),
                bandwidth_in: buf.get_u32(),
            })
        }
        KIND_DISCONNECT => {
            need(buf, 4, "DISCONNECT")?;
            Ok(Datagram::Disconnect {
                data: buf.get_u32(),
            })
        }
        KIND_DATA => {
            need(buf, 6, "DATA")?;
            let channel = buf.get_u8();
            let raw_flags = buf.get_u8();
            let flags = PacketFlags::from_bits(raw_flags).ok_or_else(|| {
                HostError::Protocol(format!("DATA: unknown flags 0x{:02x}", raw_flags))
            })?;
            let sequence = buf.get_u32();
            Ok(Datagram::Data {
                channel,
                flags,
                sequence,
                payload: Bytes::copy_from_slice(buf),
            })
        }
        KIND_ACK => {
            need(buf, 5, "ACK")?;
            Ok(Datagram::Ack {
                channel: buf.get_u8(),
                sequence: buf.get_u32(),
            })
        }
        KIND_PING => Ok(Datagram::Ping),
        _ => Err(HostError::Protocol(format!(
            "Unknown datagram kind: 0x{:02x}",
            kind
        ))),
    }
}

fn need(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(HostError::Protocol(format!(
            "{}: expected {} body bytes, got {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}
