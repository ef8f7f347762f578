//! Error types for nethost
//!
//! Provides a unified error type for all host, peer and transport operations.

use thiserror::Error;

/// Result type alias using HostError
pub type Result<T> = std::result::Result<T, HostError>;

/// Unified error type for nethost operations
#[derive(Debug, Error)]
pub enum HostError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Host is not bound")]
    NotBound,

    #[error("Host is already bound")]
    AlreadyBound,

    #[error("Network runtime is not initialized")]
    NotInitialized,

    #[error("Network runtime initialization failed: {0}")]
    Init(String),

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("Address resolution failed: {0}")]
    Resolve(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Packet error: {0}")]
    Packet(String),

    #[error("Invalid channel {channel} (peer has {limit} channels)")]
    InvalidChannel { channel: u8, limit: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Peer Errors
    // -------------------------------------------------------------------------
    #[error("Peer slot {slot} no longer refers to this connection")]
    StalePeer { slot: usize },

    #[error("Peer handle belongs to a different host")]
    ForeignPeer,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
