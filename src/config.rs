//! Configuration for nethost
//!
//! Centralized host configuration with sensible defaults.

use std::time::Duration;

use crate::error::{HostError, Result};
use crate::transport::TransportLimits;

/// Default blocking poll timeout per worker iteration (milliseconds)
pub const DEFAULT_EVENT_WAIT_MS: u64 = 1;

/// Default peer table capacity
pub const DEFAULT_MAX_PEERS: usize = 32;

/// Default number of channels per connection
pub const DEFAULT_MAX_CHANNELS: usize = 1;

/// Largest peer table a host may be configured with
pub const PEER_LIMIT: usize = 4096;

/// Channel ids travel as a single byte on the wire
pub const CHANNEL_LIMIT: usize = 255;

/// Main configuration for a Host instance
#[derive(Debug, Clone)]
pub struct HostConfig {
    // -------------------------------------------------------------------------
    // Worker Configuration
    // -------------------------------------------------------------------------
    /// How long the worker blocks in each transport poll (milliseconds).
    /// Also bounds how quickly `unbind` is observed by the worker.
    pub event_wait_ms: u64,

    /// Name given to the worker thread
    pub thread_name: String,

    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Number of peer slots in the connection table
    pub max_peers: usize,

    /// Channels allocated per connection
    pub max_channels: usize,

    /// Incoming bandwidth cap in bytes/second (0 = unlimited)
    pub bandwidth_in: u32,

    /// Outgoing bandwidth cap in bytes/second (0 = unlimited)
    pub bandwidth_out: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            event_wait_ms: DEFAULT_EVENT_WAIT_MS,
            thread_name: "nethost-worker".to_string(),
            max_peers: DEFAULT_MAX_PEERS,
            max_channels: DEFAULT_MAX_CHANNELS,
            bandwidth_in: 0,
            bandwidth_out: 0,
        }
    }
}

impl HostConfig {
    /// Create a new config builder
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Poll wait as a Duration
    pub fn event_wait(&self) -> Duration {
        Duration::from_millis(self.event_wait_ms)
    }

    /// Limits handed to the transport when a context is created
    pub fn limits(&self) -> TransportLimits {
        TransportLimits {
            max_peers: self.max_peers,
            max_channels: self.max_channels,
            bandwidth_in: self.bandwidth_in,
            bandwidth_out: self.bandwidth_out,
        }
    }

    /// Check that every field is within the range the transport accepts
    pub fn validate(&self) -> Result<()> {
        validate_peers(self.max_peers)?;
        validate_channels(self.max_channels)?;
        Ok(())
    }
}

pub(crate) fn validate_peers(count: usize) -> Result<()> {
    if count == 0 || count > PEER_LIMIT {
        return Err(HostError::Config(format!(
            "max_peers must be between 1 and {}, got {}",
            PEER_LIMIT, count
        )));
    }
    Ok(())
}

pub(crate) fn validate_channels(count: usize) -> Result<()> {
    if count == 0 || count > CHANNEL_LIMIT {
        return Err(HostError::Config(format!(
            "max_channels must be between 1 and {}, got {}",
            CHANNEL_LIMIT, count
        )));
    }
    Ok(())
}

/// Builder for HostConfig
#[derive(Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// Set the worker poll timeout (in milliseconds)
    pub fn event_wait_ms(mut self, ms: u64) -> Self {
        self.config.event_wait_ms = ms;
        self
    }

    /// Set the worker thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the peer table capacity
    pub fn max_peers(mut self, count: usize) -> Self {
        self.config.max_peers = count;
        self
    }

    /// Set the number of channels per connection
    pub fn max_channels(mut self, count: usize) -> Self {
        self.config.max_channels = count;
        self
    }

    /// Set the incoming bandwidth cap (bytes/second, 0 = unlimited)
    pub fn bandwidth_in(mut self, bytes: u32) -> Self {
        self.config.bandwidth_in = bytes;
        self
    }

    /// Set the outgoing bandwidth cap (bytes/second, 0 = unlimited)
    pub fn bandwidth_out(mut self, bytes: u32) -> Self {
        self.config.bandwidth_out = bytes;
        self
    }

    pub fn build(self) -> HostConfig {
        self.config
    }
}
