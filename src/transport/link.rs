//! Datagram Links
//!
//! The raw datagram pipe an endpoint runs on top of.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Unreliable, unordered datagram delivery between socket addresses
pub trait Link: Send + 'static {
    /// Address this link receives on
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Send one datagram
    fn send_to(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<()>;

    /// Receive one datagram into `buf`
    ///
    /// `None` polls without blocking; `Some(timeout)` blocks up to `timeout`.
    /// Returns `Ok(None)` when nothing arrived.
    fn recv_from(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> io::Result<Option<(usize, SocketAddr)>>;
}
