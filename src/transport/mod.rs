//! Transport layer abstraction.
//!
//! The core never touches sockets directly: it consumes a request/response
//! byte channel described by the [`Transport`] trait. One owned-UDP
//! implementation ships with the crate; tests use an in-memory mock.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Client-side transport abstraction.
///
/// # Clone Requirement
///
/// The `Clone` bound is required because walk streams own a clone of the client
/// (and thus the transport). This enables concurrent walks without borrow conflicts.
/// Implementations use `Arc` internally, making clone cheap.
pub trait Transport: Send + Sync + Clone {
    /// Send request data to the target.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next datagram, waiting at most `timeout`.
    ///
    /// `request_id` identifies the pending exchange for transports that
    /// correlate internally; the client still validates the id of whatever
    /// arrives and discards mismatches itself.
    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    /// The peer address for this transport.
    fn peer_addr(&self) -> SocketAddr;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;

    /// Whether this is a stream transport.
    ///
    /// When true, the client skips retries (the stream guarantees delivery
    /// or failure). When false (UDP), the client retries on timeout.
    fn is_stream(&self) -> bool;
}
