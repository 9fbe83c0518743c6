//! Owned UDP transport: one connected socket per target.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// Largest UDP payload accepted from the wire.
const MAX_DATAGRAM: usize = 65535;

/// UDP transport with a dedicated connected socket.
///
/// Connecting the socket lets the kernel filter datagrams from other
/// sources; the client still validates request ids on whatever arrives.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    local: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to `target`.
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let socket = bind_ephemeral_udp_socket(target)
            .await
            .map_err(|e| Error::Io {
                target: Some(target),
                source: e,
            })?;
        socket.connect(target).await.map_err(|e| Error::Io {
            target: Some(target),
            source: e,
        })?;
        let local = socket.local_addr().map_err(|e| Error::Io {
            target: Some(target),
            source: e,
        })?;

        tracing::debug!(
            snmp.target = %target,
            snmp.local_addr = %local,
            "UDP transport connected"
        );

        Ok(Self {
            socket: Arc::new(socket),
            peer: target,
            local,
        })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(
            snmp.target = %self.peer,
            snmp.bytes = data.len(),
            "UDP send"
        );
        self.socket.send(data).await.map_err(|e| Error::Io {
            target: Some(self.peer),
            source: e,
        })?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match tokio::time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(len)) => {
                tracing::trace!(
                    snmp.target = %self.peer,
                    snmp.bytes = len,
                    "UDP recv"
                );
                buf.truncate(len);
                Ok((Bytes::from(buf), self.peer))
            }
            Ok(Err(e)) => Err(Error::Io {
                target: Some(self.peer),
                source: e,
            }),
            Err(_) => Err(Error::Timeout {
                target: Some(self.peer),
                elapsed: timeout,
                request_id,
                retries: 0,
            }),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn is_stream(&self) -> bool {
        false
    }
}
