//! In-memory transport for tests.
//!
//! Two modes:
//! - scripted: responses are queued up front with [`MockTransport::push_response`];
//! - responder: a closure computes zero or more responses for every sent frame,
//!   which makes a full client/agent loopback possible without sockets.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, Result};

type Responder = Box<dyn Fn(Bytes) -> Vec<Bytes> + Send + Sync>;

struct MockInner {
    peer: SocketAddr,
    sent: Mutex<Vec<Bytes>>,
    queue: Mutex<VecDeque<Bytes>>,
    responder: Option<Responder>,
}

/// Scripted or responder-backed in-memory transport.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// A scripted transport with an empty response queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner {
                peer: "127.0.0.1:161".parse().unwrap(),
                sent: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                responder: None,
            }),
        }
    }

    /// A transport whose responses are computed from each sent frame.
    pub fn with_responder(f: impl Fn(Bytes) -> Vec<Bytes> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(MockInner {
                peer: "127.0.0.1:161".parse().unwrap(),
                sent: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                responder: Some(Box::new(f)),
            }),
        }
    }

    /// Queue a canned response.
    pub fn push_response(&self, bytes: impl Into<Bytes>) {
        self.inner.queue.lock().unwrap().push_back(bytes.into());
    }

    /// Everything sent through this transport so far.
    pub fn sent(&self) -> Vec<Bytes> {
        self.inner.sent.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let frame = Bytes::copy_from_slice(data);
        self.inner.sent.lock().unwrap().push(frame.clone());
        if let Some(responder) = &self.inner.responder {
            let responses = responder(frame);
            self.inner.queue.lock().unwrap().extend(responses);
        }
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        // Yield once so spawned tasks can run before we give up.
        tokio::task::yield_now().await;

        if let Some(data) = self.inner.queue.lock().unwrap().pop_front() {
            return Ok((data, self.inner.peer));
        }

        tokio::time::sleep(timeout).await;

        if let Some(data) = self.inner.queue.lock().unwrap().pop_front() {
            return Ok((data, self.inner.peer));
        }

        Err(Error::Timeout {
            target: Some(self.inner.peer),
            elapsed: timeout,
            request_id,
            retries: 0,
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn is_stream(&self) -> bool {
        false
    }
}
