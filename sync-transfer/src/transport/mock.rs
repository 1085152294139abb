//! Mock transport for testing.
//!
//! Captures every byte written per connection and allows forcing connect or
//! write failures for verification of retry and error paths.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the client owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    attempts: Vec<String>,
    streams: Vec<Arc<Mutex<Vec<u8>>>>,
    connect_failures: VecDeque<String>,
    fail_writes_after: Option<usize>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.fail_connects(1, error);
    }

    /// Cause the next `count` connect() calls to fail.
    pub fn fail_connects(&self, count: usize, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner.connect_failures.push_back(error.to_string());
        }
    }

    /// Make every new stream fail with a reset after `bytes` bytes.
    pub fn fail_writes_after(&self, bytes: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_writes_after = Some(bytes);
    }

    /// Number of connect() calls, successful or not.
    pub fn connect_attempts(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.attempts.len()
    }

    /// Addresses passed to connect(), in call order.
    pub fn attempted_addresses(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.attempts.clone()
    }

    /// Bytes written on each successful connection.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .streams
            .iter()
            .map(|s| s.lock().unwrap().clone())
            .collect()
    }

    /// Bytes written on the most recent connection.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.sent_frames().pop()
    }

    /// Clear all state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Stream = MockStream;

    async fn connect(
        &self,
        address: &str,
        _default_port: u16,
        _timeout: Duration,
    ) -> Result<MockStream, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.push(address.to_string());

        // Check for forced failure
        if let Some(error) = inner.connect_failures.pop_front() {
            return Err(TransportError::ConnectionFailed {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, error),
            });
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        inner.streams.push(Arc::clone(&buffer));
        Ok(MockStream {
            buffer,
            fail_after: inner.fail_writes_after,
        })
    }
}

/// Write half of a mock connection.
#[derive(Debug)]
pub struct MockStream {
    buffer: Arc<Mutex<Vec<u8>>>,
    fail_after: Option<usize>,
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut data = this.buffer.lock().unwrap();

        let accepted = match this.fail_after {
            Some(limit) if data.len() >= limit => {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "mock connection reset",
                )));
            }
            Some(limit) => buf.len().min(limit - data.len()),
            None => buf.len(),
        };

        data.extend_from_slice(&buf[..accepted]);
        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
