//! Transport abstraction.
//!
//! The wire contract is one datagram out, first datagram back:
//! [`Transport::send`] transmits a serialized message and resolves with
//! the first response received within the timeout. [`UdpTransport`] is
//! the real implementation; tests substitute transcript-driven fakes
//! that preserve byte-exactness.
//!
//! Sockets are scoped per request: bound when a request is sent and
//! closed on every exit path (response, error, timeout, cancellation)
//! by RAII.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::error::{DecodeErrorKind, Error, Result};

/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// A datagram transport.
pub trait Transport: Send + Sync {
    /// Send `data` to `target` and return the first datagram received
    /// back within `timeout`.
    fn send(
        &self,
        target: SocketAddr,
        data: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// UDP transport with a bounded receive buffer.
///
/// A datagram larger than `buffer_size` fails the request with a decode
/// error instead of being silently truncated.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    buffer_size: usize,
}

impl UdpTransport {
    /// Create a transport with the given receive buffer size.
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// The receive buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    async fn bind_for(target: SocketAddr) -> std::io::Result<UdpSocket> {
        let local: SocketAddr = match target.ip() {
            IpAddr::V4(_) => "0.0.0.0:0".parse().expect("valid any-v4 address"),
            IpAddr::V6(_) => "[::]:0".parse().expect("valid any-v6 address"),
        };
        UdpSocket::bind(local).await
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl Transport for UdpTransport {
    async fn send(&self, target: SocketAddr, data: &[u8], timeout: Duration) -> Result<Bytes> {
        let socket = Self::bind_for(target).await.map_err(|e| Error::Io {
            target: Some(target),
            source: e,
        })?;
        socket.connect(target).await.map_err(|e| Error::Io {
            target: Some(target),
            source: e,
        })?;

        tracing::trace!(
            target: "snmpkit::transport",
            peer = %target,
            bytes = data.len(),
            "sending datagram"
        );
        socket.send(data).await.map_err(|e| Error::Io {
            target: Some(target),
            source: e,
        })?;

        // one spare byte detects datagrams that exceed the buffer
        let mut buf = vec![0u8; self.buffer_size + 1];

        let received = tokio::time::timeout(timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout {
                elapsed: timeout,
                retries: 0,
            })?
            .map_err(|e| Error::Io {
                target: Some(target),
                source: e,
            })?;

        if received > self.buffer_size {
            tracing::warn!(
                target: "snmpkit::transport",
                peer = %target,
                buffer_size = self.buffer_size,
                "datagram exceeds receive buffer"
            );
            return Err(Error::decode(
                0,
                DecodeErrorKind::InvalidValueLength {
                    expected: self.buffer_size,
                    actual: received,
                },
            ));
        }

        buf.truncate(received);
        tracing::trace!(
            target: "snmpkit::transport",
            peer = %target,
            bytes = received,
            "received datagram"
        );
        Ok(Bytes::from(buf))
    }
}

/// Resolve a target string to a socket address.
///
/// Accepts `"10.1.2.3:161"`, a bare IP (the default port is appended),
/// or a hostname with or without port.
pub async fn resolve_target(target: &str, default_port: u16) -> Result<SocketAddr> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let host_port = if target.contains(':') {
        target.to_string()
    } else {
        format!("{target}:{default_port}")
    };

    let mut addrs = tokio::net::lookup_host(&host_port).await.map_err(|e| Error::Io {
        target: None,
        source: e,
    })?;
    addrs.next().ok_or_else(|| Error::Io {
        target: None,
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address for {target:?}"),
        ),
    })
}
