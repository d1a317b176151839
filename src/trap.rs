//! Trap listener.
//!
//! Binds a UDP socket (port 162 by default) and produces an endless
//! sequence of decoded notifications. Malformed datagrams are logged and
//! skipped — a hostile or broken sender can never terminate the stream.
//!
//! SNMPv1 traps carry their own RFC 1157 PDU body and are translated to
//! the v2 trap OID (RFC 3584); v2c traps are validated against the
//! RFC 3416 preamble (sysUpTime.0 then snmpTrapOID.0). v3 notifications
//! are accepted at noAuthNoPriv only: verifying authenticated traps
//! needs a receiver-side user database, which this client does not keep.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use tokio::net::UdpSocket;

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::message::{ScopedPdu, V3Message, V3MessageData, Version};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::transport::DEFAULT_BUFFER_SIZE;
use crate::value::Value;
use crate::varbind::VarBind;

/// Default trap port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// sysUpTime.0, the first varbind of a v2 notification.
fn sys_uptime_oid() -> Oid {
    crate::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// snmpTrapOID.0, the second varbind of a v2 notification.
fn snmp_trap_oid() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
}

/// One decoded notification.
#[derive(Debug, Clone)]
pub struct TrapInfo {
    /// Sender address.
    pub origin: SocketAddr,
    /// SNMP version the trap arrived with.
    pub version: Version,
    /// Community string (v1/v2c only).
    pub community: Option<Bytes>,
    /// The trap identity (snmpTrapOID.0, or the RFC 3584 translation
    /// for v1 traps).
    pub trap_oid: Oid,
    /// Sender uptime in hundredths of seconds.
    pub uptime: u32,
    /// Payload varbinds (preamble excluded).
    pub varbinds: Vec<VarBind>,
}

/// UDP trap listener.
pub struct TrapListener {
    socket: UdpSocket,
    buffer_size: usize,
}

impl TrapListener {
    /// Bind to `addr`, e.g. `"0.0.0.0:162"`.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self> {
        Self::bind_with_buffer(addr, DEFAULT_BUFFER_SIZE).await
    }

    /// Bind with a custom receive buffer size.
    pub async fn bind_with_buffer(addr: impl AsRef<str>, buffer_size: usize) -> Result<Self> {
        let addr: SocketAddr = addr.as_ref().parse().map_err(|_| Error::Io {
            target: None,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address: {}", addr.as_ref()),
            ),
        })?;

        let socket = UdpSocket::bind(addr).await.map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;

        let local = socket.local_addr().map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;
        tracing::debug!(target: "snmpkit::trap", local = %local, "trap listener bound");

        Ok(Self {
            socket,
            buffer_size,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| Error::Io {
            target: None,
            source: e,
        })
    }

    /// Receive the next decodable trap.
    ///
    /// Bad datagrams are logged at debug level and skipped; only socket
    /// failures surface as errors.
    pub async fn recv(&self) -> Result<TrapInfo> {
        let mut buf = vec![0u8; self.buffer_size + 1];
        loop {
            let (len, origin) =
                self.socket
                    .recv_from(&mut buf)
                    .await
                    .map_err(|e| Error::Io {
                        target: None,
                        source: e,
                    })?;

            if len > self.buffer_size {
                tracing::debug!(
                    target: "snmpkit::trap",
                    origin = %origin,
                    "oversized trap datagram skipped"
                );
                continue;
            }

            let data = Bytes::copy_from_slice(&buf[..len]);
            match decode_trap(data, origin) {
                Ok(trap) => {
                    tracing::debug!(
                        target: "snmpkit::trap",
                        origin = %origin,
                        trap_oid = %trap.trap_oid,
                        varbind_count = trap.varbinds.len(),
                        "trap received"
                    );
                    return Ok(trap);
                }
                Err(e) => {
                    tracing::debug!(
                        target: "snmpkit::trap",
                        origin = %origin,
                        error = %e,
                        "undecodable trap datagram skipped"
                    );
                }
            }
        }
    }

    /// Turn the listener into an endless [`Stream`] of traps.
    pub fn into_stream(self) -> TrapStream {
        TrapStream {
            listener: Arc::new(self),
            pending: None,
        }
    }
}

type TrapFuture = Pin<Box<dyn std::future::Future<Output = Result<TrapInfo>> + Send>>;

/// Endless stream of decoded traps.
pub struct TrapStream {
    listener: Arc<TrapListener>,
    pending: Option<TrapFuture>,
}

impl TrapStream {
    /// The next trap.
    pub async fn next(&mut self) -> Result<TrapInfo> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx))
            .await
            .expect("trap stream never ends")
    }
}

impl Stream for TrapStream {
    type Item = Result<TrapInfo>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.pending.is_none() {
            let listener = self.listener.clone();
            self.pending = Some(Box::pin(async move { listener.recv().await }));
        }

        let pending = self.pending.as_mut().expect("pending receive was just set");
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                self.pending = None;
                Poll::Ready(Some(result))
            }
        }
    }
}

/// Decode one datagram into a [`TrapInfo`].
pub fn decode_trap(data: Bytes, origin: SocketAddr) -> Result<TrapInfo> {
    let mut decoder = Decoder::new(data);
    let mut seq = decoder.read_sequence()?;

    let version_num = seq.read_integer()?;
    let version = i32::try_from(version_num)
        .ok()
        .and_then(Version::from_i32)
        .ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
        })?;

    match version {
        Version::V1 => {
            let community = seq.read_octet_string()?;
            let trap = TrapV1Pdu::decode(&mut seq)?;
            Ok(TrapInfo {
                origin,
                version,
                community: Some(community),
                trap_oid: trap.v2_trap_oid(),
                uptime: trap.time_stamp,
                varbinds: trap.varbinds,
            })
        }
        Version::V2c => {
            let community = seq.read_octet_string()?;
            let pdu = Pdu::decode(&mut seq)?;
            let (trap_oid, uptime, varbinds) = split_v2_notification(pdu)?;
            Ok(TrapInfo {
                origin,
                version,
                community: Some(community),
                trap_oid,
                uptime,
                varbinds,
            })
        }
        Version::V3 => {
            let msg = V3Message::decode_from_sequence(&mut seq)?;
            let scoped: ScopedPdu = match msg.data {
                V3MessageData::Plaintext(scoped) => scoped,
                V3MessageData::Encrypted(_) => {
                    return Err(Error::UnsupportedSecLevel { target: None });
                }
            };
            let (trap_oid, uptime, varbinds) = split_v2_notification(scoped.pdu)?;
            Ok(TrapInfo {
                origin,
                version,
                community: None,
                trap_oid,
                uptime,
                varbinds,
            })
        }
    }
}

/// Validate the RFC 3416 notification preamble and split it off.
fn split_v2_notification(pdu: Pdu) -> Result<(Oid, u32, Vec<VarBind>)> {
    if pdu.pdu_type != PduType::TrapV2 {
        return Err(Error::UnexpectedResponse {
            reason: "datagram is not a notification PDU",
        });
    }

    let mut varbinds = pdu.varbinds.into_iter();

    let uptime_vb = varbinds.next().ok_or(Error::EmptyMessage)?;
    let uptime = match (&uptime_vb.value, uptime_vb.oid == sys_uptime_oid()) {
        (Value::TimeTicks(ticks), true) => *ticks,
        _ => {
            return Err(Error::UnexpectedResponse {
                reason: "notification does not start with sysUpTime.0",
            });
        }
    };

    let trap_oid_vb = varbinds.next().ok_or(Error::EmptyMessage)?;
    let trap_oid = match (&trap_oid_vb.value, trap_oid_vb.oid == snmp_trap_oid()) {
        (Value::ObjectIdentifier(oid), true) => oid.clone(),
        _ => {
            return Err(Error::UnexpectedResponse {
                reason: "notification lacks snmpTrapOID.0",
            });
        }
    };

    Ok((trap_oid, uptime, varbinds.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::EncodeBuf;
    use crate::message::CommunityMessage;
    use crate::oid;

    fn origin() -> SocketAddr {
        "192.0.2.9:55000".parse().unwrap()
    }

    fn v2c_trap_message(trap_oid: Oid, extra: Vec<VarBind>) -> Bytes {
        let mut varbinds = vec![
            VarBind::new(sys_uptime_oid(), Value::TimeTicks(4711)),
            VarBind::new(snmp_trap_oid(), Value::ObjectIdentifier(trap_oid)),
        ];
        varbinds.extend(extra);

        let pdu = Pdu {
            pdu_type: PduType::TrapV2,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds,
        };
        CommunityMessage::v2c(b"public".as_slice(), pdu).encode()
    }

    #[test]
    fn decode_v2c_trap() {
        let link_down = oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3);
        let payload = vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3),
            Value::Integer(3),
        )];
        let data = v2c_trap_message(link_down.clone(), payload);

        let trap = decode_trap(data, origin()).unwrap();

        assert_eq!(trap.version, Version::V2c);
        assert_eq!(trap.community.as_deref(), Some(b"public".as_slice()));
        assert_eq!(trap.trap_oid, link_down);
        assert_eq!(trap.uptime, 4711);
        assert_eq!(trap.varbinds.len(), 1);
        assert_eq!(trap.origin, origin());
    }

    #[test]
    fn decode_v1_trap_translates_oid() {
        let trap = TrapV1Pdu {
            enterprise: oid!(1, 3, 6, 1, 4, 1, 9999),
            agent_addr: [10, 0, 0, 1],
            generic_trap: 3, // linkUp
            specific_trap: 0,
            time_stamp: 99,
            varbinds: vec![],
        };

        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            trap.encode(buf);
            buf.push_octet_string(b"public");
            buf.push_integer(0);
        });

        let info = decode_trap(buf.finish(), origin()).unwrap();
        assert_eq!(info.version, Version::V1);
        assert_eq!(info.trap_oid, oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 4));
        assert_eq!(info.uptime, 99);
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(decode_trap(Bytes::from_static(&[0xFF, 0x00, 0x12]), origin()).is_err());
        assert!(decode_trap(Bytes::new(), origin()).is_err());
    }

    #[test]
    fn missing_preamble_rejected() {
        let pdu = Pdu {
            pdu_type: PduType::TrapV2,
            request_id: 1,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(oid!(1, 3, 6, 1), Value::Integer(1))],
        };
        let data = CommunityMessage::v2c(b"public".as_slice(), pdu).encode();
        assert!(decode_trap(data, origin()).is_err());
    }

    #[test]
    fn non_trap_pdu_rejected() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3, 6, 1)]);
        let data = CommunityMessage::v2c(b"public".as_slice(), pdu).encode();
        assert!(decode_trap(data, origin()).is_err());
    }

    #[tokio::test]
    async fn listener_skips_garbage_and_delivers_next_trap() {
        let listener = TrapListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0xDE, 0xAD], addr).await.unwrap();
        let data = v2c_trap_message(oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1), vec![]);
        sender.send_to(&data, addr).await.unwrap();

        let trap = listener.recv().await.unwrap();
        assert_eq!(trap.trap_oid, oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1));
    }
}
