//! SNMP message envelopes.
//!
//! - [`CommunityMessage`] — v1/v2c: `SEQUENCE { version, community, pdu }`
//! - [`V3Message`] — v3: global header, security parameters, scoped PDU
//!
//! [`Message`] unifies both for places that receive arbitrary datagrams
//! (the trap listener).

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use bytes::Bytes;

/// SNMP protocol version, with its on-wire number.
///
/// The wire number doubles as the message processing model identifier in
/// the plugin dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Version {
    V1 = 0,
    V2c = 1,
    V3 = 3,
}

impl Version {
    /// Map a wire version number.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// The wire version number.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
            Self::V2c => write!(f, "2c"),
            Self::V3 => write!(f, "3"),
        }
    }
}

/// A decoded SNMP message of any version.
#[derive(Debug, Clone)]
pub enum Message {
    /// SNMPv1 or v2c community message.
    Community(CommunityMessage),
    /// SNMPv3 message.
    V3(V3Message),
}

impl Message {
    /// The message's SNMP version.
    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// Decode a datagram, detecting the version from the header.
    pub fn decode(data: Bytes) -> Result<Self> {
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
            Version::V1 | Version::V2c => {
                CommunityMessage::decode_from_sequence(&mut seq, version).map(Message::Community)
            }
            Version::V3 => V3Message::decode_from_sequence(&mut seq).map(Message::V3),
        }
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<V3Message> for Message {
    fn from(msg: V3Message) -> Self {
        Message::V3(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::Pdu;

    #[test]
    fn version_numbers() {
        assert_eq!(Version::V1.as_i32(), 0);
        assert_eq!(Version::V2c.as_i32(), 1);
        assert_eq!(Version::V3.as_i32(), 3);
        assert_eq!(Version::from_i32(2), None); // the experimental v2x slot
        assert_eq!(Version::from_i32(1), Some(Version::V2c));
    }

    #[test]
    fn decode_detects_community_version() {
        let pdu = Pdu::get_request(9, &[oid!(1, 3, 6, 1)]);
        let encoded = CommunityMessage::v1(b"public".as_slice(), pdu).encode();

        match Message::decode(encoded).unwrap() {
            Message::Community(m) => assert_eq!(m.version, Version::V1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unknown_version() {
        use crate::ber::EncodeBuf;

        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(7);
        });
        assert!(Message::decode(buf.finish()).is_err());
    }
}
