//! Community-based message format (SNMPv1 and v2c).
//!
//! Both versions share the structure
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu }`; only the
//! version number differs (0 for v1, 1 for v2c).

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use bytes::Bytes;

use super::Version;

/// SNMPv1/v2c message.
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    /// V1 or V2c.
    pub version: Version,
    /// Community string.
    pub community: Bytes,
    /// The wrapped PDU.
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a community message.
    ///
    /// # Panics
    /// Panics on [`Version::V3`]; v3 messages use
    /// [`V3Message`](super::V3Message).
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        assert!(
            matches!(version, Version::V1 | Version::V2c),
            "CommunityMessage carries v1/v2c only, not {version:?}"
        );
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// V1 convenience constructor.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    /// V2c convenience constructor.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32() as i64);
        });

        buf.finish()
    }

    /// Decode from BER.
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

        Self::decode_from_sequence(&mut seq, version)
    }

    /// Decode from a sequence whose version integer was already consumed.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        if version == Version::V3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(3),
            ));
        }

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
