//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData {
//!         INTEGER msgID
//!         INTEGER msgMaxSize
//!         OCTET STRING msgFlags (1 byte)
//!         INTEGER msgSecurityModel
//!     }
//!     OCTET STRING msgSecurityParameters (opaque, model-specific BER)
//!     msgData (plaintext ScopedPDU SEQUENCE, or encrypted OCTET STRING)
//! }
//! ```
//!
//! `msgID` correlates at the message-processing layer and is distinct
//! from the PDU `request-id` inside the scoped PDU.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use bytes::Bytes;

/// RFC 3412 minimum acceptable msgMaxSize.
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// Default advertised msgMaxSize (the maximum UDP payload).
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// SNMPv3 security level, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No authentication, no privacy.
    NoAuthNoPriv,
    /// Authentication only.
    AuthNoPriv,
    /// Authentication and privacy.
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the low bits of the msgFlags byte.
    ///
    /// Privacy without authentication is invalid per RFC 3412.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    /// Encode to msgFlags bits (without the reportable flag).
    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    /// Whether messages at this level are authenticated.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    /// Whether messages at this level are encrypted.
    pub fn requires_priv(self) -> bool {
        matches!(self, Self::AuthPriv)
    }
}

/// msgFlags (RFC 3412 Section 6.4): security level plus the reportable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    /// Create message flags.
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// Decode from the flags byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let security_level = SecurityLevel::from_flags(byte)
            .ok_or(Error::decode(0, DecodeErrorKind::InvalidMsgFlags))?;
        Ok(Self {
            security_level,
            reportable: byte & 0x04 != 0,
        })
    }

    /// Encode to the flags byte.
    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    /// Message identifier for MPM-level correlation.
    pub msg_id: i32,
    /// Largest message the sender accepts.
    pub msg_max_size: i32,
    /// Security level and reportable flag.
    pub msg_flags: MsgFlags,
    /// Security model identifier (USM is 3).
    pub msg_security_model: i32,
}

impl MsgGlobalData {
    /// Create global data for the given security model.
    pub fn new(msg_id: i32, msg_flags: MsgFlags, msg_security_model: i32) -> Self {
        Self {
            msg_id,
            msg_max_size: DEFAULT_MSG_MAX_SIZE,
            msg_flags,
            msg_security_model,
        }
    }

    /// Encode into the buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model as i64);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size as i64);
            buf.push_integer(self.msg_id as i64);
        });
    }

    /// Decode, validating the RFC 3412 msgMaxSize floor.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer32()?;
        let msg_max_size = seq.read_integer32()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidValueLength {
                    expected: MSG_MAX_SIZE_MINIMUM as usize,
                    actual: msg_max_size.max(0) as usize,
                },
            ));
        }

        let flags_bytes = seq.read_octet_string()?;
        if flags_bytes.len() != 1 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidValueLength {
                    expected: 1,
                    actual: flags_bytes.len(),
                },
            ));
        }
        let msg_flags = MsgFlags::from_byte(flags_bytes[0])?;

        let msg_security_model = seq.read_integer32()?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// ScopedPDU: context engine ID, context name and the PDU.
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    /// Context engine ID (normally the authoritative engine ID).
    pub context_engine_id: Bytes,
    /// Context name (normally empty).
    pub context_name: Bytes,
    /// The inner PDU.
    pub pdu: Pdu,
}

impl ScopedPdu {
    /// Create a scoped PDU.
    pub fn new(
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
    ) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    /// Scoped PDU with empty context (the discovery case).
    pub fn with_empty_context(pdu: Pdu) -> Self {
        Self::new(Bytes::new(), Bytes::new(), pdu)
    }

    /// Encode into the buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    /// Encode standalone (the plaintext handed to a privacy plugin).
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode from the decoder.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;

        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }

    /// Decode from standalone bytes (decrypted msgData).
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        Self::decode(&mut decoder)
    }
}

/// The msgData payload.
#[derive(Debug, Clone)]
pub enum V3MessageData {
    /// Plaintext scoped PDU (noAuthNoPriv / authNoPriv).
    Plaintext(ScopedPdu),
    /// Encrypted scoped PDU (authPriv), raw ciphertext.
    Encrypted(Bytes),
}

/// SNMPv3 message.
#[derive(Debug, Clone)]
pub struct V3Message {
    /// Global header.
    pub global_data: MsgGlobalData,
    /// Opaque security parameters (model-specific BER inside an
    /// OCTET STRING).
    pub security_params: Bytes,
    /// The payload.
    pub data: V3MessageData,
}

impl V3Message {
    /// Create a message with plaintext payload.
    pub fn plaintext(
        global_data: MsgGlobalData,
        security_params: Bytes,
        scoped_pdu: ScopedPdu,
    ) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    /// Create a message with encrypted payload.
    pub fn encrypted(global_data: MsgGlobalData, security_params: Bytes, ciphertext: Bytes) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(ciphertext),
        }
    }

    /// The scoped PDU, if the payload is plaintext.
    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Consume, returning the scoped PDU if plaintext.
    pub fn into_scoped_pdu(self) -> Option<ScopedPdu> {
        match self.data {
            V3MessageData::Plaintext(pdu) => Some(pdu),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// The message ID.
    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    /// The security level from msgFlags.
    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// Encode to BER.
    ///
    /// Authenticated messages are encoded with a zero-filled auth-params
    /// slot; the security model computes the HMAC over these bytes and
    /// splices the tag in afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();

        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped_pdu) => scoped_pdu.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }

            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });

        buf.finish()
    }

    /// Decode from BER.
    ///
    /// Encrypted payloads come back as [`V3MessageData::Encrypted`]; the
    /// security model decrypts after verifying authentication.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let version = seq.read_integer()?;
        if version != 3 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version),
            ));
        }

        Self::decode_from_sequence(&mut seq)
    }

    /// Decode from a sequence whose version integer was already consumed.
    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}
