//! Error types for snmpkit.
//!
//! All failures funnel into a single [`Error`] enum, loosely grouped into
//! codec, protocol, security, transport, plugin and semantic kinds. The
//! fine-grained detail lives in the `*Kind` sub-enums carried inside the
//! variants so that callers can match coarsely or precisely as needed.
//!
//! [`ErrorStatus`] maps the RFC 3416 `error-status` codes returned by agents.

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Tag byte could not be interpreted (reserved bits, bad long form).
    InvalidTag,
    /// Invalid BER length encoding (indefinite form, oversized length field).
    InvalidLength,
    /// A value's content length is invalid for its type.
    InvalidValueLength { expected: usize, actual: usize },
    /// Data ended before the TLV was complete.
    IncompleteData { needed: usize, available: usize },
    /// A different type was expected at this position.
    UnexpectedType { expected: u8, actual: u8 },
    /// NULL with non-zero content.
    InvalidNull,
    /// Zero-length integer content.
    ZeroLengthInteger,
    /// Subidentifier or integer overflowed its storage.
    IntegerOverflow,
    /// Unknown SNMP version number in a message header.
    UnknownVersion(i64),
    /// Unknown PDU type tag.
    UnknownPduType(u8),
    /// msgFlags with privacy but without authentication.
    InvalidMsgFlags,
    /// OID exceeds the 128-arc limit.
    OidTooLong { count: usize, max: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag => write!(f, "invalid tag encoding"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::InvalidValueLength { expected, actual } => {
                write!(f, "invalid value length: expected {expected}, got {actual}")
            }
            Self::IncompleteData { needed, available } => {
                write!(f, "need {needed} bytes but only {available} remaining")
            }
            Self::UnexpectedType { expected, actual } => {
                write!(f, "expected tag 0x{expected:02X}, got 0x{actual:02X}")
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {v}"),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{t:02X}"),
            Self::InvalidMsgFlags => {
                write!(f, "invalid msgFlags: privacy without authentication")
            }
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {count} arcs, exceeds maximum {max}")
            }
        }
    }
}

/// BER encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// Engine not discovered yet; v3 message cannot be secured.
    EngineNotDiscovered,
    /// Localized keys not derived for this engine.
    KeysNotDerived,
    /// Could not locate the auth params slot in the serialized message.
    MissingAuthParams,
    /// Credentials do not carry what the operation needs.
    IncompatibleCredentials,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::KeysNotDerived => write!(f, "localized keys not derived"),
            Self::MissingAuthParams => {
                write!(f, "could not find auth params slot in encoded message")
            }
            Self::IncompatibleCredentials => {
                write!(f, "credentials incompatible with requested operation")
            }
        }
    }
}

/// Authentication error kinds (SNMPv3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// HMAC verification failed.
    DigestMismatch,
    /// Authentication parameters have the wrong length.
    WrongDigestLength { expected: usize, actual: usize },
    /// Agent reported usmStatsUnknownUserNames.
    UnknownUser,
    /// Agent reported usmStatsWrongDigests.
    ReportedWrongDigest,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DigestMismatch => write!(f, "HMAC verification failed"),
            Self::WrongDigestLength { expected, actual } => {
                write!(f, "wrong digest length: expected {expected}, got {actual}")
            }
            Self::UnknownUser => write!(f, "user not known to the agent"),
            Self::ReportedWrongDigest => write!(f, "agent rejected the message digest"),
        }
    }
}

/// Cryptographic error kinds (privacy encryption/decryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// Key material too short for the cipher.
    InvalidKeyLength,
    /// Privacy parameters (salt) have the wrong length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Ciphertext length is not a multiple of the block size.
    InvalidCiphertextLength { length: usize, block_size: usize },
    /// The cipher itself failed.
    CipherError,
    /// Decrypted bytes are not a valid ScopedPDU.
    InvalidPlaintext,
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(
                    f,
                    "invalid privParameters length: expected {expected}, got {actual}"
                )
            }
            Self::InvalidCiphertextLength { length, block_size } => {
                write!(
                    f,
                    "ciphertext length {length} not a multiple of block size {block_size}"
                )
            }
            Self::CipherError => write!(f, "cipher operation failed"),
            Self::InvalidPlaintext => write!(f, "decrypted data is not a valid scoped PDU"),
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// A node could not be parsed as a non-negative integer.
    InvalidNode,
    /// First node must be 0, 1 or 2.
    InvalidFirstNode(u32),
    /// Second node must be < 40 when the first node is 0 or 1.
    InvalidSecondNode { first: u32, second: u32 },
    /// OIDs require at least two nodes on the wire.
    TooShort,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNode => write!(f, "invalid OID node"),
            Self::InvalidFirstNode(v) => write!(f, "first node must be 0, 1 or 2, got {v}"),
            Self::InvalidSecondNode { first, second } => {
                write!(f, "second node {second} too large for first node {first}")
            }
            Self::TooShort => write!(f, "OID must have at least 2 nodes"),
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    /// Operation completed successfully (0).
    NoError,
    /// Response would not fit the transport (1).
    TooBig,
    /// Requested OID not found; SNMPv1 only (2).
    NoSuchName,
    /// Invalid value in a SET request (3).
    BadValue,
    /// SET attempted on a read-only object (4).
    ReadOnly,
    /// Unspecified error (5).
    GenErr,
    /// Access denied (6).
    NoAccess,
    /// SET value has the wrong ASN.1 type (7).
    WrongType,
    /// SET value has the wrong length (8).
    WrongLength,
    /// SET value uses the wrong encoding (9).
    WrongEncoding,
    /// SET value out of range (10).
    WrongValue,
    /// Row creation not supported (11).
    NoCreation,
    /// Value inconsistent with other objects (12).
    InconsistentValue,
    /// Resource needed for the SET is unavailable (13).
    ResourceUnavailable,
    /// SET commit phase failed (14).
    CommitFailed,
    /// SET undo phase failed (15).
    UndoFailed,
    /// Access denied by the access-control model (16).
    AuthorizationError,
    /// Object does not support modification (17).
    NotWritable,
    /// Named object cannot be created (18).
    InconsistentName,
    /// Unknown or future status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from a raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// The main error type for all snmpkit operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    // --- codec ---
    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER/message encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Invalid OID.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>,
    },

    // --- protocol ---
    /// Agent returned a nonzero error-status.
    ///
    /// `oid` names the offending varbind when the agent supplied a usable
    /// `error-index`; an index of 0 or out of range leaves it `None`.
    #[error("SNMP error{}: {status}", oid.as_ref().map(|o| format!(" on {o}")).unwrap_or_default())]
    ErrorResponse {
        status: ErrorStatus,
        index: u32,
        oid: Option<Oid>,
    },

    /// A datagram decoded to a message with no usable PDU.
    #[error("empty message")]
    EmptyMessage,

    /// More varbinds in the response than the request permits.
    #[error("too many varbinds in response: expected at most {expected}, got {actual}")]
    TooManyVarbinds { expected: usize, actual: usize },

    /// Response shape does not match the request (count, IDs, version).
    #[error("unexpected response: {reason}")]
    UnexpectedResponse { reason: &'static str },

    // --- security ---
    /// HMAC verification failed (SNMPv3).
    #[error("authentication failure: {kind}")]
    AuthenticationFailure {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Payload decryption failed (SNMPv3).
    #[error("decryption error: {kind}")]
    DecryptionError {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Agent does not know the engine ID we used.
    #[error("unknown engine ID")]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Message fell outside the agent's time window.
    #[error("message not in time window")]
    NotInTimeWindow { target: Option<SocketAddr> },

    /// Agent rejected the requested security level.
    #[error("unsupported security level")]
    UnsupportedSecLevel { target: Option<SocketAddr> },

    // --- transport ---
    /// No response within the deadline, after all retries.
    #[error("timeout after {elapsed:?} ({retries} retries)")]
    Timeout { elapsed: Duration, retries: u32 },

    /// Socket-level failure.
    #[error("socket error{}: {source}", target.map(|t| format!(" communicating with {t}")).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    // --- plugins ---
    /// No message processing model registered for this version number.
    #[error("unknown message processing model: {0}")]
    UnknownMessageProcessingModel(i32),

    /// No security model registered for this ID.
    #[error("unknown security model: {0}")]
    UnknownSecurityModel(i32),

    /// No authentication plugin registered under this identifier.
    #[error("unsupported authentication protocol: {0:?}")]
    UnsupportedAuthProtocol(String),

    /// No privacy plugin registered under this identifier.
    #[error("unsupported privacy protocol: {0:?}")]
    UnsupportedPrivProtocol(String),

    // --- semantic ---
    /// The agent violated the GETNEXT contract (repeated or non-increasing
    /// OID), which would loop a walk forever.
    #[error("faulty SNMP implementation: OID {oid} is not a successor of the request")]
    FaultySnmpImplementation { oid: Oid },
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error recording the input that failed to parse.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Create an authentication failure.
    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailure { target, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionError { target, kind }
    }

    /// Whether this error is eligible for the single automatic v3
    /// resync-and-retry (time window or engine rediscovery).
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            Self::NotInTimeWindow { .. } | Self::UnknownEngineId { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_roundtrip() {
        for code in 0..=18 {
            let status = ErrorStatus::from_i32(code);
            assert_eq!(status.as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
    }

    #[test]
    fn error_status_display_names() {
        assert_eq!(ErrorStatus::NoError.to_string(), "noError");
        assert_eq!(ErrorStatus::NoSuchName.to_string(), "noSuchName");
        assert_eq!(
            ErrorStatus::InconsistentName.to_string(),
            "inconsistentName"
        );
    }

    #[test]
    fn error_response_display_includes_oid() {
        let err = Error::ErrorResponse {
            status: ErrorStatus::NoSuchName,
            index: 1,
            oid: Some(crate::oid!(1, 3, 6, 1)),
        };
        let text = err.to_string();
        assert!(text.contains("noSuchName"));
        assert!(text.contains("1.3.6.1"));
    }

    #[test]
    fn needs_resync_classification() {
        assert!(Error::NotInTimeWindow { target: None }.needs_resync());
        assert!(Error::UnknownEngineId { target: None }.needs_resync());
        assert!(
            !Error::Timeout {
                elapsed: Duration::from_secs(1),
                retries: 3
            }
            .needs_resync()
        );
    }
}
