//! Client credentials.
//!
//! The credential variant selects both the message processing model (by
//! wire version) and the security model (by numeric ID) in the
//! [dispatcher](crate::dispatch). V3 credentials name their auth/privacy
//! plugins by string identifier; the authoritative engine ID, boots and
//! time are never configured here — they are discovered.

use bytes::Bytes;

use crate::message::SecurityLevel;

/// Security model identifiers (RFC 3411 SnmpSecurityModel).
pub mod security_model {
    /// SNMPv1 community model.
    pub const V1: i32 = 1;
    /// SNMPv2c community model.
    pub const V2C: i32 = 2;
    /// User-based Security Model.
    pub const USM: i32 = 3;
}

/// A named protocol with its password, e.g. `("md5", "theauthpass")`.
#[derive(Clone)]
pub struct ProtocolCredential {
    /// Plugin identifier ("md5", "sha1", "des", "aes").
    pub protocol: String,
    /// The password; localized per engine before use.
    pub password: Vec<u8>,
}

impl ProtocolCredential {
    /// Create a protocol credential.
    pub fn new(protocol: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            protocol: protocol.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for ProtocolCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolCredential")
            .field("protocol", &self.protocol)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// USM (SNMPv3) credentials.
#[derive(Debug, Clone)]
pub struct UsmCredentials {
    /// USM user name.
    pub username: Bytes,
    /// Authentication protocol and password, if authenticating.
    pub auth: Option<ProtocolCredential>,
    /// Privacy protocol and password, if encrypting.
    pub privacy: Option<ProtocolCredential>,
}

impl UsmCredentials {
    /// The security level implied by the configured protocols.
    ///
    /// Privacy without authentication is not expressible: the privacy key
    /// is derived through the auth protocol's hash, so `privacy` is
    /// ignored unless `auth` is set.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }
}

/// Client credentials, one variant per protocol family.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// SNMPv1 with a community string.
    V1 { community: Bytes },
    /// SNMPv2c with a community string.
    V2c { community: Bytes },
    /// SNMPv3 with USM.
    Usm(UsmCredentials),
}

impl Credentials {
    /// SNMPv1 credentials.
    pub fn v1(community: impl Into<Bytes>) -> Self {
        Self::V1 {
            community: community.into(),
        }
    }

    /// SNMPv2c credentials.
    pub fn v2c(community: impl Into<Bytes>) -> Self {
        Self::V2c {
            community: community.into(),
        }
    }

    /// SNMPv3 USM credentials without authentication or privacy.
    pub fn usm(username: impl Into<Bytes>) -> Self {
        Self::Usm(UsmCredentials {
            username: username.into(),
            auth: None,
            privacy: None,
        })
    }

    /// Add an authentication protocol (by plugin identifier) and password.
    ///
    /// # Panics
    /// Panics on non-USM credentials.
    pub fn with_auth(mut self, protocol: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        match &mut self {
            Self::Usm(usm) => usm.auth = Some(ProtocolCredential::new(protocol, password)),
            _ => panic!("authentication requires USM credentials"),
        }
        self
    }

    /// Add a privacy protocol (by plugin identifier) and password.
    ///
    /// # Panics
    /// Panics on non-USM credentials.
    pub fn with_privacy(
        mut self,
        protocol: impl Into<String>,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        match &mut self {
            Self::Usm(usm) => usm.privacy = Some(ProtocolCredential::new(protocol, password)),
            _ => panic!("privacy requires USM credentials"),
        }
        self
    }

    /// The message processing model identifier (the wire version number).
    pub fn mpm_id(&self) -> i32 {
        match self {
            Self::V1 { .. } => 0,
            Self::V2c { .. } => 1,
            Self::Usm(_) => 3,
        }
    }

    /// The security model identifier.
    pub fn security_model_id(&self) -> i32 {
        match self {
            Self::V1 { .. } => security_model::V1,
            Self::V2c { .. } => security_model::V2C,
            Self::Usm(_) => security_model::USM,
        }
    }

    /// The community string for v1/v2c credentials.
    pub fn community(&self) -> Option<&Bytes> {
        match self {
            Self::V1 { community } | Self::V2c { community } => Some(community),
            Self::Usm(_) => None,
        }
    }

    /// The USM part of v3 credentials.
    pub fn as_usm(&self) -> Option<&UsmCredentials> {
        match self {
            Self::Usm(usm) => Some(usm),
            _ => None,
        }
    }

    /// Whether GETBULK is available (v2c and v3 only).
    pub fn supports_bulk(&self) -> bool {
        !matches!(self, Self::V1 { .. })
    }
}
