//! User-based Security Model (RFC 3414).
//!
//! [`UsmSecurityParams`] is the BER structure carried opaquely inside
//! `msgSecurityParameters`:
//!
//! ```text
//! SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING,
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```
//!
//! [`Usm`] is the security model (id 3): it encrypts the scoped PDU,
//! serializes the message with a zero-filled authentication slot, then
//! splices the first twelve HMAC bytes into that slot. Verification runs
//! the same computation over a zeroed copy and compares in constant time
//! before anything is decrypted.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::creds::security_model;
use crate::dispatch::{SecurityContext, SecurityModel};
use crate::error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, Result,
};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use crate::pdu::Pdu;
use crate::v3::auth::USM_AUTH_TAG_LEN;
use crate::v3::engine::classify_report;

/// USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    /// Authoritative engine ID.
    pub engine_id: Bytes,
    /// Engine boot counter.
    pub engine_boots: u32,
    /// Engine time, seconds since boot.
    pub engine_time: u32,
    /// User name.
    pub username: Bytes,
    /// HMAC digest slot (empty when unauthenticated).
    pub auth_params: Bytes,
    /// Privacy salt (empty when unencrypted).
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    /// Parameters for one engine and user, auth/priv slots empty.
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// All-empty parameters, as sent in a discovery request.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::new())
    }

    /// Fill the auth slot with the zero placeholder the HMAC is computed
    /// over.
    pub fn with_auth_placeholder(mut self) -> Self {
        self.auth_params = Bytes::from(vec![0u8; USM_AUTH_TAG_LEN]);
        self
    }

    /// Set the privacy parameters (the plugin's salt).
    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Encode to the BER bytes wrapped into `msgSecurityParameters`.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode from the `msgSecurityParameters` content.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let raw_boots = seq.read_integer()?;
        let raw_time = seq.read_integer()?;
        // RFC 3414: both are INTEGER (0..2147483647)
        if raw_boots < 0 || raw_boots > i32::MAX as i64 || raw_time < 0 || raw_time > i32::MAX as i64
        {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::IntegerOverflow,
            ));
        }

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: raw_boots as u32,
            engine_time: raw_time as u32,
            username,
            auth_params,
            priv_params,
        })
    }
}

/// Locate the `msgAuthenticationParameters` content inside a serialized
/// v3 message, returning `(offset, length)`.
///
/// Walks the fixed message structure rather than searching for a byte
/// pattern, so a digest that happens to contain `04 0C` cannot mislead
/// it.
pub fn find_auth_params(encoded: &[u8]) -> Option<(usize, usize)> {
    let mut pos = 0;

    // outer SEQUENCE header
    if *encoded.first()? != tag::universal::SEQUENCE {
        return None;
    }
    pos += 1;
    let (_, consumed) = read_length(encoded, pos)?;
    pos += consumed;

    // version INTEGER
    pos = skip_tlv(encoded, pos, tag::universal::INTEGER)?;

    // msgGlobalData SEQUENCE
    pos = skip_tlv(encoded, pos, tag::universal::SEQUENCE)?;

    // msgSecurityParameters OCTET STRING header (descend into it)
    if *encoded.get(pos)? != tag::universal::OCTET_STRING {
        return None;
    }
    pos += 1;
    let (_, consumed) = read_length(encoded, pos)?;
    pos += consumed;

    // USM SEQUENCE header (descend)
    if *encoded.get(pos)? != tag::universal::SEQUENCE {
        return None;
    }
    pos += 1;
    let (_, consumed) = read_length(encoded, pos)?;
    pos += consumed;

    // engineID, boots, time, username
    pos = skip_tlv(encoded, pos, tag::universal::OCTET_STRING)?;
    pos = skip_tlv(encoded, pos, tag::universal::INTEGER)?;
    pos = skip_tlv(encoded, pos, tag::universal::INTEGER)?;
    pos = skip_tlv(encoded, pos, tag::universal::OCTET_STRING)?;

    // msgAuthenticationParameters
    if *encoded.get(pos)? != tag::universal::OCTET_STRING {
        return None;
    }
    pos += 1;
    let (len, consumed) = read_length(encoded, pos)?;
    let start = pos + consumed;
    if start + len > encoded.len() {
        return None;
    }
    Some((start, len))
}

fn read_length(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    crate::ber::decode_length(data.get(pos..)?, pos).ok()
}

fn skip_tlv(data: &[u8], pos: usize, expected_tag: u8) -> Option<usize> {
    if *data.get(pos)? != expected_tag {
        return None;
    }
    let (len, consumed) = read_length(data, pos + 1)?;
    let next = pos + 1 + consumed + len;
    (next <= data.len()).then_some(next)
}

/// Build the unauthenticated engine-discovery request: empty varbinds,
/// empty user name, empty security parameters, reportable set.
pub fn discovery_request(msg_id: i32) -> Bytes {
    let global = MsgGlobalData::new(
        msg_id,
        MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        security_model::USM,
    );
    let pdu = Pdu::get_request(msg_id, &[]);
    let scoped = ScopedPdu::with_empty_context(pdu);
    V3Message::plaintext(global, UsmSecurityParams::empty().encode(), scoped).encode()
}

/// The User-based Security Model plugin (id 3).
pub struct Usm;

impl SecurityModel for Usm {
    fn identifier(&self) -> i32 {
        security_model::USM
    }

    fn generate_request(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes> {
        let usm_creds = ctx
            .credentials
            .as_usm()
            .ok_or(Error::encode(EncodeErrorKind::IncompatibleCredentials))?;
        let level = usm_creds.security_level();

        let engine = ctx
            .engine
            .ok_or(Error::encode(EncodeErrorKind::EngineNotDiscovered))?;
        let engine_boots = engine.engine_boots;
        let engine_time = engine.estimated_time();

        let scoped = ScopedPdu::new(
            ctx.effective_context_engine_id(),
            Bytes::copy_from_slice(ctx.context_name),
            pdu.clone(),
        );

        // Privacy first: the USM parameters carry the plugin's salt
        let (data, priv_params) = if level.requires_priv() {
            let protocol = &usm_creds
                .privacy
                .as_ref()
                .expect("AuthPriv level implies privacy credentials")
                .protocol;
            let plugin = ctx.dispatcher.privacy(protocol)?;
            let key = ctx
                .priv_key
                .ok_or(Error::encode(EncodeErrorKind::KeysNotDerived))?;

            let (ciphertext, priv_params) =
                plugin.encrypt(key, &scoped.to_bytes(), engine_boots, engine_time, ctx.salt)?;
            (V3MessageData::Encrypted(ciphertext), priv_params)
        } else {
            (V3MessageData::Plaintext(scoped), Bytes::new())
        };

        let mut params = UsmSecurityParams::new(
            engine.engine_id.clone(),
            engine_boots,
            engine_time,
            usm_creds.username.clone(),
        )
        .with_priv_params(priv_params);
        if level.requires_auth() {
            params = params.with_auth_placeholder();
        }

        let global = MsgGlobalData::new(
            ctx.msg_id,
            MsgFlags::new(level, true),
            security_model::USM,
        );
        let msg = V3Message {
            global_data: global,
            security_params: params.encode(),
            data,
        };
        let encoded = msg.encode();

        if !level.requires_auth() {
            return Ok(encoded);
        }

        // HMAC over the zero-slot serialization, spliced in place
        let protocol = &usm_creds
            .auth
            .as_ref()
            .expect("auth level implies auth credentials")
            .protocol;
        let plugin = ctx.dispatcher.auth(protocol)?;
        let key = ctx
            .auth_key
            .ok_or(Error::encode(EncodeErrorKind::KeysNotDerived))?;

        let (offset, len) = find_auth_params(&encoded)
            .ok_or(Error::encode(EncodeErrorKind::MissingAuthParams))?;
        debug_assert_eq!(len, USM_AUTH_TAG_LEN);

        let tag = plugin.authenticate(key, &encoded);
        let mut out = encoded.to_vec();
        out[offset..offset + len].copy_from_slice(&tag);
        Ok(Bytes::from(out))
    }

    fn process_response(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu> {
        let msg = V3Message::decode(data.clone())?;
        let params = UsmSecurityParams::decode(msg.security_params.clone())?;
        let level = msg.security_level();

        if level.requires_auth() {
            let usm_creds = ctx
                .credentials
                .as_usm()
                .ok_or(Error::encode(EncodeErrorKind::IncompatibleCredentials))?;
            let protocol = &usm_creds
                .auth
                .as_ref()
                .ok_or(Error::auth(None, AuthErrorKind::DigestMismatch))?
                .protocol;
            let plugin = ctx.dispatcher.auth(protocol)?;
            let key = ctx
                .auth_key
                .ok_or(Error::encode(EncodeErrorKind::KeysNotDerived))?;

            if params.auth_params.len() != USM_AUTH_TAG_LEN {
                return Err(Error::auth(
                    None,
                    AuthErrorKind::WrongDigestLength {
                        expected: USM_AUTH_TAG_LEN,
                        actual: params.auth_params.len(),
                    },
                ));
            }

            let (offset, len) = find_auth_params(&data)
                .ok_or(Error::auth(None, AuthErrorKind::DigestMismatch))?;
            let mut zeroed = data.to_vec();
            zeroed[offset..offset + len].fill(0);

            if !plugin.verify(key, &zeroed, &params.auth_params) {
                tracing::warn!(target: "snmpkit::usm", "incoming message failed HMAC verification");
                return Err(Error::auth(None, AuthErrorKind::DigestMismatch));
            }
        }

        // Decrypt only after authentication held
        let scoped = match msg.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let usm_creds = ctx
                    .credentials
                    .as_usm()
                    .ok_or(Error::encode(EncodeErrorKind::IncompatibleCredentials))?;
                let protocol = &usm_creds
                    .privacy
                    .as_ref()
                    .ok_or(Error::decrypt(None, CryptoErrorKind::CipherError))?
                    .protocol;
                let plugin = ctx.dispatcher.privacy(protocol)?;
                let key = ctx
                    .priv_key
                    .ok_or(Error::encode(EncodeErrorKind::KeysNotDerived))?;

                let plaintext = plugin.decrypt(
                    key,
                    &ciphertext,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                )?;
                ScopedPdu::from_bytes(plaintext)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidPlaintext))?
            }
        };

        let pdu = scoped.pdu;

        // Reports carry their meaning in the first varbind OID
        if let Some(err) = classify_report(&pdu) {
            return Err(err);
        }

        // Time window (RFC 3414 Section 3.2 step 7b), authenticated
        // messages only
        if level.requires_auth()
            && let Some(engine) = ctx.engine
            && !engine.is_in_time_window(params.engine_boots, params.engine_time)
        {
            return Err(Error::NotInTimeWindow { target: None });
        }

        Ok(pdu)
    }
}
