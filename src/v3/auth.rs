//! Authentication plugins and key derivation (RFC 3414).
//!
//! Each plugin pairs a digest algorithm with the RFC 3414 password
//! machinery: `password_to_key` cycles the password through a 1 MiB
//! buffer and hashes it; localization binds the result to an engine with
//! `H(Ku || engineID || Ku)`. The message digest is the first twelve
//! bytes of an HMAC over the serialized message.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use digest::{Digest, KeyInit, Mac};
use hmac::Hmac;
use zeroize::Zeroizing;

/// Length of the msgAuthenticationParameters tag (HMAC-96).
pub const USM_AUTH_TAG_LEN: usize = 12;

/// RFC 3414 A.2 password expansion size.
const EXPANSION_SIZE: usize = 1_048_576;

/// An authentication protocol plugin.
///
/// Identified by a short string ("md5", "sha1") used in
/// [`Credentials`](crate::Credentials) and resolved through the
/// [dispatcher](crate::dispatch::Dispatcher).
pub trait AuthPlugin: Send + Sync {
    /// The registry identifier.
    fn identifier(&self) -> &'static str;

    /// Derive the localized key for `engine_id` from a password,
    /// using this protocol's hash (RFC 3414 Section 2.6).
    fn derive_key(&self, password: &[u8], engine_id: &[u8]) -> Vec<u8>;

    /// Compute the 12-byte message digest: `HMAC(key, message)[0..12]`.
    fn authenticate(&self, key: &[u8], message: &[u8]) -> [u8; USM_AUTH_TAG_LEN];

    /// Verify a digest in constant time.
    fn verify(&self, key: &[u8], message: &[u8], tag: &[u8]) -> bool {
        if tag.len() != USM_AUTH_TAG_LEN {
            return false;
        }
        let computed = self.authenticate(key, message);
        let mut diff = 0u8;
        for (a, b) in computed.iter().zip(tag.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// HMAC-MD5-96 (RFC 3414 Section 6).
pub struct HmacMd5;

impl AuthPlugin for HmacMd5 {
    fn identifier(&self) -> &'static str {
        "md5"
    }

    fn derive_key(&self, password: &[u8], engine_id: &[u8]) -> Vec<u8> {
        let master = password_to_key::<md5::Md5>(password);
        localize_key::<md5::Md5>(&master, engine_id)
    }

    fn authenticate(&self, key: &[u8], message: &[u8]) -> [u8; USM_AUTH_TAG_LEN] {
        type HmacMd5Mac = Hmac<md5::Md5>;
        let mut mac =
            <HmacMd5Mac as KeyInit>::new_from_slice(key).expect("HMAC accepts any key size");
        Mac::update(&mut mac, message);
        truncate_96(&mac.finalize().into_bytes())
    }
}

/// HMAC-SHA1-96 (RFC 3414 Section 7).
pub struct HmacSha1;

impl AuthPlugin for HmacSha1 {
    fn identifier(&self) -> &'static str {
        "sha1"
    }

    fn derive_key(&self, password: &[u8], engine_id: &[u8]) -> Vec<u8> {
        let master = password_to_key::<sha1::Sha1>(password);
        localize_key::<sha1::Sha1>(&master, engine_id)
    }

    fn authenticate(&self, key: &[u8], message: &[u8]) -> [u8; USM_AUTH_TAG_LEN] {
        type HmacSha1Mac = Hmac<sha1::Sha1>;
        let mut mac =
            <HmacSha1Mac as KeyInit>::new_from_slice(key).expect("HMAC accepts any key size");
        Mac::update(&mut mac, message);
        truncate_96(&mac.finalize().into_bytes())
    }
}

/// Password to master key (RFC 3414 Section A.2.1).
///
/// The password is cycled through a 1 MiB stream, hashed in 64-byte
/// chunks. An empty password hashes an all-zero stream.
fn password_to_key<D: Digest + Default>(password: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut hasher = D::new();
    let mut buf = Zeroizing::new([0u8; 64]);

    if password.is_empty() {
        for _ in 0..(EXPANSION_SIZE / 64) {
            hasher.update(*buf);
        }
        return Zeroizing::new(hasher.finalize().to_vec());
    }

    let mut index = 0;
    let mut count = 0;
    while count < EXPANSION_SIZE {
        for byte in buf.iter_mut() {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(*buf);
        count += 64;
    }

    Zeroizing::new(hasher.finalize().to_vec())
}

/// Key localization (RFC 3414 Section A.2): `H(Ku || engineID || Ku)`.
fn localize_key<D: Digest + Default>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master);
    hasher.update(engine_id);
    hasher.update(master);
    hasher.finalize().to_vec()
}

/// Truncate a full HMAC output to the 96-bit tag.
fn truncate_96(full: &[u8]) -> [u8; USM_AUTH_TAG_LEN] {
    let mut tag = [0u8; USM_AUTH_TAG_LEN];
    tag.copy_from_slice(&full[..USM_AUTH_TAG_LEN]);
    tag
}

/// What a localized key is used for.
///
/// The privacy key is derived through the *auth* protocol's hash with the
/// privacy password, so the purpose disambiguates otherwise identical
/// cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Authentication,
    Privacy,
}

/// Cache of localized keys, keyed by `(user, engine_id, protocol,
/// purpose)`.
///
/// The 1 MiB password expansion is the expensive step; one entry per
/// engine contact amortizes it across requests and resyncs.
pub struct KeyCache {
    entries: Mutex<HashMap<(Bytes, Bytes, &'static str, KeyPurpose), Vec<u8>>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the localized key for `(user, engine_id, plugin, purpose)`,
    /// deriving and caching it on first use.
    pub fn localized(
        &self,
        plugin: &dyn AuthPlugin,
        user: &Bytes,
        password: &[u8],
        engine_id: &Bytes,
        purpose: KeyPurpose,
    ) -> Vec<u8> {
        let key = (user.clone(), engine_id.clone(), plugin.identifier(), purpose);
        let mut entries = self.entries.lock().expect("key cache poisoned");
        entries
            .entry(key)
            .or_insert_with(|| plugin.derive_key(password, engine_id))
            .clone()
    }

    /// Drop every cached key (e.g. after credentials change).
    pub fn clear(&self) {
        self.entries.lock().expect("key cache poisoned").clear();
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::hex;

    #[test]
    fn password_to_key_md5_rfc_vector() {
        // RFC 3414 Appendix A.3.1, password "maplesyrup"
        let key = password_to_key::<md5::Md5>(b"maplesyrup");
        assert_eq!(hex::encode(&key), "9faf3283884e92834ebc9847d8edd963");
    }

    #[test]
    fn password_to_key_sha1_rfc_vector() {
        // RFC 3414 Appendix A.3.2
        let key = password_to_key::<sha1::Sha1>(b"maplesyrup");
        assert_eq!(
            hex::encode(&key),
            "9fb5cc0381497b3793528939ff788d5d79145211"
        );
    }

    #[test]
    fn localized_key_md5_rfc_vector() {
        // RFC 3414 Appendix A.3.1, engine ID 000000000000000000000002
        let engine_id = hex::decode("000000000000000000000002").unwrap();
        let key = HmacMd5.derive_key(b"maplesyrup", &engine_id);
        assert_eq!(hex::encode(&key), "526f5eed9fcce26f8964c2930787d82b");
    }

    #[test]
    fn localized_key_sha1_rfc_vector() {
        // RFC 3414 Appendix A.3.2
        let engine_id = hex::decode("000000000000000000000002").unwrap();
        let key = HmacSha1.derive_key(b"maplesyrup", &engine_id);
        assert_eq!(
            hex::encode(&key),
            "6695febc9288e36282235fc7151f128497b38f3f"
        );
    }

    #[test]
    fn authenticate_and_verify() {
        let key = HmacMd5.derive_key(b"theauthpass", b"engine");
        let tag = HmacMd5.authenticate(&key, b"a serialized message");

        assert_eq!(tag.len(), USM_AUTH_TAG_LEN);
        assert!(HmacMd5.verify(&key, b"a serialized message", &tag));
        assert!(!HmacMd5.verify(&key, b"a different message", &tag));

        let mut bad_tag = tag;
        bad_tag[0] ^= 0xFF;
        assert!(!HmacMd5.verify(&key, b"a serialized message", &bad_tag));

        // wrong tag length never verifies
        assert!(!HmacMd5.verify(&key, b"a serialized message", &tag[..8]));
    }

    #[test]
    fn empty_password_derives_deterministically() {
        let a = HmacMd5.derive_key(b"", b"engine");
        let b = HmacMd5.derive_key(b"", b"engine");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn key_cache_reuses_entries() {
        let cache = KeyCache::new();
        let user = Bytes::from_static(b"ninja");
        let engine = Bytes::from_static(b"engine-1");

        let first = cache.localized(
            &HmacMd5,
            &user,
            b"theauthpass",
            &engine,
            KeyPurpose::Authentication,
        );
        let second = cache.localized(
            &HmacMd5,
            &user,
            b"theauthpass",
            &engine,
            KeyPurpose::Authentication,
        );
        assert_eq!(first, second);

        // distinct engine gives a distinct key
        let other_engine = Bytes::from_static(b"engine-2");
        let third = cache.localized(
            &HmacMd5,
            &user,
            b"theauthpass",
            &other_engine,
            KeyPurpose::Authentication,
        );
        assert_ne!(first, third);
    }

    #[test]
    fn key_cache_separates_purposes() {
        let cache = KeyCache::new();
        let user = Bytes::from_static(b"ninja");
        let engine = Bytes::from_static(b"engine-1");

        let auth = cache.localized(
            &HmacMd5,
            &user,
            b"theauthpass",
            &engine,
            KeyPurpose::Authentication,
        );
        // same protocol, different password under the Privacy purpose
        let privacy = cache.localized(&HmacMd5, &user, b"privpass", &engine, KeyPurpose::Privacy);

        assert_ne!(auth, privacy);
        assert_eq!(privacy, HmacMd5.derive_key(b"privpass", b"engine-1"));
    }
}
