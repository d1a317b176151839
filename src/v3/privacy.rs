//! Privacy plugins (RFC 3414 Section 8, RFC 3826).
//!
//! Salt/IV construction differs per cipher:
//!
//! - **DES-CBC**: privParameters = engineBoots(4) || counter(4); the IV
//!   is the pre-IV (last 8 bytes of the 16-byte localized key) XOR the
//!   salt.
//! - **AES-128-CFB**: privParameters = 64-bit counter; the IV is
//!   engineBoots(4) || engineTime(4) || salt(8) by concatenation, not XOR.
//!
//! Plugins are stateless; the caller supplies the monotonically
//! increasing salt from a [`SaltCounter`].

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::{CryptoErrorKind, Error, Result};

/// Length of the privParameters field for both plugins.
const PRIV_PARAMS_LEN: usize = 8;

/// A privacy protocol plugin.
///
/// `key` is the localized privacy key (derived through the configured
/// auth protocol's hash); each plugin consumes the prefix it needs.
pub trait PrivPlugin: Send + Sync {
    /// The registry identifier ("des", "aes").
    fn identifier(&self) -> &'static str;

    /// Encrypt a serialized ScopedPDU.
    ///
    /// Returns `(ciphertext, priv_params)`; the privacy parameters travel
    /// in `msgPrivacyParameters`.
    fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)>;

    /// Decrypt a ScopedPDU using the privacy parameters from the message.
    fn decrypt(
        &self,
        key: &[u8],
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes>;
}

/// DES-CBC privacy (RFC 3414 Section 8.1).
pub struct DesCbc;

impl DesCbc {
    fn split_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
        if key.len() < 16 {
            return Err(Error::decrypt(None, CryptoErrorKind::InvalidKeyLength));
        }
        Ok((&key[..8], &key[8..16]))
    }
}

impl PrivPlugin for DesCbc {
    fn identifier(&self) -> &'static str {
        "des"
    }

    fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        engine_boots: u32,
        _engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
        type Encryptor = cbc::Encryptor<des::Des>;

        let (des_key, pre_iv) = Self::split_key(key)?;

        // Salt: engineBoots (4 bytes) || low 32 bits of the counter
        let mut salt_bytes = [0u8; PRIV_PARAMS_LEN];
        salt_bytes[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt_bytes[4..].copy_from_slice(&(salt as u32).to_be_bytes());

        // IV = pre-IV XOR salt
        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ salt_bytes[i];
        }

        // Zero-pad to the block size
        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        let cipher = Encryptor::new_from_slices(des_key, &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        Ok((
            Bytes::copy_from_slice(ciphertext),
            Bytes::copy_from_slice(&salt_bytes),
        ))
    }

    fn decrypt(
        &self,
        key: &[u8],
        ciphertext: &[u8],
        _engine_boots: u32,
        _engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
        type Decryptor = cbc::Decryptor<des::Des>;

        if priv_params.len() != PRIV_PARAMS_LEN {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: PRIV_PARAMS_LEN,
                    actual: priv_params.len(),
                },
            ));
        }
        if !ciphertext.len().is_multiple_of(8) || ciphertext.is_empty() {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                },
            ));
        }

        let (des_key, pre_iv) = Self::split_key(key)?;

        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ priv_params[i];
        }

        let cipher = Decryptor::new_from_slices(des_key, &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;

        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        Ok(Bytes::copy_from_slice(plaintext))
    }
}

/// AES-128-CFB privacy (RFC 3826).
pub struct Aes128Cfb;

impl PrivPlugin for Aes128Cfb {
    fn identifier(&self) -> &'static str {
        "aes"
    }

    fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
        type Encryptor = cfb_mode::Encryptor<aes::Aes128>;

        if key.len() < 16 {
            return Err(Error::decrypt(None, CryptoErrorKind::InvalidKeyLength));
        }

        let salt_bytes = salt.to_be_bytes();
        let iv = build_aes_iv(engine_boots, engine_time, &salt_bytes);

        let mut buffer = plaintext.to_vec();
        let cipher = Encryptor::new_from_slices(&key[..16], &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        cipher.encrypt(&mut buffer);

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    fn decrypt(
        &self,
        key: &[u8],
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
        type Decryptor = cfb_mode::Decryptor<aes::Aes128>;

        if priv_params.len() != PRIV_PARAMS_LEN {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: PRIV_PARAMS_LEN,
                    actual: priv_params.len(),
                },
            ));
        }
        if key.len() < 16 {
            return Err(Error::decrypt(None, CryptoErrorKind::InvalidKeyLength));
        }

        let iv = build_aes_iv(engine_boots, engine_time, priv_params);

        let mut buffer = ciphertext.to_vec();
        let cipher = Decryptor::new_from_slices(&key[..16], &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;
        cipher.decrypt(&mut buffer);

        Ok(Bytes::from(buffer))
    }
}

/// RFC 3826 IV: engineBoots || engineTime || salt, concatenated.
fn build_aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(&salt[..8]);
    iv
}

/// Monotonically increasing salt source, seeded from OS randomness.
///
/// Zero is skipped on wraparound so an IV is never reused with a zero
/// counter.
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    /// Create a counter seeded from `getrandom`.
    pub fn new() -> Self {
        let mut buf = [0u8; 8];
        loop {
            getrandom::fill(&mut buf).expect("OS random source unavailable");
            let seed = u64::from_ne_bytes(buf);
            if seed != 0 {
                return Self(AtomicU64::new(seed));
            }
        }
    }

    /// Create a counter with a fixed seed (tests and transcripts).
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// The next salt value; never zero.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::SeqCst);
        if val == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}
