//! SNMPv3 User-based Security Model (RFC 3414).
//!
//! - [`auth`] — authentication plugins (HMAC-MD5-96, HMAC-SHA1-96) and
//!   RFC 3414 key derivation/localization
//! - [`privacy`] — privacy plugins (DES-CBC, AES-128-CFB)
//! - [`usm`] — the USM security parameters codec and security model
//! - [`engine`] — per-target authoritative engine state, discovery and
//!   the time window

pub mod auth;
pub mod engine;
pub mod privacy;
pub mod usm;

pub use auth::{AuthPlugin, HmacMd5, HmacSha1, KeyCache, KeyPurpose, USM_AUTH_TAG_LEN};
pub use engine::{EngineState, TIME_WINDOW_SECS, usm_stats};
pub use privacy::{Aes128Cfb, DesCbc, PrivPlugin, SaltCounter};
pub use usm::{Usm, UsmSecurityParams};
