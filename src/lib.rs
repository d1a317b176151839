//! # snmpkit
//!
//! Pure client-side SNMP for Rust: v1, v2c and v3 over UDP with no
//! external SNMP runtime or MIB machinery.
//!
//! ## Features
//!
//! - Bit-exact X.690/BER codec for the SNMP wire subset
//! - SNMPv3 User-based Security Model: engine discovery, HMAC
//!   authentication, DES/AES privacy
//! - Pluggable dispatch of message processing models, security models
//!   and auth/privacy protocols by identifier
//! - Lazy WALK / BULKWALK streams and table pivoting
//! - A trap listener that survives any datagram thrown at it
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use snmpkit::{Client, Credentials, oid};
//!
//! #[tokio::main]
//! async fn main() -> snmpkit::Result<()> {
//!     let client = Client::builder("192.0.2.1", Credentials::v2c("public"))
//!         .connect()
//!         .await?;
//!
//!     let sys_descr = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//!     println!("sysDescr: {sys_descr}");
//!
//!     let mut walk = client.walk(oid!(1, 3, 6, 1, 2, 1, 1));
//!     while let Some(vb) = walk.next().await {
//!         println!("{}", vb?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3
//!
//! ```rust,no_run
//! use snmpkit::{Client, Credentials, oid};
//!
//! #[tokio::main]
//! async fn main() -> snmpkit::Result<()> {
//!     let credentials = Credentials::usm("ninja")
//!         .with_auth("md5", "theauthpass")
//!         .with_privacy("des", "privpass");
//!
//!     let client = Client::builder("192.0.2.1:161", credentials)
//!         .connect()
//!         .await?;
//!
//!     // engine discovery, key localization and time sync happen on
//!     // first contact
//!     let uptime = client.get(&oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)).await?;
//!     println!("uptime: {uptime}");
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod client;
pub mod creds;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod mpm;
pub mod oid;
pub mod pdu;
pub mod registry;
pub mod transport;
pub mod trap;
pub mod v3;
pub mod value;
pub mod varbind;

pub(crate) mod util;

// Re-exports for convenience
pub use client::{
    BulkResult, Client, ClientBuilder, ClientConfig, ErrorHandling, TableRow, Walk, tablify,
};
pub use creds::{Credentials, UsmCredentials};
pub use dispatch::{Dispatcher, MessageProcessingModel, SecurityContext, SecurityModel};
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, Result,
};
pub use message::{
    CommunityMessage, Message, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message,
    Version,
};
pub use oid::Oid;
pub use pdu::{Pdu, PduType, TrapV1Pdu};
pub use transport::{Transport, UdpTransport};
pub use trap::{TrapInfo, TrapListener, TrapStream};
pub use value::{StringKind, Value};
pub use varbind::VarBind;
