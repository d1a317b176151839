//! Plugin dispatch.
//!
//! Four pluggable component kinds are resolved by identifier at runtime:
//!
//! | kind | key | built-ins |
//! |---|---|---|
//! | message processing model | wire version (i32) | 0 (v1), 1 (v2c), 3 (v3) |
//! | security model | RFC 3411 id (i32) | 1 (v1 community), 2 (v2c community), 3 (USM) |
//! | authentication protocol | string | "md5", "sha1" |
//! | privacy protocol | string | "des", "aes" |
//!
//! A [`Dispatcher`] owns the four lookup tables. They are built once at
//! startup and read-only afterwards; lookups are O(1). Registering the
//! same identifier twice panics — identifier clashes are programming
//! errors. A lookup miss surfaces the matching plugin error
//! (`UnknownMessageProcessingModel`, `UnknownSecurityModel`,
//! `UnsupportedAuthProtocol`, `UnsupportedPrivProtocol`).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;

use crate::creds::Credentials;
use crate::error::{Error, Result};
use crate::pdu::Pdu;
use crate::v3::auth::AuthPlugin;
use crate::v3::engine::EngineState;
use crate::v3::privacy::PrivPlugin;

/// Everything a message processing or security model may need to secure
/// an outgoing request or open a response.
///
/// Community models use only `credentials`; USM uses the rest. Fields
/// irrelevant to the selected model are simply ignored.
pub struct SecurityContext<'a> {
    /// The client's credentials.
    pub credentials: &'a Credentials,
    /// Message ID at the MPM layer (v3; distinct from the request-id).
    pub msg_id: i32,
    /// Discovered authoritative engine state, if any.
    pub engine: Option<&'a EngineState>,
    /// Context engine ID override; defaults to the discovered engine ID.
    pub context_engine_id: Option<&'a Bytes>,
    /// v3 context name.
    pub context_name: &'a [u8],
    /// Localized authentication key.
    pub auth_key: Option<&'a [u8]>,
    /// Localized privacy key.
    pub priv_key: Option<&'a [u8]>,
    /// Salt for the privacy plugin's IV.
    pub salt: u64,
    /// The dispatcher, for nested lookups (security -> auth/priv).
    pub dispatcher: &'a Dispatcher,
}

/// A message processing model: wraps a PDU into the version-specific
/// envelope and unwraps responses.
pub trait MessageProcessingModel: Send + Sync {
    /// The wire version number this model handles.
    fn identifier(&self) -> i32;

    /// Serialize an outgoing request message.
    fn prepare_outgoing(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes>;

    /// Parse, verify and unwrap an incoming datagram down to its PDU.
    fn process_incoming(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu>;
}

/// A security model: applies and checks message-level security.
pub trait SecurityModel: Send + Sync {
    /// The RFC 3411 security model number.
    fn identifier(&self) -> i32;

    /// Build the secured wire form of a request.
    fn generate_request(&self, pdu: &Pdu, ctx: &SecurityContext<'_>) -> Result<Bytes>;

    /// Verify and open a response datagram, returning the inner PDU.
    fn process_response(&self, data: Bytes, ctx: &SecurityContext<'_>) -> Result<Pdu>;
}

/// The four plugin lookup tables.
pub struct Dispatcher {
    mpms: HashMap<i32, Arc<dyn MessageProcessingModel>>,
    security_models: HashMap<i32, Arc<dyn SecurityModel>>,
    auth_plugins: HashMap<&'static str, Arc<dyn AuthPlugin>>,
    priv_plugins: HashMap<&'static str, Arc<dyn PrivPlugin>>,
}

impl Dispatcher {
    /// An empty dispatcher; callers register every plugin themselves.
    pub fn empty() -> Self {
        Self {
            mpms: HashMap::new(),
            security_models: HashMap::new(),
            auth_plugins: HashMap::new(),
            priv_plugins: HashMap::new(),
        }
    }

    /// A dispatcher with every built-in plugin registered.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::empty();

        dispatcher.register_mpm(Arc::new(crate::mpm::V1Mpm));
        dispatcher.register_mpm(Arc::new(crate::mpm::V2cMpm));
        dispatcher.register_mpm(Arc::new(crate::mpm::V3Mpm));

        dispatcher.register_security_model(Arc::new(crate::mpm::CommunityV1));
        dispatcher.register_security_model(Arc::new(crate::mpm::CommunityV2c));
        dispatcher.register_security_model(Arc::new(crate::v3::Usm));

        dispatcher.register_auth(Arc::new(crate::v3::HmacMd5));
        dispatcher.register_auth(Arc::new(crate::v3::HmacSha1));

        dispatcher.register_privacy(Arc::new(crate::v3::DesCbc));
        dispatcher.register_privacy(Arc::new(crate::v3::Aes128Cfb));

        dispatcher
    }

    /// The process-wide dispatcher with default plugins, built once on
    /// first use and shared by every client that does not supply its own.
    pub fn shared() -> Arc<Dispatcher> {
        static SHARED: LazyLock<Arc<Dispatcher>> =
            LazyLock::new(|| Arc::new(Dispatcher::with_defaults()));
        SHARED.clone()
    }

    /// Register a message processing model.
    ///
    /// # Panics
    /// Panics if the identifier is already registered.
    pub fn register_mpm(&mut self, mpm: Arc<dyn MessageProcessingModel>) {
        let id = mpm.identifier();
        if self.mpms.insert(id, mpm).is_some() {
            panic!("message processing model {id} registered twice");
        }
    }

    /// Register a security model.
    ///
    /// # Panics
    /// Panics if the identifier is already registered.
    pub fn register_security_model(&mut self, model: Arc<dyn SecurityModel>) {
        let id = model.identifier();
        if self.security_models.insert(id, model).is_some() {
            panic!("security model {id} registered twice");
        }
    }

    /// Register an authentication plugin.
    ///
    /// # Panics
    /// Panics if the identifier is already registered.
    pub fn register_auth(&mut self, plugin: Arc<dyn AuthPlugin>) {
        let id = plugin.identifier();
        if self.auth_plugins.insert(id, plugin).is_some() {
            panic!("auth plugin {id:?} registered twice");
        }
    }

    /// Register a privacy plugin.
    ///
    /// # Panics
    /// Panics if the identifier is already registered.
    pub fn register_privacy(&mut self, plugin: Arc<dyn PrivPlugin>) {
        let id = plugin.identifier();
        if self.priv_plugins.insert(id, plugin).is_some() {
            panic!("privacy plugin {id:?} registered twice");
        }
    }

    /// Look up a message processing model by wire version.
    pub fn mpm(&self, id: i32) -> Result<&dyn MessageProcessingModel> {
        self.mpms
            .get(&id)
            .map(|m| m.as_ref())
            .ok_or(Error::UnknownMessageProcessingModel(id))
    }

    /// Look up a security model by number.
    pub fn security_model(&self, id: i32) -> Result<&dyn SecurityModel> {
        self.security_models
            .get(&id)
            .map(|m| m.as_ref())
            .ok_or(Error::UnknownSecurityModel(id))
    }

    /// Look up an authentication plugin by identifier.
    pub fn auth(&self, id: &str) -> Result<&dyn AuthPlugin> {
        self.auth_plugins
            .get(id)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnsupportedAuthProtocol(id.to_string()))
    }

    /// Look up a privacy plugin by identifier.
    pub fn privacy(&self, id: &str) -> Result<&dyn PrivPlugin> {
        self.priv_plugins
            .get(id)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnsupportedPrivProtocol(id.to_string()))
    }
}

impl<'a> SecurityContext<'a> {
    /// A minimal context for community (v1/v2c) exchanges.
    pub fn community(credentials: &'a Credentials, dispatcher: &'a Dispatcher) -> Self {
        Self {
            credentials,
            msg_id: 0,
            engine: None,
            context_engine_id: None,
            context_name: b"",
            auth_key: None,
            priv_key: None,
            salt: 0,
            dispatcher,
        }
    }

    /// The effective context engine ID: the override when configured,
    /// otherwise the discovered engine ID.
    pub fn effective_context_engine_id(&self) -> Bytes {
        if let Some(id) = self.context_engine_id {
            return id.clone();
        }
        self.engine
            .map(|e| e.engine_id.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let d = Dispatcher::with_defaults();

        assert_eq!(d.mpm(0).unwrap().identifier(), 0);
        assert_eq!(d.mpm(1).unwrap().identifier(), 1);
        assert_eq!(d.mpm(3).unwrap().identifier(), 3);

        assert_eq!(d.security_model(1).unwrap().identifier(), 1);
        assert_eq!(d.security_model(2).unwrap().identifier(), 2);
        assert_eq!(d.security_model(3).unwrap().identifier(), 3);

        assert_eq!(d.auth("md5").unwrap().identifier(), "md5");
        assert_eq!(d.auth("sha1").unwrap().identifier(), "sha1");
        assert_eq!(d.privacy("des").unwrap().identifier(), "des");
        assert_eq!(d.privacy("aes").unwrap().identifier(), "aes");
    }

    #[test]
    fn unknown_ids_error() {
        let d = Dispatcher::with_defaults();

        assert!(matches!(
            d.mpm(2),
            Err(Error::UnknownMessageProcessingModel(2))
        ));
        assert!(matches!(
            d.security_model(99),
            Err(Error::UnknownSecurityModel(99))
        ));
        assert!(matches!(
            d.auth("sha256"),
            Err(Error::UnsupportedAuthProtocol(_))
        ));
        assert!(matches!(
            d.privacy("aes256"),
            Err(Error::UnsupportedPrivProtocol(_))
        ));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut d = Dispatcher::with_defaults();
        d.register_auth(Arc::new(crate::v3::HmacMd5));
    }

    #[test]
    fn shared_is_singleton() {
        assert!(Arc::ptr_eq(&Dispatcher::shared(), &Dispatcher::shared()));
    }
}
