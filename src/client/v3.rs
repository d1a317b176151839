//! SNMPv3 client plumbing: engine discovery, key derivation and the
//! resync-and-retry send path.

use bytes::Bytes;
use zeroize::Zeroizing;

use crate::dispatch::SecurityContext;
use crate::error::{EncodeErrorKind, Error, Result};
use crate::message::V3Message;
use crate::mpm;
use crate::pdu::Pdu;
use crate::transport::Transport;
use crate::util::hex;
use crate::v3::engine::{self, EngineState};
use crate::v3::usm;
use crate::v3::KeyPurpose;

use super::Client;

/// Localized keys for the currently cached engine.
pub(crate) struct DerivedKeys {
    pub auth: Option<Zeroizing<Vec<u8>>>,
    pub privacy: Option<Zeroizing<Vec<u8>>>,
}

impl<T: Transport> Client<T> {
    /// Send a PDU over v3, discovering the engine on first contact and
    /// performing the single automatic resync on `notInTimeWindow` /
    /// `unknownEngineID`.
    pub(super) async fn send_v3(&self, pdu: &Pdu) -> Result<Pdu> {
        self.ensure_engine().await?;

        match self.try_send_v3(pdu).await {
            Err(e) if e.needs_resync() => {
                tracing::debug!(
                    target: "snmpkit::client",
                    peer = %self.inner.target,
                    error = %e,
                    "resynchronizing with authoritative engine"
                );
                self.rediscover().await?;
                self.try_send_v3(pdu).await
            }
            other => other,
        }
    }

    async fn try_send_v3(&self, pdu: &Pdu) -> Result<Pdu> {
        // Snapshot the engine state so the lock is not held across I/O.
        let engine = {
            let guard = self.inner.engine.lock().await;
            guard
                .clone()
                .ok_or(Error::encode(EncodeErrorKind::EngineNotDiscovered))?
        };
        let keys = self.derive_keys(&engine)?;

        let ctx = SecurityContext {
            credentials: &self.inner.config.credentials,
            // msgID mirrors the request-id so one value correlates both
            // layers
            msg_id: pdu.request_id,
            engine: Some(&engine),
            context_engine_id: self.inner.config.context_engine_id.as_ref(),
            context_name: &self.inner.config.context_name,
            auth_key: keys.auth.as_deref().map(Vec::as_slice),
            priv_key: keys.privacy.as_deref().map(Vec::as_slice),
            salt: self.inner.salt_counter.next(),
            dispatcher: &self.inner.dispatcher,
        };

        let wire = mpm::encode_request(pdu, &ctx)?;
        let bytes = self.transmit(&wire).await?;
        mpm::decode_response(bytes, &ctx)
    }

    /// Discover the authoritative engine if not already cached.
    ///
    /// The lock is held across the network exchange so concurrent first
    /// requests trigger a single discovery.
    async fn ensure_engine(&self) -> Result<()> {
        let mut guard = self.inner.engine.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(self.discover().await?);
        Ok(())
    }

    /// Unconditionally re-discover (time resync).
    async fn rediscover(&self) -> Result<()> {
        let mut guard = self.inner.engine.lock().await;
        *guard = Some(self.discover().await?);
        Ok(())
    }

    async fn discover(&self) -> Result<EngineState> {
        let msg_id = self.next_request_id();
        tracing::debug!(
            target: "snmpkit::client",
            peer = %self.inner.target,
            msg_id,
            "discovering authoritative engine"
        );

        let wire = usm::discovery_request(msg_id);
        let bytes = self.transmit(&wire).await?;

        let response = V3Message::decode(bytes)?;
        let state = engine::parse_discovery_response(&response.security_params)?;

        tracing::debug!(
            target: "snmpkit::client",
            peer = %self.inner.target,
            engine_id = %hex::encode(&state.engine_id),
            engine_boots = state.engine_boots,
            engine_time = state.engine_time,
            "engine discovered"
        );
        Ok(state)
    }

    /// Localized keys for `engine`, served from the per-client cache.
    fn derive_keys(&self, engine: &EngineState) -> Result<DerivedKeys> {
        let usm_creds = self
            .inner
            .config
            .credentials
            .as_usm()
            .ok_or(Error::encode(EncodeErrorKind::IncompatibleCredentials))?;

        let auth = match &usm_creds.auth {
            Some(credential) => {
                let plugin = self.inner.dispatcher.auth(&credential.protocol)?;
                Some(Zeroizing::new(self.inner.key_cache.localized(
                    plugin,
                    &usm_creds.username,
                    &credential.password,
                    &engine.engine_id,
                    KeyPurpose::Authentication,
                )))
            }
            None => None,
        };

        // The privacy key runs the privacy password through the *auth*
        // protocol's hash (RFC 3414 key localization).
        let privacy = match (&usm_creds.auth, &usm_creds.privacy) {
            (Some(auth_credential), Some(priv_credential)) => {
                let plugin = self.inner.dispatcher.auth(&auth_credential.protocol)?;
                Some(Zeroizing::new(self.inner.key_cache.localized(
                    plugin,
                    &usm_creds.username,
                    &priv_credential.password,
                    &engine.engine_id,
                    KeyPurpose::Privacy,
                )))
            }
            _ => None,
        };

        Ok(DerivedKeys { auth, privacy })
    }
}
