//! SNMP client.
//!
//! One [`Client`] talks to one agent. Every operation is async and
//! yields at socket I/O only; concurrent operations on a clone of the
//! same client each use their own request ID and socket.

mod bulk;
mod table;
mod v3;
mod walk;

pub use bulk::BulkResult;
pub use table::{TableRow, tablify};
pub use walk::{ErrorHandling, Walk};

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::creds::Credentials;
use crate::dispatch::{Dispatcher, SecurityContext};
use crate::error::{EncodeErrorKind, Error, Result};
use crate::mpm;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{DEFAULT_BUFFER_SIZE, Transport, UdpTransport, resolve_target};
use crate::v3::engine::EngineState;
use crate::v3::{KeyCache, SaltCounter};
use crate::value::Value;
use crate::varbind::VarBind;
use walk::FetchMode;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Default number of transmission attempts.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default GETBULK listing size for walks and tables.
pub const DEFAULT_BULK_SIZE: usize = 10;

/// Per-client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Credentials; selects version and security processing.
    pub credentials: Credentials,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Maximum transmission attempts per request.
    pub retries: u32,
    /// Receive buffer size in bytes.
    pub buffer_size: usize,
    /// v3 context name.
    pub context_name: Bytes,
    /// v3 context engine ID override; discovered when `None`.
    pub context_engine_id: Option<Bytes>,
    /// Listing size for bulk walks and tables.
    pub bulk_size: usize,
}

impl ClientConfig {
    /// Defaults for the given credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            context_name: Bytes::new(),
            context_engine_id: None,
            bulk_size: DEFAULT_BULK_SIZE,
        }
    }
}

/// Builder for a UDP-backed [`Client`].
pub struct ClientBuilder {
    target: String,
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
}

impl ClientBuilder {
    /// Start building a client for `target` (address, `addr:port`, or
    /// hostname) with the given credentials.
    pub fn new(target: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            target: target.into(),
            config: ClientConfig::new(credentials),
            dispatcher: Dispatcher::shared(),
        }
    }

    /// Per-attempt timeout (default 6 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Maximum transmission attempts (default 3).
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries.max(1);
        self
    }

    /// Receive buffer size (default 4096 bytes).
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    /// v3 context name (default empty).
    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.config.context_name = name.into();
        self
    }

    /// Override the v3 context engine ID (default: the discovered one).
    pub fn context_engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.config.context_engine_id = Some(engine_id.into());
        self
    }

    /// Listing size for bulk walks and tables (default 10).
    pub fn bulk_size(mut self, bulk_size: usize) -> Self {
        self.config.bulk_size = bulk_size.max(1);
        self
    }

    /// Use a custom plugin dispatcher instead of the shared default.
    pub fn dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Resolve the target and build the client.
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let target = resolve_target(&self.target, DEFAULT_PORT).await?;
        let transport = UdpTransport::new(self.config.buffer_size);
        Ok(Client::with_dispatcher(
            transport,
            target,
            self.config,
            self.dispatcher,
        ))
    }
}

/// SNMP client, generic over the transport.
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ClientInner<T: Transport> {
    transport: T,
    target: SocketAddr,
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    request_id: AtomicI32,
    /// Discovered authoritative engine state (v3). The lock spans the
    /// whole discover-then-cache and report-then-resync sections.
    engine: Mutex<Option<EngineState>>,
    key_cache: KeyCache,
    salt_counter: SaltCounter,
}

impl Client<UdpTransport> {
    /// Start building a UDP client.
    pub fn builder(target: impl Into<String>, credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(target, credentials)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over an existing transport.
    pub fn new(transport: T, target: SocketAddr, config: ClientConfig) -> Self {
        Self::with_dispatcher(transport, target, config, Dispatcher::shared())
    }

    /// Create a client with a custom plugin dispatcher.
    pub fn with_dispatcher(
        transport: T,
        target: SocketAddr,
        config: ClientConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                target,
                config,
                dispatcher,
                request_id: AtomicI32::new(initial_request_id()),
                engine: Mutex::new(None),
                key_cache: KeyCache::new(),
                salt_counter: SaltCounter::new(),
            }),
        }
    }

    /// The agent this client talks to.
    pub fn target(&self) -> SocketAddr {
        self.inner.target
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    fn next_request_id(&self) -> i32 {
        // keep IDs positive; collisions after a wrap are harmless because
        // each request uses its own socket
        self.inner.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    /// Transmit a serialized message, retrying timeouts.
    ///
    /// Each attempt gets the configured per-attempt timeout; only
    /// timeouts consume attempts, other errors surface immediately.
    pub(crate) async fn transmit(&self, wire: &[u8]) -> Result<Bytes> {
        let config = &self.inner.config;
        let started = Instant::now();

        for attempt in 1..=config.retries {
            if attempt > 1 {
                tracing::debug!(
                    target: "snmpkit::client",
                    peer = %self.inner.target,
                    attempt,
                    "retransmitting request"
                );
            }
            match self
                .inner
                .transport
                .send(self.inner.target, wire, config.timeout)
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(Error::Timeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            target: "snmpkit::client",
            peer = %self.inner.target,
            retries = config.retries,
            "request timed out"
        );
        Err(Error::Timeout {
            elapsed: started.elapsed(),
            retries: config.retries,
        })
    }

    /// Send a PDU through the configured message processing model and
    /// return the validated response PDU.
    async fn send_pdu(&self, pdu: Pdu) -> Result<Pdu> {
        let response = match &self.inner.config.credentials {
            Credentials::Usm(_) => self.send_v3(&pdu).await?,
            _ => self.send_community(&pdu).await?,
        };
        self.validate_response(&pdu, response)
    }

    async fn send_community(&self, pdu: &Pdu) -> Result<Pdu> {
        let ctx =
            SecurityContext::community(&self.inner.config.credentials, &self.inner.dispatcher);
        let wire = mpm::encode_request(pdu, &ctx)?;
        let bytes = self.transmit(&wire).await?;
        mpm::decode_response(bytes, &ctx)
    }

    fn validate_response(&self, request: &Pdu, response: Pdu) -> Result<Pdu> {
        if response.request_id != request.request_id {
            tracing::warn!(
                target: "snmpkit::client",
                expected = request.request_id,
                actual = response.request_id,
                "request ID mismatch"
            );
            return Err(Error::UnexpectedResponse {
                reason: "request ID mismatch",
            });
        }
        if response.pdu_type != PduType::Response {
            return Err(Error::UnexpectedResponse {
                reason: "agent answered with a non-response PDU",
            });
        }
        if let Some(err) = response.error_response() {
            return Err(err);
        }
        Ok(response)
    }

    /// GET a single OID, returning its value.
    pub async fn get(&self, oid: &Oid) -> Result<Value> {
        let mut values = self.multi_get(std::slice::from_ref(oid)).await?;
        Ok(values.remove(0))
    }

    /// GET several OIDs in one request; values come back in request
    /// order.
    pub async fn multi_get(&self, oids: &[Oid]) -> Result<Vec<Value>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let pdu = Pdu::get_request(self.next_request_id(), oids);
        let response = self.send_pdu(pdu).await?;

        if response.varbinds.len() != oids.len() {
            return Err(Error::UnexpectedResponse {
                reason: "GET response varbind count does not match request",
            });
        }
        Ok(response.varbinds.into_iter().map(|vb| vb.value).collect())
    }

    /// GETNEXT for a single OID, returning the successor varbind.
    pub async fn get_next(&self, oid: &Oid) -> Result<VarBind> {
        let mut results = self.multi_get_next(std::slice::from_ref(oid)).await?;
        if results.is_empty() {
            // the agent answered endOfMibView
            return Err(Error::UnexpectedResponse {
                reason: "walked off the end of the MIB",
            });
        }
        Ok(results.remove(0))
    }

    /// GETNEXT for several OIDs in one request.
    ///
    /// The result is truncated at the first endOfMibView. Every returned
    /// OID must be a strict successor of its request OID; anything else
    /// is [`Error::FaultySnmpImplementation`].
    pub async fn multi_get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let pdu = Pdu::get_next_request(self.next_request_id(), oids);
        let response = self.send_pdu(pdu).await?;

        if response.varbinds.len() != oids.len() {
            return Err(Error::UnexpectedResponse {
                reason: "GETNEXT response varbind count does not match request",
            });
        }

        let mut output = Vec::with_capacity(response.varbinds.len());
        for vb in response.varbinds {
            if vb.value == Value::EndOfMibView {
                break;
            }
            output.push(vb);
        }

        // A successor must be strictly greater; equality or regression
        // would loop a walk forever.
        for (requested, retrieved) in oids.iter().zip(&output) {
            if retrieved.oid <= *requested {
                return Err(Error::FaultySnmpImplementation {
                    oid: retrieved.oid.clone(),
                });
            }
        }

        Ok(output)
    }

    /// SET a single OID, returning the echoed value.
    pub async fn set(&self, oid: &Oid, value: Value) -> Result<Value> {
        let mut results = self
            .multi_set(&[(oid.clone(), value)])
            .await?;
        Ok(results.remove(0).1)
    }

    /// SET several OIDs in one request, returning the echoed pairs.
    pub async fn multi_set(&self, assignments: &[(Oid, Value)]) -> Result<Vec<(Oid, Value)>> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }
        let varbinds: Vec<VarBind> = assignments
            .iter()
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
            .collect();
        let pdu = Pdu::set_request(self.next_request_id(), varbinds);
        let response = self.send_pdu(pdu).await?;

        if response.varbinds.len() != assignments.len() {
            return Err(Error::UnexpectedResponse {
                reason: "SET response varbind count does not match request",
            });
        }
        Ok(response
            .varbinds
            .into_iter()
            .map(|vb| (vb.oid, vb.value))
            .collect())
    }

    /// One GETBULK round trip.
    ///
    /// `scalar_oids` become the non-repeaters (one successor each);
    /// `repeating_oids` are fetched list-wise with
    /// `max-repetitions = ceil(max_list_size / len(repeating_oids))`.
    /// The listing is filtered to the requested subtrees and capped at
    /// `max_list_size` entries.
    pub async fn bulk_get(
        &self,
        scalar_oids: &[Oid],
        repeating_oids: &[Oid],
        max_list_size: usize,
    ) -> Result<BulkResult> {
        let response = self
            .bulk_request(scalar_oids, repeating_oids, max_list_size)
            .await?;
        bulk::split_bulk_response(
            response.varbinds,
            scalar_oids.len(),
            bulk::max_repetitions(repeating_oids.len(), max_list_size),
            repeating_oids.len(),
            Some(repeating_oids),
            max_list_size,
        )
    }

    /// Raw GETBULK listing for walk iterations: non-repeaters 0, no
    /// subtree filtering (the walk filters against its own roots).
    pub(crate) async fn bulk_listing(
        &self,
        oids: &[Oid],
        bulk_size: usize,
    ) -> Result<Vec<VarBind>> {
        let response = self.bulk_request(&[], oids, bulk_size).await?;
        let result = bulk::split_bulk_response(
            response.varbinds,
            0,
            bulk::max_repetitions(oids.len(), bulk_size),
            oids.len(),
            None,
            usize::MAX,
        )?;
        Ok(result
            .listing
            .into_iter()
            .map(|(oid, value)| VarBind::new(oid, value))
            .collect())
    }

    async fn bulk_request(
        &self,
        scalar_oids: &[Oid],
        repeating_oids: &[Oid],
        max_list_size: usize,
    ) -> Result<Pdu> {
        if !self.inner.config.credentials.supports_bulk() {
            return Err(Error::encode(EncodeErrorKind::IncompatibleCredentials));
        }

        let mut oids = scalar_oids.to_vec();
        oids.extend_from_slice(repeating_oids);

        let pdu = Pdu::get_bulk_request(
            self.next_request_id(),
            scalar_oids.len() as i32,
            bulk::max_repetitions(repeating_oids.len(), max_list_size),
            &oids,
        );
        self.send_pdu(pdu).await
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Walk one subtree with GETNEXT, yielding `(oid, value)` pairs
    /// lazily; each `next()` may cost one round trip.
    pub fn walk(&self, root: Oid) -> Walk<T> {
        Walk::new(
            self.clone(),
            vec![root],
            FetchMode::GetNext,
            ErrorHandling::default(),
        )
    }

    /// Walk several subtrees in parallel columns with one GETNEXT
    /// request per round.
    pub fn multi_walk(&self, roots: &[Oid]) -> Walk<T> {
        Walk::new(
            self.clone(),
            roots.to_vec(),
            FetchMode::GetNext,
            ErrorHandling::default(),
        )
    }

    /// Walk subtrees using GETBULK, `bulk_size` listing entries per
    /// round.
    pub fn bulk_walk(&self, roots: &[Oid], bulk_size: usize) -> Walk<T> {
        Walk::new(
            self.clone(),
            roots.to_vec(),
            FetchMode::Bulk {
                bulk_size: bulk_size.max(1),
            },
            ErrorHandling::default(),
        )
    }

    /// Fetch a table: walk the base OID and pivot into rows.
    pub async fn table(&self, base: &Oid) -> Result<Vec<TableRow>> {
        let varbinds = self.walk(base.clone()).collect().await?;
        Ok(tablify(varbinds, base.len() + 1))
    }

    /// Fetch a table with GETBULK walking (uses the configured
    /// `bulk_size`).
    pub async fn bulk_table(&self, base: &Oid) -> Result<Vec<TableRow>> {
        let bulk_size = self.inner.config.bulk_size;
        let varbinds = self
            .bulk_walk(std::slice::from_ref(base), bulk_size)
            .collect()
            .await?;
        Ok(tablify(varbinds, base.len() + 1))
    }
}

fn initial_request_id() -> i32 {
    let mut buf = [0u8; 4];
    getrandom::fill(&mut buf).expect("OS random source unavailable");
    ((u32::from_ne_bytes(buf) & 0x3FFF_FFFF) as i32).max(1)
}
