//! Shared test plumbing: a scriptable in-memory transport and a fake
//! v2c agent backed by a sorted OID map.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use snmpkit::message::CommunityMessage;
use snmpkit::pdu::{Pdu, PduType};
use snmpkit::transport::Transport;
use snmpkit::value::Value;
use snmpkit::varbind::VarBind;
use snmpkit::{Client, ClientConfig, Credentials, Error, Oid, Result};

/// Install a tracing subscriber once, so
/// `RUST_LOG=snmpkit=trace cargo test` shows the library's structured
/// logs interleaved with test output. Off by default via the env
/// filter; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The fixed fake target address used with mock transports.
pub fn mock_target() -> SocketAddr {
    "192.0.2.1:161".parse().unwrap()
}

/// Hex decoding for known-answer tests.
pub fn unhex(s: &str) -> Vec<u8> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    assert!(cleaned.len() % 2 == 0, "odd hex length");
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16).expect("hex digit");
            let lo = (pair[1] as char).to_digit(16).expect("hex digit");
            ((hi << 4) | lo) as u8
        })
        .collect()
}

/// Hex encoding for byte-exact assertions.
pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

type Handler = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Transport whose responses come from a closure.
///
/// Returning `None` simulates a dropped datagram (the client sees a
/// timeout for that attempt).
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Mutex<Handler>>,
    pub requests: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new(handler: impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static) -> Self {
        Self {
            handler: Arc::new(Mutex::new(Box::new(handler))),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of datagrams the client has sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    async fn send(&self, _target: SocketAddr, data: &[u8], timeout: Duration) -> Result<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = (self.handler.lock().unwrap())(data);
        match response {
            Some(bytes) => Ok(Bytes::from(bytes)),
            None => Err(Error::Timeout {
                elapsed: timeout,
                retries: 0,
            }),
        }
    }
}

/// A fake v2c agent serving GETs, GETNEXTs and GETBULKs from a sorted
/// OID map.
#[derive(Clone, Default)]
pub struct FakeAgent {
    pub objects: BTreeMap<Oid, Value>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, oid: Oid, value: Value) -> &mut Self {
        self.objects.insert(oid, value);
        self
    }

    /// The lexicographic successor of `oid`, if any.
    fn next_after(&self, oid: &Oid) -> Option<(&Oid, &Value)> {
        self.objects
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
    }

    /// Answer one decoded request PDU.
    pub fn respond(&self, request: &Pdu) -> Pdu {
        let varbinds = match request.pdu_type {
            PduType::GetRequest => request
                .varbinds
                .iter()
                .map(|vb| {
                    let value = self
                        .objects
                        .get(&vb.oid)
                        .cloned()
                        .unwrap_or(Value::NoSuchObject);
                    VarBind::new(vb.oid.clone(), value)
                })
                .collect(),
            PduType::GetNextRequest => request
                .varbinds
                .iter()
                .map(|vb| match self.next_after(&vb.oid) {
                    Some((oid, value)) => VarBind::new(oid.clone(), value.clone()),
                    None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
                })
                .collect(),
            PduType::GetBulkRequest => {
                let non_repeaters = request.non_repeaters().max(0) as usize;
                let max_repetitions = request.max_repetitions().max(0) as usize;

                let mut out = Vec::new();
                for vb in request.varbinds.iter().take(non_repeaters) {
                    out.push(match self.next_after(&vb.oid) {
                        Some((oid, value)) => VarBind::new(oid.clone(), value.clone()),
                        None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
                    });
                }

                // repetition-major interleave, the order real agents use
                let repeaters: Vec<Oid> = request
                    .varbinds
                    .iter()
                    .skip(non_repeaters)
                    .map(|vb| vb.oid.clone())
                    .collect();
                let mut cursors = repeaters;
                for _ in 0..max_repetitions {
                    for cursor in cursors.iter_mut() {
                        match self.next_after(cursor) {
                            Some((oid, value)) => {
                                out.push(VarBind::new(oid.clone(), value.clone()));
                                *cursor = oid.clone();
                            }
                            None => {
                                out.push(VarBind::new(cursor.clone(), Value::EndOfMibView));
                            }
                        }
                    }
                }
                out
            }
            PduType::SetRequest => request.varbinds.clone(),
            _ => Vec::new(),
        };

        Pdu {
            pdu_type: PduType::Response,
            request_id: request.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// A transport that answers every community request from this agent.
    pub fn into_transport(self) -> MockTransport {
        MockTransport::new(move |data| {
            let msg = CommunityMessage::decode(Bytes::copy_from_slice(data)).expect("request");
            let response = self.respond(&msg.pdu);
            Some(CommunityMessage::new(msg.version, msg.community, response).encode().to_vec())
        })
    }
}

/// A v2c client over the given transport with short timeouts.
pub fn test_client(transport: MockTransport) -> Client<MockTransport> {
    test_client_with(transport, Credentials::v2c("public"))
}

/// A client with custom credentials over the given transport.
pub fn test_client_with(transport: MockTransport, credentials: Credentials) -> Client<MockTransport> {
    init_tracing();
    let mut config = ClientConfig::new(credentials);
    config.timeout = Duration::from_millis(100);
    Client::new(transport, mock_target(), config)
}

/// Populate an agent with `count` leaves under `base` (and a few
/// objects outside it).
pub fn subtree_agent(base: &Oid, count: u32) -> FakeAgent {
    let mut agent = FakeAgent::new();
    for i in 1..=count {
        agent.insert(base.child(i).child(0), Value::Integer(i as i64));
    }
    // neighbors outside the subtree, before and after
    agent.insert(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::from("sysDescr"));
    let mut after = base.nodes().to_vec();
    *after.last_mut().unwrap() += 1;
    agent.insert(Oid::new(after).child(1), Value::from("outside"));
    agent
}
