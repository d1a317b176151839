//! Authoritative engine state (RFC 3414 Sections 2.3, 3.2).
//!
//! The remote agent is the authoritative engine: its boot counter and
//! clock define the time window for authenticated messages. State is
//! discovered (never configured), cached per target, and refreshed when
//! the agent reports `usmStatsNotInTimeWindows`.

use std::time::Instant;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::v3::usm::UsmSecurityParams;

/// RFC 3414 time window in seconds.
pub const TIME_WINDOW_SECS: u32 = 150;

/// The usmStats report OIDs (RFC 3414 Section 5), instance suffix
/// included.
pub mod usm_stats {
    use crate::oid::Oid;

    pub fn unsupported_sec_levels() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    pub fn not_in_time_windows() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    pub fn unknown_user_names() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    pub fn unknown_engine_ids() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    pub fn wrong_digests() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    pub fn decryption_errors() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }
}

/// Cached state of one authoritative engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// The engine's identifier.
    pub engine_id: Bytes,
    /// Reboot counter at last sync.
    pub engine_boots: u32,
    /// Engine clock (seconds since boot) at last sync.
    pub engine_time: u32,
    /// Local instant of the last sync.
    pub synced_at: Instant,
}

impl EngineState {
    /// Record freshly synchronized state.
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
        }
    }

    /// The engine clock now, estimated from local elapsed time.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs();
        self.engine_time.wrapping_add(elapsed as u32)
    }

    /// Whether an inbound message's timing fits the RFC 3414 window:
    /// boots must match and the clocks may drift at most 150 seconds.
    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        if msg_boots != self.engine_boots {
            return false;
        }
        let expected = self.estimated_time();
        expected.abs_diff(msg_time) <= TIME_WINDOW_SECS
    }

    /// Re-synchronize from an authenticated message's USM parameters.
    pub fn resync(&mut self, boots: u32, time: u32) {
        self.engine_boots = boots;
        self.engine_time = time;
        self.synced_at = Instant::now();
    }
}

/// Extract engine state from a discovery Report's security parameters.
pub fn parse_discovery_response(security_params: &Bytes) -> Result<EngineState> {
    let params = UsmSecurityParams::decode(security_params.clone())?;
    if params.engine_id.is_empty() {
        return Err(Error::UnknownEngineId { target: None });
    }
    Ok(EngineState::new(
        params.engine_id,
        params.engine_boots,
        params.engine_time,
    ))
}

/// The usmStats counter named by a Report PDU, if any.
fn report_oid(pdu: &Pdu) -> Option<&Oid> {
    if pdu.pdu_type != PduType::Report {
        return None;
    }
    pdu.varbinds.first().map(|vb| &vb.oid)
}

/// Map a Report PDU onto the error it stands for.
///
/// Returns `None` for non-Report PDUs and for reports naming a counter
/// this client does not act on.
pub fn classify_report(pdu: &Pdu) -> Option<Error> {
    let oid = report_oid(pdu)?;

    if *oid == usm_stats::unknown_engine_ids() {
        Some(Error::UnknownEngineId { target: None })
    } else if *oid == usm_stats::not_in_time_windows() {
        Some(Error::NotInTimeWindow { target: None })
    } else if *oid == usm_stats::unsupported_sec_levels() {
        Some(Error::UnsupportedSecLevel { target: None })
    } else if *oid == usm_stats::unknown_user_names() {
        Some(Error::auth(None, crate::error::AuthErrorKind::UnknownUser))
    } else if *oid == usm_stats::wrong_digests() {
        Some(Error::auth(
            None,
            crate::error::AuthErrorKind::ReportedWrongDigest,
        ))
    } else if *oid == usm_stats::decryption_errors() {
        Some(Error::decrypt(
            None,
            crate::error::CryptoErrorKind::CipherError,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::varbind::VarBind;

    fn report_with(oid: Oid) -> Pdu {
        Pdu {
            pdu_type: PduType::Report,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(oid, Value::Counter32(1))],
        }
    }

    #[test]
    fn time_window_acceptance() {
        let state = EngineState::new(Bytes::from_static(b"e"), 4, 1000);

        assert!(state.is_in_time_window(4, 1000));
        assert!(state.is_in_time_window(4, 1000 + TIME_WINDOW_SECS));
        assert!(state.is_in_time_window(4, 1000 - TIME_WINDOW_SECS));
        assert!(!state.is_in_time_window(4, 1000 + TIME_WINDOW_SECS + 1));
        assert!(!state.is_in_time_window(3, 1000)); // boots mismatch
        assert!(!state.is_in_time_window(5, 1000));
    }

    #[test]
    fn resync_updates_state() {
        let mut state = EngineState::new(Bytes::from_static(b"e"), 4, 1000);
        state.resync(5, 10);
        assert_eq!(state.engine_boots, 5);
        assert!(state.is_in_time_window(5, 10));
        assert!(!state.is_in_time_window(4, 1000));
    }

    #[test]
    fn discovery_parse() {
        let params = UsmSecurityParams {
            engine_id: Bytes::from_static(b"\x80\x00\x1f\x88\x80engine"),
            engine_boots: 42,
            engine_time: 12345,
            username: Bytes::new(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        };
        let state = parse_discovery_response(&params.encode()).unwrap();
        assert_eq!(state.engine_id.as_ref(), b"\x80\x00\x1f\x88\x80engine");
        assert_eq!(state.engine_boots, 42);
        assert_eq!(state.engine_time, 12345);
    }

    #[test]
    fn discovery_rejects_empty_engine_id() {
        let params = UsmSecurityParams::empty();
        assert!(parse_discovery_response(&params.encode()).is_err());
    }

    #[test]
    fn report_classification() {
        assert!(matches!(
            classify_report(&report_with(usm_stats::unknown_engine_ids())),
            Some(Error::UnknownEngineId { .. })
        ));
        assert!(matches!(
            classify_report(&report_with(usm_stats::not_in_time_windows())),
            Some(Error::NotInTimeWindow { .. })
        ));
        assert!(matches!(
            classify_report(&report_with(usm_stats::unsupported_sec_levels())),
            Some(Error::UnsupportedSecLevel { .. })
        ));
        assert!(matches!(
            classify_report(&report_with(usm_stats::wrong_digests())),
            Some(Error::AuthenticationFailure { .. })
        ));
        assert!(matches!(
            classify_report(&report_with(usm_stats::decryption_errors())),
            Some(Error::DecryptionError { .. })
        ));

        // unrelated report OID
        assert!(classify_report(&report_with(crate::oid!(1, 3, 6, 1))).is_none());

        // non-report PDU
        let get = Pdu::get_request(1, &[crate::oid!(1, 3)]);
        assert!(classify_report(&get).is_none());
    }
}
