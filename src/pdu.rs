//! SNMP Protocol Data Units.
//!
//! One [`Pdu`] struct covers the request/response family (context tags
//! 0xA0..0xA8 except TrapV1); a GETBULK reuses the error-status and
//! error-index slots for `non-repeaters` and `max-repetitions`, exactly as
//! on the wire. The SNMPv1 trap (0xA4) has its own RFC 1157 body and its
//! own type, [`TrapV1Pdu`].

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tags (context class, constructed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Map a tag byte to a PDU type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// The tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "GetResponse",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "BulkGetRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Request/response PDU.
///
/// For [`PduType::GetBulkRequest`], `error_status` carries
/// `non-repeaters` and `error_index` carries `max-repetitions`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// GET request with NULL placeholders.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// GETNEXT request with NULL placeholders.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetNextRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// SET request.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// GETBULK request; the status/index slots carry the bulk parameters.
    pub fn get_bulk_request(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// `non-repeaters` of a GETBULK request.
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// `max-repetitions` of a GETBULK request.
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index as i64);
            buf.push_integer(self.error_status as i64);
            buf.push_integer(self.request_id as i64);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag_byte = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag_byte).ok_or_else(|| {
            Error::decode(decoder.offset(), DecodeErrorKind::UnknownPduType(tag_byte))
        })?;

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer32()?;
        let error_status = pdu.read_integer32()?;
        let error_index = pdu.read_integer32()?;

        if pdu_type == PduType::GetBulkRequest && (error_status < 0 || error_index < 0) {
            return Err(Error::decode(
                pdu.offset(),
                DecodeErrorKind::IntegerOverflow,
            ));
        }

        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    /// Whether this PDU reports an agent error.
    pub fn is_error(&self) -> bool {
        self.pdu_type != PduType::GetBulkRequest && self.error_status != 0
    }

    /// The error-status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Map a nonzero error-status to [`Error::ErrorResponse`].
    ///
    /// The offending OID is resolved from `error_index` only when that
    /// index is in `[1..=len(varbinds)]`; an index of 0 (or out of range)
    /// leaves the OID unspecified rather than indexing blindly.
    pub fn error_response(&self) -> Option<Error> {
        if !self.is_error() {
            return None;
        }
        let oid = usize::try_from(self.error_index)
            .ok()
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| self.varbinds.get(idx))
            .map(|vb| vb.oid.clone());
        Some(Error::ErrorResponse {
            status: self.error_status_enum(),
            index: self.error_index.max(0) as u32,
            oid,
        })
    }

    /// Whether every varbind is endOfMibView (an exhausted GETBULK).
    pub fn all_end_of_mib_view(&self) -> bool {
        !self.varbinds.is_empty()
            && self
                .varbinds
                .iter()
                .all(|vb| vb.value == Value::EndOfMibView)
    }
}

/// SNMPv1 trap PDU (RFC 1157 Section 4.1.6).
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// Enterprise OID of the emitting entity.
    pub enterprise: Oid,
    /// Agent IPv4 address.
    pub agent_addr: [u8; 4],
    /// Generic trap number (0..6).
    pub generic_trap: i32,
    /// Specific trap code (meaningful for enterpriseSpecific).
    pub specific_trap: i32,
    /// sysUpTime at emission, hundredths of seconds.
    pub time_stamp: u32,
    /// Trap payload.
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Translate to the SNMPv2 trap OID (RFC 3584 Section 3).
    ///
    /// Generic traps 0..5 map to `snmpTraps.{n+1}`; enterpriseSpecific
    /// maps to `enterprise.0.specific_trap`.
    pub fn v2_trap_oid(&self) -> Oid {
        if self.generic_trap == 6 {
            let mut nodes: Vec<u32> = self.enterprise.nodes().to_vec();
            nodes.push(0);
            nodes.push(self.specific_trap as u32);
            Oid::new(nodes)
        } else {
            crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 5).child((self.generic_trap + 1) as u32)
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap as i64);
            buf.push_integer(self.generic_trap as i64);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;

        let enterprise = pdu.read_oid()?;
        let agent_addr = pdu.read_ip_address()?;
        let generic_trap = pdu.read_integer32()?;
        let specific_trap = pdu.read_integer32()?;
        let time_stamp = pdu.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}
